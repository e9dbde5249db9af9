//! Buffer accessors handed to unit handlers
//!
//! An [`Exchange`] is the handler's view of one request/response pair. Offsets
//! are zero-based and relative to the request's start address, so offset `0`
//! is always the first coil or register the master asked about.
//!
//! | Function            | Read side                 | Write side                      |
//! |---------------------|---------------------------|---------------------------------|
//! | 0x01 / 0x02         |                           | `write_coil`, `write_discrete_input` |
//! | 0x03 / 0x04         |                           | `write_register`, `write_registers` |
//! | 0x05                | `read_coil(0)`            |                                 |
//! | 0x06                | `read_register(0)`        |                                 |
//! | 0x07                |                           | `write_exception_status`        |
//! | 0x0F                | `read_coil(offset)`       |                                 |
//! | 0x10                | `read_register(offset)`   |                                 |
//!
//! Every accessor is bounds checked against the frame and never panics.
//! Write accessors fail with [`ExceptionCode::IllegalDataAddress`] so handlers
//! can propagate them with `?`.

use crate::buffer::{RequestBuffer, ResponseBuffer};
use crate::constants::{BROADCAST_ADDRESS, COIL_ON, DATA_INDEX};
use crate::function::{ExceptionCode, FunctionCode, HandlerResult};

/// Byte index of the first coil/register value in a 0x0F/0x10 request
const MULTIPLE_WRITE_VALUES_INDEX: usize = 7;

/// Byte index of the value word in a 0x05/0x06 request
const SINGLE_WRITE_VALUE_INDEX: usize = 4;

/// Byte index of the first packed value in a read response, after the byte count
const READ_RESPONSE_VALUES_INDEX: usize = 3;

/// One request being answered
#[derive(Debug)]
pub struct Exchange<'a> {
    request: &'a RequestBuffer,
    response: &'a mut ResponseBuffer,
    function: FunctionCode,
    start_address: u16,
    quantity: u16,
}

impl<'a> Exchange<'a> {
    pub fn new(
        request: &'a RequestBuffer,
        response: &'a mut ResponseBuffer,
        function: FunctionCode,
        start_address: u16,
        quantity: u16,
    ) -> Self {
        Self {
            request,
            response,
            function,
            start_address,
            quantity,
        }
    }

    #[inline]
    pub fn function(&self) -> FunctionCode {
        self.function
    }

    #[inline]
    pub fn function_code(&self) -> u8 {
        self.function.to_u8()
    }

    /// Address the request was sent to, `0` for broadcasts
    #[inline]
    pub fn unit_address(&self) -> u8 {
        self.request.address().unwrap_or(BROADCAST_ADDRESS)
    }

    #[inline]
    pub fn is_broadcast(&self) -> bool {
        self.unit_address() == BROADCAST_ADDRESS
    }

    /// First coil or register addressed by the request
    #[inline]
    pub fn start_address(&self) -> u16 {
        self.start_address
    }

    /// Number of coils or registers addressed by the request
    #[inline]
    pub fn quantity(&self) -> u16 {
        self.quantity
    }

    /// The validated request frame, CRC included
    #[inline]
    pub fn request_frame(&self) -> &[u8] {
        self.request.as_slice()
    }

    // ========================================================================
    // Request side
    // ========================================================================

    /// Coil value written by a 0x05 or 0x0F request
    ///
    /// For 0x05 only offset `0` exists and is `true` when the value is 0xFF00.
    pub fn read_coil(&self, offset: u16) -> Option<bool> {
        match self.function {
            FunctionCode::WriteSingleCoil if offset == 0 => self
                .request_word(SINGLE_WRITE_VALUE_INDEX)
                .map(|v| v == COIL_ON),
            FunctionCode::WriteMultipleCoils => {
                let index = MULTIPLE_WRITE_VALUES_INDEX + usize::from(offset / 8);
                if offset >= self.quantity || index >= self.request.payload_end() {
                    return None;
                }
                let byte = self.request.byte(index)?;
                Some(byte & (1 << (offset % 8)) != 0)
            }
            _ => None,
        }
    }

    /// Register value written by a 0x06 or 0x10 request
    pub fn read_register(&self, offset: u16) -> Option<u16> {
        match self.function {
            FunctionCode::WriteSingleRegister if offset == 0 => {
                self.request_word(SINGLE_WRITE_VALUE_INDEX)
            }
            FunctionCode::WriteMultipleRegisters => {
                if offset >= self.quantity {
                    return None;
                }
                self.request_word(MULTIPLE_WRITE_VALUES_INDEX + 2 * usize::from(offset))
            }
            _ => None,
        }
    }

    fn request_word(&self, index: usize) -> Option<u16> {
        if index + 2 > self.request.payload_end() {
            return None;
        }
        self.request.read_u16(index)
    }

    // ========================================================================
    // Response side
    // ========================================================================

    /// Set bit `offset` (0-7) of the 0x07 exception status byte
    pub fn write_exception_status(&mut self, offset: u8, state: bool) -> HandlerResult {
        if self.function != FunctionCode::ReadExceptionStatus || offset > 7 {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        check(self.response.set_bit(DATA_INDEX, offset, state))
    }

    /// Set coil `offset` of a 0x01 or 0x02 response
    pub fn write_coil(&mut self, offset: u16, state: bool) -> HandlerResult {
        if !matches!(
            self.function,
            FunctionCode::ReadCoils | FunctionCode::ReadDiscreteInputs
        ) {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        let index = READ_RESPONSE_VALUES_INDEX + usize::from(offset / 8);
        check(self.response.set_bit(index, (offset % 8) as u8, state))
    }

    /// Same as [`Exchange::write_coil`], reads better in 0x02 handlers
    #[inline]
    pub fn write_discrete_input(&mut self, offset: u16, state: bool) -> HandlerResult {
        self.write_coil(offset, state)
    }

    /// Set register `offset` of a 0x03 or 0x04 response
    pub fn write_register(&mut self, offset: u16, value: u16) -> HandlerResult {
        self.check_register_read()?;
        let index = READ_RESPONSE_VALUES_INDEX + 2 * usize::from(offset);
        check(self.response.set_u16(index, value))
    }

    /// Set consecutive registers starting at `offset` of a 0x03 or 0x04 response
    ///
    /// Nothing is written unless every value fits.
    pub fn write_registers(&mut self, offset: u16, values: &[u16]) -> HandlerResult {
        self.check_register_read()?;
        let index = READ_RESPONSE_VALUES_INDEX + 2 * usize::from(offset);
        if index + 2 * values.len() > self.response.payload_end() {
            return Err(ExceptionCode::IllegalDataAddress);
        }
        for (i, value) in values.iter().enumerate() {
            self.response.set_u16(index + 2 * i, *value);
        }
        Ok(())
    }

    fn check_register_read(&self) -> HandlerResult {
        match self.function {
            FunctionCode::ReadHoldingRegisters | FunctionCode::ReadInputRegisters => Ok(()),
            _ => Err(ExceptionCode::IllegalDataAddress),
        }
    }
}

#[inline]
fn check(written: bool) -> HandlerResult {
    if written {
        Ok(())
    } else {
        Err(ExceptionCode::IllegalDataAddress)
    }
}
