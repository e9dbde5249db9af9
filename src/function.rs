//! Function codes, request categories and exception codes
//!
//! Every supported function code carries one [`FunctionDescriptor`]. The
//! validator reads the request length rule and the broadcast flag from it, the
//! dispatcher reads the callback category and the response shape, so the two
//! stages can never disagree about a function code.

use thiserror::Error;

use crate::constants::*;

/// Supported Modbus function codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FunctionCode {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteSingleCoil,
    WriteSingleRegister,
    ReadExceptionStatus,
    WriteMultipleCoils,
    WriteMultipleRegisters,
}

/// Callback table slot a request is routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Category {
    ReadCoils,
    ReadDiscreteInputs,
    ReadHoldingRegisters,
    ReadInputRegisters,
    WriteCoils,
    WriteHoldingRegisters,
    ReadExceptionStatus,
}

impl Category {
    /// Number of callback slots per unit
    pub const COUNT: usize = 7;

    /// All categories, in slot order
    pub const ALL: [Category; Category::COUNT] = [
        Category::ReadCoils,
        Category::ReadDiscreteInputs,
        Category::ReadHoldingRegisters,
        Category::ReadInputRegisters,
        Category::WriteCoils,
        Category::WriteHoldingRegisters,
        Category::ReadExceptionStatus,
    ];

    /// Slot index in a unit's callback table
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// How many bytes a request occupies beyond address, function code and CRC
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestLength {
    /// A fixed number of data bytes
    Fixed(usize),
    /// A fixed header whose last byte declares how many data bytes follow
    ByteCounted(usize),
}

/// What the dispatcher puts in the response before calling the handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseShape {
    /// A single bit-packed status byte
    StatusByte,
    /// Byte count followed by `ceil(quantity / 8)` bit-packed bytes
    Bits,
    /// Byte count followed by `quantity` big-endian words
    Registers,
    /// The four data bytes of the request, echoed
    Echo,
}

/// Per function code rules shared by validation and dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    pub code: FunctionCode,
    pub request_length: RequestLength,
    pub category: Category,
    pub broadcast_allowed: bool,
    pub response: ResponseShape,
}

impl FunctionDescriptor {
    /// Expected frame size given what has been buffered so far
    ///
    /// For byte-counted requests the declared count is only added once the
    /// header holding it is present.
    pub fn expected_frame_size(&self, frame: &[u8]) -> usize {
        match self.request_length {
            RequestLength::Fixed(data) => MIN_FRAME_SIZE + data,
            RequestLength::ByteCounted(header) => {
                let base = MIN_FRAME_SIZE + header;
                if frame.len() >= base {
                    base + frame[DATA_INDEX + header - 1] as usize
                } else {
                    base
                }
            }
        }
    }
}

impl FunctionCode {
    /// Parse a raw function code
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            FC_READ_COILS => Some(Self::ReadCoils),
            FC_READ_DISCRETE_INPUTS => Some(Self::ReadDiscreteInputs),
            FC_READ_HOLDING_REGISTERS => Some(Self::ReadHoldingRegisters),
            FC_READ_INPUT_REGISTERS => Some(Self::ReadInputRegisters),
            FC_WRITE_SINGLE_COIL => Some(Self::WriteSingleCoil),
            FC_WRITE_SINGLE_REGISTER => Some(Self::WriteSingleRegister),
            FC_READ_EXCEPTION_STATUS => Some(Self::ReadExceptionStatus),
            FC_WRITE_MULTIPLE_COILS => Some(Self::WriteMultipleCoils),
            FC_WRITE_MULTIPLE_REGISTERS => Some(Self::WriteMultipleRegisters),
            _ => None,
        }
    }

    /// Raw function code
    pub fn to_u8(self) -> u8 {
        match self {
            Self::ReadCoils => FC_READ_COILS,
            Self::ReadDiscreteInputs => FC_READ_DISCRETE_INPUTS,
            Self::ReadHoldingRegisters => FC_READ_HOLDING_REGISTERS,
            Self::ReadInputRegisters => FC_READ_INPUT_REGISTERS,
            Self::WriteSingleCoil => FC_WRITE_SINGLE_COIL,
            Self::WriteSingleRegister => FC_WRITE_SINGLE_REGISTER,
            Self::ReadExceptionStatus => FC_READ_EXCEPTION_STATUS,
            Self::WriteMultipleCoils => FC_WRITE_MULTIPLE_COILS,
            Self::WriteMultipleRegisters => FC_WRITE_MULTIPLE_REGISTERS,
        }
    }

    /// Validation and dispatch rules for this function code
    pub fn descriptor(self) -> FunctionDescriptor {
        use Category as C;
        use RequestLength::{ByteCounted, Fixed};
        use ResponseShape as R;

        let (request_length, category, broadcast_allowed, response) = match self {
            Self::ReadCoils => (Fixed(4), C::ReadCoils, false, R::Bits),
            Self::ReadDiscreteInputs => (Fixed(4), C::ReadDiscreteInputs, false, R::Bits),
            Self::ReadHoldingRegisters => {
                (Fixed(4), C::ReadHoldingRegisters, false, R::Registers)
            }
            Self::ReadInputRegisters => (Fixed(4), C::ReadInputRegisters, false, R::Registers),
            Self::WriteSingleCoil => (Fixed(4), C::WriteCoils, true, R::Echo),
            Self::WriteSingleRegister => (Fixed(4), C::WriteHoldingRegisters, true, R::Echo),
            Self::ReadExceptionStatus => {
                (Fixed(0), C::ReadExceptionStatus, false, R::StatusByte)
            }
            Self::WriteMultipleCoils => (ByteCounted(5), C::WriteCoils, true, R::Echo),
            Self::WriteMultipleRegisters => {
                (ByteCounted(5), C::WriteHoldingRegisters, true, R::Echo)
            }
        };

        FunctionDescriptor {
            code: self,
            request_length,
            category,
            broadcast_allowed,
            response,
        }
    }

    /// Human-readable function code description
    pub fn description(self) -> &'static str {
        match self {
            Self::ReadCoils => "Read Coils",
            Self::ReadDiscreteInputs => "Read Discrete Inputs",
            Self::ReadHoldingRegisters => "Read Holding Registers",
            Self::ReadInputRegisters => "Read Input Registers",
            Self::WriteSingleCoil => "Write Single Coil",
            Self::WriteSingleRegister => "Write Single Register",
            Self::ReadExceptionStatus => "Read Exception Status",
            Self::WriteMultipleCoils => "Write Multiple Coils",
            Self::WriteMultipleRegisters => "Write Multiple Registers",
        }
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = crate::error::ModbusError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        Self::from_u8(code).ok_or(crate::error::ModbusError::InvalidFunction { code })
    }
}

/// Modbus exception codes a request can be answered with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExceptionCode {
    #[error("Illegal function")]
    IllegalFunction,
    #[error("Illegal data address")]
    IllegalDataAddress,
    #[error("Illegal data value")]
    IllegalDataValue,
    #[error("Server device failure")]
    ServerDeviceFailure,
    #[error("Acknowledge")]
    Acknowledge,
    #[error("Server device busy")]
    ServerDeviceBusy,
    #[error("Negative acknowledge")]
    NegativeAcknowledge,
    #[error("Memory parity error")]
    MemoryParityError,
    #[error("Gateway path unavailable")]
    GatewayPathUnavailable,
    #[error("Gateway target device failed to respond")]
    GatewayTargetFailed,
}

impl ExceptionCode {
    /// Status byte carried by the exception response
    pub fn to_u8(self) -> u8 {
        match self {
            Self::IllegalFunction => EXCEPTION_ILLEGAL_FUNCTION,
            Self::IllegalDataAddress => EXCEPTION_ILLEGAL_DATA_ADDRESS,
            Self::IllegalDataValue => EXCEPTION_ILLEGAL_DATA_VALUE,
            Self::ServerDeviceFailure => EXCEPTION_SERVER_DEVICE_FAILURE,
            Self::Acknowledge => EXCEPTION_ACKNOWLEDGE,
            Self::ServerDeviceBusy => EXCEPTION_SERVER_DEVICE_BUSY,
            Self::NegativeAcknowledge => EXCEPTION_NEGATIVE_ACKNOWLEDGE,
            Self::MemoryParityError => EXCEPTION_MEMORY_PARITY_ERROR,
            Self::GatewayPathUnavailable => EXCEPTION_GATEWAY_PATH_UNAVAILABLE,
            Self::GatewayTargetFailed => EXCEPTION_GATEWAY_TARGET_FAILED,
        }
    }

    /// Parse a status byte
    pub fn from_u8(code: u8) -> Option<Self> {
        match code {
            EXCEPTION_ILLEGAL_FUNCTION => Some(Self::IllegalFunction),
            EXCEPTION_ILLEGAL_DATA_ADDRESS => Some(Self::IllegalDataAddress),
            EXCEPTION_ILLEGAL_DATA_VALUE => Some(Self::IllegalDataValue),
            EXCEPTION_SERVER_DEVICE_FAILURE => Some(Self::ServerDeviceFailure),
            EXCEPTION_ACKNOWLEDGE => Some(Self::Acknowledge),
            EXCEPTION_SERVER_DEVICE_BUSY => Some(Self::ServerDeviceBusy),
            EXCEPTION_NEGATIVE_ACKNOWLEDGE => Some(Self::NegativeAcknowledge),
            EXCEPTION_MEMORY_PARITY_ERROR => Some(Self::MemoryParityError),
            EXCEPTION_GATEWAY_PATH_UNAVAILABLE => Some(Self::GatewayPathUnavailable),
            EXCEPTION_GATEWAY_TARGET_FAILED => Some(Self::GatewayTargetFailed),
            _ => None,
        }
    }
}

/// Outcome of a unit callback: `Ok(())` answers normally, `Err` answers with an exception
pub type HandlerResult = Result<(), ExceptionCode>;

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_CODES: [FunctionCode; 9] = [
        FunctionCode::ReadCoils,
        FunctionCode::ReadDiscreteInputs,
        FunctionCode::ReadHoldingRegisters,
        FunctionCode::ReadInputRegisters,
        FunctionCode::WriteSingleCoil,
        FunctionCode::WriteSingleRegister,
        FunctionCode::ReadExceptionStatus,
        FunctionCode::WriteMultipleCoils,
        FunctionCode::WriteMultipleRegisters,
    ];

    #[test]
    fn test_function_code_conversion() {
        for code in ALL_CODES {
            assert_eq!(FunctionCode::from_u8(code.to_u8()), Some(code));
        }
        assert_eq!(FunctionCode::from_u8(0x08), None);
        assert_eq!(FunctionCode::from_u8(0x83), None);
        assert!(FunctionCode::try_from(0x2B).is_err());
    }

    #[test]
    fn test_expected_sizes() {
        let frame = [0x11, 0x03];
        assert_eq!(
            FunctionCode::ReadHoldingRegisters
                .descriptor()
                .expected_frame_size(&frame),
            8
        );
        assert_eq!(
            FunctionCode::ReadExceptionStatus
                .descriptor()
                .expected_frame_size(&frame),
            4
        );
    }

    #[test]
    fn test_byte_counted_size_waits_for_header() {
        let descriptor = FunctionCode::WriteMultipleRegisters.descriptor();

        // Byte count not buffered yet
        assert_eq!(descriptor.expected_frame_size(&[0x11, 0x10, 0x00]), 9);

        // 2 registers, byte count 4
        let frame = [0x11, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A];
        assert_eq!(descriptor.expected_frame_size(&frame), 13);
    }

    #[test]
    fn test_broadcast_rules() {
        for code in ALL_CODES {
            let allowed = code.descriptor().broadcast_allowed;
            let is_write = matches!(
                code,
                FunctionCode::WriteSingleCoil
                    | FunctionCode::WriteSingleRegister
                    | FunctionCode::WriteMultipleCoils
                    | FunctionCode::WriteMultipleRegisters
            );
            assert_eq!(allowed, is_write, "{}", code.description());
        }
    }

    #[test]
    fn test_category_slots_are_distinct() {
        for (i, category) in Category::ALL.iter().enumerate() {
            assert_eq!(category.index(), i);
        }
    }

    #[test]
    fn test_exception_codes() {
        assert_eq!(ExceptionCode::IllegalFunction.to_u8(), 0x01);
        assert_eq!(ExceptionCode::IllegalDataAddress.to_u8(), 0x02);
        assert_eq!(ExceptionCode::from_u8(0x0B), Some(ExceptionCode::GatewayTargetFailed));
        assert_eq!(ExceptionCode::from_u8(0x09), None);
        assert_eq!(ExceptionCode::IllegalDataValue.to_string(), "Illegal data value");
    }
}
