//! Response construction
//!
//! Lays out the response skeleton for a validated request, checks the
//! protocol-level limits, then hands the request to the unit handlers which
//! fill in the payload through an [`Exchange`].
//!
//! | Shape        | Response data before the handler runs         | Handler range |
//! |--------------|-----------------------------------------------|---------------|
//! | `StatusByte` | one zero byte                                 | `(0, 8)`      |
//! | `Bits`       | byte count `ceil(q / 8)`, then zeroed bytes   | `(start, q)`  |
//! | `Registers`  | byte count `2 * q`, then zeroed words         | `(start, q)`  |
//! | `Echo`       | start and value/quantity words of the request | `(start, q)`  |

use crate::constants::{COIL_OFF, COIL_ON, DATA_INDEX};
use crate::exchange::Exchange;
use crate::function::{
    ExceptionCode, FunctionCode, FunctionDescriptor, HandlerResult, ResponseShape,
};
use crate::logging::SlaveEvent;
use crate::slave::Slave;
use crate::transport::{Clock, Transport, TxEnable};

/// Request data bytes echoed by write responses
const ECHO_LEN: usize = 4;

/// Byte index of the quantity or value word
const QUANTITY_INDEX: usize = DATA_INDEX + 2;

/// Byte index of the byte count in a 0x0F/0x10 request
const BYTE_COUNT_INDEX: usize = DATA_INDEX + 4;

/// Quantity of status bits reported by Read Exception Status
const EXCEPTION_STATUS_BITS: u16 = 8;

/// Fail with Illegal Data Address when the range runs past the 16-bit address space
fn check_range(start: u16, quantity: u16) -> HandlerResult {
    if u32::from(start) + u32::from(quantity) > 0x1_0000 {
        Err(ExceptionCode::IllegalDataAddress)
    } else {
        Ok(())
    }
}

fn check_quantity(quantity: u16, within_limits: bool) -> HandlerResult {
    if quantity == 0 || !within_limits {
        Err(ExceptionCode::IllegalDataValue)
    } else {
        Ok(())
    }
}

impl<T: Transport, C: Clock, P: TxEnable> Slave<T, C, P> {
    /// Build the response for an accepted request and run the handlers
    pub(crate) fn create_response(&mut self, descriptor: FunctionDescriptor) -> HandlerResult {
        let address = self.request.address().unwrap_or_default();
        let (start, quantity) = self.prepare_response(descriptor)?;

        self.stats.requests_dispatched += 1;
        if self.is_broadcast() {
            self.stats.broadcasts += 1;
        }
        self.emit(SlaveEvent::RequestDispatched {
            address,
            function: descriptor.code,
            start,
            quantity,
        });

        let mut exchange = Exchange::new(
            &self.request,
            &mut self.response,
            descriptor.code,
            start,
            quantity,
        );
        self.units
            .dispatch(address, descriptor.category, &mut exchange)
    }

    /// Check the request fields and reserve the response payload
    fn prepare_response(
        &mut self,
        descriptor: FunctionDescriptor,
    ) -> Result<(u16, u16), ExceptionCode> {
        if descriptor.response == ResponseShape::StatusByte {
            self.reserve(1)?;
            return Ok((0, EXCEPTION_STATUS_BITS));
        }

        let start = self.request_word(DATA_INDEX)?;
        let quantity = self.request_word(QUANTITY_INDEX)?;

        match descriptor.response {
            ResponseShape::Bits => {
                check_quantity(quantity, self.config.is_coil_read_within_limits(quantity))?;
                check_range(start, quantity)?;
                let byte_count = quantity.div_ceil(8) as usize;
                self.reserve(1 + byte_count)?;
                self.response.set_byte(DATA_INDEX, byte_count as u8);
                Ok((start, quantity))
            }
            ResponseShape::Registers => {
                check_quantity(quantity, self.config.is_read_within_limits(quantity))?;
                check_range(start, quantity)?;
                let byte_count = 2 * quantity as usize;
                self.reserve(1 + byte_count)?;
                self.response.set_byte(DATA_INDEX, byte_count as u8);
                Ok((start, quantity))
            }
            ResponseShape::Echo => {
                let quantity = self.check_write(descriptor.code, start, quantity)?;
                self.reserve(ECHO_LEN)?;
                let echo = self
                    .request
                    .as_slice()
                    .get(DATA_INDEX..DATA_INDEX + ECHO_LEN)
                    .ok_or(ExceptionCode::IllegalDataValue)?;
                self.response.copy_from(DATA_INDEX, echo);
                Ok((start, quantity))
            }
            ResponseShape::StatusByte => Ok((0, EXCEPTION_STATUS_BITS)),
        }
    }

    /// Validate a write request, returning the number of items it writes
    fn check_write(
        &self,
        code: FunctionCode,
        start: u16,
        word: u16,
    ) -> Result<u16, ExceptionCode> {
        match code {
            FunctionCode::WriteSingleCoil => {
                if word != COIL_ON && word != COIL_OFF {
                    return Err(ExceptionCode::IllegalDataValue);
                }
                Ok(1)
            }
            FunctionCode::WriteMultipleCoils => {
                check_quantity(word, self.config.is_coil_write_within_limits(word))?;
                self.check_byte_count(word.div_ceil(8))?;
                check_range(start, word)?;
                Ok(word)
            }
            FunctionCode::WriteMultipleRegisters => {
                check_quantity(word, self.config.is_write_within_limits(word))?;
                self.check_byte_count(2 * word)?;
                check_range(start, word)?;
                Ok(word)
            }
            _ => Ok(1),
        }
    }

    fn check_byte_count(&self, expected: u16) -> HandlerResult {
        match self.request.byte(BYTE_COUNT_INDEX) {
            Some(count) if u16::from(count) == expected => Ok(()),
            _ => Err(ExceptionCode::IllegalDataValue),
        }
    }

    fn request_word(&self, index: usize) -> Result<u16, ExceptionCode> {
        self.request
            .read_u16(index)
            .ok_or(ExceptionCode::IllegalDataValue)
    }

    /// Grow the response, Server Device Failure if it does not fit the buffer
    fn reserve(&mut self, count: usize) -> HandlerResult {
        if self.response.reserve(count) {
            Ok(())
        } else {
            Err(ExceptionCode::ServerDeviceFailure)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SlaveConfig;
    use crate::crc::append_crc;
    use crate::function::Category;
    use crate::testing::{ManualClock, MemoryTransport};
    use crate::unit::{Unit, UnitRegistry};
    use crate::validator::Validation;

    fn slave_with(config: SlaveConfig, unit: Unit) -> Slave<MemoryTransport, ManualClock> {
        let units = UnitRegistry::new().with_unit(unit).unwrap();
        Slave::new(config, units, MemoryTransport::new(), ManualClock::new()).unwrap()
    }

    /// Validate and dispatch `bytes`, returning the handler outcome and the response payload
    fn run(slave: &mut Slave<MemoryTransport, ManualClock>, bytes: &[u8]) -> (HandlerResult, Vec<u8>) {
        let mut frame = bytes.to_vec();
        append_crc(&mut frame);
        slave.request.start();
        slave.request.extend_from_slice(&frame);
        slave.request.stop();
        slave.response.begin(frame[0], frame[1]);

        let descriptor = match slave.validate_request() {
            Validation::Accept(descriptor) => descriptor,
            other => panic!("request rejected: {:?}", other),
        };
        let result = slave.create_response(descriptor);
        let end = slave.response.payload_end();
        (result, slave.response.as_slice()[..end].to_vec())
    }

    fn unit() -> Unit {
        Unit::new(1)
            .unwrap()
            .with_handler(Category::ReadCoils, |req| {
                for offset in (0..req.quantity()).step_by(2) {
                    req.write_coil(offset, true)?;
                }
                Ok(())
            })
            .with_handler(Category::ReadInputRegisters, |req| {
                req.write_register(0, req.start_address())
            })
            .with_handler(Category::ReadExceptionStatus, |req| {
                req.write_exception_status(0, true)
            })
            .with_handler(Category::WriteCoils, |_| Ok(()))
            .with_handler(Category::WriteHoldingRegisters, |req| {
                match req.read_register(0) {
                    Some(0xDEAD) => Err(ExceptionCode::ServerDeviceBusy),
                    _ => Ok(()),
                }
            })
    }

    #[test]
    fn test_read_bits_layout() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, payload) = run(&mut slave, &[1, 0x01, 0x00, 0x13, 0x00, 0x0A]);
        assert_eq!(result, Ok(()));
        assert_eq!(payload, vec![1, 0x01, 0x02, 0x55, 0x01]);
    }

    #[test]
    fn test_read_registers_layout() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, payload) = run(&mut slave, &[1, 0x04, 0x00, 0x08, 0x00, 0x02]);
        assert_eq!(result, Ok(()));
        assert_eq!(payload, vec![1, 0x04, 0x04, 0x00, 0x08, 0x00, 0x00]);
    }

    #[test]
    fn test_exception_status_layout() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, payload) = run(&mut slave, &[1, 0x07]);
        assert_eq!(result, Ok(()));
        assert_eq!(payload, vec![1, 0x07, 0x01]);
    }

    #[test]
    fn test_write_echoes_header() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, payload) = run(&mut slave, &[1, 0x05, 0x00, 0xAC, 0xFF, 0x00]);
        assert_eq!(result, Ok(()));
        assert_eq!(payload, vec![1, 0x05, 0x00, 0xAC, 0xFF, 0x00]);

        let (result, payload) = run(
            &mut slave,
            &[1, 0x0F, 0x00, 0x13, 0x00, 0x0A, 0x02, 0xCD, 0x01],
        );
        assert_eq!(result, Ok(()));
        assert_eq!(payload, vec![1, 0x0F, 0x00, 0x13, 0x00, 0x0A]);
    }

    #[test]
    fn test_handler_exception_passes_through() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, _) = run(&mut slave, &[1, 0x06, 0x00, 0x01, 0xDE, 0xAD]);
        assert_eq!(result, Err(ExceptionCode::ServerDeviceBusy));
    }

    #[test]
    fn test_missing_handler_is_illegal_function() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, _) = run(&mut slave, &[1, 0x03, 0x00, 0x00, 0x00, 0x01]);
        assert_eq!(result, Err(ExceptionCode::IllegalFunction));
    }

    #[test]
    fn test_quantity_limits() {
        let config = SlaveConfig::new().with_max_read_registers(4);
        let mut slave = slave_with(config, unit());

        let (result, _) = run(&mut slave, &[1, 0x04, 0x00, 0x00, 0x00, 0x05]);
        assert_eq!(result, Err(ExceptionCode::IllegalDataValue));
        let (result, _) = run(&mut slave, &[1, 0x04, 0x00, 0x00, 0x00, 0x00]);
        assert_eq!(result, Err(ExceptionCode::IllegalDataValue));
        let (result, _) = run(&mut slave, &[1, 0x01, 0x00, 0x00, 0x07, 0xD1]);
        assert_eq!(result, Err(ExceptionCode::IllegalDataValue));
    }

    #[test]
    fn test_range_past_address_space() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, _) = run(&mut slave, &[1, 0x04, 0xFF, 0xFF, 0x00, 0x02]);
        assert_eq!(result, Err(ExceptionCode::IllegalDataAddress));
        let (result, _) = run(&mut slave, &[1, 0x04, 0xFF, 0xFF, 0x00, 0x01]);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_write_value_checks() {
        let mut slave = slave_with(SlaveConfig::default(), unit());
        let (result, _) = run(&mut slave, &[1, 0x05, 0x00, 0x01, 0x12, 0x34]);
        assert_eq!(result, Err(ExceptionCode::IllegalDataValue));

        // Byte count disagrees with the quantity
        let (result, _) = run(
            &mut slave,
            &[1, 0x10, 0x00, 0x01, 0x00, 0x02, 0x02, 0x00, 0x0A],
        );
        assert_eq!(result, Err(ExceptionCode::IllegalDataValue));
    }

    #[test]
    fn test_response_too_large_for_buffer() {
        let config = SlaveConfig::new().with_buffer_capacity(16);
        let mut slave = slave_with(config, unit());
        let (result, _) = run(&mut slave, &[1, 0x04, 0x00, 0x00, 0x00, 0x08]);
        assert_eq!(result, Err(ExceptionCode::ServerDeviceFailure));
    }
}
