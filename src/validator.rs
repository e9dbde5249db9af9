//! Request validation
//!
//! Decides what happens to a complete frame: drop it as noise, answer it with
//! an exception, or accept it for dispatch. The length rule and broadcast rule
//! come from the function's [`FunctionDescriptor`].

use crate::constants::{BROADCAST_ADDRESS, MIN_FRAME_SIZE};
use crate::crc::verify_crc;
use crate::function::{ExceptionCode, FunctionCode, FunctionDescriptor};
use crate::logging::SlaveEvent;
use crate::slave::Slave;
use crate::transport::{Clock, Transport, TxEnable};

/// Outcome of validating a complete frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Validation {
    /// Well-formed request for a supported function
    Accept(FunctionDescriptor),
    /// Noise, a broadcast read or a frame for another device
    Drop,
    /// Intact frame that must be answered with an exception
    Exception(ExceptionCode),
}

impl<T: Transport, C: Clock, P: TxEnable> Slave<T, C, P> {
    pub(crate) fn validate_request(&mut self) -> Validation {
        let (address, code) = match (self.request.address(), self.request.function_code()) {
            (Some(address), Some(code)) => (address, code),
            _ => return Validation::Drop,
        };

        if !self.units.is_relevant(address) {
            self.emit(SlaveEvent::AddressIgnored { address });
            return Validation::Drop;
        }

        let descriptor = FunctionCode::from_u8(code).map(FunctionCode::descriptor);
        let expected = match descriptor {
            Some(descriptor) => {
                if address == BROADCAST_ADDRESS && !descriptor.broadcast_allowed {
                    self.emit(SlaveEvent::BroadcastReadIgnored {
                        function: descriptor.code,
                    });
                    return Validation::Drop;
                }
                descriptor.expected_frame_size(self.request.as_slice())
            }
            None => MIN_FRAME_SIZE,
        };

        let actual = self.request.len();
        if actual < expected {
            self.stats.frames_dropped += 1;
            self.emit(SlaveEvent::FrameTooShort { expected, actual });
            return Validation::Drop;
        }

        // The CRC covers everything buffered, trailing bytes included
        if !verify_crc(self.request.as_slice()) {
            self.stats.frames_dropped += 1;
            self.emit(SlaveEvent::CrcMismatch {
                address,
                len: actual,
            });
            return Validation::Drop;
        }

        match descriptor {
            Some(descriptor) => {
                self.request.truncate(expected);
                Validation::Accept(descriptor)
            }
            None => {
                self.emit(SlaveEvent::IllegalFunction { address, code });
                Validation::Exception(ExceptionCode::IllegalFunction)
            }
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

    fn slave() -> Slave<MemoryTransport, ManualClock> {
        let units = UnitRegistry::new()
            .with_unit(Unit::new(1).unwrap().with_handler(Category::ReadCoils, |_| Ok(())))
            .unwrap();
        Slave::new(
            SlaveConfig::default(),
            units,
            MemoryTransport::new(),
            ManualClock::new(),
        )
        .unwrap()
    }

    fn validate(bytes: &[u8], with_crc: bool) -> (Validation, usize) {
        let mut frame = bytes.to_vec();
        if with_crc {
            append_crc(&mut frame);
        }
        let mut slave = slave();
        slave.request.start();
        slave.request.extend_from_slice(&frame);
        slave.request.stop();
        let result = slave.validate_request();
        (result, slave.request.len())
    }

    #[test]
    fn test_accepts_read_request() {
        let (result, len) = validate(&[1, 0x01, 0x00, 0x13, 0x00, 0x25], true);
        assert_eq!(
            result,
            Validation::Accept(FunctionCode::ReadCoils.descriptor())
        );
        assert_eq!(len, 8);
    }

    #[test]
    fn test_short_frame_dropped() {
        let (result, _) = validate(&[1, 0x03, 0x00], true);
        assert_eq!(result, Validation::Drop);
    }

    #[test]
    fn test_bad_crc_dropped() {
        let (result, _) = validate(&[1, 0x03, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00], false);
        assert_eq!(result, Validation::Drop);
    }

    #[test]
    fn test_unknown_function_is_exception() {
        let (result, _) = validate(&[1, 0x2B, 0x0E, 0x01], true);
        assert_eq!(
            result,
            Validation::Exception(ExceptionCode::IllegalFunction)
        );

        // Corrupted unknown function stays silent
        let (result, _) = validate(&[1, 0x2B, 0x0E, 0x01, 0x00, 0x00], false);
        assert_eq!(result, Validation::Drop);
    }

    #[test]
    fn test_broadcast_read_dropped() {
        let (result, _) = validate(&[0, 0x03, 0x00, 0x00, 0x00, 0x01], true);
        assert_eq!(result, Validation::Drop);
        let (result, _) = validate(&[0, 0x07], true);
        assert_eq!(result, Validation::Drop);
    }

    #[test]
    fn test_broadcast_write_accepted() {
        let (result, _) = validate(&[0, 0x06, 0x00, 0x01, 0x00, 0x03], true);
        assert_eq!(
            result,
            Validation::Accept(FunctionCode::WriteSingleRegister.descriptor())
        );
    }

    #[test]
    fn test_byte_counted_length() {
        // Two registers, byte count 4
        let (result, len) = validate(
            &[1, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A, 0x01, 0x02],
            true,
        );
        assert!(matches!(result, Validation::Accept(_)));
        assert_eq!(len, 13);

        // Declared byte count larger than what arrived
        let (result, _) = validate(&[1, 0x10, 0x00, 0x01, 0x00, 0x02, 0x04, 0x00, 0x0A], true);
        assert_eq!(result, Validation::Drop);
    }

    #[test]
    fn test_irrelevant_address_dropped() {
        let (result, _) = validate(&[7, 0x01, 0x00, 0x00, 0x00, 0x01], true);
        assert_eq!(result, Validation::Drop);
    }
}
