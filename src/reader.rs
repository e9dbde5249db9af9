//! Frame reader
//!
//! Accumulates request bytes without blocking. A frame starts after 1.5T of
//! silence and ends at the next 1.5T of silence. Bytes arriving before the
//! line has been quiet are noise from a frame we joined midway and are dropped
//! one per call, each pushing the silence timer forward.

use crate::constants::{ADDRESS_INDEX, MIN_FRAME_SIZE};
use crate::error::ModbusResult;
use crate::logging::SlaveEvent;
use crate::slave::Slave;
use crate::transport::{Clock, Transport, TxEnable};

impl<T: Transport, C: Clock, P: TxEnable> Slave<T, C, P> {
    /// Pull available bytes into the request buffer
    ///
    /// Returns `true` exactly once per frame: on the call that observes the
    /// closing silence, provided at least the minimum frame was buffered.
    /// Frames cut short by an overflow or an irrelevant address never
    /// complete.
    pub(crate) fn read_request(&mut self) -> ModbusResult<bool> {
        let available = self.transport.available()?;
        let now = self.clock.micros();

        if available == 0 {
            if !self.request.is_reading() || !self.timing.silence_elapsed(now) {
                return Ok(false);
            }

            self.request.stop();
            let len = self.request.len();
            if len < MIN_FRAME_SIZE {
                self.stats.frames_dropped += 1;
                self.emit(SlaveEvent::FrameTooShort {
                    expected: MIN_FRAME_SIZE,
                    actual: len,
                });
                return Ok(false);
            }

            self.stats.frames_received += 1;
            self.emit(SlaveEvent::FrameReceived { len });
            return Ok(true);
        }

        if !self.request.is_reading() {
            if !self.timing.silence_elapsed(now) {
                let mut byte = [0u8; 1];
                let count = self.transport.read_into(&mut byte)?;
                self.stats.bytes_received += count as u64;
                self.timing.touch(now);
                self.emit(SlaveEvent::BytesDiscarded { count });
                return Ok(false);
            }

            self.request.start();
            self.emit(SlaveEvent::FrameStarted);
        }

        if self.request.is_full() {
            self.request.stop();
            self.stats.frames_dropped += 1;
            self.emit(SlaveEvent::BufferOverflow {
                capacity: self.request.capacity(),
            });
            self.timing.touch(now);
            return Ok(false);
        }

        let first_chunk = self.request.is_empty();
        let count = self.request.fill_from(&mut self.transport, available)?;
        self.stats.bytes_received += count as u64;
        self.timing.touch(now);

        if first_chunk {
            if let Some(address) = self.request.byte(ADDRESS_INDEX) {
                if !self.units.is_relevant(address) {
                    self.request.stop();
                    self.emit(SlaveEvent::AddressIgnored { address });
                }
            }
        }

        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use crate::config::SlaveConfig;
    use crate::function::Category;
    use crate::slave::Slave;
    use crate::testing::{ManualClock, MemoryTransport};
    use crate::unit::{Unit, UnitRegistry};

    // 19200 baud: 1.5T = 780 µs
    const SETTLE_US: u64 = 10_000;

    fn slave(
        capacity: usize,
    ) -> (
        Slave<MemoryTransport, ManualClock>,
        MemoryTransport,
        ManualClock,
    ) {
        let units = UnitRegistry::new()
            .with_unit(
                Unit::new(1)
                    .unwrap()
                    .with_handler(Category::ReadCoils, |_| Ok(())),
            )
            .unwrap();
        let wire = MemoryTransport::new();
        let clock = ManualClock::new();
        let slave = Slave::new(
            SlaveConfig::new().with_buffer_capacity(capacity),
            units,
            wire.clone(),
            clock.clone(),
        )
        .unwrap();
        clock.advance(SETTLE_US);
        (slave, wire, clock)
    }

    #[test]
    fn test_frame_completes_after_silence() {
        let (mut slave, wire, clock) = slave(256);
        wire.push_rx(&[1, 1, 0, 0, 0, 8]);
        assert!(!slave.read_request().unwrap());

        clock.advance(780);
        assert!(!slave.read_request().unwrap());

        clock.advance(1);
        assert!(slave.read_request().unwrap());
        assert_eq!(slave.request.as_slice(), &[1, 1, 0, 0, 0, 8]);

        // Completion is reported once
        assert!(!slave.read_request().unwrap());
        assert_eq!(slave.stats().frames_received, 1);
        assert_eq!(slave.total_bytes_received(), 6);
    }

    #[test]
    fn test_short_gaps_keep_one_frame() {
        let (mut slave, wire, clock) = slave(256);
        wire.push_rx(&[1, 1, 0]);
        slave.read_request().unwrap();
        clock.advance(500);
        wire.push_rx(&[0, 0, 8]);
        slave.read_request().unwrap();
        clock.advance(781);
        assert!(slave.read_request().unwrap());
        assert_eq!(slave.request.len(), 6);
    }

    #[test]
    fn test_noise_before_silence_is_discarded_bytewise() {
        let (mut slave, wire, clock) = slave(256);
        slave.timing.touch(SETTLE_US);
        wire.push_rx(&[0xAA, 0xBB]);

        assert!(!slave.read_request().unwrap());
        assert_eq!(wire.rx_len(), 1);
        clock.advance(100);
        assert!(!slave.read_request().unwrap());
        assert_eq!(wire.rx_len(), 0);
        assert!(!slave.request.is_reading());
        assert_eq!(slave.total_bytes_received(), 2);
    }

    #[test]
    fn test_irrelevant_address_stops_reading() {
        let (mut slave, wire, clock) = slave(256);
        wire.push_rx(&[9, 3, 0, 0, 0, 1, 0x84, 0x42]);
        slave.read_request().unwrap();
        assert!(!slave.request.is_reading());

        clock.advance(1_000);
        assert!(!slave.read_request().unwrap());
        assert_eq!(slave.stats().frames_received, 0);
    }

    #[test]
    fn test_overflow_never_completes() {
        let (mut slave, wire, clock) = slave(8);
        wire.push_rx(&[1, 1, 0, 0, 0, 8, 0, 0, 0, 0]);
        slave.read_request().unwrap();
        assert!(slave.request.is_full());

        clock.advance(100);
        slave.read_request().unwrap();
        assert!(!slave.request.is_reading());
        assert_eq!(slave.stats().frames_dropped, 1);

        clock.advance(100);
        slave.read_request().unwrap();
        clock.advance(100);
        slave.read_request().unwrap();
        assert_eq!(wire.rx_len(), 0);

        clock.advance(1_000);
        assert!(!slave.read_request().unwrap());
    }

    #[test]
    fn test_short_frame_is_dropped() {
        let (mut slave, wire, clock) = slave(256);
        wire.push_rx(&[1, 1, 0]);
        slave.read_request().unwrap();
        clock.advance(1_000);
        assert!(!slave.read_request().unwrap());
        assert_eq!(slave.stats().frames_dropped, 1);
    }
}
