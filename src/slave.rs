//! # Slave Engine
//!
//! [`Slave`] owns the request and response buffers, the silence timers and
//! the unit registry. The application calls [`Slave::poll`] from its main loop
//! as often as it can; every call does a bounded amount of work and returns.
//!
//! ## Poll cycle
//!
//! ```text
//!   ┌──────────── transmitting? ──── yes ──▶ write_response ──▶ return
//!   │ no
//!   ▼
//! read_request ── frame not complete ──▶ return 0
//!   │ complete
//!   ▼
//! validate_request ── noise ──▶ drop, return 0
//!   │            └─── unsupported function ──▶ report_exception
//!   ▼
//! create_response ── handler exception ──▶ report_exception
//!   │ ok
//!   ▼
//! write_response
//! ```
//!
//! The stages live in `reader`, `validator`, `dispatcher` and `writer`.
//!
//! ## Example
//!
//! ```rust
//! use modbus_rtu_slave::crc::append_crc;
//! use modbus_rtu_slave::testing::{ManualClock, MemoryTransport};
//! use modbus_rtu_slave::{Category, Slave, SlaveConfig, Unit, UnitRegistry};
//!
//! let unit = Unit::new(0x11).unwrap().with_handler(Category::ReadHoldingRegisters, |req| {
//!     for offset in 0..req.quantity() {
//!         req.write_register(offset, req.start_address() + offset)?;
//!     }
//!     Ok(())
//! });
//! let units = UnitRegistry::new().with_unit(unit).unwrap();
//!
//! let wire = MemoryTransport::new();
//! let clock = ManualClock::new();
//! let mut slave = Slave::new(SlaveConfig::default(), units, wire.clone(), clock.clone()).unwrap();
//!
//! let mut request = vec![0x11, 0x03, 0x00, 0x6B, 0x00, 0x02];
//! append_crc(&mut request);
//!
//! clock.advance(10_000);
//! wire.push_rx(&request);
//! slave.poll().unwrap();
//! clock.advance(1_000);
//! slave.poll().unwrap();
//!
//! assert_eq!(&wire.take_tx()[..7], &[0x11, 0x03, 0x04, 0x00, 0x6B, 0x00, 0x6C]);
//! ```

use crate::buffer::{RequestBuffer, ResponseBuffer};
use crate::config::SlaveConfig;
use crate::constants::BROADCAST_ADDRESS;
use crate::error::{ModbusError, ModbusResult};
use crate::logging::{EventObserver, SlaveEvent};
use crate::timing::Timing;
use crate::transport::{Clock, NoTxEnable, Transport, TxEnable};
use crate::unit::UnitRegistry;
use crate::validator::Validation;

/// Counters accumulated since the slave was created
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SlaveStats {
    /// Every byte read from the transport, discarded noise included
    pub bytes_received: u64,
    /// Every byte handed to the transport
    pub bytes_sent: u64,
    /// Frames delimited by silence with at least the minimum size
    pub frames_received: u64,
    /// Frames dropped as noise: too short, bad CRC or overflowing the buffer
    pub frames_dropped: u64,
    /// Requests passed to the unit handlers
    pub requests_dispatched: u64,
    /// Exception responses queued
    pub exceptions_sent: u64,
    /// Responses fully transmitted
    pub responses_sent: u64,
    /// Broadcast requests processed without a response
    pub broadcasts: u64,
}

/// Non-blocking Modbus RTU slave
///
/// `T` is the byte stream, `C` the microsecond clock and `P` the optional
/// RS485 driver-enable output.
pub struct Slave<T, C, P = NoTxEnable> {
    pub(crate) transport: T,
    pub(crate) clock: C,
    pub(crate) tx_enable: P,
    pub(crate) units: UnitRegistry,
    pub(crate) config: SlaveConfig,
    pub(crate) request: RequestBuffer,
    pub(crate) response: ResponseBuffer,
    pub(crate) timing: Timing,
    /// Transmit FIFO size sampled at startup, 0 selects blocking writes
    pub(crate) tx_capacity: usize,
    pub(crate) stats: SlaveStats,
    observer: Option<Box<dyn EventObserver + Send>>,
}

impl<T: Transport, C: Clock> Slave<T, C, NoTxEnable> {
    /// Create a slave without a driver-enable line
    ///
    /// # Errors
    ///
    /// Fails on an invalid configuration, an empty unit registry or a
    /// transport that cannot be flushed.
    pub fn new(
        config: SlaveConfig,
        units: UnitRegistry,
        transport: T,
        clock: C,
    ) -> ModbusResult<Self> {
        Slave::with_tx_enable(config, units, transport, clock, NoTxEnable)
    }
}

impl<T: Transport, C: Clock, P: TxEnable> Slave<T, C, P> {
    /// Create a slave driving `tx_enable` high while it transmits
    pub fn with_tx_enable(
        config: SlaveConfig,
        units: UnitRegistry,
        mut transport: T,
        clock: C,
        mut tx_enable: P,
    ) -> ModbusResult<Self> {
        config.validate()?;
        if units.is_empty() {
            return Err(ModbusError::config("at least one unit must be configured"));
        }

        tx_enable.set_transmitting(false);
        transport.flush()?;
        let tx_capacity = transport.available_for_write()?;
        let timing = Timing::new(config.baud_rate, clock.micros());

        Ok(Self {
            transport,
            clock,
            tx_enable,
            units,
            config,
            request: RequestBuffer::new(config.buffer_capacity),
            response: ResponseBuffer::new(config.buffer_capacity),
            timing,
            tx_capacity,
            stats: SlaveStats::default(),
            observer: None,
        })
    }

    /// Run one step of the receive/respond cycle
    ///
    /// Returns the number of response bytes written during this call. Protocol
    /// problems never surface here; only transport failures do.
    pub fn poll(&mut self) -> ModbusResult<usize> {
        if self.response.is_writing() {
            return self.write_response();
        }

        if !self.read_request()? {
            return Ok(0);
        }

        let (address, function_code) =
            match (self.request.address(), self.request.function_code()) {
                (Some(address), Some(code)) => (address, code),
                _ => return Ok(0),
            };
        self.response.begin(address, function_code);

        let descriptor = match self.validate_request() {
            Validation::Accept(descriptor) => descriptor,
            Validation::Drop => {
                self.response.reset();
                return Ok(0);
            }
            Validation::Exception(code) => return self.report_exception(code),
        };

        match self.create_response(descriptor) {
            Ok(()) => self.write_response(),
            Err(code) => self.report_exception(code),
        }
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Function code of the buffered request, once it is complete
    pub fn request_function_code(&self) -> Option<u8> {
        if self.request.is_complete() {
            self.request.function_code()
        } else {
            None
        }
    }

    /// Unit address of the buffered request, once it is complete
    pub fn request_unit_address(&self) -> Option<u8> {
        if self.request.is_complete() {
            self.request.address()
        } else {
            None
        }
    }

    /// Whether the buffered request was sent to the broadcast address
    pub fn is_broadcast(&self) -> bool {
        self.request.address() == Some(BROADCAST_ADDRESS)
    }

    /// True while a response is queued or going out
    pub fn is_transmitting(&self) -> bool {
        self.response.is_writing()
    }

    /// Bytes handed to the transport since creation
    pub fn total_bytes_sent(&self) -> u64 {
        self.stats.bytes_sent
    }

    /// Bytes read from the transport since creation, noise included
    pub fn total_bytes_received(&self) -> u64 {
        self.stats.bytes_received
    }

    /// Snapshot of the counters
    pub fn stats(&self) -> SlaveStats {
        self.stats
    }

    /// Configuration the slave was created with
    pub fn config(&self) -> &SlaveConfig {
        &self.config
    }

    /// Half-character time in microseconds
    pub fn half_char_time_us(&self) -> u64 {
        self.timing.half_char_us()
    }

    /// The underlying byte stream
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the byte stream
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The clock driving the silence timers
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// The hosted units
    pub fn units(&self) -> &UnitRegistry {
        &self.units
    }

    /// Registry access, e.g. to re-address a unit at runtime
    pub fn units_mut(&mut self) -> &mut UnitRegistry {
        &mut self.units
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Install an event observer, replacing any previous one
    pub fn set_observer<O>(&mut self, observer: O)
    where
        O: EventObserver + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
    }

    /// Builder form of [`Slave::set_observer`]
    pub fn with_observer<O>(mut self, observer: O) -> Self
    where
        O: EventObserver + Send + 'static,
    {
        self.set_observer(observer);
        self
    }

    /// Remove the event observer
    pub fn clear_observer(&mut self) {
        self.observer = None;
    }

    #[inline]
    pub(crate) fn emit(&mut self, event: SlaveEvent) {
        if let Some(observer) = self.observer.as_mut() {
            observer.on_event(&event);
        }
    }
}

impl<T, C, P> std::fmt::Debug for Slave<T, C, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slave")
            .field("units", &self.units)
            .field("config", &self.config)
            .field("timing", &self.timing)
            .field("tx_capacity", &self.tx_capacity)
            .field("stats", &self.stats)
            .field("transmitting", &self.response.is_writing())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crc::append_crc;
    use crate::function::Category;
    use crate::testing::{ManualClock, MemoryTransport, RecordingTxEnable};
    use crate::unit::Unit;
    use std::sync::{Arc, Mutex};

    const SETTLE_US: u64 = 10_000;
    const GAP_US: u64 = 1_000;

    fn frame(bytes: &[u8]) -> Vec<u8> {
        let mut frame = bytes.to_vec();
        append_crc(&mut frame);
        frame
    }

    fn registry() -> UnitRegistry {
        let unit = Unit::new(0x11)
            .unwrap()
            .with_handler(Category::ReadHoldingRegisters, |req| {
                req.write_registers(0, &[0x1234, 0x5678])
            });
        UnitRegistry::new().with_unit(unit).unwrap()
    }

    #[test]
    fn test_new_rejects_empty_registry() {
        let err = Slave::new(
            SlaveConfig::default(),
            UnitRegistry::new(),
            MemoryTransport::new(),
            ManualClock::new(),
        )
        .unwrap_err();
        assert!(matches!(err, ModbusError::Config { .. }));
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        let result = Slave::new(
            SlaveConfig::new().with_baud_rate(0),
            registry(),
            MemoryTransport::new(),
            ManualClock::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_begin_initializes_line() {
        let wire = MemoryTransport::with_tx_capacity(64);
        let pin = RecordingTxEnable::new();
        let slave = Slave::with_tx_enable(
            SlaveConfig::new().with_baud_rate(9600),
            registry(),
            wire.clone(),
            ManualClock::starting_at(500),
            pin.clone(),
        )
        .unwrap();

        assert_eq!(pin.history(), vec![false]);
        assert_eq!(wire.flush_count(), 1);
        assert_eq!(slave.tx_capacity, 64);
        assert_eq!(slave.half_char_time_us(), 520);
        assert_eq!(slave.timing.last_communication(), 500 + 520 * 7);
    }

    #[test]
    fn test_request_introspection_waits_for_complete_frame() {
        let wire = MemoryTransport::new();
        let clock = ManualClock::new();
        let mut slave =
            Slave::new(SlaveConfig::default(), registry(), wire.clone(), clock.clone()).unwrap();

        clock.advance(SETTLE_US);
        wire.push_rx(&frame(&[0x11, 0x2B, 0x0E, 0x01]));
        slave.poll().unwrap();
        assert_eq!(slave.request_function_code(), None);
        assert_eq!(slave.request_unit_address(), None);

        clock.advance(GAP_US);
        slave.poll().unwrap();
        assert_eq!(slave.request_function_code(), Some(0x2B));
        assert_eq!(slave.request_unit_address(), Some(0x11));
        assert!(!slave.is_broadcast());
    }

    #[test]
    fn test_observer_sees_the_cycle() {
        let wire = MemoryTransport::new();
        let clock = ManualClock::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut slave = Slave::new(SlaveConfig::default(), registry(), wire.clone(), clock.clone())
            .unwrap()
            .with_observer(move |event: &SlaveEvent| sink.lock().unwrap().push(*event));

        clock.advance(SETTLE_US);
        wire.push_rx(&frame(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x02]));
        slave.poll().unwrap();
        clock.advance(GAP_US);
        slave.poll().unwrap();
        clock.advance(GAP_US);
        slave.poll().unwrap();

        let events = events.lock().unwrap();
        assert_eq!(events.first(), Some(&SlaveEvent::FrameStarted));
        assert!(events.contains(&SlaveEvent::FrameReceived { len: 8 }));
        assert!(events.contains(&SlaveEvent::TransmitStarted { len: 9 }));
        assert_eq!(events.last(), Some(&SlaveEvent::TransmitComplete { len: 9 }));
    }

    #[test]
    fn test_clear_observer_stops_events() {
        let wire = MemoryTransport::new();
        let clock = ManualClock::new();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let mut slave = Slave::new(SlaveConfig::default(), registry(), wire.clone(), clock.clone())
            .unwrap()
            .with_observer(move |event: &SlaveEvent| sink.lock().unwrap().push(*event));

        clock.advance(SETTLE_US);
        wire.push_rx(&frame(&[0x11, 0x03, 0x00, 0x6B, 0x00, 0x02]));
        slave.poll().unwrap();
        let seen = events.lock().unwrap().len();
        assert!(seen > 0);

        slave.clear_observer();
        clock.advance(GAP_US);
        slave.poll().unwrap();
        clock.advance(GAP_US);
        slave.poll().unwrap();
        assert_eq!(events.lock().unwrap().len(), seen);
        assert_eq!(slave.stats().responses_sent, 1);
    }

    #[test]
    fn test_transport_errors_propagate() {
        let wire = MemoryTransport::new();
        let mut slave =
            Slave::new(SlaveConfig::default(), registry(), wire.clone(), ManualClock::new())
                .unwrap();
        wire.set_failing(true);
        assert!(slave.poll().unwrap_err().is_transport_error());
        wire.set_failing(false);
        assert_eq!(slave.poll().unwrap(), 0);
    }
}
