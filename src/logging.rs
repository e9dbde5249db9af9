//! Diagnostics hook for the slave engine
//!
//! Protocol code never logs on its own. It reports what happened as a
//! [`SlaveEvent`] to an optional [`EventObserver`]; [`TracingObserver`]
//! forwards those events to `tracing`, and any `FnMut(&SlaveEvent)` closure
//! works as an observer too.
//!
//! # Example
//!
//! ```rust
//! use modbus_rtu_slave::logging::{EventObserver, SlaveEvent};
//!
//! let mut dropped = 0;
//! let mut observer = |event: &SlaveEvent| {
//!     if matches!(event, SlaveEvent::CrcMismatch { .. }) {
//!         dropped += 1;
//!     }
//! };
//! observer.on_event(&SlaveEvent::CrcMismatch { address: 1, len: 8 });
//! assert_eq!(dropped, 1);
//! ```

use tracing::{debug, trace, warn};

use crate::function::{ExceptionCode, FunctionCode};

/// Something the engine did or observed on the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlaveEvent {
    /// Silence was observed and a new frame started accumulating
    FrameStarted,
    /// A byte arrived before the inter-frame silence and was dropped
    BytesDiscarded { count: usize },
    /// The frame is addressed to a unit this device does not host
    AddressIgnored { address: u8 },
    /// The request buffer filled up before the frame ended
    BufferOverflow { capacity: usize },
    /// A complete frame was delimited by silence
    FrameReceived { len: usize },
    /// The frame is shorter than its function code requires
    FrameTooShort { expected: usize, actual: usize },
    /// The trailing CRC does not match the frame
    CrcMismatch { address: u8, len: usize },
    /// A read request was broadcast and dropped
    BroadcastReadIgnored { function: FunctionCode },
    /// The function code is not supported
    IllegalFunction { address: u8, code: u8 },
    /// A valid request was handed to the unit handlers
    RequestDispatched {
        address: u8,
        function: FunctionCode,
        start: u16,
        quantity: u16,
    },
    /// An exception response was queued
    Exception {
        address: u8,
        function: u8,
        code: ExceptionCode,
    },
    /// A broadcast was processed; no response goes out
    BroadcastSuppressed,
    /// The first byte of a response is about to be written
    TransmitStarted { len: usize },
    /// A chunk of the response was accepted by the transport
    BytesSent { count: usize },
    /// The response left the line and the post-frame silence passed
    TransmitComplete { len: usize },
    /// The transport failed mid-response; `sent` of `len` bytes went out
    TransmitAborted { sent: usize, len: usize },
}

/// Receiver of [`SlaveEvent`]s
pub trait EventObserver {
    fn on_event(&mut self, event: &SlaveEvent);
}

impl<F> EventObserver for F
where
    F: FnMut(&SlaveEvent),
{
    fn on_event(&mut self, event: &SlaveEvent) {
        self(event)
    }
}

/// Observer forwarding events to `tracing`
///
/// Byte-level events go out at `TRACE`, frame-level events at `DEBUG`,
/// buffer overflows and aborted responses at `WARN`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingObserver;

impl TracingObserver {
    pub fn new() -> Self {
        Self
    }
}

impl EventObserver for TracingObserver {
    fn on_event(&mut self, event: &SlaveEvent) {
        match *event {
            SlaveEvent::FrameStarted => trace!("frame started"),
            SlaveEvent::BytesDiscarded { count } => trace!(count, "discarded bytes before silence"),
            SlaveEvent::BytesSent { count } => trace!(count, "sent bytes"),
            SlaveEvent::AddressIgnored { address } => {
                debug!(address, "frame for another device ignored")
            }
            SlaveEvent::BufferOverflow { capacity } => {
                warn!(capacity, "request overflowed the receive buffer, frame dropped")
            }
            SlaveEvent::FrameReceived { len } => debug!(len, "frame received"),
            SlaveEvent::FrameTooShort { expected, actual } => {
                debug!(expected, actual, "frame too short, dropped")
            }
            SlaveEvent::CrcMismatch { address, len } => {
                debug!(address, len, "CRC mismatch, frame dropped")
            }
            SlaveEvent::BroadcastReadIgnored { function } => {
                debug!(function = function.description(), "broadcast read ignored")
            }
            SlaveEvent::IllegalFunction { address, code } => {
                debug!(address, code, "unsupported function code")
            }
            SlaveEvent::RequestDispatched {
                address,
                function,
                start,
                quantity,
            } => debug!(
                address,
                function = function.description(),
                start,
                quantity,
                "request dispatched"
            ),
            SlaveEvent::Exception {
                address,
                function,
                code,
            } => debug!(address, function, code = %code, "exception response"),
            SlaveEvent::BroadcastSuppressed => debug!("broadcast processed, no response"),
            SlaveEvent::TransmitStarted { len } => debug!(len, "transmit started"),
            SlaveEvent::TransmitComplete { len } => debug!(len, "transmit complete"),
            SlaveEvent::TransmitAborted { sent, len } => {
                warn!(sent, len, "transport failed, response abandoned")
            }
        }
    }
}
