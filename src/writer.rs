//! Frame writer
//!
//! Sends the response without blocking. Transmission starts only once the
//! line has been quiet for 1.5T after the request, and the driver-enable line
//! is released only after the last byte has left and another 1.5T passed.
//!
//! Two write strategies, chosen from the transmit capacity sampled at startup:
//!
//! - **Chunked**: write what fits in the transport's FIFO, come back on the
//!   next poll, flush once the FIFO reports empty.
//! - **Blocking**: the transport cannot report free space, so the whole
//!   response is written and flushed in one call.

use crate::constants::MIN_FRAME_SIZE;
use crate::error::ModbusResult;
use crate::function::ExceptionCode;
use crate::logging::SlaveEvent;
use crate::slave::Slave;
use crate::transport::{Clock, Transport, TxEnable};

impl<T: Transport, C: Clock, P: TxEnable> Slave<T, C, P> {
    /// Replace the response with an exception frame and start sending it
    ///
    /// Broadcast requests are never answered, exceptions included.
    pub(crate) fn report_exception(&mut self, code: ExceptionCode) -> ModbusResult<usize> {
        if self.is_broadcast() {
            self.response.reset();
            self.emit(SlaveEvent::BroadcastSuppressed);
            return Ok(0);
        }

        let address = self.request.address().unwrap_or_default();
        let function = self.request.function_code().unwrap_or_default();
        self.response.set_exception(code.to_u8());
        self.stats.exceptions_sent += 1;
        self.emit(SlaveEvent::Exception {
            address,
            function,
            code,
        });
        self.write_response()
    }

    /// Push the pending response towards the transport
    ///
    /// Returns the number of bytes written during this call. A transport
    /// failure abandons the response and releases the driver-enable line
    /// before the error is returned.
    pub(crate) fn write_response(&mut self) -> ModbusResult<usize> {
        match self.transmit() {
            Ok(written) => Ok(written),
            Err(e) => {
                self.abort_transmission();
                Err(e)
            }
        }
    }

    fn transmit(&mut self) -> ModbusResult<usize> {
        if !self.response.is_writing()
            && self.response.cursor() == 0
            && self.response.len() >= MIN_FRAME_SIZE
        {
            self.response.set_writing(true);
        }

        if !self.response.is_writing() || self.is_broadcast() {
            if self.response.is_writing() {
                self.emit(SlaveEvent::BroadcastSuppressed);
            }
            self.response.reset();
            return Ok(0);
        }

        if !self.response.is_sealed() {
            if !self.timing.silence_elapsed(self.clock.micros()) {
                return Ok(0);
            }
            self.response.seal();
            self.tx_enable.set_transmitting(true);
            self.emit(SlaveEvent::TransmitStarted {
                len: self.response.len(),
            });
        }

        let written = if self.tx_capacity > 0 {
            let room = self.transport.available_for_write()?;
            let count = room.min(self.response.pending().len());
            let written = if count > 0 {
                self.transport
                    .write_from(&self.response.pending()[..count])?
            } else {
                0
            };
            self.record_sent(written);

            if self.transport.available_for_write()? < self.tx_capacity {
                self.timing.touch(self.clock.micros());
                return Ok(written);
            }
            self.transport.flush()?;
            written
        } else if !self.response.pending().is_empty() {
            let written = self.transport.write_from(self.response.pending())?;
            self.transport.flush()?;
            self.record_sent(written);
            self.timing.touch(self.clock.micros());
            written
        } else {
            0
        };

        if self.response.is_sent() && self.timing.silence_elapsed(self.clock.micros()) {
            let len = self.response.len();
            self.tx_enable.set_transmitting(false);
            self.stats.responses_sent += 1;
            self.emit(SlaveEvent::TransmitComplete { len });
            self.response.reset();
        }

        Ok(written)
    }

    fn abort_transmission(&mut self) {
        if !self.response.is_writing() {
            return;
        }
        if self.response.is_sealed() {
            self.tx_enable.set_transmitting(false);
        }
        let sent = self.response.cursor();
        let len = self.response.len();
        self.response.reset();
        self.emit(SlaveEvent::TransmitAborted { sent, len });
    }

    fn record_sent(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        self.response.advance(count);
        self.stats.bytes_sent += count as u64;
        self.emit(SlaveEvent::BytesSent { count });
    }
}
