//! In-memory collaborators for tests, benches and simulations
//!
//! - [`MemoryTransport`]: a shared duplex byte queue. Clones share the same
//!   wire, so a test keeps one handle while the slave owns another.
//! - [`ManualClock`]: a microsecond clock that only moves when told to.
//! - [`RecordingTxEnable`]: a driver-enable pin remembering every transition.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::{Buf, BufMut, BytesMut};

use crate::error::{ModbusError, ModbusResult};
use crate::transport::{Clock, Transport, TxEnable};

// ============================================================================
// MemoryTransport
// ============================================================================

#[derive(Debug, Default)]
struct Wire {
    /// Bytes sent by the master, waiting to be read by the slave
    rx: BytesMut,
    /// Bytes written by the slave
    tx: BytesMut,
    /// Size of the simulated transmit FIFO, 0 when unknown
    tx_capacity: usize,
    /// Bytes written but not yet shifted out of the FIFO
    tx_pending: usize,
    flushes: usize,
    fail_io: bool,
}

/// Duplex in-memory transport
///
/// With a transmit capacity configured, written bytes occupy a simulated
/// FIFO until [`MemoryTransport::drain_tx`] or a flush empties it, so the
/// slave sees partial writes the way it would on a UART.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    wire: Arc<Mutex<Wire>>,
}

impl MemoryTransport {
    /// Transport reporting an unknown transmit capacity
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport with a transmit FIFO of `capacity` bytes
    pub fn with_tx_capacity(capacity: usize) -> Self {
        let transport = Self::new();
        transport.lock().tx_capacity = capacity;
        transport
    }

    fn lock(&self) -> MutexGuard<'_, Wire> {
        self.wire.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue bytes as if the master had sent them
    pub fn push_rx(&self, bytes: &[u8]) {
        self.lock().rx.put_slice(bytes);
    }

    /// Bytes still waiting to be read
    pub fn rx_len(&self) -> usize {
        self.lock().rx.len()
    }

    /// Take everything the slave has written so far
    pub fn take_tx(&self) -> Vec<u8> {
        self.lock().tx.split().to_vec()
    }

    /// Number of bytes the slave has written and not yet taken
    pub fn tx_len(&self) -> usize {
        self.lock().tx.len()
    }

    /// Let the simulated FIFO shift out every pending byte
    pub fn drain_tx(&self) {
        self.lock().tx_pending = 0;
    }

    /// Number of flushes performed by the slave
    pub fn flush_count(&self) -> usize {
        self.lock().flushes
    }

    /// Make every subsequent operation fail until cleared
    pub fn set_failing(&self, failing: bool) {
        self.lock().fail_io = failing;
    }

    fn check(wire: &Wire) -> ModbusResult<()> {
        if wire.fail_io {
            Err(ModbusError::transport("simulated transport failure"))
        } else {
            Ok(())
        }
    }
}

impl Transport for MemoryTransport {
    fn available(&mut self) -> ModbusResult<usize> {
        let wire = self.lock();
        Self::check(&wire)?;
        Ok(wire.rx.len())
    }

    fn read_into(&mut self, buf: &mut [u8]) -> ModbusResult<usize> {
        let mut wire = self.lock();
        Self::check(&wire)?;
        let count = buf.len().min(wire.rx.len());
        wire.rx.copy_to_slice(&mut buf[..count]);
        Ok(count)
    }

    fn write_from(&mut self, buf: &[u8]) -> ModbusResult<usize> {
        let mut wire = self.lock();
        Self::check(&wire)?;
        let count = if wire.tx_capacity == 0 {
            buf.len()
        } else {
            buf.len().min(wire.tx_capacity - wire.tx_pending)
        };
        wire.tx.put_slice(&buf[..count]);
        if wire.tx_capacity > 0 {
            wire.tx_pending += count;
        }
        Ok(count)
    }

    fn available_for_write(&mut self) -> ModbusResult<usize> {
        let wire = self.lock();
        Self::check(&wire)?;
        Ok(wire.tx_capacity - wire.tx_pending)
    }

    fn flush(&mut self) -> ModbusResult<()> {
        let mut wire = self.lock();
        Self::check(&wire)?;
        wire.tx_pending = 0;
        wire.flushes += 1;
        Ok(())
    }
}

// ============================================================================
// ManualClock
// ============================================================================

/// Clock advanced explicitly by the test
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at `micros`
    pub fn starting_at(micros: u64) -> Self {
        let clock = Self::new();
        clock.set(micros);
        clock
    }

    pub fn advance(&self, micros: u64) {
        self.now.fetch_add(micros, Ordering::SeqCst);
    }

    pub fn set(&self, micros: u64) {
        self.now.store(micros, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn micros(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

// ============================================================================
// RecordingTxEnable
// ============================================================================

/// Driver-enable pin recording every level it is driven to
#[derive(Debug, Clone, Default)]
pub struct RecordingTxEnable {
    history: Arc<Mutex<Vec<bool>>>,
}

impl RecordingTxEnable {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<bool>> {
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Current level, low if the pin was never driven
    pub fn is_active(&self) -> bool {
        self.lock().last().copied().unwrap_or(false)
    }

    /// Every level driven so far, oldest first
    pub fn history(&self) -> Vec<bool> {
        self.lock().clone()
    }
}

impl TxEnable for RecordingTxEnable {
    fn set_transmitting(&mut self, active: bool) {
        self.lock().push(active);
    }
}
