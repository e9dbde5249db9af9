//! # Modbus RTU Slave - Non-blocking Serial Slave Engine
//!
//! A poll-driven Modbus RTU slave for serial lines and RS485 buses. The
//! engine never blocks: the application calls [`Slave::poll`] from its loop
//! (or lets [`driver::run`] do it on tokio) and the slave receives, validates,
//! dispatches and answers requests a little at a time.
//!
//! ## Features
//!
//! - **Silence framing**: frames are delimited by 1.5 character times of line
//!   silence, computed from the baud rate
//! - **Multiple units**: one device can answer for several unit addresses,
//!   each with its own handler table
//! - **Broadcast**: address 0 reaches every unit and is never answered
//! - **RS485**: optional driver-enable line asserted only while transmitting
//! - **Chunked transmit**: honours the transport's free FIFO space, with a
//!   blocking fallback for transports that cannot report it
//! - **Fixed memory**: request and response buffers are `heapless` vectors
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Handler category | Broadcast |
//! |------|----------|------------------|-----------|
//! | 0x01 | Read Coils | `ReadCoils` | ❌ |
//! | 0x02 | Read Discrete Inputs | `ReadDiscreteInputs` | ❌ |
//! | 0x03 | Read Holding Registers | `ReadHoldingRegisters` | ❌ |
//! | 0x04 | Read Input Registers | `ReadInputRegisters` | ❌ |
//! | 0x05 | Write Single Coil | `WriteCoils` | ✅ |
//! | 0x06 | Write Single Register | `WriteHoldingRegisters` | ✅ |
//! | 0x07 | Read Exception Status | `ReadExceptionStatus` | ❌ |
//! | 0x0F | Write Multiple Coils | `WriteCoils` | ✅ |
//! | 0x10 | Write Multiple Registers | `WriteHoldingRegisters` | ✅ |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modbus_rtu_slave::{Category, ModbusResult, Slave, SlaveConfig, StdClock, Unit, UnitRegistry};
//! # use modbus_rtu_slave::testing::MemoryTransport;
//!
//! fn main() -> ModbusResult<()> {
//!     let mut registers = [0u16; 16];
//!     registers[0] = 230;
//!
//!     let unit = Unit::new(1)?
//!         .with_handler(Category::ReadHoldingRegisters, move |req| {
//!             for offset in 0..req.quantity() {
//!                 let address = (req.start_address() + offset) as usize;
//!                 let value = registers.get(address).copied().unwrap_or(0);
//!                 req.write_register(offset, value)?;
//!             }
//!             Ok(())
//!         });
//!
//!     let units = UnitRegistry::new().with_unit(unit)?;
//!     # let port = MemoryTransport::new();
//!     let mut slave = Slave::new(SlaveConfig::new().with_baud_rate(9600), units, port, StdClock::new())?;
//!
//!     loop {
//!         slave.poll()?;
//!     }
//! }
//! ```

// ============================================================================
// Core modules
// ============================================================================

/// Core error types and result handling
pub mod error;

/// Modbus protocol constants based on official specification
pub mod constants;

/// Modbus CRC-16
pub mod crc;

/// Function codes, handler categories and exception codes
pub mod function;

/// Fixed-capacity request and response buffers
pub mod buffer;

/// Silence timers derived from the baud rate
pub mod timing;

/// Slave configuration and protocol limits
pub mod config;

/// Transport, clock and driver-enable abstractions
pub mod transport;

/// Event hook for diagnostics
pub mod logging;

// ============================================================================
// Slave engine
// ============================================================================

/// Units and the unit registry
pub mod unit;

/// Buffer accessors handed to handlers
pub mod exchange;

/// The slave engine and its counters
pub mod slave;

mod dispatcher;
mod reader;
mod validator;
mod writer;

/// Async poll loop on tokio
#[cfg(feature = "std")]
pub mod driver;

/// In-memory transport, manual clock and recording pin
pub mod testing;

// ============================================================================
// Re-exports for convenience
// ============================================================================

// === Async runtime (users can use modbus_rtu_slave::tokio) ===
#[cfg(feature = "std")]
pub use tokio;

// === Error handling ===
pub use error::{ModbusError, ModbusResult};

// === Core types ===
pub use config::SlaveConfig;
pub use exchange::Exchange;
pub use function::{Category, ExceptionCode, FunctionCode, HandlerResult};
pub use slave::{Slave, SlaveStats};
pub use unit::{Handler, Unit, UnitRegistry};

// === Collaborators ===
pub use transport::{Clock, NoTxEnable, StdClock, Transport, TxEnable};

#[cfg(feature = "rtu")]
pub use transport::SerialTransport;

// === Diagnostics ===
pub use logging::{EventObserver, SlaveEvent, TracingObserver};

// === Protocol limits (commonly needed constants) ===
pub use constants::{
    BROADCAST_ADDRESS, MAX_ADU_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library information
pub fn info() -> String {
    format!("Modbus RTU Slave v{} - non-blocking serial slave engine", VERSION)
}
