//! # Slave Configuration
//!
//! Serial timing, buffer sizes and per-request quantity limits for a slave.
//!
//! ## Modbus Specification Limits
//!
//! - **Read Holding/Input Registers (FC03/04)**: Max 125 registers per request
//! - **Read Coils/Discrete Inputs (FC01/02)**: Max 2000 bits per request
//! - **Write Multiple Registers (FC16)**: Max 123 registers per request
//! - **Write Multiple Coils (FC15)**: Max 1968 coils per request
//!
//! Requests above the configured limits are answered with an
//! Illegal Data Value exception. Small devices may lower them.

use crate::constants::{
    MAX_ADU_SIZE, MAX_READ_COILS, MAX_READ_REGISTERS, MAX_WRITE_COILS, MAX_WRITE_REGISTERS,
    MIN_FRAME_SIZE,
};
use crate::error::{ModbusError, ModbusResult};
use crate::timing::half_char_time_us;

/// Default serial baud rate.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// Slave configuration.
///
/// # Example
///
/// ```rust
/// use modbus_rtu_slave::SlaveConfig;
///
/// let config = SlaveConfig::new()
///     .with_baud_rate(9600)
///     .with_max_read_registers(32);
///
/// assert_eq!(config.half_char_time_us(), 520);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlaveConfig {
    /// Serial line baud rate, drives every silence timer.
    pub baud_rate: u32,
    /// Capacity of the request and response buffers in bytes.
    pub buffer_capacity: usize,
    /// Maximum registers per read request.
    pub max_read_registers: u16,
    /// Maximum registers per write request.
    pub max_write_registers: u16,
    /// Maximum coils or discrete inputs per read request.
    pub max_read_coils: u16,
    /// Maximum coils per write request.
    pub max_write_coils: u16,
}

impl SlaveConfig {
    /// Create a configuration with default (Modbus spec) values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Set the request/response buffer capacity.
    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }

    /// Set maximum read registers.
    pub fn with_max_read_registers(mut self, count: u16) -> Self {
        self.max_read_registers = count;
        self
    }

    /// Set maximum write registers.
    pub fn with_max_write_registers(mut self, count: u16) -> Self {
        self.max_write_registers = count;
        self
    }

    /// Set maximum read coils.
    pub fn with_max_read_coils(mut self, count: u16) -> Self {
        self.max_read_coils = count;
        self
    }

    /// Set maximum write coils.
    pub fn with_max_write_coils(mut self, count: u16) -> Self {
        self.max_write_coils = count;
        self
    }

    /// Half-character time for the configured baud rate, in microseconds.
    pub fn half_char_time_us(&self) -> u64 {
        half_char_time_us(self.baud_rate)
    }

    /// Check if a register read is within limits.
    pub fn is_read_within_limits(&self, register_count: u16) -> bool {
        register_count <= self.max_read_registers
    }

    /// Check if a register write is within limits.
    pub fn is_write_within_limits(&self, register_count: u16) -> bool {
        register_count <= self.max_write_registers
    }

    /// Check if a coil read is within limits.
    pub fn is_coil_read_within_limits(&self, coil_count: u16) -> bool {
        coil_count <= self.max_read_coils
    }

    /// Check if a coil write is within limits.
    pub fn is_coil_write_within_limits(&self, coil_count: u16) -> bool {
        coil_count <= self.max_write_coils
    }

    /// Reject configurations the engine cannot run with.
    pub fn validate(&self) -> ModbusResult<()> {
        if self.baud_rate == 0 {
            return Err(ModbusError::config("baud rate must be positive"));
        }
        if !(MIN_FRAME_SIZE..=MAX_ADU_SIZE).contains(&self.buffer_capacity) {
            return Err(ModbusError::config(format!(
                "buffer capacity {} outside {}..={}",
                self.buffer_capacity, MIN_FRAME_SIZE, MAX_ADU_SIZE
            )));
        }
        if self.max_read_registers > MAX_READ_REGISTERS
            || self.max_write_registers > MAX_WRITE_REGISTERS
            || self.max_read_coils > MAX_READ_COILS
            || self.max_write_coils > MAX_WRITE_COILS
        {
            return Err(ModbusError::config(
                "quantity limits exceed the Modbus specification",
            ));
        }
        Ok(())
    }
}

impl Default for SlaveConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            buffer_capacity: MAX_ADU_SIZE,
            max_read_registers: MAX_READ_REGISTERS,
            max_write_registers: MAX_WRITE_REGISTERS,
            max_read_coils: MAX_READ_COILS,
            max_write_coils: MAX_WRITE_COILS,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
