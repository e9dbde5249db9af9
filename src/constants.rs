//! Modbus RTU protocol constants based on the official specification
//!
//! These constants are derived from the Modbus application protocol and the
//! Modbus over serial line specification:
//! - Maximum RTU ADU size: 256 bytes (address + 253-byte PDU + 2-byte CRC)
//! - Silence thresholds are expressed in half-character times so that 1.5T
//!   and 3.5T are both integer multiples

// ============================================================================
// Frame Layout Constants
// ============================================================================

/// Smallest possible RTU frame
/// Format: Address(1) + Function(1) + CRC(2) = 4 bytes
pub const MIN_FRAME_SIZE: usize = 4;

/// Length of the trailing CRC field
pub const CRC_LEN: usize = 2;

/// Index of the unit address byte
pub const ADDRESS_INDEX: usize = 0;

/// Index of the function code byte
pub const FUNCTION_CODE_INDEX: usize = 1;

/// Index of the first data byte
pub const DATA_INDEX: usize = 2;

/// Maximum PDU (Protocol Data Unit) size per Modbus specification
pub const MAX_PDU_SIZE: usize = 253;

/// Maximum RTU ADU size, also the default request/response buffer capacity
///
/// = 1 (Address) + 253 (Max PDU) + 2 (CRC) = 256 bytes
pub const MAX_ADU_SIZE: usize = 1 + MAX_PDU_SIZE + CRC_LEN;

// ============================================================================
// Unit Addresses
// ============================================================================

/// Broadcast address, processed by every unit and never answered
pub const BROADCAST_ADDRESS: u8 = 0;

/// Lowest assignable unit address
pub const UNIT_ADDRESS_MIN: u8 = 1;

/// Highest assignable unit address
pub const UNIT_ADDRESS_MAX: u8 = 247;

// ============================================================================
// Timing Constants
// ============================================================================

/// Half-character times making up the 1.5T inter-frame silence
pub const HALF_SILENCE_MULTIPLIER: u64 = 3;

/// Half-character times making up the 3.5T full silence
pub const FULL_SILENCE_MULTIPLIER: u64 = 7;

/// Above this baud rate the half-character time is fixed
pub const FIXED_TIMING_BAUD_THRESHOLD: u32 = 19_200;

/// Fixed half-character time used above 19200 baud (µs)
///
/// Gives the 750 µs / 1750 µs inter-character and inter-frame delays
/// recommended by the serial line specification.
pub const FIXED_HALF_CHAR_TIME_US: u64 = 250;

/// Microseconds per half character at 1 baud
///
/// A 10-bit character takes `10 * 1_000_000 / baud` µs, half of it is
/// `5_000_000 / baud`.
pub const HALF_CHAR_TIME_NUMERATOR: u64 = 5_000_000;

// ============================================================================
// Data Values
// ============================================================================

/// Write Single Coil value for ON
pub const COIL_ON: u16 = 0xFF00;

/// Write Single Coil value for OFF
pub const COIL_OFF: u16 = 0x0000;

/// Exception flag OR-ed into the function code of an exception response
pub const EXCEPTION_FLAG: u8 = 0x80;

// ============================================================================
// Quantity Limits
// ============================================================================

/// Maximum number of registers for FC03/FC04 (Read Holding/Input Registers)
///
/// - Function Code: 1 byte
/// - Byte Count: 1 byte
/// - Register Data: N × 2 bytes
/// - Therefore: N ≤ (253 - 2) / 2 = 125.5 → 125 registers
pub const MAX_READ_REGISTERS: u16 = 125;

/// Maximum number of registers for FC16 (Write Multiple Registers)
///
/// - Therefore: N ≤ (253 - 6) / 2 = 123.5 → 123 registers
pub const MAX_WRITE_REGISTERS: u16 = 123;

/// Maximum number of coils for FC01/FC02 (Read Coils/Discrete Inputs)
pub const MAX_READ_COILS: u16 = 2000;

/// Maximum number of coils for FC15 (Write Multiple Coils)
pub const MAX_WRITE_COILS: u16 = 1968;

// ============================================================================
// Modbus Function Codes
// ============================================================================

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;

/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;

/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;

/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;

/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;

/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;

/// Read Exception Status (FC07)
pub const FC_READ_EXCEPTION_STATUS: u8 = 0x07;

/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0F;

/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

// ============================================================================
// Modbus Exception Codes
// ============================================================================

/// Illegal Function
pub const EXCEPTION_ILLEGAL_FUNCTION: u8 = 0x01;

/// Illegal Data Address
pub const EXCEPTION_ILLEGAL_DATA_ADDRESS: u8 = 0x02;

/// Illegal Data Value
pub const EXCEPTION_ILLEGAL_DATA_VALUE: u8 = 0x03;

/// Server Device Failure
pub const EXCEPTION_SERVER_DEVICE_FAILURE: u8 = 0x04;

/// Acknowledge
pub const EXCEPTION_ACKNOWLEDGE: u8 = 0x05;

/// Server Device Busy
pub const EXCEPTION_SERVER_DEVICE_BUSY: u8 = 0x06;

/// Negative Acknowledge
pub const EXCEPTION_NEGATIVE_ACKNOWLEDGE: u8 = 0x07;

/// Memory Parity Error
pub const EXCEPTION_MEMORY_PARITY_ERROR: u8 = 0x08;

/// Gateway Path Unavailable
pub const EXCEPTION_GATEWAY_PATH_UNAVAILABLE: u8 = 0x0A;

/// Gateway Target Device Failed to Respond
pub const EXCEPTION_GATEWAY_TARGET_FAILED: u8 = 0x0B;
