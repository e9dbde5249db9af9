//! Error types for the slave engine
//!
//! Protocol conditions (short frames, CRC mismatches, Modbus exceptions) are
//! never surfaced as errors: they are handled on the wire. `ModbusError` covers
//! what the caller must act on: invalid setup and failing transports.

use thiserror::Error;

/// Errors returned by the slave engine
#[derive(Debug, Error)]
pub enum ModbusError {
    /// I/O failure reported by the underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Transport-specific failure without an `io::Error` source
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// Invalid engine configuration
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Unit address outside 1-247
    #[error("Invalid unit address: {address} (must be 1-247)")]
    InvalidUnitAddress { address: u8 },

    /// Two units share one address
    #[error("Duplicate unit address: {address}")]
    DuplicateUnit { address: u8 },

    /// No unit is configured with this address
    #[error("Unknown unit address: {address}")]
    UnknownUnit { address: u8 },

    /// Function code not supported by this engine
    #[error("Invalid function code: 0x{code:02X}")]
    InvalidFunction { code: u8 },
}

impl ModbusError {
    /// Create a transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Check whether the error came from the transport
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Transport { .. })
    }
}

/// Result type used throughout the crate
pub type ModbusResult<T> = Result<T, ModbusError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ModbusError::InvalidUnitAddress { address: 0 };
        assert_eq!(err.to_string(), "Invalid unit address: 0 (must be 1-247)");

        let err = ModbusError::InvalidFunction { code: 0x2B };
        assert_eq!(err.to_string(), "Invalid function code: 0x2B");

        let err = ModbusError::config("baud rate must be positive");
        assert_eq!(
            err.to_string(),
            "Configuration error: baud rate must be positive"
        );
    }

    #[test]
    fn test_transport_classification() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        assert!(ModbusError::from(io).is_transport_error());
        assert!(ModbusError::transport("port closed").is_transport_error());
        assert!(!ModbusError::DuplicateUnit { address: 3 }.is_transport_error());
    }
}
