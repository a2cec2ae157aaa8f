use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::types::Address;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// The bus owner never answered the request within the configured window.
    #[error("bus acknowledge not received within {waited:?} ({polls} polls)")]
    BusTimeout { waited: Duration, polls: u64 },
    #[error("timed out waiting for input")]
    InputTimeout,
    #[error("transport closed")]
    TransportClosed,
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("no serial port given (use --port or serial.port in the config)")]
    NoSerialPort,
    #[error("block loads need a transport with a read timeout")]
    NoReadTimeout,
    #[error("bridge replied with a negative acknowledgment")]
    Nak,
    #[error("unexpected reply byte {found:#04x} (expected {expected:#04x})")]
    UnexpectedReply { expected: u8, found: u8 },
    #[error("invalid hex digit {0:#04x} in reply")]
    InvalidHexDigit(u8),
    #[error("block of {0} bytes does not fit the 16-bit size field")]
    BlockTooLarge(usize),
    #[error("verification failed at {address} after {attempts} attempts")]
    VerifyFailed { address: Address, attempts: u32 },
    #[error("Intel HEX line {line}: {reason}")]
    HexRecord { line: usize, reason: String },
    #[error("failed to read '{path}': {source}")]
    FileRead { path: PathBuf, source: io::Error },
    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl BridgeError {
    /// Timeouts abort the current command but leave the bridge usable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, BridgeError::BusTimeout { .. } | BridgeError::InputTimeout)
    }
}
