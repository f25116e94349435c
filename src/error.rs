//! Error types for sphero-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// sphero-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file could not be parsed
    #[error("Config error: {0}")]
    Config(#[from] toml::de::Error),

    /// Transport is closed
    #[error("Transport not connected")]
    NotConnected,

    /// Transport accepted fewer bytes than the frame holds
    #[error("Short write: expected {expected} bytes, wrote {written}")]
    ShortWrite {
        /// Frame length
        expected: usize,
        /// Bytes the transport accepted
        written: usize,
    },

    /// Invalid packet or response
    #[error("Invalid packet: {0}")]
    InvalidPacket(String),

    /// Checksum mismatch
    #[error("Checksum error: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumError {
        /// Checksum computed over the received bytes
        expected: u8,
        /// Checksum byte carried by the frame
        actual: u8,
    },

    /// Workers are already running
    #[error("Driver already started")]
    AlreadyStarted,

    /// Outgoing packet queue has no receiver
    #[error("Outgoing queue closed")]
    QueueClosed,

    /// Unknown device type in configuration
    #[error("Unknown device type: {0}")]
    UnknownDevice(String),

    /// Named command is not registered
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// Named command registered twice
    #[error("Command already registered: {0}")]
    DuplicateCommand(String),

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Worker thread panicked
    #[error("Worker thread panicked")]
    ThreadPanic,

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
