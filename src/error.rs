//! Error types for the WebSocket client and its consumers.
//!
//! Every failure the codec, reassembler, handshake negotiator or connection
//! controller can report is a variant of [`Error`]. Some variants are only
//! internal "wait for more bytes" signals and never reach a handler.

use thiserror::Error;

use crate::message::CloseCode;

/// Result type alias for WebSocket operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during WebSocket operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Protocol violation detected.
    #[error("Protocol violation: {0}")]
    ProtocolViolation(String),

    /// Invalid UTF-8 in text message.
    #[error("Invalid UTF-8 in text message")]
    InvalidUtf8,

    /// Frame size exceeds configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared frame payload size.
        size: u64,
        /// Maximum allowed size.
        max: usize,
    },

    /// Message size exceeds configured maximum.
    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge {
        /// Size the message would reach.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Handshake response exceeds configured maximum.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Bytes received so far.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// Reserved opcode used.
    #[error("Reserved opcode: {0:#x}")]
    ReservedOpcode(u8),

    /// Invalid opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Control frame fragmented.
    #[error("Control frames cannot be fragmented")]
    FragmentedControlFrame,

    /// Control frame payload too large (>125 bytes).
    #[error("Control frame payload too large: {0} bytes (max: 125)")]
    ControlFrameTooLarge(usize),

    /// Masked server frame.
    #[error("Server frame must not be masked")]
    MaskedServerFrame,

    /// Reserved bits set without extension.
    #[error("Reserved bits set without negotiated extension")]
    ReservedBitsSet,

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Malformed handshake response.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake response is not complete yet.
    #[error("Incomplete handshake")]
    IncompleteHandshake,

    /// Well-formed handshake response that the client rejected.
    #[error("Handshake mismatch: {0}")]
    HandshakeMismatch(String),

    /// Operation requires an open connection.
    #[error("Not connected")]
    NotConnected,

    /// `connect` was called on a client that already started.
    #[error("Client already connected; a client is not reusable")]
    AlreadyConnected,

    /// Connection has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Malformed or unsupported WebSocket URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// TLS setup or negotiation failed.
    #[error("TLS error: {0}")]
    Tls(String),

    /// The operating system random source failed.
    #[error("Random source unavailable: {0}")]
    Random(String),
}

impl Error {
    /// Returns true for the "need more bytes" signals.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Error::IncompleteFrame { .. } | Error::IncompleteHandshake)
    }

    /// Close status to send to the peer when this error ends a connection.
    #[must_use]
    pub const fn close_code(&self) -> CloseCode {
        match self {
            Error::InvalidUtf8 => CloseCode::InvalidPayload,
            Error::FrameTooLarge { .. } | Error::MessageTooLarge { .. } => {
                CloseCode::MessageTooBig
            }
            Error::ProtocolViolation(_)
            | Error::ReservedOpcode(_)
            | Error::InvalidOpcode(_)
            | Error::FragmentedControlFrame
            | Error::ControlFrameTooLarge(_)
            | Error::MaskedServerFrame
            | Error::ReservedBitsSet => CloseCode::ProtocolError,
            _ => CloseCode::InternalError,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(_: std::str::Utf8Error) -> Self {
        Error::InvalidUtf8
    }
}

impl From<getrandom::Error> for Error {
    fn from(err: getrandom::Error) -> Self {
        Error::Random(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::InvalidUrl(err.to_string())
    }
}
