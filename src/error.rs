//! Error types for the relay and flashing paths.
//!
//! Each enum maps to one family of failures. Framing errors are recovered
//! locally by the receive state machine; the others surface to the caller,
//! which decides whether to retry, drop the message or stop.

use std::io;

use thiserror::Error;

/// Failure to open or use a transport endpoint.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("can't open serial port `{path}`: {source}")]
    Serial {
        path: String,
        #[source]
        source: serialport::Error,
    },
    #[error("can't open connection at `{address}:{port}`: {source}")]
    Udp {
        address: String,
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("can't open pipe `{path}`: {source}")]
    Pipe {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("`{0}` is not a valid UDP port")]
    InvalidPort(u32),
    #[error("transport `{0}` can't be reopened")]
    ReopenUnsupported(String),
}

/// The inbound byte stream lost alignment with message boundaries.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Error)]
pub enum FramingError {
    #[error("declared length {0} exceeds the maximum message length")]
    Oversize(usize),
    #[error("unexpected frame marker inside a frame")]
    UnexpectedMarker,
    #[error("invalid escape sequence 0x7d 0x{0:02x}")]
    BadEscape(u8),
    #[error("checksum mismatch (expected 0x{expected:08x}, got 0x{actual:08x})")]
    Checksum { expected: u32, actual: u32 },
    #[error("datagram of {0} bytes is shorter than a message header")]
    Truncated(usize),
    #[error("datagram of {actual} bytes does not match declared size {declared}")]
    SizeMismatch { declared: usize, actual: usize },
}

/// Failure of a framed channel receive or send.
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Conditions that stop the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Open(#[from] TransportError),
    #[error("pipe reconnect retries exhausted on `{0}`")]
    RetriesExhausted(String),
}

/// Failures of the serial download protocol driver.
#[derive(Debug, Error)]
pub enum SdpError {
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("transfer error: {0}")]
    Transfer(String),
    #[error("unexpected status 0x{actual:08x} (expected 0x{expected:08x})")]
    StatusMismatch { expected: u32, actual: u32 },
    #[error("no device with vendor id 0x{vendor_id:04x} after {tries} attempts")]
    DeviceTimeout { vendor_id: u16, tries: u64 },
    #[error("payload of {0} bytes does not fit a 32-bit count")]
    PayloadTooLarge(usize),
}

/// A flashing script line that does not follow the command grammar.
#[derive(Debug, Clone, Eq, PartialEq, Error)]
pub enum ScriptError {
    #[error("unrecognized token `{token}` at line {line}")]
    UnknownKeyword { line: usize, token: String },
    #[error("missing argument `{argument}` for {keyword} at line {line}")]
    MissingArgument {
        line: usize,
        keyword: &'static str,
        argument: &'static str,
    },
    #[error("invalid number `{value}` at line {line}")]
    InvalidNumber { line: usize, value: String },
}

impl ScriptError {
    /// The 1-based line the error was found on.
    pub fn line(&self) -> usize {
        match self {
            ScriptError::UnknownKeyword { line, .. }
            | ScriptError::MissingArgument { line, .. }
            | ScriptError::InvalidNumber { line, .. } => *line,
        }
    }
}

/// Failures while running a flashing script.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("can't read script `{path}`: {source}")]
    Script {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error(transparent)]
    Syntax(#[from] ScriptError),
    #[error("can't read image `{path}`: {source}")]
    Image {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("line {0}: no device, a WAIT command must come first")]
    NoDevice(usize),
    #[error("line {line}: {source}")]
    Sdp {
        line: usize,
        #[source]
        source: SdpError,
    },
    #[error("line {0}: aborted by the operator")]
    Aborted(usize),
}
