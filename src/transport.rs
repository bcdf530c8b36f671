//! Raw byte transports between the host and the target.
//!
//! A transport only moves bytes. It never retries and never interprets what
//! it reads; message boundaries are the business of the
//! [`channel`](crate::channel) layer and reconnect policy belongs to the
//! dispatcher.
//!
//! Three kinds of transport exist:
//!
//! * **serial**: a tty device driven through `serialport`,
//! * **udp**: a socket bound to a local address and port, replying to the
//!   peer that sent the last datagram,
//! * **pipe**: a pair of named pipes emulating a serial line for an emulator.
//!   For a base path `A`, the emulator writes to `A.out` (our input) and reads
//!   from `A.in` (our output).
//!
//! **Example** - Opening the transport selected in the settings:
//! ```no_run
//! use bootlink::{transport, SettingsBuilder, TransportMode};
//!
//! let settings = SettingsBuilder::new("/tmp/qemu")
//!     .mode(TransportMode::Pipe)
//!     .finalize();
//! let transport = transport::open(&settings).expect("pipes");
//! println!("{}", transport.name());
//! ```

#[macro_use]
mod macros;

mod pipe;
mod serial;
mod udp;

use std::{fmt, io, str::FromStr};

use crate::{error::TransportError, settings::Settings};

pub use pipe::{pipe_paths, PipeTransport};
pub use serial::SerialTransport;
pub use udp::UdpTransport;

// =============================================================================
// Public Interface
// =============================================================================

/// Blocking byte I/O over one open endpoint.
pub trait Transport: Send {
    /// Human readable name of the endpoint, used in diagnostics.
    fn name(&self) -> &str;

    /// Read at most `buf.len()` bytes. Returns the number of bytes read.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write `buf` with a single call. Returns the number of bytes written;
    /// checking it against `buf.len()` is the caller's job.
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;

    /// Close the endpoint and open it again in place.
    ///
    /// Only the pipe transport supports this; the others report
    /// [`TransportError::ReopenUnsupported`].
    fn reopen(&mut self) -> Result<(), TransportError> {
        Err(TransportError::ReopenUnsupported(self.name().to_owned()))
    }
}

/// How the dispatcher reaches the target.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum TransportMode {
    Serial,
    Udp,
    Pipe,
}
impl TransportMode {
    /// Values accepted on the command line.
    pub const VARIANTS: [&'static str; 3] = ["serial", "udp", "pipe"];
}
impl FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "serial" => Ok(TransportMode::Serial),
            "udp" => Ok(TransportMode::Udp),
            "pipe" => Ok(TransportMode::Pipe),
            _ => Err(format!("unknown transport mode `{}`", s)),
        }
    }
}
impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportMode::Serial => "serial",
            TransportMode::Udp => "udp",
            TransportMode::Pipe => "pipe",
        };
        f.write_str(name)
    }
}

/// Open the transport described by `settings`.
///
/// Both pipe ends must open for the pipe transport to be returned; nothing is
/// kept from a half successful attempt.
pub fn open(settings: &Settings) -> Result<Box<dyn Transport>, TransportError> {
    let transport: Box<dyn Transport> = match settings.mode {
        TransportMode::Serial => Box::new(SerialTransport::open(settings)?),
        TransportMode::Udp => Box::new(UdpTransport::open(
            &settings.address,
            settings.speed_or_port,
        )?),
        TransportMode::Pipe => Box::new(PipeTransport::open(&settings.address)?),
    };
    Ok(transport)
}

// =============================================================================
// Unit Tests
// =============================================================================

#[test]
fn mode_from_str() {
    assert_eq!("serial".parse(), Ok(TransportMode::Serial));
    assert_eq!("UDP".parse(), Ok(TransportMode::Udp));
    assert_eq!("pipe".parse(), Ok(TransportMode::Pipe));
    assert!("tcp".parse::<TransportMode>().is_err());
}

#[test]
fn mode_display_round_trips() {
    for name in TransportMode::VARIANTS.iter() {
        let mode: TransportMode = name.parse().unwrap();
        assert_eq!(&mode.to_string(), name);
    }
}
