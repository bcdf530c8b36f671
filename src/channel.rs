//! Framed message channels on top of a [`Transport`].
//!
//! A channel turns raw transport I/O into whole [`Message`]s. Two framings
//! exist and one of them is picked once, when the dispatcher starts, from the
//! transport mode:
//!
//! * [`StreamChannel`] for serial lines and pipes, where frames are delimited
//!   by a marker byte and byte-stuffed, and where the receiver has to find
//!   its way back to a frame boundary after errors,
//! * [`DatagramChannel`] for UDP, where a datagram carries exactly one
//!   message.
//!
//! **Example** - Receiving one message:
//! ```no_run
//! use bootlink::{channel, transport, SettingsBuilder, TransportMode};
//!
//! let settings = SettingsBuilder::new("/dev/ttyUSB0").finalize();
//! let port = transport::open(&settings).expect("serial port");
//! let mut channel = channel::select(TransportMode::Serial, port);
//! let message = channel.receive().expect("message");
//! println!("{:?}", message);
//! ```

mod datagram;
mod message;
mod parser;
mod stream;

use crate::{error::ChannelError, transport::Transport, transport::TransportMode};

pub use datagram::DatagramChannel;
pub use message::{Message, MessageType, MSG_HDRSZ, MSG_MAXLEN};
pub use parser::{encode_frame, FrameParser, ReceiveState, MSG_ESC, MSG_MARK};
pub use stream::StreamChannel;

// =============================================================================
// Public Interface
// =============================================================================

/// Outcome of a single send: how many bytes the transport accepted out of how
/// many the frame needed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Sent {
    pub written: usize,
    pub expected: usize,
}
impl Sent {
    pub fn is_complete(&self) -> bool {
        self.written == self.expected
    }
}

/// Anything a message can be sent through. Request handlers reply through
/// this.
pub trait MessageSink {
    /// Encode `message` and hand it to the transport with one write.
    fn send(&mut self, message: &Message) -> Result<Sent, ChannelError>;
}

/// A bidirectional message channel with its receive state.
pub trait FramedChannel: MessageSink + Send {
    /// Name of the underlying transport, for diagnostics.
    fn name(&self) -> &str;

    /// Block until one complete message is received.
    ///
    /// Framing errors and read errors reset the receive state to
    /// [`ReceiveState::Desynchronized`] and are returned; the next call
    /// resumes with whatever bytes were not consumed yet.
    fn receive(&mut self) -> Result<Message, ChannelError>;

    /// Current receive state.
    fn state(&self) -> ReceiveState;

    /// Reopen the transport in place, dropping any partially received frame.
    fn reconnect(&mut self) -> Result<(), ChannelError>;

    /// The channel seen as a reply sink.
    fn sink(&mut self) -> &mut dyn MessageSink;
}

/// Pick the channel implementation matching the transport mode.
pub fn select(mode: TransportMode, transport: Box<dyn Transport>) -> Box<dyn FramedChannel> {
    match mode {
        TransportMode::Serial | TransportMode::Pipe => Box::new(StreamChannel::new(transport)),
        TransportMode::Udp => Box::new(DatagramChannel::new(transport)),
    }
}

/// Read errors after which reading again is the right thing to do.
fn is_transient(err: &std::io::Error) -> bool {
    use std::io::ErrorKind;
    matches!(
        err.kind(),
        ErrorKind::TimedOut | ErrorKind::WouldBlock | ErrorKind::Interrupted
    )
}

// =============================================================================
// Test support
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use std::{
        collections::VecDeque,
        io,
        sync::{
            atomic::{AtomicUsize, Ordering},
            Arc, Mutex,
        },
    };

    use crate::{error::TransportError, transport::Transport};

    /// A transport replaying a fixed sequence of read results and recording
    /// every write.
    pub(crate) struct ScriptedTransport {
        reads: VecDeque<io::Result<Vec<u8>>>,
        pub written: Arc<Mutex<Vec<Vec<u8>>>>,
        pub reopens: Arc<AtomicUsize>,
        pub max_write: Option<usize>,
    }
    impl ScriptedTransport {
        pub(crate) fn new(reads: Vec<io::Result<Vec<u8>>>) -> Self {
            ScriptedTransport {
                reads: reads.into(),
                written: Arc::default(),
                reopens: Arc::default(),
                max_write: None,
            }
        }
    }
    impl Transport for ScriptedTransport {
        fn name(&self) -> &str {
            "scripted"
        }

        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.reads.pop_front() {
                Some(Ok(mut bytes)) => {
                    let count = bytes.len().min(buf.len());
                    buf[..count].copy_from_slice(&bytes[..count]);
                    if count < bytes.len() {
                        self.reads.push_front(Ok(bytes.split_off(count)));
                    }
                    Ok(count)
                }
                Some(Err(err)) => Err(err),
                None => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted")),
            }
        }

        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let count = self.max_write.map_or(buf.len(), |max| max.min(buf.len()));
            self.written.lock().unwrap().push(buf[..count].to_vec());
            Ok(count)
        }

        fn reopen(&mut self) -> Result<(), TransportError> {
            self.reopens.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }
}
