//! Channel for byte stream transports (serial line and pipes).

use log::{debug, trace};

use super::{
    is_transient,
    parser::{encode_frame, FrameParser, ReceiveState},
    FramedChannel, Message, MessageSink, Sent,
};
use crate::{error::ChannelError, transport::Transport};

/// How many bytes are pulled from the transport per read.
const READ_CHUNK: usize = 1024;

/// Message channel over a byte stream.
///
/// Bytes read from the transport but not yet consumed by the parser are kept
/// across [`receive`](FramedChannel::receive) calls: a message that completes
/// in the middle of a read leaves the rest for the next call.
pub struct StreamChannel {
    transport: Box<dyn Transport>,
    parser: FrameParser,
    buf: Vec<u8>,
    filled: usize,
    consumed: usize,
}
impl StreamChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        StreamChannel {
            transport,
            parser: FrameParser::new(),
            buf: vec![0; READ_CHUNK],
            filled: 0,
            consumed: 0,
        }
    }
}
impl MessageSink for StreamChannel {
    fn send(&mut self, message: &Message) -> Result<Sent, ChannelError> {
        let frame = encode_frame(message);
        let written = self.transport.write(&frame)?;
        trace!("{} of {} frame bytes written", written, frame.len());
        Ok(Sent {
            written,
            expected: frame.len(),
        })
    }
}
impl FramedChannel for StreamChannel {
    fn name(&self) -> &str {
        self.transport.name()
    }

    fn receive(&mut self) -> Result<Message, ChannelError> {
        loop {
            while self.consumed < self.filled {
                let byte = self.buf[self.consumed];
                self.consumed += 1;
                if let Some(message) = self.parser.feed(byte)? {
                    return Ok(message);
                }
            }

            match self.transport.read(&mut self.buf) {
                Ok(count) => {
                    trace!("{} bytes read from {}", count, self.transport.name());
                    self.filled = count;
                    self.consumed = 0;
                }
                Err(ref err) if is_transient(err) => {}
                Err(err) => {
                    self.parser.reset();
                    return Err(err.into());
                }
            }
        }
    }

    fn state(&self) -> ReceiveState {
        self.parser.state()
    }

    fn reconnect(&mut self) -> Result<(), ChannelError> {
        self.parser.reset();
        self.filled = 0;
        self.consumed = 0;
        self.transport.reopen()?;
        debug!("reconnected to {}", self.transport.name());
        Ok(())
    }

    fn sink(&mut self) -> &mut dyn MessageSink {
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use std::{io, sync::atomic::Ordering};

    use super::*;
    use crate::channel::{testing::ScriptedTransport, MessageType, MSG_MAXLEN};
    use crate::error::FramingError;

    fn channel(reads: Vec<io::Result<Vec<u8>>>) -> StreamChannel {
        StreamChannel::new(Box::new(ScriptedTransport::new(reads)))
    }

    #[test]
    fn message_split_across_reads() {
        let msg = Message::new(MessageType::Read, b"split me").unwrap();
        let frame = encode_frame(&msg);
        let (head, tail) = frame.split_at(5);
        let mut channel = channel(vec![Ok(head.to_vec()), Ok(tail.to_vec())]);
        assert_eq!(channel.receive().unwrap(), msg);
    }

    #[test]
    fn two_messages_in_one_read() {
        let first = Message::new(MessageType::Open, b"one").unwrap();
        let second = Message::new(MessageType::Close, b"two").unwrap();
        let mut bytes = encode_frame(&first);
        bytes.extend(encode_frame(&second));
        let mut channel = channel(vec![Ok(bytes)]);
        assert_eq!(channel.receive().unwrap(), first);
        assert_eq!(channel.receive().unwrap(), second);
    }

    #[test]
    fn timeouts_keep_partial_frame() {
        let msg = Message::new(MessageType::Write, b"slow line").unwrap();
        let frame = encode_frame(&msg);
        let (head, tail) = frame.split_at(9);
        let mut channel = channel(vec![
            Ok(head.to_vec()),
            Err(io::Error::new(io::ErrorKind::TimedOut, "timeout")),
            Ok(tail.to_vec()),
        ]);
        assert_eq!(channel.receive().unwrap(), msg);
    }

    #[test]
    fn read_error_resets_state() {
        let msg = Message::new(MessageType::Write, b"lost").unwrap();
        let frame = encode_frame(&msg);
        let mut channel = channel(vec![
            Ok(frame[..10].to_vec()),
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone")),
        ]);
        match channel.receive() {
            Err(ChannelError::Io(err)) => assert_eq!(err.kind(), io::ErrorKind::BrokenPipe),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(channel.state(), ReceiveState::Desynchronized);
    }

    #[test]
    fn oversize_frame_is_reported_then_skipped() {
        let word: u32 = 3 | (((MSG_MAXLEN + 8) as u32) << 16);
        let mut bytes = vec![0x7e, 0, 0, 0, 0];
        bytes.extend_from_slice(&word.to_le_bytes());
        let good = Message::new(MessageType::Hello, b"").unwrap();
        bytes.extend(encode_frame(&good));

        let mut channel = channel(vec![Ok(bytes)]);
        match channel.receive() {
            Err(ChannelError::Framing(FramingError::Oversize(len))) => {
                assert_eq!(len, MSG_MAXLEN + 8)
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(channel.state(), ReceiveState::Desynchronized);
        assert_eq!(channel.receive().unwrap(), good);
    }

    #[test]
    fn send_writes_one_frame() {
        let transport = ScriptedTransport::new(vec![]);
        let written = transport.written.clone();
        let mut channel = StreamChannel::new(Box::new(transport));
        let msg = Message::new(MessageType::Read, b"reply").unwrap();

        let sent = channel.send(&msg).unwrap();
        assert!(sent.is_complete());
        let written = written.lock().unwrap();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0], encode_frame(&msg));
    }

    #[test]
    fn short_write_is_visible_to_caller() {
        let mut transport = ScriptedTransport::new(vec![]);
        transport.max_write = Some(4);
        let mut channel = StreamChannel::new(Box::new(transport));
        let msg = Message::new(MessageType::Read, b"long reply").unwrap();
        let sent = channel.send(&msg).unwrap();
        assert_eq!(sent.written, 4);
        assert!(!sent.is_complete());
    }

    #[test]
    fn reconnect_drops_buffered_bytes() {
        let first = Message::new(MessageType::Read, b"abc").unwrap();
        let cut = Message::new(MessageType::Read, b"never finished").unwrap();
        let fresh = Message::new(MessageType::Hello, b"again").unwrap();
        let mut bytes = encode_frame(&first);
        bytes.extend_from_slice(&encode_frame(&cut)[..6]);

        let transport = ScriptedTransport::new(vec![Ok(bytes), Ok(encode_frame(&fresh))]);
        let reopens = transport.reopens.clone();
        let mut channel = StreamChannel::new(Box::new(transport));

        assert_eq!(channel.receive().unwrap(), first);
        channel.reconnect().unwrap();
        assert_eq!(reopens.load(Ordering::SeqCst), 1);
        assert_eq!(channel.state(), ReceiveState::Desynchronized);
        assert_eq!(channel.receive().unwrap(), fresh);
    }
}
