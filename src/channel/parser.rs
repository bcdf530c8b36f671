//! Receive state machine for byte-stuffed message frames.
//!
//! On stream transports a frame is a marker byte followed by the stuffed
//! header and payload. Inside a frame the marker and escape bytes are sent as
//! two-byte escape sequences, so a raw marker can only mean the start of a
//! frame.
//!
//! ```text
//!                  marker
//!  .----------------.  .---------.  header ok   .--------.  length   .----------.
//!  | Desynchronized |->| Syncing |------------->| InBody |---------->| Complete |
//!  '----------------'  '---------'              '--------'   bytes   '----------'
//!          ^                |                        |                    |
//!          |     error      |         error          |                    |
//!          '----------------'------------------------'--------------------'
//!                                                          next byte
//! ```
//!
//! Any inconsistency (marker inside a frame, bad escape, oversize length,
//! checksum mismatch) drops the partial frame and goes back to
//! `Desynchronized`; a partial frame is never delivered.

use std::fmt;

use super::message::{Header, Message, MSG_HDRSZ, MSG_MAXLEN};
use crate::error::FramingError;

/// Frame start marker.
pub const MSG_MARK: u8 = 0x7e;
/// Escape byte.
pub const MSG_ESC: u8 = 0x7d;
/// Escaped form of [`MSG_MARK`].
pub const MSG_ESCMARK: u8 = 0x5e;
/// Escaped form of [`MSG_ESC`].
pub const MSG_ESCESC: u8 = 0x5d;

/// Position of the receiver relative to message boundaries.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum ReceiveState {
    /// Waiting for a frame marker. Initial state and state after any error.
    Desynchronized,
    /// Accumulating header bytes.
    Syncing,
    /// Accumulating the declared number of payload bytes.
    InBody,
    /// One full message was just delivered. The next byte is handled as in
    /// `Desynchronized`, which is where the parser is reset to.
    Complete,
}
impl fmt::Display for ReceiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Incremental frame decoder. Bytes are fed one at a time and the parser
/// keeps its position between calls.
#[derive(Debug)]
pub struct FrameParser {
    state: ReceiveState,
    buf: Vec<u8>,
    expected: usize,
    escaped: bool,
    /// The last error was a marker inside a frame, which also opens the next
    /// frame.
    marked: bool,
}
impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}
impl FrameParser {
    pub fn new() -> Self {
        FrameParser {
            state: ReceiveState::Desynchronized,
            buf: Vec::with_capacity(MSG_HDRSZ + MSG_MAXLEN),
            expected: 0,
            escaped: false,
            marked: false,
        }
    }

    pub fn state(&self) -> ReceiveState {
        self.state
    }

    /// Drop any partial frame and wait for the next marker.
    pub fn reset(&mut self) {
        self.state = ReceiveState::Desynchronized;
        self.buf.clear();
        self.expected = 0;
        self.escaped = false;
        self.marked = false;
    }

    /// Consume one byte from the wire.
    ///
    /// Returns `Ok(Some(message))` when the byte completes a frame,
    /// `Ok(None)` when more bytes are needed and an error when the frame is
    /// inconsistent, in which case the parser is back to
    /// [`ReceiveState::Desynchronized`].
    pub fn feed(&mut self, byte: u8) -> Result<Option<Message>, FramingError> {
        match self.state {
            ReceiveState::Desynchronized | ReceiveState::Complete => {
                if byte == MSG_MARK {
                    self.reset();
                    self.state = ReceiveState::Syncing;
                    return Ok(None);
                }
                if !self.marked {
                    self.state = ReceiveState::Desynchronized;
                    return Ok(None);
                }
                self.reset();
                self.state = ReceiveState::Syncing;
            }
            ReceiveState::Syncing | ReceiveState::InBody => {}
        }

        if byte == MSG_MARK {
            if self.state == ReceiveState::Syncing && self.buf.is_empty() && !self.escaped {
                // Back to back markers between frames.
                return Ok(None);
            }
            let result = self.fail(FramingError::UnexpectedMarker);
            self.marked = true;
            return result;
        }

        let byte = if self.escaped {
            self.escaped = false;
            match byte {
                MSG_ESCMARK => MSG_MARK,
                MSG_ESCESC => MSG_ESC,
                other => return self.fail(FramingError::BadEscape(other)),
            }
        } else if byte == MSG_ESC {
            self.escaped = true;
            return Ok(None);
        } else {
            byte
        };
        self.buf.push(byte);

        if self.state == ReceiveState::Syncing && self.buf.len() == MSG_HDRSZ {
            match Header::parse(&self.buf) {
                Ok(header) => {
                    self.expected = MSG_HDRSZ + header.len;
                    self.state = ReceiveState::InBody;
                }
                Err(err) => return self.fail(err),
            }
        }

        if self.state == ReceiveState::InBody && self.buf.len() == self.expected {
            return match Message::decode(&self.buf) {
                Ok(message) => {
                    self.buf.clear();
                    self.state = ReceiveState::Complete;
                    Ok(Some(message))
                }
                Err(err) => self.fail(err),
            };
        }

        Ok(None)
    }

    fn fail(&mut self, err: FramingError) -> Result<Option<Message>, FramingError> {
        self.reset();
        Err(err)
    }
}

/// Frame a message for a stream transport: marker then stuffed bytes.
pub fn encode_frame(message: &Message) -> Vec<u8> {
    let raw = message.encode();
    let mut frame = Vec::with_capacity(raw.len() * 2 + 1);
    frame.push(MSG_MARK);
    for byte in raw {
        match byte {
            MSG_MARK => frame.extend_from_slice(&[MSG_ESC, MSG_ESCMARK]),
            MSG_ESC => frame.extend_from_slice(&[MSG_ESC, MSG_ESCESC]),
            other => frame.push(other),
        }
    }
    frame
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MessageType;

    fn feed_all(parser: &mut FrameParser, bytes: &[u8]) -> Vec<Result<Message, FramingError>> {
        bytes
            .iter()
            .filter_map(|b| parser.feed(*b).transpose())
            .collect()
    }

    /// A raw frame header declaring `len` payload bytes.
    fn raw_header(kind: u16, len: usize) -> Vec<u8> {
        let word = u32::from(kind) | ((len as u32) << 16);
        let mut bytes = vec![MSG_MARK, 0, 0, 0, 0];
        bytes.extend_from_slice(&word.to_le_bytes());
        bytes
    }

    #[test]
    fn starts_desynchronized() {
        assert_eq!(FrameParser::new().state(), ReceiveState::Desynchronized);
    }

    #[test]
    fn decodes_one_frame() {
        let msg = Message::new(MessageType::Open, b"kernel").unwrap();
        let mut parser = FrameParser::new();
        let out = feed_all(&mut parser, &encode_frame(&msg));
        assert_eq!(out, vec![Ok(msg)]);
        assert_eq!(parser.state(), ReceiveState::Complete);
    }

    #[test]
    fn stuffed_bytes_survive() {
        let payload = [MSG_MARK, MSG_ESC, 0x00, MSG_MARK];
        let msg = Message::new(MessageType::Write, &payload).unwrap();
        let frame = encode_frame(&msg);
        assert_eq!(frame.iter().filter(|b| **b == MSG_MARK).count(), 1);

        let mut parser = FrameParser::new();
        assert_eq!(feed_all(&mut parser, &frame), vec![Ok(msg)]);
    }

    #[test]
    fn noise_before_marker_is_skipped() {
        let msg = Message::new(MessageType::Hello, b"").unwrap();
        let mut bytes = b"boot log line\r\n".to_vec();
        bytes.extend(encode_frame(&msg));
        let mut parser = FrameParser::new();
        assert_eq!(feed_all(&mut parser, &bytes), vec![Ok(msg)]);
    }

    #[test]
    fn states_follow_progress() {
        let msg = Message::new(MessageType::Read, b"ab").unwrap();
        let frame = encode_frame(&msg);
        let mut parser = FrameParser::new();

        parser.feed(frame[0]).unwrap();
        assert_eq!(parser.state(), ReceiveState::Syncing);
        for b in &frame[1..MSG_HDRSZ] {
            parser.feed(*b).unwrap();
            assert_eq!(parser.state(), ReceiveState::Syncing);
        }
        parser.feed(frame[MSG_HDRSZ]).unwrap();
        assert_eq!(parser.state(), ReceiveState::InBody);
        parser.feed(frame[MSG_HDRSZ + 1]).unwrap();
        assert_eq!(parser.state(), ReceiveState::InBody);
        assert!(parser.feed(frame[MSG_HDRSZ + 2]).unwrap().is_some());
        assert_eq!(parser.state(), ReceiveState::Complete);
    }

    #[test]
    fn oversize_length_desynchronizes() {
        let mut parser = FrameParser::new();
        let out = feed_all(&mut parser, &raw_header(1, MSG_MAXLEN + 1));
        assert_eq!(out, vec![Err(FramingError::Oversize(MSG_MAXLEN + 1))]);
        assert_eq!(parser.state(), ReceiveState::Desynchronized);
    }

    #[test]
    fn maximum_length_is_accepted() {
        let msg = Message::new(MessageType::Read, &[0x42; MSG_MAXLEN]).unwrap();
        let mut parser = FrameParser::new();
        assert_eq!(feed_all(&mut parser, &encode_frame(&msg)), vec![Ok(msg)]);
    }

    #[test]
    fn marker_inside_frame_desynchronizes() {
        let msg = Message::new(MessageType::Read, b"abcd").unwrap();
        let frame = encode_frame(&msg);
        let mut parser = FrameParser::new();
        for b in &frame[..MSG_HDRSZ + 2] {
            parser.feed(*b).unwrap();
        }
        assert_eq!(parser.feed(MSG_MARK), Err(FramingError::UnexpectedMarker));
        assert_eq!(parser.state(), ReceiveState::Desynchronized);
    }

    #[test]
    fn marker_inside_frame_starts_the_next_one() {
        let cut = Message::new(MessageType::Read, b"abcd").unwrap();
        let next = Message::new(MessageType::Hello, b"hi").unwrap();
        let mut bytes = encode_frame(&cut);
        bytes.truncate(MSG_HDRSZ + 3);
        bytes.extend(encode_frame(&next));

        let mut parser = FrameParser::new();
        assert_eq!(
            feed_all(&mut parser, &bytes),
            vec![Err(FramingError::UnexpectedMarker), Ok(next)]
        );
    }

    #[test]
    fn bad_escape_desynchronizes() {
        let mut parser = FrameParser::new();
        parser.feed(MSG_MARK).unwrap();
        parser.feed(MSG_ESC).unwrap();
        assert_eq!(parser.feed(0x01), Err(FramingError::BadEscape(0x01)));
        assert_eq!(parser.state(), ReceiveState::Desynchronized);
    }

    #[test]
    fn checksum_mismatch_is_not_delivered() {
        let msg = Message::new(MessageType::Write, b"data").unwrap();
        let mut frame = encode_frame(&msg);
        let last = frame.len() - 1;
        frame[last] ^= 0x01;
        let mut parser = FrameParser::new();
        let out = feed_all(&mut parser, &frame);
        assert_eq!(out.len(), 1);
        assert!(matches!(out[0], Err(FramingError::Checksum { .. })));
        assert_eq!(parser.state(), ReceiveState::Desynchronized);
    }

    #[test]
    fn recovers_on_next_frame() {
        let good = Message::new(MessageType::Close, b"fd").unwrap();
        let mut bytes = raw_header(1, MSG_MAXLEN + 100);
        bytes.extend_from_slice(b"leftover body");
        bytes.extend(encode_frame(&good));

        let mut parser = FrameParser::new();
        let out = feed_all(&mut parser, &bytes);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_err());
        assert_eq!(out[1], Ok(good));
    }

    #[test]
    fn back_to_back_frames() {
        let first = Message::new(MessageType::Open, b"a").unwrap();
        let second = Message::new(MessageType::Read, b"b").unwrap();
        let mut bytes = encode_frame(&first);
        bytes.push(MSG_MARK);
        bytes.extend(encode_frame(&second));
        let mut parser = FrameParser::new();
        assert_eq!(feed_all(&mut parser, &bytes), vec![Ok(first), Ok(second)]);
    }
}
