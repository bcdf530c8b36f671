//! Relay messages and their header encoding.
//!
//! A message header is two little-endian 32-bit words:
//!
//! ```text
//!  0        4                 6                 8
//!  +--------+-----------------+-----------------+------------------+
//!  | csum   | type (low 16)   | length (hi 16)  | payload[length]  |
//!  +--------+-----------------+-----------------+------------------+
//! ```
//!
//! The checksum is the wrapping sum of every byte following it.

use std::fmt;

use crate::error::FramingError;

/// Maximum number of payload bytes in a message.
pub const MSG_MAXLEN: usize = 512;

/// Size of the checksum and type/length words.
pub const MSG_HDRSZ: usize = 8;

/// Kind of a relay message.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum MessageType {
    /// The request could not be fully serviced.
    Err,
    Open,
    Read,
    Write,
    Close,
    Reset,
    Fstat,
    Hello,
    Other(u16),
}
impl From<u16> for MessageType {
    fn from(value: u16) -> Self {
        match value {
            0 => MessageType::Err,
            1 => MessageType::Open,
            2 => MessageType::Read,
            3 => MessageType::Write,
            4 => MessageType::Close,
            5 => MessageType::Reset,
            6 => MessageType::Fstat,
            7 => MessageType::Hello,
            other => MessageType::Other(other),
        }
    }
}
impl From<MessageType> for u16 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Err => 0,
            MessageType::Open => 1,
            MessageType::Read => 2,
            MessageType::Write => 3,
            MessageType::Close => 4,
            MessageType::Reset => 5,
            MessageType::Fstat => 6,
            MessageType::Hello => 7,
            MessageType::Other(other) => other,
        }
    }
}

/// A typed, length bounded unit of the relay protocol.
///
/// The length is tracked separately from the payload content so that a
/// message can be resized in place, as the dispatcher does when it answers
/// with an error of maximum length.
#[derive(Clone, Eq, PartialEq)]
pub struct Message {
    kind: MessageType,
    data: Vec<u8>,
}
impl Message {
    /// Build a message. Fails when `payload` is longer than [`MSG_MAXLEN`].
    pub fn new(kind: MessageType, payload: &[u8]) -> Result<Self, FramingError> {
        if payload.len() > MSG_MAXLEN {
            return Err(FramingError::Oversize(payload.len()));
        }
        Ok(Message {
            kind,
            data: payload.to_vec(),
        })
    }

    pub fn kind(&self) -> MessageType {
        self.kind
    }

    pub fn set_kind(&mut self, kind: MessageType) {
        self.kind = kind;
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Resize the payload, zero filling when it grows.
    pub fn set_len(&mut self, len: usize) -> Result<(), FramingError> {
        if len > MSG_MAXLEN {
            return Err(FramingError::Oversize(len));
        }
        self.data.resize(len, 0);
        Ok(())
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Serialize header and payload, without any stream framing.
    pub fn encode(&self) -> Vec<u8> {
        let word = type_len_word(self.kind, self.data.len());
        let mut bytes = Vec::with_capacity(MSG_HDRSZ + self.data.len());
        bytes.extend_from_slice(&[0; 4]);
        bytes.extend_from_slice(&word.to_le_bytes());
        bytes.extend_from_slice(&self.data);
        let csum = checksum(&bytes[4..]);
        bytes[..4].copy_from_slice(&csum.to_le_bytes());
        bytes
    }

    /// Parse a complete header + payload, checking the declared length and
    /// the checksum.
    pub fn decode(bytes: &[u8]) -> Result<Self, FramingError> {
        let header = Header::parse(bytes)?;
        let expected = MSG_HDRSZ + header.len;
        if bytes.len() != expected {
            return Err(FramingError::SizeMismatch {
                declared: expected,
                actual: bytes.len(),
            });
        }
        let actual = checksum(&bytes[4..]);
        if actual != header.csum {
            return Err(FramingError::Checksum {
                expected: header.csum,
                actual,
            });
        }
        Ok(Message {
            kind: header.kind,
            data: bytes[MSG_HDRSZ..].to_vec(),
        })
    }
}
impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &self.kind)
            .field("len", &self.data.len())
            .finish()
    }
}

/// The decoded header words of a message.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub(crate) struct Header {
    pub csum: u32,
    pub kind: MessageType,
    pub len: usize,
}
impl Header {
    /// Decode the first [`MSG_HDRSZ`] bytes of `bytes`. A declared length
    /// above [`MSG_MAXLEN`] is rejected here, before any payload is read.
    pub fn parse(bytes: &[u8]) -> Result<Self, FramingError> {
        if bytes.len() < MSG_HDRSZ {
            return Err(FramingError::Truncated(bytes.len()));
        }
        let csum = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let word = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let len = (word >> 16) as usize;
        if len > MSG_MAXLEN {
            return Err(FramingError::Oversize(len));
        }
        Ok(Header {
            csum,
            kind: MessageType::from((word & 0xffff) as u16),
            len,
        })
    }
}

fn type_len_word(kind: MessageType, len: usize) -> u32 {
    u32::from(u16::from(kind)) | ((len as u32) << 16)
}

/// Wrapping byte sum used as the message checksum.
pub(crate) fn checksum(bytes: &[u8]) -> u32 {
    bytes
        .iter()
        .fold(0u32, |acc, b| acc.wrapping_add(u32::from(*b)))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes() {
        assert_eq!(MessageType::from(0), MessageType::Err);
        assert_eq!(MessageType::from(7), MessageType::Hello);
        assert_eq!(MessageType::from(42), MessageType::Other(42));
        assert_eq!(u16::from(MessageType::Write), 3);
    }

    #[test]
    fn header_layout() {
        let msg = Message::new(MessageType::Read, &[1, 2, 3]).unwrap();
        let bytes = msg.encode();
        assert_eq!(bytes.len(), MSG_HDRSZ + 3);
        // type 2, length 3
        assert_eq!(&bytes[4..8], &[2, 0, 3, 0]);
        // 2 + 3 + 1 + 2 + 3
        assert_eq!(&bytes[0..4], &[11, 0, 0, 0]);
        assert_eq!(Message::decode(&bytes).unwrap(), msg);
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let payload = vec![0u8; MSG_MAXLEN + 1];
        assert_eq!(
            Message::new(MessageType::Write, &payload),
            Err(FramingError::Oversize(MSG_MAXLEN + 1))
        );
    }

    #[test]
    fn set_len_grows_with_zeroes() {
        let mut msg = Message::new(MessageType::Open, b"ab").unwrap();
        msg.set_len(MSG_MAXLEN).unwrap();
        assert_eq!(msg.len(), MSG_MAXLEN);
        assert_eq!(&msg.payload()[..3], b"ab\0");
        assert!(msg.set_len(MSG_MAXLEN + 1).is_err());
    }

    #[test]
    fn header_with_oversize_length() {
        let word: u32 = 1 | (((MSG_MAXLEN + 1) as u32) << 16);
        let mut bytes = vec![0u8; 4];
        bytes.extend_from_slice(&word.to_le_bytes());
        assert_eq!(
            Header::parse(&bytes),
            Err(FramingError::Oversize(MSG_MAXLEN + 1))
        );
    }

    #[test]
    fn corrupted_payload_fails_checksum() {
        let mut bytes = Message::new(MessageType::Write, b"payload")
            .unwrap()
            .encode();
        bytes[MSG_HDRSZ] ^= 0xff;
        match Message::decode(&bytes) {
            Err(FramingError::Checksum { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
