//! Channel for datagram transports (UDP). One datagram carries one message,
//! without stuffing.

use log::trace;

use super::{
    is_transient,
    message::{Header, Message, MSG_HDRSZ, MSG_MAXLEN},
    parser::ReceiveState,
    FramedChannel, MessageSink, Sent,
};
use crate::{error::ChannelError, transport::Transport};

/// Message channel over a datagram transport.
pub struct DatagramChannel {
    transport: Box<dyn Transport>,
    state: ReceiveState,
    buf: Vec<u8>,
}
impl DatagramChannel {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        DatagramChannel {
            transport,
            state: ReceiveState::Desynchronized,
            // One spare byte so an overlong datagram is not silently
            // truncated to a valid size.
            buf: vec![0; MSG_HDRSZ + MSG_MAXLEN + 1],
        }
    }
}
impl MessageSink for DatagramChannel {
    fn send(&mut self, message: &Message) -> Result<Sent, ChannelError> {
        let datagram = message.encode();
        let written = self.transport.write(&datagram)?;
        Ok(Sent {
            written,
            expected: datagram.len(),
        })
    }
}
impl FramedChannel for DatagramChannel {
    fn name(&self) -> &str {
        self.transport.name()
    }

    fn receive(&mut self) -> Result<Message, ChannelError> {
        self.state = ReceiveState::Desynchronized;
        let count = loop {
            match self.transport.read(&mut self.buf) {
                Ok(count) => break count,
                Err(ref err) if is_transient(err) => {}
                Err(err) => return Err(err.into()),
            }
        };
        trace!("{} byte datagram from {}", count, self.transport.name());

        let datagram = &self.buf[..count];
        self.state = ReceiveState::Syncing;
        if let Err(err) = Header::parse(datagram) {
            self.state = ReceiveState::Desynchronized;
            return Err(err.into());
        }
        self.state = ReceiveState::InBody;
        match Message::decode(datagram) {
            Ok(message) => {
                self.state = ReceiveState::Complete;
                Ok(message)
            }
            Err(err) => {
                self.state = ReceiveState::Desynchronized;
                Err(err.into())
            }
        }
    }

    fn state(&self) -> ReceiveState {
        self.state
    }

    fn reconnect(&mut self) -> Result<(), ChannelError> {
        self.state = ReceiveState::Desynchronized;
        self.transport.reopen()?;
        Ok(())
    }

    fn sink(&mut self) -> &mut dyn MessageSink {
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
