//! UDP transport.

use std::{
    convert::TryFrom,
    io,
    net::{SocketAddr, UdpSocket},
};

use log::{debug, info};

use super::Transport;
use crate::error::TransportError;

/// A socket bound to a local address. Replies go to the peer of the last
/// datagram received.
#[derive(Debug)]
pub struct UdpTransport {
    name: String,
    socket: UdpSocket,
    peer: Option<SocketAddr>,
}
impl UdpTransport {
    /// Bind a socket to `address:port`.
    pub fn open(address: &str, port: u32) -> Result<Self, TransportError> {
        let port = u16::try_from(port).map_err(|_| TransportError::InvalidPort(port))?;
        let socket = UdpSocket::bind((address, port)).map_err(|source| TransportError::Udp {
            address: address.to_owned(),
            port,
            source,
        })?;
        info!("Listening on {}:{}", address, port);

        Ok(UdpTransport {
            name: format!("{}:{}", address, port),
            socket,
            peer: None,
        })
    }

    /// The peer replies are currently sent to.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// The address the socket is bound to.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
impl Transport for UdpTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let (count, from) = self.socket.recv_from(buf)?;
        if self.peer != Some(from) {
            debug!("peer is now {}", from);
            self.peer = Some(from);
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self.peer {
            Some(peer) => self.socket.send_to(buf, peer),
            None => Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "no datagram received yet, peer unknown",
            )),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_port() {
        match UdpTransport::open("127.0.0.1", 70_000) {
            Err(TransportError::InvalidPort(70_000)) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn write_before_any_datagram_fails() {
        let mut transport = UdpTransport::open("127.0.0.1", 0).unwrap();
        let err = transport.write(b"hello").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn replies_to_last_peer() {
        let mut transport = UdpTransport::open("127.0.0.1", 0).unwrap();
        let local = transport.local_addr().unwrap();

        let target = UdpSocket::bind("127.0.0.1:0").unwrap();
        target.send_to(b"ping", local).unwrap();

        let mut buf = [0u8; 16];
        let count = transport.read(&mut buf).unwrap();
        assert_eq!(&buf[..count], b"ping");
        assert_eq!(transport.peer(), Some(target.local_addr().unwrap()));

        assert_eq!(transport.write(b"pong").unwrap(), 4);
        let (count, from) = target.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..count], b"pong");
        assert_eq!(from, local);
    }
}
