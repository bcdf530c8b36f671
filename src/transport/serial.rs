//! Serial line transport.

use std::{
    fmt,
    io::{self, Read, Write},
};

use log::{debug, info};
use serialport::SerialPort;

use super::Transport;
use crate::{error::TransportError, settings::Settings};

/// A configured and open serial port.
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}
impl SerialTransport {
    /// Open the serial device at `settings.address` at the baud rate given by
    /// `settings.speed_or_port`.
    pub fn open(settings: &Settings) -> Result<Self, TransportError> {
        let path = settings.address.clone();
        let port = serialport::new(&path, settings.speed_or_port)
            .data_bits(settings.data_bits)
            .stop_bits(settings.stop_bits)
            .parity(settings.parity)
            .flow_control(settings.flow_control)
            .timeout(settings.read_timeout)
            .open()
            .map_err(|source| TransportError::Serial {
                path: path.clone(),
                source,
            })?;

        info!("Connected to {} at {} baud", path, settings.speed_or_port);
        debug!("data_bits    : {:#?}", port.data_bits());
        debug!("stop_bits    : {:#?}", port.stop_bits());
        debug!("parity       : {:#?}", port.parity());
        debug!("flow control : {:#?}", port.flow_control());

        Ok(SerialTransport { name: path, port })
    }
}
impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.port.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.port.write(buf)
    }
}
impl fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let port = &self.port;
        debug_fmt_serialport!(port, f).finish()
    }
}
