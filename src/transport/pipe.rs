//! Named pipe pair emulating a serial line.
//!
//! Emulators such as QEMU expose a character device as two FIFOs: `A.in`,
//! which the emulator reads, and `A.out`, which it writes. Our input is their
//! output and vice versa. The emulator closes the pipes across some of its
//! lifecycle events, which shows up here as end-of-file; the dispatcher then
//! calls [`reopen`](super::Transport::reopen).

use std::{
    fs::{File, OpenOptions},
    io::{self, Read, Write},
    path::{Path, PathBuf},
};

use log::{debug, error};

use super::Transport;
use crate::error::TransportError;

/// Derive the `(input, output)` paths of a pipe pair from its base path.
pub fn pipe_paths(base: &str) -> (PathBuf, PathBuf) {
    (
        PathBuf::from(format!("{}.out", base)),
        PathBuf::from(format!("{}.in", base)),
    )
}

/// The two open ends of a pipe pair. They are always replaced together.
#[derive(Debug)]
pub struct PipeTransport {
    base: String,
    input_path: PathBuf,
    output_path: PathBuf,
    input: File,
    output: File,
}
impl PipeTransport {
    /// Open `base.out` for reading, then `base.in` for writing.
    pub fn open(base: &str) -> Result<Self, TransportError> {
        let (input_path, output_path) = pipe_paths(base);
        let (input, output) = connect_pipes(&input_path, &output_path)?;
        Ok(PipeTransport {
            base: base.to_owned(),
            input_path,
            output_path,
            input,
            output,
        })
    }

    pub fn input_path(&self) -> &Path {
        &self.input_path
    }

    pub fn output_path(&self) -> &Path {
        &self.output_path
    }
}
impl Transport for PipeTransport {
    fn name(&self) -> &str {
        &self.base
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let count = self.input.read(buf)?;
        if count == 0 && !buf.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("pipe `{}` closed by peer", self.input_path.display()),
            ));
        }
        Ok(count)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    /// Open fresh handles on both pipes. The stale ones are closed once both
    /// new ends are open; if either open fails the current handles are kept.
    fn reopen(&mut self) -> Result<(), TransportError> {
        let (input, output) = connect_pipes(&self.input_path, &self.output_path)?;
        self.input = input;
        self.output = output;
        debug!("pipes `{}` reopened", self.base);
        Ok(())
    }
}

fn connect_pipes(input_path: &Path, output_path: &Path) -> Result<(File, File), TransportError> {
    let input = File::open(input_path).map_err(|source| {
        error!("Can't open pipe '{}'", input_path.display());
        TransportError::Pipe {
            path: input_path.display().to_string(),
            source,
        }
    })?;
    let output = OpenOptions::new()
        .write(true)
        .open(output_path)
        .map_err(|source| {
            error!("Can't open pipe '{}'", output_path.display());
            TransportError::Pipe {
                path: output_path.display().to_string(),
                source,
            }
        })?;
    Ok((input, output))
}

// =============================================================================
// Unit Tests
// =============================================================================
