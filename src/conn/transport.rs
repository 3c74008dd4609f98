//! Transport seam: line-oriented session I/O.
//!
//! Production transport is a Unix domain socket carrying ndjson lines. The
//! trait exists so the connection logic can be exercised against in-process
//! fakes.

use std::io::{ErrorKind, Read, Write};
use std::os::unix::net::UnixStream;
use std::path::PathBuf;

use thiserror::Error;

/// How long `recv_line` may wait.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wait {
    /// Block until a full line or the session dies.
    Blocking,
    /// Return `Ok(None)` immediately if no full line is buffered.
    NonBlocking,
}

/// One session's raw line I/O.
pub trait Transport: Send {
    /// Establish (or re-establish) the session.
    fn open(&mut self) -> Result<(), TransportError>;

    /// Send one line (newline appended by the transport).
    fn send_line(&mut self, line: &str) -> Result<(), TransportError>;

    /// Receive one line without its newline.
    ///
    /// `Ok(None)` means nothing available right now (NonBlocking only).
    /// `Err(Closed)` means the peer ended the session.
    fn recv_line(&mut self, wait: Wait) -> Result<Option<String>, TransportError>;

    /// Tear the session down. Safe to call when not open.
    fn shutdown(&mut self);
}

/// Transport-level errors.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TransportError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("session closed by peer")]
    Closed,

    #[error("transport not open")]
    NotOpen,
}

// =============================================================================
// UnixTransport - production transport
// =============================================================================

/// ndjson over a Unix domain socket.
pub struct UnixTransport {
    path: PathBuf,
    stream: Option<UnixStream>,
    buf: Vec<u8>,
}

impl UnixTransport {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            stream: None,
            buf: Vec::new(),
        }
    }

    /// Transport on the default UI socket path.
    pub fn default_socket() -> Self {
        Self::new(crate::paths::socket_path())
    }

    fn take_buffered_line(&mut self) -> Option<String> {
        let pos = self.buf.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.buf.drain(..=pos).collect();
        line.pop();
        Some(String::from_utf8_lossy(&line).into_owned())
    }
}

impl Transport for UnixTransport {
    fn open(&mut self) -> Result<(), TransportError> {
        self.buf.clear();
        self.stream = Some(UnixStream::connect(&self.path)?);
        Ok(())
    }

    fn send_line(&mut self, line: &str) -> Result<(), TransportError> {
        let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
        stream.write_all(line.as_bytes())?;
        stream.write_all(b"\n")?;
        Ok(())
    }

    fn recv_line(&mut self, wait: Wait) -> Result<Option<String>, TransportError> {
        loop {
            if let Some(line) = self.take_buffered_line() {
                return Ok(Some(line));
            }

            let stream = self.stream.as_mut().ok_or(TransportError::NotOpen)?;
            stream.set_nonblocking(wait == Wait::NonBlocking)?;

            let mut chunk = [0u8; 4096];
            match stream.read(&mut chunk) {
                Ok(0) => return Err(TransportError::Closed),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(TransportError::Io(e)),
            }
        }
    }

    fn shutdown(&mut self) {
        if let Some(stream) = self.stream.take() {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
        self.buf.clear();
    }
}
