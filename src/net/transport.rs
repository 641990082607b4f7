//! Transport operations abstraction
//!
//! This module provides the transport operations pattern that allows
//! transparent switching between plain TCP and TLS connections. The
//! connection loop and every protocol handler are written once against
//! `Transport` and never branch on which variant they hold.

use super::{Error, Result};
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::os::fd::{AsRawFd, RawFd};
use std::time::Duration;

/// Transport operations trait
///
/// One accepted duplex byte connection, plain or encrypted.
pub trait Transport {
    /// Poll the transport for events
    ///
    /// Returns true if the transport is ready for the requested operation.
    /// A `None` timeout blocks until ready.
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool>;

    /// Receive up to `max` bytes
    ///
    /// An empty buffer means the peer closed the connection.
    fn receive(&mut self, max: usize) -> Result<Vec<u8>>;

    /// Send the whole buffer, returning the number of bytes sent
    fn send(&mut self, buf: &[u8]) -> Result<usize>;

    /// Close the transport
    ///
    /// Calling this more than once is a no-op.
    fn close(&mut self) -> Result<()>;

    /// Address of the remote peer, if known
    fn peer_addr(&self) -> Option<SocketAddr>;
}

/// Poll events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollEvents {
    Read,
    Write,
    Both,
}

/// Poll a raw file descriptor with an optional timeout
pub(crate) fn poll_fd(fd: RawFd, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
    use libc::{poll, pollfd, POLLIN, POLLOUT};

    let mut pfd = pollfd {
        fd,
        events: match events {
            PollEvents::Read => POLLIN,
            PollEvents::Write => POLLOUT,
            PollEvents::Both => POLLIN | POLLOUT,
        },
        revents: 0,
    };

    let timeout_ms = timeout
        .map(|d| d.as_millis().min(i32::MAX as u128) as i32)
        .unwrap_or(-1); // -1 = infinite

    let result = unsafe { poll(&mut pfd as *mut pollfd, 1, timeout_ms) };

    if result < 0 {
        return Err(Error::Io(io::Error::last_os_error()));
    }

    Ok(result > 0)
}

/// Shut down both halves of a TCP stream, tolerating an already-gone peer
pub(crate) fn shutdown_stream(stream: &TcpStream) -> Result<()> {
    match stream.shutdown(Shutdown::Both) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotConnected => Ok(()),
        Err(e) => Err(Error::Io(e)),
    }
}

/// Plain TCP transport
pub struct PlainTransport {
    stream: TcpStream,
    closed: bool,
}

impl PlainTransport {
    /// Create a new plain transport from a TCP stream
    pub fn new(stream: TcpStream) -> Self {
        PlainTransport {
            stream,
            closed: false,
        }
    }

    /// Get a reference to the underlying stream
    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    /// Whether `close` has already been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Transport for PlainTransport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        poll_fd(self.stream.as_raw_fd(), events, timeout)
    }

    fn receive(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let mut buf = vec![0u8; max];
        let n = self.stream.read(&mut buf)?;
        buf.truncate(n);
        Ok(buf)
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        self.stream.write_all(buf)?;
        self.stream.flush()?;
        Ok(buf.len())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        shutdown_stream(&self.stream)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.peer_addr().ok()
    }
}

/// Open a plain client transport to `addr`
pub fn connect_plain<A: ToSocketAddrs>(addr: A) -> Result<PlainTransport> {
    let stream = TcpStream::connect(addr)?;
    Ok(PlainTransport::new(stream))
}
