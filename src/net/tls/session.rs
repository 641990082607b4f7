//! TLS transport
//!
//! This module implements the `Transport` trait for TLS connections. The
//! handshake is completed before a `TlsTransport` is handed out, so the
//! first `receive` already reads application data.

use super::{Result as TlsResult, TlsContext, TlsError};
use crate::net::transport::{poll_fd, shutdown_stream, PollEvents, Transport};
use crate::net::{Error, Result};
use openssl::ssl::{Ssl, SslStream};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::os::fd::AsRawFd;
use std::time::Duration;

/// TLS transport
///
/// Wraps an OpenSSL `SslStream` and provides poll/receive/send/close.
pub struct TlsTransport {
    stream: SslStream<TcpStream>,
    failed: bool,
    closed: bool,
}

impl TlsTransport {
    /// Perform the server-side handshake on an accepted stream
    pub(crate) fn accept(tcp_stream: TcpStream, ctx: &TlsContext) -> TlsResult<Self> {
        let ssl = Ssl::new(&ctx.ctx)?;

        // Blocking handshake; the openssl crate drives it to completion.
        let stream = ssl
            .accept(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Accept failed: {}", e)))?;

        Ok(TlsTransport {
            stream,
            failed: false,
            closed: false,
        })
    }

    /// Perform the client-side handshake on a connected stream
    pub(crate) fn connect(tcp_stream: TcpStream, ctx: &TlsContext) -> TlsResult<Self> {
        let ssl = Ssl::new(&ctx.ctx)?;

        let stream = ssl
            .connect(tcp_stream)
            .map_err(|e| TlsError::HandshakeFailed(format!("Connection failed: {}", e)))?;

        Ok(TlsTransport {
            stream,
            failed: false,
            closed: false,
        })
    }

    /// Negotiated protocol version, e.g. "TLSv1.3"
    pub fn version(&self) -> &'static str {
        self.stream.ssl().version_str()
    }

    /// Check if a TLS operation failed
    pub fn failed(&self) -> bool {
        self.failed
    }

    /// Whether `close` has already been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get reference to underlying TCP stream
    pub fn get_ref(&self) -> &TcpStream {
        self.stream.get_ref()
    }
}

impl Transport for TlsTransport {
    fn poll(&self, events: PollEvents, timeout: Option<Duration>) -> Result<bool> {
        // Decrypted bytes may already be buffered inside the session
        if matches!(events, PollEvents::Read | PollEvents::Both) && self.stream.ssl().pending() > 0
        {
            return Ok(true);
        }

        poll_fd(self.stream.get_ref().as_raw_fd(), events, timeout)
    }

    fn receive(&mut self, max: usize) -> Result<Vec<u8>> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        let mut buf = vec![0u8; max];
        match self.stream.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    fn send(&mut self, buf: &[u8]) -> Result<usize> {
        if self.closed {
            return Err(Error::ConnectionClosed);
        }
        match self.stream.write_all(buf).and_then(|_| self.stream.flush()) {
            Ok(()) => Ok(buf.len()),
            Err(e) => {
                self.failed = true;
                Err(Error::Io(e))
            }
        }
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        // Send close_notify only on a healthy session
        if !self.failed {
            let _ = self.stream.shutdown();
        }

        shutdown_stream(self.stream.get_ref())
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        self.stream.get_ref().peer_addr().ok()
    }
}
