//! Listening sockets
//!
//! Both listener variants share one bind skeleton (IPv4, `SO_REUSEADDR`,
//! fixed backlog) and differ only in what `accept` wraps the stream in.

use super::tls::TlsContext;
use super::transport::{PlainTransport, Transport};
use super::{Error, Result, BACKLOG};
use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, TcpListener};
use std::time::Duration;

/// Source of accepted transports
///
/// Implemented by both listener variants so the connection loop is written
/// once, generic over the transport it receives.
pub trait Acceptor {
    type Transport: Transport + Send + 'static;

    /// Block until the next connection is accepted and ready for I/O
    fn accept(&self) -> Result<Self::Transport>;

    /// Address the listener is bound to
    fn local_addr(&self) -> Result<SocketAddr>;
}

/// Create a listening TCP socket on `addr`
fn bind_socket(addr: SocketAddr) -> Result<TcpListener> {
    let bind_error = |source| Error::Bind {
        port: addr.port(),
        source,
    };

    let domain = if addr.is_ipv4() {
        Domain::IPV4
    } else {
        Domain::IPV6
    };

    let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP)).map_err(bind_error)?;
    socket.set_reuse_address(true).map_err(bind_error)?;
    socket.bind(&SockAddr::from(addr)).map_err(bind_error)?;
    socket.listen(BACKLOG).map_err(bind_error)?;

    Ok(socket.into())
}

/// Address for `port` on every IPv4 interface
fn any_interface(port: u16) -> SocketAddr {
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))
}

/// Plain TCP listener
pub struct PlainListener {
    inner: TcpListener,
}

impl PlainListener {
    /// Bind `port` on all interfaces
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(any_interface(port))
    }

    /// Bind a specific address
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        Ok(PlainListener {
            inner: bind_socket(addr)?,
        })
    }
}

impl Acceptor for PlainListener {
    type Transport = PlainTransport;

    fn accept(&self) -> Result<PlainTransport> {
        let (stream, _) = self.inner.accept()?;
        Ok(PlainTransport::new(stream))
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Error::from)
    }
}

/// TLS listener
///
/// `accept` includes the TLS handshake; a failed or timed-out handshake is
/// reported as a failed accept.
pub struct TlsListener {
    inner: TcpListener,
    ctx: TlsContext,
    handshake_timeout: Option<Duration>,
}

impl TlsListener {
    /// Bind `port` on all interfaces
    pub fn bind(port: u16, ctx: TlsContext) -> Result<Self> {
        Self::bind_addr(any_interface(port), ctx)
    }

    /// Bind a specific address
    pub fn bind_addr(addr: SocketAddr, ctx: TlsContext) -> Result<Self> {
        if !ctx.is_server() {
            return Err(Error::Tls(super::tls::TlsError::InvalidConfig(
                "listener requires a server context".to_string(),
            )));
        }
        Ok(TlsListener {
            inner: bind_socket(addr)?,
            ctx,
            handshake_timeout: None,
        })
    }

    /// Bound each blocking handshake read and write
    ///
    /// `None` (the default) waits indefinitely.
    pub fn handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}

impl Acceptor for TlsListener {
    type Transport = super::tls::TlsTransport;

    fn accept(&self) -> Result<Self::Transport> {
        let (stream, _) = self.inner.accept()?;
        stream.set_read_timeout(self.handshake_timeout)?;
        stream.set_write_timeout(self.handshake_timeout)?;

        let transport = self.ctx.accept(stream)?;

        // Later reads are bounded by poll, not by socket timeouts
        if self.handshake_timeout.is_some() {
            transport.get_ref().set_read_timeout(None)?;
            transport.get_ref().set_write_timeout(None)?;
        }
        Ok(transport)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::connect_plain;
    use std::thread;

    fn loopback() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[test]
    fn test_plain_accept() {
        let listener = PlainListener::bind_addr(loopback()).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = thread::spawn(move || {
            let mut transport = connect_plain(addr).unwrap();
            transport.send(b"ping").unwrap();
        });

        let mut transport = listener.accept().unwrap();
        assert_eq!(transport.receive(16).unwrap(), b"ping");
        assert!(transport.peer_addr().is_some());

        client.join().unwrap();
    }

    #[test]
    fn test_bind_port_in_use() {
        let first = PlainListener::bind_addr(loopback()).unwrap();
        let addr = first.local_addr().unwrap();

        // SO_REUSEADDR does not allow two listeners on one port
        let result = PlainListener::bind_addr(addr);
        assert!(matches!(result, Err(Error::Bind { port, .. }) if port == addr.port()));
    }

    #[test]
    fn test_tls_listener_rejects_client_context() {
        let ctx = TlsContext::client_insecure().unwrap();
        assert!(TlsListener::bind_addr(loopback(), ctx).is_err());
    }

    #[test]
    fn test_tls_accept() {
        let ctx = TlsContext::builtin().unwrap();
        let listener = TlsListener::bind_addr(loopback(), ctx).unwrap();
        let addr = listener.local_addr().unwrap();

        let client = thread::spawn(move || {
            let ctx = TlsContext::client_insecure().unwrap();
            let stream = std::net::TcpStream::connect(addr).unwrap();
            let mut transport = ctx.connect(stream).unwrap();
            transport.send(b"secret").unwrap();
            transport.close().unwrap();
        });

        let mut transport = listener.accept().unwrap();
        assert_eq!(transport.receive(16).unwrap(), b"secret");
        transport.close().unwrap();

        client.join().unwrap();
    }

    #[test]
    fn test_tls_handshake_timeout() {
        let ctx = TlsContext::builtin().unwrap();
        let listener = TlsListener::bind_addr(loopback(), ctx)
            .unwrap()
            .handshake_timeout(Some(Duration::from_millis(200)));
        let addr = listener.local_addr().unwrap();

        // Connects but never sends a ClientHello
        let idle = std::net::TcpStream::connect(addr).unwrap();

        let start = std::time::Instant::now();
        assert!(listener.accept().is_err());
        assert!(start.elapsed() < Duration::from_secs(5));
        drop(idle);
    }

    #[test]
    fn test_handshake_timeout_cleared_after_accept() {
        let ctx = TlsContext::builtin().unwrap();
        let listener = TlsListener::bind_addr(loopback(), ctx)
            .unwrap()
            .handshake_timeout(Some(Duration::from_secs(5)));
        let addr = listener.local_addr().unwrap();

        let client = thread::spawn(move || {
            let ctx = TlsContext::client_insecure().unwrap();
            let stream = std::net::TcpStream::connect(addr).unwrap();
            let mut transport = ctx.connect(stream).unwrap();
            transport.close().unwrap();
        });

        let mut transport = listener.accept().unwrap();
        assert_eq!(transport.get_ref().read_timeout().unwrap(), None);
        assert_eq!(transport.get_ref().write_timeout().unwrap(), None);
        let _ = transport.close();

        client.join().unwrap();
    }
}
