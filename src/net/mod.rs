//! Network layer: transports and listeners
//!
//! The network layer uses the same operations abstraction for plain TCP and
//! TLS connections:
//!
//! - `Transport` defines the operations (poll, receive, send, close)
//! - `PlainTransport` and `TlsTransport` implement it
//! - `Listener` binds a port and yields one transport per accepted connection
//!
//! Nothing above this layer knows which kind of transport it is holding.
//!
//! # Examples
//!
//! ```no_run
//! use noble::net::{Acceptor, PlainListener, Transport};
//!
//! let listener = PlainListener::bind(8080).unwrap();
//! let mut transport = listener.accept().unwrap();
//! let request = transport.receive(2048).unwrap();
//! transport.send(&request).unwrap();
//! transport.close().unwrap();
//! ```

pub mod listener;
pub mod tls;
pub mod transport;

pub use listener::{Acceptor, PlainListener, TlsListener};
pub use transport::{connect_plain, PlainTransport, PollEvents, Transport};

/// Result type for network operations
pub type Result<T> = std::result::Result<T, Error>;

/// Network operation errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TLS error: {0}")]
    Tls(#[from] tls::TlsError),

    #[error("Failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Timeout")]
    Timeout,

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Number of pending connections the OS will queue for a listener
pub const BACKLOG: i32 = 10;

/// Default size of the single receive performed per connection
pub const DEFAULT_RECEIVE_SIZE: usize = 2048;
