//! TLS support for server connections
//!
//! This module layers OpenSSL sessions over accepted TCP streams so that the
//! HTTPS mode of the server reuses every line of the plain-text code path:
//!
//! 1. `TlsContext` holds the server certificate and key, checked to match
//! 2. `TlsTransport` implements the `Transport` trait for encrypted I/O
//! 3. The connection loop and protocol handlers remain unchanged
//!
//! # Examples
//!
//! ```no_run
//! use noble::net::tls::TlsContext;
//! use noble::net::{Acceptor, TlsListener};
//!
//! let ctx = TlsContext::from_pem_files("cert.pem", "key.pem").unwrap();
//! let listener = TlsListener::bind(8443, ctx).unwrap();
//! let transport = listener.accept().unwrap();
//! ```

pub mod config;
pub mod dev_cert;
pub mod session;

pub use config::{ServerContextBuilder, TlsContext, TlsVersion};
pub use session::TlsTransport;

/// Result type for TLS operations
pub type Result<T> = std::result::Result<T, TlsError>;

/// TLS errors
#[derive(Debug, thiserror::Error)]
pub enum TlsError {
    #[error("OpenSSL error: {0}")]
    OpenSsl(#[from] openssl::error::ErrorStack),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Certificate error: {0}")]
    Certificate(String),

    #[error("Private key does not match the certificate")]
    KeyMismatch,

    #[error("Handshake failed: {0}")]
    HandshakeFailed(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
