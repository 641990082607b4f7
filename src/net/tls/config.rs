//! TLS context construction
//!
//! The server context is built once at startup and shared, read-only, by
//! every accepted connection.

use super::{dev_cert::DEV_CERT_PEM, Result, TlsError, TlsTransport};
use openssl::pkey::PKey;
use openssl::ssl::{SslContext, SslContextBuilder, SslFiletype, SslMethod, SslVerifyMode};
use openssl::x509::X509;
use std::net::TcpStream;
use std::path::Path;

/// Lowest protocol version a context will negotiate
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TlsVersion {
    /// TLS 1.2
    Tls12,
    /// TLS 1.3
    Tls13,
}

impl TlsVersion {
    /// Get OpenSSL protocol version constant
    pub fn to_openssl_version(&self) -> openssl::ssl::SslVersion {
        use openssl::ssl::SslVersion;
        match self {
            TlsVersion::Tls12 => SslVersion::TLS1_2,
            TlsVersion::Tls13 => SslVersion::TLS1_3,
        }
    }
}

/// TLS context (immutable after building)
#[derive(Clone)]
pub struct TlsContext {
    pub(crate) ctx: SslContext,
    pub(crate) is_server: bool,
}

impl std::fmt::Debug for TlsContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsContext")
            .field("is_server", &self.is_server)
            .finish_non_exhaustive()
    }
}

impl TlsContext {
    /// Create a new server context builder
    pub fn server() -> Result<ServerContextBuilder> {
        ServerContextBuilder::new()
    }

    /// Server context from a PEM certificate file and a PEM private key file
    pub fn from_pem_files<C: AsRef<Path>, K: AsRef<Path>>(cert: C, key: K) -> Result<Self> {
        Self::server()?.cert_file(cert)?.key_file(key)?.build()
    }

    /// Server context using the embedded development certificate
    pub fn builtin() -> Result<Self> {
        Self::server()?.dev_cert()?.build()
    }

    /// Client context that does not verify the server certificate
    ///
    /// Used by tests and tooling talking to a server running `--self-signed`.
    pub fn client_insecure() -> Result<Self> {
        let mut builder = SslContextBuilder::new(SslMethod::tls_client())?;
        builder.set_verify(SslVerifyMode::NONE);
        Ok(TlsContext {
            ctx: builder.build(),
            is_server: false,
        })
    }

    /// Whether this is a server-side context
    pub fn is_server(&self) -> bool {
        self.is_server
    }

    /// Accept a client connection with TLS (server-side handshake)
    pub fn accept(&self, stream: TcpStream) -> Result<TlsTransport> {
        if !self.is_server {
            return Err(TlsError::InvalidConfig(
                "Cannot use client context for server accept".to_string(),
            ));
        }
        TlsTransport::accept(stream, self)
    }

    /// Connect to a server with TLS (client-side handshake)
    pub fn connect(&self, stream: TcpStream) -> Result<TlsTransport> {
        if self.is_server {
            return Err(TlsError::InvalidConfig(
                "Cannot use server context for client connection".to_string(),
            ));
        }
        TlsTransport::connect(stream, self)
    }
}

/// Server context builder
pub struct ServerContextBuilder {
    ctx_builder: SslContextBuilder,
    has_cert: bool,
    has_key: bool,
}

impl ServerContextBuilder {
    fn new() -> Result<Self> {
        let mut ctx_builder = SslContextBuilder::new(SslMethod::tls_server())?;
        ctx_builder.set_min_proto_version(Some(TlsVersion::Tls12.to_openssl_version()))?;

        Ok(ServerContextBuilder {
            ctx_builder,
            has_cert: false,
            has_key: false,
        })
    }

    /// Set the lowest accepted protocol version
    pub fn min_version(mut self, version: TlsVersion) -> Result<Self> {
        self.ctx_builder
            .set_min_proto_version(Some(version.to_openssl_version()))?;
        Ok(self)
    }

    /// Load the server certificate from a PEM file
    pub fn cert_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        self.ctx_builder
            .set_certificate_file(path, SslFiletype::PEM)
            .map_err(|e| {
                TlsError::Certificate(format!(
                    "Failed to load certificate {}: {}",
                    path.display(),
                    e
                ))
            })?;
        self.has_cert = true;
        Ok(self)
    }

    /// Load the private key from a PEM file
    pub fn key_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let path = path.as_ref();
        self.ctx_builder
            .set_private_key_file(path, SslFiletype::PEM)
            .map_err(|e| {
                TlsError::Certificate(format!(
                    "Failed to load private key {}: {}",
                    path.display(),
                    e
                ))
            })?;
        self.has_key = true;
        Ok(self)
    }

    /// Use the embedded development certificate and key
    pub fn dev_cert(mut self) -> Result<Self> {
        let cert = X509::from_pem(DEV_CERT_PEM.as_bytes()).map_err(|e| {
            TlsError::Certificate(format!("Failed to load built-in certificate: {}", e))
        })?;
        self.ctx_builder.set_certificate(&cert)?;

        let key = PKey::private_key_from_pem(DEV_CERT_PEM.as_bytes()).map_err(|e| {
            TlsError::Certificate(format!("Failed to load built-in private key: {}", e))
        })?;
        self.ctx_builder.set_private_key(&key)?;

        self.has_cert = true;
        self.has_key = true;
        Ok(self)
    }

    /// Build the context, checking that the key matches the certificate
    pub fn build(self) -> Result<TlsContext> {
        if !self.has_cert {
            return Err(TlsError::InvalidConfig("no certificate loaded".to_string()));
        }
        if !self.has_key {
            return Err(TlsError::InvalidConfig("no private key loaded".to_string()));
        }
        self.ctx_builder
            .check_private_key()
            .map_err(|_| TlsError::KeyMismatch)?;

        Ok(TlsContext {
            ctx: self.ctx_builder.build(),
            is_server: true,
        })
    }
}
