//! Server configuration
//!
//! Everything the process needs to start, validated once before the
//! listener is bound. Invalid configuration is a startup error; nothing
//! here is consulted after the accept loop starts.

use crate::net::tls::{TlsContext, TlsError};
use crate::net::DEFAULT_RECEIVE_SIZE;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Content root {0} is not a directory")]
    ContentRoot(PathBuf),

    #[error("Receive size must be at least one byte")]
    InvalidReceiveSize,

    #[error("Receive timeout must be greater than zero")]
    InvalidTimeout,
}

/// Wire transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TransportMode {
    /// Plain TCP
    Http,
    /// TLS over TCP
    Https,
}

/// Protocol served on accepted connections
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ServiceKind {
    /// Static files from the content root
    Static,
    /// Credential checks against the user database
    Auth,
}

/// Startup configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub mode: TransportMode,
    pub service: ServiceKind,
    pub content_root: PathBuf,
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
    /// Use the embedded development certificate instead of the files
    pub self_signed: bool,
    pub database: PathBuf,
    pub receive_size: usize,
    pub receive_timeout: Option<Duration>,
    pub threaded: bool,
}

impl ServerConfig {
    /// Defaults for `port` and `mode`
    pub fn new(port: u16, mode: TransportMode) -> Self {
        ServerConfig {
            port,
            mode,
            service: ServiceKind::Static,
            content_root: PathBuf::from("www"),
            cert_file: PathBuf::from("cert.pem"),
            key_file: PathBuf::from("key.pem"),
            self_signed: false,
            database: PathBuf::from("auth.db"),
            receive_size: DEFAULT_RECEIVE_SIZE,
            receive_timeout: None,
            threaded: false,
        }
    }

    /// Check settings that can be checked without side effects
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.receive_size == 0 {
            return Err(ConfigError::InvalidReceiveSize);
        }
        if self.receive_timeout == Some(Duration::ZERO) {
            return Err(ConfigError::InvalidTimeout);
        }
        if self.service == ServiceKind::Static && !self.content_root.is_dir() {
            return Err(ConfigError::ContentRoot(self.content_root.clone()));
        }
        Ok(())
    }

    /// Build the TLS context for HTTPS mode
    ///
    /// Returns `None` in HTTP mode.
    pub fn tls_context(&self) -> Result<Option<TlsContext>, TlsError> {
        match self.mode {
            TransportMode::Http => Ok(None),
            TransportMode::Https if self.self_signed => TlsContext::builtin().map(Some),
            TransportMode::Https => {
                TlsContext::from_pem_files(&self.cert_file, &self.key_file).map(Some)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::new(8080, TransportMode::Http);
        assert_eq!(config.service, ServiceKind::Static);
        assert_eq!(config.content_root, PathBuf::from("www"));
        assert_eq!(config.receive_size, 2048);
        assert_eq!(config.receive_timeout, None);
        assert!(!config.threaded);
    }

    #[test]
    fn test_validate_content_root() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ServerConfig::new(8080, TransportMode::Http);
        config.content_root = dir.path().to_path_buf();
        assert!(config.validate().is_ok());

        config.content_root = dir.path().join("missing");
        assert!(matches!(config.validate(), Err(ConfigError::ContentRoot(_))));

        // The auth service never reads the content root
        config.service = ServiceKind::Auth;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_limits() {
        let mut config = ServerConfig::new(8080, TransportMode::Http);
        config.service = ServiceKind::Auth;

        config.receive_size = 0;
        assert!(matches!(config.validate(), Err(ConfigError::InvalidReceiveSize)));

        config.receive_size = 16;
        config.receive_timeout = Some(Duration::ZERO);
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTimeout)));
    }

    #[test]
    fn test_tls_context_by_mode() {
        let mut config = ServerConfig::new(8443, TransportMode::Http);
        assert!(config.tls_context().unwrap().is_none());

        config.mode = TransportMode::Https;
        config.self_signed = true;
        assert!(config.tls_context().unwrap().is_some());

        config.self_signed = false;
        config.cert_file = PathBuf::from("/nonexistent/cert.pem");
        assert!(config.tls_context().is_err());
    }
}
