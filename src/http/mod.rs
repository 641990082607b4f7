//! Static-file HTTP responder
//!
//! Only the request line is read: `<METHOD> <PATH>`. Headers, bodies and
//! keep-alive are ignored. Responses are line-oriented HTTP/1.1.
//!
//! # Examples
//!
//! ```no_run
//! use noble::http::StaticFiles;
//! use noble::net::PlainListener;
//! use noble::Server;
//!
//! let listener = PlainListener::bind(8080).unwrap();
//! Server::new(StaticFiles::new("www")).serve(&listener);
//! ```

pub mod parser;
pub mod static_files;

pub use parser::{parse_request_line, ParsedRequest};
pub use static_files::StaticFiles;

/// Request-line decode errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("Empty request")]
    Empty,

    #[error("Request line has no path")]
    MissingPath,
}

/// Longest method kept from a request line, in bytes
pub const MAX_METHOD_LEN: usize = 7;

/// Longest path kept from a request line, in bytes
pub const MAX_PATH_LEN: usize = 255;

/// Resource served for `/`
pub const DEFAULT_RESOURCE: &str = "index.html";

/// CRLF line ending
pub const CRLF: &str = "\r\n";
