//! Request-line parsing
//!
//! The receive buffer is treated like a C string: decoding stops at the
//! first NUL byte. Tokens are separated by ASCII whitespace, so the
//! request line and whatever headers follow it share one token stream;
//! only the first two tokens matter. Tokens stay raw bytes; nothing is
//! decoded or rewritten.

use super::{ParseError, MAX_METHOD_LEN, MAX_PATH_LEN};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

/// Method and path decoded from a request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    method: Vec<u8>,
    path: Vec<u8>,
}

impl ParsedRequest {
    /// Build a request directly, applying the same bounds as the parser
    pub fn new(method: &[u8], path: &[u8]) -> Self {
        ParsedRequest {
            method: bounded(method, MAX_METHOD_LEN),
            path: bounded(path, MAX_PATH_LEN),
        }
    }

    pub fn method(&self) -> &[u8] {
        &self.method
    }

    pub fn path(&self) -> &[u8] {
        &self.path
    }

    /// The path as an OS string, byte for byte
    pub fn path_os(&self) -> &OsStr {
        OsStr::from_bytes(&self.path)
    }
}

/// Keep at most `max` bytes of a token
///
/// Oversized tokens are cut, not rejected, even through a multi-byte
/// character.
fn bounded(token: &[u8], max: usize) -> Vec<u8> {
    token[..token.len().min(max)].to_vec()
}

/// Decode `<METHOD> <PATH>` from the start of `buf`
///
/// Format: METHOD PATH [anything]
/// Example: GET /index.html HTTP/1.1\r\n
pub fn parse_request_line(buf: &[u8]) -> Result<ParsedRequest, ParseError> {
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());

    let mut tokens = buf[..end]
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty());

    let method = tokens.next().ok_or(ParseError::Empty)?;
    let path = tokens.next().ok_or(ParseError::MissingPath)?;

    Ok(ParsedRequest::new(method, path))
}
