//! Static-file dispatch
//!
//! Requests may only name a single file directly inside the content root.

use super::{parse_request_line, ParsedRequest, DEFAULT_RESOURCE};
use crate::server::{Response, Service, Status};
use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Serves files from one content root
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    /// Serve files found directly under `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        StaticFiles { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a request path to a file name inside the content root
    ///
    /// One leading `/` is dropped and an empty path becomes the default
    /// resource. Anything still containing `/` is refused; there is no
    /// canonicalisation, so `..` never gets a chance to escape. The bytes
    /// are never decoded.
    pub fn resolve<'a>(&self, path: &'a [u8]) -> Result<&'a [u8], Status> {
        let segment = path.strip_prefix(b"/").unwrap_or(path);
        let segment = if segment.is_empty() {
            DEFAULT_RESOURCE.as_bytes()
        } else {
            segment
        };

        if segment.contains(&b'/') {
            return Err(Status::Forbidden);
        }
        Ok(segment)
    }

    /// Produce the response for a decoded request
    pub fn dispatch(&self, request: &ParsedRequest) -> Response {
        if request.method() != b"GET" {
            return Response::new(Status::MethodNotAllowed);
        }

        let segment = match self.resolve(request.path()) {
            Ok(segment) => segment,
            Err(status) => return Response::new(status),
        };

        let full_path = self.root.join(OsStr::from_bytes(segment));
        match std::fs::read(&full_path) {
            Ok(contents) => Response::ok(contents),
            Err(e) => {
                // Missing, unreadable and directories all look the same to clients
                debug!(path = %full_path.display(), "Failed to read file: {}", e);
                Response::new(Status::NotFound)
            }
        }
    }
}

impl Service for StaticFiles {
    fn name(&self) -> &'static str {
        "static"
    }

    fn respond(&self, request: &[u8]) -> Response {
        match parse_request_line(request) {
            Ok(parsed) => self.dispatch(&parsed),
            Err(e) => {
                debug!("Rejecting request: {}", e);
                Response::new(Status::BadRequest)
            }
        }
    }
}
