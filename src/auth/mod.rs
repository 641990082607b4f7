//! Credential-verification responder
//!
//! The client sends one line, `<username> <candidateHash>`, and gets back
//! `true\n` or `false\n`. Malformed input, unknown users and wrong hashes
//! all answer `false\n` so a client cannot tell them apart.
//!
//! The hash is computed by the client; this side never sees a password.
//! Hashes are compared with plain byte equality, which is not constant
//! time.

pub mod store;

pub use store::{MemoryCredentials, SqliteCredentials};

use crate::server::{Response, Service};
use tracing::{debug, warn};

/// Result type for credential store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Credential store errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Credential store lock poisoned")]
    Poisoned,
}

/// Read-only access to stored password hashes
pub trait CredentialLookup: Send + Sync + 'static {
    /// Stored hash for `username`, or `None` if there is no such user
    fn password_hash(&self, username: &str) -> Result<Option<String>>;
}

/// Split a credential line into username and candidate hash
///
/// Decoding stops at the first NUL byte. Tokens after the second are
/// ignored.
pub fn parse_credential_line(line: &[u8]) -> Option<(&str, &[u8])> {
    let end = line.iter().position(|&b| b == 0).unwrap_or(line.len());

    let mut tokens = line[..end]
        .split(|b| b.is_ascii_whitespace())
        .filter(|token| !token.is_empty());

    let username = std::str::from_utf8(tokens.next()?).ok()?;
    let candidate = tokens.next()?;
    Some((username, candidate))
}

/// Answers credential checks against a `CredentialLookup`
pub struct CredentialCheck<L: CredentialLookup> {
    lookup: L,
}

impl<L: CredentialLookup> CredentialCheck<L> {
    pub fn new(lookup: L) -> Self {
        CredentialCheck { lookup }
    }

    pub fn lookup(&self) -> &L {
        &self.lookup
    }

    /// Whether `line` names a known user with exactly the stored hash
    pub fn verify(&self, line: &[u8]) -> bool {
        let (username, candidate) = match parse_credential_line(line) {
            Some(parts) => parts,
            None => {
                debug!("Malformed credential line");
                return false;
            }
        };

        match self.lookup.password_hash(username) {
            Ok(Some(stored)) => stored.as_bytes() == candidate,
            Ok(None) => {
                debug!(username, "Unknown user");
                false
            }
            Err(e) => {
                warn!(username, "Credential lookup failed: {}", e);
                false
            }
        }
    }
}

impl<L: CredentialLookup> Service for CredentialCheck<L> {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn respond(&self, request: &[u8]) -> Response {
        Response::auth(self.verify(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::Status;

    fn check() -> CredentialCheck<MemoryCredentials> {
        let mut store = MemoryCredentials::new();
        store.insert("alice", "deadbeef");
        CredentialCheck::new(store)
    }

    struct BrokenStore;

    impl CredentialLookup for BrokenStore {
        fn password_hash(&self, _username: &str) -> Result<Option<String>> {
            Err(StoreError::Poisoned)
        }
    }

    #[test]
    fn test_parse_credential_line() {
        assert_eq!(
            parse_credential_line(b"alice deadbeef\n"),
            Some(("alice", &b"deadbeef"[..]))
        );
        assert_eq!(
            parse_credential_line(b"  alice\tdeadbeef extra"),
            Some(("alice", &b"deadbeef"[..]))
        );
        assert_eq!(parse_credential_line(b"alice"), None);
        assert_eq!(parse_credential_line(b""), None);
        assert_eq!(parse_credential_line(b"alice\0deadbeef"), None);
    }

    #[test]
    fn test_alice_scenario() {
        let check = check();
        assert_eq!(check.respond(b"alice deadbeef").to_wire(), b"true\n");
        assert_eq!(check.respond(b"alice wrongvalue").to_wire(), b"false\n");
        assert_eq!(check.respond(b"bob deadbeef").to_wire(), b"false\n");
    }

    #[test]
    fn test_single_character_difference() {
        let check = check();
        assert!(check.verify(b"alice deadbeef\r\n"));
        assert!(!check.verify(b"alice deadbeeF"));
        assert!(!check.verify(b"alice deadbee"));
        assert!(!check.verify(b"alice deadbeeff"));
        assert!(!check.verify(b"Alice deadbeef"));
    }

    #[test]
    fn test_malformed_line_is_false() {
        let check = check();
        assert_eq!(check.respond(b"alice").status(), Status::AuthFalse);
        assert_eq!(check.respond(b"   ").status(), Status::AuthFalse);
        assert_eq!(check.respond(b"\xff\xfe deadbeef").status(), Status::AuthFalse);
    }

    #[test]
    fn test_lookup_error_is_false() {
        let check = CredentialCheck::new(BrokenStore);
        assert_eq!(check.respond(b"alice deadbeef").to_wire(), b"false\n");
    }
}
