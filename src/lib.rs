//! noble - minimal plaintext/TLS connection server
//!
//! This crate provides a transport-agnostic, single-request connection loop
//! and two small protocols that run on top of it: a static-file HTTP
//! responder and a credential-verification responder.

pub mod auth;
pub mod config;
pub mod http;
pub mod net;
pub mod server;

pub use server::{Response, Server, Service};
