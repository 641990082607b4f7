//! Integration tests for the TLS transport
//!
//! The same services that run over plain TCP run here over TLS with the
//! built-in development certificate.

use noble::auth::{CredentialCheck, MemoryCredentials};
use noble::http::StaticFiles;
use noble::net::tls::TlsContext;
use noble::net::{Acceptor, TlsListener, Transport};
use noble::server::{Outcome, Status};
use noble::Server;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

fn tls_listener() -> (TlsListener, SocketAddr) {
    let ctx = TlsContext::builtin().unwrap();
    let listener = TlsListener::bind_addr("127.0.0.1:0".parse().unwrap(), ctx).unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Send one request over TLS and read until the server closes
fn tls_roundtrip(addr: SocketAddr, request: &[u8]) -> Vec<u8> {
    let ctx = TlsContext::client_insecure().unwrap();
    let stream = TcpStream::connect(addr).unwrap();
    let mut transport = ctx.connect(stream).unwrap();
    transport.send(request).unwrap();

    let mut response = Vec::new();
    loop {
        let chunk = transport.receive(4096).unwrap();
        if chunk.is_empty() {
            break;
        }
        response.extend_from_slice(&chunk);
    }
    transport.close().unwrap();
    response
}

#[test]
fn test_static_file_over_tls() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "<h1>hi</h1>").unwrap();

    let (listener, addr) = tls_listener();
    let server = Server::new(StaticFiles::new(root.path()));
    let server_handle = thread::spawn(move || server.accept_one(&listener));

    let response = tls_roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n");
    assert_eq!(
        response,
        b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 11\r\n\r\n<h1>hi</h1>"
    );

    assert_eq!(
        server_handle.join().unwrap(),
        Outcome::Responded(Status::Ok)
    );
}

#[test]
fn test_credentials_over_tls() {
    let mut store = MemoryCredentials::new();
    store.insert("alice", "deadbeef");

    let (listener, addr) = tls_listener();
    let server = Server::new(CredentialCheck::new(store));
    let server_handle = thread::spawn(move || {
        (0..2)
            .map(|_| server.accept_one(&listener))
            .collect::<Vec<_>>()
    });

    assert_eq!(tls_roundtrip(addr, b"alice deadbeef"), b"true\n");
    assert_eq!(tls_roundtrip(addr, b"alice wrongvalue"), b"false\n");

    server_handle.join().unwrap();
}

#[test]
fn test_failed_handshake_does_not_stop_loop() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "ok").unwrap();

    let (listener, addr) = tls_listener();
    let server = Server::new(StaticFiles::new(root.path()));
    let server_handle = thread::spawn(move || {
        (0..2)
            .map(|_| server.accept_one(&listener))
            .collect::<Vec<_>>()
    });

    // A plain-text client cannot complete the handshake
    let mut plain = TcpStream::connect(addr).unwrap();
    plain.write_all(b"GET / HTTP/1.1\r\n\r\n").unwrap();
    let mut junk = Vec::new();
    let _ = plain.read_to_end(&mut junk);
    assert!(!junk.starts_with(b"HTTP/1.1"));

    let response = tls_roundtrip(addr, b"GET /index.html HTTP/1.1\r\n\r\n");
    assert!(response.ends_with(b"\r\n\r\nok"));

    let outcomes = server_handle.join().unwrap();
    assert_eq!(
        outcomes,
        vec![Outcome::AcceptFailed, Outcome::Responded(Status::Ok)]
    );
}

#[test]
fn test_idle_client_cannot_stall_handshake() {
    let root = tempfile::tempdir().unwrap();
    std::fs::write(root.path().join("index.html"), "ok").unwrap();

    let (listener, addr) = tls_listener();
    let listener = listener.handshake_timeout(Some(Duration::from_millis(100)));
    let server = Server::new(StaticFiles::new(root.path()))
        .receive_timeout(Some(Duration::from_millis(100)));
    let server_handle = thread::spawn(move || {
        (0..2)
            .map(|_| server.accept_one(&listener))
            .collect::<Vec<_>>()
    });

    // Connects but never starts the handshake
    let start = Instant::now();
    let mut idle = TcpStream::connect(addr).unwrap();
    idle.set_read_timeout(Some(Duration::from_secs(5))).unwrap();
    let mut junk = Vec::new();
    let _ = idle.read_to_end(&mut junk);
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!junk.starts_with(b"HTTP/1.1"));

    // The loop has moved on and serves the next client
    let response = tls_roundtrip(addr, b"GET / HTTP/1.1\r\n\r\n");
    assert!(response.ends_with(b"\r\n\r\nok"));

    let outcomes = server_handle.join().unwrap();
    assert_eq!(
        outcomes,
        vec![Outcome::AcceptFailed, Outcome::Responded(Status::Ok)]
    );
}
