//! Connection loop
//!
//! One accepted transport carries exactly one request/response exchange:
//!
//! ```text
//! Accepted -> Received -> (Parsed -> Dispatched | ParseFailed) -> Sent -> Closed
//! ```
//!
//! Parsing and dispatch belong to the `Service`; the loop only moves bytes
//! and guarantees that every accepted transport is closed exactly once. No
//! per-connection failure ever stops the loop.

use crate::http::CRLF;
use crate::net::{Acceptor, PollEvents, Transport, DEFAULT_RECEIVE_SIZE};
use bytes::Bytes;
use std::io;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Response classification shared by both protocols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Ok,
    BadRequest,
    MethodNotAllowed,
    Forbidden,
    NotFound,
    AuthTrue,
    AuthFalse,
}

impl Status {
    /// HTTP status code, for the static-file statuses
    pub fn code(&self) -> Option<u16> {
        match self {
            Status::Ok => Some(200),
            Status::BadRequest => Some(400),
            Status::Forbidden => Some(403),
            Status::NotFound => Some(404),
            Status::MethodNotAllowed => Some(405),
            Status::AuthTrue | Status::AuthFalse => None,
        }
    }

    /// Canonical reason phrase, for the static-file statuses
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::MethodNotAllowed => "Method Not Allowed",
            Status::AuthTrue => "true",
            Status::AuthFalse => "false",
        }
    }

    /// Plain-text explanation sent with an error status
    fn explanation(&self) -> &'static str {
        match self {
            Status::BadRequest => "Malformed HTTP request.",
            Status::MethodNotAllowed => "Only GET is allowed.",
            Status::Forbidden => "Access to subdirectories is not allowed.",
            Status::NotFound => "File not found.",
            Status::Ok | Status::AuthTrue | Status::AuthFalse => "",
        }
    }
}

/// A response built fresh for one request and discarded once sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    status: Status,
    body: Bytes,
}

impl Response {
    /// Response without payload
    pub fn new(status: Status) -> Self {
        Response {
            status,
            body: Bytes::new(),
        }
    }

    /// `Ok` response carrying a file
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Response {
            status: Status::Ok,
            body: body.into(),
        }
    }

    /// Credential verdict
    pub fn auth(matched: bool) -> Self {
        Response::new(if matched {
            Status::AuthTrue
        } else {
            Status::AuthFalse
        })
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Serialize to wire format
    ///
    /// File responses always claim `text/html`, whatever the file holds.
    pub fn to_wire(&self) -> Vec<u8> {
        match self.status {
            Status::AuthTrue => b"true\n".to_vec(),
            Status::AuthFalse => b"false\n".to_vec(),
            Status::Ok => {
                let head = format!(
                    "HTTP/1.1 200 OK{crlf}Content-Type: text/html{crlf}Content-Length: {}{crlf}{crlf}",
                    self.body.len(),
                    crlf = CRLF
                );
                let mut wire = Vec::with_capacity(head.len() + self.body.len());
                wire.extend_from_slice(head.as_bytes());
                wire.extend_from_slice(&self.body);
                wire
            }
            status => format!(
                "HTTP/1.1 {} {}{crlf}{crlf}{}",
                status.code().unwrap_or(500),
                status.reason_phrase(),
                status.explanation(),
                crlf = CRLF
            )
            .into_bytes(),
        }
    }
}

/// A protocol served over accepted transports
///
/// Implementations decode the received buffer themselves, so a decode
/// failure is just another response. They hold no per-connection state.
pub trait Service: Send + Sync + 'static {
    /// Short name used in log output
    fn name(&self) -> &'static str;

    /// Build the response for one received request buffer
    fn respond(&self, request: &[u8]) -> Response;
}

/// What happened to one accepted connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A response with this status was produced and a send was attempted
    Responded(Status),
    /// Nothing usable was received; nothing was sent
    NoRequest,
    /// Accept or handshake failed
    AcceptFailed,
    /// The transport was handed to a worker thread
    Spawned,
}

#[derive(Debug, Clone, Copy)]
struct ConnectionSettings {
    receive_size: usize,
    receive_timeout: Option<Duration>,
}

/// Connection loop driving a single `Service`
pub struct Server<S: Service> {
    service: Arc<S>,
    settings: ConnectionSettings,
    threaded: bool,
}

impl<S: Service> Server<S> {
    /// Create a serial, fully blocking server
    pub fn new(service: S) -> Self {
        Server {
            service: Arc::new(service),
            settings: ConnectionSettings {
                receive_size: DEFAULT_RECEIVE_SIZE,
                receive_timeout: None,
            },
            threaded: false,
        }
    }

    /// Maximum bytes read for a request
    pub fn receive_size(mut self, size: usize) -> Self {
        self.settings.receive_size = size.max(1);
        self
    }

    /// Give up on a connection that sends nothing within `timeout`
    ///
    /// `None` (the default) blocks indefinitely.
    pub fn receive_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.settings.receive_timeout = timeout;
        self
    }

    /// Serve each accepted transport on its own thread
    pub fn threaded(mut self, threaded: bool) -> Self {
        self.threaded = threaded;
        self
    }

    pub fn service(&self) -> &S {
        &self.service
    }

    /// Run the accept loop forever
    pub fn serve<A: Acceptor>(&self, listener: &A) -> ! {
        if let Ok(addr) = listener.local_addr() {
            info!(service = self.service.name(), %addr, "Waiting for connections");
        }
        loop {
            self.accept_one(listener);
        }
    }

    /// Accept and serve a single connection
    pub fn accept_one<A: Acceptor>(&self, listener: &A) -> Outcome {
        let transport = match listener.accept() {
            Ok(transport) => transport,
            Err(e) => {
                warn!("Accept failed: {}", e);
                return Outcome::AcceptFailed;
            }
        };

        if !self.threaded {
            return self.handle(transport);
        }

        // The worker receives the transport only once it is running, so a
        // failed spawn leaves it here to be closed
        let (handoff, inbox) = mpsc::channel::<A::Transport>();
        let service = Arc::clone(&self.service);
        let settings = self.settings;
        let spawned = thread::Builder::new()
            .name("noble-conn".to_string())
            .spawn(move || {
                if let Ok(transport) = inbox.recv() {
                    handle_connection(transport, service.as_ref(), settings);
                }
            });

        hand_off(transport, spawned.map(drop), &handoff)
    }

    /// Serve one request on `transport` and close it
    pub fn handle<T: Transport>(&self, transport: T) -> Outcome {
        handle_connection(transport, self.service.as_ref(), self.settings)
    }
}

/// Pass `transport` to a worker, or close it if there is none to take it
fn hand_off<T: Transport>(
    transport: T,
    spawned: io::Result<()>,
    handoff: &mpsc::Sender<T>,
) -> Outcome {
    let mut transport = match spawned {
        Ok(()) => match handoff.send(transport) {
            Ok(()) => return Outcome::Spawned,
            Err(mpsc::SendError(transport)) => {
                warn!("Connection worker exited before taking the connection");
                transport
            }
        },
        Err(e) => {
            warn!("Failed to spawn connection worker: {}", e);
            transport
        }
    };

    if let Err(e) = transport.close() {
        debug!("Close failed: {}", e);
    }
    Outcome::NoRequest
}

fn handle_connection<T: Transport, S: Service + ?Sized>(
    mut transport: T,
    service: &S,
    settings: ConnectionSettings,
) -> Outcome {
    let peer = transport
        .peer_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|| "<unknown>".to_string());
    debug!(%peer, "Client connected");

    let outcome = exchange(&mut transport, service, settings, &peer);

    if let Err(e) = transport.close() {
        debug!(%peer, "Close failed: {}", e);
    }
    outcome
}

fn exchange<T: Transport, S: Service + ?Sized>(
    transport: &mut T,
    service: &S,
    settings: ConnectionSettings,
    peer: &str,
) -> Outcome {
    if let Some(timeout) = settings.receive_timeout {
        match transport.poll(PollEvents::Read, Some(timeout)) {
            Ok(true) => {}
            Ok(false) => {
                warn!(%peer, "No request within {:?}", timeout);
                return Outcome::NoRequest;
            }
            Err(e) => {
                warn!(%peer, "Poll failed: {}", e);
                return Outcome::NoRequest;
            }
        }
    }

    let request = match transport.receive(settings.receive_size) {
        Ok(request) if request.is_empty() => {
            debug!(%peer, "Peer closed before sending a request");
            return Outcome::NoRequest;
        }
        Ok(request) => request,
        Err(e) => {
            warn!(%peer, "Receive failed: {}", e);
            return Outcome::NoRequest;
        }
    };
    debug!(%peer, bytes = request.len(), "Received request");

    let response = service.respond(&request);
    let status = response.status();
    info!(%peer, service = service.name(), ?status, "Responding");

    if let Err(e) = transport.send(&response.to_wire()) {
        warn!(%peer, "Send failed: {}", e);
    }

    Outcome::Responded(status)
}
