//! In-memory connector for testing.
//!
//! Provides [`MockConnector`] for driving sessions without a network.

use std::sync::{Arc, Mutex, PoisonError};

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;
use crate::transport::{Connector, Link};

/// Mock connector for testing.
///
/// Every successful connect hands a [`MockServer`] to the paired
/// [`MockListener`]. Connects fail once the listener is dropped.
///
/// # Example
///
/// ```ignore
/// let (connector, mut listener) = MockConnector::new();
/// let channel = Channel::open(&connector, url);
/// let mut server = listener.accept().await.unwrap();
/// server.push(r#"{"type":"reload"}"#);
/// ```
#[derive(Clone, Debug)]
pub struct MockConnector {
    state: Arc<Mutex<MockState>>,
    accepted: mpsc::UnboundedSender<MockServer>,
}

#[derive(Debug, Default)]
struct MockState {
    attempts: usize,
    refusals: usize,
}

impl MockConnector {
    /// Create a connector and the listener receiving its connections.
    #[must_use]
    pub fn new() -> (Self, MockListener) {
        let (accepted, incoming) = mpsc::unbounded_channel();
        let connector = Self {
            state: Arc::new(Mutex::new(MockState::default())),
            accepted,
        };
        (connector, MockListener { incoming })
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.lock().refusals = count;
    }

    /// Number of connection attempts so far, including refused ones.
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MockConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, TransportError>> {
        let refused = {
            let mut state = self.lock();
            state.attempts += 1;
            if state.refusals > 0 {
                state.refusals -= 1;
                true
            } else {
                false
            }
        };

        let result = if refused {
            Err(TransportError::Refused(url.to_string()))
        } else {
            let (out_tx, out_rx) = mpsc::unbounded_channel();
            let (in_tx, in_rx) = mpsc::unbounded_channel();
            let server = MockServer {
                received: out_rx,
                push: in_tx,
            };
            self.accepted
                .send(server)
                .map(|()| Link {
                    outgoing: out_tx,
                    incoming: in_rx,
                })
                .map_err(|_| TransportError::Refused(url.to_string()))
        };

        Box::pin(std::future::ready(result))
    }
}

/// Receives the server side of each mock connection.
#[derive(Debug)]
pub struct MockListener {
    incoming: mpsc::UnboundedReceiver<MockServer>,
}

impl MockListener {
    /// Wait for the next connection.
    pub async fn accept(&mut self) -> Option<MockServer> {
        self.incoming.recv().await
    }

    /// Take a connection if one is already established.
    pub fn try_accept(&mut self) -> Option<MockServer> {
        self.incoming.try_recv().ok()
    }
}

/// Server side of one mock connection. Dropping it closes the connection.
#[derive(Debug)]
pub struct MockServer {
    received: mpsc::UnboundedReceiver<String>,
    push: mpsc::UnboundedSender<Result<String, TransportError>>,
}

impl MockServer {
    /// Send a text frame to the client.
    pub fn push(&self, frame: &str) {
        let _ = self.push.send(Ok(frame.to_owned()));
    }

    /// Fail the connection with a transport error.
    pub fn fail(&self, reason: &str) {
        let _ = self.push.send(Err(TransportError::Refused(reason.to_owned())));
    }

    /// Wait for the next frame sent by the client.
    ///
    /// Returns `None` once the client has closed the connection.
    pub async fn recv(&mut self) -> Option<String> {
        self.received.recv().await
    }

    /// Take a frame if the client already sent one.
    pub fn try_recv(&mut self) -> Option<String> {
        self.received.try_recv().ok()
    }

    /// Close the connection from the server side.
    pub fn disconnect(self) {
        drop(self);
    }
}
