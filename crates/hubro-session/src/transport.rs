//! Transport seam between the session channel and the network.

use futures::future::BoxFuture;
use tokio::sync::mpsc;
use url::Url;

use crate::error::TransportError;

/// An established connection, as a pair of text frame queues.
///
/// Dropping `outgoing` asks the transport to close. The transport ends
/// `incoming` when the remote side closes, after yielding an error if the
/// connection failed.
#[derive(Debug)]
pub struct Link {
    /// Frames to write to the server.
    pub outgoing: mpsc::UnboundedSender<String>,
    /// Frames read from the server.
    pub incoming: mpsc::UnboundedReceiver<Result<String, TransportError>>,
}

/// Opens links to a session endpoint.
pub trait Connector: Send + Sync + 'static {
    /// Start connecting to `url`. Resolves once the handshake completes.
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, TransportError>>;
}
