//! Live-editing session client for Hubro content servers.
//!
//! Streams markdown edits to the server over a persistent WebSocket,
//! receives rendered previews and reload notifications back, and
//! reconnects transparently when the connection drops.
//!
//! # Architecture
//!
//! - [`Channel`] owns one connection and its `connecting → open → closed`
//!   state machine.
//! - [`Supervisor`] reopens the channel after a fixed delay whenever it
//!   closes and publishes the [`ConnectionStatus`].
//! - [`Router`] maps inbound messages to [`EditorSurface`] calls.
//! - [`Session`] runs the event loop that debounces previews, dispatches
//!   inbound messages and sends the initial `load`.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hubro_session::{DocumentRef, Session, WsConnector};
//!
//! let config = hubro_config::Config::load(None, None)?;
//! let session = Session::new(&config, DocumentRef::new("post.md"), Arc::new(WsConnector))?;
//! let handle = session.start(my_surface);
//!
//! handle.submit_preview("# Draft")?;
//! handle.submit_save("# Draft")?;
//! ```
//!
//! With the `mock` feature, [`MockConnector`] replaces the network for tests.

mod channel;
mod debouncer;
mod error;
#[cfg(any(test, feature = "mock"))]
mod mock;
mod router;
mod session;
mod status;
mod supervisor;
pub mod timeago;
mod transport;
mod ws;

pub use channel::{Channel, ChannelSlot, ChannelState, MessageHandler};
pub use debouncer::Debouncer;
pub use error::{SessionError, TransportError};
#[cfg(any(test, feature = "mock"))]
pub use mock::{MockConnector, MockListener, MockServer};
pub use router::{EditorSurface, Preview, Router};
pub use session::{DocumentRef, Session, SessionHandle};
pub use status::ConnectionStatus;
pub use supervisor::Supervisor;
pub use transport::{Connector, Link};
pub use ws::WsConnector;
