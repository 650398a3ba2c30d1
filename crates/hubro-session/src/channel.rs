//! Session channel: one duplex connection and its state machine.
//!
//! A channel moves `Connecting → Open → Closed` or `Connecting → Closed`
//! and never leaves `Closed`. Reconnecting means opening a new channel,
//! which is the supervisor's job.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use hubro_protocol::{InboundMessage, OutboundMessage, decode, encode};
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::{SessionError, TransportError};
use crate::transport::{Connector, Link};

/// Connection state of a single channel.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChannelState {
    /// Handshake in progress.
    Connecting,
    /// Frames can be sent and received.
    Open,
    /// Terminal. The channel will not reopen.
    Closed,
}

/// Inbound message handler.
pub type MessageHandler = Arc<dyn Fn(InboundMessage) + Send + Sync>;

struct Inner {
    url: Url,
    state: watch::Sender<ChannelState>,
    outgoing: Mutex<Option<mpsc::UnboundedSender<String>>>,
    handler: Mutex<Option<MessageHandler>>,
    cancel: CancellationToken,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Inner {
    fn mark_open(&self, outgoing: mpsc::UnboundedSender<String>) -> bool {
        *lock(&self.outgoing) = Some(outgoing);
        self.state.send_if_modified(|state| {
            if *state == ChannelState::Connecting {
                *state = ChannelState::Open;
                true
            } else {
                false
            }
        })
    }

    fn mark_closed(&self) {
        // Dropping the sender tells the transport to close
        lock(&self.outgoing).take();
        self.state.send_if_modified(|state| {
            if *state == ChannelState::Closed {
                false
            } else {
                *state = ChannelState::Closed;
                true
            }
        });
    }

    fn deliver(&self, frame: &str) {
        let message = match decode(frame) {
            Ok(message) => message,
            Err(err) => {
                tracing::warn!(url = %self.url, error = %err, "Dropping malformed frame");
                return;
            }
        };

        let handler = lock(&self.handler).as_ref().map(Arc::clone);
        match handler {
            Some(handler) => handler(message),
            None => tracing::debug!(kind = ?message.kind(), "No handler registered, dropping message"),
        }
    }
}

/// Handle to one session channel.
///
/// Cheap to clone. All clones observe and control the same connection.
#[derive(Clone)]
pub struct Channel {
    inner: Arc<Inner>,
}

impl fmt::Debug for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("url", &self.inner.url)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Channel {
    /// Start connecting to `url` in a background task.
    ///
    /// The returned channel is `Connecting`. Must be called within a tokio
    /// runtime.
    pub fn open(connector: &dyn Connector, url: Url) -> Self {
        Self::open_with_handler(connector, url, None)
    }

    /// Open with `handler` registered before the first frame can arrive.
    pub(crate) fn open_with_handler(
        connector: &dyn Connector,
        url: Url,
        handler: Option<MessageHandler>,
    ) -> Self {
        let (state, _) = watch::channel(ChannelState::Connecting);
        let inner = Arc::new(Inner {
            url,
            state,
            outgoing: Mutex::new(None),
            handler: Mutex::new(handler),
            cancel: CancellationToken::new(),
        });

        tracing::debug!(url = %inner.url, "Opening session channel");
        let connect = connector.connect(&inner.url);
        tokio::spawn(pump(Arc::clone(&inner), connect));

        Self { inner }
    }

    /// Endpoint this channel connects to.
    pub fn url(&self) -> &Url {
        &self.inner.url
    }

    /// Current state.
    pub fn state(&self) -> ChannelState {
        *self.inner.state.borrow()
    }

    /// Subscribe to state transitions.
    pub fn watch_state(&self) -> watch::Receiver<ChannelState> {
        self.inner.state.subscribe()
    }

    /// Encode and transmit a message.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ChannelClosed`] unless the channel is open.
    /// The message is not queued.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), SessionError> {
        if self.state() != ChannelState::Open {
            return Err(SessionError::ChannelClosed);
        }

        let frame = encode(message)?;
        let outgoing = lock(&self.inner.outgoing);
        let sender = outgoing.as_ref().ok_or(SessionError::ChannelClosed)?;
        sender
            .send(frame)
            .map_err(|_| SessionError::ChannelClosed)?;

        tracing::debug!(kind = message.type_name(), "Sent message");
        Ok(())
    }

    /// Register the inbound message handler, replacing any previous one.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(InboundMessage) + Send + Sync + 'static,
    {
        *lock(&self.inner.handler) = Some(Arc::new(handler));
    }

    /// Close the connection. Idempotent.
    pub fn close(&self) {
        self.inner.cancel.cancel();
        self.inner.mark_closed();
    }

    /// Wait until the channel is closed.
    pub async fn closed(&self) {
        let mut state = self.inner.state.subscribe();
        let _ = state.wait_for(|state| *state == ChannelState::Closed).await;
    }
}

/// Drive one connection: handshake, then read frames until it ends.
async fn pump(inner: Arc<Inner>, connect: BoxFuture<'static, Result<Link, TransportError>>) {
    let result = tokio::select! {
        () = inner.cancel.cancelled() => {
            inner.mark_closed();
            return;
        }
        result = connect => result,
    };

    let mut incoming = match result {
        Ok(Link { outgoing, incoming }) => {
            if inner.mark_open(outgoing) {
                tracing::info!(url = %inner.url, "Session channel open");
            }
            incoming
        }
        Err(err) => {
            tracing::warn!(url = %inner.url, error = %err, "Session channel failed to connect");
            inner.mark_closed();
            return;
        }
    };

    loop {
        let frame = tokio::select! {
            () = inner.cancel.cancelled() => break,
            frame = incoming.recv() => frame,
        };

        match frame {
            Some(Ok(text)) => inner.deliver(&text),
            Some(Err(err)) => {
                tracing::warn!(url = %inner.url, error = %err, "Session channel transport error");
                break;
            }
            None => {
                tracing::info!(url = %inner.url, "Session channel closed by server");
                break;
            }
        }
    }

    inner.mark_closed();
}

/// Holds a session's current channel.
///
/// Opening is idempotent: a channel that is still connecting or open is
/// reused rather than replaced.
pub struct ChannelSlot {
    connector: Arc<dyn Connector>,
    url: Url,
    handler: Option<MessageHandler>,
    current: Option<Channel>,
}

impl fmt::Debug for ChannelSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSlot")
            .field("url", &self.url)
            .field("current", &self.current)
            .finish_non_exhaustive()
    }
}

impl ChannelSlot {
    /// Create an empty slot for `url`.
    pub fn new(connector: Arc<dyn Connector>, url: Url) -> Self {
        Self {
            connector,
            url,
            handler: None,
            current: None,
        }
    }

    /// Set the handler registered on every channel this slot opens.
    pub fn set_handler(&mut self, handler: MessageHandler) {
        if let Some(channel) = &self.current {
            let handler = Arc::clone(&handler);
            channel.on_message(move |message| handler(message));
        }
        self.handler = Some(handler);
    }

    /// Return the live channel, opening a new one if the last has closed.
    pub fn open_or_reuse(&mut self) -> Channel {
        if let Some(channel) = &self.current
            && channel.state() != ChannelState::Closed
        {
            return channel.clone();
        }

        let channel = Channel::open_with_handler(
            self.connector.as_ref(),
            self.url.clone(),
            self.handler.as_ref().map(Arc::clone),
        );
        self.current = Some(channel.clone());
        channel
    }

    /// The most recently opened channel.
    pub fn current(&self) -> Option<&Channel> {
        self.current.as_ref()
    }

    /// Close and forget the current channel.
    pub fn close(&mut self) {
        if let Some(channel) = self.current.take() {
            channel.close();
        }
    }
}
