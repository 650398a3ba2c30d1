//! Editing session: the event loop tying channel, router and surface together.
//!
//! One task per session owns the surface and the router. It receives
//! previews to debounce, inbound messages and status changes through
//! channels, so surface calls never run concurrently.

use std::sync::Arc;
use std::time::Duration;

use hubro_config::Config;
use hubro_protocol::{InboundMessage, OutboundMessage};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::channel::{Channel, ChannelSlot};
use crate::debouncer::Debouncer;
use crate::error::SessionError;
use crate::router::{EditorSurface, Router};
use crate::status::ConnectionStatus;
use crate::supervisor::Supervisor;
use crate::transport::Connector;

/// Identity of the document being edited.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRef {
    /// Document identifier (file name or page slug).
    pub id: String,
    /// Variant index the document lives in, if any.
    pub idx: Option<String>,
}

impl DocumentRef {
    /// Reference a document outside any variant index.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            idx: None,
        }
    }

    /// Set the variant index.
    #[must_use]
    pub fn with_idx(mut self, idx: impl Into<String>) -> Self {
        self.idx = Some(idx.into());
        self
    }

    fn load(&self) -> OutboundMessage {
        OutboundMessage::Load {
            id: self.id.clone(),
            idx: self.idx.clone(),
        }
    }
}

/// A configured editing session, not yet started.
pub struct Session {
    url: Url,
    document: DocumentRef,
    preview_debounce: Duration,
    reconnect_delay: Duration,
    load_on_connect: bool,
    connector: Arc<dyn Connector>,
}

impl Session {
    /// Prepare a session for `document` against the configured server.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if the WebSocket endpoint cannot be
    /// derived from the server URL.
    pub fn new(
        config: &Config,
        document: DocumentRef,
        connector: Arc<dyn Connector>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            url: config.server.ws_url()?,
            document,
            preview_debounce: config.session.preview_debounce(),
            reconnect_delay: config.session.reconnect_delay(),
            load_on_connect: config.session.load_on_connect,
            connector,
        })
    }

    /// WebSocket endpoint of the session.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Start the session with the standard editor router.
    ///
    /// Must be called within a tokio runtime.
    pub fn start<S: EditorSurface + 'static>(self, surface: S) -> SessionHandle {
        self.start_with_router(surface, Router::editor())
    }

    /// Start the session with a custom router.
    pub fn start_with_router<S: EditorSurface + 'static>(
        self,
        surface: S,
        router: Router<S>,
    ) -> SessionHandle {
        let cancel = CancellationToken::new();
        let finished = CancellationToken::new();
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (previews_tx, previews_rx) = mpsc::unbounded_channel();

        tracing::info!(url = %self.url, id = %self.document.id, "Starting editing session");

        let supervisor = Supervisor::new(
            ChannelSlot::new(self.connector, self.url),
            self.reconnect_delay,
            cancel.clone(),
        );
        let status = supervisor.status();
        let channel = supervisor.channel();
        let supervisor_task = supervisor.spawn(Arc::new(move |message: InboundMessage| {
            let _ = inbound_tx.send(message);
        }));

        let event_loop = EventLoop {
            document: self.document.clone(),
            surface,
            router,
            debouncer: Debouncer::new(),
            preview_debounce: self.preview_debounce,
            load_on_connect: self.load_on_connect,
            loaded: false,
            previews: previews_rx,
            inbound: inbound_rx,
            status: status.clone(),
            channel: channel.clone(),
            cancel: cancel.clone(),
        };
        tokio::spawn(event_loop.run(supervisor_task, finished.clone()));

        SessionHandle {
            document: self.document,
            previews: previews_tx,
            channel,
            status,
            cancel,
            finished,
        }
    }
}

/// Handle to a running session.
///
/// Dropping the handle shuts the session down.
#[derive(Debug)]
pub struct SessionHandle {
    document: DocumentRef,
    previews: mpsc::UnboundedSender<String>,
    channel: watch::Receiver<Option<Channel>>,
    status: watch::Receiver<ConnectionStatus>,
    cancel: CancellationToken,
    finished: CancellationToken,
}

impl SessionHandle {
    /// Document this session edits.
    pub fn document(&self) -> &DocumentRef {
        &self.document
    }

    /// Queue the edited source for a preview render.
    ///
    /// Debounced: only the last submission of a burst is sent.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Shutdown`] if the session has stopped.
    pub fn submit_preview(&self, content: impl Into<String>) -> Result<(), SessionError> {
        self.previews
            .send(content.into())
            .map_err(|_| SessionError::Shutdown)
    }

    /// Save the full document source immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ChannelClosed`] if the channel is not open.
    pub fn submit_save(&self, content: impl Into<String>) -> Result<(), SessionError> {
        self.send(&OutboundMessage::Save {
            content: content.into(),
            id: self.document.id.clone(),
            idx: self.document.idx.clone(),
        })
    }

    /// Ask the server for the document source.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ChannelClosed`] if the channel is not open.
    pub fn request_load(&self) -> Result<(), SessionError> {
        self.send(&self.document.load())
    }

    /// Create a new draft document titled `title` in `index`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::ChannelClosed`] if the channel is not open.
    pub fn create(
        &self,
        title: impl Into<String>,
        index: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(&OutboundMessage::Create {
            title: title.into(),
            index: index.into(),
        })
    }

    /// Subscribe to connection status changes.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Current connection status.
    pub fn current_status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Shut the session down. Idempotent.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    /// Wait until the session has fully shut down.
    pub async fn closed(&self) {
        self.finished.cancelled().await;
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), SessionError> {
        let channel = self
            .channel
            .borrow()
            .clone()
            .ok_or(SessionError::ChannelClosed)?;
        channel.send(message)
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

struct EventLoop<S> {
    document: DocumentRef,
    surface: S,
    router: Router<S>,
    debouncer: Debouncer<String, String>,
    preview_debounce: Duration,
    load_on_connect: bool,
    loaded: bool,
    previews: mpsc::UnboundedReceiver<String>,
    inbound: mpsc::UnboundedReceiver<InboundMessage>,
    status: watch::Receiver<ConnectionStatus>,
    channel: watch::Receiver<Option<Channel>>,
    cancel: CancellationToken,
}

impl<S: EditorSurface> EventLoop<S> {
    async fn run(mut self, supervisor: JoinHandle<()>, finished: CancellationToken) {
        loop {
            tokio::select! {
                () = self.cancel.cancelled() => break,
                preview = self.previews.recv() => match preview {
                    Some(content) => {
                        self.debouncer
                            .schedule(self.document.id.clone(), content, self.preview_debounce);
                    }
                    None => break,
                },
                Some(message) = self.inbound.recv() => {
                    self.router.dispatch(&mut self.surface, &message);
                }
                changed = self.status.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = *self.status.borrow_and_update();
                    self.on_status(status);
                }
                () = self.debouncer.ready() => self.flush_previews(),
            }
        }

        let dropped = self.debouncer.len();
        self.debouncer.clear();
        self.cancel.cancel();
        if let Err(err) = supervisor.await {
            tracing::warn!(error = %err, "Supervisor task failed");
        }
        tracing::info!(id = %self.document.id, dropped_previews = dropped, "Editing session closed");

        drop(self);
        finished.cancel();
    }

    fn on_status(&mut self, status: ConnectionStatus) {
        tracing::info!(%status, "Connection status");
        self.surface.status_changed(status);

        if status != ConnectionStatus::Connected || !self.load_on_connect || self.loaded {
            return;
        }

        // Only the first connection loads, so reconnecting never
        // overwrites local edits.
        match self.send(&self.document.load()) {
            Ok(()) => self.loaded = true,
            Err(err) => tracing::debug!(error = %err, "Initial load not sent"),
        }
    }

    fn flush_previews(&mut self) {
        for (id, content) in self.debouncer.drain_ready(Instant::now()) {
            if let Err(err) = self.send(&OutboundMessage::Markdown { content, id }) {
                tracing::debug!(error = %err, "Dropping preview");
            }
        }
    }

    fn send(&self, message: &OutboundMessage) -> Result<(), SessionError> {
        let channel = self
            .channel
            .borrow()
            .clone()
            .ok_or(SessionError::ChannelClosed)?;
        channel.send(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockListener};
    use crate::router::Preview;
    use hubro_protocol::Created;
    use pretty_assertions::assert_eq;

    #[derive(Debug, PartialEq, Eq)]
    enum Event {
        Status(ConnectionStatus),
        Reload,
        Preview(Preview),
        Buffer(String),
        Saved(String),
        Created(String),
        Error(String),
    }

    struct ForwardingSurface {
        events: mpsc::UnboundedSender<Event>,
    }

    impl ForwardingSurface {
        fn emit(&self, event: Event) {
            let _ = self.events.send(event);
        }
    }

    impl EditorSurface for ForwardingSurface {
        fn reload_page(&mut self) {
            self.emit(Event::Reload);
        }

        fn render_preview(&mut self, preview: &Preview) {
            self.emit(Event::Preview(preview.clone()));
        }

        fn replace_buffer(&mut self, content: &str) {
            self.emit(Event::Buffer(content.to_owned()));
        }

        fn saved(&mut self, id: &str) {
            self.emit(Event::Saved(id.to_owned()));
        }

        fn created(&mut self, created: &Created) {
            self.emit(Event::Created(created.slug.clone()));
        }

        fn server_error(&mut self, message: &str) {
            self.emit(Event::Error(message.to_owned()));
        }

        fn status_changed(&mut self, status: ConnectionStatus) {
            self.emit(Event::Status(status));
        }
    }

    struct Harness {
        handle: SessionHandle,
        connector: MockConnector,
        listener: MockListener,
        events: mpsc::UnboundedReceiver<Event>,
    }

    fn start(config: &Config) -> Harness {
        let (connector, listener) = MockConnector::new();
        let (tx, events) = mpsc::unbounded_channel();
        let document = DocumentRef::new("post.md").with_idx("posts");
        let session = Session::new(config, document, Arc::new(connector.clone())).unwrap();
        let handle = session.start(ForwardingSurface { events: tx });
        Harness {
            handle,
            connector,
            listener,
            events,
        }
    }

    const LOAD: &str = r#"{"type":"load","id":"post.md","idx":"posts"}"#;

    #[test]
    fn test_session_url_from_config() {
        let (connector, _listener) = MockConnector::new();
        let mut config = Config::default();
        config.server.url = "https://blog.example.com".to_owned();

        let session = Session::new(&config, DocumentRef::new("a.md"), Arc::new(connector)).unwrap();

        assert_eq!(session.url().as_str(), "wss://blog.example.com/admin/ws");
    }

    #[tokio::test(start_paused = true)]
    async fn test_edit_flow_end_to_end() {
        let mut h = start(&Config::default());

        let mut server = h.listener.accept().await.unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(Event::Status(ConnectionStatus::Connected))
        );
        assert_eq!(server.recv().await.unwrap(), LOAD);

        server.push(r##"{"type":"filecontent","content":"# Draft","id":"post.md"}"##);
        assert_eq!(h.events.recv().await, Some(Event::Buffer("# Draft".to_owned())));

        let typed_at = Instant::now();
        for text in ["# Draft!", "# Draft!!", "# Draft!!!"] {
            h.handle.submit_preview(text).unwrap();
            tokio::time::sleep(Duration::from_millis(100)).await;
        }

        assert_eq!(
            server.recv().await.unwrap(),
            r##"{"type":"markdown","content":"# Draft!!!","id":"post.md"}"##
        );
        assert!(Instant::now() - typed_at >= Duration::from_millis(500));
        assert_eq!(server.try_recv(), None);

        server.push(
            r#"{"type":"markdown","content":"<h1>Draft!!!</h1>","id":"post.md","meta":{"title":"Draft","tags":["a"]}}"#,
        );
        assert_eq!(
            h.events.recv().await,
            Some(Event::Preview(Preview {
                html: "<h1>Draft!!!</h1>".to_owned(),
                title: Some("Draft".to_owned()),
                tags: vec!["a".to_owned()],
                ..Default::default()
            }))
        );

        h.handle.submit_save("# Draft!!!").unwrap();
        assert_eq!(
            server.recv().await.unwrap(),
            r##"{"type":"save","content":"# Draft!!!","id":"post.md","idx":"posts"}"##
        );
        server.push(r#"{"type":"saved","id":"post.md"}"#);
        assert_eq!(h.events.recv().await, Some(Event::Saved("post.md".to_owned())));

        h.handle.close();
        h.handle.closed().await;
        assert_eq!(server.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnect_does_not_reload_document() {
        let mut h = start(&Config::default());

        let mut first = h.listener.accept().await.unwrap();
        assert_eq!(first.recv().await.unwrap(), LOAD);
        assert_eq!(
            h.events.recv().await,
            Some(Event::Status(ConnectionStatus::Connected))
        );

        first.disconnect();
        assert_eq!(
            h.events.recv().await,
            Some(Event::Status(ConnectionStatus::Disconnected))
        );
        assert!(h.handle.submit_save("offline edit").is_err());

        let mut second = h.listener.accept().await.unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(Event::Status(ConnectionStatus::Connected))
        );
        h.handle.submit_save("# Kept").unwrap();

        assert_eq!(
            second.recv().await.unwrap(),
            r##"{"type":"save","content":"# Kept","id":"post.md","idx":"posts"}"##
        );
        assert_eq!(h.connector.attempts(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_save_while_disconnected_is_rejected() {
        let h = start(&Config::default());
        h.connector.refuse_next(usize::MAX);

        tokio::time::sleep(Duration::from_millis(100)).await;

        let err = h.handle.submit_save("# Draft").unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed), "got {err:?}");
        let err = h.handle.create("Title", "posts").unwrap_err();
        assert!(matches!(err, SessionError::ChannelClosed), "got {err:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_on_connect_disabled() {
        let mut config = Config::default();
        config.session.load_on_connect = false;
        let mut h = start(&config);

        let mut server = h.listener.accept().await.unwrap();
        assert_eq!(
            h.events.recv().await,
            Some(Event::Status(ConnectionStatus::Connected))
        );
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(server.try_recv(), None);

        h.handle.request_load().unwrap();
        assert_eq!(server.recv().await.unwrap(), LOAD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_and_server_error() {
        let mut h = start(&Config::default());
        let mut server = h.listener.accept().await.unwrap();
        assert_eq!(server.recv().await.unwrap(), LOAD);

        h.handle.create("Hello World", "posts").unwrap();
        assert_eq!(
            server.recv().await.unwrap(),
            r#"{"type":"create","title":"Hello World","index":"posts"}"#
        );

        server.push(r#"{"type":"created","id":"hello-world.md","slug":"hello-world","title":"Hello World","index":"posts"}"#);
        server.push(r#"{"type":"error","message":"File already exists"}"#);
        server.push(r#"{"type":"reload"}"#);

        let mut seen = Vec::new();
        while seen.len() < 4 {
            seen.push(h.events.recv().await.unwrap());
        }
        assert_eq!(
            seen,
            vec![
                Event::Status(ConnectionStatus::Connected),
                Event::Created("hello-world".to_owned()),
                Event::Error("File already exists".to_owned()),
                Event::Reload,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_drops_pending_preview() {
        let mut h = start(&Config::default());
        let mut server = h.listener.accept().await.unwrap();
        assert_eq!(server.recv().await.unwrap(), LOAD);

        h.handle.submit_preview("# Unsent").unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        h.handle.close();
        h.handle.closed().await;

        assert_eq!(server.recv().await, None);
        assert!(matches!(
            h.handle.submit_preview("# Late"),
            Err(SessionError::Shutdown)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropping_handle_closes_session() {
        let mut h = start(&Config::default());
        let mut server = h.listener.accept().await.unwrap();
        assert_eq!(server.recv().await.unwrap(), LOAD);

        drop(h.handle);

        assert_eq!(server.recv().await, None);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(h.connector.attempts(), 1);
        assert!(h.listener.try_accept().is_none());
    }
}
