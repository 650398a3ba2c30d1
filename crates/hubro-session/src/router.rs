//! Inbound message routing.
//!
//! Maps each [`MessageKind`] to one handler. The editor router binds the
//! protocol's messages to an [`EditorSurface`].

use std::collections::HashMap;
use std::fmt;

use chrono::NaiveDate;
use hubro_protocol::{Created, InboundMessage, MessageKind, RenderedMarkdown};

use crate::status::ConnectionStatus;
use crate::timeago;

/// What the editor displays and edits.
///
/// Every call is made from the session's event loop, one at a time and in
/// message arrival order.
pub trait EditorSurface: Send {
    /// Reload the whole page.
    fn reload_page(&mut self);

    /// Replace the preview region.
    fn render_preview(&mut self, preview: &Preview);

    /// Replace the editor buffer with the document source.
    fn replace_buffer(&mut self, content: &str);

    /// A save was written by the server.
    fn saved(&mut self, id: &str) {
        tracing::info!(id, "Document saved");
    }

    /// The server created a new document.
    fn created(&mut self, created: &Created) {
        tracing::info!(id = %created.id, slug = %created.slug, "Document created");
    }

    /// The server reported a failure.
    fn server_error(&mut self, message: &str) {
        tracing::warn!(error = message, "Server reported an error");
    }

    /// Connection status changed.
    fn status_changed(&mut self, _status: ConnectionStatus) {}
}

/// Rendered preview ready for display.
///
/// Hidden fields are already removed: a `None` title means the title block
/// is not shown.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preview {
    /// Rendered HTML body.
    pub html: String,
    /// Title, unless hidden.
    pub title: Option<String>,
    /// Author, unless hidden.
    pub author: Option<String>,
    /// Relative date label, e.g. "3 weeks ago".
    pub date_label: Option<String>,
    /// Absolute date, shown as a tooltip on the label.
    pub date_title: Option<String>,
    /// Tags attached to the page.
    pub tags: Vec<String>,
    /// Page is a draft.
    pub draft: bool,
}

impl Preview {
    /// Build a preview, labelling the date relative to `today`.
    ///
    /// An unparsable date is shown verbatim without a tooltip.
    #[must_use]
    pub fn from_rendered(rendered: &RenderedMarkdown, today: NaiveDate) -> Self {
        let meta = &rendered.meta;

        let (date_label, date_title) = match meta.date.as_deref() {
            Some(raw) => match timeago::parse_date(raw) {
                Some(date) => (
                    Some(timeago::format_relative(date, today)),
                    Some(date.format("%Y-%m-%d").to_string()),
                ),
                None => (Some(raw.to_owned()), None),
            },
            None => (None, None),
        };

        Self {
            html: rendered.content.clone(),
            title: meta.title.clone().filter(|_| !meta.hide_title),
            author: meta.author.clone().filter(|_| !meta.hide_author),
            date_label,
            date_title,
            tags: meta.tags.clone(),
            draft: meta.draft,
        }
    }
}

type Handler<C> = Box<dyn FnMut(&mut C, &InboundMessage) + Send>;

/// Dispatches inbound messages to per-kind handlers.
///
/// `C` is the context handed to every handler, usually the editor surface.
pub struct Router<C> {
    handlers: HashMap<MessageKind, Handler<C>>,
}

impl<C> Default for Router<C> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }
}

impl<C> fmt::Debug for Router<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("kinds", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C> Router<C> {
    /// Create a router with no handlers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `handler` to `kind`, replacing any previous binding.
    pub fn register<F>(&mut self, kind: MessageKind, handler: F)
    where
        F: FnMut(&mut C, &InboundMessage) + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
    }

    /// Whether `kind` has a handler.
    pub fn handles(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    /// Invoke the handler bound to the message's kind.
    ///
    /// Returns `false` if nothing handled it (unknown type or no binding).
    pub fn dispatch(&mut self, ctx: &mut C, message: &InboundMessage) -> bool {
        let Some(kind) = message.kind() else {
            tracing::debug!(?message, "Ignoring message of unknown type");
            return false;
        };
        let Some(handler) = self.handlers.get_mut(&kind) else {
            tracing::debug!(%kind, "No handler bound");
            return false;
        };
        handler(ctx, message);
        true
    }
}

impl<S: EditorSurface> Router<S> {
    /// Router binding every protocol message to the surface, dating
    /// previews against the local calendar day.
    #[must_use]
    pub fn editor() -> Self {
        Self::editor_with_clock(timeago::today)
    }

    /// Like [`Router::editor`] with a custom source for today's date.
    #[must_use]
    pub fn editor_with_clock(today: fn() -> NaiveDate) -> Self {
        let mut router = Self::new();

        router.register(MessageKind::Reload, |surface: &mut S, _| {
            tracing::info!("Server requested reload");
            surface.reload_page();
        });

        router.register(MessageKind::Markdown, move |surface: &mut S, message| {
            if let InboundMessage::Markdown(rendered) = message {
                surface.render_preview(&Preview::from_rendered(rendered, today()));
            }
        });

        router.register(MessageKind::FileContent, |surface: &mut S, message| {
            if let InboundMessage::FileContent(file) = message {
                tracing::debug!(id = ?file.id, bytes = file.content.len(), "Replacing buffer");
                surface.replace_buffer(&file.content);
            }
        });

        router.register(MessageKind::Saved, |surface: &mut S, message| {
            if let InboundMessage::Saved(saved) = message {
                surface.saved(&saved.id);
            }
        });

        router.register(MessageKind::Created, |surface: &mut S, message| {
            if let InboundMessage::Created(created) = message {
                surface.created(created);
            }
        });

        router.register(MessageKind::Error, |surface: &mut S, message| {
            if let InboundMessage::Error(error) = message {
                surface.server_error(&error.message);
            }
        });

        router
    }
}
