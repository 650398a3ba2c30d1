//! Message shapes exchanged over the session channel.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::lenient;
use crate::meta::DocumentMeta;

/// Message sent by the editor to the server.
///
/// Serializes to a flat object tagged by `type`. A missing variant index is
/// sent as an explicit `null`, which is what the server expects.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum OutboundMessage {
    /// Open a document into the editor. Answered with `filecontent`.
    Load {
        /// Document identifier (page slug).
        id: String,
        /// Variant index the document lives in.
        idx: Option<String>,
    },
    /// Persist the full document text.
    Save {
        /// Full document source.
        content: String,
        /// Document file name.
        id: String,
        /// Variant index the document lives in.
        idx: Option<String>,
    },
    /// Edited source, sent to request a fresh preview render.
    Markdown {
        /// Current document source.
        content: String,
        /// Document identifier.
        id: String,
    },
    /// Create a new draft document in an index.
    Create {
        /// Title of the new document.
        title: String,
        /// Index the document is created in.
        index: String,
    },
}

impl OutboundMessage {
    /// Wire name of the message type.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Load { .. } => "load",
            Self::Save { .. } => "save",
            Self::Markdown { .. } => "markdown",
            Self::Create { .. } => "create",
        }
    }
}

/// Discriminant of a recognized inbound message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `reload`: the page should be reloaded.
    Reload,
    /// `markdown`: rendered preview of the submitted source.
    Markdown,
    /// `filecontent`: document source answering a `load`.
    FileContent,
    /// `saved`: a save was persisted.
    Saved,
    /// `created`: a new document was created.
    Created,
    /// `error`: the server rejected a request.
    Error,
}

impl MessageKind {
    /// All recognized kinds.
    pub const ALL: [Self; 6] = [
        Self::Reload,
        Self::Markdown,
        Self::FileContent,
        Self::Saved,
        Self::Created,
        Self::Error,
    ];

    /// Look up a kind by its wire tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Wire tag of this kind.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Reload => "reload",
            Self::Markdown => "markdown",
            Self::FileContent => "filecontent",
            Self::Saved => "saved",
            Self::Created => "created",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message pushed by the server.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InboundMessage {
    /// Reload the whole page.
    Reload,
    /// Rendered preview of the edited source.
    Markdown(RenderedMarkdown),
    /// Raw document text, sent in reply to `load`.
    FileContent(FileContent),
    /// A `save` was written to disk.
    Saved(Saved),
    /// A `create` produced a new document.
    Created(Created),
    /// The server failed to handle a request.
    Error(ServerError),
    /// Frame with a `type` this client does not know. Carries the tag.
    Unknown(String),
}

impl InboundMessage {
    /// Kind used for routing, `None` for unknown messages.
    #[must_use]
    pub fn kind(&self) -> Option<MessageKind> {
        match self {
            Self::Reload => Some(MessageKind::Reload),
            Self::Markdown(_) => Some(MessageKind::Markdown),
            Self::FileContent(_) => Some(MessageKind::FileContent),
            Self::Saved(_) => Some(MessageKind::Saved),
            Self::Created(_) => Some(MessageKind::Created),
            Self::Error(_) => Some(MessageKind::Error),
            Self::Unknown(_) => None,
        }
    }
}

/// Payload of an inbound `markdown` message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RenderedMarkdown {
    /// Rendered HTML.
    #[serde(deserialize_with = "lenient::string")]
    pub content: String,
    /// Front matter of the rendered document.
    #[serde(deserialize_with = "lenient::or_default")]
    pub meta: DocumentMeta,
    /// Identifier echoed from the request.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
}

/// Payload of an inbound `filecontent` message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FileContent {
    /// Full raw document text.
    #[serde(deserialize_with = "lenient::string")]
    pub content: String,
    /// File name of the loaded document.
    #[serde(deserialize_with = "lenient::opt_string")]
    pub id: Option<String>,
}

/// Payload of an inbound `saved` message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Saved {
    /// File name that was written.
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
}

/// Payload of an inbound `created` message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Created {
    /// File name of the new document.
    #[serde(deserialize_with = "lenient::string")]
    pub id: String,
    /// Slug derived from the title.
    #[serde(deserialize_with = "lenient::string")]
    pub slug: String,
    /// Title of the new document.
    #[serde(deserialize_with = "lenient::string")]
    pub title: String,
    /// Index the document was created in.
    #[serde(deserialize_with = "lenient::string")]
    pub index: String,
}

/// Payload of an inbound `error` message.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerError {
    /// Human-readable failure description.
    #[serde(deserialize_with = "lenient::string")]
    pub message: String,
}
