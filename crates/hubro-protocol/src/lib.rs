//! Wire protocol for the Hubro live-editing session.
//!
//! The editor and the content server exchange one JSON object per WebSocket
//! text frame. Every object carries a `type` discriminant:
//!
//! ```text
//! client ──load / markdown / save / create──► server
//! client ◄──filecontent / markdown / reload / saved / created / error── server
//! ```
//!
//! Outbound frames are built from [`OutboundMessage`] and serialized with
//! [`encode`]. Inbound frames are parsed with [`decode`] into the closed
//! [`InboundMessage`] union. Frames with an unrecognized `type` decode to
//! [`InboundMessage::Unknown`] so new server messages never break old clients.
//!
//! # Example
//!
//! ```
//! use hubro_protocol::{InboundMessage, OutboundMessage, decode, encode};
//!
//! let frame = encode(&OutboundMessage::Load {
//!     id: "post.md".to_owned(),
//!     idx: None,
//! })
//! .unwrap();
//! assert_eq!(frame, r#"{"type":"load","id":"post.md","idx":null}"#);
//!
//! let message = decode(r#"{"type":"reload"}"#).unwrap();
//! assert_eq!(message, InboundMessage::Reload);
//! ```

mod codec;
mod lenient;
mod message;
mod meta;

pub use codec::{ProtocolError, decode, encode};
pub use message::{
    Created, FileContent, InboundMessage, MessageKind, OutboundMessage, RenderedMarkdown, Saved,
    ServerError,
};
pub use meta::DocumentMeta;
