//! CLI command implementations.

pub(crate) mod create;
pub(crate) mod edit;
pub(crate) mod save;

use std::path::PathBuf;
use std::time::Duration;

use clap::Args;
use hubro_config::{CliSettings, Config};
use hubro_protocol::Created;
use hubro_session::{ConnectionStatus, EditorSurface, Preview, SessionError, SessionHandle};
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::output::Output;

pub(crate) use create::CreateArgs;
pub(crate) use edit::EditArgs;
pub(crate) use save::SaveArgs;

/// Connection options shared by every command.
#[derive(Args)]
pub(crate) struct ConnectArgs {
    /// Path to configuration file (default: auto-discover hubro.toml).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server base URL (overrides config).
    #[arg(long, env = "HUBRO_URL")]
    server: Option<String>,

    /// Delay between reconnect attempts in milliseconds (overrides config).
    #[arg(long)]
    reconnect_delay_ms: Option<u64>,

    /// Enable verbose output.
    #[arg(short, long)]
    pub verbose: bool,
}

impl ConnectArgs {
    /// Load configuration with these options applied.
    pub(crate) fn load_config(&self, preview_debounce_ms: Option<u64>) -> Result<Config, CliError> {
        let cli_settings = CliSettings {
            server_url: self.server.clone(),
            preview_debounce_ms,
            reconnect_delay_ms: self.reconnect_delay_ms,
        };
        Ok(Config::load(self.config.as_deref(), Some(&cli_settings))?)
    }
}

/// Server reply to a one-shot request.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Reply {
    Saved(String),
    Created(Created),
    Failed(String),
}

/// Surface for one-shot commands: forwards replies, ignores page updates.
pub(crate) struct ReplySurface {
    replies: mpsc::UnboundedSender<Reply>,
    output: Output,
}

impl ReplySurface {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<Reply>) {
        let (replies, rx) = mpsc::unbounded_channel();
        let surface = Self {
            replies,
            output: Output::new(),
        };
        (surface, rx)
    }
}

impl EditorSurface for ReplySurface {
    fn reload_page(&mut self) {}

    fn render_preview(&mut self, _preview: &Preview) {}

    fn replace_buffer(&mut self, _content: &str) {}

    fn saved(&mut self, id: &str) {
        let _ = self.replies.send(Reply::Saved(id.to_owned()));
    }

    fn created(&mut self, created: &Created) {
        let _ = self.replies.send(Reply::Created(created.clone()));
    }

    fn server_error(&mut self, message: &str) {
        let _ = self.replies.send(Reply::Failed(message.to_owned()));
    }

    fn status_changed(&mut self, status: ConnectionStatus) {
        if status == ConnectionStatus::Disconnected {
            self.output.warning("Disconnected from server, retrying...");
        }
    }
}

/// Wait until the session is connected.
pub(crate) async fn wait_connected(
    handle: &SessionHandle,
    timeout: Duration,
) -> Result<(), CliError> {
    let mut status = handle.status();
    tokio::time::timeout(
        timeout,
        status.wait_for(|status| *status == ConnectionStatus::Connected),
    )
    .await
    .map_err(|_| CliError::Timeout("connecting to server".to_owned()))?
    .map(|_| ())
    .map_err(|_| CliError::Session(SessionError::Shutdown))
}

/// Wait for the next server reply.
pub(crate) async fn next_reply(
    replies: &mut mpsc::UnboundedReceiver<Reply>,
    timeout: Duration,
    what: &str,
) -> Result<Reply, CliError> {
    tokio::time::timeout(timeout, replies.recv())
        .await
        .map_err(|_| CliError::Timeout(format!("waiting for {what}")))?
        .ok_or(CliError::Session(SessionError::Shutdown))
}
