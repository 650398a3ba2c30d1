//! `hubro edit` command implementation.
//!
//! Mirrors a server document into a local file. Saving the file in any
//! editor streams a preview request; rendered previews are written to an
//! HTML file next to it.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use hubro_protocol::Created;
use hubro_session::{
    ConnectionStatus, DocumentRef, EditorSurface, Preview, Session, SessionHandle, WsConnector,
};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::error::CliError;
use crate::output::Output;
use crate::preview::render_page;

use super::save::save_document;
use super::{ConnectArgs, Reply};

/// Arguments for the edit command.
#[derive(Args)]
pub(crate) struct EditArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Document identifier on the server.
    #[arg(long)]
    id: String,

    /// Variant index the document belongs to.
    #[arg(long)]
    idx: Option<String>,

    /// Local file mirroring the document source.
    file: PathBuf,

    /// Write rendered previews to this HTML file.
    #[arg(long)]
    preview: Option<PathBuf>,

    /// Idle time before sending a preview, in milliseconds (overrides config).
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Save the file to the server when exiting.
    #[arg(long)]
    save_on_exit: bool,

    /// Seconds to wait for the exit save to be acknowledged.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl EditArgs {
    /// Execute the edit command.
    ///
    /// Runs until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails or the file cannot be watched.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let config = self.connect.load_config(self.debounce_ms)?;
        let file = std::path::absolute(&self.file)?;

        let document = DocumentRef {
            id: self.id,
            idx: self.idx,
        };
        let session = Session::new(&config, document, Arc::new(WsConnector))?;

        output.info(&format!("Editing {} via {}", file.display(), session.url()));
        if let Some(preview) = &self.preview {
            output.info(&format!("Preview: {}", preview.display()));
        }
        output.info("Press Ctrl-C to stop");

        let (reloads_tx, mut reloads) = mpsc::unbounded_channel();
        let (replies_tx, mut replies) = mpsc::unbounded_channel();
        let surface = FileSurface {
            buffer: file.clone(),
            preview: self.preview,
            output: Output::new(),
            reloads: reloads_tx,
            replies: replies_tx,
        };
        let handle = session.start(surface);

        let (events_tx, mut events) = mpsc::channel::<Event>(100);
        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            if let Ok(event) = res {
                // Use blocking_send since callback is sync
                let _ = events_tx.blocking_send(event);
            }
        })?;
        let watch_dir = file.parent().unwrap_or_else(|| Path::new("."));
        watcher.watch(watch_dir, RecursiveMode::NonRecursive)?;

        let mut last_submitted: Option<String> = None;
        loop {
            tokio::select! {
                signal = tokio::signal::ctrl_c() => {
                    signal?;
                    break;
                }
                Some(event) = events.recv() => {
                    if !touches(&event, &file) {
                        continue;
                    }
                    match std::fs::read_to_string(&file) {
                        Ok(content) if last_submitted.as_deref() != Some(content.as_str()) => {
                            tracing::debug!(bytes = content.len(), "Buffer changed");
                            handle.submit_preview(content.as_str())?;
                            last_submitted = Some(content);
                        }
                        Ok(_) => {}
                        // Editors that save via rename leave a short gap
                        Err(err) => tracing::debug!(error = %err, "Buffer not readable"),
                    }
                }
                Some(()) = reloads.recv() => {
                    if let Err(err) = handle.request_load() {
                        output.warning(&format!("Reload skipped: {err}"));
                    }
                }
                Some(reply) = replies.recv() => report(&output, &reply),
            }
        }

        drop(watcher);
        let saved = if self.save_on_exit {
            output.info("Saving before exit");
            save_buffer(&handle, &mut replies, &file, Duration::from_secs(self.timeout))
                .await
                .map(Some)
        } else {
            Ok(None)
        };

        handle.close();
        handle.closed().await;

        if let Some(id) = saved? {
            output.success(&format!("Saved {id}"));
        }
        Ok(())
    }
}

fn report(output: &Output, reply: &Reply) {
    match reply {
        Reply::Saved(id) => output.success(&format!("Saved {id}")),
        Reply::Created(created) => {
            output.success(&format!("Created {} ({})", created.slug, created.id));
        }
        Reply::Failed(message) => output.error(&format!("Server error: {message}")),
    }
}

/// Whether a filesystem event changed `file`.
fn touches(event: &Event, file: &Path) -> bool {
    matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_))
        && event
            .paths
            .iter()
            .any(|path| path.file_name() == file.file_name())
}

/// Save the current file content and wait until the server acknowledges it.
async fn save_buffer(
    handle: &SessionHandle,
    replies: &mut mpsc::UnboundedReceiver<Reply>,
    file: &Path,
    timeout: Duration,
) -> Result<String, CliError> {
    let content = std::fs::read_to_string(file)?;
    save_document(handle, replies, content, timeout).await
}

/// Surface backed by the local buffer file and an HTML preview file.
struct FileSurface {
    buffer: PathBuf,
    preview: Option<PathBuf>,
    output: Output,
    reloads: mpsc::UnboundedSender<()>,
    replies: mpsc::UnboundedSender<Reply>,
}

impl EditorSurface for FileSurface {
    fn reload_page(&mut self) {
        self.output.info("Server requested reload");
        let _ = self.reloads.send(());
    }

    fn render_preview(&mut self, preview: &Preview) {
        let Some(path) = &self.preview else {
            tracing::debug!(bytes = preview.html.len(), "Preview rendered");
            return;
        };
        match std::fs::write(path, render_page(preview)) {
            Ok(()) => tracing::debug!(path = %path.display(), "Preview written"),
            Err(err) => self.output.error(&format!("Failed to write preview: {err}")),
        }
    }

    fn replace_buffer(&mut self, content: &str) {
        match std::fs::write(&self.buffer, content) {
            Ok(()) => self
                .output
                .info(&format!("Loaded document into {}", self.buffer.display())),
            Err(err) => self.output.error(&format!("Failed to write buffer: {err}")),
        }
    }

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
        self.output.status(status);
    }
}
