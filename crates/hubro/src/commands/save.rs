//! `hubro save` command implementation.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use hubro_session::{DocumentRef, Session, SessionHandle, WsConnector};
use tokio::sync::mpsc;

use super::{ConnectArgs, Reply, ReplySurface, next_reply, wait_connected};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the save command.
#[derive(Args)]
pub(crate) struct SaveArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Document identifier on the server.
    #[arg(long)]
    id: String,

    /// Variant index the document belongs to.
    #[arg(long)]
    idx: Option<String>,

    /// File holding the document source.
    file: PathBuf,

    /// Seconds to wait for the server.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl SaveArgs {
    /// Execute the save command.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the server is
    /// unreachable, or the server rejects the save.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();
        let content = std::fs::read_to_string(&self.file)?;

        let mut config = self.connect.load_config(None)?;
        config.session.load_on_connect = false;

        let document = DocumentRef {
            id: self.id,
            idx: self.idx,
        };
        let session = Session::new(&config, document, Arc::new(WsConnector))?;
        output.info(&format!("Saving {} to {}", self.file.display(), session.url()));

        let (surface, mut replies) = ReplySurface::new();
        let handle = session.start(surface);
        let result = save_document(
            &handle,
            &mut replies,
            content,
            Duration::from_secs(self.timeout),
        )
        .await;

        handle.close();
        handle.closed().await;

        let id = result?;
        output.success(&format!("Saved {id}"));
        Ok(())
    }
}

/// Send `content` as a save and wait for the acknowledgement.
pub(crate) async fn save_document(
    handle: &SessionHandle,
    replies: &mut mpsc::UnboundedReceiver<Reply>,
    content: String,
    timeout: Duration,
) -> Result<String, CliError> {
    wait_connected(handle, timeout).await?;
    handle.submit_save(content)?;

    loop {
        match next_reply(replies, timeout, "save acknowledgement").await? {
            Reply::Saved(id) => return Ok(id),
            Reply::Failed(message) => return Err(CliError::Server(message)),
            Reply::Created(_) => {}
        }
    }
}
