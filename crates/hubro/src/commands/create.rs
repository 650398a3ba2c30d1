//! `hubro create` command implementation.

use std::sync::Arc;
use std::time::Duration;

use clap::Args;
use hubro_protocol::Created;
use hubro_session::{DocumentRef, Session, SessionHandle, WsConnector};
use tokio::sync::mpsc;

use super::{ConnectArgs, Reply, ReplySurface, next_reply, wait_connected};
use crate::error::CliError;
use crate::output::Output;

/// Arguments for the create command.
#[derive(Args)]
pub(crate) struct CreateArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Index to create the document in.
    #[arg(long)]
    index: String,

    /// Title of the new document.
    title: String,

    /// Seconds to wait for the server.
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

impl CreateArgs {
    /// Execute the create command.
    ///
    /// # Errors
    ///
    /// Returns an error if the server is unreachable or rejects the request.
    pub(crate) async fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        let mut config = self.connect.load_config(None)?;
        config.session.load_on_connect = false;

        // Not bound to an existing document
        let session = Session::new(&config, DocumentRef::new(""), Arc::new(WsConnector))?;
        output.info(&format!(
            "Creating \"{}\" in {} via {}",
            self.title,
            self.index,
            session.url()
        ));

        let (surface, mut replies) = ReplySurface::new();
        let handle = session.start(surface);
        let result = create_document(
            &handle,
            &mut replies,
            &self.title,
            &self.index,
            Duration::from_secs(self.timeout),
        )
        .await;

        handle.close();
        handle.closed().await;

        let created = result?;
        output.success(&format!("Created {} ({})", created.slug, created.id));
        Ok(())
    }
}

/// Request a new document and wait for the server to create it.
async fn create_document(
    handle: &SessionHandle,
    replies: &mut mpsc::UnboundedReceiver<Reply>,
    title: &str,
    index: &str,
    timeout: Duration,
) -> Result<Created, CliError> {
    wait_connected(handle, timeout).await?;
    handle.create(title, index)?;

    loop {
        match next_reply(replies, timeout, "document creation").await? {
            Reply::Created(created) => return Ok(created),
            Reply::Failed(message) => return Err(CliError::Server(message)),
            Reply::Saved(_) => {}
        }
    }
}
