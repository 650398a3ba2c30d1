//! WebSocket connector.

use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

use crate::error::TransportError;
use crate::transport::{Connector, Link};

/// Connects to a Hubro server over WebSocket.
///
/// Each text frame carries one JSON message. Binary, ping and pong frames
/// are not forwarded.
#[derive(Clone, Copy, Debug, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn connect(&self, url: &Url) -> BoxFuture<'static, Result<Link, TransportError>> {
        let url = url.to_string();
        Box::pin(async move {
            let (stream, _response) = connect_async(url.as_str()).await?;
            tracing::debug!(url = %url, "WebSocket handshake complete");

            let (mut sink, mut stream) = stream.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
            let (in_tx, in_rx) = mpsc::unbounded_channel();

            tokio::spawn(async move {
                while let Some(frame) = out_rx.recv().await {
                    if let Err(err) = sink.send(Message::Text(frame.into())).await {
                        tracing::debug!(error = %err, "WebSocket write failed");
                        return;
                    }
                }
                // Sender dropped: the channel was closed locally
                let _ = sink.close().await;
            });

            tokio::spawn(async move {
                while let Some(item) = stream.next().await {
                    let frame = match item {
                        Ok(Message::Text(text)) => Ok(text.as_str().to_owned()),
                        Ok(Message::Close(_)) => break,
                        Ok(_) => continue,
                        Err(err) => Err(TransportError::from(err)),
                    };
                    let failed = frame.is_err();
                    if in_tx.send(frame).is_err() || failed {
                        break;
                    }
                }
            });

            Ok(Link {
                outgoing: out_tx,
                incoming: in_rx,
            })
        })
    }
}
