//! Reconnect supervisor.
//!
//! Keeps exactly one channel alive for a session. When the channel closes,
//! for any reason, the supervisor waits a fixed delay and opens a new one.
//! Retries are unlimited and the delay does not grow.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::{Channel, ChannelSlot, ChannelState, MessageHandler};
use crate::status::ConnectionStatus;

/// Supervises the channel lifecycle of one session.
#[derive(Debug)]
pub struct Supervisor {
    slot: ChannelSlot,
    delay: Duration,
    status: watch::Sender<ConnectionStatus>,
    current: watch::Sender<Option<Channel>>,
    cancel: CancellationToken,
}

impl Supervisor {
    /// Create a supervisor that reconnects `slot` after `delay`.
    ///
    /// Cancelling `cancel` stops the retry timer and closes the live channel.
    pub fn new(slot: ChannelSlot, delay: Duration, cancel: CancellationToken) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Unknown);
        let (current, _) = watch::channel(None);
        Self {
            slot,
            delay,
            status,
            current,
            cancel,
        }
    }

    /// Subscribe to connection status changes.
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    /// Subscribe to the current channel. `None` before the first open and
    /// after shutdown.
    pub fn channel(&self) -> watch::Receiver<Option<Channel>> {
        self.current.subscribe()
    }

    /// Run the supervisor in a background task.
    ///
    /// `handler` is registered on every channel the supervisor opens.
    pub fn spawn(mut self, handler: MessageHandler) -> JoinHandle<()> {
        self.slot.set_handler(handler);
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        let mut retries: u64 = 0;

        loop {
            let channel = self.slot.open_or_reuse();
            self.current.send_replace(Some(channel.clone()));

            if !self.follow(&channel, &mut retries).await {
                break;
            }

            retries += 1;
            tracing::info!(
                url = %channel.url(),
                delay_ms = u64::try_from(self.delay.as_millis()).unwrap_or(u64::MAX),
                retry = retries,
                "Session channel closed, reconnecting"
            );

            tokio::select! {
                () = self.cancel.cancelled() => break,
                () = tokio::time::sleep(self.delay) => {}
            }
        }

        self.slot.close();
        self.current.send_replace(None);
        self.publish(ConnectionStatus::Disconnected);
        tracing::debug!("Supervisor stopped");
    }

    /// Publish the channel's transitions until it closes.
    ///
    /// Returns `false` if cancelled first.
    async fn follow(&self, channel: &Channel, retries: &mut u64) -> bool {
        let mut state = channel.watch_state();

        loop {
            let current = *state.borrow_and_update();
            match current {
                // Connecting leaves the status as it was: unknown before the
                // first open, disconnected while retrying.
                ChannelState::Connecting => {}
                ChannelState::Open => {
                    *retries = 0;
                    self.publish(ConnectionStatus::Connected);
                }
                ChannelState::Closed => {
                    self.publish(ConnectionStatus::Disconnected);
                    return true;
                }
            }

            tokio::select! {
                () = self.cancel.cancelled() => return false,
                changed = state.changed() => {
                    if changed.is_err() {
                        return true;
                    }
                }
            }
        }
    }

    fn publish(&self, status: ConnectionStatus) {
        let changed = self.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        if changed {
            tracing::debug!(%status, "Connection status changed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::mock::MockConnector;
    use hubro_protocol::InboundMessage;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;
    use tokio::time::Instant;
    use url::Url;

    const RETRY_DELAY: Duration = Duration::from_millis(5000);

    fn supervisor_for(connector: &MockConnector, cancel: CancellationToken) -> Supervisor {
        let url = Url::parse("ws://localhost:8080/admin/ws").unwrap();
        let slot = ChannelSlot::new(Arc::new(connector.clone()), url);
        Supervisor::new(slot, RETRY_DELAY, cancel)
    }

    fn record(
        mut status: watch::Receiver<ConnectionStatus>,
    ) -> mpsc::UnboundedReceiver<ConnectionStatus> {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let current = *status.borrow_and_update();
                if tx.send(current).is_err() {
                    break;
                }
            }
        });
        rx
    }

    fn ignore() -> MessageHandler {
        Arc::new(|_: InboundMessage| {})
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_unknown_until_first_transition() {
        let (connector, _listener) = MockConnector::new();
        let supervisor = supervisor_for(&connector, CancellationToken::new());

        assert_eq!(*supervisor.status().borrow(), ConnectionStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reconnects_once_after_fixed_delay() {
        let (connector, mut listener) = MockConnector::new();
        let supervisor = supervisor_for(&connector, CancellationToken::new());
        let status = supervisor.status();
        let mut history = record(supervisor.status());
        let _task = supervisor.spawn(ignore());

        let server = listener.accept().await.unwrap();
        assert_eq!(history.recv().await, Some(ConnectionStatus::Connected));

        let dropped_at = Instant::now();
        server.disconnect();
        assert_eq!(history.recv().await, Some(ConnectionStatus::Disconnected));

        tokio::time::sleep(RETRY_DELAY / 2).await;
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
        assert_eq!(connector.attempts(), 1);

        let _server = listener.accept().await.unwrap();
        assert!(Instant::now() - dropped_at >= RETRY_DELAY);
        assert_eq!(history.recv().await, Some(ConnectionStatus::Connected));

        tokio::time::sleep(RETRY_DELAY * 3).await;
        assert_eq!(connector.attempts(), 2);
        assert!(history.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_are_unlimited_with_constant_delay() {
        let (connector, mut listener) = MockConnector::new();
        connector.refuse_next(3);
        let supervisor = supervisor_for(&connector, CancellationToken::new());
        let started = Instant::now();
        let _task = supervisor.spawn(ignore());

        let _server = listener.accept().await.unwrap();

        assert_eq!(connector.attempts(), 4);
        let elapsed = Instant::now() - started;
        assert!(elapsed >= RETRY_DELAY * 3, "elapsed {elapsed:?}");
        assert!(elapsed < RETRY_DELAY * 4, "elapsed {elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_current_channel() {
        let (connector, mut listener) = MockConnector::new();
        let supervisor = supervisor_for(&connector, CancellationToken::new());
        let mut channel = supervisor.channel();
        let _task = supervisor.spawn(ignore());

        let _server = listener.accept().await.unwrap();
        channel.wait_for(Option::is_some).await.unwrap();

        let current = channel.borrow().clone().unwrap();
        current
            .watch_state()
            .wait_for(|state| *state == ChannelState::Open)
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_closes_live_channel() {
        let (connector, mut listener) = MockConnector::new();
        let cancel = CancellationToken::new();
        let supervisor = supervisor_for(&connector, cancel.clone());
        let mut status = supervisor.status();
        let channel = supervisor.channel();
        let task = supervisor.spawn(ignore());

        let mut server = listener.accept().await.unwrap();
        status
            .wait_for(|s| *s == ConnectionStatus::Connected)
            .await
            .unwrap();

        cancel.cancel();
        task.await.unwrap();

        assert_eq!(server.recv().await, None);
        assert!(channel.borrow().is_none());
        assert_eq!(*status.borrow(), ConnectionStatus::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_retry_timer() {
        let (connector, _listener) = MockConnector::new();
        connector.refuse_next(usize::MAX);
        let cancel = CancellationToken::new();
        let supervisor = supervisor_for(&connector, cancel.clone());
        let task = supervisor.spawn(ignore());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(connector.attempts(), 1);

        cancel.cancel();
        task.await.unwrap();
        tokio::time::sleep(RETRY_DELAY * 2).await;

        assert_eq!(connector.attempts(), 1);
    }
}
