//! Long-polling update source.
//!
//! The poller runs as its own task: it calls `getUpdates` in a loop, acknowledges
//! what it received by advancing the offset, and forwards every update as a
//! [`RawEvent`] into a bounded channel. The receiving end of that channel is an
//! [`EventStream`](tally_core::EventStream).
//!
//! Transient failures are retried with exponential backoff. A permanent
//! failure (bad token, revoked bot) ends the task, which closes the stream.

use std::time::Duration;

use tally_core::RawEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::api::TelegramApi;

/// Receiving end of the poller's channel.
pub type UpdateStream = mpsc::Receiver<RawEvent>;

/// First retry delay after a failed poll.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(500);

/// Upper bound for the retry delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Doubles `current`, capped at [`MAX_BACKOFF`].
pub fn next_backoff(current: Duration) -> Duration {
    current.saturating_mul(2).min(MAX_BACKOFF)
}

/// Starts polling in a background task.
///
/// The task stops when `token` is cancelled, when the receiver is dropped, or
/// on a permanent API error.
pub fn spawn(api: TelegramApi, token: CancellationToken) -> (UpdateStream, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(api.config().channel_capacity.max(1));
    let handle = tokio::spawn(poll_loop(api, tx, token));
    (rx, handle)
}

async fn poll_loop(api: TelegramApi, tx: mpsc::Sender<RawEvent>, token: CancellationToken) {
    let mut offset: Option<i64> = None;
    let mut backoff = INITIAL_BACKOFF;

    info!(
        poll_timeout = api.config().poll_timeout_secs,
        "Telegram poller started"
    );

    loop {
        let batch = tokio::select! {
            biased;
            _ = token.cancelled() => break,
            result = api.get_updates(offset) => result,
        };

        let updates = match batch {
            Ok(updates) => {
                backoff = INITIAL_BACKOFF;
                updates
            }
            Err(e) if e.is_permanent() => {
                error!(error = %e, "Telegram rejected the poll, stopping");
                break;
            }
            Err(e) => {
                warn!(error = %e, retry_in = ?backoff, "Poll failed");
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(backoff) => {}
                }
                backoff = next_backoff(backoff);
                continue;
            }
        };

        for update in updates {
            offset = Some(update.update_id + 1);
            let event = update.into_raw_event();
            if api.config().debug {
                debug!(update_id = event.update_id, kind = event.kind_name(), "Received update");
            }

            let sent = tokio::select! {
                biased;
                _ = token.cancelled() => false,
                result = tx.send(event) => result.is_ok(),
            };
            if !sent {
                info!("Telegram poller stopped");
                return;
            }
        }
    }

    info!("Telegram poller stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TelegramConfig;

    #[test]
    fn test_backoff_doubles_up_to_cap() {
        assert_eq!(next_backoff(INITIAL_BACKOFF), Duration::from_secs(1));
        assert_eq!(next_backoff(Duration::from_secs(20)), MAX_BACKOFF);
        assert_eq!(next_backoff(MAX_BACKOFF), MAX_BACKOFF);
    }

    #[tokio::test]
    async fn test_cancelled_poller_closes_stream() {
        let mut config = TelegramConfig::with_token("1:x");
        // Nothing listens here; the poll would fail and back off
        config.api_base = "http://127.0.0.1:9".into();
        let api = TelegramApi::new(config).unwrap();

        let token = CancellationToken::new();
        token.cancel();
        let (mut stream, handle) = spawn(api, token);

        handle.await.unwrap();
        assert!(stream.recv().await.is_none());
    }
}
