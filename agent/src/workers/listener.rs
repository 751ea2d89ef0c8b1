//! pubsub listener worker: normalizes events into the deploy queue

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::app::state::ListenerStats;
use crate::errors::SyncError;
use crate::events::normalizer::Normalizer;
use crate::pubsub::client::PubSubClient;
use crate::queue::deploy_queue::DeployQueue;
use crate::utils::{calc_exp_backoff, CooldownOptions};

/// Listener worker options
#[derive(Debug, Clone, Default)]
pub struct Options {
    /// Backoff between reconnect attempts
    pub cooldown: CooldownOptions,
}

/// Run the listener worker. Reconnects forever until shutdown.
pub async fn run<S, F>(
    options: &Options,
    client: &PubSubClient,
    normalizer: &Normalizer,
    queue: &DeployQueue,
    stats: &ListenerStats,
    sleep_fn: S,
    mut shutdown_signal: Pin<Box<dyn Future<Output = ()> + Send>>,
) where
    S: Fn(Duration) -> F,
    F: Future<Output = ()>,
{
    info!("Listener worker starting, expecting {} events...", normalizer.mode().event_key());

    let mut attempt: u32 = 0;

    loop {
        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Listener worker shutting down...");
                return;
            }
            (received, e) = listen_once(client, normalizer, queue, stats) => {
                if received > 0 {
                    attempt = 0;
                }
                warn!("Disconnected from {}: {}, reconnecting", client.url(), e);
            }
        }

        let reconnects = stats.record_reconnect();
        let delay = calc_exp_backoff(&options.cooldown, attempt);
        attempt = attempt.saturating_add(1);
        debug!("Reconnect #{} in {:?}", reconnects, delay);

        tokio::select! {
            _ = &mut shutdown_signal => {
                info!("Listener worker shutting down...");
                return;
            }
            _ = sleep_fn(delay) => {}
        }
    }
}

/// Consume one connection until it fails; returns how many messages it
/// delivered and why it ended.
async fn listen_once(
    client: &PubSubClient,
    normalizer: &Normalizer,
    queue: &DeployQueue,
    stats: &ListenerStats,
) -> (u64, SyncError) {
    let mut stream = match client.connect().await {
        Ok(stream) => stream,
        Err(e) => return (0, e),
    };

    let mut received = 0;
    loop {
        match stream.next_message().await {
            Ok(message) => {
                received += 1;
                handle_message(&message, normalizer, queue, stats);
            }
            Err(e) => return (received, e),
        }
    }
}

/// Normalize one raw message and enqueue the result. Bad messages are
/// logged and dropped.
pub fn handle_message(
    message: &[u8],
    normalizer: &Normalizer,
    queue: &DeployQueue,
    stats: &ListenerStats,
) {
    stats.record_event();
    match normalizer.normalize_bytes(message) {
        Ok(Some(request)) => {
            let target = request.target_dir.clone();
            if queue.upsert(request).is_some() {
                debug!("Superseded pending deployment for {}", target);
            }
            stats.record_enqueued();
        }
        Ok(None) => {}
        Err(e) => {
            warn!("Bad payload from pubsub: {}", e);
            stats.record_malformed();
        }
    }
}
