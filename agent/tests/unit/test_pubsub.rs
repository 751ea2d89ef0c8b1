//! pubsub client and listener tests against a local HTTP server

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use sitesync::app::state::ListenerStats;
use sitesync::errors::SyncError;
use sitesync::events::normalizer::Normalizer;
use sitesync::models::deployment::Mode;
use sitesync::pubsub::client::PubSubClient;
use sitesync::queue::deploy_queue::DeployQueue;
use sitesync::storage::layout::SiteLayout;
use sitesync::storage::routing::RoutingTable;
use sitesync::utils::CooldownOptions;
use sitesync::workers::listener;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

const PUBLISH_EVENT: &str =
    r#"{"publish": {"project": "foo", "source": "https://gitbox.apache.org/repos/asf/foo-site.git"}}"#;

/// Serve `body` on every connection, then close it
async fn spawn_server(body: String) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 1024];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nConnection: close\r\n\r\n{body}"
                );
                let _ = socket.write_all(response.as_bytes()).await;
                let _ = socket.shutdown().await;
            });
        }
    });
    format!("http://{addr}/json")
}

fn create_normalizer() -> Normalizer {
    Normalizer::new(
        Mode::Publish,
        "apache.org",
        SiteLayout::default(),
        Arc::new(RoutingTable::default()),
        HashMap::new(),
    )
}

#[tokio::test]
async fn test_stream_yields_lines_then_disconnects() {
    let url = spawn_server(format!("{{\"stillalive\": 1}}\n{PUBLISH_EVENT}\n")).await;
    let client = PubSubClient::new(&url, Duration::from_secs(5)).unwrap();

    let mut stream = assert_ok!(client.connect().await);
    assert_eq!(stream.next_message().await.unwrap(), br#"{"stillalive": 1}"#.to_vec());
    assert_eq!(stream.next_message().await.unwrap(), PUBLISH_EVENT.as_bytes().to_vec());

    let err = assert_err!(stream.next_message().await);
    assert!(matches!(err, SyncError::TransportDisconnected(_)));
}

#[tokio::test]
async fn test_connect_refused_is_disconnect() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = PubSubClient::new(&format!("http://{addr}/json"), Duration::from_secs(1)).unwrap();
    let err = assert_err!(client.connect().await);
    assert!(matches!(err, SyncError::TransportDisconnected(_)));
}

#[test]
fn test_handle_message_counts_outcomes() {
    let normalizer = create_normalizer();
    let queue = DeployQueue::new();
    let stats = ListenerStats::new();

    listener::handle_message(PUBLISH_EVENT.as_bytes(), &normalizer, &queue, &stats);
    listener::handle_message(br#"{"stillalive": 1}"#, &normalizer, &queue, &stats);
    listener::handle_message(b"garbage", &normalizer, &queue, &stats);

    assert_eq!(stats.events(), 3);
    assert_eq!(stats.enqueued(), 1);
    assert_eq!(stats.malformed(), 1);
    assert_eq!(queue.len(), 1);
}

#[tokio::test]
async fn test_listener_reconnects_and_enqueues() {
    let url = spawn_server(format!("{PUBLISH_EVENT}\n")).await;
    let client = PubSubClient::new(&url, Duration::from_secs(5)).unwrap();
    let normalizer = create_normalizer();
    let queue = Arc::new(DeployQueue::new());
    let stats = ListenerStats::new();
    let options = listener::Options {
        cooldown: CooldownOptions {
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            multiplier: 2.0,
        },
    };

    // Stop once the server has been hit at least twice
    let stats = Arc::new(stats);
    let watched = stats.clone();
    let shutdown = Box::pin(async move {
        while watched.reconnects() < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    });

    let run = listener::run(
        &options,
        &client,
        &normalizer,
        queue.as_ref(),
        stats.as_ref(),
        tokio::time::sleep,
        shutdown,
    );
    tokio::time::timeout(Duration::from_secs(10), run).await.unwrap();

    assert!(stats.reconnects() >= 2);
    assert!(stats.enqueued() >= 2);
    let pending = queue.drain();
    assert_eq!(pending.len(), 1);
    assert!(pending.contains_key("foo.apache.org"));
}
