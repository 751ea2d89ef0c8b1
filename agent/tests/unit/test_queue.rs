//! Deploy queue unit tests

use std::sync::Arc;

use sitesync::models::deployment::{DeployType, DeploymentRequest};
use sitesync::queue::deploy_queue::DeployQueue;

fn create_test_request(target_dir: &str, source_url: &str) -> DeploymentRequest {
    DeploymentRequest {
        target_dir: target_dir.to_string(),
        source_url: source_url.to_string(),
        branch: "asf-site".to_string(),
        committer: "root".to_string(),
        deploy_type: DeployType::Website,
        purge_hostname: target_dir.to_string(),
        project: "foo".to_string(),
    }
}

#[test]
fn test_upsert_last_writer_wins() {
    let queue = DeployQueue::new();

    assert!(queue.upsert(create_test_request("foo.apache.org", "https://a")).is_none());
    let previous = queue.upsert(create_test_request("foo.apache.org", "https://b"));

    assert_eq!(previous.map(|r| r.source_url), Some("https://a".to_string()));
    assert_eq!(queue.len(), 1);

    let drained = queue.drain();
    assert_eq!(drained["foo.apache.org"].source_url, "https://b");
}

#[test]
fn test_drain_empties_queue() {
    let queue = DeployQueue::new();
    queue.upsert(create_test_request("foo.apache.org", "https://a"));
    queue.upsert(create_test_request("bar.apache.org", "https://b"));

    assert_eq!(queue.drain().len(), 2);
    assert!(queue.is_empty());
    assert!(queue.drain().is_empty());
}

#[test]
fn test_upsert_after_drain_is_kept() {
    let queue = DeployQueue::new();
    queue.upsert(create_test_request("foo.apache.org", "https://a"));
    let first = queue.drain();

    queue.upsert(create_test_request("foo.apache.org", "https://b"));
    let second = queue.drain();

    assert_eq!(first["foo.apache.org"].source_url, "https://a");
    assert_eq!(second["foo.apache.org"].source_url, "https://b");
}

#[tokio::test]
async fn test_concurrent_upserts_are_never_lost() {
    let queue = Arc::new(DeployQueue::new());

    let mut handles = Vec::new();
    for i in 0..8 {
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            for j in 0..50 {
                queue.upsert(create_test_request(
                    &format!("site-{i}-{j}.apache.org"),
                    "https://gitbox.apache.org/repos/asf/foo.git",
                ));
                tokio::task::yield_now().await;
            }
        }));
    }

    let mut seen = 0;
    for handle in handles {
        handle.await.unwrap();
        seen += queue.drain().len();
    }
    seen += queue.drain().len();

    assert_eq!(seen, 8 * 50);
}
