//! Reconciliation and drain tests against a scratch deployment root

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use sitesync::deploy::checkout::{Action, ClobberReason};
use sitesync::deploy::engine::Reconciler;
use sitesync::deploy::validate::Validator;
use sitesync::deploy::vcs::{GitOrigin, Vcs};
use sitesync::errors::SyncError;
use sitesync::models::deployment::{DeployType, DeploymentRequest};
use sitesync::purge::fastly::Purger;
use sitesync::purge::notifier::PurgeNotifier;
use sitesync::queue::deploy_queue::DeployQueue;
use sitesync::storage::layout::SiteLayout;
use sitesync::workers::deployer::{drain_once, DrainReport};
use tempfile::TempDir;

const GITBOX: &str = "https://gitbox.apache.org/repos/asf/";

/// Records every call and materializes clones as empty directories
#[derive(Default)]
struct MockVcs {
    calls: Mutex<Vec<String>>,
    origins: Mutex<HashMap<PathBuf, GitOrigin>>,
    failing_sources: Vec<String>,
}

impl MockVcs {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn set_origin(&self, path: &Path, url: &str, branch: &str) {
        self.origins.lock().unwrap().insert(
            path.to_path_buf(),
            GitOrigin {
                url: url.to_string(),
                branch: branch.to_string(),
            },
        );
    }
}

#[async_trait]
impl Vcs for MockVcs {
    async fn clone_branch(&self, source: &str, branch: &str, path: &Path) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("clone {} {} {}", source, branch, path.display()));
        if self.failing_sources.iter().any(|s| s == source) {
            return Err(SyncError::ProcessTimedOut {
                command: format!("git clone {source}"),
                timeout: std::time::Duration::from_secs(180),
            });
        }
        tokio::fs::create_dir_all(path).await?;
        self.set_origin(path, source, branch);
        Ok(())
    }

    async fn fetch_and_reset(&self, path: &Path, branch: &str) -> Result<(), SyncError> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("reset {} {}", branch, path.display()));
        Ok(())
    }

    async fn inspect(&self, path: &Path) -> Result<GitOrigin, SyncError> {
        self.origins
            .lock()
            .unwrap()
            .get(path)
            .cloned()
            .ok_or_else(|| SyncError::Internal(format!("not a git repository: {}", path.display())))
    }

    async fn svn_update(&self, path: &Path) -> Result<(), SyncError> {
        self.calls.lock().unwrap().push(format!("svn up {}", path.display()));
        Ok(())
    }
}

#[derive(Default)]
struct MockPurger {
    purged: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Purger for MockPurger {
    async fn purge(&self, service_id: &str, hostname: &str) -> Result<(), SyncError> {
        self.purged
            .lock()
            .unwrap()
            .push((service_id.to_string(), hostname.to_string()));
        Ok(())
    }
}

struct Fixture {
    root: TempDir,
    vcs: Arc<MockVcs>,
    purger: Arc<MockPurger>,
    reconciler: Reconciler,
    notifier: PurgeNotifier,
}

impl Fixture {
    fn new(vcs: MockVcs) -> Self {
        let root = TempDir::new().unwrap();
        let layout = SiteLayout::new(root.path(), root.path().join("blogs"));
        let vcs = Arc::new(vcs);
        let purger = Arc::new(MockPurger::default());
        let validator = Validator::new(layout.clone(), "apache.org", vec![GITBOX.to_string()]);
        let reconciler = Reconciler::new(layout, validator, vcs.clone());
        let notifier = PurgeNotifier::new(
            Some(purger.clone() as Arc<dyn Purger>),
            "apache.org",
            "site-svc",
            "blog-svc",
        );
        Self {
            root,
            vcs,
            purger,
            reconciler,
            notifier,
        }
    }

    fn site(&self, name: &str) -> PathBuf {
        self.root.path().join(name)
    }

    fn purged(&self) -> Vec<String> {
        self.purger
            .purged
            .lock()
            .unwrap()
            .iter()
            .map(|(_, host)| host.clone())
            .collect()
    }
}

fn create_test_request(target_dir: &str, source: &str) -> DeploymentRequest {
    DeploymentRequest {
        target_dir: target_dir.to_string(),
        source_url: source.to_string(),
        branch: "asf-site".to_string(),
        committer: "jdoe".to_string(),
        deploy_type: DeployType::Website,
        purge_hostname: target_dir.to_string(),
        project: target_dir.split('.').next().unwrap_or_default().to_string(),
    }
}

fn foo_source() -> String {
    format!("{GITBOX}foo-site.git")
}

#[tokio::test]
async fn test_fresh_checkout_and_purge() {
    let fixture = Fixture::new(MockVcs::default());
    let queue = DeployQueue::new();
    queue.upsert(create_test_request("foo.apache.org", &foo_source()));

    let report = drain_once(&queue, &fixture.reconciler, &fixture.notifier).await;

    assert_eq!(
        report,
        DrainReport {
            deployed: 1,
            ..Default::default()
        }
    );
    assert_eq!(
        fixture.vcs.calls(),
        vec![format!(
            "clone {} asf-site {}",
            foo_source(),
            fixture.site("foo.apache.org").display()
        )]
    );
    assert_eq!(fixture.purged(), vec!["foo.apache.org".to_string()]);
}

#[tokio::test]
async fn test_matching_checkout_is_updated() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("foo.apache.org");
    tokio::fs::create_dir_all(&site).await.unwrap();
    fixture.vcs.set_origin(&site, &foo_source(), "asf-site");

    let action = fixture
        .reconciler
        .reconcile(&create_test_request("foo.apache.org", &foo_source()))
        .await
        .unwrap();

    assert_eq!(action, Action::Update);
    assert_eq!(fixture.vcs.calls(), vec![format!("reset asf-site {}", site.display())]);
}

#[tokio::test]
async fn test_changed_origin_is_clobbered() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("foo.apache.org");
    tokio::fs::create_dir_all(site.join("stale")).await.unwrap();
    let old_source = format!("{GITBOX}foo-old.git");
    fixture.vcs.set_origin(&site, &old_source, "asf-site");

    let action = fixture
        .reconciler
        .reconcile(&create_test_request("foo.apache.org", &foo_source()))
        .await
        .unwrap();

    assert_eq!(
        action,
        Action::Clobber(ClobberReason::OriginChanged { current: old_source })
    );
    assert!(!site.join("stale").exists());
    assert!(site.exists());
}

#[tokio::test]
async fn test_changed_branch_is_clobbered() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("foo.apache.org");
    tokio::fs::create_dir_all(&site).await.unwrap();
    fixture.vcs.set_origin(&site, &foo_source(), "asf-staging");

    let action = fixture
        .reconciler
        .reconcile(&create_test_request("foo.apache.org", &foo_source()))
        .await
        .unwrap();

    assert!(matches!(action, Action::Clobber(ClobberReason::BranchChanged { .. })));
}

#[tokio::test]
async fn test_svn_working_copy_is_updated_in_place() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("commons.apache.org").join("content");
    tokio::fs::create_dir_all(site.join(".svn")).await.unwrap();

    let mut request = create_test_request(
        &site.display().to_string(),
        "https://svn-master.apache.org/repos/asf/commons/cms-site/trunk/content/",
    );
    request.deploy_type = DeployType::LegacyVcs;
    request.purge_hostname = "commons.apache.org".to_string();

    let queue = DeployQueue::new();
    queue.upsert(request);
    let report = drain_once(&queue, &fixture.reconciler, &fixture.notifier).await;

    assert_eq!(report.deployed, 1);
    assert_eq!(fixture.vcs.calls(), vec![format!("svn up {}", site.display())]);
    assert_eq!(fixture.purged(), vec!["commons.apache.org".to_string()]);
}

#[tokio::test]
async fn test_missing_svn_working_copy_is_skipped() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("commons.apache.org").join("content");

    let mut request = create_test_request(
        &site.display().to_string(),
        "https://svn-master.apache.org/repos/asf/commons/cms-site/trunk/content/",
    );
    request.deploy_type = DeployType::LegacyVcs;

    let queue = DeployQueue::new();
    queue.upsert(request);
    let report = drain_once(&queue, &fixture.reconciler, &fixture.notifier).await;

    assert_eq!(report.skipped, 1);
    assert!(fixture.vcs.calls().is_empty());
    assert!(fixture.purged().is_empty());
}

#[tokio::test]
async fn test_blog_is_checked_out_under_blogs_root() {
    let fixture = Fixture::new(MockVcs::default());
    let mut request = create_test_request("foo.blog", &format!("{GITBOX}foo-blog.git"));
    request.deploy_type = DeployType::Blog;
    request.purge_hostname = "foo.apache.org".to_string();

    let queue = DeployQueue::new();
    queue.upsert(request);
    let report = drain_once(&queue, &fixture.reconciler, &fixture.notifier).await;

    assert_eq!(report.deployed, 1);
    assert!(fixture.root.path().join("blogs").join("foo").exists());
    assert_eq!(
        fixture.purged(),
        vec!["foo.blog.apache.org".to_string(), "foo.apache.org".to_string()]
    );
}

#[tokio::test]
async fn test_failures_do_not_stop_the_drain() {
    let bad_source = format!("{GITBOX}bar-site.git");
    let fixture = Fixture::new(MockVcs {
        failing_sources: vec![bad_source.clone()],
        ..Default::default()
    });

    let queue = DeployQueue::new();
    queue.upsert(create_test_request("bar.apache.org", &bad_source));
    queue.upsert(create_test_request("evil.apache.org", "https://example.com/evil.git"));
    queue.upsert(create_test_request("../etc", &foo_source()));
    queue.upsert(create_test_request("foo.apache.org", &foo_source()));

    let report = drain_once(&queue, &fixture.reconciler, &fixture.notifier).await;

    assert_eq!(report.deployed, 1);
    assert_eq!(report.failed, 3);
    assert!(fixture.site("foo.apache.org").exists());
    assert!(!fixture.site("bar.apache.org").exists());
    assert_eq!(fixture.purged(), vec!["foo.apache.org".to_string()]);
    assert!(queue.is_empty());
}

#[tokio::test]
async fn test_svn_request_never_clones_untrusted_source() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("foo.apache.org");
    tokio::fs::create_dir_all(site.join("keep")).await.unwrap();
    fixture.vcs.set_origin(&site, &foo_source(), "asf-site");

    let mut request = create_test_request("foo.apache.org", "https://evil.example/x.git");
    request.deploy_type = DeployType::LegacyVcs;

    let result = fixture.reconciler.reconcile(&request).await;

    assert!(matches!(result, Err(SyncError::ValidationRejected(_))));
    assert!(fixture.vcs.calls().is_empty());
    assert!(site.join("keep").exists());
}

#[tokio::test]
async fn test_svn_request_over_unreadable_checkout_is_rejected() {
    let fixture = Fixture::new(MockVcs::default());
    let site = fixture.site("foo.apache.org");
    tokio::fs::create_dir_all(&site).await.unwrap();

    let mut request = create_test_request("foo.apache.org", "https://evil.example/x.git");
    request.deploy_type = DeployType::LegacyVcs;

    let queue = DeployQueue::new();
    queue.upsert(request);
    let report = drain_once(&queue, &fixture.reconciler, &fixture.notifier).await;

    assert_eq!(report.failed, 1);
    assert!(fixture.vcs.calls().is_empty());
    assert!(fixture.purged().is_empty());
    assert!(site.exists());
}

#[tokio::test]
async fn test_rejected_requests_never_touch_the_filesystem() {
    let fixture = Fixture::new(MockVcs::default());

    for target in ["../etc", "/etc/passwd", "foo bar", ""] {
        let result = fixture
            .reconciler
            .reconcile(&create_test_request(target, &foo_source()))
            .await;
        assert!(
            matches!(result, Err(SyncError::ValidationRejected(_))),
            "{target:?} was not rejected"
        );
    }
    assert!(fixture.vcs.calls().is_empty());
}
