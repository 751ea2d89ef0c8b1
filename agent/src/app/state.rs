//! Application state management

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::info;

use crate::app::options::AppOptions;
use crate::deploy::engine::Reconciler;
use crate::deploy::validate::Validator;
use crate::deploy::vcs::{CommandVcs, Vcs};
use crate::errors::SyncError;
use crate::events::normalizer::Normalizer;
use crate::filesys::file::File;
use crate::pubsub::client::PubSubClient;
use crate::purge::fastly::{FastlyClient, Purger};
use crate::purge::notifier::PurgeNotifier;
use crate::queue::deploy_queue::DeployQueue;
use crate::storage::layout::SiteLayout;
use crate::storage::routing::RoutingTable;

/// Counters for the event stream
#[derive(Debug, Default)]
pub struct ListenerStats {
    reconnects: AtomicU64,
    events: AtomicU64,
    enqueued: AtomicU64,
    malformed: AtomicU64,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a reconnect; returns the running total
    pub fn record_reconnect(&self) -> u64 {
        self.reconnects.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn record_event(&self) {
        self.events.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_malformed(&self) {
        self.malformed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    pub fn events(&self) -> u64 {
        self.events.load(Ordering::Relaxed)
    }

    pub fn enqueued(&self) -> u64 {
        self.enqueued.load(Ordering::Relaxed)
    }

    pub fn malformed(&self) -> u64 {
        self.malformed.load(Ordering::Relaxed)
    }
}

/// Main application state
pub struct AppState {
    /// Pending deployments
    pub queue: Arc<DeployQueue>,

    /// Event stream counters
    pub stats: Arc<ListenerStats>,

    /// Event stream connection
    pub pubsub: Arc<PubSubClient>,

    /// Event to request mapping
    pub normalizer: Arc<Normalizer>,

    /// Checkout reconciliation
    pub reconciler: Arc<Reconciler>,

    /// CDN invalidation
    pub notifier: Arc<PurgeNotifier>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(options: &AppOptions) -> Result<Self, SyncError> {
        info!("Initializing application state...");

        let deploy = &options.deploy;
        let layout = SiteLayout::new(&deploy.root_dir, &deploy.blogs_root_dir);

        let routing = Arc::new(RoutingTable::load(&File::new(&deploy.routing_file)).await?);
        let normalizer = Arc::new(Normalizer::new(
            options.mode,
            deploy.domain.clone(),
            layout.clone(),
            routing,
            deploy.svn_repositories.clone(),
        ));

        let vcs: Arc<dyn Vcs> = Arc::new(CommandVcs::new(
            &deploy.git_cmd,
            &deploy.svn_cmd,
            deploy.checkout_timeout(),
        ));
        let validator = Validator::new(layout.clone(), &deploy.domain, deploy.trusted_sources.clone());
        let reconciler = Arc::new(Reconciler::new(layout, validator, vcs));

        let notifier = Arc::new(Self::init_notifier(options).await?);

        let pubsub = Arc::new(PubSubClient::new(&options.pubsub.url, options.pubsub.timeout())?);

        Ok(Self {
            queue: Arc::new(DeployQueue::new()),
            stats: Arc::new(ListenerStats::new()),
            pubsub,
            normalizer,
            reconciler,
            notifier,
        })
    }

    /// Purging only happens on publish boxes holding a Fastly key
    async fn init_notifier(options: &AppOptions) -> Result<PurgeNotifier, SyncError> {
        if options.mode != crate::models::deployment::Mode::Publish {
            info!("Staging mode, CDN purging disabled");
            return Ok(PurgeNotifier::disabled());
        }
        let purger: Option<Arc<dyn Purger>> = FastlyClient::from_settings(&options.fastly)
            .await?
            .map(|client| Arc::new(client) as Arc<dyn Purger>);
        Ok(PurgeNotifier::new(
            purger,
            options.deploy.domain.clone(),
            options.fastly.service_id.clone(),
            options.fastly.blogs_service_id.clone(),
        ))
    }

    /// Shutdown application state
    pub async fn shutdown(&self) -> Result<(), SyncError> {
        let pending = self.queue.len();
        info!(
            "Shutting down with {} pending deployments; {} events seen, {} reconnects",
            pending,
            self.stats.events(),
            self.stats.reconnects()
        );
        Ok(())
    }
}
