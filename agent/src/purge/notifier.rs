//! Decides which hostnames to purge after a deployment

use std::sync::Arc;

use tracing::{debug, warn};

use crate::errors::SyncError;
use crate::models::deployment::{DeployType, DeploymentRequest};
use crate::purge::fastly::Purger;

/// One hostname in one CDN service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeTarget {
    pub service_id: String,
    pub hostname: String,
}

/// Best-effort CDN invalidation for finished deployments
pub struct PurgeNotifier {
    purger: Option<Arc<dyn Purger>>,
    domain: String,
    service_id: String,
    blogs_service_id: String,
}

impl PurgeNotifier {
    /// `purger` is `None` when purging is disabled
    pub fn new(
        purger: Option<Arc<dyn Purger>>,
        domain: impl Into<String>,
        service_id: impl Into<String>,
        blogs_service_id: impl Into<String>,
    ) -> Self {
        Self {
            purger,
            domain: domain.into(),
            service_id: service_id.into(),
            blogs_service_id: blogs_service_id.into(),
        }
    }

    /// Notifier that never purges
    pub fn disabled() -> Self {
        Self::new(None, String::new(), String::new(), String::new())
    }

    pub fn is_enabled(&self) -> bool {
        self.purger.is_some()
    }

    /// Hostnames affected by `request`, in purge order
    pub fn targets(&self, request: &DeploymentRequest) -> Vec<PurgeTarget> {
        let mut targets = Vec::new();
        if request.deploy_type == DeployType::Blog {
            targets.push(PurgeTarget {
                service_id: self.blogs_service_id.clone(),
                hostname: format!(
                    "{}.blog.{}",
                    request.target_dir.strip_suffix(".blog").unwrap_or(&request.target_dir),
                    self.domain
                ),
            });
        }
        targets.push(PurgeTarget {
            service_id: self.service_id.clone(),
            hostname: request.purge_hostname.clone(),
        });
        // The primary site is also served from the bare domain
        if request.purge_hostname == format!("www.{}", self.domain) {
            targets.push(PurgeTarget {
                service_id: self.service_id.clone(),
                hostname: self.domain.clone(),
            });
        }
        targets
    }

    /// Purge every affected hostname. Failures are logged and returned, never
    /// raised.
    pub async fn notify(&self, request: &DeploymentRequest) -> Vec<SyncError> {
        let Some(purger) = &self.purger else {
            debug!("Purging disabled, not purging {}", request.purge_hostname);
            return Vec::new();
        };

        let mut failures = Vec::new();
        for target in self.targets(request) {
            if let Err(e) = purger.purge(&target.service_id, &target.hostname).await {
                warn!("Could not purge {}: {}", target.hostname, e);
                failures.push(e);
            }
        }
        failures
    }
}
