//! Maps inbound pubsub payloads onto deployment requests

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::SyncError;
use crate::events::ancestor::common_parent;
use crate::models::deployment::{DeployType, DeploymentRequest, Mode};
use crate::models::event::{CommitEvent, SiteEvent};
use crate::storage::layout::SiteLayout;
use crate::storage::routing::RoutingTable;

const DEFAULT_BRANCH: &str = "asf-site";
const DEFAULT_PUSHER: &str = "root";
const DEFAULT_SVN_PROJECT: &str = "infra";

/// Turns raw events into [`DeploymentRequest`]s
#[derive(Debug, Clone)]
pub struct Normalizer {
    mode: Mode,
    domain: String,
    layout: SiteLayout,
    routing: Arc<RoutingTable>,
    svn_repositories: HashMap<Uuid, String>,
}

impl Normalizer {
    pub fn new(
        mode: Mode,
        domain: impl Into<String>,
        layout: SiteLayout,
        routing: Arc<RoutingTable>,
        svn_repositories: HashMap<Uuid, String>,
    ) -> Self {
        Self {
            mode,
            domain: domain.into(),
            layout,
            routing,
            svn_repositories,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Decode one message off the wire and normalize it
    pub fn normalize_bytes(&self, bytes: &[u8]) -> Result<Option<DeploymentRequest>, SyncError> {
        let payload: Value =
            serde_json::from_slice(bytes).map_err(|e| SyncError::TransportDecode(e.to_string()))?;
        self.normalize(&payload)
    }

    /// Normalize a decoded payload. `Ok(None)` means the event is not for us.
    pub fn normalize(&self, payload: &Value) -> Result<Option<DeploymentRequest>, SyncError> {
        let Some(object) = payload.as_object() else {
            return Err(SyncError::TransportDecode("payload is not a JSON object".to_string()));
        };

        // svnpubsub commits only ever turn into publish events
        if self.mode == Mode::Publish {
            if let Some(event) = self.translate_commit(object.get("commit"))? {
                return Ok(self.build_request(event, true));
            }
        }

        match object.get(self.mode.event_key()) {
            Some(body) => {
                let event: SiteEvent = serde_json::from_value(body.clone()).map_err(|e| {
                    SyncError::TransportDecode(format!("bad {} payload: {}", self.mode.event_key(), e))
                })?;
                Ok(self.build_request(event, false))
            }
            None => Ok(None),
        }
    }

    /// Rewrite an svn commit on a tracked path into a publish event
    fn translate_commit(&self, commit: Option<&Value>) -> Result<Option<SiteEvent>, SyncError> {
        let Some(body) = commit.filter(|c| c.is_object()) else {
            return Ok(None);
        };
        let commit: CommitEvent = serde_json::from_value(body.clone())
            .map_err(|e| SyncError::TransportDecode(format!("bad commit payload: {}", e)))?;
        if !commit.is_svn() {
            return Ok(None);
        }

        let Some(svn_root) = commit
            .repository
            .as_deref()
            .and_then(|r| Uuid::parse_str(r).ok())
            .and_then(|id| self.svn_repositories.get(&id))
        else {
            return Ok(None);
        };

        let parent = common_parent(commit.changed.as_slice());
        let svn_url = join_url(svn_root, &parent);
        debug!("Found commit from {}", svn_url);

        let Some(entry) = self.routing.lookup(&svn_url) else {
            return Ok(None);
        };
        info!(
            "Found svn match for {} in {}, treating as a publish event",
            entry.url_prefix, entry.target
        );

        let project = self
            .layout
            .site_dir_of(&entry.target)
            .map(|dir| self.strip_domain(dir).to_string())
            .unwrap_or_else(|| DEFAULT_SVN_PROJECT.to_string());

        Ok(Some(SiteEvent {
            project: Some(project),
            source: Some(svn_url),
            pusher: Some(commit.committer.unwrap_or_else(|| DEFAULT_PUSHER.to_string())),
            deploy_type: Some(DeployType::LegacyVcs.as_str().to_string()),
            target: Some(entry.target.clone()),
            ..Default::default()
        }))
    }

    /// `routed` marks events synthesized from the routing table, the only
    /// source allowed to name an absolute target
    fn build_request(&self, event: SiteEvent, routed: bool) -> Option<DeploymentRequest> {
        let project = event.project.unwrap_or_default();
        let source = event.source.unwrap_or_default();
        let branch = event
            .branch
            .as_deref()
            .unwrap_or(DEFAULT_BRANCH)
            .replace("refs/heads/", "");
        let profile = event.profile.unwrap_or_default();
        let committer = event.pusher.unwrap_or_else(|| DEFAULT_PUSHER.to_string());
        let subdir = event.subdir.unwrap_or_default();
        let deploy_type = DeployType::from_event(event.deploy_type.as_deref());

        let mut target_dir = match self.mode {
            Mode::Staging if !profile.is_empty() => format!("{project}-{profile}"),
            Mode::Staging => project.clone(),
            Mode::Publish => match event.target.filter(|t| !t.is_empty()) {
                Some(target) => target,
                None if project.is_empty() => String::new(),
                None => format!("{}.{}", project, self.domain),
            },
        };

        if target_dir.is_empty() || source.is_empty() || branch.is_empty() {
            debug!("Ignoring incomplete {} event for project {:?}", self.mode.event_key(), project);
            return None;
        }
        if target_dir.starts_with('/') && !routed {
            warn!(
                "Ignoring {} event for {:?} with absolute target {}",
                self.mode.event_key(),
                project,
                target_dir
            );
            return None;
        }

        // Routed svn targets are absolute paths; the site directory beneath
        // the root is the hostname
        let purge_hostname = match self.layout.site_dir_of(&target_dir) {
            Some(site) if target_dir.starts_with('/') => site.to_string(),
            _ => target_dir.clone(),
        };
        let subdir = subdir.trim_start_matches('/');
        if is_safe_subdir(subdir) {
            info!(
                "Extending deployment [{}] dir {} with subdir {}",
                deploy_type, target_dir, subdir
            );
            target_dir = join_path(&target_dir, subdir);
        }
        if deploy_type == DeployType::Blog {
            // Queue key only; blogs live under their own root
            target_dir = format!("{project}.blog");
        }

        info!(
            "Found deploy [{}] delivery for {}, deploying as {}",
            deploy_type, project, target_dir
        );

        Some(DeploymentRequest {
            target_dir,
            source_url: source,
            branch,
            committer,
            deploy_type,
            purge_hostname,
            project,
        })
    }

    fn strip_domain<'a>(&self, name: &'a str) -> &'a str {
        name.strip_suffix(&format!(".{}", self.domain)).unwrap_or(name)
    }
}

fn is_safe_subdir(subdir: &str) -> bool {
    !subdir.is_empty()
        && subdir
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '/'))
}

/// Append `rest` to `base` as trailing segments, never replacing `base`
fn join_path(base: &str, rest: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), rest.trim_start_matches('/'))
}

fn join_url(root: &str, parent: &str) -> String {
    format!("{}/{}", root.trim_end_matches('/'), parent.trim_start_matches('/'))
}
