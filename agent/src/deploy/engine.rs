//! Reconciliation engine: brings one checkout in line with one request

use std::sync::Arc;

use tracing::{info, warn};

use crate::deploy::checkout::{plan, Action, CheckoutState};
use crate::deploy::validate::Validator;
use crate::deploy::vcs::Vcs;
use crate::errors::SyncError;
use crate::filesys::dir::Dir;
use crate::models::deployment::DeploymentRequest;
use crate::storage::layout::SiteLayout;

/// Directory svn keeps its metadata in
const SVN_METADATA_DIR: &str = ".svn";

/// Validates, inspects and updates checkouts
pub struct Reconciler {
    layout: SiteLayout,
    validator: Validator,
    vcs: Arc<dyn Vcs>,
}

impl Reconciler {
    pub fn new(layout: SiteLayout, validator: Validator, vcs: Arc<dyn Vcs>) -> Self {
        Self {
            layout,
            validator,
            vcs,
        }
    }

    /// Reconcile the checkout for `request`, returning the action carried out
    pub async fn reconcile(&self, request: &DeploymentRequest) -> Result<Action, SyncError> {
        self.validator.validate(
            &request.target_dir,
            &request.source_url,
            &request.branch,
            request.deploy_type,
        )?;

        let dir = self.layout.checkout_dir(request);
        let state = self.inspect(&dir).await;
        let action = plan(request, &state);
        let path = dir.path().display();

        match &action {
            Action::FreshCheckout => {
                info!("{} is a new staging dir, doing fresh checkout", path);
                self.checkout(request, &dir).await?;
            }
            Action::Clobber(reason) => {
                info!("Clobbering {} ({}), re-checking out {}", path, reason, request.source_url);
                self.checkout(request, &dir).await?;
            }
            Action::Update => {
                info!("Source and branch match on-disk for {}, doing git pull", path);
                self.vcs.fetch_and_reset(dir.path(), &request.branch).await?;
            }
            Action::LegacyUpdate => {
                info!("{} is a subversion directory, running svn up to update", path);
                self.vcs.svn_update(dir.path()).await?;
            }
            Action::Skip => {
                info!("{} is not an existing svn checkout, ignoring payload for now", path);
            }
        }

        Ok(action)
    }

    /// Read the current state of a checkout directory
    pub async fn inspect(&self, dir: &Dir) -> CheckoutState {
        if !dir.exists().await {
            return CheckoutState::Absent;
        }
        if dir.subdir(SVN_METADATA_DIR).exists().await {
            return CheckoutState::LegacyWorkingCopy;
        }
        match self.vcs.inspect(dir.path()).await {
            Ok(origin) => CheckoutState::Git {
                origin: origin.url,
                branch: origin.branch,
            },
            Err(e) => {
                warn!("Could not determine original source of {}: {}", dir.path().display(), e);
                CheckoutState::Unreadable(e.to_string())
            }
        }
    }

    /// Fresh checkout; anything already at the path is removed first
    async fn checkout(&self, request: &DeploymentRequest, dir: &Dir) -> Result<(), SyncError> {
        // svn requests skip the source check in validate; nothing untrusted
        // may be cloned, nor replace what is on disk
        self.validator.check_source(&request.source_url)?;

        if dir.exists().await {
            info!("Doing recursive delete of path {}", dir.path().display());
            dir.delete().await?;
        }
        if let Some(parent) = dir.parent() {
            parent.create().await?;
        }
        self.vcs
            .clone_branch(&request.source_url, &request.branch, dir.path())
            .await
    }
}
