//! Pre-flight checks on deployment requests

use crate::errors::SyncError;
use crate::models::deployment::DeployType;
use crate::storage::layout::{normalize_path, SiteLayout};

/// Rules a request must satisfy before anything touches the filesystem
#[derive(Debug, Clone)]
pub struct Validator {
    layout: SiteLayout,
    domain_suffix: String,
    trusted_sources: Vec<String>,
}

impl Validator {
    pub fn new(layout: SiteLayout, domain: &str, trusted_sources: Vec<String>) -> Self {
        Self {
            layout,
            domain_suffix: format!(".{domain}"),
            trusted_sources,
        }
    }

    /// Accept or reject a request; never rewrites it.
    pub fn validate(
        &self,
        target_dir: &str,
        source_url: &str,
        branch: &str,
        deploy_type: DeployType,
    ) -> Result<(), SyncError> {
        let bare = target_dir.replace(&self.domain_suffix, "");
        if bare.is_empty() || !bare.chars().all(is_allowed_char) || target_dir.contains("..") {
            return Err(SyncError::ValidationRejected(format!(
                "invalid deployment dir, {target_dir}!"
            )));
        }

        // Only routed svn working copies are addressed by absolute path
        if target_dir.starts_with('/') && deploy_type != DeployType::LegacyVcs {
            return Err(SyncError::ValidationRejected(format!(
                "invalid deployment dir, {target_dir}! (absolute paths are reserved for svn targets)"
            )));
        }

        let path = self.layout.join_target(target_dir);
        if normalize_path(&path) != path || !self.layout.contains(&path) {
            return Err(SyncError::ValidationRejected(format!(
                "invalid deployment dir, {target_dir}! (translated path diverges from base web site path)"
            )));
        }

        // svn up ignores source_url; clones recheck it before running
        if deploy_type != DeployType::LegacyVcs {
            self.check_source(source_url)?;
        }

        if branch.is_empty() {
            return Err(SyncError::ValidationRejected("invalid branch, empty!".to_string()));
        }

        Ok(())
    }

    /// Reject a source URL outside the trusted prefixes
    pub fn check_source(&self, source_url: &str) -> Result<(), SyncError> {
        if self
            .trusted_sources
            .iter()
            .any(|prefix| source_url.starts_with(prefix.as_str()))
        {
            return Ok(());
        }
        Err(SyncError::ValidationRejected(format!(
            "invalid source URL, {source_url}!"
        )))
    }
}

fn is_allowed_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '/')
}
