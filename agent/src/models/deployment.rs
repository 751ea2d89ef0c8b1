//! Deployment models

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of site being deployed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployType {
    /// Regular project web site, checked out from git
    Website,

    /// Project blog, checked out from git under the blogs root
    Blog,

    /// Subversion working copy, updated in place
    #[serde(rename = "svn")]
    LegacyVcs,
}

impl DeployType {
    /// Parse the `type` field of an event, falling back to `Website` for
    /// anything unrecognized.
    pub fn from_event(value: Option<&str>) -> Self {
        match value {
            Some("blog") => DeployType::Blog,
            Some("svn") => DeployType::LegacyVcs,
            _ => DeployType::Website,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeployType::Website => "website",
            DeployType::Blog => "blog",
            DeployType::LegacyVcs => "svn",
        }
    }
}

impl fmt::Display for DeployType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which event key this process deploys from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Staging boxes: `staging` events, `project[-profile]` directories
    Staging,

    /// Live boxes: `publish` events, `project.<domain>` directories
    Publish,
}

impl Mode {
    /// Event key consumed in this mode
    pub fn event_key(&self) -> &'static str {
        match self {
            Mode::Staging => "staging",
            Mode::Publish => "publish",
        }
    }
}

/// A normalized unit of work, keyed in the queue by `target_dir`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRequest {
    /// Directory relative to the deployment root (absolute for routed svn targets)
    pub target_dir: String,

    /// Repository the checkout must track
    pub source_url: String,

    /// Branch the checkout must track
    pub branch: String,

    /// Who pushed the change
    pub committer: String,

    /// Kind of deployment
    pub deploy_type: DeployType,

    /// Hostname to purge from the CDN after deploying
    pub purge_hostname: String,

    /// Project name the event was raised for
    pub project: String,
}
