//! Inbound pubsub payloads

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Body of a `staging` or `publish` event
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteEvent {
    #[serde(default)]
    pub project: Option<String>,

    #[serde(default)]
    pub source: Option<String>,

    #[serde(default)]
    pub branch: Option<String>,

    #[serde(default)]
    pub profile: Option<String>,

    #[serde(default)]
    pub pusher: Option<String>,

    #[serde(default)]
    pub subdir: Option<String>,

    #[serde(default, rename = "type")]
    pub deploy_type: Option<String>,

    /// Explicit deployment directory, honored in publish mode only
    #[serde(default)]
    pub target: Option<String>,
}

/// Body of a `commit` event as emitted by svnpubsub
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitEvent {
    #[serde(default, rename = "type")]
    pub vcs: Option<String>,

    #[serde(default)]
    pub repository: Option<String>,

    /// Changed paths; svnpubsub sends an object keyed by path, older
    /// emitters a plain list
    #[serde(default, deserialize_with = "changed_paths")]
    pub changed: Vec<String>,

    #[serde(default)]
    pub committer: Option<String>,
}

impl CommitEvent {
    pub fn is_svn(&self) -> bool {
        self.vcs.as_deref() == Some("svn")
    }
}

fn changed_paths<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Changed {
        List(Vec<String>),
        Keyed(BTreeMap<String, serde_json::Value>),
    }

    Ok(match Changed::deserialize(deserializer)? {
        Changed::List(paths) => paths,
        Changed::Keyed(map) => map.into_keys().collect(),
    })
}
