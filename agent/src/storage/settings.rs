//! Settings file management

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::logs::LogLevel;
use crate::models::deployment::Mode;

/// Default location of the settings file
pub const DEFAULT_SETTINGS_FILE: &str = "/etc/sitesync/settings.json";

/// Synchronizer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Emit JSON log lines
    #[serde(default)]
    pub json_logs: bool,

    /// Directory for rotated log files
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Staging or publish mode
    #[serde(default)]
    pub mode: ModeSetting,

    /// Event stream settings
    #[serde(default)]
    pub pubsub: PubSubSettings,

    /// Filesystem and VCS settings
    #[serde(default)]
    pub deploy: DeploySettings,

    /// CDN purge settings
    #[serde(default)]
    pub fastly: FastlySettings,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            json_logs: false,
            log_dir: None,
            mode: ModeSetting::default(),
            pubsub: PubSubSettings::default(),
            deploy: DeploySettings::default(),
            fastly: FastlySettings::default(),
        }
    }
}

/// Configured mode, `Auto` picks one from the host name
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    #[default]
    Auto,
    Staging,
    Publish,
}

impl ModeSetting {
    /// Live site boxes are named `tlp-*`; everything else stages.
    pub fn resolve(&self, host_name: &str) -> Mode {
        match self {
            ModeSetting::Staging => Mode::Staging,
            ModeSetting::Publish => Mode::Publish,
            ModeSetting::Auto if host_name.contains("tlp") => Mode::Publish,
            ModeSetting::Auto => Mode::Staging,
        }
    }
}

/// Event stream settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PubSubSettings {
    /// Stream endpoint
    #[serde(default = "default_pubsub_url")]
    pub url: String,

    /// Seconds without any data before the stream counts as dead
    #[serde(default = "default_pubsub_timeout")]
    pub timeout_secs: u64,
}

fn default_pubsub_url() -> String {
    "https://pubsub.apache.org:2070/".to_string()
}

fn default_pubsub_timeout() -> u64 {
    30
}

impl Default for PubSubSettings {
    fn default() -> Self {
        Self {
            url: default_pubsub_url(),
            timeout_secs: default_pubsub_timeout(),
        }
    }
}

impl PubSubSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Filesystem and VCS settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploySettings {
    /// Root every site checkout lives beneath
    #[serde(default = "default_root_dir")]
    pub root_dir: PathBuf,

    /// Root for blog checkouts
    #[serde(default = "default_blogs_root_dir")]
    pub blogs_root_dir: PathBuf,

    #[serde(default = "default_git_cmd")]
    pub git_cmd: PathBuf,

    #[serde(default = "default_svn_cmd")]
    pub svn_cmd: PathBuf,

    /// Upper bound for any single VCS command
    #[serde(default = "default_checkout_timeout")]
    pub checkout_timeout_secs: u64,

    /// Seconds between queue drains
    #[serde(default = "default_drain_interval")]
    pub drain_interval_secs: u64,

    /// svnwcsub-style routing file for svn commit events
    #[serde(default = "default_routing_file")]
    pub routing_file: PathBuf,

    /// Organizational domain appended to project names
    #[serde(default = "default_domain")]
    pub domain: String,

    /// Source URL prefixes git deployments may come from
    #[serde(default = "default_trusted_sources")]
    pub trusted_sources: Vec<String>,

    /// svn repository UUIDs and their root URLs
    #[serde(default = "default_svn_repositories")]
    pub svn_repositories: HashMap<Uuid, String>,
}

fn default_root_dir() -> PathBuf {
    PathBuf::from("/www")
}

fn default_blogs_root_dir() -> PathBuf {
    PathBuf::from("/www/blogs")
}

fn default_git_cmd() -> PathBuf {
    PathBuf::from("/usr/bin/git")
}

fn default_svn_cmd() -> PathBuf {
    PathBuf::from("/usr/bin/svn")
}

fn default_checkout_timeout() -> u64 {
    180
}

fn default_drain_interval() -> u64 {
    5
}

fn default_routing_file() -> PathBuf {
    PathBuf::from("svnwcsub.conf")
}

fn default_domain() -> String {
    "apache.org".to_string()
}

fn default_trusted_sources() -> Vec<String> {
    vec![
        "https://gitbox.apache.org/repos/asf/".to_string(),
        "https://github.com/apache/".to_string(),
    ]
}

fn default_svn_repositories() -> HashMap<Uuid, String> {
    [
        (
            Uuid::from_u128(0x13f79535_47bb_0310_9956_ffa450edef68),
            "https://svn-master.apache.org/repos/asf",
        ),
        (
            Uuid::from_u128(0x90ea9780_b833_de11_8433_001ec94261de),
            "https://svn-master.apache.org/repos/infra",
        ),
    ]
    .into_iter()
    .map(|(id, url)| (id, url.to_string()))
    .collect()
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            root_dir: default_root_dir(),
            blogs_root_dir: default_blogs_root_dir(),
            git_cmd: default_git_cmd(),
            svn_cmd: default_svn_cmd(),
            checkout_timeout_secs: default_checkout_timeout(),
            drain_interval_secs: default_drain_interval(),
            routing_file: default_routing_file(),
            domain: default_domain(),
            trusted_sources: default_trusted_sources(),
            svn_repositories: default_svn_repositories(),
        }
    }
}

impl DeploySettings {
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_secs(self.checkout_timeout_secs)
    }

    pub fn drain_interval(&self) -> Duration {
        Duration::from_secs(self.drain_interval_secs)
    }
}

/// Fastly purge settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FastlySettings {
    #[serde(default = "default_fastly_endpoint")]
    pub endpoint: String,

    /// Service fronting the project sites
    #[serde(default = "default_fastly_service_id")]
    pub service_id: String,

    /// Service fronting the blogs
    #[serde(default = "default_fastly_blogs_service_id")]
    pub blogs_service_id: String,

    /// File holding the API key; purging is disabled when it is absent
    #[serde(default = "default_fastly_key_file")]
    pub key_file: PathBuf,

    #[serde(default = "default_fastly_timeout")]
    pub timeout_secs: u64,
}

fn default_fastly_endpoint() -> String {
    "https://api.fastly.com".to_string()
}

fn default_fastly_service_id() -> String {
    "4bDOjcgRkWOJy4OpyuG8yT".to_string()
}

fn default_fastly_blogs_service_id() -> String {
    "xkIl7M5JXDA3qxX3KZeze1".to_string()
}

fn default_fastly_key_file() -> PathBuf {
    PathBuf::from("/home/svnwc/fastly.key")
}

fn default_fastly_timeout() -> u64 {
    10
}

impl Default for FastlySettings {
    fn default() -> Self {
        Self {
            endpoint: default_fastly_endpoint(),
            service_id: default_fastly_service_id(),
            blogs_service_id: default_fastly_blogs_service_id(),
            key_file: default_fastly_key_file(),
            timeout_secs: default_fastly_timeout(),
        }
    }
}
