//! Application configuration options

use std::time::Duration;

use crate::models::deployment::Mode;
use crate::storage::settings::{DeploySettings, FastlySettings, PubSubSettings, Settings};
use crate::workers::{deployer, listener};

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Staging or publish
    pub mode: Mode,

    /// Event stream settings
    pub pubsub: PubSubSettings,

    /// Filesystem and VCS settings
    pub deploy: DeploySettings,

    /// CDN purge settings
    pub fastly: FastlySettings,

    /// Listener worker options
    pub listener: listener::Options,

    /// Deployer worker options
    pub deployer: deployer::Options,
}

impl AppOptions {
    /// Derive runtime options from the settings file
    pub fn from_settings(settings: &Settings, host_name: &str) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            mode: settings.mode.resolve(host_name),
            pubsub: settings.pubsub.clone(),
            deploy: settings.deploy.clone(),
            fastly: settings.fastly.clone(),
            listener: listener::Options::default(),
            deployer: deployer::Options {
                interval: settings.deploy.drain_interval(),
            },
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), "")
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown; covers an in-flight checkout
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(200),
        }
    }
}
