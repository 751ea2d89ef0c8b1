//! Fastly purge API client

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info};
use url::Url;

use crate::errors::SyncError;
use crate::filesys::file::File;
use crate::storage::settings::FastlySettings;

/// Anything that can invalidate a hostname in a CDN service
#[async_trait]
pub trait Purger: Send + Sync {
    async fn purge(&self, service_id: &str, hostname: &str) -> Result<(), SyncError>;
}

/// Soft-purges hostnames through the Fastly API
pub struct FastlyClient {
    client: Client,
    endpoint: Url,
    api_key: SecretString,
}

impl FastlyClient {
    /// Create a new Fastly client
    pub fn new(endpoint: &str, api_key: SecretString, timeout: Duration) -> Result<Self, SyncError> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(endpoint)
            .map_err(|e| SyncError::ConfigError(format!("invalid Fastly endpoint {endpoint}: {e}")))?;
        if endpoint.cannot_be_a_base() {
            return Err(SyncError::ConfigError(format!(
                "invalid Fastly endpoint {endpoint}: not a base URL"
            )));
        }
        Ok(Self {
            client,
            endpoint,
            api_key,
        })
    }

    /// Build a client from settings, reading the key file once.
    ///
    /// Returns `None` when there is no key, which disables purging.
    pub async fn from_settings(settings: &FastlySettings) -> Result<Option<Self>, SyncError> {
        let key_file = File::new(&settings.key_file);
        if !key_file.exists().await {
            info!("No Fastly key at {}, purging disabled", key_file.path().display());
            return Ok(None);
        }
        let key = key_file.read_string().await?.trim().to_string();
        if key.is_empty() {
            info!("Fastly key file {} is empty, purging disabled", key_file.path().display());
            return Ok(None);
        }
        let client = Self::new(
            &settings.endpoint,
            SecretString::from(key),
            Duration::from_secs(settings.timeout_secs),
        )?;
        Ok(Some(client))
    }

    /// `{endpoint}/service/{service_id}/purge/{hostname}`
    pub fn purge_url(&self, service_id: &str, hostname: &str) -> Url {
        let mut url = self.endpoint.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .extend(["service", service_id, "purge", hostname]);
        }
        url
    }
}

#[async_trait]
impl Purger for FastlyClient {
    async fn purge(&self, service_id: &str, hostname: &str) -> Result<(), SyncError> {
        let url = self.purge_url(service_id, hostname);
        debug!("POST {}", url);

        let response = self
            .client
            .post(url)
            .header(header::ACCEPT, "application/json")
            .header("Fastly-Soft-Purge", "1")
            .header("Fastly-Key", self.api_key.expose_secret())
            .send()
            .await
            .map_err(|e| SyncError::PurgeFailed {
                hostname: hostname.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        info!("Fastly PURGE request for {} responded: {} {}", hostname, status, body);

        if !status.is_success() {
            return Err(SyncError::PurgeFailed {
                hostname: hostname.to_string(),
                reason: format!("{status}: {body}"),
            });
        }
        Ok(())
    }
}
