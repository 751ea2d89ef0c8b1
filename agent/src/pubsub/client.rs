//! Streaming pubsub client
//!
//! pubsub keeps a single HTTP response open and writes one JSON object per
//! line, interleaved with keepalive objects.

use std::fmt;
use std::time::Duration;

use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use tracing::{debug, info};
use url::Url;

use crate::errors::SyncError;

/// Connects to a pubsub endpoint
#[derive(Debug, Clone)]
pub struct PubSubClient {
    client: Client,
    url: Url,
    idle_timeout: Duration,
}

impl PubSubClient {
    /// Create a new pubsub client
    pub fn new(url: &str, idle_timeout: Duration) -> Result<Self, SyncError> {
        let url = Url::parse(url)
            .map_err(|e| SyncError::ConfigError(format!("invalid pubsub URL {url}: {e}")))?;
        let client = Client::builder()
            .connect_timeout(idle_timeout)
            .build()?;
        Ok(Self {
            client,
            url,
            idle_timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open the stream
    pub async fn connect(&self) -> Result<PubSubStream, SyncError> {
        let response = self
            .client
            .get(self.url.clone())
            .send()
            .await
            .map_err(|e| SyncError::TransportDisconnected(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::TransportDisconnected(format!(
                "{} answered {}",
                self.url, status
            )));
        }
        info!("Connected to pubsub at {}", self.url);

        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(PubSubStream {
            chunks,
            lines: LineBuffer::default(),
            idle_timeout: self.idle_timeout,
        })
    }
}

/// An open pubsub response
pub struct PubSubStream {
    chunks: BoxStream<'static, Result<Vec<u8>, reqwest::Error>>,
    lines: LineBuffer,
    idle_timeout: Duration,
}

impl fmt::Debug for PubSubStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PubSubStream")
            .field("lines", &self.lines)
            .field("idle_timeout", &self.idle_timeout)
            .finish_non_exhaustive()
    }
}

impl PubSubStream {
    /// Next raw message. Any error means the stream is gone and must be
    /// reopened.
    pub async fn next_message(&mut self) -> Result<Vec<u8>, SyncError> {
        loop {
            if let Some(line) = self.lines.next_line() {
                return Ok(line);
            }
            let chunk = tokio::time::timeout(self.idle_timeout, self.chunks.next())
                .await
                .map_err(|_| {
                    SyncError::TransportDisconnected(format!(
                        "no data for {:?}",
                        self.idle_timeout
                    ))
                })?;
            match chunk {
                Some(Ok(bytes)) => {
                    debug!("Received {} bytes from pubsub", bytes.len());
                    self.lines.push(&bytes);
                }
                Some(Err(e)) => return Err(SyncError::TransportDisconnected(e.to_string())),
                None => {
                    return Err(SyncError::TransportDisconnected(
                        "server closed the stream".to_string(),
                    ))
                }
            }
        }
    }
}

/// Reassembles newline-delimited messages from arbitrary chunks
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Next complete, non-blank line without its terminator
    pub fn next_line(&mut self) -> Option<Vec<u8>> {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().any(|b| !b.is_ascii_whitespace()) {
                return Some(line);
            }
        }
        None
    }
}
