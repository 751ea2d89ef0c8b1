//! Coalescing deploy queue

use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::deployment::DeploymentRequest;

/// Latest pending request per target directory.
///
/// The event listener upserts, the deployer drains. A later request for the
/// same target replaces the earlier one.
#[derive(Debug, Default)]
pub struct DeployQueue {
    pending: Mutex<HashMap<String, DeploymentRequest>>,
}

impl DeployQueue {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a request, replacing any pending one for the same target.
    /// Returns the request that was superseded.
    pub fn upsert(&self, request: DeploymentRequest) -> Option<DeploymentRequest> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.insert(request.target_dir.clone(), request)
    }

    /// Take everything pending and leave the queue empty, in one step
    pub fn drain(&self) -> HashMap<String, DeploymentRequest> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        std::mem::take(&mut *pending)
    }

    /// Number of pending requests
    pub fn len(&self) -> usize {
        let pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        pending.len()
    }

    /// Check if the queue is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
