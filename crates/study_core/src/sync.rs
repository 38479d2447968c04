//! crates/study_core/src/sync.rs
//!
//! Orchestrates reads and writes across the local cache and the optional remote
//! store. Local writes always happen first and decide success; remote calls are
//! bounded by a timeout, and their failures are logged rather than returned.
//! Nothing here retries; retry policy belongs to the caller.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::domain::{ListingOrigin, Resource, ResourceListing, UserStats};
use crate::local::LocalResourceStore;
use crate::ports::{PortError, PortResult, RemoteResourceStore};

pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The resource was saved locally, but the remote store has no signed-in
    /// user to attach it to, so cloud sync was not attempted.
    #[error("Saved locally, but cloud sync needs a signed-in user")]
    NotAuthenticated,
    #[error("Invalid resource: {0}")]
    InvalidResource(String),
}

pub struct SyncingResourceService {
    local: Arc<LocalResourceStore>,
    remote: Option<Arc<dyn RemoteResourceStore>>,
    remote_timeout: Duration,
}

impl SyncingResourceService {
    pub fn new(
        local: Arc<LocalResourceStore>,
        remote: Option<Arc<dyn RemoteResourceStore>>,
        remote_timeout: Duration,
    ) -> Self {
        Self {
            local,
            remote,
            remote_timeout,
        }
    }

    /// A service with no remote store; everything is served from the cache.
    pub fn local_only(local: Arc<LocalResourceStore>) -> Self {
        Self::new(local, None, DEFAULT_REMOTE_TIMEOUT)
    }

    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn local(&self) -> &LocalResourceStore {
        &self.local
    }

    /// Runs a remote call under the configured timeout, logging any failure.
    async fn remote_call<T, F>(&self, operation: &'static str, call: F) -> PortResult<T>
    where
        F: Future<Output = PortResult<T>>,
    {
        let result = match tokio::time::timeout(self.remote_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PortError::Timeout(self.remote_timeout)),
        };
        match &result {
            Ok(_) => debug!(operation, "Remote call succeeded"),
            Err(PortError::NotFound(what)) => debug!(operation, "Remote miss: {}", what),
            Err(e) => warn!(operation, "Remote call failed: {}", e),
        }
        result
    }

    /// Lists resources, preferring the remote store. The origin says which
    /// side answered.
    pub async fn list_resources(&self) -> ResourceListing {
        let Some(remote) = &self.remote else {
            return ResourceListing {
                resources: self.local.snapshot(),
                origin: ListingOrigin::LocalOnly,
            };
        };

        match self.remote_call("list_resources", remote.list_resources()).await {
            Ok(resources) if !resources.is_empty() || self.local.is_empty() => ResourceListing {
                resources,
                origin: ListingOrigin::Remote,
            },
            Ok(_) => {
                info!("Remote store returned no resources; serving the local cache");
                ResourceListing {
                    resources: self.local.snapshot(),
                    origin: ListingOrigin::RemoteEmpty,
                }
            }
            Err(_) => ResourceListing {
                resources: self.local.snapshot(),
                origin: ListingOrigin::RemoteUnavailable,
            },
        }
    }

    /// Fetches a resource, touching its last access time on whichever side answers.
    pub async fn get_resource(&self, id: &str) -> Option<Resource> {
        if let Some(remote) = &self.remote {
            if let Ok(resource) = self.remote_call("get_resource", remote.get_resource(id)).await {
                return Some(resource);
            }
        }
        self.local.touch(id)
    }

    /// Saves a resource locally, then best-effort to the remote store.
    ///
    /// Returns `SyncError::NotAuthenticated` only when a remote store is
    /// configured but has no user; the local save has still happened.
    pub async fn create_resource(&self, resource: Resource) -> Result<(), SyncError> {
        if let Some(problem) = resource.problem() {
            return Err(SyncError::InvalidResource(problem));
        }

        let inserted = self.local.insert(resource.clone());
        if !inserted {
            debug!(id = %resource.id, "Resource already cached; keeping the existing copy");
        }

        let Some(remote) = &self.remote else {
            return Ok(());
        };
        if remote.user_id().is_none() {
            warn!(id = %resource.id, "No signed-in user; skipping remote save");
            return Err(SyncError::NotAuthenticated);
        }

        if self
            .remote_call("save_resource", remote.save_resource(&resource))
            .await
            .is_ok()
        {
            info!(id = %resource.id, "Resource synced to remote store");
        }
        Ok(())
    }

    /// Deletes a resource locally, then best-effort remotely. Returns whether
    /// the local cache held it.
    pub async fn delete_resource(&self, id: &str) -> bool {
        let removed = self.local.remove(id);
        if let Some(remote) = &self.remote {
            let _ = self
                .remote_call("delete_resource", remote.delete_resource(id))
                .await;
        }
        removed
    }

    /// Remote aggregates when reachable, local approximation otherwise.
    pub async fn user_stats(&self) -> UserStats {
        if let Some(remote) = &self.remote {
            if let Ok(stats) = self.remote_call("user_stats", remote.user_stats()).await {
                return stats;
            }
        }
        self.local.local_stats()
    }
}
