//! Handle manager - the explicit registry for handle lifecycles.

use crate::error::CoreError;
use crate::handle::{Handle, HandleId};
use guestkit_backend::{ApplianceConfig, Backend, DriveSpec};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Configuration for HandleManager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Backend session capacity (default: 64).
    pub capacity: usize,
    /// Maximum number of live handles (default: 0, meaning unlimited).
    pub max_handles: usize,
    /// Appliance configuration used by [`HandleManager::create`].
    pub appliance: ApplianceConfig,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            capacity: 64,
            max_handles: 0,
            appliance: ApplianceConfig::default(),
        }
    }
}

impl ManagerConfig {
    /// Create a manager configuration with the given session capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            capacity,
            ..Self::default()
        }
    }
}

/// Manages the lifecycle of multiple handles.
///
/// The HandleManager owns the backend and a registry of live handles.
/// Every [`create`] returns a distinct, independently usable handle;
/// [`release`] is the only transition out of the open state, and a
/// second release of the same id fails with
/// [`CoreError::InvalidHandle`].
///
/// # Thread Safety
///
/// The registry is guarded by an async RwLock and the manager is safe
/// to share across tasks. Identity assignment is atomic per creation:
/// concurrent creations never observe the same handle id or backend
/// slot.
///
/// [`create`]: HandleManager::create
/// [`release`]: HandleManager::release
pub struct HandleManager {
    handles: Arc<RwLock<HashMap<HandleId, Handle>>>,
    backend: Backend,
    config: ManagerConfig,
}

impl HandleManager {
    /// Create a new handle manager.
    pub fn new(config: ManagerConfig) -> Self {
        tracing::info!(
            capacity = config.capacity,
            max_handles = config.max_handles,
            "Creating handle manager"
        );
        let backend = Backend::new(config.capacity);
        Self {
            handles: Arc::new(RwLock::new(HashMap::new())),
            backend,
            config,
        }
    }

    /// Get the manager configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Create a new handle with the manager's default appliance
    /// configuration.
    ///
    /// # Returns
    ///
    /// The ID of the newly created handle. N sequential calls yield N
    /// distinct, simultaneously valid handles.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Allocation`] if the max_handles limit is
    /// reached, or a backend allocation error if the session arena is
    /// exhausted. Failures surface immediately; there is no null
    /// result to check for.
    pub async fn create(&self) -> Result<HandleId, CoreError> {
        self.create_with(self.config.appliance.clone()).await
    }

    /// Create a new handle with an explicit appliance configuration.
    pub async fn create_with(&self, config: ApplianceConfig) -> Result<HandleId, CoreError> {
        // Check handle limit
        if self.config.max_handles > 0 {
            let current = self.handles.read().await.len();
            if current >= self.config.max_handles {
                return Err(CoreError::Allocation(format!(
                    "max handle limit reached ({})",
                    self.config.max_handles
                )));
            }
        }

        let session = self.backend.session(config)?;
        let handle = Handle::open(session);
        let id = handle.id();

        let mut handles = self.handles.write().await;
        handles.insert(id, handle);

        tracing::info!(handle_id = %id, "Handle registered");
        Ok(id)
    }

    /// Release a handle.
    ///
    /// Removes the handle from the registry and closes its backend
    /// session. No further operations are valid on the id afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] for an unknown or already
    /// released id; releasing the same handle twice therefore fails.
    pub async fn release(&self, id: HandleId) -> Result<(), CoreError> {
        let handle = {
            let mut handles = self.handles.write().await;
            handles.remove(&id).ok_or(CoreError::InvalidHandle(id))?
        };
        handle.close()
    }

    /// Release all handles.
    ///
    /// This is useful for cleanup during shutdown. Errors during
    /// individual closes are logged but do not stop the drain.
    pub async fn release_all(&self) -> Result<(), CoreError> {
        let handles = {
            let mut guard = self.handles.write().await;
            std::mem::take(&mut *guard)
        };

        let count = handles.len();
        tracing::info!(count, "Releasing all handles");

        for (id, handle) in handles {
            if let Err(e) = handle.close() {
                tracing::error!(handle_id = %id, error = %e, "Failed to release handle");
            }
        }

        Ok(())
    }

    /// Check if a handle exists.
    pub async fn exists(&self, id: HandleId) -> bool {
        let handles = self.handles.read().await;
        handles.contains_key(&id)
    }

    /// List all live handle IDs.
    pub async fn list(&self) -> Vec<HandleId> {
        let handles = self.handles.read().await;
        handles.keys().copied().collect()
    }

    /// Get the number of live handles.
    pub async fn count(&self) -> usize {
        let handles = self.handles.read().await;
        handles.len()
    }

    /// Execute a read-only operation on a handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if the id is unknown.
    pub async fn with_handle<F, R>(&self, id: HandleId, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&Handle) -> R,
    {
        let handles = self.handles.read().await;
        let handle = handles.get(&id).ok_or(CoreError::InvalidHandle(id))?;
        Ok(f(handle))
    }

    /// Execute a mutating operation on a handle.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidHandle`] if the id is unknown.
    pub async fn with_handle_mut<F, R>(&self, id: HandleId, f: F) -> Result<R, CoreError>
    where
        F: FnOnce(&mut Handle) -> R,
    {
        let mut handles = self.handles.write().await;
        let handle = handles.get_mut(&id).ok_or(CoreError::InvalidHandle(id))?;
        Ok(f(handle))
    }

    // =========================================================================
    // Direct Handle Operations
    // =========================================================================
    // Convenience methods for the common property and drive operations,
    // performed within the registry lock scope.

    /// Whether verbose messages are enabled on a handle.
    pub async fn verbose(&self, id: HandleId) -> Result<bool, CoreError> {
        let handles = self.handles.read().await;
        let handle = handles.get(&id).ok_or(CoreError::InvalidHandle(id))?;
        handle.verbose()
    }

    /// Enable or disable verbose messages on a handle.
    pub async fn set_verbose(&self, id: HandleId, flag: bool) -> Result<(), CoreError> {
        let mut handles = self.handles.write().await;
        let handle = handles.get_mut(&id).ok_or(CoreError::InvalidHandle(id))?;
        handle.set_verbose(flag)
    }

    /// Whether call tracing is enabled on a handle.
    pub async fn trace(&self, id: HandleId) -> Result<bool, CoreError> {
        let handles = self.handles.read().await;
        let handle = handles.get(&id).ok_or(CoreError::InvalidHandle(id))?;
        handle.trace()
    }

    /// Enable or disable call tracing on a handle.
    pub async fn set_trace(&self, id: HandleId, flag: bool) -> Result<(), CoreError> {
        let mut handles = self.handles.write().await;
        let handle = handles.get_mut(&id).ok_or(CoreError::InvalidHandle(id))?;
        handle.set_trace(flag)
    }

    /// Register a drive on a handle.
    pub async fn add_drive(&self, id: HandleId, drive: DriveSpec) -> Result<(), CoreError> {
        let mut handles = self.handles.write().await;
        let handle = handles.get_mut(&id).ok_or(CoreError::InvalidHandle(id))?;
        handle.add_drive(drive)
    }

    /// Drives registered on a handle.
    pub async fn drives(&self, id: HandleId) -> Result<Vec<DriveSpec>, CoreError> {
        let handles = self.handles.read().await;
        let handle = handles.get(&id).ok_or(CoreError::InvalidHandle(id))?;
        Ok(handle.drives().to_vec())
    }
}
