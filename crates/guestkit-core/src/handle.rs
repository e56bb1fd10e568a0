//! Handle type - an opaque reference to one backend session.

use crate::error::CoreError;
use chrono::{DateTime, Utc};
use guestkit_backend::{ApplianceConfig, BackendSession, DriveSpec};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Unique identifier for a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandleId(Uuid);

impl HandleId {
    /// Create a new random handle ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for HandleId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for HandleId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Current state of a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    /// Handle owns a live session and accepts operations.
    Open,
    /// Handle has been released.
    Closed,
}

impl fmt::Display for HandleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// An opaque handle owning one independent backend session.
///
/// Handles are created by [`HandleManager::create`] and owned by the
/// manager's registry until released. Two handles never share mutable
/// state; releasing one cannot affect another.
///
/// [`HandleManager::create`]: crate::HandleManager::create
pub struct Handle {
    id: HandleId,
    session: BackendSession,
    state: HandleState,
    created_at: DateTime<Utc>,
}

impl Handle {
    /// Wrap a freshly opened session in a new handle (called by HandleManager).
    pub(crate) fn open(session: BackendSession) -> Self {
        let id = HandleId::new();
        tracing::debug!(handle_id = %id, slot = %session.slot(), "Handle opened");
        Self {
            id,
            session,
            state: HandleState::Open,
            created_at: Utc::now(),
        }
    }

    /// Get the handle ID.
    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Get the current state.
    pub fn state(&self) -> HandleState {
        self.state
    }

    /// Get the creation timestamp.
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Get the appliance configuration of the underlying session.
    pub fn config(&self) -> &ApplianceConfig {
        self.session.config()
    }

    /// Whether verbose messages are enabled.
    pub fn verbose(&self) -> Result<bool, CoreError> {
        Ok(self.session.verbose()?)
    }

    /// Enable or disable verbose messages.
    pub fn set_verbose(&mut self, flag: bool) -> Result<(), CoreError> {
        Ok(self.session.set_verbose(flag)?)
    }

    /// Whether call tracing is enabled.
    pub fn trace(&self) -> Result<bool, CoreError> {
        Ok(self.session.trace()?)
    }

    /// Enable or disable call tracing.
    pub fn set_trace(&mut self, flag: bool) -> Result<(), CoreError> {
        Ok(self.session.set_trace(flag)?)
    }

    /// Whether autosync on close is enabled.
    pub fn autosync(&self) -> Result<bool, CoreError> {
        Ok(self.session.autosync()?)
    }

    /// Enable or disable autosync on close.
    pub fn set_autosync(&mut self, flag: bool) -> Result<(), CoreError> {
        Ok(self.session.set_autosync(flag)?)
    }

    /// The appliance search path.
    pub fn path(&self) -> Result<&Path, CoreError> {
        Ok(self.session.path()?)
    }

    /// Set the appliance search path.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> Result<(), CoreError> {
        Ok(self.session.set_path(path)?)
    }

    /// The program identifier.
    pub fn identifier(&self) -> Result<&str, CoreError> {
        Ok(self.session.identifier()?)
    }

    /// Set the program identifier.
    pub fn set_identifier(&mut self, identifier: impl Into<String>) -> Result<(), CoreError> {
        Ok(self.session.set_identifier(identifier)?)
    }

    /// Register a drive on the underlying session.
    pub fn add_drive(&mut self, drive: DriveSpec) -> Result<(), CoreError> {
        tracing::debug!(handle_id = %self.id, path = %drive.path.display(), "Adding drive");
        Ok(self.session.add_drive(drive)?)
    }

    /// Drives registered on the underlying session.
    pub fn drives(&self) -> &[DriveSpec] {
        self.session.drives()
    }

    /// Close the handle and release the backend session.
    ///
    /// The only state transition a handle ever makes: open to closed.
    pub(crate) fn close(mut self) -> Result<(), CoreError> {
        tracing::info!(handle_id = %self.id, "Releasing handle");
        self.state = HandleState::Closed;
        self.session.close()?;
        Ok(())
    }
}
