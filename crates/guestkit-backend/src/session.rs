//! Backend sessions and the slot arena that tracks them.

use crate::config::{ApplianceConfig, DriveSpec};
use crate::error::{BackendError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Tagged identity of a session slot in the backend arena.
///
/// The index may be reused after a session is freed, but the generation
/// is bumped on every release, so a `SlotId` never aliases a session
/// that has already been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    /// Arena index of the slot.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the slot had when this session was allocated.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}.{}", self.index, self.generation)
    }
}

/// Current state of a backend session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session holds a slot and accepts operations.
    Open,
    /// Session has been closed and its slot returned to the arena.
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Open => write!(f, "open"),
            SessionState::Closed => write!(f, "closed"),
        }
    }
}

struct Slot {
    generation: u32,
    occupied: bool,
}

struct Arena {
    slots: Vec<Slot>,
    free: Vec<usize>,
    live: usize,
    capacity: usize,
}

impl Arena {
    fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
            capacity,
        }
    }

    fn allocate(&mut self) -> Option<SlotId> {
        if self.live >= self.capacity {
            return None;
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    occupied: false,
                });
                self.slots.len() - 1
            }
        };

        let slot = &mut self.slots[index];
        slot.occupied = true;
        self.live += 1;

        Some(SlotId {
            index: index as u32,
            generation: slot.generation,
        })
    }

    fn release(&mut self, id: SlotId) {
        let Some(slot) = self.slots.get_mut(id.index as usize) else {
            return;
        };
        // A stale id (generation mismatch) must not free the current occupant
        if !slot.occupied || slot.generation != id.generation {
            return;
        }
        slot.occupied = false;
        slot.generation += 1;
        self.free.push(id.index as usize);
        self.live -= 1;
    }
}

/// The backend of the toolkit: a bounded arena of session records.
///
/// An explicit object with an explicit lifecycle; there is no
/// process-global session table. Cloning is cheap and clones share the
/// same arena.
#[derive(Clone)]
pub struct Backend {
    arena: Arc<Mutex<Arena>>,
    capacity: usize,
}

impl Backend {
    /// Create a backend with room for `capacity` concurrent sessions.
    pub fn new(capacity: usize) -> Self {
        tracing::info!(capacity, "Creating backend");
        Self {
            arena: Arc::new(Mutex::new(Arena::new(capacity))),
            capacity,
        }
    }

    /// Open a new session with the given appliance configuration.
    ///
    /// Reserves a slot in the arena; every successful call returns a
    /// session with a distinct `SlotId`, and allocation never touches
    /// previously opened sessions.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Allocation` if the arena is exhausted, or
    /// `BackendError::Config` if the configuration is invalid.
    pub fn session(&self, config: ApplianceConfig) -> Result<BackendSession> {
        config.validate()?;

        let slot = {
            let mut arena = self.arena.lock().map_err(|_| BackendError::LockPoisoned)?;
            arena.allocate().ok_or_else(|| {
                BackendError::Allocation(format!(
                    "session capacity reached ({})",
                    self.capacity
                ))
            })?
        };

        tracing::debug!(%slot, memory_mib = config.memory_mib, smp = config.smp, "Session opened");

        Ok(BackendSession {
            slot,
            arena: Arc::clone(&self.arena),
            config,
            drives: Vec::new(),
            state: SessionState::Open,
        })
    }

    /// Number of sessions currently open.
    pub fn live(&self) -> usize {
        self.arena.lock().map(|a| a.live).unwrap_or(0)
    }

    /// Maximum number of concurrent sessions.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// One open session with the backend.
///
/// Sessions own their slot exclusively and share no mutable state with
/// each other. The slot is returned to the arena on [`close`] or, if the
/// session is still open, when the session is dropped.
///
/// [`close`]: BackendSession::close
pub struct BackendSession {
    slot: SlotId,
    arena: Arc<Mutex<Arena>>,
    config: ApplianceConfig,
    drives: Vec<DriveSpec>,
    state: SessionState,
}

impl BackendSession {
    /// Identity of the slot backing this session.
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    /// Current state of the session.
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Configuration the session was opened with, including any
    /// property changes made since.
    pub fn config(&self) -> &ApplianceConfig {
        &self.config
    }

    /// Whether verbose messages are enabled.
    pub fn verbose(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.config.verbose)
    }

    /// Enable or disable verbose messages.
    pub fn set_verbose(&mut self, flag: bool) -> Result<()> {
        self.ensure_open()?;
        self.config.verbose = flag;
        Ok(())
    }

    /// Whether call tracing is enabled.
    pub fn trace(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.config.trace)
    }

    /// Enable or disable call tracing.
    pub fn set_trace(&mut self, flag: bool) -> Result<()> {
        self.ensure_open()?;
        self.config.trace = flag;
        Ok(())
    }

    /// Whether autosync on close is enabled.
    pub fn autosync(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.config.autosync)
    }

    /// Enable or disable autosync on close.
    pub fn set_autosync(&mut self, flag: bool) -> Result<()> {
        self.ensure_open()?;
        self.config.autosync = flag;
        Ok(())
    }

    /// The appliance search path.
    pub fn path(&self) -> Result<&Path> {
        self.ensure_open()?;
        Ok(&self.config.path)
    }

    /// Set the appliance search path.
    pub fn set_path(&mut self, path: impl Into<PathBuf>) -> Result<()> {
        self.ensure_open()?;
        self.config.path = path.into();
        Ok(())
    }

    /// The program identifier.
    pub fn identifier(&self) -> Result<&str> {
        self.ensure_open()?;
        Ok(&self.config.identifier)
    }

    /// Set the program identifier.
    pub fn set_identifier(&mut self, identifier: impl Into<String>) -> Result<()> {
        self.ensure_open()?;
        self.config.identifier = identifier.into();
        Ok(())
    }

    /// Register a drive on this session.
    ///
    /// The image is not opened or inspected; registration only records
    /// the attachment for the appliance.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::DuplicateDrive` if the label is already
    /// registered on this session.
    pub fn add_drive(&mut self, drive: DriveSpec) -> Result<()> {
        self.ensure_open()?;

        if let Some(label) = &drive.label {
            if self
                .drives
                .iter()
                .any(|d| d.label.as_deref() == Some(label.as_str()))
            {
                return Err(BackendError::DuplicateDrive(label.clone()));
            }
        }

        tracing::debug!(slot = %self.slot, path = %drive.path.display(), readonly = drive.readonly, "Drive registered");
        self.drives.push(drive);
        Ok(())
    }

    /// Drives registered on this session, in registration order.
    pub fn drives(&self) -> &[DriveSpec] {
        &self.drives
    }

    /// Close the session and return its slot to the arena.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::AlreadyClosed` if the session was closed
    /// before.
    pub fn close(&mut self) -> Result<()> {
        if self.state == SessionState::Closed {
            return Err(BackendError::AlreadyClosed);
        }
        self.state = SessionState::Closed;

        let mut arena = self.arena.lock().map_err(|_| BackendError::LockPoisoned)?;
        arena.release(self.slot);
        tracing::debug!(slot = %self.slot, "Session closed");
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.state != SessionState::Open {
            return Err(BackendError::InvalidState {
                expected: SessionState::Open.to_string(),
                actual: self.state.to_string(),
            });
        }
        Ok(())
    }
}

impl Drop for BackendSession {
    fn drop(&mut self) {
        if self.state == SessionState::Open {
            if let Ok(mut arena) = self.arena.lock() {
                arena.release(self.slot);
            }
        }
    }
}
