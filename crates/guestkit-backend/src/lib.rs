//! # guestkit-backend
//!
//! Session resource layer for the guestkit disk-image toolkit.
//! Provides a bounded arena of session records and the per-session
//! appliance configuration that sits behind every guestkit handle.
//!
//! ## Quick Start
//!
//! ```
//! use guestkit_backend::{ApplianceConfig, Backend};
//!
//! # fn example() -> guestkit_backend::Result<()> {
//! // A backend with room for 16 concurrent sessions
//! let backend = Backend::new(16);
//!
//! // Open a session; the slot is reserved until close or drop
//! let mut session = backend.session(ApplianceConfig::default())?;
//! session.set_verbose(true)?;
//!
//! session.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Bounded Allocation**: Fixed-capacity slot arena; exhaustion is a
//!   typed allocation error, never a silent failure
//! - **Tagged Identity**: Slot index plus generation, so a reused slot
//!   never aliases a released session
//! - **Appliance Configuration**: Memory, vCPUs, search path, and the
//!   verbose/trace/autosync flags, validated on open
//! - **Drive Registration**: Record drive attachments without touching
//!   the images

mod config;
mod error;
mod session;

pub use config::{ApplianceConfig, ApplianceConfigBuilder, DriveSpec};
pub use error::{BackendError, Result};
pub use session::{Backend, BackendSession, SessionState, SlotId};
