//! Configuration types for backend sessions.

use crate::error::{BackendError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the appliance behind one backend session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplianceConfig {
    /// Appliance memory size in MiB (minimum 128)
    pub memory_mib: u32,
    /// Number of virtual CPUs given to the appliance (1-32)
    pub smp: u8,
    /// Search path for the appliance files
    pub path: PathBuf,
    /// Program identifier reported by the session (may be empty)
    pub identifier: String,
    /// Emit verbose messages
    pub verbose: bool,
    /// Trace calls made through the session
    pub trace: bool,
    /// Sync and unmount drives automatically on close
    pub autosync: bool,
}

impl Default for ApplianceConfig {
    fn default() -> Self {
        Self {
            memory_mib: 768,
            smp: 1,
            path: PathBuf::from("/usr/lib/guestkit"),
            identifier: String::new(),
            verbose: false,
            trace: false,
            autosync: true,
        }
    }
}

impl ApplianceConfig {
    /// Create a new config builder.
    pub fn builder() -> ApplianceConfigBuilder {
        ApplianceConfigBuilder::default()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.memory_mib < 128 {
            return Err(BackendError::Config(format!(
                "memory_mib must be at least 128, got {}",
                self.memory_mib
            )));
        }

        if self.smp == 0 || self.smp > 32 {
            return Err(BackendError::Config(format!(
                "smp must be 1-32, got {}",
                self.smp
            )));
        }

        if self.path.as_os_str().is_empty() {
            return Err(BackendError::Config("path must not be empty".into()));
        }

        // Identifiers end up in log lines and scratch paths
        if self
            .identifier
            .chars()
            .any(|c| !c.is_ascii_graphic() && c != ' ')
        {
            return Err(BackendError::Config(format!(
                "identifier must be printable ASCII, got {:?}",
                self.identifier
            )));
        }

        Ok(())
    }
}

/// Builder for ApplianceConfig.
#[derive(Debug, Default)]
pub struct ApplianceConfigBuilder {
    config: ApplianceConfig,
}

impl ApplianceConfigBuilder {
    /// Set the appliance memory size in MiB.
    pub fn memory_mib(mut self, mib: u32) -> Self {
        self.config.memory_mib = mib;
        self
    }

    /// Set the vCPU count.
    pub fn smp(mut self, count: u8) -> Self {
        self.config.smp = count;
        self
    }

    /// Set the appliance search path.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.path = path.into();
        self
    }

    /// Set the program identifier.
    pub fn identifier(mut self, identifier: impl Into<String>) -> Self {
        self.config.identifier = identifier.into();
        self
    }

    /// Enable or disable verbose messages.
    pub fn verbose(mut self, flag: bool) -> Self {
        self.config.verbose = flag;
        self
    }

    /// Enable or disable call tracing.
    pub fn trace(mut self, flag: bool) -> Self {
        self.config.trace = flag;
        self
    }

    /// Enable or disable autosync on close.
    pub fn autosync(mut self, flag: bool) -> Self {
        self.config.autosync = flag;
        self
    }

    /// Build the configuration, validating all fields.
    pub fn build(self) -> Result<ApplianceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// A drive registered on a session.
///
/// Registration records where the image lives and how it should be
/// attached; the backend never opens or inspects the image itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriveSpec {
    /// Path to the drive image on the host
    pub path: PathBuf,
    /// Attach the drive read-only
    pub readonly: bool,
    /// Image format hint (e.g. "raw", "qcow2"), if known
    pub format: Option<String>,
    /// Optional label, unique within one session
    pub label: Option<String>,
}

impl DriveSpec {
    /// Create a read-write drive registration with no format hint.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            readonly: false,
            format: None,
            label: None,
        }
    }

    /// Attach the drive read-only.
    pub fn readonly(mut self, flag: bool) -> Self {
        self.readonly = flag;
        self
    }

    /// Set the image format hint.
    pub fn format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// Set the drive label.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = ApplianceConfig::default();
        assert_eq!(config.memory_mib, 768);
        assert_eq!(config.smp, 1);
        assert!(!config.verbose);
        assert!(!config.trace);
        assert!(config.autosync);
        assert!(config.identifier.is_empty());
    }

    #[test]
    fn test_validate_memory() {
        let mut config = ApplianceConfig::default();
        config.memory_mib = 64;
        assert!(config.validate().is_err());

        config.memory_mib = 128;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_smp() {
        let mut config = ApplianceConfig::default();
        config.smp = 0;
        assert!(config.validate().is_err());

        config.smp = 33;
        assert!(config.validate().is_err());

        config.smp = 4;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_identifier() {
        let mut config = ApplianceConfig::default();
        config.identifier = "virt-inspector".into();
        assert!(config.validate().is_ok());

        config.identifier = "bad\nidentifier".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_builder_success() {
        let config = ApplianceConfig::builder()
            .memory_mib(512)
            .smp(2)
            .identifier("test-suite")
            .verbose(true)
            .build()
            .expect("should build successfully");

        assert_eq!(config.memory_mib, 512);
        assert_eq!(config.smp, 2);
        assert_eq!(config.identifier, "test-suite");
        assert!(config.verbose);
    }

    #[test]
    fn test_builder_rejects_invalid() {
        let result = ApplianceConfig::builder().memory_mib(16).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_drive_spec_options() {
        let drive = DriveSpec::new("/var/lib/images/disk.img")
            .readonly(true)
            .format("qcow2")
            .label("root");

        assert_eq!(drive.path, PathBuf::from("/var/lib/images/disk.img"));
        assert!(drive.readonly);
        assert_eq!(drive.format.as_deref(), Some("qcow2"));
        assert_eq!(drive.label.as_deref(), Some("root"));
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = ApplianceConfig::builder()
            .memory_mib(256)
            .identifier("roundtrip")
            .build()
            .unwrap();

        let json = serde_json::to_string(&config).unwrap();
        let parsed: ApplianceConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.memory_mib, 256);
        assert_eq!(parsed.identifier, "roundtrip");
    }
}
