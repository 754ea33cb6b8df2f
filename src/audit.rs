//! Emergency audit trail
//!
//! Falls, cancellations and SOS outcomes are appended to a plain-text log
//! so a caregiver can reconstruct what happened.

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct AuditLog {
    path: Option<PathBuf>,
}

impl AuditLog {
    /// Log at `<config_dir>/sightguide/audit.log`
    pub fn default_location() -> Self {
        Self::at(crate::config::config_dir().join("audit.log"))
    }

    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    /// Drops every entry
    pub fn disabled() -> Self {
        Self { path: None }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Write an entry to the audit log
    pub fn log(&self, entry: &str) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }

        let mut file = OpenOptions::new().create(true).append(true).open(path)?;

        writeln!(
            file,
            "[{}] {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            entry
        )?;
        Ok(())
    }

    /// Like `log`, but failures only produce a warning
    pub fn record(&self, entry: &str) {
        if let Err(e) = self.log(entry) {
            warn!("⚠️ Could not write audit entry '{}': {}", entry, e);
        }
    }
}
