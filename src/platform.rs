//! # Platform collaborator: credentials and memory stats.
//!
//! Everything the control plane needs from the underlying device that is not
//! irrigation-specific: wiping stored network credentials (for `reset_wifi`)
//! and sampling free memory (for heartbeats).

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::error::StoreError;

/// Device-level services outside the irrigation core.
pub trait Platform: Send + Sync {
    /// Deletes stored network credentials so the device re-provisions on the
    /// next boot. Absence of credentials is not an error.
    fn clear_credentials(&self) -> Result<(), StoreError>;

    /// Currently available memory in bytes; 0 if unknown.
    fn free_ram(&self) -> u64;
}

/// Host implementation: credentials in a file, memory from `/proc/meminfo`.
pub struct HostPlatform {
    credentials_path: PathBuf,
}

impl HostPlatform {
    pub fn new(credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            credentials_path: credentials_path.into(),
        }
    }
}

impl Platform for HostPlatform {
    fn clear_credentials(&self) -> Result<(), StoreError> {
        match fs::remove_file(&self.credentials_path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn free_ram(&self) -> u64 {
        let Ok(meminfo) = fs::read_to_string("/proc/meminfo") else {
            return 0;
        };
        meminfo
            .lines()
            .find_map(|line| line.strip_prefix("MemAvailable:"))
            .and_then(|rest| rest.trim().trim_end_matches(" kB").trim().parse::<u64>().ok())
            .map(|kb| kb * 1024)
            .unwrap_or(0)
    }
}
