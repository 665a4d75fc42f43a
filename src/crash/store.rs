//! Crash state file
//!
//! Crash records must outlive a controller restart: the deposed primary
//! may come back long after the process that elected its successor died.
//! The registry is written as one JSON document, replaced atomically via a
//! temporary file and rename.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::errors::{CrashStoreError, CrashStoreResult};
use super::record::Crash;
use super::registry::CrashRegistry;

/// File name of the state file inside the working directory.
pub const CRASH_STATE_FILE: &str = "crashes.json";

/// JSON-file backed persistence for the crash registry.
#[derive(Debug, Clone)]
pub struct CrashStore {
    path: PathBuf,
}

impl CrashStore {
    /// Store rooted in `working_dir`.
    pub fn in_dir(working_dir: &Path) -> Self {
        Self {
            path: working_dir.join(CRASH_STATE_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the registry. A missing file is an empty registry.
    pub fn load(&self) -> CrashStoreResult<CrashRegistry> {
        if !self.path.exists() {
            return Ok(CrashRegistry::new());
        }

        let content = fs::read_to_string(&self.path)
            .map_err(|e| CrashStoreError::Io(self.path.display().to_string(), e.to_string()))?;
        if content.trim().is_empty() {
            return Ok(CrashRegistry::new());
        }

        let crashes: Vec<Crash> = serde_json::from_str(&content)
            .map_err(|e| CrashStoreError::Corrupt(self.path.display().to_string(), e.to_string()))?;

        let mut registry = CrashRegistry::new();
        for crash in crashes {
            registry.push(crash);
        }
        Ok(registry)
    }

    /// Replace the state file with the registry's current content.
    pub fn save(&self, registry: &CrashRegistry) -> CrashStoreResult<()> {
        let crashes: Vec<&Crash> = registry.iter().collect();
        let json = serde_json::to_vec_pretty(&crashes)
            .map_err(|e| CrashStoreError::Corrupt(self.path.display().to_string(), e.to_string()))?;

        let tmp = self.path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| CrashStoreError::Io(tmp.display().to_string(), e.to_string());

        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(&json).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
        drop(file);

        fs::rename(&tmp, &self.path)
            .map_err(|e| CrashStoreError::Io(self.path.display().to_string(), e.to_string()))
    }
}
