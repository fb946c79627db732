//! # State Snapshots
//!
//! The node keeps the whole vault in memory. On shutdown it writes the
//! vault state and the asset ledger to one JSON file; on start-up it reads
//! that file back if present. Writes go to a sibling temp file first and
//! are renamed into place.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use meridian_contracts::VaultState;
use meridian_protocol::ledger::InMemoryLedger;

use crate::api::NodeVault;

/// Everything needed to rebuild a vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub state: VaultState,
    pub ledger: InMemoryLedger,
}

impl Snapshot {
    /// Captures a vault.
    pub fn capture(vault: &NodeVault) -> Self {
        Self {
            state: vault.export_state(),
            ledger: vault.ledger().clone(),
        }
    }

    /// Reads a snapshot. `Ok(None)` when the file does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read snapshot {}", path.display()))?;
        let snapshot = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse snapshot {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Writes the snapshot, replacing any previous one.
    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        let tmp = temp_path(path);
        std::fs::write(&tmp, content)
            .with_context(|| format!("failed to write snapshot {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("failed to move snapshot into {}", path.display()))?;
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
