//! Architect snapshot persistence
//!
//! Keeps the last edited configuration and node list on disk so the editor
//! reopens where it was left. Files are parsed leniently: the config is read
//! as a patch over the defaults so files written by older builds, or edited
//! by hand, still normalize to a complete configuration.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::architect::config::{SystemConfig, SystemConfigPatch, merge_config};
use crate::architect::nodes::{Node, default_nodes};
use crate::architect::store::ArchitectState;

const SNAPSHOT_FILE: &str = "architect.json";

/// On-disk layout as written
#[derive(Debug, Clone, Serialize)]
struct SnapshotOut<'a> {
    config: &'a SystemConfig,
    nodes: &'a [Node],
    saved_at: DateTime<Utc>,
}

/// On-disk layout as read; everything optional
#[derive(Debug, Clone, Deserialize)]
struct SnapshotIn {
    #[serde(default)]
    config: SystemConfigPatch,
    #[serde(default)]
    nodes: Option<Vec<Node>>,
    #[serde(default)]
    saved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedSnapshot {
    pub state: ArchitectState,
    pub saved_at: Option<DateTime<Utc>>,
}

/// Architect snapshot file manager
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Resolves the platform config directory:
    /// - macOS: ~/Library/Application Support/hempverse/architect/
    /// - Linux: ~/.config/hempverse/architect/
    /// - Windows: %APPDATA%\hempverse\architect\
    pub fn new() -> Result<Self, anyhow::Error> {
        let proj_dirs = ProjectDirs::from("", "", "hempverse")
            .ok_or_else(|| anyhow::anyhow!("Failed to resolve config directory"))?;
        Self::new_in_dir(proj_dirs.config_dir().join("architect"))
    }

    pub fn new_in_dir(dir: PathBuf) -> Result<Self, anyhow::Error> {
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    /// Ok(None) when no snapshot has been written yet.
    pub fn load(&self) -> Result<Option<LoadedSnapshot>, anyhow::Error> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }
        let contents = fs::read_to_string(&path)?;
        Ok(Some(parse_snapshot(&contents)?))
    }

    pub fn save(&self, state: &ArchitectState) -> Result<(), anyhow::Error> {
        let out = SnapshotOut {
            config: &state.config,
            nodes: &state.nodes,
            saved_at: Utc::now(),
        };
        let contents = serde_json::to_string_pretty(&out)?;
        // Write-then-rename so a crash never leaves a truncated snapshot.
        let tmp = self.dir.join(format!("{}.tmp", SNAPSHOT_FILE));
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, self.path())?;
        Ok(())
    }
}

pub fn parse_snapshot(contents: &str) -> Result<LoadedSnapshot, anyhow::Error> {
    let raw: SnapshotIn = serde_json::from_str(contents)?;
    Ok(LoadedSnapshot {
        state: ArchitectState {
            config: merge_config(&SystemConfig::default(), &raw.config),
            nodes: raw.nodes.unwrap_or_else(default_nodes),
        },
        saved_at: raw.saved_at,
    })
}
