//! On-disk group database.
//!
//! One JSON document per group, keyed by group key, in a two-level layout:
//!   {root}/{hex[0..2]}/{hex}.json
//!
//! Writes are atomic (temp file, then rename). A missing file means the
//! group was never persisted; a file that cannot be read or parsed is an
//! error, so the caller can fail that one lookup instead of silently
//! starting the group over.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use cairn_core::OverlayKey;

use crate::searchgroup::Searchgroup;

#[derive(Debug, Clone)]
pub struct GroupStore {
    root: PathBuf,
}

impl GroupStore {
    /// Open (creating if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create group store: {}", root.display()))?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &PathBuf {
        &self.root
    }

    pub fn has(&self, key: &OverlayKey) -> bool {
        self.group_path(key).exists()
    }

    /// Read a group back. `Ok(None)` if it was never stored.
    pub fn load(&self, key: &OverlayKey) -> Result<Option<Searchgroup>> {
        let path = self.group_path(key);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read group: {}", path.display()))
            }
        };
        let mut group: Searchgroup = serde_json::from_str(&text)
            .with_context(|| format!("corrupt group record: {}", path.display()))?;
        if group.key() != key {
            bail!(
                "group record {} holds key {}, expected {}",
                path.display(),
                group.key(),
                key
            );
        }
        group.dedupe();
        Ok(Some(group))
    }

    pub fn save(&self, group: &Searchgroup) -> Result<()> {
        let path = self.group_path(group.key());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create store dir: {}", parent.display()))?;
        }

        let json = serde_json::to_vec(group).context("failed to serialize group")?;
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&tmp_path)
                .with_context(|| format!("failed to create temp file: {}", tmp_path.display()))?;
            file.write_all(&json).context("failed to write group record")?;
            file.sync_all().context("failed to sync group record")?;
        }
        fs::rename(&tmp_path, &path).with_context(|| {
            format!("failed to rename {} to {}", tmp_path.display(), path.display())
        })?;

        tracing::trace!(group = %group.key().short(), "group persisted");
        Ok(())
    }

    /// Delete one group. Absent groups are not an error.
    pub fn remove(&self, key: &OverlayKey) -> Result<()> {
        let path = self.group_path(key);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", path.display())),
        }
    }

    /// Erase every stored group.
    pub fn clear(&self) -> Result<()> {
        let entries = match fs::read_dir(&self.root) {
            Ok(e) => e,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to list {}", self.root.display()))
            }
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                fs::remove_dir_all(&path)
                    .with_context(|| format!("failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }

    /// Keys of every stored group. Files that do not name a key are skipped.
    pub fn keys(&self) -> Vec<OverlayKey> {
        let mut keys = Vec::new();
        let Ok(entries) = fs::read_dir(&self.root) else {
            return keys;
        };
        for entry in entries.flatten() {
            let Ok(subdir) = fs::read_dir(entry.path()) else {
                continue;
            };
            for file in subdir.flatten() {
                let path = file.path();
                if !path.extension().is_some_and(|ext| ext == "json") {
                    continue;
                }
                if let Some(key) = path
                    .file_stem()
                    .and_then(|stem| stem.to_str())
                    .and_then(|stem| stem.parse().ok())
                {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Number of stored groups.
    pub fn count(&self) -> usize {
        self.keys().len()
    }

    fn group_path(&self, key: &OverlayKey) -> PathBuf {
        let hex = key.to_hex();
        self.root.join(&hex[0..2]).join(format!("{hex}.json"))
    }
}
