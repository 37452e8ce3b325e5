//! Discovery Module for the SVGO loader
//!
//! Recursively scans asset roots for icon files and builds an immutable
//! key → entry snapshot.

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::options::AssetRoot;

// ═══════════════════════════════════════════════════════════════════════════════
// METADATA TYPES
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetEntry {
    /// File stem, e.g. `home` for `icons/home.svg`.
    pub name: String,
    pub prefix: String,
    /// Absolute path of the asset file.
    pub source_path: PathBuf,
    /// Path relative to the root it was found under, `/`-separated.
    pub relative_path: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub modified_ms: u64,
}

impl AssetEntry {
    /// `prefix:name`, or just `name` for roots without a prefix.
    pub fn key(&self) -> String {
        asset_key(&self.prefix, &self.name)
    }

    /// File name with extension.
    pub fn file_name(&self) -> String {
        self.source_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.name.clone())
    }

    pub fn info(&self) -> AssetInfo {
        AssetInfo {
            path: self.relative_path.clone(),
            file_path: self.source_path.to_string_lossy().into_owned(),
            name: self.file_name(),
            size: self.size,
            modified_time: self.modified_ms,
        }
    }
}

pub fn asset_key(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{}:{}", prefix, name)
    }
}

/// Listing row sent to devtools observers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetInfo {
    pub path: String,
    pub file_path: String,
    pub name: String,
    pub size: u64,
    pub modified_time: u64,
}

/// Immutable result of one scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: IndexMap<String, AssetEntry>,
}

impl Snapshot {
    pub fn from_entries(entries: impl IntoIterator<Item = AssetEntry>) -> Self {
        let mut map = IndexMap::new();
        for entry in entries {
            // later entries win
            map.insert(entry.key(), entry);
        }
        Self { entries: map }
    }

    pub fn get(&self, key: &str) -> Option<&AssetEntry> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &AssetEntry)> {
        self.entries.iter()
    }

    pub fn infos(&self) -> Vec<AssetInfo> {
        self.entries.values().map(AssetEntry::info).collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCANNING
// ═══════════════════════════════════════════════════════════════════════════════

/// Scans every root in order. Unreadable entries are skipped, never fatal.
pub fn scan(roots: &[AssetRoot], extension: &str, ignore_dirs: &[String]) -> Snapshot {
    let mut entries = Vec::new();
    for root in roots {
        let found = scan_root(root, extension, ignore_dirs);
        debug!(root = %root.dir.display(), prefix = %root.prefix, count = found.len(), "scanned asset root");
        entries.extend(found);
    }
    Snapshot::from_entries(entries)
}

fn scan_root(root: &AssetRoot, extension: &str, ignore_dirs: &[String]) -> Vec<AssetEntry> {
    if !root.dir.exists() {
        debug!(root = %root.dir.display(), "asset root does not exist");
        return Vec::new();
    }

    let files = find_asset_files(&root.dir, extension, ignore_dirs);

    files
        .par_iter()
        .filter_map(|path| match read_entry(root, path) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "skipping unreadable asset");
                None
            }
        })
        .collect()
}

/// Recursively find all asset files in a directory
fn find_asset_files(dir: &Path, extension: &str, ignore_dirs: &[String]) -> Vec<PathBuf> {
    let mut files = Vec::new();

    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_ignored_dir(e, ignore_dirs));

    for entry in walker {
        match entry {
            Ok(entry) => {
                let path = entry.path();
                if entry.file_type().is_file()
                    && path
                        .extension()
                        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension))
                {
                    files.push(path.to_path_buf());
                }
            }
            Err(e) => {
                warn!(root = %dir.display(), error = %e, "skipping unreadable directory entry");
            }
        }
    }

    files
}

fn is_ignored_dir(entry: &DirEntry, ignore_dirs: &[String]) -> bool {
    entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| ignore_dirs.iter().any(|d| d == name))
}

fn read_entry(root: &AssetRoot, path: &Path) -> std::io::Result<AssetEntry> {
    let metadata = fs::metadata(path)?;
    let modified_ms = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let relative_path = path
        .strip_prefix(&root.dir)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/");

    let source_path = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());

    Ok(AssetEntry {
        name,
        prefix: root.prefix.clone(),
        source_path,
        relative_path,
        size: metadata.len(),
        modified_ms,
    })
}
