//! Download directory scanning.
//!
//! The downloader stores each title under `<root>/<gamename>/` and its DLC
//! under `<root>/<gamename>/dlc/<dlcname>/`. Files in a title folder are
//! split into:
//! - **current**: the name equals a declared installer basename
//! - **stale**: the name starts with one of the title's guessed prefixes but
//!   is not declared (an older installer version)
//!
//! Anything else is left alone so unrelated user files are never deleted.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogEntry, CatalogSnapshot};
use crate::error::{IoResultExt, Result};
use crate::names;

/// Subfolder of a title folder holding DLC downloads.
pub const DLC_SUBDIR: &str = "dlc";

/// Installer files of one title found on disk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalFileSet {
    /// Folder the files live in
    pub folder: PathBuf,
    /// Files matching a declared installer
    pub current: BTreeSet<String>,
    /// Prefix-matched files that are not declared
    pub stale: BTreeSet<String>,
}

impl LocalFileSet {
    /// A folder exists but holds no recognized installer.
    pub fn is_empty(&self) -> bool {
        self.current.is_empty() && self.stale.is_empty()
    }

    /// No declared file is present while older ones are.
    pub fn needs_update(&self) -> bool {
        self.current.is_empty() && !self.stale.is_empty()
    }

    pub fn current_paths(&self) -> Vec<PathBuf> {
        self.current.iter().map(|f| self.folder.join(f)).collect()
    }

    pub fn stale_paths(&self) -> Vec<PathBuf> {
        self.stale.iter().map(|f| self.folder.join(f)).collect()
    }
}

/// Scan the download root for every catalog entry.
///
/// Only immediate subdirectories named exactly like a base identifier are
/// considered. DLC folders are looked up below their parent's folder.
pub fn scan_downloads(
    root: &Path,
    catalog: &CatalogSnapshot,
) -> Result<BTreeMap<String, LocalFileSet>> {
    let mut found = BTreeMap::new();

    for entry in std::fs::read_dir(root).at(root)? {
        let entry = entry.at(root)?;
        if !entry.file_type().at(&entry.path())?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(game) = catalog.lookup(name) else {
            continue;
        };
        if game.parent.is_some() {
            continue;
        }

        let folder = entry.path();
        let files = scan_title_folder(&folder, game)?;
        tracing::debug!(
            title = %game.id,
            current = files.current.len(),
            stale = files.stale.len(),
            "scanned download folder"
        );
        found.insert(game.id.clone(), files);

        for dlc in catalog.dlcs_of(&game.id) {
            let dlc_folder = folder.join(DLC_SUBDIR).join(&dlc.id);
            if dlc_folder.is_dir() {
                found.insert(dlc.id.clone(), scan_title_folder(&dlc_folder, dlc)?);
            }
        }
    }

    tracing::info!(downloaded = found.len(), "scanned download directory");
    Ok(found)
}

/// Partition the files of a single title folder.
pub fn scan_title_folder(folder: &Path, entry: &CatalogEntry) -> Result<LocalFileSet> {
    let declared = entry
        .resolve_platform()
        .map(|p| entry.declared_file_names(p))
        .unwrap_or_default();
    let prefixes = names::guess_folder_prefixes(&entry.id);

    let mut files = LocalFileSet {
        folder: folder.to_path_buf(),
        ..Default::default()
    };

    for item in std::fs::read_dir(folder).at(folder)? {
        let item = item.at(folder)?;
        if !item.file_type().at(&item.path())?.is_file() {
            continue;
        }
        let Ok(name) = item.file_name().into_string() else {
            continue;
        };

        if declared.contains(&name) {
            files.current.insert(name);
        } else if names::is_prefix_matched(&name, &prefixes) {
            files.stale.insert(name);
        }
    }

    Ok(files)
}

/// Delete every stale file of a title.
///
/// Deleted (or already missing) files leave the set, so a second call is a
/// no-op. Files that cannot be removed stay in the set and are logged.
pub fn delete_stale(files: &mut LocalFileSet) -> usize {
    let names: Vec<String> = files.stale.iter().cloned().collect();
    let mut deleted = 0;
    for name in names {
        if remove_setup_file(&files.folder.join(&name)) {
            files.stale.remove(&name);
            deleted += 1;
        }
    }
    deleted
}

/// Delete current and stale files of a title.
pub fn delete_all(files: &mut LocalFileSet) -> usize {
    let mut deleted = delete_stale(files);
    let names: Vec<String> = files.current.iter().cloned().collect();
    for name in names {
        if remove_setup_file(&files.folder.join(&name)) {
            files.current.remove(&name);
            deleted += 1;
        }
    }
    deleted
}

fn remove_setup_file(path: &Path) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(path = %path.display(), "deleted setup file");
            true
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "setup file already gone");
            true
        }
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete setup file");
            false
        }
    }
}

/// Size in bytes of a file, 0 if it cannot be read.
pub fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}

/// Format a file size for display (e.g. "1.5 MB", "320 KB").
pub fn format_size(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.0} KB", bytes as f64 / 1024.0)
    } else {
        format!("{} B", bytes)
    }
}
