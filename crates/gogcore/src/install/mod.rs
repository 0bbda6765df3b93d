//! Installer extraction pipeline.
//!
//! Linux installers carry the game files under `data/noarch/` of their zip
//! payload. Installing means:
//! 1. extract that subtree into a fresh staging folder inside the target
//! 2. move every staged file into place, replacing existing files
//! 3. drop the staging folder
//! 4. append the archive's entry list to `files.txt` for later uninstall

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::catalog::Platform;
use crate::error::{GogError, IoResultExt, Result};
use crate::external::ArchiveTool;

/// Subtree of the installer archive holding the game files.
pub const PAYLOAD_SUBTREE: &str = "data/noarch";

/// Manifest written at the install root.
pub const MANIFEST_FILE: &str = "files.txt";

const STAGING_PREFIX: &str = ".gogtool-staging-";

/// Progress of a single install.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallState {
    NotInstalled,
    Extracting,
    Merging,
    Installed,
    Failed,
}

/// Result of a finished install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOutcome {
    pub path: PathBuf,
    pub files_merged: usize,
    pub manifest_entries: usize,
}

/// Runs one installer archive into an install folder.
pub struct InstallExecutor<'a> {
    tool: &'a dyn ArchiveTool,
    state: InstallState,
}

impl<'a> InstallExecutor<'a> {
    pub fn new(tool: &'a dyn ArchiveTool) -> Self {
        Self {
            tool,
            state: InstallState::NotInstalled,
        }
    }

    pub fn state(&self) -> InstallState {
        self.state
    }

    /// Install `archive` (an installer of `id` for `platform`) into `dest`.
    ///
    /// On failure a `dest` created by this call, or left empty, is removed
    /// so a later scan does not take it for an installation.
    pub fn install(
        &mut self,
        id: &str,
        platform: Platform,
        archive: &Path,
        dest: &Path,
    ) -> Result<InstallOutcome> {
        let created = !dest.exists();
        let result = self.run(id, platform, archive, dest);
        if let Err(e) = &result {
            tracing::error!(title = %id, error = %e, "install failed");
            self.state = InstallState::Failed;
            discard_dest(dest, created);
        }
        result
    }

    fn run(&mut self, id: &str, platform: Platform, archive: &Path, dest: &Path) -> Result<InstallOutcome> {
        if platform != Platform::Linux {
            return Err(GogError::UnsupportedPlatform {
                id: id.to_string(),
                platform,
            });
        }
        if !archive.is_file() {
            return Err(GogError::MissingInstaller { id: id.to_string() });
        }

        std::fs::create_dir_all(dest).at(dest)?;
        let staging = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempdir_in(dest)
            .map_err(|source| GogError::Staging {
                path: dest.to_path_buf(),
                source,
            })?;

        self.state = InstallState::Extracting;
        tracing::info!(title = %id, archive = %archive.display(), "extracting installer");
        // A failing extractor is not fatal by itself; an empty payload is.
        self.tool.extract(archive, staging.path(), PAYLOAD_SUBTREE)?;

        let payload = staging.path().join(PAYLOAD_SUBTREE);
        if !has_files(&payload) {
            return Err(GogError::EmptyPayload {
                archive: archive.to_path_buf(),
                subtree: PAYLOAD_SUBTREE,
            });
        }

        self.state = InstallState::Merging;
        let files_merged = merge_dir(&payload, dest)?;
        let staging_path = staging.path().to_path_buf();
        staging.close().at(&staging_path)?;

        let entries = self.tool.list(archive, PAYLOAD_SUBTREE)?;
        let manifest = dest.join(MANIFEST_FILE);
        append_manifest(&manifest, &entries)?;

        self.state = InstallState::Installed;
        tracing::info!(
            title = %id,
            path = %dest.display(),
            files_merged,
            "installed"
        );
        Ok(InstallOutcome {
            path: dest.to_path_buf(),
            files_merged,
            manifest_entries: entries.len(),
        })
    }
}

/// Move every file below `src` to the same relative path below `dest`.
///
/// Existing destination files are deleted first, never merged by content.
/// Missing destination directories are created.
pub fn merge_dir(src: &Path, dest: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in walkdir::WalkDir::new(src).min_depth(1) {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(src).to_path_buf();
            GogError::io(path, std::io::Error::other(e.to_string()))
        })?;
        let rel = entry.path().strip_prefix(src).unwrap_or(entry.path());
        let target = dest.join(rel);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target).at(&target)?;
            continue;
        }

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).at(parent)?;
        }
        if std::fs::symlink_metadata(&target).is_ok() {
            std::fs::remove_file(&target).at(&target)?;
        }
        std::fs::rename(entry.path(), &target).at(&target)?;
        count += 1;
    }
    Ok(count)
}

fn append_manifest(manifest: &Path, entries: &[String]) -> Result<()> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(manifest)
        .at(manifest)?;
    for entry in entries {
        writeln!(file, "{entry}").at(manifest)?;
    }
    Ok(())
}

fn discard_dest(dest: &Path, created: bool) {
    let removed = if created {
        std::fs::remove_dir_all(dest)
    } else if is_empty_dir(dest) {
        std::fs::remove_dir(dest)
    } else {
        return;
    };
    match removed {
        Ok(()) => tracing::debug!(path = %dest.display(), "removed install folder of failed install"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %dest.display(), error = %e, "failed to remove install folder"),
    }
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}

fn has_files(dir: &Path) -> bool {
    walkdir::WalkDir::new(dir)
        .into_iter()
        .filter_map(|e| e.ok())
        .any(|e| !e.file_type().is_dir())
}
