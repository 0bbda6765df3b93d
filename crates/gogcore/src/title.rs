//! Per-title lifecycle record.
//!
//! Records are rebuilt from the catalog and the two scans at the start of
//! every run. Derived flags are only updated through [`TitleRecord::recompute`],
//! which the reconciler calls after each scan or transition.

use std::fmt;

use crate::catalog::{CatalogEntry, EntryKind, Platform};
use crate::download::LocalFileSet;
use crate::installdir::InstallRecord;

/// Where a title stands relative to the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TitleState {
    Absent,
    DownloadedCurrent,
    DownloadedStale,
    Installed,
    InstalledStale,
}

impl fmt::Display for TitleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TitleState::Absent => "absent",
            TitleState::DownloadedCurrent => "downloaded",
            TitleState::DownloadedStale => "downloaded (outdated)",
            TitleState::Installed => "installed",
            TitleState::InstalledStale => "installed (outdated)",
        })
    }
}

#[derive(Debug, Clone)]
pub struct TitleRecord {
    pub entry: CatalogEntry,
    /// Linux, else Windows, else Mac; `None` for bonus-only entries
    pub platform: Option<Platform>,
    /// `None` when no download folder exists
    pub files: Option<LocalFileSet>,
    /// `None` when no install folder was matched
    pub install: Option<InstallRecord>,
    /// The operator wants this title acted on in the current run
    pub selected: bool,
    /// The operator has already answered for this title
    pub decided: bool,
    is_downloaded: bool,
    needs_update: bool,
    is_installed: bool,
}

impl TitleRecord {
    pub fn new(entry: CatalogEntry) -> Self {
        let platform = entry.resolve_platform();
        Self {
            entry,
            platform,
            files: None,
            install: None,
            selected: false,
            decided: false,
            is_downloaded: false,
            needs_update: false,
            is_installed: false,
        }
    }

    pub fn id(&self) -> &str {
        &self.entry.id
    }

    pub fn title(&self) -> &str {
        &self.entry.title
    }

    pub fn is_dlc(&self) -> bool {
        self.entry.kind != EntryKind::Base
    }

    pub fn parent(&self) -> Option<&str> {
        self.entry.parent.as_deref()
    }

    /// Re-derive flags from the current file set and install record.
    ///
    /// DLC has no install folder of its own; its install state is the
    /// parent's, passed in as `parent_installed`.
    pub fn recompute(&mut self, parent_installed: Option<bool>) {
        let files = self.files.as_ref();
        self.is_downloaded = files.is_some_and(|f| !f.is_empty());
        self.needs_update = files.is_some_and(LocalFileSet::needs_update);
        self.is_installed = match parent_installed {
            Some(installed) if self.is_dlc() => installed,
            _ => self.install.is_some(),
        };
        if !self.decided {
            self.selected = self.needs_update && self.platform.is_some();
        }
    }

    pub fn is_downloaded(&self) -> bool {
        self.is_downloaded
    }

    /// No declared installer present while older ones are.
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn is_installed(&self) -> bool {
        self.is_installed
    }

    /// The download folder exists but holds no recognized installer.
    pub fn has_empty_folder(&self) -> bool {
        self.files.as_ref().is_some_and(LocalFileSet::is_empty)
    }

    pub fn state(&self) -> TitleState {
        match (self.is_installed, self.is_downloaded, self.needs_update) {
            (true, _, true) => TitleState::InstalledStale,
            (true, _, false) => TitleState::Installed,
            (false, true, true) => TitleState::DownloadedStale,
            (false, true, false) => TitleState::DownloadedCurrent,
            (false, false, _) => TitleState::Absent,
        }
    }

    /// Record the operator's answer so they are not asked again.
    pub fn decide(&mut self, selected: bool) {
        self.selected = selected;
        self.decided = true;
    }
}

impl fmt::Display for TitleRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.entry.id)
    }
}
