//! Session orchestration.
//!
//! The [`Reconciler`] owns the catalog snapshot and one [`TitleRecord`] per
//! catalog entry. It is rebuilt from disk on every run; after each
//! transition the affected folders are rescanned and all derived flags are
//! recomputed, so the records never drift from what is on disk.
//!
//! Per-title failures are logged and reported; only a bad snapshot or a
//! missing root directory aborts the run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogSnapshot, Platform};
use crate::download;
use crate::error::{GogError, Result};
use crate::external::{ArchiveTool, Downloader};
use crate::install::{InstallExecutor, InstallOutcome};
use crate::installdir::{self, UninstallOutcome, Uninstaller};
use crate::process;
use crate::prompt::Confirm;
use crate::title::{TitleRecord, TitleState};

/// Script GOG installers place at the install root to start the game.
pub const START_SCRIPT: &str = "start.sh";

/// The three locations a session works on.
#[derive(Debug, Clone)]
pub struct RootPaths {
    /// Catalog snapshot file
    pub catalog: PathBuf,
    /// Download root, one folder per identifier
    pub downloads: PathBuf,
    /// Installation root
    pub installs: PathBuf,
}

/// Outcome of a batch operation.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, GogError)>,
    /// Installed titles reinstalled from their new installer
    pub reinstalled: Vec<String>,
    /// Setup files deleted afterwards
    pub deleted: usize,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Library counts for `--info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub catalog: usize,
    pub downloaded: usize,
    pub installed: usize,
    pub outdated: usize,
}

pub struct Reconciler {
    paths: RootPaths,
    snapshot: CatalogSnapshot,
    records: BTreeMap<String, TitleRecord>,
    downloader: Box<dyn Downloader>,
    archive_tool: Box<dyn ArchiveTool>,
    prompt: Box<dyn Confirm>,
    include_empty: bool,
}

impl Reconciler {
    /// Check both roots, load the snapshot and scan.
    pub fn new(
        paths: RootPaths,
        downloader: Box<dyn Downloader>,
        archive_tool: Box<dyn ArchiveTool>,
        prompt: Box<dyn Confirm>,
    ) -> Result<Self> {
        check_root(&paths.downloads, "download directory")?;
        check_root(&paths.installs, "installation directory")?;
        let snapshot = CatalogSnapshot::load(&paths.catalog)?;

        let mut reconciler = Self {
            paths,
            snapshot,
            records: BTreeMap::new(),
            downloader,
            archive_tool,
            prompt,
            include_empty: false,
        };
        reconciler.rescan()?;
        Ok(reconciler)
    }

    /// Offer a download for titles whose folder exists but is empty.
    pub fn with_include_empty(mut self, include_empty: bool) -> Self {
        self.include_empty = include_empty;
        self
    }

    pub fn paths(&self) -> &RootPaths {
        &self.paths
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.snapshot
    }

    /// Rebuild every record from the catalog and both directory scans.
    pub fn rescan(&mut self) -> Result<()> {
        let downloads = download::scan_downloads(&self.paths.downloads, &self.snapshot)?;
        let installs = installdir::scan_installs(&self.paths.installs, &self.snapshot)?;

        self.records = self
            .snapshot
            .entries()
            .map(|e| (e.id.clone(), TitleRecord::new(e.clone())))
            .collect();
        for (id, files) in downloads {
            if let Some(record) = self.records.get_mut(&id) {
                record.files = Some(files);
            }
        }
        for (id, install) in installs {
            if let Some(record) = self.records.get_mut(&id) {
                record.install = Some(install);
            }
        }
        self.recompute_all();
        Ok(())
    }

    /// Run the refresh command when the snapshot is stale (or `force`), then
    /// reload it and rescan. Returns whether a refresh happened.
    pub fn refresh_if_stale(&mut self, force: bool) -> Result<bool> {
        if !force && !self.snapshot.is_stale() {
            return Ok(false);
        }
        self.downloader.refresh()?;
        self.snapshot = CatalogSnapshot::load(&self.paths.catalog)?;
        self.rescan()?;
        Ok(true)
    }

    fn recompute_all(&mut self) {
        let base_installed: HashMap<String, bool> = self
            .records
            .values()
            .filter(|r| !r.is_dlc())
            .map(|r| (r.id().to_string(), r.install.is_some()))
            .collect();
        for record in self.records.values_mut() {
            let parent_installed = record.parent().and_then(|p| base_installed.get(p).copied());
            record.recompute(parent_installed);
        }
    }

    /// Rescan the download folder of a base title and its DLC.
    fn rescan_downloads_of(&mut self, id: &str) -> Result<()> {
        let Some(entry) = self.snapshot.lookup(id) else {
            return Err(GogError::UnknownTitle(id.to_string()));
        };
        let folder = self.paths.downloads.join(&entry.id);
        let files = if folder.is_dir() {
            Some(download::scan_title_folder(&folder, entry)?)
        } else {
            None
        };
        if let Some(record) = self.records.get_mut(id) {
            record.files = files;
        }

        for dlc in self.snapshot.dlcs_of(id) {
            let dlc_folder = folder.join(download::DLC_SUBDIR).join(&dlc.id);
            let files = if dlc_folder.is_dir() {
                Some(download::scan_title_folder(&dlc_folder, dlc)?)
            } else {
                None
            };
            if let Some(record) = self.records.get_mut(&dlc.id) {
                record.files = files;
            }
        }

        self.recompute_all();
        Ok(())
    }

    pub fn record(&self, id: &str) -> Option<&TitleRecord> {
        self.records.get(id)
    }

    fn get(&self, id: &str) -> Result<&TitleRecord> {
        self.records
            .get(id)
            .ok_or_else(|| GogError::UnknownTitle(id.to_string()))
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut TitleRecord> {
        self.records
            .get_mut(id)
            .ok_or_else(|| GogError::UnknownTitle(id.to_string()))
    }

    /// All records, ordered by identifier.
    pub fn records(&self) -> impl Iterator<Item = &TitleRecord> {
        self.records.values()
    }

    pub fn downloaded(&self) -> Vec<&TitleRecord> {
        self.records().filter(|r| r.is_downloaded()).collect()
    }

    /// Installed base titles (DLC shares its parent's installation).
    pub fn installed(&self) -> Vec<&TitleRecord> {
        self.records()
            .filter(|r| !r.is_dlc() && r.is_installed())
            .collect()
    }

    /// Titles whose downloaded installers are all outdated.
    pub fn outdated(&self) -> Vec<&TitleRecord> {
        self.records().filter(|r| r.needs_update()).collect()
    }

    /// Installed titles whose installers are outdated.
    pub fn reinstall_queue(&self) -> Vec<&TitleRecord> {
        self.records()
            .filter(|r| !r.is_dlc() && r.state() == TitleState::InstalledStale)
            .collect()
    }

    /// Every stale setup file across all downloaded titles.
    pub fn orphans(&self) -> Vec<PathBuf> {
        self.records()
            .filter_map(|r| r.files.as_ref())
            .flat_map(download::LocalFileSet::stale_paths)
            .collect()
    }

    pub fn summary(&self) -> Summary {
        let base = || self.records().filter(|r| !r.is_dlc());
        Summary {
            catalog: self.snapshot.len(),
            downloaded: base().filter(|r| r.is_downloaded()).count(),
            installed: base().filter(|r| r.is_installed()).count(),
            outdated: base().filter(|r| r.needs_update()).count(),
        }
    }

    /// Recompute update flags; with `include_empty`, ask once per empty
    /// download folder whether to fetch the latest installer.
    pub fn check_for_updates(&mut self) {
        self.recompute_all();

        if self.include_empty {
            let empty: Vec<String> = self
                .records()
                .filter(|r| r.has_empty_folder() && !r.decided && r.platform.is_some())
                .map(|r| r.id().to_string())
                .collect();
            for id in empty {
                let answer = self
                    .prompt
                    .confirm(&format!("Folder for {id} is empty. Download latest installer?"));
                if let Some(record) = self.records.get_mut(&id) {
                    record.decide(answer);
                }
            }
        }

        tracing::info!(outdated = self.outdated().len(), "checked for updates");
    }

    /// Download new installers for every outdated (or opted-in empty) title.
    ///
    /// Unless `download_all`, each outdated title is confirmed once. Installed
    /// linux titles whose new installer arrived are then reinstalled in place,
    /// after a confirmation unless `download_all`. One decision (flag or
    /// prompt) covers deleting the old files of every title that was updated.
    pub fn update_games(&mut self, download_all: bool, delete_by_default: bool) -> BatchReport {
        self.check_for_updates();

        if !download_all {
            let undecided: Vec<String> = self
                .records()
                .filter(|r| r.needs_update() && !r.decided && r.platform.is_some())
                .map(|r| r.id().to_string())
                .collect();
            for id in undecided {
                let answer = self.prompt.confirm(&format!("Re-download file(s) for {id}?"));
                if let Some(record) = self.records.get_mut(&id) {
                    record.decide(answer);
                }
            }
        }

        let queue: Vec<String> = self
            .records()
            .filter(|r| r.selected)
            .map(|r| r.id().to_string())
            .collect();
        let reinstall: BTreeSet<String> = self
            .reinstall_queue()
            .into_iter()
            .filter(|r| r.platform == Some(Platform::Linux))
            .map(|r| r.id().to_string())
            .collect();

        let mut report = BatchReport::default();
        let mut fetched: BTreeSet<String> = BTreeSet::new();
        for id in queue {
            let target = self
                .records
                .get(&id)
                .and_then(|r| r.parent())
                .unwrap_or(id.as_str())
                .to_string();
            // DLC shares its parent's download run
            let result = if fetched.insert(target) {
                self.fetch(&id)
            } else {
                self.ensure_current(&id)
            };
            match result {
                Ok(()) => report.succeeded.push(id),
                Err(e) => {
                    tracing::error!(title = %id, error = %e, "update failed");
                    report.failed.push((id, e));
                }
            }
        }

        let updated_installs: Vec<String> = report
            .succeeded
            .iter()
            .filter(|id| reinstall.contains(*id))
            .cloned()
            .collect();
        for id in updated_installs {
            let prompt = format!("Installation of {id} is outdated. Update?");
            if !download_all && !self.prompt.confirm(&prompt) {
                continue;
            }
            match self.reinstall(&id) {
                Ok(_) => report.reinstalled.push(id),
                Err(e) => {
                    tracing::error!(title = %id, error = %e, "reinstall failed");
                    report.failed.push((id, e));
                }
            }
        }

        let has_stale = report.succeeded.iter().any(|id| {
            self.records
                .get(id)
                .and_then(|r| r.files.as_ref())
                .is_some_and(|f| !f.stale.is_empty())
        });
        if has_stale && (delete_by_default || self.prompt.confirm("Delete old setup files?")) {
            for id in &report.succeeded {
                match self.delete_stale(id) {
                    Ok(n) => report.deleted += n,
                    Err(e) => tracing::warn!(title = %id, error = %e, "failed to delete old files"),
                }
            }
        }

        report
    }

    /// Run the downloader for a title (through its parent for DLC) and
    /// rescan the affected folders. Fails unless a declared installer of
    /// the title is on disk afterwards.
    fn fetch(&mut self, id: &str) -> Result<()> {
        let record = self.get(id)?;
        let target = record.parent().unwrap_or(id).to_string();
        let platform = self
            .get(&target)?
            .platform
            .ok_or_else(|| GogError::MissingInstaller { id: id.to_string() })?;

        let outcome = self
            .downloader
            .download(&self.paths.downloads, platform, &target)?;
        self.rescan_downloads_of(&target)?;
        if let Err(e) = self.ensure_current(id) {
            tracing::warn!(title = %id, code = ?outcome.code, "download left no current installer");
            return Err(e);
        }
        Ok(())
    }

    fn ensure_current(&self, id: &str) -> Result<()> {
        let present = self
            .get(id)?
            .files
            .as_ref()
            .is_some_and(|f| !f.current.is_empty());
        if present {
            Ok(())
        } else {
            Err(GogError::MissingInstaller { id: id.to_string() })
        }
    }

    /// Delete the stale setup files of one title. A second call is a no-op.
    pub fn delete_stale(&mut self, id: &str) -> Result<usize> {
        let record = self.get_mut(id)?;
        let deleted = record.files.as_mut().map(download::delete_stale).unwrap_or(0);
        self.recompute_all();
        Ok(deleted)
    }

    /// Delete the stale files of every downloaded title, after one
    /// confirmation unless `delete_by_default`.
    pub fn clean_orphans(&mut self, delete_by_default: bool) -> Result<usize> {
        let orphans = self.orphans();
        if orphans.is_empty() {
            tracing::info!("no orphaned setup files");
            return Ok(0);
        }
        for path in &orphans {
            tracing::info!(path = %path.display(), "orphaned setup file");
        }
        if !delete_by_default && !self.prompt.confirm("Delete orphaned files?") {
            return Ok(0);
        }

        let ids: Vec<String> = self
            .records()
            .filter(|r| r.files.is_some())
            .map(|r| r.id().to_string())
            .collect();
        let mut deleted = 0;
        for id in ids {
            deleted += self.delete_stale(&id)?;
        }
        Ok(deleted)
    }

    /// Download the current installers of a title unless already present.
    pub fn download(&mut self, id: &str, delete_old: bool) -> Result<()> {
        let record = self.get(id)?;
        if record.is_downloaded() && !record.needs_update() {
            tracing::info!(title = %id, "setup files are up to date");
        } else {
            self.fetch(id)?;
        }
        if delete_old {
            self.delete_stale(id)?;
        }
        Ok(())
    }

    /// Install a title, downloading it first if needed.
    ///
    /// Installs into the existing install folder, else `<installs>/<id>`.
    /// Downloaded DLC is installed into the same folder afterwards. Returns
    /// `None` when nothing was done (already current, or update declined).
    pub fn install(&mut self, id: &str) -> Result<Option<InstallOutcome>> {
        let record = self.get(id)?;
        if let Some(parent) = record.parent() {
            let parent = parent.to_string();
            let dest = self
                .records
                .get(&parent)
                .and_then(|p| p.install.as_ref())
                .map(|i| i.path.clone())
                .ok_or_else(|| GogError::DependentTitle {
                    id: id.to_string(),
                    parent: parent.clone(),
                })?;
            let outcome = self.install_archive(id, &dest)?;
            self.reread_install(&parent, &dest)?;
            return Ok(Some(outcome));
        }

        let platform = record
            .platform
            .ok_or_else(|| GogError::MissingInstaller { id: id.to_string() })?;
        if platform != Platform::Linux {
            return Err(GogError::UnsupportedPlatform {
                id: id.to_string(),
                platform,
            });
        }

        match record.state() {
            TitleState::Installed => {
                tracing::info!(title = %id, "latest version is already installed");
                return Ok(None);
            }
            TitleState::InstalledStale => {
                let prompt = format!("Installation of {id} is outdated. Update?");
                if !self.prompt.confirm(&prompt) {
                    return Ok(None);
                }
            }
            _ => {}
        }

        let record = self.get(id)?;
        if !record.is_downloaded() || record.needs_update() {
            self.fetch(id)?;
        }

        let dest = self
            .get(id)?
            .install
            .as_ref()
            .map(|i| i.path.clone())
            .unwrap_or_else(|| self.paths.installs.join(id));
        self.install_into(id, &dest).map(Some)
    }

    /// Install the current installer of an installed title over its folder.
    fn reinstall(&mut self, id: &str) -> Result<InstallOutcome> {
        let dest = self.install_path(id)?.to_path_buf();
        self.install_into(id, &dest)
    }

    /// Install a base title into `dest`, then every downloaded DLC.
    fn install_into(&mut self, id: &str, dest: &Path) -> Result<InstallOutcome> {
        let dlcs: Vec<String> = self.get(id)?.entry.children.clone();
        let outcome = self.install_archive(id, dest)?;
        for dlc in dlcs {
            let ready = self
                .records
                .get(&dlc)
                .is_some_and(|r| r.is_downloaded() && !r.needs_update());
            if !ready {
                continue;
            }
            match self.install_archive(&dlc, dest) {
                Ok(_) => {}
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(title = %dlc, error = %e, "failed to install DLC"),
            }
        }
        self.reread_install(id, dest)?;
        Ok(outcome)
    }

    fn install_archive(&self, id: &str, dest: &Path) -> Result<InstallOutcome> {
        let record = self.get(id)?;
        let missing = || GogError::MissingInstaller { id: id.to_string() };
        let platform = record.platform.ok_or_else(missing)?;
        let files = record.files.as_ref().ok_or_else(missing)?;
        let archive = record
            .entry
            .installers_for(platform)
            .iter()
            .find(|i| files.current.contains(&i.file_name))
            .map(|i| files.folder.join(&i.file_name))
            .ok_or_else(missing)?;

        InstallExecutor::new(&*self.archive_tool).install(id, platform, &archive, dest)
    }

    fn reread_install(&mut self, id: &str, path: &Path) -> Result<()> {
        let install = installdir::read_install_record(path)?;
        self.get_mut(id)?.install = Some(install);
        self.recompute_all();
        Ok(())
    }

    /// Install folder of a title; DLC resolves to its parent's folder.
    pub fn install_path(&self, id: &str) -> Result<&Path> {
        let record = self.get(id)?;
        let owner = record.parent().unwrap_or(id);
        self.get(owner)?
            .install
            .as_ref()
            .map(|i| i.path.as_path())
            .ok_or_else(|| GogError::NotInstalled(id.to_string()))
    }

    /// Uninstall a title with its script, its manifest, or (after
    /// confirmation) by removing the whole folder.
    pub fn uninstall(&mut self, id: &str) -> Result<UninstallOutcome> {
        let record = self.get(id)?;
        if let Some(parent) = record.parent() {
            return Err(GogError::DependentTitle {
                id: id.to_string(),
                parent: parent.to_string(),
            });
        }
        let install = record
            .install
            .clone()
            .ok_or_else(|| GogError::NotInstalled(id.to_string()))?;

        let outcome = match &install.uninstaller {
            Uninstaller::Script(script) => {
                tracing::info!(title = %id, %script, "running uninstall script");
                let result = process::run(Path::new("sh"), &[script.as_str()], Some(&install.path))?;
                UninstallOutcome::Script { code: result.code }
            }
            Uninstaller::Manifest(files) => installdir::uninstall_from_manifest(&install.path, files)?,
            Uninstaller::Missing => {
                let prompt = format!(
                    "No list of installed files found. Remove entire folder {}?",
                    install.path.display()
                );
                if !self.prompt.confirm(&prompt) {
                    return Ok(UninstallOutcome::Declined);
                }
                installdir::remove_install_dir(&install.path)?
            }
        };

        self.get_mut(id)?.install = None;
        self.recompute_all();
        Ok(outcome)
    }

    /// Uninstall if installed, then delete every setup file of the title.
    pub fn remove(&mut self, id: &str) -> Result<usize> {
        let record = self.get(id)?;
        if !record.is_dlc() && record.install.is_some() {
            if let UninstallOutcome::Declined = self.uninstall(id)? {
                tracing::info!(title = %id, "kept install folder");
            }
        }
        let record = self.get_mut(id)?;
        let deleted = record.files.as_mut().map(download::delete_all).unwrap_or(0);
        self.recompute_all();
        Ok(deleted)
    }

    /// Run the installed game's start script and wait for it.
    pub fn launch(&self, id: &str) -> Result<Option<i32>> {
        let record = self.get(id)?;
        let install = record
            .install
            .as_ref()
            .ok_or_else(|| GogError::NotInstalled(id.to_string()))?;
        match record.platform {
            Some(Platform::Linux) => {}
            Some(platform) => {
                return Err(GogError::UnsupportedPlatform {
                    id: id.to_string(),
                    platform,
                })
            }
            None => return Err(GogError::MissingInstaller { id: id.to_string() }),
        }
        let script = install.path.join(START_SCRIPT);
        if !script.is_file() {
            return Err(GogError::io(
                script,
                std::io::Error::from(std::io::ErrorKind::NotFound),
            ));
        }
        tracing::info!(title = %id, "launching");
        Ok(process::run(&script, &[], Some(&install.path))?.code)
    }
}

fn check_root(path: &Path, what: &'static str) -> Result<()> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(GogError::PathNotFound {
            what,
            path: path.to_path_buf(),
        })
    }
}
