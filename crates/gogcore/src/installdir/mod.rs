//! Installation directory scanning and uninstall.
//!
//! Install folders are named after the display title (as mangled by the GOG
//! installer) or, for titles installed by us, after the identifier. Inside a
//! matched folder we look for the installer's own `uninstall*.sh` script or
//! the `files.txt` manifest written by [`crate::install`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::catalog::{CatalogEntry, CatalogSnapshot};
use crate::error::{IoResultExt, Result};
use crate::install::{MANIFEST_FILE, PAYLOAD_SUBTREE};
use crate::names;
use crate::paths;

static UNINSTALL_SCRIPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^uninstall.*\.sh$").expect("valid regex"));

/// How an installation can be removed.
#[derive(Debug, Clone, PartialEq)]
pub enum Uninstaller {
    /// Script left by the GOG installer, file name relative to the install path
    Script(String),
    /// Absolute paths listed in `files.txt`
    Manifest(Vec<PathBuf>),
    /// Nothing found; only whole-folder removal is possible
    Missing,
}

/// A title found in the installation directory.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallRecord {
    pub path: PathBuf,
    pub uninstaller: Uninstaller,
}

/// What an uninstall actually did.
#[derive(Debug, Clone, PartialEq)]
pub enum UninstallOutcome {
    Script { code: Option<i32> },
    Manifest { files_removed: usize, dirs_removed: usize },
    Folder,
    Declined,
}

/// Scan the install root for every base title in the catalog.
pub fn scan_installs(
    root: &Path,
    catalog: &CatalogSnapshot,
) -> Result<BTreeMap<String, InstallRecord>> {
    // NFC name -> actual directory name
    let mut listing: HashMap<String, String> = HashMap::new();
    for entry in std::fs::read_dir(root).at(root)? {
        let entry = entry.at(root)?;
        if !entry.file_type().at(&entry.path())?.is_dir() {
            continue;
        }
        if let Ok(name) = entry.file_name().into_string() {
            listing.insert(paths::nfc(&name), name);
        }
    }

    let mut found = BTreeMap::new();
    let mut unmatched = 0usize;
    for game in catalog.base_entries() {
        let Some(dir_name) = find_install_dir(&listing, game) else {
            tracing::debug!(title = %game.id, display = %game.title, "no install folder matched");
            unmatched += 1;
            continue;
        };
        let path = root.join(dir_name);
        tracing::debug!(title = %game.id, path = %path.display(), "install folder matched");
        match read_install_record(&path) {
            Ok(record) => {
                found.insert(game.id.clone(), record);
            }
            Err(e) => {
                tracing::warn!(title = %game.id, error = %e, "skipping unreadable install folder");
                unmatched += 1;
            }
        }
    }

    tracing::info!(
        installed = found.len(),
        unmatched,
        "scanned installation directory"
    );
    Ok(found)
}

/// First candidate name present in `listing`: title guesses in order, then
/// the identifier.
fn find_install_dir<'a>(listing: &'a HashMap<String, String>, game: &CatalogEntry) -> Option<&'a str> {
    names::guess_install_dir_names(&game.title)
        .into_iter()
        .chain(std::iter::once(game.id.clone()))
        .find_map(|candidate| listing.get(&paths::nfc(&candidate)))
        .map(String::as_str)
}

/// Inspect an install folder for an uninstall script or manifest.
pub fn read_install_record(path: &Path) -> Result<InstallRecord> {
    let mut script = None;
    for entry in std::fs::read_dir(path).at(path)? {
        let entry = entry.at(path)?;
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        if UNINSTALL_SCRIPT.is_match(&name) && entry.path().is_file() {
            // Deterministic pick if several scripts exist
            if script.as_deref().map_or(true, |s| name.as_str() < s) {
                script = Some(name);
            }
        }
    }

    let uninstaller = if let Some(script) = script {
        tracing::debug!(path = %path.display(), %script, "uninstall script found");
        Uninstaller::Script(script)
    } else if path.join(MANIFEST_FILE).is_file() {
        Uninstaller::Manifest(read_manifest(path)?)
    } else {
        Uninstaller::Missing
    };

    Ok(InstallRecord {
        path: path.to_path_buf(),
        uninstaller,
    })
}

/// Read `files.txt` below `install_path`.
///
/// Each line is an archive entry name; the payload prefix is stripped and the
/// rest resolved against the install path. Blank lines, the payload root
/// itself and entries escaping the install path are skipped.
pub fn read_manifest(install_path: &Path) -> Result<Vec<PathBuf>> {
    let manifest = install_path.join(MANIFEST_FILE);
    let content = std::fs::read_to_string(&manifest).at(&manifest)?;
    let prefix = format!("{PAYLOAD_SUBTREE}/");

    let mut seen = BTreeSet::new();
    let mut files = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        let relative = line.strip_prefix(prefix.as_str()).unwrap_or(line);
        let relative = relative.trim_end_matches('/');
        if relative.is_empty() || relative == PAYLOAD_SUBTREE {
            continue;
        }
        match paths::join_normalized(install_path, relative) {
            Some(p) if p != install_path => {
                if seen.insert(p.clone()) {
                    files.push(p);
                }
            }
            _ => tracing::warn!(entry = %line, "ignoring manifest entry outside install path"),
        }
    }
    Ok(files)
}

/// Remove exactly the files listed in the manifest, then every directory
/// left empty by that (deepest first), the manifest itself and finally the
/// install folder if nothing else remains.
pub fn uninstall_from_manifest(install_path: &Path, listed: &[PathBuf]) -> Result<UninstallOutcome> {
    let mut files_removed = 0;
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();

    for path in listed {
        let Ok(meta) = std::fs::symlink_metadata(path) else {
            tracing::debug!(path = %path.display(), "listed file already gone");
            continue;
        };
        if meta.is_dir() {
            dirs.insert(path.clone());
            continue;
        }
        std::fs::remove_file(path).at(path)?;
        files_removed += 1;
        let mut parent = path.parent();
        while let Some(dir) = parent {
            if dir == install_path || !dir.starts_with(install_path) {
                break;
            }
            dirs.insert(dir.to_path_buf());
            parent = dir.parent();
        }
    }

    let mut ordered: Vec<PathBuf> = dirs.into_iter().collect();
    ordered.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
    let mut dirs_removed = 0;
    for dir in ordered {
        if is_empty_dir(&dir) {
            std::fs::remove_dir(&dir).at(&dir)?;
            dirs_removed += 1;
        }
    }

    let manifest = install_path.join(MANIFEST_FILE);
    if manifest.exists() {
        std::fs::remove_file(&manifest).at(&manifest)?;
    }
    if is_empty_dir(install_path) {
        std::fs::remove_dir(install_path).at(install_path)?;
        dirs_removed += 1;
    }

    tracing::info!(
        path = %install_path.display(),
        files_removed,
        dirs_removed,
        "uninstalled from manifest"
    );
    Ok(UninstallOutcome::Manifest {
        files_removed,
        dirs_removed,
    })
}

/// Remove the whole install folder.
pub fn remove_install_dir(install_path: &Path) -> Result<UninstallOutcome> {
    std::fs::remove_dir_all(install_path).at(install_path)?;
    tracing::info!(path = %install_path.display(), "removed install folder");
    Ok(UninstallOutcome::Folder)
}

fn is_empty_dir(dir: &Path) -> bool {
    std::fs::read_dir(dir).is_ok_and(|mut entries| entries.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = r#"{
        "date": "20240110T081500",
        "games": [
            { "gamename": "age_of_wonders_planetfall", "title": "Age of Wonders: Planetfall",
              "installers": [ { "path": "/x/setup_aow_pf.exe", "platform": 1 } ] },
            { "gamename": "tis100", "title": "TIS-100",
              "installers": [ { "path": "/x/tis_100_1.2.sh", "platform": 4 } ] },
            { "gamename": "darkest_dungeon", "title": "Darkest Dungeon",
              "installers": [ { "path": "/x/darkest_dungeon.sh", "platform": 4 } ] },
            { "gamename": "heroes_3", "title": "Heroes_3",
              "installers": [ { "path": "/x/heroes_3.sh", "platform": 4 } ] }
        ]
    }"#;

    fn catalog() -> CatalogSnapshot {
        CatalogSnapshot::parse(CATALOG).unwrap()
    }

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_truncated_folder_does_not_match() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("Age of Wonders")).unwrap();

        let scan = scan_installs(tmp.path(), &catalog()).unwrap();
        assert!(scan.get("age_of_wonders_planetfall").is_none());
    }

    #[test]
    fn test_matches_mangled_title() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("Age of Wonders Planetfall")).unwrap();
        std::fs::create_dir_all(tmp.path().join("TIS 100")).unwrap();
        std::fs::create_dir_all(tmp.path().join("Heroes-3")).unwrap();

        let scan = scan_installs(tmp.path(), &catalog()).unwrap();
        assert!(scan["age_of_wonders_planetfall"].path.ends_with("Age of Wonders Planetfall"));
        assert!(scan["tis100"].path.ends_with("TIS 100"));
        assert!(scan["heroes_3"].path.ends_with("Heroes-3"));
        assert_eq!(scan["tis100"].uninstaller, Uninstaller::Missing);
    }

    #[test]
    fn test_first_candidate_wins() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("Heroes 3")).unwrap();
        std::fs::create_dir_all(tmp.path().join("Heroes-3")).unwrap();

        let scan = scan_installs(tmp.path(), &catalog()).unwrap();
        assert!(scan["heroes_3"].path.ends_with("Heroes 3"));
    }

    #[test]
    fn test_unreadable_manifest_skips_title() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("TIS 100")).unwrap();
        std::fs::write(tmp.path().join("TIS 100").join(MANIFEST_FILE), [0xff, 0xfe, 0x00]).unwrap();
        std::fs::create_dir_all(tmp.path().join("Darkest Dungeon")).unwrap();

        let scan = scan_installs(tmp.path(), &catalog()).unwrap();
        assert!(scan.get("tis100").is_none());
        assert!(scan["darkest_dungeon"].path.ends_with("Darkest Dungeon"));
    }

    #[test]
    fn test_identifier_folder_matches() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("tis100")).unwrap();
        write(&tmp.path().join("tis100/stray.txt"), "x");

        let scan = scan_installs(tmp.path(), &catalog()).unwrap();
        assert!(scan["tis100"].path.ends_with("tis100"));
        assert!(scan.get("darkest_dungeon").is_none());
    }

    #[test]
    fn test_uninstall_script_detected() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("Darkest Dungeon");
        write(&dir.join("uninstall-Darkest Dungeon.sh"), "#!/bin/sh\n");
        write(&dir.join(MANIFEST_FILE), "data/noarch/start.sh\n");

        let record = read_install_record(&dir).unwrap();
        assert_eq!(
            record.uninstaller,
            Uninstaller::Script("uninstall-Darkest Dungeon.sh".into())
        );
    }

    #[test]
    fn test_manifest_prefix_stripped() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tis100");
        write(
            &dir.join(MANIFEST_FILE),
            "data/noarch/\ndata/noarch/start.sh\ndata/noarch/game/\ndata/noarch/game/tis100\n\n\
             data/noarch/../../etc/passwd\ndata/noarch/start.sh\n",
        );

        let record = read_install_record(&dir).unwrap();
        let Uninstaller::Manifest(files) = record.uninstaller else {
            panic!("expected manifest");
        };
        assert_eq!(
            files,
            vec![dir.join("start.sh"), dir.join("game"), dir.join("game/tis100")]
        );
    }

    #[test]
    fn test_uninstall_removes_exactly_listed_files() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tis100");
        write(&dir.join("start.sh"), "run");
        write(&dir.join("game/bin/tis100"), "bin");
        write(&dir.join("docs/readme.txt"), "docs");
        write(&dir.join("docs/user-notes.txt"), "mine");
        write(
            &dir.join(MANIFEST_FILE),
            "data/noarch/start.sh\ndata/noarch/game/bin/tis100\ndata/noarch/docs/readme.txt\n",
        );

        let listed = read_manifest(&dir).unwrap();
        let outcome = uninstall_from_manifest(&dir, &listed).unwrap();

        assert_eq!(
            outcome,
            UninstallOutcome::Manifest {
                files_removed: 3,
                dirs_removed: 2
            }
        );
        assert!(!dir.join("start.sh").exists());
        assert!(!dir.join("game").exists());
        assert!(!dir.join("docs/readme.txt").exists());
        assert!(dir.join("docs/user-notes.txt").exists());
        assert!(!dir.join(MANIFEST_FILE).exists());
        assert!(dir.exists());
    }

    #[test]
    fn test_uninstall_removes_empty_install_folder() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tis100");
        write(&dir.join("start.sh"), "run");
        write(&dir.join(MANIFEST_FILE), "data/noarch/start.sh\n");

        let listed = read_manifest(&dir).unwrap();
        uninstall_from_manifest(&dir, &listed).unwrap();
        assert!(!dir.exists());
        assert!(tmp.path().exists());
    }

    #[test]
    fn test_remove_install_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("tis100");
        write(&dir.join("game/data.bin"), "x");
        assert_eq!(remove_install_dir(&dir).unwrap(), UninstallOutcome::Folder);
        assert!(!dir.exists());
    }
}
