//! A whole session against temporary trees: reconcile, update, clean,
//! install, uninstall and a fresh run that sees the same state.

use std::path::{Path, PathBuf};

use gogcore::external::{ArchiveTool, Downloader};
use gogcore::installdir::UninstallOutcome;
use gogcore::process::CommandOutcome;
use gogcore::prompt::AutoAnswer;
use gogcore::{CatalogSnapshot, Platform, Reconciler, RootPaths, TitleState};

const CATALOG: &str = r#"{
    "date": "20240301T120000",
    "games": [
        { "gamename": "tis100", "title": "TIS-100",
          "installers": [ { "path": "/tis100/tis_100_1.2.sh", "platform": 4, "language": "en" } ] },
        { "gamename": "tyranny_game", "title": "Tyranny",
          "installers": [ { "path": "/tyranny/tyranny_en_1_2_1.sh", "platform": 4 } ] },
        { "gamename": "tis100_soundtrack", "title": "TIS-100 Soundtrack" }
    ]
}"#;

struct Shelf;

impl Downloader for Shelf {
    fn download(&self, dest_root: &Path, platform: Platform, id: &str) -> gogcore::Result<CommandOutcome> {
        let snapshot = CatalogSnapshot::parse(CATALOG).unwrap();
        let folder = dest_root.join(id);
        std::fs::create_dir_all(&folder).unwrap();
        for name in snapshot.lookup(id).unwrap().declared_file_names(platform) {
            std::fs::write(folder.join(name), vec![0u8; 2048]).unwrap();
        }
        Ok(CommandOutcome { code: Some(0), stdout: String::new() })
    }

    fn refresh(&self) -> gogcore::Result<CommandOutcome> {
        Ok(CommandOutcome::default())
    }
}

struct Payload;

impl ArchiveTool for Payload {
    fn extract(&self, _archive: &Path, dest: &Path, subtree: &str) -> gogcore::Result<CommandOutcome> {
        let root = dest.join(subtree);
        std::fs::create_dir_all(root.join("game/data")).unwrap();
        std::fs::write(root.join("start.sh"), "#!/bin/sh\n").unwrap();
        std::fs::write(root.join("game/data/level1"), "level").unwrap();
        Ok(CommandOutcome { code: Some(0), stdout: String::new() })
    }

    fn list(&self, _archive: &Path, subtree: &str) -> gogcore::Result<Vec<String>> {
        Ok(["", "start.sh", "game/", "game/data/", "game/data/level1"]
            .iter()
            .map(|e| format!("{subtree}/{e}"))
            .collect())
    }
}

fn setup() -> (tempfile::TempDir, RootPaths) {
    let tmp = tempfile::tempdir().unwrap();
    let paths = RootPaths {
        catalog: tmp.path().join("gamedetails.json"),
        downloads: tmp.path().join("downloads"),
        installs: tmp.path().join("GOG Games"),
    };
    std::fs::write(&paths.catalog, CATALOG).unwrap();
    std::fs::create_dir_all(&paths.downloads).unwrap();
    std::fs::create_dir_all(&paths.installs).unwrap();
    (tmp, paths)
}

fn open(paths: &RootPaths) -> Reconciler {
    Reconciler::new(paths.clone(), Box::new(Shelf), Box::new(Payload), Box::new(AutoAnswer(true))).unwrap()
}

fn touch(path: PathBuf) -> PathBuf {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "old").unwrap();
    path
}

#[test]
fn full_session() {
    let (_tmp, paths) = setup();
    let old_tis = touch(paths.downloads.join("tis100/tis_100_1.0.sh"));
    let old_tyranny = touch(paths.downloads.join("tyranny_game/tyranny_en_1_1.sh"));
    let readme = touch(paths.downloads.join("tyranny_game/README.txt"));

    let mut lib = open(&paths);
    assert_eq!(lib.outdated().len(), 2);
    assert_eq!(lib.record("tis100_soundtrack").unwrap().platform, None);

    // Download all; the single delete question is answered yes
    let report = lib.update_games(true, false);
    assert!(report.is_clean());
    assert_eq!(report.succeeded, vec!["tis100", "tyranny_game"]);
    assert_eq!(report.deleted, 2);
    assert!(!old_tis.exists());
    assert!(lib.outdated().is_empty());

    // Nothing stale is left for clean
    assert_eq!(lib.clean_orphans(false).unwrap(), 0);
    assert!(!old_tyranny.exists());
    assert!(readme.exists());

    let outcome = lib.install("tyranny_game").unwrap().unwrap();
    assert_eq!(outcome.path, paths.installs.join("tyranny_game"));
    assert_eq!(outcome.files_merged, 2);
    assert_eq!(lib.record("tyranny_game").unwrap().state(), TitleState::Installed);

    // A second run rebuilds the same view from disk alone
    let fresh = open(&paths);
    assert_eq!(fresh.record("tyranny_game").unwrap().state(), TitleState::Installed);
    assert_eq!(fresh.record("tis100").unwrap().state(), TitleState::DownloadedCurrent);
    assert_eq!(fresh.summary().installed, 1);

    let outcome = lib.uninstall("tyranny_game").unwrap();
    assert_eq!(
        outcome,
        UninstallOutcome::Manifest { files_removed: 2, dirs_removed: 3 }
    );
    assert!(!paths.installs.join("tyranny_game").exists());
    assert!(paths.downloads.join("tyranny_game/tyranny_en_1_2_1.sh").exists());

    let after = open(&paths);
    assert_eq!(after.record("tyranny_game").unwrap().state(), TitleState::DownloadedCurrent);
    assert!(after.installed().is_empty());
}
