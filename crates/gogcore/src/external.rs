//! External collaborators: the downloader and the archive tool.
//!
//! Both are opaque programs invoked as blocking subprocesses. The traits are
//! the seams the reconciler works against, so the lifecycle can be driven
//! without network access or real installers.

use std::path::{Path, PathBuf};

use crate::catalog::Platform;
use crate::error::Result;
use crate::process::{self, CommandOutcome};

/// Fetches installers and refreshes the catalog snapshot.
pub trait Downloader {
    /// Download the installers of `id` for `platform` into `dest_root/<id>/`.
    fn download(&self, dest_root: &Path, platform: Platform, id: &str) -> Result<CommandOutcome>;

    /// Regenerate the catalog snapshot file in place.
    fn refresh(&self) -> Result<CommandOutcome>;
}

/// Extracts and lists installer archives.
pub trait ArchiveTool {
    /// Extract the entries under `subtree` of `archive` into `dest`.
    fn extract(&self, archive: &Path, dest: &Path, subtree: &str) -> Result<CommandOutcome>;

    /// Entry names under `subtree`, as stored in the archive.
    fn list(&self, archive: &Path, subtree: &str) -> Result<Vec<String>>;
}

/// `lgogdownloader` command line driver.
#[derive(Debug, Clone)]
pub struct LgogDownloader {
    program: PathBuf,
}

impl LgogDownloader {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn download_args(dest_root: &Path, platform: Platform, id: &str) -> Vec<String> {
        vec![
            "--download".into(),
            "--directory".into(),
            dest_root.to_string_lossy().into_owned(),
            "--platform".into(),
            platform.downloader_flag().into(),
            "--game".into(),
            // --game takes a regex; anchor it so `tis100` does not also pull `tis100_soundtrack`.
            format!("^{id}$"),
        ]
    }
}

impl Downloader for LgogDownloader {
    fn download(&self, dest_root: &Path, platform: Platform, id: &str) -> Result<CommandOutcome> {
        tracing::info!(title = %id, %platform, "downloading installers");
        let args = Self::download_args(dest_root, platform, id);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        process::run(&self.program, &args, None)
    }

    fn refresh(&self) -> Result<CommandOutcome> {
        tracing::info!("refreshing catalog snapshot");
        process::run(&self.program, &["--update-cache"], None)
    }
}

/// `unzip` driver. GOG linux installers are makeself scripts with a zip
/// payload appended, which `unzip` reads directly.
#[derive(Debug, Clone)]
pub struct Unzip {
    program: PathBuf,
}

impl Unzip {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn subtree_pattern(subtree: &str) -> String {
        format!("{}/*", subtree.trim_end_matches('/'))
    }

    fn extract_args(archive: &Path, dest: &Path, subtree: &str) -> Vec<String> {
        vec![
            "-qq".into(),
            "-o".into(),
            archive.to_string_lossy().into_owned(),
            "-d".into(),
            dest.to_string_lossy().into_owned(),
            Self::subtree_pattern(subtree),
        ]
    }

    fn list_args(archive: &Path, subtree: &str) -> Vec<String> {
        vec![
            "-Z".into(),
            "-1".into(),
            archive.to_string_lossy().into_owned(),
            Self::subtree_pattern(subtree),
        ]
    }
}

/// One entry name per non-blank line.
fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

impl ArchiveTool for Unzip {
    fn extract(&self, archive: &Path, dest: &Path, subtree: &str) -> Result<CommandOutcome> {
        let args = Self::extract_args(archive, dest, subtree);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        process::run(&self.program, &args, None)
    }

    fn list(&self, archive: &Path, subtree: &str) -> Result<Vec<String>> {
        let args = Self::list_args(archive, subtree);
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let outcome = process::run_captured(&self.program, &args)?;
        Ok(parse_listing(&outcome.stdout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_downloader_arguments() {
        assert_eq!(
            LgogDownloader::download_args(Path::new("/srv/gog"), Platform::Linux, "tis100"),
            vec!["--download", "--directory", "/srv/gog", "--platform", "l", "--game", "^tis100$"]
        );
        assert_eq!(
            LgogDownloader::download_args(Path::new("/srv/gog"), Platform::Windows, "x")[4],
            "w"
        );
    }

    #[test]
    fn test_unzip_arguments() {
        assert_eq!(
            Unzip::extract_args(Path::new("/dl/game.sh"), Path::new("/games/x/.staging"), "data/noarch/"),
            vec!["-qq", "-o", "/dl/game.sh", "-d", "/games/x/.staging", "data/noarch/*"]
        );
        assert_eq!(
            Unzip::list_args(Path::new("/dl/game.sh"), "data/noarch"),
            vec!["-Z", "-1", "/dl/game.sh", "data/noarch/*"]
        );
    }

    #[test]
    fn test_parse_listing() {
        let out = "data/noarch/\ndata/noarch/start.sh\n\ndata/noarch/game/bin  \n";
        assert_eq!(
            parse_listing(out),
            vec!["data/noarch/", "data/noarch/start.sh", "data/noarch/game/bin"]
        );
    }

    #[test]
    fn test_missing_downloader_is_io_error() {
        let downloader = LgogDownloader::new("/nonexistent/lgogdownloader");
        let err = downloader.refresh().unwrap_err();
        assert!(matches!(err, crate::error::GogError::Io { .. }));
    }
}
