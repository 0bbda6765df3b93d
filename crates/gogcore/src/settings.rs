//! User settings stored at `~/.config/gogtool/settings.ini`.
//!
//! `GOGTOOL_CONFIG` points at an alternative file. Every key is optional and
//! falls back to the lgogdownloader defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::config::ini::IniFile;
use crate::config::lgog::LgogConfig;
use crate::paths;

/// Environment variable overriding the settings file location.
pub const CONFIG_ENV: &str = "GOGTOOL_CONFIG";

const SECTION: &str = "General";

pub const DEFAULT_INSTALL_DIR: &str = "~/GOG Games";
pub const DEFAULT_CATALOG: &str = "~/.cache/lgogdownloader/gamedetails.json";
pub const DEFAULT_DOWNLOADER_CONFIG: &str = "~/.config/lgogdownloader/config.cfg";
pub const DEFAULT_DOWNLOADER: &str = "lgogdownloader";
pub const DEFAULT_EXTRACTOR: &str = "unzip";

#[derive(Debug)]
pub struct Settings {
    ini: IniFile,
    path: PathBuf,
}

impl Settings {
    /// Load from `GOGTOOL_CONFIG` or the default location. A missing file
    /// yields defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_path);
        Self::load_from(path)
    }

    pub fn load_from(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let ini = if path.exists() {
            IniFile::read(&path)?
        } else {
            tracing::debug!(path = %path.display(), "no settings file, using defaults");
            IniFile::default()
        };
        Ok(Settings { ini, path })
    }

    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        self.ini.write(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn path_value(&self, key: &str, default: &str) -> PathBuf {
        paths::expand_tilde(self.ini.get(SECTION, key).unwrap_or(default))
    }

    pub fn install_dir(&self) -> PathBuf {
        self.path_value("installDir", DEFAULT_INSTALL_DIR)
    }

    pub fn set_install_dir(&mut self, dir: &str) {
        self.ini.set(SECTION, "installDir", dir);
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.path_value("catalogPath", DEFAULT_CATALOG)
    }

    pub fn downloader_config(&self) -> PathBuf {
        self.path_value("downloaderConfig", DEFAULT_DOWNLOADER_CONFIG)
    }

    pub fn downloader(&self) -> &str {
        self.ini.get(SECTION, "downloader").unwrap_or(DEFAULT_DOWNLOADER)
    }

    pub fn extractor(&self) -> &str {
        self.ini.get(SECTION, "extractor").unwrap_or(DEFAULT_EXTRACTOR)
    }

    pub fn set_download_dir(&mut self, dir: &str) {
        if dir.trim().is_empty() {
            self.ini.remove(SECTION, "downloadDir");
        } else {
            self.ini.set(SECTION, "downloadDir", dir.trim());
        }
    }

    /// Explicit `downloadDir`, else the downloader config's `directory`.
    pub fn download_dir(&self) -> anyhow::Result<PathBuf> {
        if let Some(dir) = self.ini.get(SECTION, "downloadDir").filter(|d| !d.is_empty()) {
            return Ok(paths::expand_tilde(dir));
        }
        let config = self.downloader_config();
        LgogConfig::read(&config)?
            .directory()
            .with_context(|| format!("no download directory set in {}", config.display()))
    }

    fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("gogtool")
            .join("settings.ini")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(content: &str) -> Settings {
        Settings {
            ini: IniFile::parse(content),
            path: PathBuf::from("/tmp/gogtool-test/settings.ini"),
        }
    }

    #[test]
    fn test_defaults() {
        let s = settings("");
        assert!(s.install_dir().ends_with("GOG Games"));
        assert!(s.catalog_path().ends_with(".cache/lgogdownloader/gamedetails.json"));
        assert_eq!(s.downloader(), "lgogdownloader");
        assert_eq!(s.extractor(), "unzip");
    }

    #[test]
    fn test_explicit_values() {
        let s = settings("[General]\ninstallDir=/games\ndownloadDir=/dl\nextractor=/usr/bin/unzip\n");
        assert_eq!(s.install_dir(), PathBuf::from("/games"));
        assert_eq!(s.download_dir().unwrap(), PathBuf::from("/dl"));
        assert_eq!(s.extractor(), "/usr/bin/unzip");
    }

    #[test]
    fn test_download_dir_from_downloader_config() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = tmp.path().join("config.cfg");
        std::fs::write(&cfg, "directory = /srv/gog\n").unwrap();
        let s = settings(&format!("[General]\ndownloaderConfig={}\n", cfg.display()));
        assert_eq!(s.download_dir().unwrap(), PathBuf::from("/srv/gog"));

        std::fs::write(&cfg, "save-serials = true\n").unwrap();
        assert!(s.download_dir().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("gogtool/settings.ini");

        let mut s = Settings::load_from(&path).unwrap();
        s.set_install_dir("/mnt/games");
        s.set_download_dir(" /mnt/dl ");
        s.save().unwrap();

        let loaded = Settings::load_from(&path).unwrap();
        assert_eq!(loaded.install_dir(), PathBuf::from("/mnt/games"));
        assert_eq!(loaded.download_dir().unwrap(), PathBuf::from("/mnt/dl"));

        let mut cleared = loaded;
        cleared.set_download_dir("");
        assert_eq!(cleared.ini.get(SECTION, "downloadDir"), None);
    }
}
