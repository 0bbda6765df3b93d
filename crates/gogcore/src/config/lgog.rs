//! Reader for the downloader's own `key = value` config file.
//!
//! Only the download directory is needed from it, but the whole file is kept
//! so values can be inspected in logs.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::paths;

#[derive(Debug, Clone, PartialEq)]
pub enum LgogValue {
    Bool(bool),
    Text(String),
}

impl LgogValue {
    fn parse(raw: &str) -> Self {
        match raw {
            "true" => LgogValue::Bool(true),
            "false" => LgogValue::Bool(false),
            other => LgogValue::Text(other.to_string()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LgogValue::Text(s) => Some(s),
            LgogValue::Bool(_) => None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LgogConfig {
    values: BTreeMap<String, LgogValue>,
}

impl LgogConfig {
    /// Parse `key = value` lines. Lines without `=` and `#` comments are
    /// skipped.
    pub fn parse(content: &str) -> Self {
        let values = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .filter_map(|l| l.split_once('='))
            .map(|(k, v)| (k.trim().to_string(), LgogValue::parse(v.trim())))
            .collect();
        Self { values }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read downloader config {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    fn get(&self, key: &str) -> Option<&LgogValue> {
        self.values.get(key)
    }

    /// The configured download directory, `~` expanded.
    pub fn directory(&self) -> Option<PathBuf> {
        self.get("directory")
            .and_then(LgogValue::as_str)
            .filter(|d| !d.is_empty())
            .map(paths::expand_tilde)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_values() {
        let cfg = LgogConfig::parse(
            "# lgogdownloader\ndirectory = /data/gog\nsave-serials = true\nlimit-rate = 0\nno-cover = false\ngarbage\n",
        );
        assert_eq!(cfg.directory(), Some(PathBuf::from("/data/gog")));
        assert_eq!(cfg.get("save-serials"), Some(&LgogValue::Bool(true)));
        assert_eq!(cfg.get("no-cover"), Some(&LgogValue::Bool(false)));
        assert_eq!(cfg.get("limit-rate"), Some(&LgogValue::Text("0".into())));
        assert_eq!(cfg.get("garbage"), None);
    }

    #[test]
    fn test_missing_directory() {
        assert_eq!(LgogConfig::parse("directory =\n").directory(), None);
        assert_eq!(LgogConfig::parse("").directory(), None);
    }

    #[test]
    fn test_read_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("config.cfg");
        std::fs::write(&path, "directory = /srv/gog\n").unwrap();
        assert_eq!(LgogConfig::read(&path).unwrap().directory(), Some(PathBuf::from("/srv/gog")));
        assert!(LgogConfig::read(&tmp.path().join("nope.cfg")).is_err());
    }
}
