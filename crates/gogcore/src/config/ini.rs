//! Minimal INI reader/writer for the settings file.
//!
//! - Sections in `[brackets]`, keys before the first section are global
//! - `key=value` pairs, whitespace around both trimmed
//! - Comments start with `;` or `#` and are kept on rewrite
//! - Written back with `\n` line endings

use std::path::Path;

use anyhow::Context;

/// A parsed INI file preserving section order and comments.
#[derive(Debug, Clone, Default)]
pub struct IniFile {
    /// Sections in file order; the unnamed one holds global keys.
    pub sections: Vec<IniSection>,
}

#[derive(Debug, Clone)]
pub struct IniSection {
    pub name: String,
    pub entries: Vec<IniEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum IniEntry {
    Comment(String),
    KeyValue { key: String, value: String },
    Blank,
}

impl IniSection {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            entries: Vec::new(),
        }
    }

    fn value(&self, key: &str) -> Option<&str> {
        self.entries.iter().find_map(|e| match e {
            IniEntry::KeyValue { key: k, value } if k == key => Some(value.as_str()),
            _ => None,
        })
    }
}

impl IniFile {
    pub fn parse(content: &str) -> Self {
        let mut sections = Vec::new();
        let mut current = IniSection::new("");

        for line in content.lines() {
            let trimmed = line.trim();
            let entry = if trimmed.is_empty() {
                IniEntry::Blank
            } else if trimmed.starts_with(';') || trimmed.starts_with('#') {
                IniEntry::Comment(trimmed.to_string())
            } else if let Some(name) = trimmed.strip_prefix('[').and_then(|t| t.strip_suffix(']')) {
                sections.push(std::mem::replace(&mut current, IniSection::new(name.trim())));
                continue;
            } else if let Some((key, value)) = trimmed.split_once('=') {
                IniEntry::KeyValue {
                    key: key.trim().to_string(),
                    value: value.trim().to_string(),
                }
            } else {
                // Unknown lines survive a rewrite as comments
                IniEntry::Comment(trimmed.to_string())
            };
            current.entries.push(entry);
        }

        sections.push(current);
        IniFile { sections }
    }

    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Ok(Self::parse(&content))
    }

    pub fn write_to_string(&self) -> String {
        let mut out = String::new();
        for section in &self.sections {
            // Blank lines between sections come from the parsed entries
            if !section.name.is_empty() {
                out.push_str(&format!("[{}]\n", section.name));
            }
            for entry in &section.entries {
                match entry {
                    IniEntry::Comment(c) => out.push_str(c),
                    IniEntry::KeyValue { key, value } => {
                        out.push_str(key);
                        out.push('=');
                        out.push_str(value);
                    }
                    IniEntry::Blank => {}
                }
                out.push('\n');
            }
        }
        out
    }

    pub fn write(&self, path: &Path) -> anyhow::Result<()> {
        std::fs::write(path, self.write_to_string())
            .with_context(|| format!("failed to write {}", path.display()))
    }

    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.find_section(section).and_then(|s| s.value(key))
    }

    /// Set a value, creating the section and key if needed.
    pub fn set(&mut self, section: &str, key: &str, value: &str) {
        let sec = self.find_or_create_section(section);
        for entry in sec.entries.iter_mut() {
            if let IniEntry::KeyValue { key: k, value: v } = entry {
                if k == key {
                    *v = value.to_string();
                    return;
                }
            }
        }
        sec.entries.push(IniEntry::KeyValue {
            key: key.to_string(),
            value: value.to_string(),
        });
    }

    /// Remove a key. Returns whether it existed.
    pub fn remove(&mut self, section: &str, key: &str) -> bool {
        let Some(sec) = self.sections.iter_mut().find(|s| s.name == section) else {
            return false;
        };
        let before = sec.entries.len();
        sec.entries
            .retain(|e| !matches!(e, IniEntry::KeyValue { key: k, .. } if k == key));
        sec.entries.len() != before
    }

    fn find_section(&self, name: &str) -> Option<&IniSection> {
        self.sections.iter().find(|s| s.name == name)
    }

    fn find_or_create_section(&mut self, name: &str) -> &mut IniSection {
        let index = match self.sections.iter().position(|s| s.name == name) {
            Some(i) => i,
            None => {
                self.sections.push(IniSection::new(name));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let ini = IniFile::parse("[General]\ninstallDir = ~/GOG Games\ndownloader=lgogdownloader\n");
        assert_eq!(ini.get("General", "installDir"), Some("~/GOG Games"));
        assert_eq!(ini.get("General", "downloader"), Some("lgogdownloader"));
        assert_eq!(ini.get("Other", "installDir"), None);
    }

    #[test]
    fn test_global_keys() {
        let ini = IniFile::parse("key=top\n[General]\nkey=inner\n");
        assert_eq!(ini.get("", "key"), Some("top"));
        assert_eq!(ini.get("General", "key"), Some("inner"));
    }

    #[test]
    fn test_roundtrip() {
        let content = "; gogtool settings\n[General]\ninstallDir=/games\n\n[Extra]\nkey=value\n";
        let ini = IniFile::parse(content);
        assert_eq!(ini.write_to_string(), content);
    }

    #[test]
    fn test_set_and_remove() {
        let mut ini = IniFile::default();
        ini.set("General", "installDir", "/games");
        ini.set("General", "installDir", "/mnt/games");
        ini.set("General", "extractor", "unzip");
        assert_eq!(ini.get("General", "installDir"), Some("/mnt/games"));
        assert_eq!(ini.get("General", "extractor"), Some("unzip"));

        assert!(ini.remove("General", "extractor"));
        assert!(!ini.remove("General", "extractor"));
        assert!(!ini.remove("Missing", "extractor"));
        assert_eq!(ini.write_to_string(), "[General]\ninstallDir=/mnt/games\n");
    }

    #[test]
    fn test_write_and_read() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("settings.ini");
        let mut ini = IniFile::default();
        ini.set("General", "catalogPath", "/tmp/gamedetails.json");
        ini.write(&path).unwrap();

        let loaded = IniFile::read(&path).unwrap();
        assert_eq!(loaded.get("General", "catalogPath"), Some("/tmp/gamedetails.json"));
        assert!(IniFile::read(&tmp.path().join("missing.ini")).is_err());
    }
}
