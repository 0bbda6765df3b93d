//! Catalog snapshot parsing (lgogdownloader's `gamedetails.json`).
//!
//! The snapshot is a JSON document with a creation timestamp and one entry
//! per owned title:
//!
//! ```json
//! { "date": "20240101T120000",
//!   "games": [ { "gamename": "tis100", "title": "TIS-100",
//!                "installers": [ { "platform": 4, "language": "en",
//!                                  "path": "/tis100/en3installer0/tis_100_1.2.sh" } ],
//!                "dlcs": [ ... same shape ... ] } ] }
//! ```
//!
//! DLC and patch entries are flattened into the snapshot with a [`EntryKind`]
//! tag and a parent identifier instead of being nested.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::path::Path;

use chrono::{Local, NaiveDateTime};
use serde::Deserialize;

use crate::error::{GogError, Result};

/// Timestamp format of the snapshot's `date` field.
pub const SNAPSHOT_DATE_FORMAT: &str = "%Y%m%dT%H%M%S";

/// A snapshot this many days old (or older) should be refreshed.
pub const STALE_AFTER_DAYS: i64 = 2;

/// Target operating system of an installer.
///
/// Ordered by preference: Linux wins over Windows, Windows over Mac.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Platform {
    Linux,
    Windows,
    Mac,
}

impl Platform {
    pub const PRIORITY: [Platform; 3] = [Platform::Linux, Platform::Windows, Platform::Mac];

    /// Map the snapshot's integer tag (1 = Windows, 2 = Mac, 4 = Linux).
    pub fn from_tag(tag: u64) -> Option<Self> {
        match tag {
            1 => Some(Platform::Windows),
            2 => Some(Platform::Mac),
            4 => Some(Platform::Linux),
            _ => None,
        }
    }

    /// Platform flag understood by the downloader's `--platform` option.
    pub fn downloader_flag(self) -> &'static str {
        match self {
            Platform::Linux => "l",
            Platform::Windows => "w",
            Platform::Mac => "m",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Platform::Linux => "linux",
            Platform::Windows => "windows",
            Platform::Mac => "mac",
        })
    }
}

/// A declared installer file.
#[derive(Debug, Clone, PartialEq)]
pub struct Installer {
    /// Server-side path, e.g. `/tis100/en3installer0/tis_100_1.2.sh`
    pub path: String,
    /// Basename of `path`
    pub file_name: String,
    pub language: Option<String>,
    pub id: Option<String>,
    pub platform: Platform,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    Base,
    Dlc,
    Patch,
}

/// One title as declared by the catalog.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Stable slug (`gamename`)
    pub id: String,
    /// Human readable title, not safe for filesystem use
    pub title: String,
    pub kind: EntryKind,
    /// Identifier of the base title for DLC and patches
    pub parent: Option<String>,
    /// Declared installers grouped by platform, in platform priority order
    pub installers: BTreeMap<Platform, Vec<Installer>>,
    /// Identifiers of nested DLC and patch entries
    pub children: Vec<String>,
}

impl CatalogEntry {
    /// First platform with declared installers: linux, then windows, then mac.
    pub fn resolve_platform(&self) -> Option<Platform> {
        Platform::PRIORITY
            .into_iter()
            .find(|p| self.installers.get(p).is_some_and(|list| !list.is_empty()))
    }

    pub fn installers_for(&self, platform: Platform) -> &[Installer] {
        self.installers
            .get(&platform)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Basenames of the installers declared for `platform`.
    pub fn declared_file_names(&self, platform: Platform) -> BTreeSet<String> {
        self.installers_for(platform)
            .iter()
            .map(|i| i.file_name.clone())
            .collect()
    }

    /// Entries without installers only carry extras (soundtracks, manuals).
    pub fn is_bonus_content(&self) -> bool {
        self.installers.values().all(Vec::is_empty)
    }
}

/// The parsed catalog plus its creation time.
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    pub created: NaiveDateTime,
    entries: Vec<CatalogEntry>,
    index: HashMap<String, usize>,
}

#[derive(Deserialize)]
struct RawSnapshot {
    date: String,
    games: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawEntry {
    gamename: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    installers: Vec<RawInstaller>,
    #[serde(default)]
    dlcs: Vec<RawEntry>,
    #[serde(default)]
    patches: Vec<RawEntry>,
}

#[derive(Deserialize)]
struct RawInstaller {
    platform: u64,
    path: String,
    #[serde(default)]
    language: Option<RawLanguage>,
    #[serde(default)]
    id: Option<String>,
}

/// Older snapshots store the language as a numeric code.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawLanguage {
    Text(String),
    Code(u64),
}

impl CatalogSnapshot {
    /// Load and parse a snapshot file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| GogError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let snapshot = Self::parse(&content).map_err(|reason| GogError::Parse {
            path: path.to_path_buf(),
            reason,
        })?;
        tracing::debug!(
            path = %path.display(),
            entries = snapshot.entries.len(),
            "loaded catalog snapshot"
        );
        Ok(snapshot)
    }

    /// Parse snapshot JSON. The error is a human readable reason.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let raw: RawSnapshot = serde_json::from_str(content).map_err(|e| e.to_string())?;
        let created = NaiveDateTime::parse_from_str(&raw.date, SNAPSHOT_DATE_FORMAT)
            .map_err(|e| format!("invalid date {:?}: {e}", raw.date))?;

        let mut snapshot = CatalogSnapshot {
            created,
            entries: Vec::new(),
            index: HashMap::new(),
        };
        for game in raw.games {
            snapshot.push_entry(game, EntryKind::Base, None)?;
        }
        Ok(snapshot)
    }

    fn push_entry(
        &mut self,
        raw: RawEntry,
        kind: EntryKind,
        parent: Option<&str>,
    ) -> std::result::Result<(), String> {
        if self.index.contains_key(&raw.gamename) {
            return Err(format!("duplicate gamename {:?}", raw.gamename));
        }

        let mut installers: BTreeMap<Platform, Vec<Installer>> = BTreeMap::new();
        for inst in raw.installers {
            let platform = Platform::from_tag(inst.platform).ok_or_else(|| {
                format!(
                    "unknown platform tag {} for {:?}",
                    inst.platform, raw.gamename
                )
            })?;
            let file_name = inst
                .path
                .rsplit('/')
                .next()
                .unwrap_or(inst.path.as_str())
                .to_string();
            installers.entry(platform).or_default().push(Installer {
                file_name,
                path: inst.path,
                language: inst.language.map(|l| match l {
                    RawLanguage::Text(s) => s,
                    RawLanguage::Code(c) => c.to_string(),
                }),
                id: inst.id,
                platform,
            });
        }

        let id = raw.gamename;
        let children: Vec<String> = raw
            .dlcs
            .iter()
            .chain(raw.patches.iter())
            .map(|c| c.gamename.clone())
            .collect();

        self.index.insert(id.clone(), self.entries.len());
        self.entries.push(CatalogEntry {
            title: raw.title.unwrap_or_else(|| id.clone()),
            id: id.clone(),
            kind,
            parent: parent.map(String::from),
            installers,
            children,
        });

        for dlc in raw.dlcs {
            self.push_entry(dlc, EntryKind::Dlc, Some(&id))?;
        }
        for patch in raw.patches {
            self.push_entry(patch, EntryKind::Patch, Some(&id))?;
        }
        Ok(())
    }

    pub fn lookup(&self, id: &str) -> Option<&CatalogEntry> {
        self.index.get(id).map(|&i| &self.entries[i])
    }

    /// All entries, each base title followed by its DLC and patches.
    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn base_entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|e| e.kind == EntryKind::Base)
    }

    /// DLC and patches declared under `id`.
    pub fn dlcs_of(&self, id: &str) -> Vec<&CatalogEntry> {
        self.lookup(id)
            .map(|e| e.children.iter().filter_map(|c| self.lookup(c)).collect())
            .unwrap_or_default()
    }

    /// Number of base titles.
    pub fn len(&self) -> usize {
        self.base_entries().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whole days between creation and `now`.
    pub fn age_days(&self, now: NaiveDateTime) -> i64 {
        (now - self.created).num_days()
    }

    /// Staleness against the wall clock at call time.
    pub fn is_stale(&self) -> bool {
        self.is_stale_at(Local::now().naive_local())
    }

    pub fn is_stale_at(&self, now: NaiveDateTime) -> bool {
        let age = self.age_days(now);
        let stale = age >= STALE_AFTER_DAYS;
        tracing::debug!(
            created = %self.created.format("%Y%m%d"),
            age_days = age,
            stale,
            "checked catalog age"
        );
        stale
    }
}
