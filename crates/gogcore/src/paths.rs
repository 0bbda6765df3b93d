//! Path helpers shared by the scanners.
//!
//! - NFC normalization so that folder names written by different tools
//!   compare equal
//! - `~` expansion for configured directories
//! - Lexical normalization of manifest entries (no filesystem access)

use std::path::{Component, Path, PathBuf};

use unicode_normalization::UnicodeNormalization;

/// NFC-normalize a name for comparisons.
pub fn nfc(name: &str) -> String {
    name.nfc().collect()
}

/// Expand a leading `~` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        return dirs::home_dir().unwrap_or_else(|| PathBuf::from(path));
    }
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Resolve `relative` against `base` and fold `.`/`..` components.
///
/// Returns `None` when the result would leave `base`.
pub fn join_normalized(base: &Path, relative: &str) -> Option<PathBuf> {
    let mut parts: Vec<&std::ffi::OsStr> = Vec::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(part) => parts.push(part),
            Component::CurDir => {}
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    let mut out = base.to_path_buf();
    out.extend(parts);
    Some(out)
}

/// File name of a path as UTF-8, empty if it has none.
pub fn file_name_str(path: &Path) -> &str {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nfc_equates_decomposed() {
        assert_eq!(nfc("Pe\u{301}tanque"), nfc("P\u{e9}tanque"));
    }

    #[test]
    fn test_join_normalized() {
        let base = Path::new("/games/tis100");
        assert_eq!(
            join_normalized(base, "./game/../start.sh"),
            Some(PathBuf::from("/games/tis100/start.sh"))
        );
        assert_eq!(join_normalized(base, "../other/file"), None);
        assert_eq!(join_normalized(base, "/etc/passwd"), None);
        assert_eq!(join_normalized(base, ""), Some(base.to_path_buf()));
    }

    #[test]
    fn test_expand_tilde_passthrough() {
        assert_eq!(expand_tilde("/srv/gog"), PathBuf::from("/srv/gog"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde("~/GOG Games"), home.join("GOG Games"));
        }
    }

    #[test]
    fn test_file_name_str() {
        assert_eq!(file_name_str(Path::new("/a/setup.sh")), "setup.sh");
        assert_eq!(file_name_str(Path::new("/")), "");
    }
}
