//! Heuristics that bridge catalog identifiers and display titles to the
//! names found on disk.
//!
//! Installer files are recognized by prefix: GOG installers start with
//! `gog`/`setup` or some form of the game's slug. Install folders are named
//! after the display title with special characters mangled by the installer.
//! Both heuristics are loose; an unrelated file sharing a prefix is accepted
//! as a false positive.

use std::sync::LazyLock;

use regex::Regex;

static SPECIAL_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9 ]").expect("valid regex"));
static SPACE_RUNS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").expect("valid regex"));

/// Prefixes that installer files of `id` are expected to start with.
///
/// Always contains `gog`, `setup` and `id` itself. Also the slug cut at its
/// first underscore (`tyranny_game` -> `tyranny`) and at its first
/// non-alphabetic character (`tis100` -> `tis`). Empty cuts are dropped since
/// they would match every file.
pub fn guess_folder_prefixes(id: &str) -> Vec<String> {
    let mut prefixes: Vec<String> = Vec::with_capacity(5);
    let mut push = |p: &str| {
        if !p.is_empty() && !prefixes.iter().any(|existing| existing == p) {
            prefixes.push(p.to_string());
        }
    };

    push("gog");
    push("setup");
    push(id);

    if let Some(base) = id.split('_').next() {
        push(base);
    }

    if let Some((i, _)) = id.char_indices().find(|(_, c)| !c.is_alphabetic()) {
        push(&id[..i]);
    }

    prefixes
}

/// Whether `file_name` starts with any of `prefixes`.
pub fn is_prefix_matched(file_name: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|p| file_name.starts_with(p.as_str()))
}

/// Candidate install folder names for a display title, most likely first.
///
/// 1. every character outside `[A-Za-z0-9 ]` replaced by a space, runs of
///    spaces collapsed
/// 2. `_` replaced by `-`
/// 3. `:` replaced by `-`
///
/// Duplicates are removed, keeping the first position.
pub fn guess_install_dir_names(title: &str) -> Vec<String> {
    let no_specials = SPECIAL_CHARS.replace_all(title, " ");
    let collapsed = SPACE_RUNS.replace_all(&no_specials, " ").into_owned();

    let mut names = Vec::with_capacity(3);
    for candidate in [
        collapsed,
        title.replace('_', "-"),
        title.replace(':', "-"),
    ] {
        if !names.contains(&candidate) {
            names.push(candidate);
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes_contain_identifier() {
        for id in ["tis100", "tyranny_game", "age_of_wonders", "x", "7th_guest", "_odd"] {
            let prefixes = guess_folder_prefixes(id);
            assert!(prefixes.iter().any(|p| p == id), "{id} missing from {prefixes:?}");
            assert!(prefixes.iter().any(|p| p == "gog"));
            assert!(prefixes.iter().any(|p| p == "setup"));
        }
    }

    #[test]
    fn test_prefixes_truncations() {
        assert_eq!(guess_folder_prefixes("tis100"), vec!["gog", "setup", "tis100", "tis"]);
        assert_eq!(
            guess_folder_prefixes("tyranny_game"),
            vec!["gog", "setup", "tyranny_game", "tyranny"]
        );
        assert_eq!(guess_folder_prefixes("witcher"), vec!["gog", "setup", "witcher"]);
    }

    #[test]
    fn test_prefixes_never_empty() {
        assert!(guess_folder_prefixes("7th_guest").iter().all(|p| !p.is_empty()));
        assert!(guess_folder_prefixes("_odd").iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn test_prefix_matching() {
        let prefixes = guess_folder_prefixes("tis100");
        assert!(is_prefix_matched("setup_tis100_1.0.exe", &prefixes));
        assert!(is_prefix_matched("tis_100_1.2.sh", &prefixes));
        assert!(is_prefix_matched("gog_tis_100_2.0.0.3.sh", &prefixes));
        assert!(!is_prefix_matched("notes.txt", &prefixes));
        assert!(!is_prefix_matched("Setup_tis100.exe", &prefixes));
    }

    #[test]
    fn test_install_dir_names_plain_title() {
        for title in ["Darkest Dungeon", "Age of Wonders", "TIS 100"] {
            assert_eq!(guess_install_dir_names(title)[0], title);
        }
        assert_eq!(guess_install_dir_names("Darkest  Dungeon")[0], "Darkest Dungeon");
        assert_eq!(guess_install_dir_names("Darkest Dungeon").len(), 1);
    }

    #[test]
    fn test_install_dir_names_specials() {
        let names = guess_install_dir_names("Age of Wonders: Planetfall");
        assert_eq!(
            names,
            vec![
                "Age of Wonders Planetfall",
                "Age of Wonders: Planetfall",
                "Age of Wonders- Planetfall"
            ]
        );

        let names = guess_install_dir_names("TIS-100");
        assert_eq!(names, vec!["TIS 100", "TIS-100"]);

        let names = guess_install_dir_names("Heroes_of_Might");
        assert_eq!(names, vec!["Heroes of Might", "Heroes-of-Might", "Heroes_of_Might"]);
    }
}
