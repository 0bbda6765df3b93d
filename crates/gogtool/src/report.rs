//! Plain-text output for listings and results.

use std::path::{Path, PathBuf};

use gogcore::download::{file_size, format_size};
use gogcore::installdir::UninstallOutcome;
use gogcore::paths::file_name_str;
use gogcore::reconcile::BatchReport;
use gogcore::{Platform, Reconciler, TitleRecord};

use crate::{ListCategory, PlatformFilter};

pub fn print_list(lib: &Reconciler, category: ListCategory, filter: PlatformFilter, show_files: bool) {
    let records: Vec<&TitleRecord> = match category {
        ListCategory::All => lib.records().filter(|r| !r.is_dlc()).collect(),
        ListCategory::Downloaded => lib.downloaded(),
        ListCategory::Installed => lib.installed(),
        ListCategory::Outdated => lib.outdated(),
    };

    let shown: Vec<&TitleRecord> = records
        .into_iter()
        .filter(|r| filter == PlatformFilter::All || r.platform == Some(Platform::Linux))
        .collect();
    if shown.is_empty() {
        println!("No titles.");
        return;
    }

    for record in shown {
        let platform = record
            .platform
            .map(|p| p.to_string())
            .unwrap_or_else(|| "bonus".to_string());
        println!("{:<40} {:<8} {}", record.id(), platform, record.state());
        if !show_files {
            continue;
        }
        if let Some(files) = &record.files {
            for path in files.current_paths() {
                print_file(&path, "");
            }
            for path in files.stale_paths() {
                print_file(&path, " (outdated)");
            }
        }
        for name in available_files(record) {
            println!("    {name} (available)");
        }
    }
}

/// Installers on the server worth fetching: every declared file of a title
/// that is not downloaded yet or only has outdated files.
fn available_files(record: &TitleRecord) -> Vec<&str> {
    let Some(platform) = record.platform else {
        return Vec::new();
    };
    if record.is_downloaded() && !record.needs_update() {
        return Vec::new();
    }
    record
        .entry
        .installers_for(platform)
        .iter()
        .map(|i| i.file_name.as_str())
        .collect()
}

fn print_file(path: &Path, note: &str) {
    println!(
        "    {} [{}]{note}",
        file_name_str(path),
        format_size(file_size(path))
    );
}

pub fn print_info(lib: &Reconciler) {
    let summary = lib.summary();
    let snapshot = lib.snapshot();
    let paths = lib.paths();
    let stale = if snapshot.is_stale() { " (stale)" } else { "" };
    println!(
        "Catalog:     {} titles, created {}{stale}",
        summary.catalog, snapshot.created
    );
    println!("Downloaded:  {}", summary.downloaded);
    println!("Installed:   {}", summary.installed);
    println!("Outdated:    {}", summary.outdated);
    println!("Downloads:   {}", paths.downloads.display());
    println!("Installs:    {}", paths.installs.display());
}

pub fn print_batch(report: &BatchReport) {
    for id in &report.succeeded {
        println!("Updated {id}");
    }
    for id in &report.reinstalled {
        println!("Reinstalled {id}");
    }
    for (id, error) in &report.failed {
        println!("Failed to update {id}: {error}");
    }
    if report.deleted > 0 {
        println!("Deleted {} old setup files.", report.deleted);
    }
    if report.succeeded.is_empty() && report.failed.is_empty() {
        println!("Nothing to update.");
    }
}

pub fn print_orphans(orphans: &[PathBuf]) {
    if orphans.is_empty() {
        return;
    }
    println!("Orphaned setup files:");
    for path in orphans {
        print_file(path, "");
    }
}

pub fn print_uninstall(id: &str, outcome: &UninstallOutcome) {
    match outcome {
        UninstallOutcome::Script { code: Some(0) } => println!("Uninstalled {id}"),
        UninstallOutcome::Script { code } => {
            let code = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
            println!("Uninstall script of {id} exited with {code}");
        }
        UninstallOutcome::Manifest { files_removed, dirs_removed } => {
            println!("Uninstalled {id} ({files_removed} files, {dirs_removed} folders removed)")
        }
        UninstallOutcome::Folder => println!("Removed install folder of {id}"),
        UninstallOutcome::Declined => println!("Kept {id}"),
    }
}
