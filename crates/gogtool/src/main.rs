use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, ValueEnum};
use gogcore::external::{LgogDownloader, Unzip};
use gogcore::process;
use gogcore::prompt::{AutoAnswer, Confirm, TerminalPrompt};
use gogcore::settings::Settings;
use gogcore::{Reconciler, RootPaths};
use tracing_subscriber::EnvFilter;

mod report;

/// Keep a GOG library's setup files and installations in sync with the
/// lgogdownloader catalog.
#[derive(Parser, Debug)]
#[command(name = "gogtool", version)]
struct Cli {
    /// List titles of a category
    #[arg(short, long, value_enum, value_name = "CATEGORY")]
    list: Option<ListCategory>,

    /// Show setup files and their sizes in listings
    #[arg(long)]
    show_files: bool,

    /// Restrict listings to linux titles (`l`) or show every platform (`w`)
    #[arg(short, long, value_enum, default_value_t = PlatformFilter::Linux)]
    platform: PlatformFilter,

    /// Print library statistics
    #[arg(long)]
    info: bool,

    /// Download new installers for outdated titles and reinstall them
    #[arg(short, long)]
    update: bool,

    #[arg(long, num_args = 1.., value_name = "ID")]
    download: Vec<String>,

    #[arg(long, num_args = 1.., value_name = "ID")]
    install: Vec<String>,

    #[arg(long, num_args = 1.., value_name = "ID")]
    uninstall: Vec<String>,

    /// Uninstall and delete every setup file
    #[arg(long, num_args = 1.., value_name = "ID")]
    remove: Vec<String>,

    /// Delete outdated setup files of every title
    #[arg(long)]
    clean: bool,

    /// Refresh the catalog even if it is recent
    #[arg(long)]
    refresh: bool,

    /// Start an installed game
    #[arg(long, value_name = "ID")]
    launch: Option<String>,

    /// Open the install folder of a game
    #[arg(long, value_name = "ID")]
    view: Option<String>,

    /// Open the lgogdownloader config in the desktop's editor
    #[arg(long)]
    edit_lgogconfig: bool,

    /// Store --install-dir and --download-dir in the settings file
    #[arg(long)]
    save_dirs: bool,

    /// Download everything and answer yes to every question
    #[arg(short, long)]
    yes: bool,

    /// Delete outdated setup files without asking
    #[arg(long)]
    delete_old: bool,

    /// Offer downloads for empty title folders
    #[arg(long)]
    include_empty: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Settings file (default: ~/.config/gogtool/settings.ini)
    #[arg(long, env = "GOGTOOL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    install_dir: Option<PathBuf>,

    #[arg(long, value_name = "DIR")]
    download_dir: Option<PathBuf>,

    /// Catalog snapshot (gamedetails.json)
    #[arg(long, value_name = "FILE")]
    catalog: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListCategory {
    All,
    Downloaded,
    Installed,
    Outdated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlatformFilter {
    #[value(name = "l", alias = "linux")]
    Linux,
    #[value(name = "w", alias = "all")]
    All,
}

impl Cli {
    fn wants_library_actions(&self) -> bool {
        self.update
            || self.clean
            || self.info
            || self.list.is_some()
            || !self.install.is_empty()
            || !self.uninstall.is_empty()
            || !self.remove.is_empty()
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(0) => ExitCode::SUCCESS,
        Ok(failures) => {
            tracing::warn!(failures, "some operations failed");
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(1)
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("gogcore={level},gogtool={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Tracks per-title failures; fatal errors end the run.
struct Session {
    lib: Reconciler,
    failures: usize,
}

impl Session {
    fn attempt<T>(&mut self, id: &str, action: &str, result: gogcore::Result<T>) -> Result<Option<T>> {
        match result {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_fatal() => Err(e.into()),
            Err(e) => {
                tracing::error!(title = %id, error = %e, "{action} failed");
                self.failures += 1;
                Ok(None)
            }
        }
    }
}

fn run(cli: &Cli) -> Result<usize> {
    let mut settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if cli.save_dirs {
        save_dirs(cli, &mut settings)?;
    }

    let downloads = match &cli.download_dir {
        Some(dir) => dir.clone(),
        None => settings
            .download_dir()
            .context("cannot determine the download directory")?,
    };
    let paths = RootPaths {
        catalog: cli.catalog.clone().unwrap_or_else(|| settings.catalog_path()),
        downloads,
        installs: cli.install_dir.clone().unwrap_or_else(|| settings.install_dir()),
    };
    tracing::debug!(?paths, settings = %settings.path().display(), "resolved paths");

    for program in [settings.downloader(), settings.extractor()] {
        if which::which(program).is_err() {
            tracing::warn!(program, "not found on PATH");
        }
    }

    let prompt: Box<dyn Confirm> = if cli.yes {
        Box::new(AutoAnswer(true))
    } else {
        Box::new(TerminalPrompt::new(std::io::stdin().lock(), std::io::stderr()))
    };
    let lib = Reconciler::new(
        paths,
        Box::new(LgogDownloader::new(settings.downloader())),
        Box::new(Unzip::new(settings.extractor())),
        prompt,
    )
    .context("failed to read the library")?
    .with_include_empty(cli.include_empty);

    let mut session = Session { lib, failures: 0 };

    if cli.refresh || cli.wants_library_actions() {
        let result = session.lib.refresh_if_stale(cli.refresh);
        if let Some(true) = session.attempt("catalog", "refresh", result)? {
            println!("Catalog refreshed.");
        }
    }

    for id in &cli.download {
        let result = session.lib.download(id, cli.delete_old);
        session.attempt(id, "download", result)?;
    }

    for id in &cli.install {
        let result = session.lib.install(id);
        if let Some(Some(outcome)) = session.attempt(id, "install", result)? {
            println!("Installed {id} to {}", outcome.path.display());
        }
    }

    if cli.update {
        let report = session.lib.update_games(cli.yes, cli.delete_old);
        report::print_batch(&report);
        session.failures += report.failed.len();
    }

    for id in &cli.uninstall {
        let result = session.lib.uninstall(id);
        if let Some(outcome) = session.attempt(id, "uninstall", result)? {
            report::print_uninstall(id, &outcome);
        }
    }

    for id in &cli.remove {
        let result = session.lib.remove(id);
        if let Some(deleted) = session.attempt(id, "remove", result)? {
            println!("Removed {id} ({deleted} setup files deleted)");
        }
    }

    if cli.clean {
        report::print_orphans(&session.lib.orphans());
        let result = session.lib.clean_orphans(cli.delete_old);
        if let Some(deleted) = session.attempt("orphans", "clean", result)? {
            println!("Deleted {deleted} orphaned files.");
        }
    }

    if let Some(category) = cli.list {
        report::print_list(&session.lib, category, cli.platform, cli.show_files);
    }

    if let Some(id) = &cli.view {
        let result = session
            .lib
            .install_path(id)
            .map(Path::to_path_buf)
            .and_then(|path| process::open_path(&path));
        session.attempt(id, "view", result)?;
    }

    let nothing_requested = !cli.wants_library_actions()
        && !cli.refresh
        && !cli.edit_lgogconfig
        && !cli.save_dirs
        && cli.download.is_empty()
        && cli.launch.is_none()
        && cli.view.is_none();
    if cli.info || nothing_requested {
        report::print_info(&session.lib);
    }

    if cli.edit_lgogconfig {
        let result = process::open_path(&settings.downloader_config());
        session.attempt("lgogdownloader", "edit config", result)?;
    }

    if let Some(id) = &cli.launch {
        let result = session.lib.launch(id);
        if let Some(Some(code)) = session.attempt(id, "launch", result)? {
            if code != 0 {
                println!("{id} exited with status {code}");
            }
        }
    }

    Ok(session.failures)
}

fn save_dirs(cli: &Cli, settings: &mut Settings) -> Result<()> {
    if cli.install_dir.is_none() && cli.download_dir.is_none() {
        tracing::warn!("--save-dirs given without --install-dir or --download-dir");
    }
    if let Some(dir) = &cli.install_dir {
        settings.set_install_dir(&dir.to_string_lossy());
    }
    if let Some(dir) = &cli.download_dir {
        settings.set_download_dir(&dir.to_string_lossy());
    }
    settings.save().context("failed to save settings")?;
    println!("Saved settings to {}", settings.path().display());
    Ok(())
}
