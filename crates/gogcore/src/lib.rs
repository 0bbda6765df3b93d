//! Core of gogtool: reconciles a GOG library snapshot against the local
//! download and installation directories.
//!
//! The filesystem and the catalog snapshot are the only sources of truth.
//! Every run re-derives title state from them; nothing is persisted between
//! runs apart from the `files.txt` manifests written at install time.

pub mod catalog;
pub mod config;
pub mod download;
pub mod error;
pub mod external;
pub mod install;
pub mod installdir;
pub mod names;
pub mod paths;
pub mod process;
pub mod prompt;
pub mod reconcile;
pub mod settings;
pub mod title;

pub use catalog::{CatalogEntry, CatalogSnapshot, EntryKind, Installer, Platform};
pub use error::{GogError, Result};
pub use reconcile::{Reconciler, RootPaths};
pub use title::{TitleRecord, TitleState};
