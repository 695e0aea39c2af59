//! Installer Module
//!
//! Acquires and runs the Miniconda installer and the package managers it
//! ships with.
//!
//! - [`miniconda`]: the [`MinicondaInstaller`] driving each operation
//! - [`download`]: HTTP(S) download with SHA-256 verification
//! - [`command`]: blocking subprocess execution and failure reporting

pub mod command;
pub mod download;
pub mod miniconda;

pub use miniconda::{split_index_urls, MinicondaInstaller};
