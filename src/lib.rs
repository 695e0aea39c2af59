//! mcinstall - Miniconda Environment Provisioning
//!
//! Builds self-contained Python data-science environments: downloads the
//! Miniconda installer for the host, installs it non-interactively into a
//! target directory, updates the base environment and layers pip and conda
//! packages on top, optionally from custom package indexes.
//!
//! # Architecture
//!
//! - [`config`]: platform detection and download location
//! - [`installer`]: the [`MinicondaInstaller`] and its subprocess plumbing
//! - [`environment`]: YAML environment files and the install record
//! - [`monitoring`]: phase timing and disk space checks
//! - [`provision`]: end-to-end sequencing for an environment file
//!
//! # Example
//!
//! ```rust,no_run
//! use mcinstall::MinicondaInstaller;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let prefix = tempfile::tempdir()?;
//!
//!     let mut mci = MinicondaInstaller::new(prefix.path(), true);
//!     mci.download()?;
//!     mci.install_miniconda()?;
//!     mci.update_miniconda_base()?;
//!     mci.install_pip(&["geopy"], None, None)?;
//!     mci.install_conda("conda-forge", &["pyyaml"])?;
//!
//!     let version = mci.run_python(&["-c", "import yaml; print(yaml.__version__)"])?;
//!     println!("pyyaml {}", version);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod installer;
pub mod monitoring;
pub mod provision;

// Re-export commonly used types
pub use config::{Config, Platform, CONFIG};
pub use environment::{load_environment, EnvironmentSpec, InstallRecord};
pub use error::{InstallerError, InstallerResult};
pub use installer::MinicondaInstaller;
pub use provision::Provisioner;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "mcinstall";
