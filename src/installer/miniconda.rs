//! Miniconda Installer
//!
//! Downloads the Miniconda installer for the host platform, runs it in batch
//! mode into a target prefix, and installs packages into that prefix with
//! pip or conda.
//!
//! Operations are expected in order: [`download`], [`install_miniconda`],
//! [`update_miniconda_base`], then any number of [`install_pip`] and
//! [`install_conda`] calls. The prefix is owned by the caller, who also
//! removes it.
//!
//! [`download`]: MinicondaInstaller::download
//! [`install_miniconda`]: MinicondaInstaller::install_miniconda
//! [`update_miniconda_base`]: MinicondaInstaller::update_miniconda_base
//! [`install_pip`]: MinicondaInstaller::install_pip
//! [`install_conda`]: MinicondaInstaller::install_conda

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::{debug, info, warn};
use tempfile::TempDir;

use crate::config::{Config, Platform, CONFIG};
use crate::error::{InstallerError, InstallerResult};

use super::command::{capture_output, run_command};
use super::download::download_file;

/// Drives the Miniconda installer and the package managers it ships.
///
/// # Example
///
/// ```rust,no_run
/// use mcinstall::MinicondaInstaller;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let mut mci = MinicondaInstaller::new("/opt/envs/analysis", true);
///     mci.download()?;
///     mci.install_miniconda()?;
///     mci.update_miniconda_base()?;
///     mci.install_pip(&["geopy"], None, None)?;
///     mci.install_conda("conda-forge", &["pyyaml"])?;
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MinicondaInstaller {
    prefix: PathBuf,
    verbose: bool,
    config: Config,
    expected_sha256: Option<String>,
    download_dir: Option<TempDir>,
    installer_path: Option<PathBuf>,
    installer_sha256: Option<String>,
}

impl MinicondaInstaller {
    /// Creates an installer for `prefix` using the host configuration.
    ///
    /// The prefix does not need to exist yet.
    pub fn new(prefix: impl Into<PathBuf>, verbose: bool) -> Self {
        Self::with_config(prefix, verbose, CONFIG.clone())
    }

    /// Creates an installer for `prefix` with an explicit configuration.
    pub fn with_config(prefix: impl Into<PathBuf>, verbose: bool, config: Config) -> Self {
        Self {
            prefix: prefix.into(),
            verbose,
            config,
            expected_sha256: None,
            download_dir: None,
            installer_path: None,
            installer_sha256: None,
        }
    }

    /// Requires the downloaded installer to match a SHA-256 digest.
    pub fn with_sha256(mut self, sha256: impl Into<String>) -> Self {
        self.expected_sha256 = Some(sha256.into());
        self
    }

    /// Target directory of the installation.
    pub fn prefix(&self) -> &Path {
        &self.prefix
    }

    /// Configuration this installer was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether child process output streams to the terminal.
    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Local path of the downloaded installer, once [`download`](Self::download) ran.
    pub fn installer_path(&self) -> Option<&Path> {
        self.installer_path.as_deref()
    }

    /// SHA-256 of the downloaded installer, once [`download`](Self::download) ran.
    pub fn installer_sha256(&self) -> Option<&str> {
        self.installer_sha256.as_deref()
    }

    /// Python interpreter inside the prefix.
    pub fn python_path(&self) -> PathBuf {
        if self.windows_layout() {
            self.prefix.join("python.exe")
        } else {
            self.prefix.join("bin").join("python")
        }
    }

    /// conda executable inside the prefix.
    pub fn conda_path(&self) -> PathBuf {
        if self.windows_layout() {
            self.prefix.join("Scripts").join("conda.exe")
        } else {
            self.prefix.join("bin").join("conda")
        }
    }

    /// True once the prefix contains a Python interpreter.
    pub fn is_installed(&self) -> bool {
        self.python_path().is_file()
    }

    /// Downloads the platform's Miniconda installer into a private
    /// temporary directory and returns its path.
    ///
    /// The temporary directory lives as long as this installer.
    pub fn download(&mut self) -> InstallerResult<PathBuf> {
        let url = self.config.require_installer_url()?.to_string();
        let file_name = self
            .config
            .installer_name
            .clone()
            .unwrap_or_else(|| "miniconda-installer".to_string());

        let download_dir = tempfile::Builder::new()
            .prefix("mcinstall-")
            .tempdir()
            .map_err(|e| InstallerError::io(env::temp_dir(), e))?;
        let dest = download_dir.path().join(file_name);

        let sha256 = download_file(&url, &dest, self.expected_sha256.as_deref())?;
        info!("Downloaded installer to {} (sha256 {})", dest.display(), sha256);

        self.download_dir = Some(download_dir);
        self.installer_path = Some(dest.clone());
        self.installer_sha256 = Some(sha256);
        Ok(dest)
    }

    /// Runs the downloaded installer in batch mode into the prefix.
    pub fn install_miniconda(&mut self) -> InstallerResult<()> {
        let installer = self
            .installer_path
            .clone()
            .ok_or(InstallerError::NotDownloaded)?;
        let platform = self.config.require_platform()?;
        let prefix = self.absolute_prefix()?;

        info!("Installing Miniconda into {}", prefix.display());

        let (program, args) = installer_invocation(platform, &installer, &prefix);
        let mut cmd = Command::new(program);
        cmd.args(args);

        run_command(&mut cmd, self.verbose)?;

        if !self.is_installed() {
            return Err(InstallerError::NotInstalled(prefix));
        }

        info!("Miniconda installed at {}", prefix.display());
        Ok(())
    }

    /// Updates every package of the base environment.
    pub fn update_miniconda_base(&self) -> InstallerResult<()> {
        self.require_installed()?;
        info!("Updating Miniconda base environment");

        let mut cmd = self.conda_command();
        cmd.args(update_base_args());
        run_command(&mut cmd, self.verbose)
    }

    /// Installs packages with pip.
    ///
    /// `index_url` replaces the primary index. `extra_index_url` holds one
    /// or more supplementary indexes separated by commas and/or whitespace.
    pub fn install_pip<S: AsRef<str>>(
        &self,
        dependencies: &[S],
        index_url: Option<&str>,
        extra_index_url: Option<&str>,
    ) -> InstallerResult<()> {
        if dependencies.is_empty() {
            warn!("No pip dependencies given, skipping");
            return Ok(());
        }
        self.require_installed()?;

        info!("Installing with pip: {}", join(dependencies));
        if let Some(url) = index_url {
            info!("  index URL: {}", url);
        }
        for url in extra_index_url.map(split_index_urls).unwrap_or_default() {
            info!("  extra index URL: {}", url);
        }

        let mut cmd = Command::new(self.python_path());
        cmd.args(pip_install_args(dependencies, index_url, extra_index_url))
            .env("PIP_DISABLE_PIP_VERSION_CHECK", "1")
            .env("PYTHONNOUSERSITE", "1");
        run_command(&mut cmd, self.verbose)
    }

    /// Installs packages with conda from `channel`.
    pub fn install_conda<S: AsRef<str>>(
        &self,
        channel: &str,
        dependencies: &[S],
    ) -> InstallerResult<()> {
        if dependencies.is_empty() {
            warn!("No conda dependencies given, skipping");
            return Ok(());
        }
        self.require_installed()?;

        info!(
            "Installing with conda from '{}': {}",
            channel,
            join(dependencies)
        );

        let mut cmd = self.conda_command();
        cmd.args(conda_install_args(channel, dependencies));
        run_command(&mut cmd, self.verbose)
    }

    /// Runs the prefix's Python with `args` and returns its trimmed stdout.
    pub fn run_python<S: AsRef<str>>(&self, args: &[S]) -> InstallerResult<String> {
        self.require_installed()?;

        let mut cmd = Command::new(self.python_path());
        cmd.args(args.iter().map(|a| a.as_ref()))
            .env("PYTHONNOUSERSITE", "1");
        capture_output(&mut cmd)
    }

    fn conda_command(&self) -> Command {
        let mut cmd = Command::new(self.conda_path());
        cmd.env("CONDA_ALWAYS_YES", "true");
        cmd
    }

    fn require_installed(&self) -> InstallerResult<()> {
        if self.is_installed() {
            Ok(())
        } else {
            Err(InstallerError::NotInstalled(self.prefix.clone()))
        }
    }

    fn absolute_prefix(&self) -> InstallerResult<PathBuf> {
        if self.prefix.is_absolute() {
            return Ok(self.prefix.clone());
        }
        let cwd = env::current_dir().map_err(|e| InstallerError::io(&self.prefix, e))?;
        debug!("Resolving relative prefix against {}", cwd.display());
        Ok(cwd.join(&self.prefix))
    }

    fn windows_layout(&self) -> bool {
        self.config
            .platform
            .map(|p| p.is_windows())
            .unwrap_or(cfg!(windows))
    }
}

/// Splits a comma and/or whitespace separated list of index URLs.
pub fn split_index_urls(urls: &str) -> Vec<String> {
    urls.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|u| !u.is_empty())
        .map(str::to_string)
        .collect()
}

/// Arguments for `python -m pip install`.
pub fn pip_install_args<S: AsRef<str>>(
    dependencies: &[S],
    index_url: Option<&str>,
    extra_index_url: Option<&str>,
) -> Vec<String> {
    let mut args = vec!["-m".to_string(), "pip".to_string(), "install".to_string()];

    if let Some(url) = index_url.map(str::trim).filter(|u| !u.is_empty()) {
        args.push("--index-url".to_string());
        args.push(url.to_string());
    }

    for url in extra_index_url.map(split_index_urls).unwrap_or_default() {
        args.push("--extra-index-url".to_string());
        args.push(url);
    }

    args.extend(dependencies.iter().map(|d| d.as_ref().to_string()));
    args
}

/// Arguments for `conda install` from a single channel.
pub fn conda_install_args<S: AsRef<str>>(channel: &str, dependencies: &[S]) -> Vec<String> {
    let mut args = vec![
        "install".to_string(),
        "-y".to_string(),
        "-c".to_string(),
        channel.to_string(),
    ];
    args.extend(dependencies.iter().map(|d| d.as_ref().to_string()));
    args
}

/// Arguments for updating the base environment.
pub fn update_base_args() -> Vec<String> {
    ["update", "-y", "-n", "base", "--all"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Program and arguments running `installer` unattended into `prefix`.
pub fn installer_invocation(platform: Platform, installer: &Path, prefix: &Path) -> (String, Vec<String>) {
    let installer = installer.display().to_string();
    if platform.is_windows() {
        (installer, windows_installer_args(prefix))
    } else {
        let mut args = vec![installer];
        args.extend(unix_installer_args(prefix));
        ("bash".to_string(), args)
    }
}

/// Batch-mode arguments for the `.sh` installer.
fn unix_installer_args(prefix: &Path) -> Vec<String> {
    vec![
        "-b".to_string(),
        "-f".to_string(),
        "-p".to_string(),
        prefix.display().to_string(),
    ]
}

/// Silent-mode arguments for the `.exe` installer. `/D=` must come last.
fn windows_installer_args(prefix: &Path) -> Vec<String> {
    vec![
        "/InstallationType=JustMe".to_string(),
        "/RegisterPython=0".to_string(),
        "/AddToPath=0".to_string(),
        "/S".to_string(),
        format!("/D={}", prefix.display()),
    ]
}

fn join<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|s| s.as_ref())
        .collect::<Vec<_>>()
        .join(" ")
}
