//! Installer Configuration
//!
//! Host platform detection and the Miniconda download location.
//!
//! The process-wide [`CONFIG`] is resolved once from the host and the
//! following environment variables:
//!
//! - `MCINSTALL_BASE_URL`: mirror serving Miniconda installers
//!   (default: `https://repo.anaconda.com/miniconda`)
//! - `MCINSTALL_VERSION`: installer release, e.g. `py311_24.1.2-0`
//!   (default: `latest`)

pub mod platform;

use log::{debug, warn};
use once_cell::sync::Lazy;
use serde::Serialize;
use sysinfo::System;

use crate::error::{InstallerError, InstallerResult};

pub use platform::{Architecture, OperatingSystem, Platform};

/// Default location of the Miniconda installers.
pub const DEFAULT_BASE_URL: &str = "https://repo.anaconda.com/miniconda";

/// Default Miniconda release.
pub const DEFAULT_VERSION: &str = "latest";

/// Environment variable overriding the download base URL.
pub const BASE_URL_ENV: &str = "MCINSTALL_BASE_URL";

/// Environment variable overriding the Miniconda release.
pub const VERSION_ENV: &str = "MCINSTALL_VERSION";

/// Lazily-initialized configuration for the current host.
pub static CONFIG: Lazy<Config> = Lazy::new(Config::detect);

/// Read-only configuration mapping consumed by the installer.
///
/// Serializes to JSON for diagnostics (`mcinstall config`).
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Operating system name (`linux`, `macos`, `windows`, ...)
    pub system: String,

    /// Machine hardware name in `uname -m` style
    pub machine: String,

    /// Human-readable OS version, when the host reports one
    pub os_version: Option<String>,

    /// Base URL the installer is downloaded from
    pub base_url: String,

    /// Miniconda release
    pub version: String,

    /// Miniconda platform label, absent on unsupported hosts
    pub platform: Option<Platform>,

    /// Installer file name for this platform and release
    pub installer_name: Option<String>,

    /// Full download URL of the installer
    pub installer_url: Option<String>,
}

impl Config {
    /// Detects the host platform and applies environment overrides.
    pub fn detect() -> Self {
        let base_url = std::env::var(BASE_URL_ENV).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let version = std::env::var(VERSION_ENV).unwrap_or_else(|_| DEFAULT_VERSION.to_string());

        let mut config = Self::for_host(
            std::env::consts::OS,
            std::env::consts::ARCH,
            &base_url,
            &version,
        );
        config.os_version = System::long_os_version();

        match &config.installer_url {
            Some(url) => debug!("Miniconda installer URL: {}", url),
            None => warn!(
                "No Miniconda installer is published for {}/{}",
                config.system, config.machine
            ),
        }

        config
    }

    /// Builds a configuration for an explicit OS / architecture pair.
    pub fn for_host(system: &str, arch: &str, base_url: &str, version: &str) -> Self {
        let platform = Platform::from_names(system, arch).ok();
        let machine = platform
            .map(|p| p.arch_label().to_string())
            .unwrap_or_else(|| arch.to_string());

        let mut config = Self {
            system: system.to_string(),
            machine,
            os_version: None,
            base_url: base_url.trim_end_matches('/').to_string(),
            version: version.to_string(),
            platform,
            installer_name: None,
            installer_url: None,
        };
        config.derive_installer();
        config
    }

    /// Returns a copy pointing at a different download mirror.
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self.derive_installer();
        self
    }

    /// Returns a copy pinned to a different Miniconda release.
    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self.derive_installer();
        self
    }

    /// Returns the platform, or an error on unsupported hosts.
    pub fn require_platform(&self) -> InstallerResult<Platform> {
        self.platform.ok_or_else(|| InstallerError::UnsupportedPlatform {
            os: self.system.clone(),
            arch: self.machine.clone(),
        })
    }

    /// Returns the installer download URL, or an error on unsupported hosts.
    pub fn require_installer_url(&self) -> InstallerResult<&str> {
        self.require_platform()?;
        self.installer_url
            .as_deref()
            .ok_or_else(|| InstallerError::UnsupportedPlatform {
                os: self.system.clone(),
                arch: self.machine.clone(),
            })
    }

    /// Pretty-printed JSON form of the configuration.
    pub fn to_json(&self) -> InstallerResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    fn derive_installer(&mut self) {
        self.installer_name = self.platform.map(|p| p.installer_name(&self.version));
        self.installer_url = self
            .installer_name
            .as_ref()
            .map(|name| format!("{}/{}", self.base_url, name));
    }
}
