//! Platform Detection
//!
//! Maps the host operating system and CPU architecture onto the naming
//! used by the Miniconda distribution (`Linux-x86_64`, `MacOSX-arm64`, ...).

use std::fmt;

use serde::{Serialize, Serializer};

use crate::error::{InstallerError, InstallerResult};

/// Operating systems with a published Miniconda installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperatingSystem {
    Linux,
    MacOs,
    Windows,
}

impl OperatingSystem {
    /// Parses a `std::env::consts::OS` style name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "linux" => Some(Self::Linux),
            "macos" => Some(Self::MacOs),
            "windows" => Some(Self::Windows),
            _ => None,
        }
    }

    /// Label used in installer file names.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Linux => "Linux",
            Self::MacOs => "MacOSX",
            Self::Windows => "Windows",
        }
    }

    /// Installer file extension.
    pub fn installer_extension(&self) -> &'static str {
        match self {
            Self::Windows => "exe",
            _ => "sh",
        }
    }
}

/// CPU architectures with a published Miniconda installer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    X86_64,
    Aarch64,
    Ppc64le,
    S390x,
}

impl Architecture {
    /// Parses either a `std::env::consts::ARCH` name or a `uname -m` name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "x86_64" | "amd64" => Some(Self::X86_64),
            "aarch64" | "arm64" => Some(Self::Aarch64),
            "powerpc64" | "ppc64le" => Some(Self::Ppc64le),
            "s390x" => Some(Self::S390x),
            _ => None,
        }
    }

    /// Machine name as reported by `uname -m` on Linux.
    pub fn machine(&self) -> &'static str {
        match self {
            Self::X86_64 => "x86_64",
            Self::Aarch64 => "aarch64",
            Self::Ppc64le => "ppc64le",
            Self::S390x => "s390x",
        }
    }
}

/// A supported operating system / architecture pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Platform {
    pub os: OperatingSystem,
    pub arch: Architecture,
}

impl Platform {
    /// Builds a platform from OS and architecture names, rejecting
    /// combinations Miniconda does not publish installers for.
    pub fn from_names(os: &str, arch: &str) -> InstallerResult<Self> {
        let unsupported = || InstallerError::UnsupportedPlatform {
            os: os.to_string(),
            arch: arch.to_string(),
        };

        let os_kind = OperatingSystem::from_name(os).ok_or_else(unsupported)?;
        let arch_kind = Architecture::from_name(arch).ok_or_else(unsupported)?;

        let supported = match os_kind {
            OperatingSystem::Linux => true,
            OperatingSystem::MacOs => {
                matches!(arch_kind, Architecture::X86_64 | Architecture::Aarch64)
            }
            OperatingSystem::Windows => arch_kind == Architecture::X86_64,
        };

        if !supported {
            return Err(unsupported());
        }

        Ok(Self {
            os: os_kind,
            arch: arch_kind,
        })
    }

    /// Architecture label used in installer file names.
    ///
    /// Apple Silicon installers are published as `arm64`, Linux ones as `aarch64`.
    pub fn arch_label(&self) -> &'static str {
        match (self.os, self.arch) {
            (OperatingSystem::MacOs, Architecture::Aarch64) => "arm64",
            (_, arch) => arch.machine(),
        }
    }

    /// Returns the installer file name for a Miniconda release.
    pub fn installer_name(&self, version: &str) -> String {
        format!(
            "Miniconda3-{}-{}.{}",
            version,
            self,
            self.os.installer_extension()
        )
    }

    /// True when the installed tree uses the Windows layout.
    pub fn is_windows(&self) -> bool {
        self.os == OperatingSystem::Windows
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.os.label(), self.arch_label())
    }
}

impl Serialize for Platform {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
