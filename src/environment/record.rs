//! Install Record
//!
//! Summary of a provisioning run, stored as `.mcinstall.json` at the root
//! of the prefix so later runs and users can see what was installed from
//! where.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::{InstallerError, InstallerResult};

use super::model::{CondaRequest, PipRequest};

/// File name of the record inside the prefix.
pub const RECORD_FILE: &str = ".mcinstall.json";

/// Persistent summary of what was installed into a prefix.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct InstallRecord {
    /// Prefix the record belongs to
    pub prefix: PathBuf,

    /// Miniconda platform label, e.g. `Linux-x86_64`
    pub platform: String,

    /// URL the installer was downloaded from
    pub installer_url: String,

    /// SHA-256 of the downloaded installer
    pub installer_sha256: Option<String>,

    /// When the installer finished
    pub installed_at: DateTime<Utc>,

    /// When the base environment was last updated
    pub base_updated_at: Option<DateTime<Utc>>,

    /// pip requests applied, in order
    #[serde(default)]
    pub pip: Vec<PipRequest>,

    /// conda requests applied, in order
    #[serde(default)]
    pub conda: Vec<CondaRequest>,

    /// Last time the record was written
    pub updated_at: DateTime<Utc>,
}

impl InstallRecord {
    /// Creates a record for a freshly installed prefix.
    pub fn new(prefix: impl Into<PathBuf>, platform: &str, installer_url: &str) -> Self {
        let now = Utc::now();
        Self {
            prefix: prefix.into(),
            platform: platform.to_string(),
            installer_url: installer_url.to_string(),
            installer_sha256: None,
            installed_at: now,
            base_updated_at: None,
            pip: Vec::new(),
            conda: Vec::new(),
            updated_at: now,
        }
    }

    /// Path of the record file for a prefix.
    pub fn path_for(prefix: &Path) -> PathBuf {
        prefix.join(RECORD_FILE)
    }

    /// Marks the base environment as updated now.
    pub fn mark_base_updated(&mut self) {
        let now = Utc::now();
        self.base_updated_at = Some(now);
        self.updated_at = now;
    }

    /// Records an applied pip request.
    pub fn add_pip(&mut self, request: PipRequest) {
        self.pip.push(request);
        self.updated_at = Utc::now();
    }

    /// Records an applied conda request.
    pub fn add_conda(&mut self, request: CondaRequest) {
        self.conda.push(request);
        self.updated_at = Utc::now();
    }

    /// Writes the record into its prefix.
    pub fn save(&self) -> InstallerResult<PathBuf> {
        let path = Self::path_for(&self.prefix);
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json).map_err(|e| InstallerError::io(&path, e))?;

        info!("Saved install record to {}", path.display());
        Ok(path)
    }

    /// Loads the record stored in a prefix.
    pub fn load(prefix: &Path) -> InstallerResult<Self> {
        let path = Self::path_for(prefix);
        let content = fs::read_to_string(&path).map_err(|e| InstallerError::io(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}
