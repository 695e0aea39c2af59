//! Environment File Model
//!
//! Declarative description of the packages to layer on top of a fresh
//! Miniconda installation.
//!
//! # Example YAML Format
//!
//! ```yaml
//! name: geodata
//! update_base: true
//!
//! pip:
//!   - packages: geopy
//!
//!   - packages:
//!       - pypi_pkg_test
//!     index_url: https://test.pypi.org/simpletest/
//!     extra_index_url:
//!       - https://test.pypi.org/simpletest1/
//!       - https://test.pypi.org/simple/
//!
//! conda:
//!   - channel: conda-forge
//!     packages: [pyyaml]
//! ```

use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{InstallerError, InstallerResult};
use crate::installer::split_index_urls;

use super::validator::validate_environment;

/// Packages and indexes to provision into a Miniconda prefix.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnvironmentSpec {
    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Whether to update the base environment before installing packages
    #[serde(default = "default_update_base")]
    pub update_base: bool,

    /// pip installations, applied in order
    #[serde(default)]
    pub pip: Vec<PipRequest>,

    /// conda installations, applied in order after pip
    #[serde(default)]
    pub conda: Vec<CondaRequest>,
}

/// A single `pip install` invocation.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PipRequest {
    /// Requirement specifiers passed through to pip unchanged
    #[serde(deserialize_with = "single_or_vec")]
    pub packages: Vec<String>,

    /// Replacement for the primary package index
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_url: Option<String>,

    /// Supplementary package indexes
    #[serde(
        deserialize_with = "index_url_list",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub extra_index_url: Vec<String>,
}

/// A single `conda install` invocation from one channel.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CondaRequest {
    /// Channel to install from (e.g. `conda-forge`)
    pub channel: String,

    /// Package specifications
    #[serde(deserialize_with = "single_or_vec")]
    pub packages: Vec<String>,
}

fn default_update_base() -> bool {
    true
}

/// Deserializes either a single string or array of strings into Vec<String>.
fn single_or_vec<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let val = Value::deserialize(deserializer)?;
    match val {
        Value::Null => Ok(Vec::new()),
        Value::String(s) => Ok(vec![s.trim().to_string()]),
        Value::Array(arr) => arr
            .into_iter()
            .map(|v| match v {
                Value::String(s) => Ok(s.trim().to_string()),
                _ => Err(de::Error::custom("Expected string in array")),
            })
            .collect(),
        _ => Err(de::Error::custom("Expected string or array of strings")),
    }
}

/// Index URLs as a list, or as one comma and/or whitespace separated string.
fn index_url_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let entries = single_or_vec(deserializer)?;
    Ok(entries
        .iter()
        .flat_map(|entry| split_index_urls(entry))
        .collect())
}

impl EnvironmentSpec {
    /// Creates an empty environment that only updates the base.
    pub fn new() -> Self {
        Self {
            name: None,
            update_base: true,
            pip: Vec::new(),
            conda: Vec::new(),
        }
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Enables or disables the base environment update.
    pub fn with_update_base(mut self, update_base: bool) -> Self {
        self.update_base = update_base;
        self
    }

    /// Appends a pip installation.
    pub fn with_pip(mut self, request: PipRequest) -> Self {
        self.pip.push(request);
        self
    }

    /// Appends a conda installation.
    pub fn with_conda(mut self, request: CondaRequest) -> Self {
        self.conda.push(request);
        self
    }

    /// True when no packages are requested.
    pub fn is_empty(&self) -> bool {
        self.pip.is_empty() && self.conda.is_empty()
    }

    /// Total number of requested packages.
    pub fn package_count(&self) -> usize {
        self.pip.iter().map(|r| r.packages.len()).sum::<usize>()
            + self.conda.iter().map(|r| r.packages.len()).sum::<usize>()
    }

    /// Parses and validates an environment from YAML text.
    pub fn from_yaml(yaml: &str) -> InstallerResult<Self> {
        let spec: EnvironmentSpec = serde_yaml::from_str(yaml)?;
        validate_environment(&spec)?;
        Ok(spec)
    }

    /// Serializes the environment back to YAML.
    pub fn to_yaml(&self) -> InstallerResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

impl Default for EnvironmentSpec {
    fn default() -> Self {
        Self::new()
    }
}

impl PipRequest {
    /// Creates a request against the default index.
    pub fn new<S: AsRef<str>>(packages: &[S]) -> Self {
        Self {
            packages: packages.iter().map(|p| p.as_ref().to_string()).collect(),
            index_url: None,
            extra_index_url: Vec::new(),
        }
    }

    /// Replaces the primary index.
    pub fn with_index_url(mut self, url: impl Into<String>) -> Self {
        self.index_url = Some(url.into());
        self
    }

    /// Adds supplementary indexes from a comma and/or whitespace separated list.
    pub fn with_extra_index_urls(mut self, urls: &str) -> Self {
        self.extra_index_url.extend(split_index_urls(urls));
        self
    }

    /// Extra indexes joined the way the installer accepts them.
    pub fn extra_index_url_list(&self) -> Option<String> {
        if self.extra_index_url.is_empty() {
            None
        } else {
            Some(self.extra_index_url.join(","))
        }
    }
}

impl CondaRequest {
    /// Creates a request for packages from `channel`.
    pub fn new<S: AsRef<str>>(channel: impl Into<String>, packages: &[S]) -> Self {
        Self {
            channel: channel.into(),
            packages: packages.iter().map(|p| p.as_ref().to_string()).collect(),
        }
    }
}

/// Loads an environment from a YAML file.
///
/// # Example
///
/// ```rust,no_run
/// use mcinstall::environment::load_environment;
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let env = load_environment("environment.yaml")?;
///     println!("{} packages requested", env.package_count());
///     Ok(())
/// }
/// ```
pub fn load_environment(path: impl AsRef<Path>) -> InstallerResult<EnvironmentSpec> {
    let path = path.as_ref();
    info!("Loading environment from: {}", path.display());

    let yaml_content = fs::read_to_string(path).map_err(|e| InstallerError::io(path, e))?;
    debug!("YAML content loaded ({} bytes)", yaml_content.len());

    let spec = EnvironmentSpec::from_yaml(&yaml_content)?;

    info!(
        "Parsed {} pip and {} conda requests ({} packages)",
        spec.pip.len(),
        spec.conda.len(),
        spec.package_count()
    );

    Ok(spec)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_parse_full_environment() {
        let yaml = r#"
name: geodata
pip:
  - packages: geopy
  - packages:
      - pypi_pkg_test
    index_url: https://test.pypi.org/simpletest/
    extra_index_url:
      - https://test.pypi.org/simpletest1/
      - https://test.pypi.org/simple/
conda:
  - channel: conda-forge
    packages: [pyyaml]
"#;
        let spec = EnvironmentSpec::from_yaml(yaml).unwrap();

        assert_eq!(spec.name.as_deref(), Some("geodata"));
        assert!(spec.update_base);
        assert_eq!(spec.pip.len(), 2);
        assert_eq!(spec.pip[0].packages, vec!["geopy"]);
        assert_eq!(spec.pip[1].extra_index_url.len(), 2);
        assert_eq!(spec.conda[0].channel, "conda-forge");
        assert_eq!(spec.package_count(), 3);
    }

    #[test]
    fn test_single_package_string_kept_whole() {
        let spec = EnvironmentSpec::from_yaml("pip:\n  - packages: \"numpy>=1.26,<2\"\n").unwrap();
        assert_eq!(spec.pip[0].packages, vec!["numpy>=1.26,<2"]);

        let args = crate::installer::miniconda::pip_install_args(&spec.pip[0].packages, None, None);
        assert_eq!(args, vec!["-m", "pip", "install", "numpy>=1.26,<2"]);
    }

    #[test]
    fn test_extra_index_url_string_is_split() {
        let yaml = r#"
pip:
  - packages: geopy
    extra_index_url: "https://a.example/simple/, https://b.example/simple/ https://c.example/simple/"
"#;
        let spec = EnvironmentSpec::from_yaml(yaml).unwrap();
        assert_eq!(
            spec.pip[0].extra_index_url,
            vec![
                "https://a.example/simple/",
                "https://b.example/simple/",
                "https://c.example/simple/",
            ]
        );
        assert_eq!(
            spec.pip[0].extra_index_url,
            split_index_urls("https://a.example/simple/,https://b.example/simple/ https://c.example/simple/")
        );
    }

    #[test]
    fn test_update_base_can_be_disabled() {
        let spec = EnvironmentSpec::from_yaml("update_base: false\n").unwrap();
        assert!(!spec.update_base);
        assert!(spec.is_empty());
    }

    #[test]
    fn test_missing_packages_is_parse_error() {
        let yaml = "conda:\n  - channel: conda-forge\n";
        assert!(matches!(
            EnvironmentSpec::from_yaml(yaml),
            Err(InstallerError::Yaml(_))
        ));
    }

    #[test]
    fn test_non_string_package_rejected() {
        let yaml = "pip:\n  - packages: [geopy, 3]\n";
        assert!(EnvironmentSpec::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_invalid_environment_rejected() {
        let yaml = "conda:\n  - channel: ''\n    packages: [pyyaml]\n";
        assert!(matches!(
            EnvironmentSpec::from_yaml(yaml),
            Err(InstallerError::InvalidEnvironment(_))
        ));
    }

    #[test]
    fn test_builder_and_yaml_roundtrip() {
        let spec = EnvironmentSpec::new()
            .with_name("demo")
            .with_update_base(false)
            .with_pip(
                PipRequest::new(&["pypi_pkg_test"])
                    .with_index_url("https://test.pypi.org/simpletest/")
                    .with_extra_index_urls("https://test.pypi.org/simple/"),
            )
            .with_conda(CondaRequest::new("conda-forge", &["pyyaml"]));

        let yaml = spec.to_yaml().unwrap();
        let parsed = EnvironmentSpec::from_yaml(&yaml).unwrap();
        assert_eq!(parsed, spec);
    }

    #[test]
    fn test_load_environment_from_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("environment.yaml");
        fs::write(&path, "pip:\n  - packages: [geopy]\n").unwrap();

        let spec = load_environment(&path).unwrap();
        assert_eq!(spec.pip[0].packages, vec!["geopy"]);
    }

    #[test]
    fn test_load_environment_missing_file() {
        let result = load_environment("/nonexistent/mcinstall/environment.yaml");
        assert!(matches!(result, Err(InstallerError::Io { .. })));
    }
}
