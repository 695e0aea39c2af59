//! Environment Validation
//!
//! Collects every problem in an environment file before anything is
//! downloaded, so a bad file fails fast with one readable report.

use log::{debug, warn};

use crate::error::{InstallerError, InstallerResult};

use super::model::EnvironmentSpec;

/// URL schemes pip accepts for package indexes.
const INDEX_SCHEMES: &[&str] = &["https://", "http://", "file://"];

/// Validation error types for user-friendly error messages.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    EmptyPackageList { manager: &'static str, index: usize },
    BlankPackageName { manager: &'static str, index: usize },
    EmptyChannel(usize),
    InvalidIndexUrl { index: usize, url: String },
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyPackageList { manager, index } => {
                write!(f, "{} request #{} lists no packages", manager, index + 1)
            }
            Self::BlankPackageName { manager, index } => {
                write!(f, "{} request #{} contains a blank package name", manager, index + 1)
            }
            Self::EmptyChannel(index) => {
                write!(f, "conda request #{} has no channel", index + 1)
            }
            Self::InvalidIndexUrl { index, url } => write!(
                f,
                "pip request #{}: '{}' is not an http(s) or file URL",
                index + 1,
                url
            ),
        }
    }
}

/// Checks a single index URL.
fn is_valid_index_url(url: &str) -> bool {
    INDEX_SCHEMES
        .iter()
        .any(|scheme| url.len() > scheme.len() && url.to_ascii_lowercase().starts_with(scheme))
}

/// Returns every validation problem in the environment.
pub fn collect_errors(spec: &EnvironmentSpec) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for (index, request) in spec.pip.iter().enumerate() {
        if request.packages.is_empty() {
            errors.push(ValidationError::EmptyPackageList { manager: "pip", index });
        } else if request.packages.iter().any(|p| p.trim().is_empty()) {
            errors.push(ValidationError::BlankPackageName { manager: "pip", index });
        }

        let urls = request.index_url.iter().chain(request.extra_index_url.iter());
        for url in urls {
            if !is_valid_index_url(url.trim()) {
                errors.push(ValidationError::InvalidIndexUrl {
                    index,
                    url: url.clone(),
                });
            }
        }
    }

    for (index, request) in spec.conda.iter().enumerate() {
        if request.channel.trim().is_empty() {
            errors.push(ValidationError::EmptyChannel(index));
        }
        if request.packages.is_empty() {
            errors.push(ValidationError::EmptyPackageList { manager: "conda", index });
        } else if request.packages.iter().any(|p| p.trim().is_empty()) {
            errors.push(ValidationError::BlankPackageName { manager: "conda", index });
        }
    }

    errors
}

/// Validates an environment, joining all problems into one error.
pub fn validate_environment(spec: &EnvironmentSpec) -> InstallerResult<()> {
    let errors = collect_errors(spec);

    if errors.is_empty() {
        if spec.is_empty() && !spec.update_base {
            warn!("Environment requests no packages and no base update");
        }
        debug!("Environment validated");
        return Ok(());
    }

    for error in &errors {
        warn!("{}", error);
    }

    let message = errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ");
    Err(InstallerError::InvalidEnvironment(message))
}
