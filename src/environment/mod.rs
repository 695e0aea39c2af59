//! Environment Module
//!
//! Declarative environment files and the record of what was installed.
//!
//! - [`model`]: YAML environment model and loading
//! - [`validator`]: environment validation
//! - [`record`]: install record persisted inside the prefix

pub mod model;
pub mod record;
pub mod validator;

pub use model::{load_environment, CondaRequest, EnvironmentSpec, PipRequest};
pub use record::{InstallRecord, RECORD_FILE};
pub use validator::{validate_environment, ValidationError};
