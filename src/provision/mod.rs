//! Provisioning Module
//!
//! Turns an environment file into a ready-to-use Miniconda prefix.
//!
//! - [`provisioner`]: phase sequencing, timing and the install record

pub mod provisioner;

pub use provisioner::Provisioner;
