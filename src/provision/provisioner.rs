//! Environment Provisioner
//!
//! Sequences the installer operations for an [`EnvironmentSpec`]:
//!
//! 1. Free disk space check
//! 2. Installer download
//! 3. Batch installation into the prefix
//! 4. Base environment update (optional)
//! 5. pip requests, in order
//! 6. conda requests, in order
//! 7. Install record written into the prefix
//!
//! The first failing phase stops the run. Nothing is cleaned up on failure;
//! the prefix belongs to the caller.

use std::path::Path;

use log::{error, info};

use crate::environment::{validate_environment, EnvironmentSpec, InstallRecord};
use crate::error::InstallerResult;
use crate::installer::miniconda::{
    conda_install_args, installer_invocation, pip_install_args, update_base_args,
};
use crate::installer::MinicondaInstaller;
use crate::monitoring::{ensure_free_space, PhaseTimeline, DEFAULT_MIN_FREE_MB};

/// Runs a full provisioning sequence with one installer.
///
/// # Example
///
/// ```rust,no_run
/// use mcinstall::environment::load_environment;
/// use mcinstall::{MinicondaInstaller, Provisioner};
///
/// fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let env = load_environment("environment.yaml")?;
///     let mut provisioner = Provisioner::new(MinicondaInstaller::new("/opt/envs/geo", false));
///     let record = provisioner.run(&env)?;
///     println!("{}", provisioner.timeline().summary());
///     println!("Installed from {}", record.installer_url);
///     Ok(())
/// }
/// ```
pub struct Provisioner {
    installer: MinicondaInstaller,
    timeline: PhaseTimeline,
    min_free_mb: u64,
}

impl Provisioner {
    /// Creates a provisioner around an installer.
    pub fn new(installer: MinicondaInstaller) -> Self {
        Self {
            installer,
            timeline: PhaseTimeline::new(),
            min_free_mb: DEFAULT_MIN_FREE_MB,
        }
    }

    /// Sets the free disk space required before downloading (0 disables the check).
    pub fn set_min_free_mb(&mut self, min_free_mb: u64) {
        self.min_free_mb = min_free_mb;
    }

    /// The wrapped installer.
    pub fn installer(&self) -> &MinicondaInstaller {
        &self.installer
    }

    /// Phase timing of the last run.
    pub fn timeline(&self) -> &PhaseTimeline {
        &self.timeline
    }

    /// Describes the commands a run would execute, without running them.
    pub fn plan(&self, spec: &EnvironmentSpec) -> InstallerResult<Vec<String>> {
        validate_environment(spec)?;

        let config = self.installer.config();
        let url = config.require_installer_url()?;
        let platform = config.require_platform()?;
        let python = self.installer.python_path().display().to_string();
        let conda = self.installer.conda_path().display().to_string();
        let installer_name = config.installer_name.clone().unwrap_or_default();

        let mut steps = vec![format!("download {}", url)];

        let (program, args) = installer_invocation(
            platform,
            Path::new(&installer_name),
            self.installer.prefix(),
        );
        steps.push(format!("{} {}", program, args.join(" ")));

        if spec.update_base {
            steps.push(format!("{} {}", conda, update_base_args().join(" ")));
        }

        for request in &spec.pip {
            let extra = request.extra_index_url_list();
            let args = pip_install_args(
                &request.packages,
                request.index_url.as_deref(),
                extra.as_deref(),
            );
            steps.push(format!("{} {}", python, args.join(" ")));
        }

        for request in &spec.conda {
            let args = conda_install_args(&request.channel, &request.packages);
            steps.push(format!("{} {}", conda, args.join(" ")));
        }

        Ok(steps)
    }

    /// Provisions the prefix and returns the saved install record.
    pub fn run(&mut self, spec: &EnvironmentSpec) -> InstallerResult<InstallRecord> {
        validate_environment(spec)?;
        self.timeline = PhaseTimeline::new();

        let prefix = self.installer.prefix().to_path_buf();
        let url = self.installer.config().require_installer_url()?.to_string();
        let platform = self.installer.config().require_platform()?.to_string();

        match &spec.name {
            Some(name) => info!("Provisioning '{}' into {}", name, prefix.display()),
            None => info!("Provisioning {}", prefix.display()),
        }

        let min_free_mb = self.min_free_mb;
        self.phase("disk-check", |_| ensure_free_space(&prefix, min_free_mb))?;
        self.phase("download", |mci| mci.download().map(|_| ()))?;
        self.phase("install", |mci| mci.install_miniconda())?;

        let mut record = InstallRecord::new(&prefix, &platform, &url);
        record.installer_sha256 = self.installer.installer_sha256().map(str::to_string);

        if spec.update_base {
            self.phase("update-base", |mci| mci.update_miniconda_base())?;
            record.mark_base_updated();
        }

        for (i, request) in spec.pip.iter().enumerate() {
            let extra = request.extra_index_url_list();
            self.phase(&format!("pip #{}", i + 1), |mci| {
                mci.install_pip(
                    &request.packages,
                    request.index_url.as_deref(),
                    extra.as_deref(),
                )
            })?;
            record.add_pip(request.clone());
        }

        for (i, request) in spec.conda.iter().enumerate() {
            self.phase(&format!("conda #{}", i + 1), |mci| {
                mci.install_conda(&request.channel, &request.packages)
            })?;
            record.add_conda(request.clone());
        }

        record.save()?;

        info!(
            "Provisioned {} in {}",
            prefix.display(),
            crate::monitoring::format_duration(self.timeline.elapsed())
        );
        Ok(record)
    }

    /// Runs one phase, recording its outcome in the timeline.
    fn phase<T>(
        &mut self,
        name: &str,
        f: impl FnOnce(&mut MinicondaInstaller) -> InstallerResult<T>,
    ) -> InstallerResult<T> {
        self.timeline.start(name);

        match f(&mut self.installer) {
            Ok(value) => {
                self.timeline.complete(name);
                Ok(value)
            }
            Err(e) => {
                self.timeline.fail(name);
                error!("Phase '{}' failed: {}", name, e);
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DEFAULT_BASE_URL, DEFAULT_VERSION};
    use crate::environment::{CondaRequest, PipRequest, RECORD_FILE};
    use crate::error::InstallerError;
    use crate::monitoring::PhaseStatus;
    use tempfile::tempdir;

    fn provisioner_for(config: Config, prefix: &std::path::Path) -> Provisioner {
        let mut provisioner = Provisioner::new(MinicondaInstaller::with_config(prefix, false, config));
        provisioner.set_min_free_mb(0);
        provisioner
    }

    fn linux_config() -> Config {
        Config::for_host("linux", "x86_64", DEFAULT_BASE_URL, DEFAULT_VERSION)
    }

    #[test]
    fn test_plan_lists_every_step() {
        let spec = EnvironmentSpec::new()
            .with_pip(
                PipRequest::new(&["pypi_pkg_test"])
                    .with_index_url("https://test.pypi.org/simpletest/")
                    .with_extra_index_urls("https://test.pypi.org/simple/"),
            )
            .with_conda(CondaRequest::new("conda-forge", &["pyyaml"]));

        let provisioner = provisioner_for(linux_config(), std::path::Path::new("/opt/mc"));
        let plan = provisioner.plan(&spec).unwrap();

        assert_eq!(plan.len(), 5);
        assert!(plan[0].ends_with("Miniconda3-latest-Linux-x86_64.sh"));
        assert_eq!(plan[1], "bash Miniconda3-latest-Linux-x86_64.sh -b -f -p /opt/mc");
        assert_eq!(plan[2], "/opt/mc/bin/conda update -y -n base --all");
        assert!(plan[3].contains("--index-url https://test.pypi.org/simpletest/"));
        assert!(plan[3].contains("--extra-index-url https://test.pypi.org/simple/"));
        assert_eq!(plan[4], "/opt/mc/bin/conda install -y -c conda-forge pyyaml");
    }

    #[test]
    fn test_plan_without_base_update() {
        let spec = EnvironmentSpec::new()
            .with_update_base(false)
            .with_pip(PipRequest::new(&["geopy"]));

        let provisioner = provisioner_for(linux_config(), std::path::Path::new("/opt/mc"));
        let plan = provisioner.plan(&spec).unwrap();

        assert_eq!(plan.len(), 3);
        assert_eq!(plan[2], "/opt/mc/bin/python -m pip install geopy");
    }

    #[test]
    fn test_plan_windows_installer_flags() {
        let config = Config::for_host("windows", "x86_64", DEFAULT_BASE_URL, DEFAULT_VERSION);
        let spec = EnvironmentSpec::new().with_update_base(false);

        let provisioner = provisioner_for(config, std::path::Path::new("C:/mc"));
        let plan = provisioner.plan(&spec).unwrap();

        assert_eq!(plan.len(), 2);
        assert_eq!(
            plan[1],
            "Miniconda3-latest-Windows-x86_64.exe /InstallationType=JustMe /RegisterPython=0 /AddToPath=0 /S /D=C:/mc"
        );
    }

    #[test]
    fn test_plan_rejects_invalid_environment() {
        let spec = EnvironmentSpec::new().with_conda(CondaRequest::new("", &["pyyaml"]));
        let provisioner = provisioner_for(linux_config(), std::path::Path::new("/opt/mc"));
        assert!(matches!(
            provisioner.plan(&spec),
            Err(InstallerError::InvalidEnvironment(_))
        ));
    }

    #[test]
    fn test_run_unsupported_platform() {
        let dir = tempdir().unwrap();
        let config = Config::for_host("freebsd", "x86_64", DEFAULT_BASE_URL, DEFAULT_VERSION);
        let mut provisioner = provisioner_for(config, dir.path());

        let result = provisioner.run(&EnvironmentSpec::new());
        assert!(matches!(result, Err(InstallerError::UnsupportedPlatform { .. })));
    }

    #[test]
    fn test_run_records_failed_download() {
        let mirror = tempdir().unwrap();
        let base_url = format!("file://{}", mirror.path().display());
        let target = tempdir().unwrap();
        let mut provisioner =
            provisioner_for(linux_config().with_base_url(&base_url), &target.path().join("env"));

        let result = provisioner.run(&EnvironmentSpec::new());
        assert!(result.is_err());

        let failed = provisioner.timeline().failed_phase().unwrap();
        assert_eq!(failed.name, "download");
        assert_eq!(provisioner.timeline().phases()[0].status, PhaseStatus::Completed);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_with_fake_distribution() {
        // Stand-in installer producing bin/python and bin/conda that accept anything
        let script = "#!/bin/bash\n\
            while [ $# -gt 0 ]; do\n\
              case \"$1\" in -p) PREFIX=\"$2\"; shift;; esac; shift\n\
            done\n\
            mkdir -p \"$PREFIX/bin\"\n\
            for tool in python conda; do\n\
              printf '#!/bin/sh\\nexit 0\\n' > \"$PREFIX/bin/$tool\"\n\
              chmod +x \"$PREFIX/bin/$tool\"\n\
            done\n";

        let mirror = tempdir().unwrap();
        std::fs::write(mirror.path().join("Miniconda3-latest-Linux-x86_64.sh"), script).unwrap();
        let base_url = format!("file://{}", mirror.path().display());

        let target = tempdir().unwrap();
        let prefix = target.path().join("env");
        let mut provisioner = provisioner_for(linux_config().with_base_url(&base_url), &prefix);

        let spec = EnvironmentSpec::new()
            .with_pip(PipRequest::new(&["geopy"]))
            .with_conda(CondaRequest::new("conda-forge", &["pyyaml"]));

        let record = provisioner.run(&spec).unwrap();

        assert!(prefix.join(RECORD_FILE).exists());
        assert!(record.base_updated_at.is_some());
        assert_eq!(record.pip.len(), 1);
        assert_eq!(record.conda.len(), 1);
        assert_eq!(record.platform, "Linux-x86_64");
        assert!(provisioner.timeline().failed_phase().is_none());

        let names: Vec<_> = provisioner
            .timeline()
            .phases()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["disk-check", "download", "install", "update-base", "pip #1", "conda #1"]
        );

        let loaded = InstallRecord::load(&prefix).unwrap();
        assert_eq!(loaded, record);
    }

    #[cfg(unix)]
    #[test]
    fn test_run_stops_at_failing_pip() {
        let script = "#!/bin/bash\n\
            while [ $# -gt 0 ]; do\n\
              case \"$1\" in -p) PREFIX=\"$2\"; shift;; esac; shift\n\
            done\n\
            mkdir -p \"$PREFIX/bin\"\n\
            printf '#!/bin/sh\\necho no such package >&2\\nexit 1\\n' > \"$PREFIX/bin/python\"\n\
            printf '#!/bin/sh\\nexit 0\\n' > \"$PREFIX/bin/conda\"\n\
            chmod +x \"$PREFIX/bin/python\" \"$PREFIX/bin/conda\"\n";

        let mirror = tempdir().unwrap();
        std::fs::write(mirror.path().join("Miniconda3-latest-Linux-x86_64.sh"), script).unwrap();
        let base_url = format!("file://{}", mirror.path().display());

        let target = tempdir().unwrap();
        let prefix = target.path().join("env");
        let mut provisioner = provisioner_for(linux_config().with_base_url(&base_url), &prefix);

        let spec = EnvironmentSpec::new()
            .with_update_base(false)
            .with_pip(PipRequest::new(&["definitely-missing"]))
            .with_conda(CondaRequest::new("conda-forge", &["pyyaml"]));

        let err = provisioner.run(&spec).unwrap_err();
        match err {
            InstallerError::CommandFailed { code, stderr, .. } => {
                assert_eq!(code, Some(1));
                assert_eq!(stderr, "no such package");
            }
            other => panic!("unexpected error: {}", other),
        }

        assert_eq!(provisioner.timeline().failed_phase().unwrap().name, "pip #1");
        assert!(!prefix.join(RECORD_FILE).exists());
    }
}
