//! mcinstall CLI Entry Point
//!
//! Provides command-line interface for provisioning Miniconda environments.
//!
//! # Usage
//!
//! ```bash
//! # Show the detected platform and download URL
//! mcinstall config
//!
//! # Install Miniconda with a pip and a conda package
//! mcinstall install /opt/envs/geo --pip geopy --conda pyyaml
//!
//! # Use a custom pip index with fallbacks
//! mcinstall install /opt/envs/test --pip pypi_pkg_test \
//!     --index-url https://test.pypi.org/simpletest/ \
//!     --extra-index-url "https://test.pypi.org/simpletest1/, https://test.pypi.org/simple/"
//!
//! # Provision from an environment file
//! mcinstall provision environment.yaml /opt/envs/geo
//! ```

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use colored::Colorize;
use log::{error, info};

use mcinstall::environment::{load_environment, CondaRequest, EnvironmentSpec, PipRequest};
use mcinstall::monitoring::DEFAULT_MIN_FREE_MB;
use mcinstall::{MinicondaInstaller, Provisioner, APP_NAME, CONFIG, VERSION};

/// Channel used by `install --conda` when none is given.
const DEFAULT_CHANNEL: &str = "conda-forge";

/// Sub-command selected on the command line.
#[derive(Debug, PartialEq)]
enum CliCommand {
    ShowConfig,
    Install {
        prefix: PathBuf,
        pip: Vec<String>,
        conda: Vec<String>,
        channel: String,
        index_url: Option<String>,
        extra_index_url: Option<String>,
        update_base: bool,
    },
    Provision {
        env_file: PathBuf,
        prefix: PathBuf,
    },
}

/// Command-line configuration parsed from arguments.
#[derive(Debug)]
struct CliConfig {
    command: CliCommand,
    sha256: Option<String>,
    min_free_mb: u64,
    dry_run: bool,
    verbose: bool,
}

/// Configures the logging system with appropriate formatting.
fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format(|buf, record| {
            use std::io::Write;

            match record.level() {
                log::Level::Warn | log::Level::Error => {
                    writeln!(buf, "[{}] {}", record.level(), record.args())
                }
                _ => writeln!(buf, "{}", record.args()),
            }
        })
        .init();
}

/// Prints the application banner with version information.
fn print_banner() {
    println!();
    println!("{} v{}", APP_NAME, VERSION);
    println!("Miniconda Environment Provisioning");
    println!();
}

/// Prints usage information.
fn print_usage() {
    println!("Usage: mcinstall [OPTIONS] <COMMAND> [ARGS]");
    println!();
    println!("Commands:");
    println!("  config                        Show platform and download configuration as JSON");
    println!("  install <PREFIX>              Install Miniconda and packages into PREFIX");
    println!("  provision <ENV_FILE> <PREFIX> Provision PREFIX from a YAML environment file");
    println!();
    println!("Install options:");
    println!("  --pip PKG              pip package to install (repeatable)");
    println!("  --conda PKG            conda package to install (repeatable)");
    println!("  --channel NAME         conda channel (default: {})", DEFAULT_CHANNEL);
    println!("  --index-url URL        Primary pip index");
    println!("  --extra-index-url URLS Extra pip indexes, comma or space separated");
    println!("  --no-update            Skip updating the base environment");
    println!();
    println!("Options:");
    println!("  --sha256 HEX           Expected SHA-256 of the Miniconda installer");
    println!("  --min-free-mb N        Required free disk space (default: {})", DEFAULT_MIN_FREE_MB);
    println!("  --dry-run              Print the commands without running them");
    println!("  --verbose              Stream installer output and enable debug logging");
    println!("  --help                 Show this help message");
    println!("  --version              Show version information");
    println!();
    println!("Environment:");
    println!("  MCINSTALL_BASE_URL     Miniconda download mirror");
    println!("  MCINSTALL_VERSION      Miniconda release (default: latest)");
}

/// Returns the value following an option, advancing the cursor.
fn option_value(args: &[String], i: &mut usize, name: &str) -> Result<String, String> {
    *i += 1;
    args.get(*i)
        .cloned()
        .ok_or_else(|| format!("{} requires a value", name))
}

/// Parses command-line arguments into a CliConfig struct.
fn parse_arguments(args: &[String]) -> Result<CliConfig, String> {
    let mut positionals: Vec<String> = Vec::new();
    let mut pip = Vec::new();
    let mut conda = Vec::new();
    let mut channel = DEFAULT_CHANNEL.to_string();
    let mut index_url = None;
    let mut extra_index_url = None;
    let mut update_base = true;
    let mut sha256 = None;
    let mut min_free_mb = DEFAULT_MIN_FREE_MB;
    let mut dry_run = false;
    let mut verbose = false;
    let mut i = 1; // Skip program name

    while i < args.len() {
        let arg = &args[i];

        match arg.as_str() {
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "--version" | "-V" => {
                println!("{} {}", APP_NAME, VERSION);
                std::process::exit(0);
            }
            "--verbose" | "-v" => verbose = true,
            "--dry-run" => dry_run = true,
            "--no-update" => update_base = false,
            "--pip" => pip.push(option_value(args, &mut i, "--pip")?),
            "--conda" => conda.push(option_value(args, &mut i, "--conda")?),
            "--channel" | "-c" => channel = option_value(args, &mut i, "--channel")?,
            "--index-url" => index_url = Some(option_value(args, &mut i, "--index-url")?),
            "--extra-index-url" => {
                extra_index_url = Some(option_value(args, &mut i, "--extra-index-url")?)
            }
            "--sha256" => sha256 = Some(option_value(args, &mut i, "--sha256")?),
            "--min-free-mb" => {
                let value = option_value(args, &mut i, "--min-free-mb")?;
                min_free_mb = value
                    .parse()
                    .map_err(|_| format!("Invalid --min-free-mb value: {}", value))?;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown option: {}", arg));
            }
            _ => positionals.push(arg.clone()),
        }
        i += 1;
    }

    let command = match positionals.split_first() {
        None => return Err("No command given".to_string()),
        Some((name, rest)) => match (name.as_str(), rest) {
            ("config", []) => CliCommand::ShowConfig,
            ("install", [prefix]) => CliCommand::Install {
                prefix: PathBuf::from(prefix),
                pip,
                conda,
                channel,
                index_url,
                extra_index_url,
                update_base,
            },
            ("provision", [env_file, prefix]) => CliCommand::Provision {
                env_file: PathBuf::from(env_file),
                prefix: PathBuf::from(prefix),
            },
            ("config", _) => return Err("config takes no arguments".to_string()),
            ("install", _) => return Err("install requires exactly one PREFIX".to_string()),
            ("provision", _) => {
                return Err("provision requires ENV_FILE and PREFIX".to_string())
            }
            (other, _) => return Err(format!("Unknown command: {}", other)),
        },
    };

    Ok(CliConfig {
        command,
        sha256,
        min_free_mb,
        dry_run,
        verbose,
    })
}

/// Builds an environment from `install` command flags.
fn environment_from_flags(
    pip: Vec<String>,
    conda: Vec<String>,
    channel: String,
    index_url: Option<String>,
    extra_index_url: Option<String>,
    update_base: bool,
) -> EnvironmentSpec {
    let mut spec = EnvironmentSpec::new().with_update_base(update_base);

    if !pip.is_empty() {
        let mut request = PipRequest::new(&pip);
        if let Some(url) = index_url {
            request = request.with_index_url(url);
        }
        if let Some(urls) = extra_index_url {
            request = request.with_extra_index_urls(&urls);
        }
        spec = spec.with_pip(request);
    }

    if !conda.is_empty() {
        spec = spec.with_conda(CondaRequest::new(channel, &conda));
    }

    spec
}

/// Main application entry point.
fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    // Parse arguments
    let config = parse_arguments(&args).map_err(|e| {
        eprintln!("Error: {}", e);
        eprintln!();
        print_usage();
        e
    })?;

    // Setup logging
    setup_logging(config.verbose);

    let (spec, prefix) = match config.command {
        CliCommand::ShowConfig => {
            println!("{}", CONFIG.to_json()?);
            return Ok(());
        }
        CliCommand::Install {
            prefix,
            pip,
            conda,
            channel,
            index_url,
            extra_index_url,
            update_base,
        } => (
            environment_from_flags(pip, conda, channel, index_url, extra_index_url, update_base),
            prefix,
        ),
        CliCommand::Provision { env_file, prefix } => {
            let spec = load_environment(&env_file).map_err(|e| {
                error!("Failed to load environment: {}", e);
                format!(
                    "Could not load environment from '{}': {}",
                    env_file.display(),
                    e
                )
            })?;
            (spec, prefix)
        }
    };

    print_banner();

    let mut installer = MinicondaInstaller::new(&prefix, config.verbose);
    if let Some(sha256) = config.sha256 {
        installer = installer.with_sha256(sha256);
    }

    let mut provisioner = Provisioner::new(installer);
    provisioner.set_min_free_mb(config.min_free_mb);

    if config.dry_run {
        info!("Mode: DRY RUN (commands will not execute)");
        println!();
        for step in provisioner.plan(&spec)? {
            println!("  {}", step);
        }
        return Ok(());
    }

    let result = provisioner.run(&spec);
    println!("{}", provisioner.timeline().summary());

    let record = result?;
    println!(
        "{} Miniconda environment ready at {}",
        "✓".green().bold(),
        record.prefix.display()
    );
    println!("  Python: {}", provisioner.installer().python_path().display());

    Ok(())
}

fn main() -> ExitCode {
    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!();
            eprintln!("{} {}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("mcinstall")
            .chain(list.iter().copied())
            .map(str::to_string)
            .collect()
    }

    #[test]
    fn test_parse_config_command() {
        let config = parse_arguments(&args(&["config"])).unwrap();
        assert_eq!(config.command, CliCommand::ShowConfig);
        assert!(!config.verbose);
    }

    #[test]
    fn test_parse_install_command() {
        let config = parse_arguments(&args(&[
            "install",
            "/opt/mc",
            "--pip",
            "geopy",
            "--conda",
            "pyyaml",
            "--index-url",
            "https://test.pypi.org/simple/",
            "--no-update",
            "--verbose",
        ]))
        .unwrap();

        assert!(config.verbose);
        match config.command {
            CliCommand::Install {
                prefix,
                pip,
                conda,
                channel,
                index_url,
                update_base,
                ..
            } => {
                assert_eq!(prefix, PathBuf::from("/opt/mc"));
                assert_eq!(pip, vec!["geopy"]);
                assert_eq!(conda, vec!["pyyaml"]);
                assert_eq!(channel, DEFAULT_CHANNEL);
                assert_eq!(index_url.as_deref(), Some("https://test.pypi.org/simple/"));
                assert!(!update_base);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_provision_command() {
        let config =
            parse_arguments(&args(&["provision", "env.yaml", "/opt/mc", "--min-free-mb", "500"]))
                .unwrap();
        assert_eq!(config.min_free_mb, 500);
        assert_eq!(
            config.command,
            CliCommand::Provision {
                env_file: PathBuf::from("env.yaml"),
                prefix: PathBuf::from("/opt/mc"),
            }
        );
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse_arguments(&args(&[])).is_err());
        assert!(parse_arguments(&args(&["install"])).is_err());
        assert!(parse_arguments(&args(&["provision", "env.yaml"])).is_err());
        assert!(parse_arguments(&args(&["config", "extra"])).is_err());
        assert!(parse_arguments(&args(&["uninstall", "/opt/mc"])).is_err());
        assert!(parse_arguments(&args(&["install", "/opt/mc", "--bogus"])).is_err());
        assert!(parse_arguments(&args(&["install", "/opt/mc", "--pip"])).is_err());
        assert!(parse_arguments(&args(&["install", "/opt/mc", "--min-free-mb", "lots"])).is_err());
    }

    #[test]
    fn test_environment_from_flags() {
        let spec = environment_from_flags(
            vec!["pypi_pkg_test".to_string()],
            vec!["pyyaml".to_string()],
            "conda-forge".to_string(),
            Some("https://test.pypi.org/simpletest/".to_string()),
            Some("https://test.pypi.org/simpletest1/, https://test.pypi.org/simple/".to_string()),
            true,
        );

        assert_eq!(spec.pip.len(), 1);
        assert_eq!(spec.pip[0].extra_index_url.len(), 2);
        assert_eq!(spec.conda[0].channel, "conda-forge");
        assert!(spec.update_base);
    }

    #[test]
    fn test_environment_from_flags_without_packages() {
        let spec = environment_from_flags(
            Vec::new(),
            Vec::new(),
            DEFAULT_CHANNEL.to_string(),
            None,
            None,
            true,
        );
        assert!(spec.is_empty());
    }
}
