//! Subprocess Execution
//!
//! Runs the installer, pip and conda as blocking child processes and
//! turns non-zero exits into [`InstallerError::CommandFailed`].

use std::process::{Command, Output, Stdio};

use log::{debug, error};

use crate::error::{InstallerError, InstallerResult};

/// Number of trailing stderr lines kept in a command failure.
const STDERR_TAIL_LINES: usize = 20;

/// Renders a command line for logs and error messages.
pub fn describe(cmd: &Command) -> String {
    std::iter::once(cmd.get_program())
        .chain(cmd.get_args())
        .map(|part| {
            let part = part.to_string_lossy();
            if part.is_empty() || part.contains(char::is_whitespace) {
                format!("\"{}\"", part)
            } else {
                part.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs a command to completion.
///
/// With `verbose` the child writes straight to the terminal. Otherwise its
/// output is captured, logged at debug level, and stderr is attached to the
/// error on failure.
pub fn run_command(cmd: &mut Command, verbose: bool) -> InstallerResult<()> {
    let command_line = describe(cmd);
    debug!("Running: {}", command_line);

    if verbose {
        let status = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .map_err(|e| spawn_error(cmd, e))?;

        if status.success() {
            return Ok(());
        }

        error!("Command failed with exit code {:?}: {}", status.code(), command_line);
        return Err(InstallerError::CommandFailed {
            command: command_line,
            code: status.code(),
            stderr: String::new(),
        });
    }

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(cmd, e))?;

    check_output(command_line, output).map(|_| ())
}

/// Runs a command and returns its trimmed stdout.
pub fn capture_output(cmd: &mut Command) -> InstallerResult<String> {
    let command_line = describe(cmd);
    debug!("Running: {}", command_line);

    let output = cmd
        .stdin(Stdio::null())
        .output()
        .map_err(|e| spawn_error(cmd, e))?;

    check_output(command_line, output)
}

fn check_output(command_line: String, output: Output) -> InstallerResult<String> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    if output.status.success() {
        if !stdout.trim().is_empty() {
            debug!("stdout:\n{}", stdout.trim_end());
        }
        return Ok(stdout.trim().to_string());
    }

    error!(
        "Command failed with exit code {:?}: {}",
        output.status.code(),
        command_line
    );
    if !stderr.trim().is_empty() {
        error!("stderr:\n{}", stderr.trim_end());
    }
    if !stdout.trim().is_empty() {
        debug!("stdout:\n{}", stdout.trim_end());
    }

    Err(InstallerError::CommandFailed {
        command: command_line,
        code: output.status.code(),
        stderr: tail(&stderr, STDERR_TAIL_LINES),
    })
}

fn spawn_error(cmd: &Command, source: std::io::Error) -> InstallerError {
    InstallerError::Spawn {
        program: cmd.get_program().to_string_lossy().into_owned(),
        source,
    }
}

/// Keeps the last `lines` lines of a block of text.
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.trim_end().lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
