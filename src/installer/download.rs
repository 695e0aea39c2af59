//! Installer Download
//!
//! Fetches a file over HTTP(S) with a blocking client, or copies it from a
//! `file://` mirror, and computes its SHA-256 digest.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::time::Duration;

use log::{debug, info};
use reqwest::blocking::Client;
use sha2::{Digest, Sha256};

use crate::error::{InstallerError, InstallerResult};

/// Timeout for establishing the HTTP connection.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads `url` to `dest` and returns the hex SHA-256 of the file.
///
/// When `expected_sha256` is given the digest is compared case-insensitively
/// and a mismatch is an error. Non-success HTTP statuses are errors.
/// Nothing is retried.
pub fn download_file(
    url: &str,
    dest: &Path,
    expected_sha256: Option<&str>,
) -> InstallerResult<String> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| InstallerError::io(parent, e))?;
    }

    info!("Downloading {}", url);

    let bytes = match url.strip_prefix("file://") {
        Some(local) => copy_local(Path::new(local), dest)?,
        None => fetch_http(url, dest)?,
    };

    debug!("Wrote {} bytes to {}", bytes, dest.display());

    match expected_sha256 {
        Some(expected) => verify_sha256(dest, expected),
        None => sha256_file(dest),
    }
}

/// Computes the hex SHA-256 digest of a file.
pub fn sha256_file(path: &Path) -> InstallerResult<String> {
    let mut file = File::open(path).map_err(|e| InstallerError::io(path, e))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher).map_err(|e| InstallerError::io(path, e))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Checks a file against an expected hex SHA-256 digest.
pub fn verify_sha256(path: &Path, expected: &str) -> InstallerResult<String> {
    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(InstallerError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected.trim().to_lowercase(),
            actual,
        });
    }
    debug!("SHA-256 verified for {}", path.display());
    Ok(actual)
}

fn http_client() -> InstallerResult<Client> {
    let client = Client::builder()
        .user_agent(concat!("mcinstall/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(None::<Duration>)
        .build()?;
    Ok(client)
}

fn fetch_http(url: &str, dest: &Path) -> InstallerResult<u64> {
    let mut response = http_client()?.get(url).send()?;

    let status = response.status();
    if !status.is_success() {
        return Err(InstallerError::DownloadFailed {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }

    if let Some(total) = response.content_length() {
        debug!("Content length: {} MB", total / (1024 * 1024));
    }

    // Scope the writer so the handle is closed before hashing
    let written = {
        let file = File::create(dest).map_err(|e| InstallerError::io(dest, e))?;
        let mut writer = BufWriter::new(file);
        let written = response.copy_to(&mut writer)?;
        writer.flush().map_err(|e| InstallerError::io(dest, e))?;
        written
    };

    Ok(written)
}

fn copy_local(source: &Path, dest: &Path) -> InstallerResult<u64> {
    fs::copy(source, dest).map_err(|e| InstallerError::io(source, e))
}
