use std::{env, path::PathBuf, str::FromStr};

use anyhow::{Context, Result, anyhow};

pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;
pub const DEFAULT_ALLOWED_EXTENSIONS: &[&str] = &["txt", "csv", "tsv", "dat", "log"];

/// What the subject-number endpoint does when issuance fails.
///
/// `FallbackRandom` masks the failure behind a pseudo-random 7-digit
/// number so a running experiment keeps going; `PropagateError` surfaces
/// the failure and exists mainly so tests get deterministic behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FallbackPolicy {
    FallbackRandom,
    PropagateError,
}

impl FromStr for FallbackPolicy {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self> {
        match value {
            "fallback-random" => Ok(FallbackPolicy::FallbackRandom),
            "propagate-error" => Ok(FallbackPolicy::PropagateError),
            other => Err(anyhow!(
                "invalid SUBNUM_ON_FAILURE value `{other}` (expected `fallback-random` or `propagate-error`)"
            )),
        }
    }
}

/// Static server configuration, read once from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub admin_username: String,
    pub admin_password_hash: String,
    pub upload_root: PathBuf,
    pub counter_file: PathBuf,
    pub max_file_size: u64,
    pub allowed_extensions: Vec<String>,
    pub fallback_policy: FallbackPolicy,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let admin_username =
            env::var("ADMIN_USERNAME").context("ADMIN_USERNAME env var is missing")?;
        let admin_password_hash =
            env::var("ADMIN_PASSWORD_HASH").context("ADMIN_PASSWORD_HASH env var is missing")?;

        let upload_root =
            PathBuf::from(env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads".into()));
        let counter_file =
            PathBuf::from(env::var("COUNTER_FILE").unwrap_or_else(|_| "counter.txt".into()));

        let max_file_size = match env::var("MAX_FILE_SIZE") {
            Ok(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("MAX_FILE_SIZE must be a byte count, got `{raw}`"))?,
            Err(_) => DEFAULT_MAX_FILE_SIZE,
        };

        let allowed_extensions = match env::var("ALLOWED_EXTENSIONS") {
            Ok(raw) => parse_extensions(&raw)?,
            Err(_) => DEFAULT_ALLOWED_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
        };

        let fallback_policy = match env::var("SUBNUM_ON_FAILURE") {
            Ok(raw) => raw.parse()?,
            Err(_) => FallbackPolicy::FallbackRandom,
        };

        Ok(Self {
            admin_username,
            admin_password_hash,
            upload_root,
            counter_file,
            max_file_size,
            allowed_extensions,
            fallback_policy,
        })
    }

    pub fn extension_allowed(&self, extension: &str) -> bool {
        let lowered = extension.to_ascii_lowercase();
        self.allowed_extensions.iter().any(|ext| *ext == lowered)
    }
}

fn parse_extensions(raw: &str) -> Result<Vec<String>> {
    let extensions: Vec<String> = raw
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
        .collect();

    if extensions.is_empty() {
        return Err(anyhow!(
            "ALLOWED_EXTENSIONS must list at least one extension"
        ));
    }
    Ok(extensions)
}
