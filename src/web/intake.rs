use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::Config;
use crate::error::{IntakeError, ValidationError};

/// Maximum length of a sanitized path component (task or subject).
const MAX_COMPONENT_LEN: usize = 100;

pub const DEFAULT_TASK: &str = "data";
pub const DEFAULT_SUBJECT: &str = "000";

/// Metadata describing a stored upload on disk.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub stored_name: String,
    pub stored_path: PathBuf,
    pub file_size: u64,
}

/// Restricts a user-supplied path component to `[A-Za-z0-9._-]`.
///
/// Disallowed characters are replaced with `_` rather than rejected, then
/// leading/trailing dots and underscores are stripped and the result is
/// capped at 100 characters. Traversal sequences like `../../etc` come out
/// as plain name material, never as directory escapes.
pub fn sanitize_component(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.' {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = replaced.trim_matches(|c| c == '.' || c == '_');
    trimmed.chars().take(MAX_COMPONENT_LEN).collect()
}

/// Sanitizes a component, substituting `fallback` when nothing survives.
pub fn sanitize_component_or(raw: &str, fallback: &str) -> String {
    let sanitized = sanitize_component(raw);
    if sanitized.is_empty() {
        fallback.to_string()
    } else {
        sanitized
    }
}

/// Validates the payload the way the upload endpoint requires: size first
/// (empty, then oversized), extension last. Short-circuits on the first
/// failure.
pub fn validate_payload(
    config: &Config,
    original_name: &str,
    size: u64,
) -> Result<(), ValidationError> {
    if size == 0 {
        return Err(ValidationError::EmptyFile);
    }
    if size > config.max_file_size {
        return Err(ValidationError::Oversized {
            max: config.max_file_size,
        });
    }

    let extension = extension_of(original_name);
    if !config.extension_allowed(&extension) {
        return Err(ValidationError::DisallowedExtension {
            extension,
            allowed: config.allowed_extensions.join(", "),
        });
    }

    Ok(())
}

/// Moves a validated payload into `<root>/<task>/<subject>/`, resolving
/// filename collisions with a `_N` suffix and never overwriting.
///
/// The payload arrives as a temp file created inside the upload root, so
/// the final step is a rename on the same filesystem. On any failure the
/// temp file is dropped and deleted; at most empty directories remain.
pub fn store_payload(
    config: &Config,
    task: &str,
    subject: &str,
    original_name: &str,
    payload: NamedTempFile,
    size: u64,
) -> Result<StoredUpload, IntakeError> {
    let dest_dir = config.upload_root.join(task).join(subject);
    std::fs::create_dir_all(&dest_dir).map_err(IntakeError::DirectoryCreation)?;

    ensure_contained(&config.upload_root, &dest_dir)?;

    let base_name = storable_filename(original_name);
    let (stored_name, stored_path) = persist_unique(payload, &dest_dir, &base_name)?;
    set_world_readable(&stored_path)?;

    debug!(path = %stored_path.display(), size, "upload stored");

    Ok(StoredUpload {
        stored_name,
        stored_path,
        file_size: size,
    })
}

/// Post-construction traversal check: the destination must resolve to a
/// descendant of the upload root, regardless of what sanitization let
/// through.
fn ensure_contained(root: &Path, dest_dir: &Path) -> Result<(), IntakeError> {
    let canonical_root = root.canonicalize().map_err(IntakeError::DirectoryCreation)?;
    let canonical_dest = dest_dir
        .canonicalize()
        .map_err(IntakeError::DirectoryCreation)?;

    if !canonical_dest.starts_with(&canonical_root) {
        return Err(IntakeError::DirectoryCreation(std::io::Error::other(
            format!(
                "destination {} escapes upload root {}",
                canonical_dest.display(),
                canonical_root.display()
            ),
        )));
    }
    Ok(())
}

/// Derives the on-disk filename from the client's original filename.
fn storable_filename(original_name: &str) -> String {
    let sanitized = sanitize_filename::sanitize(original_name);
    if sanitized.is_empty() {
        "upload.dat".to_string()
    } else {
        sanitized
    }
}

/// Renames the temp file to the first free name in `dest_dir`.
///
/// `persist_noclobber` refuses to replace an existing file, so a racing
/// upload of the same name loses the rename and retries with the next
/// suffix instead of overwriting.
fn persist_unique(
    mut payload: NamedTempFile,
    dest_dir: &Path,
    base_name: &str,
) -> Result<(String, PathBuf), IntakeError> {
    let (stem, extension) = split_name(base_name);

    let mut counter = 0usize;
    loop {
        let candidate = if counter == 0 {
            base_name.to_string()
        } else if extension.is_empty() {
            format!("{stem}_{counter}")
        } else {
            format!("{stem}_{counter}.{extension}")
        };

        let target = dest_dir.join(&candidate);
        if target.exists() {
            counter += 1;
            continue;
        }

        match payload.persist_noclobber(&target) {
            Ok(_) => return Ok((candidate, target)),
            Err(err) if err.error.kind() == std::io::ErrorKind::AlreadyExists => {
                payload = err.file;
                counter += 1;
            }
            Err(err) => return Err(IntakeError::StorageWrite(err.error)),
        }
    }
}

pub fn extension_of(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_default()
}

fn split_name(name: &str) -> (String, String) {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name)
        .to_string();
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string();
    (stem, extension)
}

#[cfg(unix)]
fn set_world_readable(path: &Path) -> Result<(), IntakeError> {
    use std::os::unix::fs::PermissionsExt;

    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o644))
        .map_err(IntakeError::StorageWrite)
}

#[cfg(not(unix))]
fn set_world_readable(_path: &Path) -> Result<(), IntakeError> {
    Ok(())
}
