use axum::{
    extract::{Multipart, State},
    http::StatusCode,
};
use tempfile::NamedTempFile;
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{info, warn};

use crate::{
    error::{IntakeError, ValidationError},
    web::{
        AppState, auth,
        intake::{
            self, DEFAULT_SUBJECT, DEFAULT_TASK, StoredUpload, sanitize_component_or,
            validate_payload,
        },
        responses::{error_line, status_for, success_line},
    },
};

/// Multipart field carrying the data file.
pub const FILE_FIELD: &str = "fileToUpload";

/// Accepts an experiment data upload and stores it under
/// `<root>/<task>/<subject>/`. Responds with a single `SUCCESS:` or
/// `ERROR:` line.
pub async fn upload(
    State(state): State<AppState>,
    multipart: Multipart,
) -> (StatusCode, String) {
    match handle_upload(&state, multipart).await {
        Ok(stored) => {
            info!(
                file = %stored.stored_path.display(),
                size = stored.file_size,
                "upload accepted"
            );
            success_line(format!(
                "File uploaded successfully as: {}",
                stored.stored_name
            ))
        }
        Err(err) => {
            warn!(%err, "upload rejected");
            error_line(status_for(&err), err.to_string())
        }
    }
}

#[derive(Default)]
struct UploadForm {
    username: String,
    password: String,
    taskname: String,
    subnum: String,
    file: Option<ReceivedFile>,
}

struct ReceivedFile {
    original_name: String,
    payload: NamedTempFile,
    size: u64,
}

async fn handle_upload(
    state: &AppState,
    multipart: Multipart,
) -> Result<StoredUpload, IntakeError> {
    let config = state.config();
    let form = read_form(state, multipart).await?;

    if !auth::verify_credentials(config, &form.username, &form.password) {
        return Err(IntakeError::Authentication);
    }

    let file = form
        .file
        .ok_or(IntakeError::Validation(ValidationError::MissingFile))?;
    validate_payload(config, &file.original_name, file.size)?;

    let task = sanitize_component_or(&form.taskname, DEFAULT_TASK);
    let subject = sanitize_component_or(&form.subnum, DEFAULT_SUBJECT);

    let config = config.clone();
    tokio::task::spawn_blocking(move || {
        intake::store_payload(
            &config,
            &task,
            &subject,
            &file.original_name,
            file.payload,
            file.size,
        )
    })
    .await
    .map_err(|err| IntakeError::StorageWrite(std::io::Error::other(err.to_string())))?
}

/// Drains the whole multipart form before any decision is made, spilling
/// the file payload to a temp file inside the upload root so the final
/// store is a same-filesystem rename.
///
/// Bytes past the size limit are counted but not written; the request is
/// rejected later with the exact total, and the temp file is dropped.
async fn read_form(state: &AppState, mut multipart: Multipart) -> Result<UploadForm, IntakeError> {
    let config = state.config();
    let mut form = UploadForm::default();

    tokio::fs::create_dir_all(&config.upload_root)
        .await
        .map_err(IntakeError::DirectoryCreation)?;

    while let Some(mut field) = multipart
        .next_field()
        .await
        .map_err(|err| ValidationError::Transport(err.to_string()))?
    {
        let field_name = field.name().unwrap_or("").to_string();

        if field.file_name().is_none() {
            let value = field
                .text()
                .await
                .map_err(|err| ValidationError::Transport(err.to_string()))?;
            match field_name.as_str() {
                "user_name" => form.username = value,
                "upload_password" => form.password = value,
                "taskname" => form.taskname = value,
                "subnum" => form.subnum = value,
                _ => {}
            }
            continue;
        }

        if field_name != FILE_FIELD || form.file.is_some() {
            continue;
        }

        let original_name = field.file_name().unwrap_or("upload.dat").to_string();
        let temp = NamedTempFile::new_in(&config.upload_root)
            .map_err(IntakeError::StorageWrite)?;
        let std_handle = temp
            .as_file()
            .try_clone()
            .map_err(IntakeError::StorageWrite)?;
        let mut writer = File::from_std(std_handle);

        let mut size: u64 = 0;
        while let Some(chunk) = field
            .chunk()
            .await
            .map_err(|err| ValidationError::Transport(err.to_string()))?
        {
            size += chunk.len() as u64;
            if size <= config.max_file_size {
                writer
                    .write_all(&chunk)
                    .await
                    .map_err(IntakeError::StorageWrite)?;
            }
        }
        writer.flush().await.map_err(IntakeError::StorageWrite)?;

        form.file = Some(ReceivedFile {
            original_name,
            payload: temp,
            size,
        });
    }

    Ok(form)
}
