use axum::http::StatusCode;

use crate::error::IntakeError;

/// One-line `SUCCESS: <message>` body, HTTP 200.
pub fn success_line(message: impl AsRef<str>) -> (StatusCode, String) {
    (StatusCode::OK, format!("SUCCESS: {}\n", message.as_ref()))
}

/// One-line `ERROR: <message>` body with the given status.
pub fn error_line(status: StatusCode, message: impl AsRef<str>) -> (StatusCode, String) {
    (status, format!("ERROR: {}\n", message.as_ref()))
}

/// Maps the failure taxonomy onto HTTP statuses at the request boundary.
pub fn status_for(err: &IntakeError) -> StatusCode {
    match err {
        IntakeError::Authentication => StatusCode::UNAUTHORIZED,
        IntakeError::Validation(_) => StatusCode::BAD_REQUEST,
        IntakeError::LockAcquisition(_)
        | IntakeError::CounterReadWrite(_)
        | IntakeError::DirectoryCreation(_)
        | IntakeError::StorageWrite(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
