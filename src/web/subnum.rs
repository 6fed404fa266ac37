use axum::{
    extract::{Query, State},
    http::StatusCode,
};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::{
    config::FallbackPolicy,
    counter,
    error::IntakeError,
    web::{
        AppState, auth,
        responses::{error_line, status_for},
    },
};

#[derive(Debug, Deserialize)]
pub struct SubnumParams {
    #[serde(default)]
    pub user_name: String,
    #[serde(default)]
    pub upload_password: String,
}

/// Issues the next subject number as a bare decimal body.
///
/// Under the default `FallbackRandom` policy, authentication and counter
/// failures are masked behind a pseudo-random 7-digit number with HTTP
/// 200: the client cannot tell a fallback from an issued value, and the
/// experiment keeps running at the cost of uniqueness on that path.
pub async fn get_new_subnum(
    State(state): State<AppState>,
    Query(params): Query<SubnumParams>,
) -> (StatusCode, String) {
    let config = state.config();

    if !auth::verify_credentials(config, &params.user_name, &params.upload_password) {
        warn!("subject number request failed authentication");
        return issuance_failure(config.fallback_policy, IntakeError::Authentication);
    }

    match state.counter().issue().await {
        Ok(number) => {
            info!(subject_number = number, "issued subject number");
            (StatusCode::OK, number.to_string())
        }
        Err(err) => {
            error!(%err, "subject number issuance failed");
            issuance_failure(config.fallback_policy, err)
        }
    }
}

fn issuance_failure(policy: FallbackPolicy, err: IntakeError) -> (StatusCode, String) {
    match policy {
        FallbackPolicy::FallbackRandom => {
            let number = counter::fallback_number();
            warn!(fallback = number, "substituting random subject number");
            (StatusCode::OK, number.to_string())
        }
        FallbackPolicy::PropagateError => error_line(status_for(&err), err.to_string()),
    }
}
