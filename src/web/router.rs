use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};

use crate::web::{AppState, subnum, upload};

/// Slack on top of the file-size limit for the other form fields and
/// multipart framing.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config().max_file_size as usize + BODY_LIMIT_SLACK;

    Router::new()
        .route("/getnewsubnum", get(subnum::get_new_subnum))
        .route("/upload", post(upload::upload))
        .route("/healthz", get(healthz))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt;

    use super::*;
    use crate::config::{Config, DEFAULT_MAX_FILE_SIZE, FallbackPolicy};
    use crate::web::auth::hash_password;

    const BOUNDARY: &str = "----testboundary";

    fn test_state(dir: &std::path::Path) -> AppState {
        AppState::new(Config {
            admin_username: "admin".into(),
            admin_password_hash: hash_password("hunter2").unwrap(),
            upload_root: dir.join("uploads"),
            counter_file: dir.join("counter.txt"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_extensions: vec!["txt".into(), "csv".into()],
            fallback_policy: FallbackPolicy::FallbackRandom,
        })
    }

    fn text_part(name: &str, value: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        )
    }

    fn file_part(filename: &str, contents: &str) -> String {
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"fileToUpload\"; filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n{contents}\r\n"
        )
    }

    fn upload_request(password: &str, task: &str, subnum: &str, filename: &str, contents: &str) -> Request<Body> {
        let body = format!(
            "{}{}{}{}{}--{BOUNDARY}--\r\n",
            text_part("user_name", "admin"),
            text_part("upload_password", password),
            text_part("taskname", task),
            text_part("subnum", subnum),
            file_part(filename, contents),
        );
        Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_text(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn healthz_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upload_stores_file_and_reports_name() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(upload_request("hunter2", "stroop", "12", "data.csv", "a,b\n"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            body_text(response).await,
            "SUCCESS: File uploaded successfully as: data.csv\n"
        );
        let stored = dir.path().join("uploads/stroop/12/data.csv");
        assert_eq!(std::fs::read_to_string(stored).unwrap(), "a,b\n");
    }

    #[tokio::test]
    async fn duplicate_upload_gets_suffixed_name() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());

        let response = build_router(state.clone())
            .oneshot(upload_request("hunter2", "stroop", "12", "data.csv", "one"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = build_router(state)
            .oneshot(upload_request("hunter2", "stroop", "12", "data.csv", "two"))
            .await
            .unwrap();
        assert_eq!(
            body_text(response).await,
            "SUCCESS: File uploaded successfully as: data_1.csv\n"
        );

        let base = dir.path().join("uploads/stroop/12");
        assert!(base.join("data.csv").exists());
        assert!(base.join("data_1.csv").exists());
    }

    #[tokio::test]
    async fn upload_rejects_bad_password() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(upload_request("wrong", "stroop", "12", "data.csv", "a"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(body_text(response).await, "ERROR: Authentication failed\n");
        assert!(!dir.path().join("uploads/stroop").exists());
    }

    #[tokio::test]
    async fn upload_rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(upload_request("hunter2", "stroop", "12", "tool.exe", "MZ"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_text(response).await;
        assert!(body.starts_with("ERROR: Invalid file type `exe`"), "{body}");
    }

    #[tokio::test]
    async fn upload_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(upload_request("hunter2", "stroop", "12", "data.csv", ""))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "ERROR: File is empty\n");
    }

    #[tokio::test]
    async fn upload_rejects_missing_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let body = format!(
            "{}{}--{BOUNDARY}--\r\n",
            text_part("user_name", "admin"),
            text_part("upload_password", "hunter2"),
        );
        let request = Request::builder()
            .method("POST")
            .uri("/upload")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap();

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "ERROR: No file uploaded\n");
    }

    #[tokio::test]
    async fn traversal_components_stay_inside_upload_root() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(upload_request("hunter2", "../../etc", "../..", "data.txt", "x"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let stored = dir.path().join("uploads/etc/000/data.txt");
        assert!(stored.exists());
        assert!(!dir.path().join("../etc").exists());
    }

    #[tokio::test]
    async fn subnum_endpoint_issues_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/getnewsubnum?user_name=admin&upload_password=hunter2")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "1");
    }

    #[tokio::test]
    async fn subnum_endpoint_masks_auth_failure() {
        let dir = tempfile::tempdir().unwrap();
        let app = build_router(test_state(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/getnewsubnum?user_name=admin&upload_password=wrong")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let number: u64 = body_text(response).await.parse().unwrap();
        assert!((1_000_000..=9_999_999).contains(&number));
    }
}
