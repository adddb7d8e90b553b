// crates/server/src/lib.rs
//! Rowforge server library.
//!
//! Axum HTTP server for the spreadsheet bulk-processing dashboard. It exposes
//! the job orchestration model from `rowforge-core` as a REST API: job
//! creation, polling reads, cancellation, and result download.

pub mod config;
pub mod error;
pub mod jobs;
pub mod llm;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::*;
pub use jobs::JobRunner;
pub use routes::api_routes;
pub use state::AppState;

use std::sync::Arc;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes and middleware.
///
/// This sets up:
/// - API routes (health, jobs)
/// - CORS for development (allows any origin)
/// - Request tracing
pub fn create_app(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    api_routes(state).layer(cors).layer(TraceLayer::new_for_http())
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Method, Request, StatusCode},
    };
    use rowforge_core::{
        CsvSheetSource, JobStore, RowError, RowOutput, RowProcessor, RowRecord,
    };
    use serde_json::{json, Value};
    use std::io::Write;
    use std::time::Duration;
    use tower::ServiceExt;

    /// Stub collaborator: echoes the row back after an optional delay.
    struct StubProcessor {
        delay: Duration,
    }

    #[async_trait]
    impl RowProcessor for StubProcessor {
        async fn process_row(&self, row: &RowRecord) -> Result<RowOutput, RowError> {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(RowOutput {
                refined_name: format!("refined {}", row.original_name),
                keywords: "keyword".to_string(),
                category: "C01".to_string(),
            })
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    /// Build an app over a temp upload dir holding one 10-row sheet.
    fn test_app(delay: Duration) -> (Router, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut sheet = std::fs::File::create(dir.path().join("products.csv")).unwrap();
        writeln!(sheet, "product_name").unwrap();
        for i in 0..10 {
            writeln!(sheet, "wholesale item {i}").unwrap();
        }

        let store = Arc::new(JobStore::new());
        let runner = Arc::new(JobRunner::new(
            Arc::clone(&store),
            Arc::new(StubProcessor { delay }),
            Duration::from_secs(5),
        ));
        let sheets = Arc::new(CsvSheetSource::new(dir.path()));
        let state = AppState::with_parts(store, runner, sheets);
        (create_app(state), dir)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = match body {
            Some(body) => Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => Request::builder()
                .method(method)
                .uri(uri)
                .body(Body::empty())
                .unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, json)
    }

    fn create_body(parallel_count: usize) -> Value {
        json!({
            "file_ref": "products.csv",
            "filename": "products.csv",
            "parallel_count": parallel_count,
            "column_mapping": {
                "original_product_name": "A",
                "refined_product_name": "B",
                "keyword": "C",
                "category": "D"
            }
        })
    }

    async fn wait_for_status(app: &Router, job_id: &str, expected: &str) -> Value {
        for _ in 0..200 {
            let (status, body) = send(app, Method::GET, &format!("/api/jobs/{job_id}"), None).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == expected {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {job_id} never reached status {expected}");
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (app, _dir) = test_app(Duration::ZERO);
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert!(body["version"].is_string());
        assert_eq!(body["active_jobs"], 0);
    }

    #[tokio::test]
    async fn test_job_lifecycle_end_to_end() {
        let (app, _dir) = test_app(Duration::ZERO);

        let (status, body) =
            send(&app, Method::POST, "/api/jobs", Some(create_body(4))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let detail = wait_for_status(&app, &job_id, "completed").await;
        assert_eq!(detail["progress"], 100);
        assert_eq!(detail["meta_data"]["rows_processed"], 10);
        assert_eq!(detail["meta_data"]["parallel_count"], 4);
        // 10 rows over 4 workers: [3,3,2,2].
        let chunks = detail["chunks"].as_array().unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks[0]["total_rows"], 3);
        assert_eq!(chunks[2]["total_rows"], 2);
        assert!(chunks.iter().all(|c| c["status"] == "completed"));

        // Listed, newest first.
        let (status, listing) = send(&app, Method::GET, "/api/jobs", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listing[0]["id"], job_id.as_str());
        assert_eq!(listing[0]["filename"], "products.csv");

        // Download the result sheet.
        let request = Request::builder()
            .uri(format!("/api/jobs/{job_id}/download/result"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let disposition = response
            .headers()
            .get("content-disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains("products_result.csv"));
        let csv = String::from_utf8(
            axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap()
                .to_vec(),
        )
        .unwrap();
        assert!(csv.starts_with("row,original_product_name"));
        assert!(csv.contains("refined wholesale item 0"));
        assert_eq!(csv.lines().count(), 11);
    }

    #[tokio::test]
    async fn test_create_rejects_incomplete_mapping() {
        let (app, _dir) = test_app(Duration::ZERO);
        let mut body = create_body(2);
        body["column_mapping"]["keyword"] = json!("");

        let (status, response) = send(&app, Method::POST, "/api/jobs", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "Validation failed");

        // Nothing persisted.
        let (_, listing) = send(&app, Method::GET, "/api/jobs", None).await;
        assert!(listing.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_rejects_bad_parallelism() {
        let (app, _dir) = test_app(Duration::ZERO);
        let (status, response) =
            send(&app, Method::POST, "/api/jobs", Some(create_body(11))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(response["details"]
            .as_str()
            .unwrap()
            .contains("parallel_count"));
    }

    #[tokio::test]
    async fn test_create_unknown_file_ref() {
        let (app, _dir) = test_app(Duration::ZERO);
        let mut body = create_body(1);
        body["file_ref"] = json!("missing.csv");

        let (status, response) = send(&app, Method::POST, "/api/jobs", Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(response["error"], "Uploaded file not found");
    }

    #[tokio::test]
    async fn test_get_unknown_and_malformed_ids() {
        let (app, _dir) = test_app(Duration::ZERO);

        let random = uuid::Uuid::new_v4();
        let (status, _) = send(&app, Method::GET, &format!("/api/jobs/{random}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, Method::GET, "/api/jobs/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_download_before_completion_conflicts() {
        let (app, _dir) = test_app(Duration::from_millis(50));
        let (_, body) = send(&app, Method::POST, "/api/jobs", Some(create_body(2))).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let (status, response) = send(
            &app,
            Method::GET,
            &format!("/api/jobs/{job_id}/download/result"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert!(response["details"].as_str().unwrap().contains("not ready"));
    }

    #[tokio::test]
    async fn test_cancel_endpoint_is_idempotent() {
        let (app, _dir) = test_app(Duration::from_millis(50));
        let (_, body) = send(&app, Method::POST, "/api/jobs", Some(create_body(2))).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();

        let uri = format!("/api/jobs/{job_id}/cancel");
        let (status, response) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "cancelled");

        // Second cancel: still 200, same state.
        let (status, response) = send(&app, Method::DELETE, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "cancelled");

        let detail = wait_for_status(&app, &job_id, "cancelled").await;
        assert_eq!(detail["error_message"], "cancelled by user");

        // Polling clients can stop: terminal status is stable.
        let (_, listing) = send(&app, Method::GET, "/api/jobs", None).await;
        assert_eq!(listing[0]["status"], "cancelled");
    }

    #[tokio::test]
    async fn test_cancel_completed_job_stays_completed() {
        let (app, _dir) = test_app(Duration::ZERO);
        let (_, body) = send(&app, Method::POST, "/api/jobs", Some(create_body(1))).await;
        let job_id = body["job_id"].as_str().unwrap().to_string();
        wait_for_status(&app, &job_id, "completed").await;

        let (status, response) = send(
            &app,
            Method::DELETE,
            &format!("/api/jobs/{job_id}/cancel"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response["status"], "completed");
    }
}
