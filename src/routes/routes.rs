//! Defines routes for the upload pipeline, résumé CRUD and job search.
//!
//! ## Structure
//! - **Service endpoints**
//!   - `GET    /`, `/healthz`, `/readyz`
//!
//! - **Uploads**
//!   - `POST   /uploads/resume/`: multipart upload, answers 202
//!   - `GET    /uploads/resume/{id}`: upload record and processing status
//!   - `GET    /uploads/resume/{id}/file`: original bytes
//!   - `DELETE /uploads/resume/{id}`
//!   - `GET    /uploads/resume/user/{user_id}`: newest first
//!
//! - **Résumés** (owner-scoped by `?user_id=`)
//!   - `POST   /resumes`
//!   - `GET | PATCH | DELETE /resumes/{id}`
//!   - `GET    /resumes/user/{user_id}`, `DELETE /resumes/user/{user_id}`
//!
//! - **Jobs**
//!   - `GET    /api/jobs`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz, root},
        job_handlers::search_jobs,
        resume_handlers::{
            create_resume, delete_resume, get_resume, list_user_resumes, purge_user_resumes,
            update_resume,
        },
        upload_handlers::{
            delete_upload, download_upload, get_upload, list_user_uploads, upload_resume,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. Shared state (`AppState`) is attached by the caller.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // Uploads
        .route("/uploads/resume/", post(upload_resume))
        .route("/uploads/resume", post(upload_resume))
        .route(
            "/uploads/resume/{id}",
            get(get_upload).delete(delete_upload),
        )
        .route("/uploads/resume/{id}/file", get(download_upload))
        .route("/uploads/resume/user/{user_id}", get(list_user_uploads))
        // Résumés
        .route("/resumes", post(create_resume))
        .route(
            "/resumes/{id}",
            get(get_resume).patch(update_resume).delete(delete_resume),
        )
        .route(
            "/resumes/user/{user_id}",
            get(list_user_resumes).delete(purge_user_resumes),
        )
        // Jobs
        .route("/api/jobs", get(search_jobs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::memory_pool;
    use crate::services::{
        file_stager::FileStager,
        job_search::{HeuristicScorer, JobSearchClient},
        parser::StubParser,
        pipeline::RetryPolicy,
    };
    use crate::state::PipelineSettings;
    use axum::{
        body::Body,
        extract::DefaultBodyLimit,
        http::{Request, StatusCode, header},
    };
    use bytes::Bytes;
    use http_body_util::BodyExt;
    use serde_json::{Value, json};
    use std::{sync::Arc, time::Duration};
    use tower::ServiceExt;

    const BOUNDARY: &str = "resume-service-test-boundary";

    struct TestApp {
        router: Router,
        dir: tempfile::TempDir,
    }

    async fn app() -> TestApp {
        let dir = tempfile::tempdir().unwrap();
        let db = Arc::new(memory_pool().await);
        let settings = PipelineSettings {
            workers: 2,
            queue_capacity: 16,
            retry: RetryPolicy {
                max_attempts: 2,
                base_delay: Duration::from_millis(1),
            },
        };
        let jobs = JobSearchClient::new("http://127.0.0.1:1", None, None).unwrap();
        let (state, _dispatcher) = AppState::start(
            db,
            FileStager::new(dir.path()),
            Arc::new(StubParser),
            settings,
            jobs,
            Arc::new(HeuristicScorer),
        );
        TestApp {
            router: routes().with_state(state),
            dir,
        }
    }

    fn multipart(user_id: Option<&str>, file: Option<(&str, &[u8])>) -> Request<Body> {
        let mut body = Vec::new();
        if let Some((name, content)) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(content);
            body.extend_from_slice(b"\r\n");
        }
        if let Some(user_id) = user_id {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"user_id\"\r\n\r\n{user_id}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri("/uploads/resume/")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn delete(uri: &str) -> Request<Body> {
        Request::builder()
            .method("DELETE")
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Vec<u8>) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, bytes.to_vec())
    }

    async fn send_json(router: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let (status, bytes) = send(router, req).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn wait_for_terminal(router: &Router, id: i64) -> Value {
        for _ in 0..200 {
            let (status, body) = send_json(router, get(&format!("/uploads/resume/{id}"))).await;
            assert_eq!(status, StatusCode::OK);
            if body["status"] == "completed" || body["status"] == "failed" {
                return body;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("upload {id} never reached a terminal state");
    }

    fn stored_files(dir: &std::path::Path) -> usize {
        std::fs::read_dir(dir).map(|rd| rd.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn banner_and_health() {
        let app = app().await;
        let (status, body) = send_json(&app.router, get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "message": "Résumé Upload API" }));

        let (status, _) = send_json(&app.router, get("/healthz")).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send_json(&app.router, get("/readyz")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["checks"]["sqlite"]["ok"], true);
        assert_eq!(body["checks"]["upload_dir"]["ok"], true);
    }

    #[tokio::test]
    async fn upload_is_accepted_then_processed() {
        let app = app().await;
        let (status, body) = send_json(
            &app.router,
            multipart(Some("1"), Some(("resume.txt", b"Test resume content"))),
        )
        .await;

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["status"], "pending");
        assert_eq!(body["resume_id"], Value::Null);
        assert_eq!(body["original_filename"], "resume.txt");
        assert_eq!(body["file_size"], 19);
        assert!(body.get("file_path").is_none());

        let id = body["id"].as_i64().unwrap();
        let done = wait_for_terminal(&app.router, id).await;
        assert_eq!(done["status"], "completed");
        assert_eq!(done["error_message"], Value::Null);
        let resume_id = done["resume_id"].as_i64().unwrap();

        let (status, resume) =
            send_json(&app.router, get(&format!("/resumes/{resume_id}?user_id=1"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resume["title"], "Resume from resume.txt");
        assert_eq!(resume["template"], "professional");
        assert_eq!(resume["content"]["personalInfo"]["name"], "");

        let (status, _) =
            send_json(&app.router, get(&format!("/resumes/{resume_id}?user_id=2"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn user_id_may_follow_the_file() {
        let app = app().await;
        // multipart() writes the file part first
        let (status, body) =
            send_json(&app.router, multipart(Some("7"), Some(("cv.pdf", b"%PDF-1.4")))).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["user_id"], 7);
        assert_eq!(stored_files(app.dir.path()), 1);
    }

    #[tokio::test]
    async fn empty_file_is_rejected() {
        let app = app().await;
        let (status, body) =
            send_json(&app.router, multipart(Some("1"), Some(("resume.txt", b"")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Empty file");
        assert_eq!(stored_files(app.dir.path()), 0);
    }

    #[tokio::test]
    async fn bad_user_id_discards_staged_file() {
        let app = app().await;
        let (status, _) =
            send_json(&app.router, multipart(None, Some(("resume.txt", b"content")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) =
            send_json(&app.router, multipart(Some("abc"), Some(("resume.txt", b"content")))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "user_id must be an integer");
        assert_eq!(stored_files(app.dir.path()), 0);

        let (status, body) = send_json(&app.router, multipart(Some("1"), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "No file provided");
    }

    /// Re-send `req` with its body split into small frames, the way a real
    /// client upload arrives.
    async fn chunked(req: Request<Body>) -> Request<Body> {
        let (parts, body) = req.into_parts();
        let bytes = body.collect().await.unwrap().to_bytes();
        let frames: Vec<Result<Bytes, std::io::Error>> = bytes
            .chunks(64)
            .map(|chunk| Ok(Bytes::copy_from_slice(chunk)))
            .collect();
        Request::from_parts(parts, Body::from_stream(futures::stream::iter(frames)))
    }

    #[tokio::test]
    async fn oversized_upload_is_413_and_leaves_nothing_behind() {
        let app = app().await;
        let router = app.router.clone().layer(DefaultBodyLimit::max(1024));

        let big = vec![b'x'; 4096];
        let (status, body) = send_json(
            &router,
            chunked(multipart(Some("1"), Some(("resume.txt", big.as_slice())))).await,
        )
        .await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(body["status"], 413);
        assert_eq!(stored_files(app.dir.path()), 0);

        let (status, _) = send_json(
            &router,
            chunked(multipart(Some("1"), Some(("resume.txt", b"small enough")))).await,
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(stored_files(app.dir.path()), 1);
    }

    #[tokio::test]
    async fn download_list_and_delete_upload() {
        let app = app().await;
        let (_, first) =
            send_json(&app.router, multipart(Some("3"), Some(("a.txt", b"first file")))).await;
        let (_, second) =
            send_json(&app.router, multipart(Some("3"), Some(("b.txt", b"second file")))).await;
        let first_id = first["id"].as_i64().unwrap();
        let second_id = second["id"].as_i64().unwrap();

        let (status, bytes) =
            send(&app.router, get(&format!("/uploads/resume/{first_id}/file"))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"first file");

        let (status, listed) = send_json(&app.router, get("/uploads/resume/user/3")).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<i64> = listed
            .as_array()
            .unwrap()
            .iter()
            .map(|u| u["id"].as_i64().unwrap())
            .collect();
        assert_eq!(ids, vec![second_id, first_id]);

        let (status, listed) =
            send_json(&app.router, get("/uploads/resume/user/3?skip=1&limit=1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed[0]["id"], first_id);

        wait_for_terminal(&app.router, first_id).await;
        let (status, _) = send(&app.router, delete(&format!("/uploads/resume/{first_id}"))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) =
            send_json(&app.router, get(&format!("/uploads/resume/{first_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Resume upload not found");
        let (status, _) = send(&app.router, delete(&format!("/uploads/resume/{first_id}"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn resume_crud_is_owner_scoped() {
        let app = app().await;
        let (status, created) = send_json(
            &app.router,
            json_request(
                "POST",
                "/resumes",
                json!({ "user_id": 5, "title": "Platform engineer" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["template"], "professional");
        let id = created["id"].as_i64().unwrap();

        let (status, updated) = send_json(
            &app.router,
            json_request(
                "PATCH",
                &format!("/resumes/{id}?user_id=5"),
                json!({ "title": "Staff engineer" }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["title"], "Staff engineer");

        let (status, _) = send(&app.router, delete(&format!("/resumes/{id}?user_id=6"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, listed) = send_json(&app.router, get("/resumes/user/5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, body) = send_json(&app.router, delete("/resumes/user/5")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "deleted": 1 }));

        let (status, _) = send(&app.router, delete(&format!("/resumes/{id}?user_id=5"))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn blank_resume_title_is_bad_request() {
        let app = app().await;
        let (status, body) = send_json(
            &app.router,
            json_request("POST", "/resumes", json!({ "user_id": 5, "title": " " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["status"], 400);
    }

    #[tokio::test]
    async fn unreachable_job_provider_is_500() {
        let app = app().await;
        let (status, body) = send_json(&app.router, get("/api/jobs?title=rust")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Error fetching jobs: ")
        );
    }
}
