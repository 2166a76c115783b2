//! HTTP API router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Body limit → 3. Rate limiter → 4. Audit logger

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Request body cap. Uploads arrive base64-encoded, a third larger than
/// the 25 MB file limit.
pub const MAX_BODY_BYTES: usize = 40 * 1024 * 1024;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected as the outermost layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

/// Build router from a pre-constructed `ApiContext`.
#[cfg(test)]
pub(crate) fn api_router_with_ctx(ctx: ApiContext) -> Router {
    build_router(ctx)
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/ocr", post(endpoints::ocr::gateway))
        .route("/correct", post(endpoints::ocr::correct))
        .route("/workspaces", post(endpoints::workspaces::create))
        .route(
            "/workspaces/:id",
            get(endpoints::workspaces::get).delete(endpoints::workspaces::remove),
        )
        .route("/workspaces/:id/canvas", get(endpoints::workspaces::canvas))
        .route("/workspaces/:id/page", post(endpoints::workspaces::change_page))
        .route("/workspaces/:id/zoom", post(endpoints::workspaces::change_zoom))
        .route("/workspaces/:id/crop", post(endpoints::workspaces::crop))
        .route("/workspaces/:id/restore", post(endpoints::workspaces::restore))
        .route("/workspaces/:id/extract", post(endpoints::workspaces::extract))
        .route("/workspaces/:id/qac", post(endpoints::workspaces::qac))
        .route(
            "/workspaces/:id/extractions",
            get(endpoints::workspaces::extractions),
        )
        .route("/workspaces/:id/report", get(endpoints::workspaces::report))
        .route("/workspaces/:id/export", post(endpoints::workspaces::export))
        .route(
            "/workspaces/:id/images/:image_id/colorize",
            post(endpoints::workspaces::colorize),
        )
        .route(
            "/workspaces/:id/images/:image_id/enhance",
            post(endpoints::workspaces::enhance),
        )
        .route(
            "/workspaces/:id/images/:image_id/base64",
            post(endpoints::workspaces::base64),
        )
        .route("/images/enhance", post(endpoints::images::enhance))
        .route("/images/base64", post(endpoints::images::base64))
        .route("/images/map", post(endpoints::images::map))
        .with_state(ctx.clone())
        // Middleware stack (innermost first, outermost last):
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        .layer(axum::middleware::from_fn(middleware::rate::limit))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        // Extension must be outermost so middleware can extract ApiContext
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", api)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::types::RateLimiter;
    use crate::config::AppConfig;
    use crate::model_service::ModelService;
    use crate::pipeline::gemini::{GeminiError, MockVisionClient};
    use crate::pipeline::render::crop::solid_canvas;
    use crate::pipeline::render::{encode_base64, MockPdfPageRenderer};
    use crate::workspace::Activity;

    const FAKE_PDF: &[u8] = b"%PDF-1.4\n%mock\n";
    const OCR_ANSWER: &str = "TEXT: Hello world\nMATH: None\nCONFIDENCE: 92";
    const DETECTION_ANSWER: &str =
        "VISUAL_ELEMENTS_FOUND: 1\nCOORDINATES:\n10,10,50,20,line chart";
    const QAC_ANSWER: &str =
        "CORRECTED_TEXT: Hello, world\nFIXES:\nHello|Hello,|punctuation|added comma";

    fn test_core_with_config(config: AppConfig, mock: MockVisionClient) -> Arc<CoreState> {
        let models = Arc::new(ModelService::with_client(&config, Arc::new(mock)));
        Arc::new(CoreState::with_parts(
            config,
            models,
            Arc::new(MockPdfPageRenderer::new(3)),
        ))
    }

    fn test_core(mock: MockVisionClient) -> Arc<CoreState> {
        test_core_with_config(AppConfig::default(), mock)
    }

    fn scripted_mock() -> MockVisionClient {
        MockVisionClient::new("VISUAL_ELEMENTS_FOUND: 0").with_replies(vec![
            Ok(OCR_ANSWER.into()),
            Ok(DETECTION_ANSWER.into()),
            Ok(QAC_ANSWER.into()),
        ])
    }

    fn make_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(json) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = app
            .clone()
            .oneshot(make_request(method, uri, body))
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }

    async fn upload_pdf(app: &Router) -> String {
        let (status, json) = send(
            app,
            "POST",
            "/api/workspaces",
            Some(json!({
                "fileName": "doc.pdf",
                "data": format!("data:application/pdf;base64,{}", encode_base64(FAKE_PDF)),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        json["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn health_reports_status() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let (status, json) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "ok");
        assert_eq!(json["apiKeyConfigured"], true);
        assert_eq!(json["workspaces"], 0);
        assert!(json["activeOperations"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_route_returns_404() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let (status, _) = send(&app, "GET", "/api/nonexistent", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ── Gateway ─────────────────────────────────────────────

    #[tokio::test]
    async fn gateway_returns_model_answer() {
        let app = api_router(test_core(MockVisionClient::new("TEXT: hi")));
        let (status, json) = send(
            &app,
            "POST",
            "/api/ocr",
            Some(json!({ "imageBase64": "QUJD", "fileType": "pdf" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], true);
        assert_eq!(json["method"], "Google Gemini AI (PDF)");
        assert_eq!(json["response"], "TEXT: hi");
    }

    #[tokio::test]
    async fn gateway_falls_back_when_model_fails() {
        let app = api_router(test_core(MockVisionClient::failing(GeminiError::Timeout(120))));
        let (status, json) = send(
            &app,
            "POST",
            "/api/ocr",
            Some(json!({ "imageBase64": "QUJD", "fileType": "image" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["success"], false);
        assert_eq!(json["method"], "Local Processing (IMAGE)");
        assert_eq!(json["error"], "AI service unavailable");
    }

    #[tokio::test]
    async fn gateway_requires_image() {
        let app = api_router(test_core(MockVisionClient::new("unused")));
        let (status, json) = send(&app, "POST", "/api/ocr", Some(json!({ "prompt": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Image data is required");
    }

    #[tokio::test]
    async fn gateway_rejects_malformed_body_with_500() {
        let app = api_router(test_core(MockVisionClient::new("unused")));
        let request = Request::builder()
            .method("POST")
            .uri("/api/ocr")
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        let json: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["error"], "OCR processing failed");
    }

    // ── Correction ──────────────────────────────────────────

    #[tokio::test]
    async fn correct_returns_summary() {
        let mock = MockVisionClient::new(
            r#"{"correctedText": "the cat", "correctionsSummary": [{"original": "teh", "corrected": "the"}]}"#,
        );
        let app = api_router(test_core(mock));
        let (status, json) =
            send(&app, "POST", "/api/correct", Some(json!({ "text": "teh cat" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["correctedText"], "the cat");
        assert_eq!(json["correctionsSummary"][0]["original"], "teh");
    }

    #[tokio::test]
    async fn correct_rejects_empty_text() {
        let app = api_router(test_core(MockVisionClient::new("unused")));
        let (status, json) = send(&app, "POST", "/api/correct", Some(json!({ "text": "" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"]["message"], "Input text cannot be empty.");
    }

    #[tokio::test]
    async fn correct_model_failure_is_502() {
        let app = api_router(test_core(MockVisionClient::new("not json at all")));
        let (status, json) = send(&app, "POST", "/api/correct", Some(json!({ "text": "x" }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["error"]["message"], "Failed to correct text with AI.");
    }

    // ── Workspaces ──────────────────────────────────────────

    #[tokio::test]
    async fn upload_rejects_unsupported_file() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let (status, _) = send(
            &app,
            "POST",
            "/api/workspaces",
            Some(json!({ "fileName": "notes.txt", "data": encode_base64(b"plain text") })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn workspace_lookup_errors() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let (status, _) = send(&app, "GET", "/api/workspaces/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let missing = uuid::Uuid::new_v4();
        let (status, json) = send(&app, "GET", &format!("/api/workspaces/{missing}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn view_state_changes() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let id = upload_pdf(&app).await;
        let base = format!("/api/workspaces/{id}");

        let (_, json) = send(&app, "GET", &base, None).await;
        assert_eq!(json["pageCount"], 3);
        assert_eq!(json["currentPage"], 1);
        assert_eq!(json["zoom"], 100);

        let (_, json) = send(&app, "POST", &format!("{base}/page"), Some(json!({ "page": 2 }))).await;
        assert_eq!(json["currentPage"], 2);

        let (status, json) =
            send(&app, "POST", &format!("{base}/page"), Some(json!({ "page": 9 }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["currentPage"], 2);

        let (_, json) = send(&app, "POST", &format!("{base}/zoom"), Some(json!({ "zoom": 500 }))).await;
        assert_eq!(json["zoom"], 300);
        assert_eq!(json["canvasWidth"], 600);

        let (_, json) = send(
            &app,
            "POST",
            &format!("{base}/crop"),
            Some(json!({ "x": 0, "y": 0, "width": 100, "height": 50 })),
        )
        .await;
        assert_eq!(json["isCropped"], true);
        assert_eq!(json["canvasWidth"], 100);

        let (_, json) = send(&app, "GET", &format!("{base}/canvas"), None).await;
        assert!(json["dataUri"].as_str().unwrap().starts_with("data:image/png;base64,"));
        assert_eq!(json["height"], 50);

        let (_, json) = send(&app, "POST", &format!("{base}/restore"), None).await;
        assert_eq!(json["isCropped"], false);
        assert_eq!(json["canvasWidth"], 600);
    }

    #[tokio::test]
    async fn crop_outside_canvas_is_400() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let id = upload_pdf(&app).await;
        let (status, _) = send(
            &app,
            "POST",
            &format!("/api/workspaces/{id}/crop"),
            Some(json!({ "x": 150, "y": 0, "width": 100, "height": 50 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn extraction_qac_and_image_flow() {
        let app = api_router(test_core(scripted_mock()));
        let id = upload_pdf(&app).await;
        let base = format!("/api/workspaces/{id}");

        let (status, json) = send(&app, "POST", &format!("{base}/extract"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["text"], "Hello world");
        assert_eq!(json["confidence"], 92);
        assert_eq!(json["pageNumber"], 1);
        assert_eq!(json["extractionMethod"], "Google Gemini AI (PDF)");
        assert_eq!(json["isQACProcessed"], false);
        let image_id = json["detectedImages"][0]["id"].as_str().unwrap().to_string();
        assert_eq!(json["detectedImages"][0]["description"], "line chart");

        let (status, json) = send(&app, "POST", &format!("{base}/qac"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["isQACProcessed"], true);
        assert_eq!(json["qacText"], "Hello, world");
        assert_eq!(json["qacFixes"][0]["type"], "punctuation");

        let (_, json) = send(&app, "GET", &format!("{base}/extractions"), None).await;
        assert_eq!(json.as_array().unwrap().len(), 1);
        assert_eq!(json[0]["isQACProcessed"], true);

        let (_, json) = send(&app, "GET", &format!("{base}/report"), None).await;
        assert_eq!(json["fileName"], "ocr-results-doc.txt");
        let report = json["report"].as_str().unwrap();
        assert!(report.starts_with("doc.pdf - Page 1\n"));
        assert!(report.contains("Advanced QAC Processed: Yes"));
        assert!(report.ends_with("Extracted Text:\nHello, world"));

        let images = format!("{base}/images/{image_id}");
        let (_, json) =
            send(&app, "POST", &format!("{images}/colorize"), Some(json!({ "checked": true }))).await;
        assert_eq!(json["colorize"], true);

        let (status, json) = send(&app, "POST", &format!("{images}/enhance"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["enhancedImageUrl"], "data:image/png;base64,iVBORw0KGgo=");
        assert_eq!(json["isProcessing"], false);

        let (_, json) = send(&app, "POST", &format!("{images}/base64"), None).await;
        assert!(json["base64"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let (status, _) = send(&app, "POST", &format!("{base}/images/visual_9_0/enhance"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn qac_without_extraction_is_400() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let id = upload_pdf(&app).await;
        let (status, json) = send(&app, "POST", &format!("/api/workspaces/{id}/qac"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            json["error"]["message"],
            "No text available for quality assurance check."
        );
    }

    #[tokio::test]
    async fn busy_activity_returns_409() {
        let core = test_core(MockVisionClient::new("ok"));
        let app = api_router(core.clone());
        let id = upload_pdf(&app).await;

        let entry = core.workspaces().get(&id.parse().unwrap()).unwrap();
        let permit = entry.gate().try_begin(Activity::Ocr).unwrap();
        let (status, json) = send(&app, "POST", &format!("/api/workspaces/{id}/extract"), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["error"]["code"], "BUSY");

        drop(permit);
        let (status, _) = send(&app, "POST", &format!("/api/workspaces/{id}/extract"), None).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn export_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            exports_dir: dir.path().join("exports"),
            ..AppConfig::default()
        };
        let app = api_router(test_core_with_config(config, scripted_mock()));
        let id = upload_pdf(&app).await;
        let base = format!("/api/workspaces/{id}");

        let (status, _) = send(&app, "POST", &format!("{base}/export"), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        send(&app, "POST", &format!("{base}/extract"), None).await;
        let (status, json) = send(&app, "POST", &format!("{base}/export"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["fileName"], "ocr-results-doc.txt");

        let written = std::fs::read_to_string(dir.path().join("exports/ocr-results-doc.txt")).unwrap();
        assert!(written.contains("Extracted Text:\nHello world"));
    }

    #[tokio::test]
    async fn delete_removes_workspace() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let id = upload_pdf(&app).await;
        let (status, _) = send(&app, "DELETE", &format!("/api/workspaces/{id}"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &format!("/api/workspaces/{id}"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    // ── Standalone images ───────────────────────────────────

    #[tokio::test]
    async fn standalone_image_actions() {
        let mock = MockVisionClient::new(
            "ENHANCED_DESCRIPTION: Clean diagram\nIMPROVEMENT_NOTES: none\nARTISTIC_STYLE: line art",
        );
        let app = api_router(test_core(mock));
        let image = solid_canvas(8, 8, [10, 20, 30]).to_data_uri();

        let (status, json) =
            send(&app, "POST", "/api/images/base64", Some(json!({ "image": image }))).await;
        assert_eq!(status, StatusCode::OK);
        assert!(json["base64"].as_str().unwrap().starts_with("data:image/png;base64,"));

        let (_, json) = send(&app, "POST", "/api/images/map", Some(json!({ "image": image }))).await;
        assert_eq!(json["mapping"]["enhancedDescription"], "Clean diagram");
        assert_eq!(json["mapping"]["artisticStyle"], "line art");

        let (_, json) = send(
            &app,
            "POST",
            "/api/images/enhance",
            Some(json!({ "image": image, "colorize": true })),
        )
        .await;
        assert_eq!(json["enhancedImageUrl"], "data:image/png;base64,iVBORw0KGgo=");
    }

    #[tokio::test]
    async fn standalone_enhance_failure_is_502() {
        let app = api_router(test_core(MockVisionClient::failing(GeminiError::MissingApiKey)));
        let image = solid_canvas(8, 8, [0, 0, 0]).to_data_uri();
        let (status, json) =
            send(&app, "POST", "/api/images/enhance", Some(json!({ "image": image }))).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(
            json["error"]["message"],
            "Failed to enhance image with AI. Please try again."
        );
    }

    // ── Middleware ──────────────────────────────────────────

    #[tokio::test]
    async fn rate_limit_returns_429() {
        let core = test_core(MockVisionClient::new("ok"));
        let ctx = ApiContext::with_rate_limiter(core.clone(), RateLimiter::with_limits(1, 100));
        let app = api_router_with_ctx(ctx);

        let (status, _) = send(&app, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);

        let response = app
            .clone()
            .oneshot(make_request("GET", "/api/health", None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get("Retry-After").unwrap(), "60");

        // Only the request that reached the handler stack is audited
        assert_eq!(core.audit_entries().len(), 1);
        assert_eq!(core.audit_entries()[0].action, "GET /api/health");
    }

    #[tokio::test]
    async fn rate_limit_ignores_rotated_forwarded_for() {
        let core = test_core(MockVisionClient::new("ok"));
        let ctx = ApiContext::with_rate_limiter(core, RateLimiter::with_limits(1, 100));
        let limiter = ctx.rate_limiter.clone();
        let app = api_router_with_ctx(ctx);

        let mut statuses = Vec::new();
        for i in 0..20 {
            let request = Request::builder()
                .method("GET")
                .uri("/api/health")
                .header("X-Forwarded-For", format!("10.0.0.{i}"))
                .body(Body::empty())
                .unwrap();
            statuses.push(app.clone().oneshot(request).await.unwrap().status());
        }

        assert_eq!(statuses[0], StatusCode::OK);
        assert!(statuses[1..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS));
        assert_eq!(limiter.lock().unwrap().tracked_clients(), 1);
    }

    #[tokio::test]
    async fn cors_allows_browser_origin() {
        let app = api_router(test_core(MockVisionClient::new("ok")));
        let request = Request::builder()
            .method("GET")
            .uri("/api/health")
            .header("Origin", "http://localhost:3000")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(
            response.headers().get("access-control-allow-origin").unwrap(),
            "*"
        );
    }
}
