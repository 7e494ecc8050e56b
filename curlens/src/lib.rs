//! # curlens
//!
//! A self-hostable analyzer for AWS Cost and Usage Report (CUR) consumption
//! exports. A `.parquet` export is uploaded once per session, forwarded to a
//! remote processing function with a server-held API key, and the returned
//! consumption records are served back through report views:
//!
//! - **All records**: the full batch, in original order
//! - **Per-service views**: one per distinct service, first-seen order
//! - **Analytics**: per-unit aggregation, composite service/unit totals, and
//!   a top-15 quantity ranking for cost estimation
//!
//! The visible rows of the active view can be exported as an indented JSON
//! document with a deterministic filename.
//!
//! ## Architecture
//!
//! - [`report`]: the pure core — record schema, aggregation engine, view
//!   partitioning, export serialization
//! - [`processor`]: client for the remote processing function
//! - [`api`]: axum handlers and request/response models
//! - [`config`] / [`telemetry`] / [`errors`]: service plumbing
//!
//! ## Usage
//!
//! ```ignore
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = curlens::config::Args::parse();
//!     let config = curlens::Config::load(&args)?;
//!     curlens::telemetry::init_telemetry()?;
//!     curlens::Application::new(config)?.serve(shutdown_signal()).await
//! }
//! ```

pub mod api;
pub mod config;
pub mod errors;
mod openapi;
pub mod processor;
pub mod report;
pub mod telemetry;

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::HeaderValue;
use axum::{
    Router, http,
    routing::{get, post, put},
};
use bon::Builder;
pub use config::Config;
use config::CorsOrigin;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, info};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::openapi::ApiDoc;
use crate::processor::ProcessorClient;
use crate::report::ReportSession;

/// Application state shared across all request handlers.
///
/// Holds the validated configuration, the processing-function client built
/// once at startup, and the single report session. The service is
/// single-user and single-session; the lock exists to make the shared state
/// sound, not to coordinate concurrent users.
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub processor: Arc<ProcessorClient>,
    #[builder(default)]
    pub session: Arc<RwLock<ReportSession>>,
}

fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.cors.allow_credentials)
        .expose_headers(vec![http::header::CONTENT_DISPOSITION]);

    if let Some(max_age) = config.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the main application router with all endpoints and middleware.
///
/// - Report endpoints under `/api/v1`
/// - Liveness probe at `/healthz`
/// - OpenAPI documentation at `/docs`
/// - CORS and tracing layers
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    // Upload route with a body limit sized from config (other routes use the default)
    let upload_limit = state.config.upload.max_file_size;
    let upload_router = Router::new().route(
        "/reports",
        post(api::handlers::reports::upload_report).layer(DefaultBodyLimit::max(upload_limit as usize)),
    );

    let api_routes = Router::new()
        .merge(upload_router)
        .route(
            "/reports/current",
            get(api::handlers::reports::get_report).delete(api::handlers::reports::clear_report),
        )
        .route("/reports/current/views", get(api::handlers::reports::list_views))
        .route("/reports/current/view", put(api::handlers::reports::select_view))
        .route("/reports/current/analytics", get(api::handlers::reports::get_analytics))
        .route("/reports/current/export", get(api::handlers::reports::export_report))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api/v1", api_routes)
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The assembled service, ready to bind and serve.
pub struct Application {
    router: Router,
    config: Config,
}

impl Application {
    /// Create a new application instance with all resources initialized.
    ///
    /// The processor client is built here, so missing processor
    /// configuration fails at startup rather than on the first upload.
    pub fn new(config: Config) -> anyhow::Result<Self> {
        let processor = ProcessorClient::from_config(&config)?;

        let state = AppState::builder()
            .config(config.clone())
            .processor(Arc::new(processor))
            .build();

        let router = build_router(&state)?;

        Ok(Self { router, config })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!(
            "CUR analyzer listening on http://{}, available at http://localhost:{}",
            bind_addr, self.config.port
        );

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::api::models::reports::{AnalyticsResponse, ReportRowsResponse, ViewListResponse};
    use crate::config::ProcessorConfig;
    use crate::report::{ConsumptionRecord, ViewId};
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use axum_test::multipart::{MultipartForm, Part};
    use serde_json::json;
    use url::Url;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(processor_uri: &str) -> Config {
        Config {
            processor: ProcessorConfig {
                url: Some(Url::parse(processor_uri).expect("mock server uri should parse")),
                api_key: Some("test-key".to_string()),
                ..ProcessorConfig::default()
            },
            ..Config::default()
        }
    }

    fn spawn_app(processor_uri: &str) -> TestServer {
        // Tests skip main(), so install the rustls crypto provider here; ignore
        // the error when another test already installed it.
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
        Application::new(test_config(processor_uri))
            .expect("application should build")
            .into_test_server()
    }

    fn sample_records() -> serde_json::Value {
        json!([
            {"service": "AmazonEC2", "usageType": "BoxUsage:t3.micro", "unit": "Hrs", "quantity": 100.5},
            {"service": "AmazonS3", "usageType": "TimedStorage-ByteHrs", "unit": "GB", "quantity": 50.2},
            {"service": "AmazonEC2", "usageType": "BoxUsage:m5.large", "unit": "Hrs", "quantity": 25.8}
        ])
    }

    fn parquet_upload(filename: &str, size: usize) -> MultipartForm {
        MultipartForm::new().add_part("file", Part::bytes(vec![0u8; size]).file_name(filename))
    }

    async fn mock_processor(records: serde_json::Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("x-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(records))
            .mount(&server)
            .await;
        server
    }

    #[test_log::test(tokio::test)]
    async fn upload_loads_the_default_all_records_view() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());

        let response = server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await;
        response.assert_status(StatusCode::OK);

        let report: ReportRowsResponse = response.json();
        assert_eq!(report.view, ViewId::AllRecords);
        assert_eq!(report.columns, vec!["service", "usageType", "unit", "quantity"]);
        assert_eq!(report.total_rows, 3);
        assert_eq!(report.total_records, 3);
        assert_eq!(report.rows[0].service(), "AmazonEC2");
    }

    #[test_log::test(tokio::test)]
    async fn upload_with_wrong_extension_is_rejected_before_any_network_call() {
        let processor = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&processor)
            .await;
        let server = spawn_app(&processor.uri());

        let response = server
            .post("/api/v1/reports")
            .multipart(parquet_upload("report.csv", 4096))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert!(body["detail"].as_str().unwrap().contains("Invalid file type"));

        processor.verify().await;
    }

    #[test_log::test(tokio::test)]
    async fn undersized_upload_is_rejected_locally() {
        let processor = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&processor)
            .await;
        let server = spawn_app(&processor.uri());

        let response = server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 10))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        processor.verify().await;
    }

    #[test_log::test(tokio::test)]
    async fn upload_without_a_file_field_is_rejected() {
        let processor = MockServer::start().await;
        let server = spawn_app(&processor.uri());

        let response = server
            .post("/api/v1/reports")
            .multipart(MultipartForm::new().add_text("comment", "no file here"))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "Missing required field: 'file'");
    }

    #[test_log::test(tokio::test)]
    async fn remote_error_status_and_detail_pass_through() {
        let processor = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("internal error"))
            .mount(&processor)
            .await;
        let server = spawn_app(&processor.uri());

        let response = server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await;
        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

        let body: serde_json::Value = response.json();
        assert_eq!(body["detail"], "internal error");
    }

    #[test_log::test(tokio::test)]
    async fn selecting_views_filters_rows_but_not_columns() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);

        let response = server
            .put("/api/v1/reports/current/view")
            .json(&json!({"view": {"kind": "service", "name": "AmazonEC2"}}))
            .await;
        response.assert_status(StatusCode::OK);
        let report: ReportRowsResponse = response.json();
        assert_eq!(report.view, ViewId::Service("AmazonEC2".to_string()));
        assert_eq!(report.total_rows, 2);
        assert_eq!(report.columns, vec!["service", "usageType", "unit", "quantity"]);

        // A service absent from the batch resolves to an empty row set.
        let response = server
            .put("/api/v1/reports/current/view")
            .json(&json!({"view": {"kind": "service", "name": "AmazonRDS"}}))
            .await;
        response.assert_status(StatusCode::OK);
        let report: ReportRowsResponse = response.json();
        assert_eq!(report.total_rows, 0);
        assert_eq!(report.columns, vec!["service", "usageType", "unit", "quantity"]);
    }

    #[test_log::test(tokio::test)]
    async fn view_list_has_reserved_views_and_per_service_entries() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);

        let views: ViewListResponse = server.get("/api/v1/reports/current/views").await.json();
        let summary: Vec<(ViewId, usize)> = views.views.into_iter().map(|v| (v.view, v.row_count)).collect();
        assert_eq!(
            summary,
            vec![
                (ViewId::AllRecords, 3),
                (ViewId::Service("AmazonEC2".to_string()), 2),
                (ViewId::Service("AmazonS3".to_string()), 1),
                (ViewId::Analytics, 0),
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn analytics_surface_matches_the_worked_scenario() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);

        let analytics: AnalyticsResponse = server.get("/api/v1/reports/current/analytics").await.json();

        let hrs = &analytics.by_unit[0];
        assert_eq!(hrs.unit, "Hrs");
        assert_eq!(hrs.total_quantity, 100.5 + 25.8);
        assert_eq!(hrs.services, vec!["AmazonEC2"]);

        assert_eq!(analytics.by_service_unit[0].key, "AmazonEC2 (Hrs)");
        assert_eq!(analytics.top_by_quantity[0].quantity(), 100.5);
        assert_eq!(analytics.distinct_services, 2);
        assert_eq!(analytics.distinct_units, 2);
        assert_eq!(analytics.total_records, 3);
    }

    #[test_log::test(tokio::test)]
    async fn export_of_the_all_records_view_round_trips() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);

        let response = server.get("/api/v1/reports/current/export").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"consumption_report.json\""
        );

        let exported: Vec<ConsumptionRecord> = serde_json::from_slice(response.as_bytes()).unwrap();
        let original: Vec<ConsumptionRecord> = serde_json::from_value(sample_records()).unwrap();
        assert_eq!(exported, original);
    }

    #[test_log::test(tokio::test)]
    async fn service_view_export_uses_a_sanitized_filename() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);
        server
            .put("/api/v1/reports/current/view")
            .json(&json!({"view": {"kind": "service", "name": "AmazonEC2"}}))
            .await
            .assert_status(StatusCode::OK);

        let response = server.get("/api/v1/reports/current/export").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(
            response.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"amazonec2_consumption_report.json\""
        );

        let exported: Vec<ConsumptionRecord> = serde_json::from_slice(response.as_bytes()).unwrap();
        assert_eq!(exported.len(), 2);
    }

    #[test_log::test(tokio::test)]
    async fn analytics_view_export_is_rejected() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);
        server
            .put("/api/v1/reports/current/view")
            .json(&json!({"view": {"kind": "analytics"}}))
            .await
            .assert_status(StatusCode::OK);

        let response = server.get("/api/v1/reports/current/export").await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[test_log::test(tokio::test)]
    async fn report_endpoints_404_without_an_upload() {
        let processor = MockServer::start().await;
        let server = spawn_app(&processor.uri());

        for path in [
            "/api/v1/reports/current",
            "/api/v1/reports/current/views",
            "/api/v1/reports/current/analytics",
            "/api/v1/reports/current/export",
        ] {
            let response = server.get(path).await;
            response.assert_status(StatusCode::NOT_FOUND);
            let body: serde_json::Value = response.json();
            assert_eq!(body["detail"], "No report loaded");
        }

        server
            .put("/api/v1/reports/current/view")
            .json(&json!({"view": {"kind": "all_records"}}))
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test_log::test(tokio::test)]
    async fn clearing_discards_the_batch_and_all_derived_state() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);

        server
            .delete("/api/v1/reports/current")
            .await
            .assert_status(StatusCode::NO_CONTENT);
        server.get("/api/v1/reports/current").await.assert_status(StatusCode::NOT_FOUND);

        // Clearing an idle session is a no-op, not an error.
        server
            .delete("/api/v1/reports/current")
            .await
            .assert_status(StatusCode::NO_CONTENT);
    }

    #[test_log::test(tokio::test)]
    async fn a_new_upload_replaces_the_batch_and_resets_the_selection() {
        let processor = mock_processor(sample_records()).await;
        let server = spawn_app(&processor.uri());
        server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .assert_status(StatusCode::OK);
        server
            .put("/api/v1/reports/current/view")
            .json(&json!({"view": {"kind": "service", "name": "AmazonS3"}}))
            .await
            .assert_status(StatusCode::OK);

        let report: ReportRowsResponse = server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .json();
        assert_eq!(report.view, ViewId::AllRecords);
        assert_eq!(report.total_rows, 3);
    }

    #[test_log::test(tokio::test)]
    async fn empty_processor_result_loads_an_empty_batch() {
        let processor = mock_processor(json!([])).await;
        let server = spawn_app(&processor.uri());

        let report: ReportRowsResponse = server
            .post("/api/v1/reports")
            .multipart(parquet_upload("daily.parquet", 4096))
            .await
            .json();
        assert_eq!(report.total_records, 0);
        assert!(report.columns.is_empty());

        let analytics: AnalyticsResponse = server.get("/api/v1/reports/current/analytics").await.json();
        assert_eq!(analytics.total_records, 0);
        assert!(analytics.by_unit.is_empty());
    }

    #[test_log::test(tokio::test)]
    async fn healthz_responds() {
        let processor = MockServer::start().await;
        let server = spawn_app(&processor.uri());
        let response = server.get("/healthz").await;
        response.assert_status(StatusCode::OK);
        assert_eq!(response.text(), "OK");
    }
}
