//! OpenAPI document assembly.

use utoipa::OpenApi;

use crate::api;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "curlens",
        description = "Consumption analytics over AWS Cost and Usage Report exports"
    ),
    paths(
        api::handlers::reports::upload_report,
        api::handlers::reports::get_report,
        api::handlers::reports::list_views,
        api::handlers::reports::select_view,
        api::handlers::reports::get_analytics,
        api::handlers::reports::export_report,
        api::handlers::reports::clear_report,
    ),
    components(schemas(
        api::models::reports::ReportRowsResponse,
        api::models::reports::ViewListResponse,
        api::models::reports::ViewSummary,
        api::models::reports::SelectViewRequest,
        api::models::reports::AnalyticsResponse,
        api::models::reports::UnitAnalysisResponse,
        api::models::reports::ServiceUnitResponse,
    )),
    tags(
        (name = "reports", description = "Upload, view selection, analytics, and export")
    )
)]
pub struct ApiDoc;
