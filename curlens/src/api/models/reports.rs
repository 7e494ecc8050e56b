use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::report::{AggregationResult, LoadedReport, ServiceUnitQuantity, UnitAnalysis, ViewId, resolve_rows};

/// One selectable view and its row count
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ViewSummary {
    #[schema(value_type = Object)]
    pub view: ViewId,
    pub label: String,
    pub row_count: usize,
}

/// Response for the view list
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ViewListResponse {
    pub views: Vec<ViewSummary>,
}

impl ViewListResponse {
    pub fn from_report(report: &LoadedReport) -> Self {
        let views = report
            .views()
            .into_iter()
            .map(|view| ViewSummary {
                label: view.label().to_string(),
                row_count: resolve_rows(report.batch(), report.partition(), &view).len(),
                view,
            })
            .collect();
        Self { views }
    }
}

/// The rows of one view, with the batch-wide column set
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReportRowsResponse {
    /// The view these rows belong to
    #[schema(value_type = Object)]
    pub view: ViewId,
    pub label: String,
    /// Column set inferred from the first record of the batch; identical
    /// for every view
    pub columns: Vec<String>,
    #[schema(value_type = Vec<Object>)]
    pub rows: Vec<crate::report::ConsumptionRecord>,
    /// Rows in this view
    pub total_rows: usize,
    /// Records in the whole batch
    pub total_records: usize,
}

impl ReportRowsResponse {
    pub fn from_report(report: &LoadedReport) -> Self {
        let view = report.effective_view();
        let rows = report.visible_rows().to_vec();
        Self {
            label: view.label().to_string(),
            columns: report.columns().to_vec(),
            total_rows: rows.len(),
            total_records: report.batch().len(),
            rows,
            view,
        }
    }
}

/// Request body for selecting the active view
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SelectViewRequest {
    #[schema(value_type = Object)]
    pub view: ViewId,
}

/// Per-unit analysis entry
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UnitAnalysisResponse {
    pub unit: String,
    pub total_quantity: f64,
    pub service_count: usize,
    pub usage_type_count: usize,
    pub record_count: usize,
    pub services: Vec<String>,
    pub usage_types: Vec<String>,
}

impl UnitAnalysisResponse {
    fn from_analysis(analysis: &UnitAnalysis) -> Self {
        Self {
            unit: analysis.unit.clone(),
            total_quantity: analysis.total_quantity,
            service_count: analysis.services.len(),
            usage_type_count: analysis.usage_types.len(),
            record_count: analysis.records.len(),
            services: analysis.services.iter().cloned().collect(),
            usage_types: analysis.usage_types.iter().cloned().collect(),
        }
    }
}

/// Composite "Service (Unit)" total
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ServiceUnitResponse {
    pub key: String,
    pub quantity: f64,
}

/// The analytics surface for the current batch
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AnalyticsResponse {
    pub by_unit: Vec<UnitAnalysisResponse>,
    pub by_service_unit: Vec<ServiceUnitResponse>,
    /// Highest-quantity records, descending, for cost estimation
    #[schema(value_type = Vec<Object>)]
    pub top_by_quantity: Vec<crate::report::ConsumptionRecord>,
    pub distinct_services: usize,
    pub distinct_usage_types: usize,
    pub distinct_units: usize,
    pub total_records: usize,
}

impl AnalyticsResponse {
    pub fn from_result(result: &AggregationResult) -> Self {
        Self {
            by_unit: result.by_unit.iter().map(UnitAnalysisResponse::from_analysis).collect(),
            by_service_unit: result
                .by_service_unit
                .iter()
                .map(|ServiceUnitQuantity { key, quantity }| ServiceUnitResponse {
                    key: key.clone(),
                    quantity: *quantity,
                })
                .collect(),
            top_by_quantity: result.top_by_quantity.clone(),
            distinct_services: result.distinct_services,
            distinct_usage_types: result.distinct_usage_types,
            distinct_units: result.distinct_units,
            total_records: result.total_records,
        }
    }
}
