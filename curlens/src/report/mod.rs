//! Report core: record schema, aggregation, view partitioning, and export.
//!
//! Everything in this module is pure with respect to a batch: a batch
//! arrives once per successful upload, every derivation is recomputed from
//! scratch, and nothing survives a `clear`. The HTTP layer in
//! [`crate::api`] is a thin shell around these types.

pub mod aggregate;
pub mod export;
pub mod records;
pub mod views;

pub use aggregate::{AggregationResult, ServiceUnitQuantity, TOP_RANKED_ITEMS, UnitAnalysis, aggregate};
pub use export::{ExportDocument, export_filename, export_rows};
pub use records::{ConsumptionRecord, infer_schema};
pub use views::{LoadedReport, ReportSession, ServiceGroup, ViewId, ViewPartition, resolve_rows};
