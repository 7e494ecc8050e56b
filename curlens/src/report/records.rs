//! Consumption record schema.
//!
//! The remote processing function returns a flat JSON array of consumption
//! records. The column set is not fixed at compile time: different CUR
//! exports carry different columns, so each record is an order-preserving
//! mapping from field names to scalar values. Well-known fields (`service`,
//! `usageType`, `unit`, `quantity`) get typed accessors; everything else is
//! carried through untouched for rendering and export.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// AWS service identifier field (e.g. `"AmazonEC2"`).
pub const SERVICE_FIELD: &str = "service";
/// Free-form usage-type label field.
pub const USAGE_TYPE_FIELD: &str = "usageType";
/// Pricing/measurement unit field (e.g. `"Hrs"`, `"GB"`).
pub const UNIT_FIELD: &str = "unit";
/// Consumed amount field.
pub const QUANTITY_FIELD: &str = "quantity";

/// Fallback unit key for records with a missing, null, or empty unit.
pub const UNKNOWN_UNIT: &str = "Unknown";

/// One consumption line item from a processed CUR export.
///
/// Field order is preserved from the processor response (`serde_json` with
/// `preserve_order`), so a batch renders and exports with the exact column
/// order the processor produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConsumptionRecord(pub Map<String, Value>);

impl ConsumptionRecord {
    /// Raw field lookup.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String value of a field, `None` for missing or non-string values.
    pub fn field_str(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(Value::as_str)
    }

    /// AWS service identifier, empty string when absent.
    pub fn service(&self) -> &str {
        self.field_str(SERVICE_FIELD).unwrap_or("")
    }

    /// Usage-type label, empty string when absent.
    pub fn usage_type(&self) -> &str {
        self.field_str(USAGE_TYPE_FIELD).unwrap_or("")
    }

    /// Unit of measure. Missing, null, and empty-string units all normalize
    /// to [`UNKNOWN_UNIT`] so quantities without a denomination still group
    /// under one key.
    pub fn unit(&self) -> &str {
        match self.field_str(UNIT_FIELD) {
            Some(unit) if !unit.is_empty() => unit,
            _ => UNKNOWN_UNIT,
        }
    }

    /// Consumed quantity. Treated as an opaque real number; non-numeric or
    /// missing values read as `0.0` so summation and ranking stay total.
    pub fn quantity(&self) -> f64 {
        self.0.get(QUANTITY_FIELD).and_then(Value::as_f64).unwrap_or(0.0)
    }

    /// Field names in record order.
    pub fn fields(&self) -> impl Iterator<Item = &String> {
        self.0.keys()
    }
}

/// Infer the column set for a batch from its first record.
///
/// The batch is assumed uniform: the first record's keys define the schema
/// for every row. The inferred list is computed once per batch and passed
/// explicitly to response building and export rather than re-derived.
/// An empty batch has an empty schema.
pub fn infer_schema(batch: &[ConsumptionRecord]) -> Vec<String> {
    batch.first().map(|record| record.fields().cloned().collect()).unwrap_or_default()
}
