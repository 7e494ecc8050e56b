//! Aggregation engine: turns a flat batch of consumption records into the
//! per-unit, per-service-and-unit, and top-N analytics that back the
//! analytics view.
//!
//! Everything here is pure and recomputed from scratch whenever a new batch
//! arrives. Quantities are only ever summed within a single unit key; no
//! rounding or unit conversion happens anywhere.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use super::records::ConsumptionRecord;

/// Number of records kept in the quantity ranking, a proxy for the most
/// significant consumption line items when estimating cost.
pub const TOP_RANKED_ITEMS: usize = 15;

/// Totals and distinct trackers for one unit of measure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnitAnalysis {
    /// Unit key, normalized (`"Unknown"` for absent units).
    pub unit: String,
    /// Sum of quantities over all records with this unit.
    pub total_quantity: f64,
    /// Distinct services contributing to this unit.
    pub services: BTreeSet<String>,
    /// Distinct usage types seen under this unit.
    pub usage_types: BTreeSet<String>,
    /// The records themselves, in batch order.
    pub records: Vec<ConsumptionRecord>,
}

/// Summed quantity under a `"Service (Unit)"` composite key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceUnitQuantity {
    pub key: String,
    pub quantity: f64,
}

/// Derived analytics for one batch. Immutable once built.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Per-unit analysis, in first-seen unit order.
    pub by_unit: Vec<UnitAnalysis>,
    /// Composite service/unit totals, in first-seen order.
    pub by_service_unit: Vec<ServiceUnitQuantity>,
    /// The highest-quantity records, descending, ties in batch order.
    pub top_by_quantity: Vec<ConsumptionRecord>,
    pub distinct_services: usize,
    pub distinct_usage_types: usize,
    pub distinct_units: usize,
    pub total_records: usize,
}

/// Aggregate a batch of consumption records.
///
/// Single pass for the grouping work plus one stable sort for the ranking.
/// The input is never mutated or reordered; an empty batch yields an
/// empty/zeroed result rather than an error.
pub fn aggregate(records: &[ConsumptionRecord]) -> AggregationResult {
    let mut by_unit: Vec<UnitAnalysis> = Vec::new();
    let mut unit_index: HashMap<String, usize> = HashMap::new();

    let mut by_service_unit: Vec<ServiceUnitQuantity> = Vec::new();
    let mut service_unit_index: HashMap<String, usize> = HashMap::new();

    let mut services: HashSet<&str> = HashSet::new();
    let mut usage_types: HashSet<&str> = HashSet::new();

    for record in records {
        let unit = record.unit();
        let service = record.service();
        let usage_type = record.usage_type();
        let quantity = record.quantity();

        let slot = *unit_index.entry(unit.to_string()).or_insert_with(|| {
            by_unit.push(UnitAnalysis {
                unit: unit.to_string(),
                ..UnitAnalysis::default()
            });
            by_unit.len() - 1
        });
        let analysis = &mut by_unit[slot];
        analysis.total_quantity += quantity;
        analysis.services.insert(service.to_string());
        analysis.usage_types.insert(usage_type.to_string());
        analysis.records.push(record.clone());

        let composite = format!("{service} ({unit})");
        match service_unit_index.get(&composite) {
            Some(&slot) => by_service_unit[slot].quantity += quantity,
            None => {
                service_unit_index.insert(composite.clone(), by_service_unit.len());
                by_service_unit.push(ServiceUnitQuantity { key: composite, quantity });
            }
        }

        services.insert(service);
        usage_types.insert(usage_type);
    }

    // Stable sort: records with equal quantity keep their batch order, so
    // repeated renders of the same batch rank identically.
    let mut top_by_quantity = records.to_vec();
    top_by_quantity.sort_by(|a, b| b.quantity().total_cmp(&a.quantity()));
    top_by_quantity.truncate(TOP_RANKED_ITEMS);

    AggregationResult {
        distinct_services: services.len(),
        distinct_usage_types: usage_types.len(),
        distinct_units: by_unit.len(),
        total_records: records.len(),
        by_unit,
        by_service_unit,
        top_by_quantity,
    }
}
