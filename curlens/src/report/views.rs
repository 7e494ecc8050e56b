//! View model: partitions a batch into selectable views and tracks which
//! view is active.
//!
//! A view is either the full batch ("all records"), the rows of one service,
//! or the analytics surface. Reserved identifiers are structurally disjoint
//! from service names via [`ViewId`], so a service literally named
//! "all records" can never collide with the sentinel.

use serde::{Deserialize, Serialize};

use super::aggregate::{AggregationResult, aggregate};
use super::records::{ConsumptionRecord, infer_schema};

/// Identifier for a selectable report view.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum ViewId {
    /// The full batch in original order.
    AllRecords,
    /// The analytics surface; row resolution is irrelevant for this view.
    Analytics,
    /// The rows of a single service.
    Service(String),
}

impl ViewId {
    /// Human-readable label, used for display and export naming.
    pub fn label(&self) -> &str {
        match self {
            ViewId::AllRecords => "All records",
            ViewId::Analytics => "Analytics",
            ViewId::Service(name) => name,
        }
    }
}

/// Rows of one service, in batch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceGroup {
    pub service: String,
    pub records: Vec<ConsumptionRecord>,
}

/// Per-service partition of a batch, preserving first-seen service order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ViewPartition {
    groups: Vec<ServiceGroup>,
}

impl ViewPartition {
    /// Partition a batch by service. Single pass; records keep batch order
    /// within each group.
    pub fn partition(batch: &[ConsumptionRecord]) -> Self {
        let mut groups: Vec<ServiceGroup> = Vec::new();
        for record in batch {
            let service = record.service();
            match groups.iter_mut().find(|g| g.service == service) {
                Some(group) => group.records.push(record.clone()),
                None => groups.push(ServiceGroup {
                    service: service.to_string(),
                    records: vec![record.clone()],
                }),
            }
        }
        Self { groups }
    }

    pub fn groups(&self) -> &[ServiceGroup] {
        &self.groups
    }

    /// Rows for a service, or an empty slice when the service is absent.
    pub fn service_rows(&self, service: &str) -> &[ConsumptionRecord] {
        self.groups
            .iter()
            .find(|g| g.service == service)
            .map(|g| g.records.as_slice())
            .unwrap_or(&[])
    }
}

/// Resolve the visible row set for a view.
///
/// "All records" returns the batch unchanged; a service view returns its
/// partition rows (empty when the service is unexpectedly absent, never an
/// error); the analytics view has no row set, its surface consumes the
/// [`AggregationResult`] instead.
pub fn resolve_rows<'a>(
    batch: &'a [ConsumptionRecord],
    partition: &'a ViewPartition,
    view: &ViewId,
) -> &'a [ConsumptionRecord] {
    match view {
        ViewId::AllRecords => batch,
        ViewId::Analytics => &[],
        ViewId::Service(name) => partition.service_rows(name),
    }
}

/// A loaded batch and everything derived from it.
///
/// All derivations are computed once at load and never mutated; selecting a
/// view only changes which rows are visible, never the column set.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedReport {
    batch: Vec<ConsumptionRecord>,
    columns: Vec<String>,
    partition: ViewPartition,
    analytics: AggregationResult,
    active_view: Option<ViewId>,
}

impl LoadedReport {
    pub fn new(batch: Vec<ConsumptionRecord>) -> Self {
        let columns = infer_schema(&batch);
        let partition = ViewPartition::partition(&batch);
        let analytics = aggregate(&batch);
        Self {
            batch,
            columns,
            partition,
            analytics,
            active_view: None,
        }
    }

    pub fn batch(&self) -> &[ConsumptionRecord] {
        &self.batch
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn partition(&self) -> &ViewPartition {
        &self.partition
    }

    pub fn analytics(&self) -> &AggregationResult {
        &self.analytics
    }

    /// The active view, lazily defaulting to "all records" when nothing has
    /// been selected yet.
    pub fn effective_view(&self) -> ViewId {
        self.active_view.clone().unwrap_or(ViewId::AllRecords)
    }

    pub fn select_view(&mut self, view: ViewId) {
        self.active_view = Some(view);
    }

    /// Rows of the active view.
    pub fn visible_rows(&self) -> &[ConsumptionRecord] {
        resolve_rows(&self.batch, &self.partition, &self.effective_view())
    }

    /// All selectable views: all records, one per service (first-seen
    /// order), then analytics.
    pub fn views(&self) -> Vec<ViewId> {
        let mut views = Vec::with_capacity(self.partition.groups().len() + 2);
        views.push(ViewId::AllRecords);
        views.extend(self.partition.groups().iter().map(|g| ViewId::Service(g.service.clone())));
        views.push(ViewId::Analytics);
        views
    }
}

/// Session state machine.
///
/// `Idle` until a batch arrives; `load` replaces any previous batch
/// wholesale, `clear` discards the batch and every derivation.
#[derive(Debug, Default)]
pub enum ReportSession {
    #[default]
    Idle,
    Loaded(LoadedReport),
}

impl ReportSession {
    /// Load a fresh batch, discarding any previous one.
    pub fn load(&mut self, batch: Vec<ConsumptionRecord>) -> &LoadedReport {
        *self = ReportSession::Loaded(LoadedReport::new(batch));
        match self {
            ReportSession::Loaded(report) => report,
            ReportSession::Idle => unreachable!("session was just loaded"),
        }
    }

    /// Back to `Idle`, discarding the batch and all derived state.
    pub fn clear(&mut self) {
        *self = ReportSession::Idle;
    }

    pub fn loaded(&self) -> Option<&LoadedReport> {
        match self {
            ReportSession::Loaded(report) => Some(report),
            ReportSession::Idle => None,
        }
    }

    pub fn loaded_mut(&mut self) -> Option<&mut LoadedReport> {
        match self {
            ReportSession::Loaded(report) => Some(report),
            ReportSession::Idle => None,
        }
    }
}
