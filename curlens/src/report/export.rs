//! Export of the currently visible row set as a downloadable document.
//!
//! The body is an indented JSON array that round-trips: re-parsing the bytes
//! reproduces the exported rows with record order and per-record field order
//! intact. Filenames derive deterministically from the view.

use crate::errors::{Error, Result};

use super::records::ConsumptionRecord;
use super::views::ViewId;

pub const EXPORT_CONTENT_TYPE: &str = "application/json";

/// Canonical filename for the all-records view.
const ALL_RECORDS_FILENAME: &str = "consumption_report.json";
/// Suffix appended to sanitized service-view names.
const REPORT_SUFFIX: &str = "_consumption_report.json";

/// A serialized report ready for download.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportDocument {
    pub bytes: Vec<u8>,
    pub filename: String,
    pub content_type: &'static str,
}

/// Serialize `rows` for download under the given view.
///
/// The analytics view has no row set and is rejected; its surface is served
/// as structured analytics instead.
pub fn export_rows(rows: &[ConsumptionRecord], view: &ViewId) -> Result<ExportDocument> {
    if *view == ViewId::Analytics {
        return Err(Error::BadRequest {
            message: "The analytics view has no row export".to_string(),
        });
    }

    let bytes = serde_json::to_vec_pretty(rows).map_err(|e| Error::Internal {
        operation: format!("serialize export document: {e}"),
    })?;

    Ok(ExportDocument {
        bytes,
        filename: export_filename(view),
        content_type: EXPORT_CONTENT_TYPE,
    })
}

/// Deterministic filename for a view: the all-records view maps to a fixed
/// canonical name, service views to a sanitized token plus a fixed suffix.
pub fn export_filename(view: &ViewId) -> String {
    match view {
        ViewId::AllRecords => ALL_RECORDS_FILENAME.to_string(),
        _ => format!("{}{}", sanitize_view_name(view.label()), REPORT_SUFFIX),
    }
}

/// Reduce a view label to a filesystem-safe token: lowercase, alphanumeric
/// runs joined by single underscores.
fn sanitize_view_name(label: &str) -> String {
    let mut token = String::with_capacity(label.len());
    let mut last_was_separator = true;
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            token.extend(ch.to_lowercase());
            last_was_separator = false;
        } else if !last_was_separator {
            token.push('_');
            last_was_separator = true;
        }
    }
    let token = token.trim_end_matches('_');
    if token.is_empty() { "view".to_string() } else { token.to_string() }
}
