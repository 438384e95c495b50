//! Display helpers for analysis timestamps.

use trailblazer_dash_protocol::Analysis;

use crate::store::parse_timestamp;

/// Calendar date (`YYYY-MM-DD`) of an API timestamp; empty when unreadable.
pub fn format_date(raw: &str) -> String {
    parse_timestamp(raw)
        .map(|parsed| parsed.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Whole hours between two API timestamps, rendered as `"5h"`.
///
/// Rounds toward negative infinity, so a run that "ends" before it starts
/// reads as a negative duration rather than being hidden.
pub fn run_duration(started_at: &str, completed_at: &str) -> Option<String> {
    let started = parse_timestamp(started_at)?;
    let completed = parse_timestamp(completed_at)?;
    let hours = (completed - started).num_seconds().div_euclid(3600);
    Some(format!("{}h", hours))
}

/// [`run_duration`] for a finished analysis.
pub fn analysis_run_duration(analysis: &Analysis) -> Option<String> {
    run_duration(
        analysis.started_at.as_deref()?,
        analysis.completed_at.as_deref()?,
    )
}
