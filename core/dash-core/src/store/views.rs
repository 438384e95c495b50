//! Derived read views over store state.
//!
//! Pure functions; the store calls them on every read, so nothing here is
//! cached.

use chrono::{DateTime, NaiveDateTime, Utc};
use trailblazer_dash_protocol::{Analysis, AnalysisStatus, JobStat};

/// Records with `status`, in collection order. Unrecognized statuses never match.
pub fn filter_by_status(analyses: &[Analysis], status: AnalysisStatus) -> Vec<Analysis> {
    if status == AnalysisStatus::Unknown {
        return Vec::new();
    }
    analyses
        .iter()
        .filter(|analysis| analysis.status == status)
        .cloned()
        .collect()
}

/// Job stats by descending count. Ties keep their original order.
pub fn rank_job_stats(stats: &[JobStat]) -> Vec<JobStat> {
    let mut ranked = stats.to_vec();
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked
}

/// Parses the timestamp formats the API emits.
///
/// Offset-less timestamps are taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(parsed) = DateTime::parse_from_rfc2822(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
}

const UNITS: [(i64, &str); 5] = [
    (31_536_000, "year"),
    (2_592_000, "month"),
    (86_400, "day"),
    (3_600, "hour"),
    (60, "minute"),
];

/// Human-readable elapsed time, e.g. `"3 hours"`.
///
/// Picks the largest unit with a whole count of at least one. Timestamps in
/// the future read as zero seconds.
pub fn time_since(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let seconds = (now - then).num_seconds().max(0);
    for (size, unit) in UNITS {
        let count = seconds / size;
        if count >= 1 {
            return plural(count, unit);
        }
    }
    plural(seconds, "second")
}

fn plural(count: i64, unit: &str) -> String {
    if count == 1 {
        format!("{} {}", count, unit)
    } else {
        format!("{} {}s", count, unit)
    }
}
