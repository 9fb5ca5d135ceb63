//! Wire models for projects, tasks and their statistics
//!
//! Field names follow the board API (`_id`, camelCase). Drafts and patches are
//! the request bodies sent for create and update calls.

mod project;
mod stats;
mod task;

pub use project::{Project, ProjectDraft, ProjectPatch, ProjectStatus};
pub use stats::{ProjectStats, StatusStat, TaskStats};
pub use task::{ReorderRequest, Task, TaskDraft, TaskPatch, TaskPriority, TaskStatus};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer};

/// Accepts either an RFC 3339 timestamp or a bare `YYYY-MM-DD` date.
///
/// Date inputs on the board send bare dates; the server echoes full timestamps.
pub(crate) fn deserialize_optional_datetime<'de, D>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;
    let s: Option<String> = Option::deserialize(deserializer)?;
    match s {
        Some(s) if !s.trim().is_empty() => parse_datetime(s.trim())
            .map(Some)
            .ok_or_else(|| D::Error::custom(format!("invalid date: {}", s))),
        _ => Ok(None),
    }
}

/// Parse an RFC 3339 timestamp or a bare date (midnight UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
