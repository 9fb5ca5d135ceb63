//! Aggregates served by the stats endpoints

use serde::{Deserialize, Serialize};

/// One row of `GET /projects/stats/summary`, grouped by project status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectStats {
    #[serde(rename = "_id")]
    pub status: String,
    pub count: u64,
    #[serde(default)]
    pub total_tasks: u64,
}

/// Per-status counters inside [`TaskStats`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusStat {
    #[serde(rename = "_id")]
    pub status: String,
    pub count: u64,
    #[serde(default)]
    pub high_priority: u64,
}

/// Body of `GET /projects/{id}/tasks/stats`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStats {
    #[serde(default)]
    pub status_stats: Vec<StatusStat>,
    #[serde(default)]
    pub assignees: Vec<String>,
}

impl TaskStats {
    /// Count for one status, zero when the server omitted it
    pub fn count_for(&self, status: &str) -> u64 {
        self.status_stats
            .iter()
            .find(|s| s.status == status)
            .map(|s| s.count)
            .unwrap_or(0)
    }
}
