//! Filter and sort state, and the derived views built from it

use crate::api::{ProjectQuery, SortSpec, TaskQuery};
use crate::models::{Project, ProjectStatus, Task, TaskStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// A field value as seen by the sort
#[derive(Debug, Clone, PartialEq)]
pub enum SortValue {
    /// Compared case-insensitively
    Text(String),
    Number(i64),
    /// Missing dates sort after present ones
    Date(Option<DateTime<Utc>>),
    /// Unknown field; never reorders anything
    Missing,
}

impl SortValue {
    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => a.to_lowercase().cmp(&b.to_lowercase()),
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Date(a), Self::Date(b)) => match (a, b) {
                (Some(a), Some(b)) => a.cmp(b),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            _ => Ordering::Equal,
        }
    }
}

/// Entities that can be searched and sorted by field name
pub trait Filterable {
    /// Name or title, then description
    fn search_fields(&self) -> [&str; 2];

    /// Value of the wire field `field` (camelCase)
    fn sort_value(&self, field: &str) -> SortValue;

    fn matches_search(&self, search: &str) -> bool {
        let needle = search.trim().to_lowercase();
        needle.is_empty()
            || self
                .search_fields()
                .iter()
                .any(|f| f.to_lowercase().contains(&needle))
    }
}

/// Stable sort by `spec`
pub fn sort_by_spec<E: Filterable>(items: &mut [E], spec: &SortSpec) {
    items.sort_by(|a, b| {
        let ordering = a.sort_value(&spec.field).compare(&b.sort_value(&spec.field));
        match spec.direction {
            crate::api::SortDirection::Asc => ordering,
            crate::api::SortDirection::Desc => ordering.reverse(),
        }
    });
}

/// Parse a status filter where `all` (or an empty string) means no filter
pub fn parse_status_filter<S: FromStr<Err = String>>(value: &str) -> Result<Option<S>, String> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("all") {
        Ok(None)
    } else {
        value.parse().map(Some)
    }
}

impl Filterable for Project {
    fn search_fields(&self) -> [&str; 2] {
        [&self.name, &self.description]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "name" => SortValue::Text(self.name.clone()),
            "description" => SortValue::Text(self.description.clone()),
            "status" => SortValue::Text(self.status.as_str().to_string()),
            "createdBy" => SortValue::Text(self.created_by.clone()),
            "tasksCount" => SortValue::Number(self.tasks_count as i64),
            "createdAt" => SortValue::Date(Some(self.created_at)),
            "updatedAt" => SortValue::Date(Some(self.updated_at)),
            _ => SortValue::Missing,
        }
    }
}

impl Filterable for Task {
    fn search_fields(&self) -> [&str; 2] {
        [&self.title, &self.description]
    }

    fn sort_value(&self, field: &str) -> SortValue {
        match field {
            "title" => SortValue::Text(self.title.clone()),
            "description" => SortValue::Text(self.description.clone()),
            "assignee" => SortValue::Text(self.assignee().unwrap_or_default().to_string()),
            "status" => SortValue::Text(self.status.as_str().to_string()),
            "priority" => SortValue::Number(self.priority.rank()),
            "order" => SortValue::Number(self.order as i64),
            "dueDate" => SortValue::Date(self.due_date),
            "createdAt" => SortValue::Date(Some(self.created_at)),
            "updatedAt" => SortValue::Date(Some(self.updated_at)),
            _ => SortValue::Missing,
        }
    }
}

// ============================================================================
// Project filters
// ============================================================================

/// Filter state of the project list. `status: None` means all statuses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFilters {
    pub status: Option<ProjectStatus>,
    pub search: String,
    pub sort: SortSpec,
}

impl Default for ProjectFilters {
    fn default() -> Self {
        Self {
            status: None,
            search: String::new(),
            sort: SortSpec::desc("createdAt"),
        }
    }
}

impl ProjectFilters {
    pub fn to_query(&self) -> ProjectQuery {
        ProjectQuery {
            status: self.status,
            search: Some(self.search.clone()).filter(|s| !s.trim().is_empty()),
            sort: Some(self.sort.clone()),
        }
    }

    pub fn matches(&self, project: &Project) -> bool {
        self.status.map_or(true, |s| project.status == s) && project.matches_search(&self.search)
    }

    /// Filtered and sorted copy of `projects`
    pub fn apply(&self, projects: &[Project]) -> Vec<Project> {
        let mut result: Vec<Project> = projects.iter().filter(|p| self.matches(p)).cloned().collect();
        sort_by_spec(&mut result, &self.sort);
        result
    }
}

// ============================================================================
// Task filters
// ============================================================================

/// Assignee filter: everyone, nobody, or one person
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssigneeFilter {
    #[default]
    All,
    Unassigned,
    Named(String),
}

impl AssigneeFilter {
    pub fn matches(&self, task: &Task) -> bool {
        match self {
            Self::All => true,
            Self::Unassigned => task.assignee().is_none(),
            Self::Named(name) => task.assignee() == Some(name.as_str()),
        }
    }

    /// Value of the `assignee` query parameter; `all` is not sent
    pub fn to_query(&self) -> Option<String> {
        match self {
            Self::All => None,
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for AssigneeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => write!(f, "all"),
            Self::Unassigned => write!(f, "unassigned"),
            Self::Named(name) => write!(f, "{}", name),
        }
    }
}

impl From<String> for AssigneeFilter {
    fn from(value: String) -> Self {
        match value.trim() {
            "" | "all" => Self::All,
            "unassigned" => Self::Unassigned,
            name => Self::Named(name.to_string()),
        }
    }
}

impl From<&str> for AssigneeFilter {
    fn from(value: &str) -> Self {
        Self::from(value.to_string())
    }
}

impl From<AssigneeFilter> for String {
    fn from(filter: AssigneeFilter) -> Self {
        filter.to_string()
    }
}

/// Filter state of the task board. `status: None` means all columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub assignee: AssigneeFilter,
    pub search: String,
    pub sort: SortSpec,
}

impl Default for TaskFilters {
    fn default() -> Self {
        Self {
            status: None,
            assignee: AssigneeFilter::All,
            search: String::new(),
            sort: SortSpec::asc("order"),
        }
    }
}

impl TaskFilters {
    pub fn to_query(&self, project_id: &str) -> TaskQuery {
        TaskQuery {
            project_id: project_id.to_string(),
            status: self.status,
            assignee: self.assignee.to_query(),
            search: Some(self.search.clone()).filter(|s| !s.trim().is_empty()),
            sort: Some(self.sort.clone()),
        }
    }

    pub fn matches(&self, task: &Task) -> bool {
        self.status.map_or(true, |s| task.status == s)
            && self.assignee.matches(task)
            && task.matches_search(&self.search)
    }

    /// Filtered and sorted copy of `tasks`
    pub fn apply(&self, tasks: &[Task]) -> Vec<Task> {
        let mut result: Vec<Task> = tasks.iter().filter(|t| self.matches(t)).cloned().collect();
        sort_by_spec(&mut result, &self.sort);
        result
    }
}
