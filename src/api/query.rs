//! Query parameter structs for the list endpoints

use crate::models::{ProjectStatus, TaskStatus};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sort direction
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => write!(f, "asc"),
            Self::Desc => write!(f, "desc"),
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            _ => Err("sort direction must be 'asc' or 'desc'".to_string()),
        }
    }
}

/// A `"<field>:<asc|desc>"` sort parameter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortSpec {
    pub field: String,
    pub direction: SortDirection,
}

impl SortSpec {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl fmt::Display for SortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.field, self.direction)
    }
}

impl FromStr for SortSpec {
    type Err = String;

    /// A missing direction means ascending
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (field, direction) = match s.split_once(':') {
            Some((field, dir)) => (field.trim(), dir.parse()?),
            None => (s.trim(), SortDirection::Asc),
        };
        if field.is_empty() {
            return Err("sort field cannot be empty".to_string());
        }
        Ok(Self {
            field: field.to_string(),
            direction,
        })
    }
}

impl TryFrom<String> for SortSpec {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SortSpec> for String {
    fn from(spec: SortSpec) -> Self {
        spec.to_string()
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Query for `GET /projects`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectQuery {
    pub status: Option<ProjectStatus>,
    pub search: Option<String>,
    pub sort: Option<SortSpec>,
}

impl ProjectQuery {
    /// Query-string pairs; unset filters are omitted
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(search) = non_empty(&self.search) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.to_string()));
        }
        pairs
    }
}

/// Query for `GET /projects/{id}/tasks`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskQuery {
    pub project_id: String,
    pub status: Option<TaskStatus>,
    /// An assignee name, or `unassigned`
    pub assignee: Option<String>,
    pub search: Option<String>,
    pub sort: Option<SortSpec>,
}

impl TaskQuery {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            ..Default::default()
        }
    }

    /// Query-string pairs; unset filters are omitted
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(assignee) = non_empty(&self.assignee) {
            pairs.push(("assignee", assignee.to_string()));
        }
        if let Some(search) = non_empty(&self.search) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort", sort.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // SortSpec Tests
    // =========================================================================

    #[test]
    fn test_sort_spec_parse() {
        let spec: SortSpec = "createdAt:desc".parse().unwrap();
        assert_eq!(spec, SortSpec::desc("createdAt"));
        assert_eq!(spec.to_string(), "createdAt:desc");
    }

    #[test]
    fn test_sort_spec_default_direction() {
        let spec: SortSpec = "title".parse().unwrap();
        assert_eq!(spec.direction, SortDirection::Asc);
    }

    #[test]
    fn test_sort_spec_invalid_direction() {
        let err = "title:sideways".parse::<SortSpec>().unwrap_err();
        assert!(err.contains("asc"));
    }

    #[test]
    fn test_sort_spec_empty_field() {
        assert!(":asc".parse::<SortSpec>().is_err());
    }

    #[test]
    fn test_sort_spec_serde_as_string() {
        let json = serde_json::to_string(&SortSpec::asc("order")).unwrap();
        assert_eq!(json, "\"order:asc\"");
        let back: SortSpec = serde_json::from_str("\"dueDate:desc\"").unwrap();
        assert_eq!(back, SortSpec::desc("dueDate"));
    }

    // =========================================================================
    // Query Tests
    // =========================================================================

    #[test]
    fn test_project_query_pairs() {
        let query = ProjectQuery {
            status: Some(ProjectStatus::InProgress),
            search: Some("auth".into()),
            sort: Some(SortSpec::desc("createdAt")),
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("status", "In progress".to_string()),
                ("search", "auth".to_string()),
                ("sort", "createdAt:desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_project_query_skips_blank_search() {
        let query = ProjectQuery {
            search: Some("   ".into()),
            ..Default::default()
        };
        assert!(query.to_pairs().is_empty());
    }

    #[test]
    fn test_task_query_pairs() {
        let query = TaskQuery {
            status: Some(TaskStatus::Todo),
            assignee: Some("unassigned".into()),
            ..TaskQuery::for_project("p1")
        };
        assert_eq!(
            query.to_pairs(),
            vec![
                ("status", "todo".to_string()),
                ("assignee", "unassigned".to_string()),
            ]
        );
        assert_eq!(query.project_id, "p1");
    }
}
