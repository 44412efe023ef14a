use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ─── Task status ────────────────────────────────────────────

/// TickTick encodes status as an integer; only `0` means the task is still open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Open,
    Other,
}

impl TaskStatus {
    pub fn from_code(code: i64) -> Self {
        if code == 0 { Self::Open } else { Self::Other }
    }

    pub fn is_open(self) -> bool {
        self == Self::Open
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Other => write!(f, "other"),
        }
    }
}

// ─── CanonicalTask ──────────────────────────────────────────

/// Normalized task record — the unit every core algorithm works on.
/// Built fresh from one snapshot per run and never persisted by the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalTask {
    pub id: String,
    pub title_raw: String,
    /// Markdown links and URLs stripped, whitespace collapsed.
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub project_id: String,
    pub project_name: String,
    pub is_inbox: bool,
    pub priority: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_local_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_local_date: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at_ms: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at_ms: Option<i64>,

    /// Non-null means subtask; subtasks are never merge candidates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,

    #[serde(default)]
    pub tags: Vec<String>,

    pub has_url: bool,
    pub web_url: String,

    /// Untouched source record, used for write-back.
    #[serde(skip)]
    pub raw: serde_json::Value,
}

impl CanonicalTask {
    /// Minimal open task, mostly useful for fixtures.
    pub fn new(id: impl Into<String>, title: impl Into<String>, project_id: impl Into<String>) -> Self {
        let title = title.into();
        let project_id = project_id.into();
        Self {
            id: id.into(),
            title_raw: title.clone(),
            title,
            description: String::new(),
            status: TaskStatus::Open,
            project_name: project_id.clone(),
            project_id,
            is_inbox: false,
            priority: 0,
            due_local_date: None,
            start_local_date: None,
            modified_at_ms: None,
            created_at_ms: None,
            parent_id: None,
            tags: Vec::new(),
            has_url: false,
            web_url: String::new(),
            raw: serde_json::Value::Null,
        }
    }

    /// Creation time when known, otherwise the last modification time.
    pub fn timestamp_ms(&self) -> Option<i64> {
        self.created_at_ms.or(self.modified_at_ms)
    }

    pub fn task_ref(&self) -> TaskRef {
        TaskRef {
            id: self.id.clone(),
            project_id: self.project_id.clone(),
        }
    }

    /// Source record with `tags` and `desc` replaced, ready for a batch update.
    pub fn write_back(&self, tags: &[String], description: &str) -> serde_json::Value {
        let mut record = match &self.raw {
            serde_json::Value::Object(map) => map.clone(),
            _ => {
                let mut map = serde_json::Map::new();
                map.insert("id".to_string(), self.id.clone().into());
                map.insert("projectId".to_string(), self.project_id.clone().into());
                map.insert("title".to_string(), self.title_raw.clone().into());
                map
            }
        };
        record.insert("tags".to_string(), tags.to_vec().into());
        record.insert("desc".to_string(), description.into());
        serde_json::Value::Object(record)
    }
}

/// Identity pair the remote store needs to delete a task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: String,
    pub project_id: String,
}
