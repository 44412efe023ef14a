//! Point-in-time task snapshots and the credentials file they come with.
//!
//! Two sources are understood: the TickTickSync plugin cache (`data.json`)
//! and the body of the API's `batch/check` sync call. Both are validated up
//! front; a snapshot missing its task list is rejected before any algorithm
//! sees it.

use std::path::{Path, PathBuf};

use chrono_tz::Tz;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::model::CanonicalTask;
use crate::normalize::{NormalizeContext, normalize_tasks};

pub const SOURCE_ENV: &str = "TICKTICKSYNC_CONFIG";
pub const PLUGIN_DATA_PATH: &str = ".obsidian/plugins/tickticksync/data.json";

fn required_str(data: &Value, key: &str) -> Option<String> {
    data[key]
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn read_json(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Err(CoreError::SourceNotFound(path.display().to_string()));
    }
    let contents = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

// ─── Cache snapshot ─────────────────────────────────────────

/// Tasks and projects cached by the TickTickSync plugin.
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    pub tasks: Vec<Value>,
    pub projects: Vec<Value>,
    pub inbox_id: String,
    pub base_url: String,
}

impl CacheSnapshot {
    pub fn from_value(data: &Value) -> Result<Self> {
        let cache = &data["TickTickTasksData"];
        let (Some(tasks), Some(projects)) = (cache["tasks"].as_array(), cache["projects"].as_array())
        else {
            return Err(CoreError::InvalidSnapshot(
                "missing TickTickTasksData.tasks/projects".to_string(),
            ));
        };
        let (Some(inbox_id), Some(base_url)) =
            (required_str(data, "inboxID"), required_str(data, "baseURL"))
        else {
            return Err(CoreError::InvalidSnapshot("missing inboxID/baseURL".to_string()));
        };

        Ok(Self {
            tasks: tasks.clone(),
            projects: projects.clone(),
            inbox_id,
            base_url,
        })
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let data: Value = serde_json::from_str(text)?;
        Self::from_value(&data)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_value(&read_json(path)?)
    }

    pub fn normalize(&self, timezone: Tz) -> Result<Vec<CanonicalTask>> {
        let ctx = NormalizeContext::new(&self.base_url, Some(self.inbox_id.clone()), timezone)
            .with_projects(&self.projects);
        normalize_tasks(&self.tasks, &ctx)
    }
}

// ─── Sync snapshot ──────────────────────────────────────────

/// Body of a `batch/check/{checkpoint}` response.
#[derive(Debug, Clone)]
pub struct SyncSnapshot {
    pub tasks: Vec<Value>,
    pub check_point: Option<i64>,
}

impl SyncSnapshot {
    pub fn from_value(body: &Value) -> Result<Self> {
        let tasks = body["syncTaskBean"]["update"].as_array().ok_or_else(|| {
            CoreError::InvalidSnapshot("sync response does not contain syncTaskBean.update".to_string())
        })?;
        Ok(Self {
            tasks: tasks.clone(),
            check_point: body["checkPoint"].as_i64(),
        })
    }
}

// ─── Credentials ────────────────────────────────────────────

/// Server and session token stored by the plugin next to its cache.
#[derive(Clone)]
pub struct Credentials {
    pub base_url: String,
    pub token: String,
    pub inbox_id: Option<String>,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("base_url", &self.base_url)
            .field("token", &"***")
            .field("inbox_id", &self.inbox_id)
            .finish()
    }
}

impl Credentials {
    pub fn from_value(data: &Value) -> Result<Self> {
        let (Some(base_url), Some(token)) = (required_str(data, "baseURL"), required_str(data, "token"))
        else {
            return Err(CoreError::InvalidSnapshot(
                "credentials need baseURL and token".to_string(),
            ));
        };
        Ok(Self {
            base_url,
            token,
            inbox_id: required_str(data, "inboxID"),
        })
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Self::from_value(&read_json(path)?)
    }
}

// ─── Source discovery ───────────────────────────────────────

/// Locate the plugin's `data.json`.
///
/// `$TICKTICKSYNC_CONFIG` wins when it points at an existing file; otherwise
/// the vault plugin path is searched in `cwd` and up to three parents. When
/// nothing exists the first candidate is returned so the caller can report it.
pub fn resolve_source_path(cwd: &Path, env_path: Option<&Path>) -> PathBuf {
    if let Some(path) = env_path {
        let path = cwd.join(path);
        if path.exists() {
            return path;
        }
    }

    let candidates: Vec<PathBuf> = cwd
        .ancestors()
        .take(4)
        .map(|dir| dir.join(PLUGIN_DATA_PATH))
        .collect();
    candidates
        .iter()
        .find(|c| c.exists())
        .cloned()
        .unwrap_or_else(|| cwd.join(PLUGIN_DATA_PATH))
}

/// [`resolve_source_path`] against the process environment.
pub fn default_source_path() -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let env_path = std::env::var_os(SOURCE_ENV).map(PathBuf::from);
    Ok(resolve_source_path(&cwd, env_path.as_deref()))
}
