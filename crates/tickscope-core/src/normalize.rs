//! Raw TickTick records → [`CanonicalTask`].
//!
//! Parsing is permissive: a date that cannot be read becomes `None` rather
//! than an error. Only structurally broken records (no `id`) are rejected.

use std::collections::HashMap;

use chrono::{DateTime, FixedOffset, NaiveDate};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{CoreError, Result};
use crate::model::{CanonicalTask, TaskStatus};

static OBSIDIAN_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[[^\]]*\]\(obsidian://[^)]+\)").unwrap()
});

static MARKDOWN_LINK_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[([^\]]+)\]\(https?://[^)\s]+\)").unwrap()
});

static PLAIN_URL_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)https?://\S+").unwrap());

static WHITESPACE_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static HAS_URL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)https?://|v\.douyin\.com|mp\.weixin\.qq\.com|x\.com/").unwrap()
});

static COMPACT_OFFSET_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"([+-]\d{2})(\d{2})$").unwrap());

static OBJECT_ID_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[0-9a-fA-F]{24}$").unwrap());

/// Lookup tables shared by every record of one snapshot.
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub project_names: HashMap<String, String>,
    pub inbox_id: Option<String>,
    pub base_url: String,
    pub timezone: Tz,
}

impl NormalizeContext {
    pub fn new(base_url: impl Into<String>, inbox_id: Option<String>, timezone: Tz) -> Self {
        Self {
            project_names: HashMap::new(),
            inbox_id,
            base_url: base_url.into(),
            timezone,
        }
    }

    pub fn with_projects(mut self, projects: &[Value]) -> Self {
        self.project_names = map_projects(projects);
        self
    }
}

/// Project id → display name (`name`, then `title`, then the id itself).
pub fn map_projects(projects: &[Value]) -> HashMap<String, String> {
    let mut names = HashMap::new();
    for project in projects {
        let Some(id) = project["id"].as_str().filter(|id| !id.is_empty()) else {
            continue;
        };
        let name = project["name"]
            .as_str()
            .or_else(|| project["title"].as_str())
            .unwrap_or(id);
        names.insert(id.to_string(), name.to_string());
    }
    names
}

/// Strip integration artifacts and URLs from a title, keeping link text.
pub fn clean_title(raw: &str) -> String {
    let s = OBSIDIAN_LINK_REGEX.replace_all(raw, " ");
    let s = MARKDOWN_LINK_REGEX.replace_all(&s, "$1");
    let s = PLAIN_URL_REGEX.replace_all(&s, " ");
    WHITESPACE_REGEX.replace_all(&s, " ").trim().to_string()
}

pub fn has_url(raw_title: &str) -> bool {
    HAS_URL_REGEX.is_match(raw_title)
}

/// Parse TickTick timestamps such as `2024-01-05T16:00:00.000+0000`.
pub fn parse_ticktick_date(value: &str) -> Option<DateTime<FixedOffset>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    let normalized = COMPACT_OFFSET_REGEX.replace(value, "$1:$2");
    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt);
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Calendar date of `value` as seen in `tz`.
pub fn local_date(value: &str, tz: Tz) -> Option<NaiveDate> {
    parse_ticktick_date(value).map(|dt| dt.with_timezone(&tz).date_naive())
}

/// Creation time encoded in the leading four bytes of a Mongo-style object id.
pub fn object_id_time_ms(id: &str) -> Option<i64> {
    if !OBJECT_ID_REGEX.is_match(id) {
        return None;
    }
    i64::from_str_radix(&id[..8], 16).ok().map(|secs| secs * 1000)
}

pub fn normalize_task(raw: &Value, ctx: &NormalizeContext) -> Result<CanonicalTask> {
    let id = raw["id"]
        .as_str()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| CoreError::InvalidSnapshot("task record without id".to_string()))?
        .to_string();

    let title_raw = raw["title"]
        .as_str()
        .filter(|t| !t.is_empty())
        .or_else(|| raw["content"].as_str())
        .unwrap_or_default()
        .to_string();

    let project_id = raw["projectId"].as_str().unwrap_or_default().to_string();
    let project_name = ctx
        .project_names
        .get(&project_id)
        .cloned()
        .unwrap_or_else(|| project_id.clone());
    let is_inbox = ctx.inbox_id.as_deref() == Some(project_id.as_str());

    let status = raw["status"]
        .as_i64()
        .map(TaskStatus::from_code)
        .unwrap_or(TaskStatus::Other);

    let tz = ctx.timezone;
    let due_local_date = raw["dueDate"].as_str().and_then(|s| local_date(s, tz));
    let start_local_date = raw["startDate"].as_str().and_then(|s| local_date(s, tz));
    let modified_at_ms = raw["modifiedTime"]
        .as_str()
        .and_then(parse_ticktick_date)
        .map(|dt| dt.timestamp_millis());

    let parent_id = raw["parentId"]
        .as_str()
        .filter(|p| !p.is_empty())
        .map(str::to_string);

    let tags = raw["tags"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|t| t.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();

    Ok(CanonicalTask {
        title: clean_title(&title_raw),
        has_url: has_url(&title_raw),
        web_url: format!(
            "https://{}/webapp/#p/{}/tasks/{}",
            ctx.base_url, project_id, id
        ),
        created_at_ms: object_id_time_ms(&id),
        description: raw["desc"].as_str().unwrap_or_default().to_string(),
        priority: raw["priority"].as_i64().unwrap_or(0),
        id,
        title_raw,
        status,
        project_id,
        project_name,
        is_inbox,
        due_local_date,
        start_local_date,
        modified_at_ms,
        parent_id,
        tags,
        raw: raw.clone(),
    })
}

pub fn normalize_tasks(raw_tasks: &[Value], ctx: &NormalizeContext) -> Result<Vec<CanonicalTask>> {
    raw_tasks.iter().map(|raw| normalize_task(raw, ctx)).collect()
}
