//! Reconciliation of messaging-app captures.
//!
//! A clipper often produces two records for one share: a short marker such as
//! `待投递` and the full task with the link. The planner pairs them up, folds
//! the marker into the full task, and classifies every captured task into the
//! action or material bucket. Nothing here mutates anything; the result is a
//! [`MergePlan`] that the executor may apply.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::Result;
use crate::model::{CanonicalTask, TaskRef};
use crate::rules::{CaptureRules, ClassReason, TaskClass};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CaptureOptions {
    /// Maximum distance between a marker and its full task, in seconds.
    pub window_seconds: f64,
}

impl Default for CaptureOptions {
    fn default() -> Self {
        Self {
            window_seconds: 180.0,
        }
    }
}

impl CaptureOptions {
    pub fn window_ms(&self) -> i64 {
        (self.window_seconds * 1000.0).round() as i64
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePair {
    pub marker_task: CanonicalTask,
    pub marker: String,
    pub keep_task: CanonicalTask,
    pub diff_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifyRow {
    pub id: String,
    pub title: String,
    pub class: TaskClass,
    pub reason: ClassReason,
    pub changed: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub action: usize,
    pub material: usize,
}

impl ClassCounts {
    fn bump(&mut self, class: TaskClass) {
        match class {
            TaskClass::Action => self.action += 1,
            TaskClass::Material => self.material += 1,
        }
    }
}

/// Everything the organizer would change, computed from one snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergePlan {
    pub captured_count: usize,
    pub merge_pairs: Vec<MergePair>,
    pub classify_rows: Vec<ClassifyRow>,
    pub class_counts: ClassCounts,
    /// Full source records with rewritten `tags`/`desc`; one per task id.
    pub update_tasks: Vec<Value>,
    pub delete_tasks: Vec<TaskRef>,
}

impl MergePlan {
    pub fn is_empty(&self) -> bool {
        self.update_tasks.is_empty() && self.delete_tasks.is_empty()
    }
}

struct MergeHint {
    marker: String,
    class: Option<TaskClass>,
}

pub fn build_capture_plan(
    tasks: &[CanonicalTask],
    opts: &CaptureOptions,
    rules: &CaptureRules,
) -> Result<MergePlan> {
    let classifier = rules.classifier()?;
    let captured: Vec<&CanonicalTask> = tasks.iter().filter(|t| rules.is_captured(t)).collect();

    let mut markers: Vec<(&CanonicalTask, &str)> = Vec::new();
    let mut full_tasks: Vec<&CanonicalTask> = Vec::new();
    for &task in &captured {
        match rules.detect_marker(&task.title) {
            Some(label) => markers.push((task, label)),
            None => full_tasks.push(task),
        }
    }

    // ─── Pairing ────────────────────────────────────────────

    let window_ms = opts.window_ms();
    let mut claimed: HashSet<&str> = HashSet::new();
    let mut merge_pairs = Vec::new();
    let mut hints: HashMap<&str, MergeHint> = HashMap::new();
    let mut deleted: HashSet<&str> = HashSet::new();
    let mut delete_tasks = Vec::new();

    for (marker_task, label) in &markers {
        let Some(marker_ms) = marker_task.timestamp_ms() else {
            warn!(id = %marker_task.id, marker = %label, "marker has no timestamp, skipping merge");
            continue;
        };

        let mut best: Option<(&CanonicalTask, i64)> = None;
        for &candidate in &full_tasks {
            if claimed.contains(candidate.id.as_str())
                || candidate.project_id != marker_task.project_id
                || !candidate.has_url
            {
                continue;
            }
            let Some(candidate_ms) = candidate.timestamp_ms() else {
                continue;
            };
            let diff = (candidate_ms - marker_ms).abs();
            if diff > window_ms {
                continue;
            }
            if best.is_none_or(|(_, best_diff)| diff < best_diff) {
                best = Some((candidate, diff));
            }
        }

        let Some((keep, diff_ms)) = best else {
            debug!(id = %marker_task.id, marker = %label, "no full task within the merge window");
            continue;
        };
        claimed.insert(keep.id.as_str());
        if deleted.insert(marker_task.id.as_str()) {
            delete_tasks.push(marker_task.task_ref());
        }
        hints.insert(
            keep.id.as_str(),
            MergeHint {
                marker: label.to_string(),
                class: rules.class_for_marker(label),
            },
        );
        merge_pairs.push(MergePair {
            marker_task: (*marker_task).clone(),
            marker: label.to_string(),
            keep_task: keep.clone(),
            diff_ms,
        });
    }

    // ─── Classification ─────────────────────────────────────

    let mut classify_rows = Vec::new();
    let mut class_counts = ClassCounts::default();
    let mut update_tasks = Vec::new();
    let mut updated: HashSet<&str> = HashSet::new();

    for task in &captured {
        if deleted.contains(task.id.as_str()) {
            continue;
        }
        let hint = hints.get(task.id.as_str());
        let hinted_class = hint
            .and_then(|h| h.class)
            .or_else(|| rules.detect_marker(&task.title).and_then(|l| rules.class_for_marker(l)))
            .or_else(|| recorded_marker_class(task, rules));
        let classification = classifier.classify(task, hinted_class);
        class_counts.bump(classification.class);

        let next_tags = resolve_tags(&task.tags, classification.class, rules);
        let next_description = match hint {
            Some(h) => with_marker_note(&task.description, &h.marker, rules),
            None => task.description.clone(),
        };

        let changed = next_tags != task.tags || next_description != task.description;
        if changed && updated.insert(task.id.as_str()) {
            update_tasks.push(task.write_back(&next_tags, &next_description));
        }

        classify_rows.push(ClassifyRow {
            id: task.id.clone(),
            title: task.title.clone(),
            class: classification.class,
            reason: classification.reason,
            changed,
        });
    }

    debug!(
        captured = captured.len(),
        pairs = merge_pairs.len(),
        updates = update_tasks.len(),
        deletes = delete_tasks.len(),
        "built capture plan"
    );
    Ok(MergePlan {
        captured_count: captured.len(),
        merge_pairs,
        classify_rows,
        class_counts,
        update_tasks,
        delete_tasks,
    })
}

/// Class of a marker previously folded into this task's description.
fn recorded_marker_class(task: &CanonicalTask, rules: &CaptureRules) -> Option<TaskClass> {
    if rules.marker_note_prefix.is_empty() {
        return None;
    }
    rules.markers.iter().find_map(|m| {
        let note = format!("{}{}", rules.marker_note_prefix, m.label);
        task.description.contains(&note).then_some(m.class)
    })
}

/// Drop both class tags, then append the resolved one.
pub fn resolve_tags(tags: &[String], class: TaskClass, rules: &CaptureRules) -> Vec<String> {
    let mut next: Vec<String> = tags
        .iter()
        .filter(|t| **t != rules.action_tag && **t != rules.material_tag)
        .cloned()
        .collect();
    let tag = rules.tag_for(class);
    if !next.iter().any(|t| t == tag) {
        next.push(tag.to_string());
    }
    next
}

pub fn with_marker_note(description: &str, marker: &str, rules: &CaptureRules) -> String {
    let note = format!("{}{}", rules.marker_note_prefix, marker);
    if description.contains(&note) {
        description.to_string()
    } else if description.is_empty() {
        note
    } else {
        format!("{note}\n{description}")
    }
}
