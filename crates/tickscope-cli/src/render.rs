//! Markdown renderers for the human-readable reports.

use serde::Serialize;

use tickscope_core::capture::MergePlan;
use tickscope_core::dedup::DuplicateGroup;
use tickscope_core::digest::Digest;
use tickscope_remote::AppliedStats;

/// Rows shown in the classification preview.
const CLASSIFY_PREVIEW_ROWS: usize = 30;

/// Context printed in every report header.
#[derive(Debug, Clone, Serialize)]
pub struct ReportMeta {
    pub source: String,
    pub base_url: String,
    pub user: String,
    pub check_point: Option<i64>,
    pub timezone: String,
}

fn mode(apply: bool) -> &'static str {
    if apply { "APPLIED" } else { "DRY-RUN" }
}

fn push_digest_sections(out: &mut Vec<String>, digest: &Digest, limit: usize) {
    for (title, tasks) in digest.sections() {
        out.push(format!("## {title} ({})", tasks.len()));
        if tasks.is_empty() {
            out.push("- (empty)".to_string());
            out.push(String::new());
            continue;
        }
        for task in tasks.iter().take(limit) {
            let due = task
                .due_local_date
                .map(|d| format!(" due:{d}"))
                .unwrap_or_default();
            out.push(format!("- [ ] {}{due} [open]({})", task.title, task.web_url));
        }
        if tasks.len() > limit {
            out.push(format!("- ... {} more", tasks.len() - limit));
        }
        out.push(String::new());
    }
}

pub fn live_digest_md(meta: &ReportMeta, digest: &Digest, limit: usize) -> String {
    let check_point = meta
        .check_point
        .map(|c| c.to_string())
        .unwrap_or_else(|| "null".to_string());
    let mut out = vec![
        format!("# TickTick Live Digest ({}, {})", digest.today, meta.timezone),
        format!("User: {}", meta.user),
        format!("Server: {}", meta.base_url),
        format!("Sync checkPoint: {check_point}"),
        String::new(),
    ];
    push_digest_sections(&mut out, digest, limit);
    out.join("\n")
}

pub fn cache_digest_md(meta: &ReportMeta, digest: &Digest, limit: usize) -> String {
    let mut out = vec![
        format!("# TickTick Digest ({}, {})", digest.today, meta.timezone),
        format!("Source: {}", meta.source),
        String::new(),
    ];
    push_digest_sections(&mut out, digest, limit);
    out.join("\n")
}

pub fn dedupe_md(meta: &ReportMeta, groups: &[DuplicateGroup], apply: bool, deleted: usize) -> String {
    let to_delete: usize = groups.iter().map(|g| g.remove.len()).sum();
    let mut out = vec![
        format!("# TickTick Dedupe ({})", mode(apply)),
        format!("User: {}", meta.user),
        format!("Server: {}", meta.base_url),
        format!("Duplicate groups: {}", groups.len()),
        format!("Tasks to delete: {to_delete}"),
    ];
    if apply {
        out.push(format!("Deleted: {deleted}"));
    }
    out.push(String::new());

    if groups.is_empty() {
        out.push("- No duplicates detected under current rules.".to_string());
        return out.join("\n");
    }

    for (idx, group) in groups.iter().enumerate() {
        out.push(format!("## Group {}", idx + 1));
        out.push(format!("- keep: {} ({})", group.keep.title, group.keep.id));
        for task in &group.remove {
            out.push(format!("- delete: {} ({})", task.title, task.id));
        }
        out.push(String::new());
    }
    out.join("\n")
}

pub fn capture_md(meta: &ReportMeta, plan: &MergePlan, apply: bool, stats: &AppliedStats) -> String {
    let mut out = vec![
        format!("# TickTick WeChat Organizer ({})", mode(apply)),
        format!("User: {}", meta.user),
        format!("Server: {}", meta.base_url),
        format!("WeChat tasks: {}", plan.captured_count),
        format!("Merge pairs: {}", plan.merge_pairs.len()),
        format!(
            "Classified: action={}, material={}",
            plan.class_counts.action, plan.class_counts.material
        ),
        format!(
            "Planned updates={}, planned deletes={}",
            plan.update_tasks.len(),
            plan.delete_tasks.len()
        ),
    ];
    if apply {
        out.push(format!(
            "Applied updates={}, applied deletes={}",
            stats.updated, stats.deleted
        ));
    }
    out.push(String::new());

    if !plan.merge_pairs.is_empty() {
        out.push("## Merge Preview".to_string());
        for pair in &plan.merge_pairs {
            out.push(format!(
                "- {} ({}) -> {} ({})",
                pair.marker_task.title, pair.marker_task.id, pair.keep_task.title, pair.keep_task.id
            ));
        }
        out.push(String::new());
    }

    out.push("## Classification Preview".to_string());
    if plan.classify_rows.is_empty() {
        out.push("- (empty)".to_string());
    }
    for row in plan.classify_rows.iter().take(CLASSIFY_PREVIEW_ROWS) {
        out.push(format!(
            "- [{}] {} ({}) reason={}",
            row.class, row.title, row.id, row.reason
        ));
    }
    if plan.classify_rows.len() > CLASSIFY_PREVIEW_ROWS {
        out.push(format!(
            "- ... {} more",
            plan.classify_rows.len() - CLASSIFY_PREVIEW_ROWS
        ));
    }
    out.join("\n")
}
