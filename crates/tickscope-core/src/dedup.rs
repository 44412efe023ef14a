use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::model::{CanonicalTask, TaskRef};
use crate::similarity::{is_duplicate, title_norm};

const HOUR_MS: f64 = 3_600_000.0;

/// Which tasks are eligible for duplicate detection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DedupScope {
    #[default]
    Inbox,
    All,
}

impl std::fmt::Display for DedupScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Inbox => write!(f, "inbox"),
            Self::All => write!(f, "all"),
        }
    }
}

impl std::str::FromStr for DedupScope {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inbox" => Ok(Self::Inbox),
            "all" => Ok(Self::All),
            _ => Err(format!("Invalid scope: {s} (expected inbox or all)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DedupeOptions {
    pub scope: DedupScope,
    /// Maximum distance between modification times, in hours.
    pub window_hours: f64,
}

impl Default for DedupeOptions {
    fn default() -> Self {
        Self {
            scope: DedupScope::Inbox,
            window_hours: 12.0,
        }
    }
}

impl DedupeOptions {
    pub fn window_ms(&self) -> i64 {
        (self.window_hours * HOUR_MS).round() as i64
    }
}

/// One cluster of duplicates: the record to keep and the ones to delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub keep: CanonicalTask,
    pub remove: Vec<CanonicalTask>,
}

/// Group open candidate tasks into duplicate clusters.
///
/// Candidates are bucketed by `(project, due date)` so that pairwise checks
/// stay within a bucket, then merged transitively through a disjoint set.
/// Groups come back largest-cleanup-first.
pub fn detect_duplicates(tasks: &[CanonicalTask], opts: &DedupeOptions) -> Vec<DuplicateGroup> {
    let candidates: Vec<&CanonicalTask> = tasks
        .iter()
        .filter(|t| t.status.is_open() && (opts.scope == DedupScope::All || t.is_inbox))
        .collect();
    let window_ms = opts.window_ms();

    let mut bucket_order: Vec<(&str, Option<NaiveDate>)> = Vec::new();
    let mut buckets: HashMap<(&str, Option<NaiveDate>), Vec<usize>> = HashMap::new();
    for (idx, task) in candidates.iter().enumerate() {
        let key = (task.project_id.as_str(), task.due_local_date);
        let bucket = buckets.entry(key).or_insert_with(|| {
            bucket_order.push(key);
            Vec::new()
        });
        bucket.push(idx);
    }

    let mut dsu = DisjointSet::new(candidates.len());
    for key in &bucket_order {
        let indexes = &buckets[key];
        for (pos, &left) in indexes.iter().enumerate() {
            for &right in &indexes[pos + 1..] {
                if is_duplicate(candidates[left], candidates[right], window_ms) {
                    dsu.union(left, right);
                }
            }
        }
    }

    let mut root_order: Vec<usize> = Vec::new();
    let mut components: HashMap<usize, Vec<usize>> = HashMap::new();
    for idx in 0..candidates.len() {
        let root = dsu.find(idx);
        components
            .entry(root)
            .or_insert_with(|| {
                root_order.push(root);
                Vec::new()
            })
            .push(idx);
    }

    let mut groups = Vec::new();
    for root in root_order {
        let members: Vec<&CanonicalTask> = components[&root]
            .iter()
            .map(|&idx| candidates[idx])
            .collect();
        if members.len() < 2 {
            continue;
        }

        let Some(keep) = pick_keeper(&members).cloned() else {
            continue;
        };
        let remove: Vec<CanonicalTask> = members
            .into_iter()
            .filter(|t| t.id != keep.id)
            .cloned()
            .collect();
        if remove.is_empty() {
            continue;
        }
        groups.push(DuplicateGroup { keep, remove });
    }

    groups.sort_by(|a, b| b.remove.len().cmp(&a.remove.len()));
    groups
}

/// Choose the record that represents a cluster.
///
/// Longest normalized title wins, then highest priority, then smallest id,
/// so the result does not depend on input order.
pub fn pick_keeper<'a>(group: &[&'a CanonicalTask]) -> Option<&'a CanonicalTask> {
    group
        .iter()
        .copied()
        .min_by(|a, b| {
            let a_len = title_norm(&a.title).chars().count();
            let b_len = title_norm(&b.title).chars().count();
            b_len
                .cmp(&a_len)
                .then_with(|| b.priority.cmp(&a.priority))
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Every task slated for deletion across all groups, in report order.
pub fn removal_refs(groups: &[DuplicateGroup]) -> Vec<TaskRef> {
    groups
        .iter()
        .flat_map(|g| g.remove.iter().map(CanonicalTask::task_ref))
        .collect()
}

#[derive(Debug, Clone)]
struct DisjointSet {
    parent: Vec<usize>,
    rank: Vec<u8>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
            rank: vec![0; size],
        }
    }

    fn find(&mut self, x: usize) -> usize {
        if self.parent[x] != x {
            let root = self.find(self.parent[x]);
            self.parent[x] = root;
        }
        self.parent[x]
    }

    fn union(&mut self, left: usize, right: usize) {
        let left_root = self.find(left);
        let right_root = self.find(right);

        if left_root == right_root {
            return;
        }

        match self.rank[left_root].cmp(&self.rank[right_root]) {
            std::cmp::Ordering::Less => self.parent[left_root] = right_root,
            std::cmp::Ordering::Greater => self.parent[right_root] = left_root,
            std::cmp::Ordering::Equal => {
                self.parent[right_root] = left_root;
                self.rank[left_root] += 1;
            }
        }
    }
}
