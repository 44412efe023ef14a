//! Applies computed plans to a task store.
//!
//! Mutations only run after the whole plan exists. Each kind goes out as one
//! batch, updates before deletes; the first failure aborts the rest.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use tickscope_core::capture::MergePlan;
use tickscope_core::dedup::{DuplicateGroup, removal_refs};
use tickscope_core::model::TaskRef;

use crate::client::{BatchRequest, TickTickClient};
use crate::error::Result;

/// The mutations the executor needs from a remote store.
#[async_trait]
pub trait TaskStore: Send + Sync {
    async fn delete_tasks(&self, refs: &[TaskRef]) -> Result<()>;
    async fn update_tasks(&self, records: &[Value]) -> Result<()>;
}

#[async_trait]
impl TaskStore for TickTickClient {
    async fn delete_tasks(&self, refs: &[TaskRef]) -> Result<()> {
        self.batch_task(&BatchRequest::deletes(refs)).await?;
        Ok(())
    }

    async fn update_tasks(&self, records: &[Value]) -> Result<()> {
        self.batch_task(&BatchRequest::updates(records)).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppliedStats {
    pub updated: usize,
    pub deleted: usize,
}

/// Delete every non-keeper in one batch. Returns the number deleted.
pub async fn apply_dedupe(store: &dyn TaskStore, groups: &[DuplicateGroup]) -> Result<usize> {
    let refs = removal_refs(groups);
    if refs.is_empty() {
        return Ok(0);
    }
    store.delete_tasks(&refs).await?;
    info!(deleted = refs.len(), "applied dedupe");
    Ok(refs.len())
}

pub async fn apply_capture_plan(store: &dyn TaskStore, plan: &MergePlan) -> Result<AppliedStats> {
    let mut stats = AppliedStats::default();
    if !plan.update_tasks.is_empty() {
        store.update_tasks(&plan.update_tasks).await?;
        stats.updated = plan.update_tasks.len();
    }
    if !plan.delete_tasks.is_empty() {
        store.delete_tasks(&plan.delete_tasks).await?;
        stats.deleted = plan.delete_tasks.len();
    }
    info!(updated = stats.updated, deleted = stats.deleted, "applied capture plan");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use serde_json::json;
    use tickscope_core::model::CanonicalTask;

    use crate::error::RemoteError;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        Delete(Vec<String>),
        Update(Vec<String>),
    }

    #[derive(Default)]
    struct MemoryStore {
        calls: Mutex<Vec<Call>>,
        fail_updates: bool,
    }

    impl MemoryStore {
        fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl TaskStore for MemoryStore {
        async fn delete_tasks(&self, refs: &[TaskRef]) -> Result<()> {
            let ids = refs.iter().map(|r| r.id.clone()).collect();
            self.calls.lock().unwrap().push(Call::Delete(ids));
            Ok(())
        }

        async fn update_tasks(&self, records: &[Value]) -> Result<()> {
            if self.fail_updates {
                return Err(RemoteError::Api {
                    status: 500,
                    method: "POST".to_string(),
                    endpoint: "/batch/task".to_string(),
                    body: String::new(),
                });
            }
            let ids = records
                .iter()
                .map(|r| r["id"].as_str().unwrap_or_default().to_string())
                .collect();
            self.calls.lock().unwrap().push(Call::Update(ids));
            Ok(())
        }
    }

    fn task_ref(id: &str) -> TaskRef {
        TaskRef {
            id: id.to_string(),
            project_id: "inbox".to_string(),
        }
    }

    fn sample_plan() -> MergePlan {
        MergePlan {
            update_tasks: vec![json!({"id": "keep", "tags": ["待行动"]})],
            delete_tasks: vec![task_ref("marker")],
            ..MergePlan::default()
        }
    }

    #[tokio::test]
    async fn test_empty_plans_make_no_calls() {
        let store = MemoryStore::default();
        assert_eq!(apply_dedupe(&store, &[]).await.unwrap(), 0);
        let stats = apply_capture_plan(&store, &MergePlan::default()).await.unwrap();
        assert_eq!(stats, AppliedStats::default());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_dedupe_deletes_in_one_batch() {
        let store = MemoryStore::default();
        let groups = vec![
            DuplicateGroup {
                keep: CanonicalTask::new("1", "a", "inbox"),
                remove: vec![
                    CanonicalTask::new("2", "a", "inbox"),
                    CanonicalTask::new("3", "a", "inbox"),
                ],
            },
            DuplicateGroup {
                keep: CanonicalTask::new("4", "b", "inbox"),
                remove: vec![CanonicalTask::new("5", "b", "inbox")],
            },
        ];

        assert_eq!(apply_dedupe(&store, &groups).await.unwrap(), 3);
        assert_eq!(
            store.calls(),
            vec![Call::Delete(vec!["2".into(), "3".into(), "5".into()])]
        );
    }

    #[tokio::test]
    async fn test_capture_plan_updates_before_deletes() {
        let store = MemoryStore::default();
        let stats = apply_capture_plan(&store, &sample_plan()).await.unwrap();
        assert_eq!(stats, AppliedStats { updated: 1, deleted: 1 });
        assert_eq!(
            store.calls(),
            vec![
                Call::Update(vec!["keep".into()]),
                Call::Delete(vec!["marker".into()]),
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_update_aborts_deletes() {
        let store = MemoryStore {
            fail_updates: true,
            ..MemoryStore::default()
        };
        assert!(apply_capture_plan(&store, &sample_plan()).await.is_err());
        assert!(store.calls().is_empty());
    }

    #[tokio::test]
    async fn test_skips_empty_update_batch() {
        let store = MemoryStore::default();
        let plan = MergePlan {
            delete_tasks: vec![task_ref("marker")],
            ..MergePlan::default()
        };
        let stats = apply_capture_plan(&store, &plan).await.unwrap();
        assert_eq!(stats.updated, 0);
        assert_eq!(store.calls(), vec![Call::Delete(vec!["marker".into()])]);
    }
}
