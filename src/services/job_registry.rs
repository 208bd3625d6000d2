//! 任务登记表
//!
//! 进程内 job id → 任务记录 的映射。存储通过 `JobStore` 注入，
//! 默认是内存实现，也可以换成外部存储。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use tracing::{debug, info};

use crate::error::{AppResult, JobError};
use crate::models::JobRecord;

/// 任务记录存储
///
/// 实现必须自行保证并发安全：轮询与结果取回可能和新的提交并发执行。
pub trait JobStore: Send + Sync {
    /// 新增记录，id 已存在时返回 `DuplicateJob`
    fn insert(&self, record: JobRecord) -> AppResult<()>;

    fn get(&self, job_id: &str) -> Option<JobRecord>;

    /// 原子地修改一条记录，返回修改后的副本
    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut JobRecord)) -> Option<JobRecord>;

    /// 删除创建时间早于 `cutoff` 的记录，返回删除数量
    fn evict_before(&self, cutoff: DateTime<Utc>) -> usize;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 默认的内存存储
#[derive(Debug, Default)]
pub struct InMemoryJobStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl InMemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for InMemoryJobStore {
    fn insert(&self, record: JobRecord) -> AppResult<()> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        if records.contains_key(&record.job.id) {
            return Err(JobError::DuplicateJob(record.job.id.clone()).into());
        }
        records.insert(record.job.id.clone(), record);
        Ok(())
    }

    fn get(&self, job_id: &str) -> Option<JobRecord> {
        let records = self.records.read().unwrap_or_else(|e| e.into_inner());
        records.get(job_id).cloned()
    }

    fn update(&self, job_id: &str, apply: &mut dyn FnMut(&mut JobRecord)) -> Option<JobRecord> {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let record = records.get_mut(job_id)?;
        apply(record);
        Some(record.clone())
    }

    fn evict_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut records = self.records.write().unwrap_or_else(|e| e.into_inner());
        let before = records.len();
        records.retain(|_, record| record.job.created_at >= cutoff);
        before - records.len()
    }

    fn len(&self) -> usize {
        self.records.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// 任务登记表
///
/// 每次登记新任务时淘汰超过 TTL 的旧记录。
#[derive(Clone)]
pub struct JobRegistry {
    store: Arc<dyn JobStore>,
    ttl: ChronoDuration,
}

impl JobRegistry {
    pub fn new(store: Arc<dyn JobStore>, ttl_secs: u64) -> Self {
        let ttl = i64::try_from(ttl_secs)
            .ok()
            .and_then(ChronoDuration::try_seconds)
            .unwrap_or(ChronoDuration::MAX);
        Self { store, ttl }
    }

    /// 使用内存存储
    pub fn in_memory(ttl_secs: u64) -> Self {
        Self::new(Arc::new(InMemoryJobStore::new()), ttl_secs)
    }

    pub fn register(&self, record: JobRecord) -> AppResult<()> {
        let evicted = self.evict_expired();
        if evicted > 0 {
            info!("🧹 淘汰 {} 条过期任务记录", evicted);
        }
        debug!("登记任务 {} ({} 个请求)", record.job.id, record.request_ids.len());
        self.store.insert(record)
    }

    pub fn get(&self, job_id: &str) -> AppResult<JobRecord> {
        self.store
            .get(job_id)
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()).into())
    }

    pub fn update(&self, job_id: &str, mut apply: impl FnMut(&mut JobRecord)) -> AppResult<JobRecord> {
        self.store
            .update(job_id, &mut apply)
            .ok_or_else(|| JobError::JobNotFound(job_id.to_string()).into())
    }

    pub fn evict_expired(&self) -> usize {
        let cutoff = Utc::now().checked_sub_signed(self.ttl).unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.store.evict_before(cutoff)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{ExecutionPath, Job, JobState, ProjectMetadata, RequestCounts};

    fn record(id: &str, created_at: DateTime<Utc>) -> JobRecord {
        JobRecord {
            job: Job {
                id: id.to_string(),
                created_at,
                ended_at: None,
                state: JobState::Submitted,
                counts: RequestCounts::default(),
                request_count: 1,
                target_word_count: 3000,
                metadata: ProjectMetadata {
                    project_title: "T".into(),
                    citation_style: "APA".into(),
                    project_type: "thesis".into(),
                },
            },
            request_ids: vec!["intro-1".into()],
            path: ExecutionPath::Batch,
            results: None,
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = JobRegistry::in_memory(3600);
        registry.register(record("job-1", Utc::now())).unwrap();
        assert_eq!(registry.get("job-1").unwrap().job.id, "job-1");
        assert!(matches!(
            registry.get("missing").unwrap_err(),
            AppError::Job(JobError::JobNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_registration_is_rejected() {
        let registry = JobRegistry::in_memory(3600);
        registry.register(record("job-1", Utc::now())).unwrap();
        let err = registry.register(record("job-1", Utc::now())).unwrap_err();
        assert!(matches!(err, AppError::Job(JobError::DuplicateJob(_))));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_update_is_applied() {
        let registry = JobRegistry::in_memory(3600);
        registry.register(record("job-1", Utc::now())).unwrap();
        let updated = registry
            .update("job-1", |r| r.job.state = JobState::Processing)
            .unwrap();
        assert_eq!(updated.job.state, JobState::Processing);
        assert_eq!(registry.get("job-1").unwrap().job.state, JobState::Processing);
        assert!(registry.update("nope", |_| {}).is_err());
    }

    #[test]
    fn test_expired_records_are_evicted_on_register() {
        let registry = JobRegistry::in_memory(60);
        registry
            .register(record("old", Utc::now() - ChronoDuration::seconds(120)))
            .unwrap();
        registry.register(record("new", Utc::now())).unwrap();

        assert!(registry.get("old").is_err());
        assert!(registry.get("new").is_ok());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_concurrent_updates_are_not_lost() {
        let registry = JobRegistry::in_memory(3600);
        registry.register(record("job-1", Utc::now())).unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        registry.update("job-1", |r| r.job.counts.succeeded += 1).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(registry.get("job-1").unwrap().job.counts.succeeded, 800);
    }
}
