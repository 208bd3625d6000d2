//! 批量任务编排器 - 编排层
//!
//! 把整组增强请求作为一个上游批量任务提交，轮询状态，
//! 任务结束后下载、规范化、清洗结果并附上统计。
//!
//! 每个操作最多只有一个进行中的 HTTP 调用，内部不做并发；
//! 多个任务并发轮询是安全的，登记表里各条记录互相独立。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use super::status_view;
use crate::clients::ProviderApi;
use crate::error::{AppResult, JobError};
use crate::models::{
    CanonicalStatus, EnrichedRequest, ExecutionPath, Job, JobRecord, JobState, JobStatusView,
    NormalizedResult, ProjectMetadata, RequestCounts, UpstreamStatus,
};
use crate::services::content_sanitizer::ContentSanitizer;
use crate::services::job_registry::JobRegistry;
use crate::services::result_normalizer::{parse_results_jsonl, reconcile};

pub struct AsyncBatchOrchestrator {
    client: Arc<dyn ProviderApi>,
    registry: JobRegistry,
    sanitizer: Arc<ContentSanitizer>,
    words_per_section: u64,
}

impl AsyncBatchOrchestrator {
    pub fn new(
        client: Arc<dyn ProviderApi>,
        registry: JobRegistry,
        sanitizer: Arc<ContentSanitizer>,
        words_per_section: u64,
    ) -> Self {
        Self {
            client,
            registry,
            sanitizer,
            words_per_section,
        }
    }

    /// 提交批量任务并登记，返回 job id
    pub async fn submit(
        &self,
        requests: &[EnrichedRequest],
        metadata: &ProjectMetadata,
    ) -> AppResult<String> {
        if requests.is_empty() {
            return Err(JobError::EmptyRequestSet.into());
        }

        info!("📤 提交批量任务: {} ({} 个章节)", metadata.project_title, requests.len());

        let handle = self.client.create_batch(requests).await.map_err(|e| {
            error!("❌ 批量任务提交失败: {}", e);
            e
        })?;

        let upstream = UpstreamStatus::from_raw(handle.processing_status.as_deref());
        let request_count = requests.len() as u64;
        let record = JobRecord {
            job: Job {
                id: handle.id.clone(),
                created_at: parse_timestamp(handle.created_at.as_deref()).unwrap_or_else(Utc::now),
                ended_at: None,
                state: JobState::Submitted.advance(&upstream),
                counts: RequestCounts {
                    processing: request_count,
                    ..RequestCounts::default()
                },
                request_count,
                target_word_count: request_count * self.words_per_section,
                metadata: metadata.clone(),
            },
            request_ids: requests.iter().map(|r| r.custom_id().to_string()).collect(),
            path: ExecutionPath::Batch,
            results: None,
        };
        self.registry.register(record)?;

        info!("✓ 批量任务已提交: {}", handle.id);
        Ok(handle.id)
    }

    /// 查询任务状态；任务结束且有结果地址时取回结果
    pub async fn poll(&self, job_id: &str) -> AppResult<JobStatusView> {
        let record = self.registry.get(job_id)?;

        // 已结束且结果已缓存，不再访问上游
        if record.job.state.is_terminal() && record.results.is_some() {
            debug!("任务 {} 已结束，使用缓存结果", job_id);
            return Ok(status_view(&record, CanonicalStatus::Completed, UpstreamStatus::Ended.user_message(record.job.target_word_count)));
        }

        let snapshot = self.client.get_batch(job_id).await?;
        let upstream = UpstreamStatus::from_raw(snapshot.processing_status.as_deref());
        let canonical = upstream.canonical();
        debug!(
            "任务 {} 上游状态: {:?} → {:?}, 计数: {:?}",
            job_id, snapshot.processing_status, canonical, snapshot.request_counts
        );

        let ended_at = parse_timestamp(snapshot.ended_at.as_deref());
        let mut record = self.registry.update(job_id, |r| {
            r.job.state = r.job.state.advance(&upstream);
            r.job.counts = snapshot.request_counts;
            if ended_at.is_some() {
                r.job.ended_at = ended_at;
            }
        })?;

        if canonical == CanonicalStatus::Completed && record.results.is_none() {
            if let Some(results_url) = snapshot.results_url.as_deref() {
                let results = self.retrieve_results(results_url, &record.request_ids).await?;
                info!(
                    "✓ 任务 {} 结果已取回: {} 条",
                    job_id,
                    results.len()
                );
                record = self.registry.update(job_id, |r| r.results = Some(results.clone()))?;
            }
        }

        let message = upstream.user_message(record.job.target_word_count);
        Ok(status_view(&record, canonical, message))
    }

    /// 下载并处理结果：JSONL 解析 → 对账 → 清洗
    async fn retrieve_results(
        &self,
        results_url: &str,
        request_ids: &[String],
    ) -> AppResult<Vec<NormalizedResult>> {
        let body = self.client.fetch_results(results_url).await?;
        let parsed = parse_results_jsonl(&body);
        let results = reconcile(request_ids, parsed)
            .into_iter()
            .map(|result| self.sanitizer.sanitize_result(result))
            .collect();
        Ok(results)
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
