//! 逐条执行器 - 编排层
//!
//! 批量接口不可用时，按提交顺序逐条调用单条补全接口。
//! 两次调用之间固定等待一段时间，避免触发上游限流。
//!
//! 401（密钥被拒）和 400（请求被拒）会中止整个任务，
//! 其他失败只记为该条的错误结果。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::clients::ProviderApi;
use crate::error::{ApiError, AppError, AppResult, ItemError, JobError};
use crate::models::{
    EnrichedRequest, ExecutionPath, Job, JobRecord, JobState, NormalizedResult, ProjectMetadata,
    RequestCounts,
};
use crate::services::content_sanitizer::ContentSanitizer;
use crate::services::job_registry::JobRegistry;
use crate::services::result_normalizer::normalize_message;

/// 逐条执行的结果
#[derive(Debug, Clone)]
pub struct SequentialRun {
    pub job_id: String,
    pub results: Vec<NormalizedResult>,
    pub succeeded: usize,
    pub failed: usize,
}

pub struct SequentialFallbackExecutor {
    client: Arc<dyn ProviderApi>,
    registry: JobRegistry,
    sanitizer: Arc<ContentSanitizer>,
    pacing: Duration,
    words_per_section: u64,
}

impl SequentialFallbackExecutor {
    pub fn new(
        client: Arc<dyn ProviderApi>,
        registry: JobRegistry,
        sanitizer: Arc<ContentSanitizer>,
        pacing: Duration,
        words_per_section: u64,
    ) -> Self {
        Self {
            client,
            registry,
            sanitizer,
            pacing,
            words_per_section,
        }
    }

    pub async fn run(
        &self,
        requests: Vec<EnrichedRequest>,
        metadata: &ProjectMetadata,
    ) -> AppResult<SequentialRun> {
        if requests.is_empty() {
            return Err(JobError::EmptyRequestSet.into());
        }

        let total = requests.len();
        info!("🔁 逐条执行: {} ({} 个章节)", metadata.project_title, total);

        let mut results = Vec::with_capacity(total);
        for (index, request) in requests.iter().enumerate() {
            if index > 0 && !self.pacing.is_zero() {
                tokio::time::sleep(self.pacing).await;
            }

            let custom_id = request.custom_id();
            match self.client.create_message(request).await {
                Ok(message) => {
                    let result = self
                        .sanitizer
                        .sanitize_result(normalize_message(custom_id, message));
                    info!(
                        "[{}/{}] ✓ {} ({} 词)",
                        index + 1,
                        total,
                        custom_id,
                        result.word_count
                    );
                    results.push(result);
                }
                Err(e) if aborts_run(&e) => {
                    error!("[{}/{}] ❌ {} 被上游拒绝，中止执行: {}", index + 1, total, custom_id, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("[{}/{}] ⚠️ {} 失败: {}", index + 1, total, custom_id, e);
                    results.push(NormalizedResult::failure(
                        custom_id,
                        &ItemError::Upstream(e.to_string()),
                    ));
                }
            }
        }

        let succeeded = results.iter().filter(|r| r.is_success()).count();
        let failed = results.len() - succeeded;
        let job_id = local_job_id();
        let now = Utc::now();
        let request_count = total as u64;

        self.registry.register(JobRecord {
            job: Job {
                id: job_id.clone(),
                created_at: now,
                ended_at: Some(now),
                state: JobState::Ended,
                counts: RequestCounts {
                    succeeded: succeeded as u64,
                    errored: failed as u64,
                    ..RequestCounts::default()
                },
                request_count,
                target_word_count: request_count * self.words_per_section,
                metadata: metadata.clone(),
            },
            request_ids: requests.iter().map(|r| r.custom_id().to_string()).collect(),
            path: ExecutionPath::Sequential,
            results: Some(results.clone()),
        })?;

        info!("✓ 逐条执行完成: {} 成功 {}/{}", job_id, succeeded, total);
        Ok(SequentialRun {
            job_id,
            results,
            succeeded,
            failed,
        })
    }
}

fn aborts_run(error: &AppError) -> bool {
    error.is_auth_failure() || matches!(error, AppError::Api(ApiError::UpstreamBadRequest { .. }))
}

/// 本地生成的任务 id：时间戳 + 随机后缀
fn local_job_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("seq_{}_{}", Utc::now().timestamp_millis(), &suffix[..8])
}
