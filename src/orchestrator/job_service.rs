//! 对外入口 - 编排层
//!
//! `submit_job` 校验并增强请求后按执行模式分派：
//! - Batch：整批提交，之后由 `get_job_status` 轮询
//! - Sequential：逐条执行，返回时任务已结束
//! - Auto：先整批提交，上游未知错误或网络失败时降级为逐条执行
//!
//! 两个操作都会在任何网络调用之前检查密钥。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{info, warn};

use super::{status_view, AsyncBatchOrchestrator, SequentialFallbackExecutor};
use crate::clients::{HttpProviderClient, ProviderApi};
use crate::config::{Config, ExecutionMode};
use crate::error::{AppResult, JobError};
use crate::models::{
    CanonicalStatus, EnrichedRequest, ExecutionPath, GenerationRequest, JobStatusView,
    ProjectMetadata, SubmitReceipt, UpstreamStatus,
};
use crate::services::content_sanitizer::ContentSanitizer;
use crate::services::job_registry::JobRegistry;
use crate::services::request_enricher::RequestEnricher;

pub struct JobService {
    config: Config,
    enricher: RequestEnricher,
    registry: JobRegistry,
    batch: AsyncBatchOrchestrator,
    sequential: SequentialFallbackExecutor,
}

impl JobService {
    /// 使用 HTTP 客户端与内存登记表
    pub fn new(config: Config) -> AppResult<Self> {
        config.validate()?;
        let client: Arc<dyn ProviderApi> = Arc::new(HttpProviderClient::new(&config)?);
        let registry = JobRegistry::in_memory(config.job_ttl_secs);
        Self::with_parts(config, client, registry)
    }

    /// 注入上游客户端与登记表
    pub fn with_parts(
        config: Config,
        client: Arc<dyn ProviderApi>,
        registry: JobRegistry,
    ) -> AppResult<Self> {
        let sanitizer = Arc::new(ContentSanitizer::new()?);
        let batch = AsyncBatchOrchestrator::new(
            client.clone(),
            registry.clone(),
            sanitizer.clone(),
            config.words_per_section,
        );
        let sequential = SequentialFallbackExecutor::new(
            client,
            registry.clone(),
            sanitizer,
            config.sequential_pacing(),
            config.words_per_section,
        );

        Ok(Self {
            enricher: RequestEnricher::new(&config),
            config,
            registry,
            batch,
            sequential,
        })
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.registry
    }

    pub async fn submit_job(
        &self,
        requests: &[GenerationRequest],
        project_title: &str,
        citation_style: &str,
        project_type: &str,
    ) -> AppResult<SubmitReceipt> {
        self.config.provider_credential()?;
        validate_request_ids(requests)?;

        let metadata = ProjectMetadata {
            project_title: project_title.to_string(),
            citation_style: citation_style.to_string(),
            project_type: project_type.to_string(),
        };
        let enriched: Vec<EnrichedRequest> = requests
            .iter()
            .map(|request| self.enricher.enrich(request, project_title, citation_style))
            .collect();

        match self.config.execution_mode {
            ExecutionMode::Batch => self.submit_batch(&enriched, &metadata).await,
            ExecutionMode::Sequential => self.run_sequential(enriched, &metadata).await,
            ExecutionMode::Auto => match self.submit_batch(&enriched, &metadata).await {
                Err(e) if e.allows_fallback() => {
                    warn!("⚠️ 批量提交失败，降级为逐条执行: {}", e);
                    self.run_sequential(enriched, &metadata).await
                }
                other => other,
            },
        }
    }

    pub async fn get_job_status(&self, job_id: &str) -> AppResult<JobStatusView> {
        self.config.provider_credential()?;

        let record = self.registry.get(job_id)?;
        match record.path {
            ExecutionPath::Sequential => {
                let message = UpstreamStatus::Ended.user_message(record.job.target_word_count);
                Ok(status_view(&record, CanonicalStatus::Completed, message))
            }
            ExecutionPath::Batch => self.batch.poll(job_id).await,
        }
    }

    async fn submit_batch(
        &self,
        enriched: &[EnrichedRequest],
        metadata: &ProjectMetadata,
    ) -> AppResult<SubmitReceipt> {
        let job_id = self.batch.submit(enriched, metadata).await?;
        let record = self.registry.get(&job_id)?;
        Ok(SubmitReceipt {
            job_id,
            status: record.job.state.canonical(),
            path: ExecutionPath::Batch,
            request_count: record.job.request_count,
            target_word_count: record.job.target_word_count,
        })
    }

    async fn run_sequential(
        &self,
        enriched: Vec<EnrichedRequest>,
        metadata: &ProjectMetadata,
    ) -> AppResult<SubmitReceipt> {
        let request_count = enriched.len() as u64;
        let run = self.sequential.run(enriched, metadata).await?;
        info!(
            "✓ 逐条执行任务 {} 已完成: 成功 {} / 失败 {}",
            run.job_id, run.succeeded, run.failed
        );
        Ok(SubmitReceipt {
            job_id: run.job_id,
            status: CanonicalStatus::Completed,
            path: ExecutionPath::Sequential,
            request_count,
            target_word_count: request_count * self.config.words_per_section,
        })
    }
}

/// 请求集不能为空，custom_id 不能重复
fn validate_request_ids(requests: &[GenerationRequest]) -> AppResult<()> {
    if requests.is_empty() {
        return Err(JobError::EmptyRequestSet.into());
    }
    let mut seen = HashSet::with_capacity(requests.len());
    for request in requests {
        if !seen.insert(request.custom_id.as_str()) {
            return Err(JobError::DuplicateRequestId(request.custom_id.clone()).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::scripted::ScriptedProvider;
    use crate::error::{AppError, ConfigError};
    use crate::models::{BatchSnapshot, RequestCounts};

    const KEY: &str = "sk-ant-REDACTED";

    fn config(mode: ExecutionMode) -> Config {
        Config {
            provider_api_key: KEY.into(),
            execution_mode: mode,
            sequential_pacing_ms: 0,
            ..Config::default()
        }
    }

    fn requests(ids: &[&str]) -> Vec<GenerationRequest> {
        ids.iter()
            .map(|id| GenerationRequest::new(*id, format!("Write the {id} section"), "model-x", 4000))
            .collect()
    }

    fn service(mode: ExecutionMode, provider: ScriptedProvider) -> (JobService, Arc<ScriptedProvider>) {
        let provider = Arc::new(provider);
        let service = JobService::with_parts(config(mode), provider.clone(), JobRegistry::in_memory(3600)).unwrap();
        (service, provider)
    }

    #[tokio::test]
    async fn test_missing_credential_blocks_network() {
        let provider = Arc::new(ScriptedProvider::new().with_batch_reply(Ok("msgbatch_1")));
        let config = Config {
            provider_api_key: String::new(),
            ..config(ExecutionMode::Batch)
        };
        let service = JobService::with_parts(config, provider.clone(), JobRegistry::in_memory(3600)).unwrap();

        let err = service.submit_job(&requests(&["intro-1"]), "T", "APA", "thesis").await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingCredential { .. })));
        let err = service.get_job_status("msgbatch_1").await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::MissingCredential { .. })));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_credential_blocks_network() {
        let provider = Arc::new(ScriptedProvider::new());
        let config = Config {
            provider_api_key: "not-a-real-key".into(),
            ..config(ExecutionMode::Batch)
        };
        let service = JobService::with_parts(config, provider.clone(), JobRegistry::in_memory(3600)).unwrap();

        let err = service.submit_job(&requests(&["intro-1"]), "T", "APA", "thesis").await.unwrap_err();
        assert!(matches!(err, AppError::Config(ConfigError::InvalidCredentialFormat { .. })));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_request_set_validation() {
        let (service, provider) = service(ExecutionMode::Batch, ScriptedProvider::new());

        let err = service.submit_job(&[], "T", "APA", "thesis").await.unwrap_err();
        assert!(matches!(err, AppError::Job(JobError::EmptyRequestSet)));

        let err = service
            .submit_job(&requests(&["intro-1", "chapter-2", "intro-1"]), "T", "APA", "thesis")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Job(JobError::DuplicateRequestId(id)) if id == "intro-1"));
        assert!(provider.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_submit_and_poll_to_completion() {
        let (service, _) = service(
            ExecutionMode::Batch,
            ScriptedProvider::new()
                .with_batch_reply(Ok("msgbatch_9"))
                .with_snapshot(BatchSnapshot {
                    id: "msgbatch_9".into(),
                    processing_status: Some("in_progress".into()),
                    request_counts: RequestCounts { processing: 2, ..Default::default() },
                    ..Default::default()
                })
                .with_snapshot(BatchSnapshot {
                    id: "msgbatch_9".into(),
                    processing_status: Some("ended".into()),
                    request_counts: RequestCounts { succeeded: 2, ..Default::default() },
                    results_url: Some("https://results/9".into()),
                    ..Default::default()
                })
                .with_results(String::new()),
        );

        let receipt = service
            .submit_job(&requests(&["intro-1", "conclusion-2"]), "Urban Heat", "APA", "thesis")
            .await
            .unwrap();
        assert_eq!(receipt.job_id, "msgbatch_9");
        assert_eq!(receipt.status, CanonicalStatus::Processing);
        assert_eq!(receipt.path, ExecutionPath::Batch);
        assert_eq!(receipt.request_count, 2);
        assert_eq!(receipt.target_word_count, 6000);

        let first = service.get_job_status("msgbatch_9").await.unwrap();
        assert_eq!(first.status, CanonicalStatus::Processing);

        let second = service.get_job_status("msgbatch_9").await.unwrap();
        assert_eq!(second.status, CanonicalStatus::Completed);
        // 结果文件为空时每个请求仍有一条结果
        let results = second.results.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.content == "Error: No result was returned for this request"));
    }

    #[tokio::test]
    async fn test_auto_falls_back_on_upstream_failure() {
        let (service, provider) = service(
            ExecutionMode::Auto,
            ScriptedProvider::new().with_batch_reply(Err(503)),
        );

        let receipt = service
            .submit_job(&requests(&["intro-1", "conclusion-2"]), "Urban Heat", "APA", "thesis")
            .await
            .unwrap();
        assert_eq!(receipt.path, ExecutionPath::Sequential);
        assert_eq!(receipt.status, CanonicalStatus::Completed);
        assert_eq!(
            provider.calls(),
            ["create_batch:2", "create_message:intro-1", "create_message:conclusion-2"]
        );

        let view = service.get_job_status(&receipt.job_id).await.unwrap();
        assert_eq!(view.status, CanonicalStatus::Completed);
        assert_eq!(view.message, "Your project is ready for review.");
        assert_eq!(view.request_count, 2);
        assert_eq!(view.completed_count, 2);
        assert_eq!(view.failed_count, 0);
        assert_eq!(view.results.unwrap().len(), 2);
        assert!(view.actual_word_count > 0);
    }

    #[tokio::test]
    async fn test_auto_does_not_fall_back_on_rejection() {
        for status in [401u16, 400, 429] {
            let (service, provider) = service(
                ExecutionMode::Auto,
                ScriptedProvider::new().with_batch_reply(Err(status)),
            );
            assert!(service
                .submit_job(&requests(&["intro-1"]), "T", "APA", "thesis")
                .await
                .is_err());
            assert_eq!(provider.calls(), ["create_batch:1"]);
        }
    }

    #[tokio::test]
    async fn test_sequential_mode_skips_batch() {
        let (service, provider) = service(ExecutionMode::Sequential, ScriptedProvider::new());

        let receipt = service
            .submit_job(&requests(&["methodology-1"]), "T", "MLA", "thesis")
            .await
            .unwrap();
        assert_eq!(receipt.path, ExecutionPath::Sequential);
        assert_eq!(provider.calls(), ["create_message:methodology-1"]);
        assert_eq!(service.registry().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_id() {
        let (service, _) = service(ExecutionMode::Batch, ScriptedProvider::new());
        let err = service.get_job_status("msgbatch_missing").await.unwrap_err();
        assert!(matches!(err, AppError::Job(JobError::JobNotFound(_))));
    }
}
