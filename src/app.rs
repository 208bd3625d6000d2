//! 命令行驱动
//!
//! 1. **加载项目**：扫描 `project_folder` 下的所有 TOML 项目文件
//! 2. **并发控制**：使用 Semaphore 限制同时进行的项目数
//! 3. **轮询**：每个任务按固定间隔查询状态，整体受截止时间约束
//! 4. **全局统计**：汇总所有项目的生成结果

use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::config::Config;
use crate::models::{load_all_project_files, BatchStats, CanonicalStatus, JobStatusView, ProjectFile};
use crate::orchestrator::JobService;
use crate::utils::logging::{log_project_stats, log_projects_loaded, log_startup, print_final_stats};

/// 应用主结构
pub struct App {
    config: Config,
    service: Arc<JobService>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        log_startup(
            config.max_concurrent_projects,
            &format!("{:?}", config.execution_mode),
        );

        let service = JobService::new(config.clone()).context("初始化任务服务失败")?;

        Ok(Self {
            config,
            service: Arc::new(service),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        info!("\n📁 正在扫描待处理的项目...");
        let projects = load_all_project_files(&self.config.project_folder).await?;

        if projects.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML文件，程序结束");
            return Ok(());
        }

        let sections = projects.iter().map(|p| p.sections.len()).sum();
        log_projects_loaded(projects.len(), sections);

        let stats = self.process_all_projects(projects).await?;
        print_final_stats(stats.success, stats.failed, stats.total, stats.total_words);

        Ok(())
    }

    async fn process_all_projects(&self, projects: Vec<ProjectFile>) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_projects));
        let mut stats = ProcessingStats {
            total: projects.len(),
            ..Default::default()
        };

        let mut handles = Vec::with_capacity(projects.len());
        for (idx, project) in projects.into_iter().enumerate() {
            let project_index = idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;
            let service = self.service.clone();
            let config = self.config.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                process_project(&service, &project, &config).await.map_err(|e| {
                    error!("[项目 {}] ❌ {}: {:#}", project_index, project.title, e);
                    e
                })
            });
            handles.push((project_index, handle));
        }

        for (project_index, handle) in handles {
            match handle.await {
                Ok(Ok(project_stats)) => {
                    stats.success += 1;
                    stats.total_words += project_stats.total_words;
                }
                Ok(Err(_)) => stats.failed += 1,
                Err(e) => {
                    error!("[项目 {}] 任务执行失败: {}", project_index, e);
                    stats.failed += 1;
                }
            }
        }

        Ok(stats)
    }
}

/// 提交一个项目并等待任务结束
async fn process_project(service: &JobService, project: &ProjectFile, config: &Config) -> Result<BatchStats> {
    let requests = project.to_requests(&config.model_name, config.default_max_tokens);
    let receipt = service
        .submit_job(
            &requests,
            &project.title,
            &project.citation_style,
            &project.project_type,
        )
        .await
        .with_context(|| format!("提交项目失败: {}", project.title))?;

    info!(
        "📤 {} → {} ({:?}，{} 个章节，目标 {} 词)",
        project.title, receipt.job_id, receipt.path, receipt.request_count, receipt.target_word_count
    );

    let view = tokio::time::timeout(config.job_deadline(), wait_for_completion(service, &receipt.job_id, config))
        .await
        .map_err(|_| {
            anyhow!(
                "任务 {} 未在 {} 秒内完成",
                receipt.job_id,
                config.job_deadline_secs
            )
        })??;

    let stats = view.stats.unwrap_or_default();
    log_project_stats(&project.title, &view.job_id, &stats);
    Ok(stats)
}

async fn wait_for_completion(service: &JobService, job_id: &str, config: &Config) -> Result<JobStatusView> {
    loop {
        let view = service.get_job_status(job_id).await?;
        if view.status == CanonicalStatus::Completed {
            return Ok(view);
        }
        info!(
            "⏳ {} [{:?}] {}/{} - {}",
            job_id, view.status, view.completed_count, view.request_count, view.message
        );
        tokio::time::sleep(config.poll_interval()).await;
    }
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
    total_words: u64,
}
