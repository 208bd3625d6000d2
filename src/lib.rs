//! # Section Batch
//!
//! 多章节学术文本的 LLM 生成任务编排
//!
//! ## 架构设计
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - `ProviderApi` 抽象上游生成 API，`HttpProviderClient` 基于 reqwest 实现
//!
//! ### ② 业务能力层（Services）
//! - `RequestEnricher` - 按章节类型构建系统提示词
//! - `ContentSanitizer` - 清除模型输出中的对话残留
//! - `result_normalizer` - 兼容多种批量结果结构，对账请求标识
//! - `stats_aggregator` - 字数 / token / 成功率统计
//! - `JobRegistry` - 进程内任务登记表
//!
//! ### ③ 编排层（Orchestration）
//! - `AsyncBatchOrchestrator` - 整批提交与轮询
//! - `SequentialFallbackExecutor` - 逐条执行
//! - `JobService` - `submit_job` / `get_job_status` 入口
//!
//! ### ④ 命令行（App）
//! - 加载 TOML 项目文件，并发提交并等待结果

pub mod app;
pub mod clients;
pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;

// 重新导出常用类型
pub use app::App;
pub use clients::{HttpProviderClient, ProviderApi};
pub use config::{Config, ExecutionMode};
pub use error::{AppError, AppResult, ItemError};
pub use models::{
    BatchStats, CanonicalStatus, GenerationRequest, JobStatusView, NormalizedResult, SubmitReceipt,
};
pub use orchestrator::JobService;
pub use services::JobRegistry;
