//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `batch_orchestrator` - 批量任务编排
//! - 整批提交、轮询状态、取回并处理结果
//!
//! ### `sequential_executor` - 逐条执行
//! - 批量接口不可用时逐条调用单条补全接口，带固定间隔
//!
//! ### `job_service` - 对外入口
//! - `submit_job` / `get_job_status`，按执行模式分派
//!
//! ## 层次关系
//!
//! ```text
//! job_service
//!     ↓
//! batch_orchestrator / sequential_executor
//!     ↓
//! services (增强 / 清洗 / 规范化 / 统计 / 登记)
//!     ↓
//! clients (ProviderApi)
//! ```

pub mod batch_orchestrator;
pub mod job_service;
pub mod sequential_executor;

pub use batch_orchestrator::AsyncBatchOrchestrator;
pub use job_service::JobService;
pub use sequential_executor::{SequentialFallbackExecutor, SequentialRun};

use crate::models::{CanonicalStatus, JobRecord, JobStatusView};
use crate::services::stats_aggregator::aggregate;

/// 由登记记录生成状态视图
///
/// 上游计数全为 0 时请求总数退回登记时的请求数。
pub(crate) fn status_view(record: &JobRecord, status: CanonicalStatus, message: String) -> JobStatusView {
    let counts = record.job.counts;
    let request_count = match counts.total() {
        0 => record.job.request_count,
        total => total,
    };
    let stats = record.results.as_deref().map(aggregate);

    JobStatusView {
        job_id: record.job.id.clone(),
        status,
        message,
        results: record.results.clone(),
        stats,
        request_count,
        completed_count: counts.finished(),
        failed_count: counts.failed(),
        target_word_count: record.job.target_word_count,
        actual_word_count: stats.map(|s| s.total_words).unwrap_or(0),
        created_at: record.job.created_at,
        ended_at: record.job.ended_at,
    }
}
