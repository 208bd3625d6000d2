use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::provider::RequestCounts;
use super::request::ProjectMetadata;
use super::result::{BatchStats, NormalizedResult};

/// 上游返回的 `processing_status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamStatus {
    InProgress,
    Canceling,
    Ended,
    /// 缺失或未知的取值（包括旧版的 failed / expired）
    Unknown(Option<String>),
}

impl UpstreamStatus {
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some("in_progress") => UpstreamStatus::InProgress,
            Some("canceling") => UpstreamStatus::Canceling,
            Some("ended") => UpstreamStatus::Ended,
            other => UpstreamStatus::Unknown(other.map(str::to_string)),
        }
    }

    pub fn canonical(&self) -> CanonicalStatus {
        match self {
            UpstreamStatus::InProgress | UpstreamStatus::Canceling => CanonicalStatus::Processing,
            UpstreamStatus::Ended => CanonicalStatus::Completed,
            UpstreamStatus::Unknown(_) => CanonicalStatus::Pending,
        }
    }

    /// 面向用户的状态说明
    pub fn user_message(&self, target_word_count: u64) -> String {
        match self {
            UpstreamStatus::InProgress => format!(
                "The model is generating your {target_word_count}-word project. This can take several minutes."
            ),
            UpstreamStatus::Canceling => {
                "Batch is canceling; some requests may still complete.".to_string()
            }
            UpstreamStatus::Ended => "Your project is ready for review.".to_string(),
            UpstreamStatus::Unknown(_) => "Your project is queued.".to_string(),
        }
    }
}

/// 对调用方暴露的状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalStatus {
    Pending,
    Processing,
    Completed,
}

/// 任务内部状态机：Submitted → Processing → (Canceling →) Ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Submitted,
    Processing,
    Canceling,
    Ended,
}

impl JobState {
    /// 根据上游状态推进；Ended 为终态，不会回退
    pub fn advance(self, upstream: &UpstreamStatus) -> JobState {
        match (self, upstream) {
            (JobState::Ended, _) => JobState::Ended,
            (_, UpstreamStatus::Ended) => JobState::Ended,
            (JobState::Canceling, _) => JobState::Canceling,
            (_, UpstreamStatus::Canceling) => JobState::Canceling,
            (_, UpstreamStatus::InProgress) => JobState::Processing,
            (state, UpstreamStatus::Unknown(_)) => state,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == JobState::Ended
    }

    pub fn canonical(self) -> CanonicalStatus {
        match self {
            JobState::Submitted => CanonicalStatus::Pending,
            JobState::Processing | JobState::Canceling => CanonicalStatus::Processing,
            JobState::Ended => CanonicalStatus::Completed,
        }
    }
}

/// 任务由哪条路径执行
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionPath {
    Batch,
    Sequential,
}

/// 任务元数据
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub state: JobState,
    pub counts: RequestCounts,
    pub request_count: u64,
    pub target_word_count: u64,
    pub metadata: ProjectMetadata,
}

/// 登记表中的一条记录
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job: Job,
    /// 提交顺序的请求标识，用于结果对账
    pub request_ids: Vec<String>,
    pub path: ExecutionPath,
    /// 已取回（或逐条执行得到）的结果
    pub results: Option<Vec<NormalizedResult>>,
}

/// `submit_job` 的返回
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmitReceipt {
    pub job_id: String,
    pub status: CanonicalStatus,
    pub path: ExecutionPath,
    pub request_count: u64,
    pub target_word_count: u64,
}

/// `get_job_status` 的返回
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub job_id: String,
    pub status: CanonicalStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub results: Option<Vec<NormalizedResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<BatchStats>,
    pub request_count: u64,
    pub completed_count: u64,
    pub failed_count: u64,
    pub target_word_count: u64,
    pub actual_word_count: u64,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}
