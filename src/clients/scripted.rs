//! 测试用的脚本化上游实现

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::ProviderApi;
use crate::error::{ApiError, AppResult};
use crate::models::{BatchHandle, BatchSnapshot, ContentBlock, EnrichedRequest, MessagePayload, Usage};

/// 足够长、带标题的正文，清洗后保持原样
pub fn long_text(custom_id: &str) -> String {
    format!(
        "# {custom_id}\n\nThis section examines the research question in depth, drawing on \
         published evidence and a careful reading of the primary sources for {custom_id}."
    )
}

#[derive(Default)]
pub struct ScriptedProvider {
    /// create_batch 的返回：Ok(batch id) 或 Err(HTTP 状态码)
    pub batch_reply: Mutex<Option<Result<String, u16>>>,
    /// 依次返回的状态快照，最后一个会一直重复
    pub snapshots: Mutex<VecDeque<BatchSnapshot>>,
    pub results_body: Mutex<String>,
    /// 单条补全按 custom_id 返回的失败状态码
    pub message_failures: Mutex<HashMap<String, u16>>,
    /// 单条补全返回无法解析响应体的 custom_id
    pub malformed_messages: Mutex<HashSet<String>>,
    /// 调用记录
    pub calls: Mutex<Vec<String>>,
}

impl ScriptedProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_reply(self, reply: Result<&str, u16>) -> Self {
        *self.batch_reply.lock().unwrap() = Some(reply.map(str::to_string));
        self
    }

    pub fn with_snapshot(self, snapshot: BatchSnapshot) -> Self {
        self.snapshots.lock().unwrap().push_back(snapshot);
        self
    }

    pub fn with_results(self, body: impl Into<String>) -> Self {
        *self.results_body.lock().unwrap() = body.into();
        self
    }

    pub fn failing_message(self, custom_id: &str, status: u16) -> Self {
        self.message_failures
            .lock()
            .unwrap()
            .insert(custom_id.to_string(), status);
        self
    }

    pub fn malformed_message(self, custom_id: &str) -> Self {
        self.malformed_messages
            .lock()
            .unwrap()
            .insert(custom_id.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

fn status_error(status: u16) -> crate::error::AppError {
    ApiError::from_status(status, format!("scripted failure {status}")).into()
}

#[async_trait]
impl ProviderApi for ScriptedProvider {
    async fn create_batch(&self, requests: &[EnrichedRequest]) -> AppResult<BatchHandle> {
        self.record(format!("create_batch:{}", requests.len()));
        match self.batch_reply.lock().unwrap().clone() {
            Some(Ok(id)) => Ok(BatchHandle {
                id,
                processing_status: Some("in_progress".to_string()),
                created_at: Some("2024-05-01T10:00:00Z".to_string()),
            }),
            Some(Err(status)) => Err(status_error(status)),
            None => Err(status_error(500)),
        }
    }

    async fn get_batch(&self, batch_id: &str) -> AppResult<BatchSnapshot> {
        self.record(format!("get_batch:{batch_id}"));
        let mut snapshots = self.snapshots.lock().unwrap();
        let snapshot = if snapshots.len() > 1 {
            snapshots.pop_front()
        } else {
            snapshots.front().cloned()
        };
        Ok(snapshot.unwrap_or_default())
    }

    async fn fetch_results(&self, results_url: &str) -> AppResult<String> {
        self.record(format!("fetch_results:{results_url}"));
        Ok(self.results_body.lock().unwrap().clone())
    }

    async fn create_message(&self, request: &EnrichedRequest) -> AppResult<MessagePayload> {
        self.record(format!("create_message:{}", request.custom_id()));
        if let Some(status) = self.message_failures.lock().unwrap().get(request.custom_id()) {
            return Err(status_error(*status));
        }
        if self.malformed_messages.lock().unwrap().contains(request.custom_id()) {
            return Err(ApiError::MalformedResponse {
                endpoint: "/v1/messages".to_string(),
                reason: "expected value at line 1 column 1".to_string(),
            }
            .into());
        }
        Ok(MessagePayload {
            content: vec![ContentBlock::text(long_text(request.custom_id()))],
            usage: Some(Usage {
                input_tokens: 100,
                output_tokens: 50,
            }),
        })
    }
}
