//! 上游 API 的线上数据结构
//!
//! 字段尽量宽松（`#[serde(default)]`），缺字段不报错，由上层兜底。

use serde::{Deserialize, Serialize};

/// 批量提交的返回
#[derive(Debug, Clone, Deserialize)]
pub struct BatchHandle {
    pub id: String,
    #[serde(default)]
    pub processing_status: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// 各结果类型的计数
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestCounts {
    #[serde(default)]
    pub processing: u64,
    #[serde(default)]
    pub succeeded: u64,
    #[serde(default)]
    pub errored: u64,
    #[serde(default)]
    pub canceled: u64,
    #[serde(default)]
    pub expired: u64,
}

impl RequestCounts {
    /// 所有计数之和，不信任上游单独给出的 total 字段
    pub fn total(&self) -> u64 {
        self.processing + self.finished()
    }

    /// 已结束（成功或失败）的请求数
    pub fn finished(&self) -> u64 {
        self.succeeded + self.failed()
    }

    pub fn failed(&self) -> u64 {
        self.errored + self.canceled + self.expired
    }
}

/// 批量任务状态查询的返回
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchSnapshot {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub processing_status: Option<String>,
    #[serde(default)]
    pub request_counts: RequestCounts,
    #[serde(default)]
    pub results_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            kind: "text".to_string(),
            text: Some(text.into()),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    #[serde(default)]
    pub input_tokens: u64,
    #[serde(default)]
    pub output_tokens: u64,
}

/// 成功时的模型消息（单条补全接口的返回体也是这个结构）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessagePayload {
    pub content: Vec<ContentBlock>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

impl MessagePayload {
    /// 拼接所有 text 类型的内容块
    pub fn joined_text(&self) -> String {
        self.content
            .iter()
            .filter(|block| block.kind == "text")
            .filter_map(|block| block.text.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }

    pub fn output_tokens(&self) -> u64 {
        self.usage.map(|u| u.output_tokens).unwrap_or(0)
    }
}

/// 错误体，可能是 `{message}`，也可能嵌套一层 `{type:"error", error:{message}}`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ErrorPayload {
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<Box<ErrorPayload>>,
}

impl ErrorPayload {
    pub fn describe(&self) -> String {
        if let Some(message) = self.message.as_deref().filter(|m| !m.trim().is_empty()) {
            return message.to_string();
        }
        if let Some(inner) = &self.error {
            return inner.describe();
        }
        match self.kind.as_deref() {
            Some(kind) if kind != "error" => format!("Request failed ({kind})"),
            _ => "Request failed without an error message".to_string(),
        }
    }
}
