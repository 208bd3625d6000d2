use serde::{Deserialize, Serialize};

use crate::error::ItemError;

/// 结果状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Error,
}

/// 规范化后的单条结果，是对外暴露的唯一结果结构
///
/// - `status == Error` 时 `content` 以 `Error:` 开头
/// - `status == Success` 时 `content` 是清洗后的非空正文
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedResult {
    pub custom_id: String,
    pub content: String,
    pub status: ResultStatus,
    pub output_tokens: u64,
    pub word_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NormalizedResult {
    pub fn success(custom_id: impl Into<String>, content: impl Into<String>, output_tokens: u64) -> Self {
        let content = content.into();
        let word_count = count_words(&content);
        Self {
            custom_id: custom_id.into(),
            content,
            status: ResultStatus::Success,
            output_tokens,
            word_count,
            error: None,
        }
    }

    pub fn failure(custom_id: impl Into<String>, error: &ItemError) -> Self {
        let message = error.to_string();
        Self {
            custom_id: custom_id.into(),
            content: format!("Error: {message}"),
            status: ResultStatus::Error,
            output_tokens: 0,
            word_count: 0,
            error: Some(message),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ResultStatus::Success
    }
}

/// 以空白分隔的词数
pub fn count_words(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// 一组结果的汇总统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchStats {
    pub total_words: u64,
    pub average_words: u64,
    /// 成功率（百分比）
    pub success_rate: f64,
    pub total_tokens: u64,
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_content_is_prefixed() {
        let result = NormalizedResult::failure("a", &ItemError::Canceled);
        assert!(result.content.starts_with("Error: "));
        assert_eq!(result.word_count, 0);
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.error.as_deref(), Some("Request was canceled before it completed"));
    }

    #[test]
    fn test_success_counts_words() {
        let result = NormalizedResult::success("a", "# Title\n\nOne two  three", 12);
        assert_eq!(result.word_count, 5);
        assert!(result.is_success());
    }
}
