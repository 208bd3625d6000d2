//! 结果规范化服务 - 业务能力层
//!
//! 上游结果文件（JSONL）在不同版本里出现过几种结构，这里按顺序逐个尝试：
//!
//! 1. 扁平结构：`{type: "succeeded"|"errored", result: {...}}`
//! 2. 文档结构：`{custom_id, result: {type, message?, error?}}`
//! 3. 旧结构：`{type: "succeeded", message: {...}}` 或 `{error: {...}}`
//!
//! 都不匹配时返回 "Unrecognized batch result structure" 错误结果。
//! 规范化永远不会失败，总是返回一条 `NormalizedResult`。

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::ItemError;
use crate::models::{ErrorPayload, MessagePayload, NormalizedResult};

pub const UNRECOGNIZED_STRUCTURE: &str = "Unrecognized batch result structure";
const UNKNOWN_ID: &str = "unknown";

/// 各种结构统一后的结果
#[derive(Debug, Clone, PartialEq)]
enum Outcome {
    Succeeded(MessagePayload),
    Errored(String),
    Canceled,
    Expired,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FlatKind {
    Succeeded,
    Errored,
}

/// 结构 1
#[derive(Debug, Deserialize)]
struct FlattenedRecord {
    #[serde(rename = "type")]
    kind: FlatKind,
    result: Value,
}

/// 结构 2 的 result 字段
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum DocumentedOutcome {
    Succeeded {
        message: MessagePayload,
    },
    Errored {
        #[serde(default)]
        error: Option<ErrorPayload>,
    },
    Canceled,
    Expired,
}

/// 结构 2
#[derive(Debug, Deserialize)]
struct DocumentedRecord {
    result: DocumentedOutcome,
}

/// 结构 3
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LegacyRecord {
    Message {
        #[serde(rename = "type")]
        kind: FlatKind,
        message: MessagePayload,
    },
    Error {
        error: ErrorPayload,
    },
}

type ShapeAttempt = fn(&Value) -> Option<Outcome>;

/// 尝试顺序即优先级
const SHAPES: &[(&str, ShapeAttempt)] = &[
    ("flattened", try_flattened),
    ("documented", try_documented),
    ("legacy", try_legacy),
];

fn try_flattened(value: &Value) -> Option<Outcome> {
    let record = FlattenedRecord::deserialize(value).ok()?;
    if !record.result.is_object() {
        return None;
    }
    let inner = |key: &str| record.result.get(key).unwrap_or(&record.result).clone();
    match record.kind {
        FlatKind::Succeeded => serde_json::from_value(inner("message")).ok().map(Outcome::Succeeded),
        FlatKind::Errored => {
            let error: ErrorPayload = serde_json::from_value(inner("error")).unwrap_or_default();
            Some(Outcome::Errored(error.describe()))
        }
    }
}

fn try_documented(value: &Value) -> Option<Outcome> {
    let record = DocumentedRecord::deserialize(value).ok()?;
    Some(match record.result {
        DocumentedOutcome::Succeeded { message } => Outcome::Succeeded(message),
        DocumentedOutcome::Errored { error } => Outcome::Errored(error.unwrap_or_default().describe()),
        DocumentedOutcome::Canceled => Outcome::Canceled,
        DocumentedOutcome::Expired => Outcome::Expired,
    })
}

fn try_legacy(value: &Value) -> Option<Outcome> {
    match LegacyRecord::deserialize(value).ok()? {
        LegacyRecord::Message {
            kind: FlatKind::Succeeded,
            message,
        } => Some(Outcome::Succeeded(message)),
        LegacyRecord::Message {
            kind: FlatKind::Errored,
            ..
        } => None,
        LegacyRecord::Error { error } => Some(Outcome::Errored(error.describe())),
    }
}

fn custom_id_of(value: &Value) -> String {
    value
        .get("custom_id")
        .and_then(Value::as_str)
        .unwrap_or(UNKNOWN_ID)
        .to_string()
}

/// 规范化一条原始结果（尚未清洗）
pub fn normalize(raw: &Value) -> NormalizedResult {
    let custom_id = custom_id_of(raw);

    let outcome = SHAPES.iter().find_map(|(name, attempt)| {
        let outcome = attempt(raw)?;
        debug!("结果 {} 匹配结构: {}", custom_id, name);
        Some(outcome)
    });

    match outcome {
        Some(outcome) => finish(custom_id, outcome),
        None => {
            warn!("结果 {} 无法识别的结构", custom_id);
            NormalizedResult::failure(custom_id, &ItemError::ResultParse(UNRECOGNIZED_STRUCTURE.to_string()))
        }
    }
}

/// 规范化单条补全接口的返回
pub fn normalize_message(custom_id: &str, message: MessagePayload) -> NormalizedResult {
    finish(custom_id.to_string(), Outcome::Succeeded(message))
}

fn finish(custom_id: String, outcome: Outcome) -> NormalizedResult {
    match outcome {
        Outcome::Succeeded(message) => {
            let text = message.joined_text();
            if text.is_empty() {
                NormalizedResult::failure(custom_id, &ItemError::NoTextContent)
            } else {
                NormalizedResult::success(custom_id, text, message.output_tokens())
            }
        }
        Outcome::Errored(description) => NormalizedResult::failure(custom_id, &ItemError::Upstream(description)),
        Outcome::Canceled => NormalizedResult::failure(custom_id, &ItemError::Canceled),
        Outcome::Expired => NormalizedResult::failure(custom_id, &ItemError::Expired),
    }
}

/// 解析 JSONL 结果文件
///
/// 无法解析为 JSON 的行：能从原文找到 custom_id 时记为该请求的解析错误，
/// 找不到时记录警告后丢弃。
pub fn parse_results_jsonl(body: &str) -> Vec<NormalizedResult> {
    body.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(index, line)| match serde_json::from_str::<Value>(line) {
            Ok(value) => Some(normalize(&value)),
            Err(e) => match salvage_custom_id(line) {
                Some(custom_id) => {
                    warn!("结果文件第 {} 行 ({}) JSON 解析失败: {}", index + 1, custom_id, e);
                    let reason = format!("Result line could not be parsed: {e}");
                    Some(NormalizedResult::failure(custom_id, &ItemError::ResultParse(reason)))
                }
                None => {
                    warn!("结果文件第 {} 行 JSON 解析失败且无法识别请求，已丢弃: {}", index + 1, e);
                    None
                }
            },
        })
        .collect()
}

/// 从损坏的行里找出 custom_id
fn salvage_custom_id(line: &str) -> Option<String> {
    let pattern = Regex::new(r#""custom_id"\s*:\s*"([^"]+)""#).ok()?;
    pattern
        .captures(line)
        .and_then(|captures| captures.get(1))
        .map(|id| id.as_str().to_string())
}

/// 按提交顺序对账：每个请求标识恰好一条结果
///
/// 缺失的标识补一条错误结果；未知标识与重复结果丢弃。
pub fn reconcile(request_ids: &[String], results: Vec<NormalizedResult>) -> Vec<NormalizedResult> {
    let mut pool = results;
    let reconciled: Vec<NormalizedResult> = request_ids
        .iter()
        .map(|id| match pool.iter().position(|r| &r.custom_id == id) {
            Some(index) => pool.swap_remove(index),
            None => {
                warn!("请求 {} 没有返回结果", id);
                NormalizedResult::failure(id.clone(), &ItemError::MissingResult)
            }
        })
        .collect();

    if !pool.is_empty() {
        let leftovers: Vec<&str> = pool.iter().map(|r| r.custom_id.as_str()).collect();
        warn!("丢弃 {} 条无法对账的结果: {:?}", pool.len(), leftovers);
    }

    reconciled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResultStatus;
    use serde_json::json;

    fn message_json(text: &str) -> Value {
        json!({
            "content": [{"type": "text", "text": text}],
            "usage": {"input_tokens": 10, "output_tokens": 42}
        })
    }

    #[test]
    fn test_three_shapes_are_equivalent() {
        let flattened = json!({"custom_id": "a", "type": "succeeded", "result": {"message": message_json("Hello world")}});
        let documented = json!({"custom_id": "a", "result": {"type": "succeeded", "message": message_json("Hello world")}});
        let legacy = json!({"custom_id": "a", "type": "succeeded", "message": message_json("Hello world")});

        let results: Vec<NormalizedResult> = [flattened, documented, legacy].iter().map(normalize).collect();
        for result in &results {
            assert_eq!(result.status, ResultStatus::Success);
            assert_eq!(result.content, "Hello world");
            assert_eq!(result.output_tokens, 42);
            assert_eq!(result.custom_id, "a");
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(results[1], results[2]);
    }

    #[test]
    fn test_flattened_result_may_be_the_message_itself() {
        let raw = json!({"custom_id": "a", "type": "succeeded", "result": message_json("Hello world")});
        let result = normalize(&raw);
        assert!(result.is_success());
        assert_eq!(result.content, "Hello world");
    }

    #[test]
    fn test_text_blocks_are_joined() {
        let raw = json!({"custom_id": "a", "result": {"type": "succeeded", "message": {
            "content": [
                {"type": "text", "text": "  First"},
                {"type": "tool_use", "id": "x"},
                {"type": "text", "text": "Second  "}
            ]
        }}});
        let result = normalize(&raw);
        assert_eq!(result.content, "First\nSecond");
        assert_eq!(result.output_tokens, 0);
    }

    #[test]
    fn test_empty_text_on_success_is_an_error() {
        let raw = json!({"custom_id": "a", "result": {"type": "succeeded", "message": {"content": []}}});
        let result = normalize(&raw);
        assert_eq!(result.status, ResultStatus::Error);
        assert_eq!(result.content, "Error: No text content found in successful response");
    }

    #[test]
    fn test_errored_canceled_expired() {
        let errored = json!({"custom_id": "e", "result": {"type": "errored", "error": {
            "type": "error", "error": {"type": "invalid_request_error", "message": "prompt is too long"}
        }}});
        let canceled = json!({"custom_id": "c", "result": {"type": "canceled"}});
        let expired = json!({"custom_id": "x", "result": {"type": "expired"}});

        let errored = normalize(&errored);
        assert_eq!(errored.content, "Error: prompt is too long");
        assert_eq!(errored.word_count, 0);

        assert_eq!(normalize(&canceled).content, "Error: Request was canceled before it completed");
        assert_eq!(normalize(&expired).content, "Error: Request expired before it could be processed");
    }

    #[test]
    fn test_flattened_and_legacy_errors() {
        let flat = json!({"custom_id": "a", "type": "errored", "result": {"error": {"message": "overloaded"}}});
        assert_eq!(normalize(&flat).content, "Error: overloaded");

        let bare = json!({"custom_id": "b", "error": {"message": "boom"}});
        assert_eq!(normalize(&bare).content, "Error: boom");
    }

    #[test]
    fn test_unrecognized_structure_never_panics() {
        for raw in [json!({"custom_id": "a", "foo": 1}), json!([1, 2, 3]), json!("text"), json!(null)] {
            let result = normalize(&raw);
            assert_eq!(result.status, ResultStatus::Error);
            assert_eq!(result.content, format!("Error: {UNRECOGNIZED_STRUCTURE}"));
        }
        assert_eq!(normalize(&json!({"x": 1})).custom_id, "unknown");
    }

    #[test]
    fn test_jsonl_skips_broken_lines() {
        let body = format!(
            "{}\n\nnot json\n{}\n",
            json!({"custom_id": "a", "result": {"type": "succeeded", "message": message_json("A")}}),
            json!({"custom_id": "b", "result": {"type": "expired"}}),
        );
        let results = parse_results_jsonl(&body);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].custom_id, "a");
        assert_eq!(results[1].custom_id, "b");
    }

    #[test]
    fn test_truncated_line_with_id_is_a_parse_error() {
        let body = "{\"custom_id\": \"intro-1\", \"result\": {\n{\"result\": {";
        let results = parse_results_jsonl(body);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].custom_id, "intro-1");
        assert_eq!(results[0].status, ResultStatus::Error);
        assert!(results[0].content.starts_with("Error: Result line could not be parsed: "));

        let ids = vec!["intro-1".to_string()];
        let reconciled = reconcile(&ids, results);
        assert!(reconciled[0].content.starts_with("Error: Result line could not be parsed"));
    }

    #[test]
    fn test_reconcile_orders_fills_and_drops() {
        let ids: Vec<String> = ["intro-1", "chapter-2", "conclusion-3"].iter().map(|s| s.to_string()).collect();
        let results = vec![
            NormalizedResult::success("conclusion-3", "c", 1),
            NormalizedResult::success("stray", "s", 1),
            NormalizedResult::success("intro-1", "i", 1),
            NormalizedResult::success("intro-1", "duplicate", 1),
        ];

        let reconciled = reconcile(&ids, results);
        let order: Vec<&str> = reconciled.iter().map(|r| r.custom_id.as_str()).collect();
        assert_eq!(order, ["intro-1", "chapter-2", "conclusion-3"]);
        assert_eq!(reconciled[0].content, "i");
        assert_eq!(reconciled[1].content, "Error: No result was returned for this request");
        assert_eq!(reconciled[2].content, "c");
    }
}
