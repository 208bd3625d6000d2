//! 内容清洗服务 - 业务能力层
//!
//! 去掉模型输出中的元评论（继续询问、方括号批注、免责声明），
//! 并保证最小长度与标题结构。系统提示词里的 "STRICT OUTPUT HYGIENE"
//! 就是这里每条规则对应的约束。

use regex::Regex;
use tracing::debug;

use crate::error::{AppResult, ItemError};
use crate::models::NormalizedResult;
use crate::utils::logging::truncate_text;

/// 清洗后正文的最小字符数
pub const MIN_CONTENT_CHARS: usize = 100;

/// 失败时附带的原文摘录长度
const DIAGNOSTIC_EXCERPT_CHARS: usize = 200;

/// 正文没有任何标题时补上的标题
pub const FALLBACK_HEADING: &str = "# Section Content";

/// 内容清洗服务
///
/// 纯函数式：不持有可变状态，可以在任意线程并行调用。
#[derive(Debug, Clone)]
pub struct ContentSanitizer {
    continuation: Vec<Regex>,
    bracket_notes: Vec<Regex>,
    disclaimer_lines: Regex,
    trailing_spaces: Regex,
    excess_newlines: Regex,
    heading: Regex,
}

impl ContentSanitizer {
    pub fn new() -> AppResult<Self> {
        Ok(Self {
            continuation: vec![
                Regex::new(
                    r"(?i)(?:would you like|do you want|shall|should)\s+(?:me to|i)\s+continue[^.?!\n\]]*[.?!]?",
                )?,
                Regex::new(
                    r"(?i)let me know if you(?:'d| would) like (?:me to )?(?:continue|expand)[^.?!\n\]]*[.?!]?",
                )?,
            ],
            bracket_notes: vec![
                Regex::new(
                    r"(?i)\[\s*(?:note|editor'?s note|this section represents|would you like me to continue|continued|word count)[^\]]*\]",
                )?,
                // 继续询问被删掉后留下的空括号
                Regex::new(r"\[\s*\]")?,
            ],
            disclaimer_lines: Regex::new(
                r"(?mi)^[ \t]*(?:\*\*)?(?:note|disclaimer|critical|important|word count)(?:\*\*)?\s*:.*$",
            )?,
            trailing_spaces: Regex::new(r"(?m)[ \t]+$")?,
            excess_newlines: Regex::new(r"\n{3,}")?,
            heading: Regex::new(r"(?m)^#{1,6}\s")?,
        })
    }

    /// 清洗模型输出
    ///
    /// 步骤有先后顺序，每一步都作用在上一步的输出上。
    /// 对已经清洗过的正文再执行一次，结果不变。
    pub fn sanitize(&self, raw: &str) -> Result<String, ItemError> {
        // 1. 空输入直接失败
        if raw.trim().is_empty() {
            return Err(ItemError::EmptyContent);
        }

        // 2-4 反复执行直到不再变化：删掉批注或整行后，前后文本可能拼出新的继续询问
        let mut text = raw.replace("\r\n", "\n");
        loop {
            let stripped = self.strip_meta_commentary(&text);
            if stripped == text {
                break;
            }
            text = stripped;
        }

        // 5. 多余空行
        text = self.trailing_spaces.replace_all(&text, "").into_owned();
        text = self.excess_newlines.replace_all(&text, "\n\n").into_owned();
        let text = text.trim();

        // 6. 最小长度
        let length = text.chars().count();
        if length < MIN_CONTENT_CHARS {
            debug!("清洗后内容过短: {} 字符", length);
            return Err(ItemError::Sanitization {
                length,
                excerpt: truncate_text(raw.trim(), DIAGNOSTIC_EXCERPT_CHARS),
            });
        }

        // 7. 保证至少有一个标题
        if self.heading.is_match(text) {
            Ok(text.to_string())
        } else {
            Ok(format!("{FALLBACK_HEADING}\n\n{text}"))
        }
    }

    /// 步骤 2-4 各执行一遍，只删除不插入
    fn strip_meta_commentary(&self, input: &str) -> String {
        let mut text = input.to_string();

        // 2. 继续询问
        for pattern in &self.continuation {
            text = pattern.replace_all(&text, "").into_owned();
        }

        // 3. 方括号批注
        for pattern in &self.bracket_notes {
            text = pattern.replace_all(&text, "").into_owned();
        }

        // 4. 免责声明 / 元指令行
        self.disclaimer_lines.replace_all(&text, "").into_owned()
    }

    /// 对一条规范化结果执行清洗
    ///
    /// 成功结果清洗失败时转为错误结果；错误结果原样返回。
    pub fn sanitize_result(&self, result: NormalizedResult) -> NormalizedResult {
        if !result.is_success() {
            return result;
        }
        match self.sanitize(&result.content) {
            Ok(clean) => NormalizedResult::success(result.custom_id, clean, result.output_tokens),
            Err(e) => NormalizedResult::failure(result.custom_id, &e),
        }
    }
}
