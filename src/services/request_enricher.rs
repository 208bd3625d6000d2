//! 请求增强服务 - 业务能力层
//!
//! 把调用方的原始章节请求补全为可以直接提交给上游的请求：
//! 学术写作系统提示词、token 上限、固定温度、末尾的清洁输出指令。

use crate::config::Config;
use crate::models::{EnrichedRequest, GenerationRequest, Message};

/// 上游文档中的最大输出 token 数
pub const PROVIDER_MAX_OUTPUT_TOKENS: u32 = 8192;

/// 本生成模式的固定温度，调用方不可配置
pub const GENERATION_TEMPERATURE: f32 = 0.7;

/// 上下文摘录的最大字符数
const CONTEXT_EXCERPT_CHARS: usize = 300;

/// 追加在消息列表末尾的清洁输出指令
pub const CLEANUP_INSTRUCTION: &str = "Deliver only the final, polished section content. \
Do not add notes, disclaimers, word counts, bracketed editorial remarks, or questions about \
continuing. Do not comment on the length or completeness of the text.";

/// 内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Introduction,
    LiteratureReview,
    Methodology,
    Analysis,
    Conclusion,
    Chapter,
    Default,
}

/// 分类顺序即优先级，第一个命中的类型胜出
const CLASSIFICATION_RULES: &[(ContentType, &[&str])] = &[
    (ContentType::Introduction, &["intro"]),
    (ContentType::LiteratureReview, &["literature", "lit-review", "lit_review"]),
    (ContentType::Methodology, &["method"]),
    (ContentType::Analysis, &["analysis", "results", "findings", "discussion"]),
    (ContentType::Conclusion, &["conclu"]),
    (ContentType::Chapter, &["chapter"]),
];

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            ContentType::Introduction => "introduction",
            ContentType::LiteratureReview => "literature_review",
            ContentType::Methodology => "methodology",
            ContentType::Analysis => "analysis",
            ContentType::Conclusion => "conclusion",
            ContentType::Chapter => "chapter",
            ContentType::Default => "default",
        }
    }

    fn guidance(self) -> &'static str {
        match self {
            ContentType::Introduction => {
                "Write the introduction: establish the background, state the research problem, \
                 the aims and research questions, the significance of the study, and outline \
                 the structure of the work."
            }
            ContentType::LiteratureReview => {
                "Write the literature review: synthesise prior scholarship thematically, compare \
                 competing positions, identify gaps in existing research, and build the \
                 theoretical framework that motivates this study."
            }
            ContentType::Methodology => {
                "Write the methodology: justify the research design, describe data sources, \
                 sampling, instruments and procedures, explain the analytical approach, and \
                 address validity, reliability and ethics."
            }
            ContentType::Analysis => {
                "Write the analysis: present the findings systematically, interpret them against \
                 the research questions and the literature, and discuss their implications."
            }
            ContentType::Conclusion => {
                "Write the conclusion: summarise the key findings, state the contributions to \
                 knowledge, acknowledge limitations, and recommend directions for future research."
            }
            ContentType::Chapter => {
                "Write a complete chapter with a clear argument, logically ordered sections, and \
                 transitions that connect it to the rest of the work."
            }
            ContentType::Default => {
                "Write a complete, well-structured academic section with a clear argument and \
                 evidence-based discussion."
            }
        }
    }
}

/// 按请求标识做大小写不敏感的子串匹配，先命中的规则优先
pub fn classify_content_type(custom_id: &str) -> ContentType {
    let id = custom_id.to_lowercase();
    CLASSIFICATION_RULES
        .iter()
        .find(|(_, needles)| needles.iter().any(|needle| id.contains(needle)))
        .map(|(content_type, _)| *content_type)
        .unwrap_or(ContentType::Default)
}

/// 取第一条消息的前 300 个字符作为上下文，超长时加省略号
pub fn context_excerpt(request: &GenerationRequest) -> Option<String> {
    let first = request.messages.first()?.content.trim();
    if first.is_empty() {
        return None;
    }
    if first.chars().count() > CONTEXT_EXCERPT_CHARS {
        Some(first.chars().take(CONTEXT_EXCERPT_CHARS).collect::<String>() + "...")
    } else {
        Some(first.to_string())
    }
}

/// 请求增强服务
///
/// 纯转换，无副作用，不会失败。
#[derive(Debug, Clone)]
pub struct RequestEnricher {
    min_words_per_section: u64,
}

impl RequestEnricher {
    pub fn new(config: &Config) -> Self {
        Self {
            min_words_per_section: config.words_per_section,
        }
    }

    pub fn with_min_words(min_words_per_section: u64) -> Self {
        Self {
            min_words_per_section,
        }
    }

    pub fn enrich(
        &self,
        request: &GenerationRequest,
        project_title: &str,
        citation_style: &str,
    ) -> EnrichedRequest {
        let content_type = classify_content_type(&request.custom_id);
        let excerpt = context_excerpt(request);
        let system = self.build_system_prompt(content_type, project_title, citation_style, excerpt.as_deref());

        let mut messages = request.messages.clone();
        messages.push(Message::user(CLEANUP_INSTRUCTION));

        EnrichedRequest::new(
            request.custom_id.clone(),
            request.model.clone(),
            request.max_tokens.min(PROVIDER_MAX_OUTPUT_TOKENS),
            GENERATION_TEMPERATURE,
            system,
            messages,
        )
    }

    /// 构建学术写作系统提示词
    pub fn build_system_prompt(
        &self,
        content_type: ContentType,
        project_title: &str,
        citation_style: &str,
        context: Option<&str>,
    ) -> String {
        let context_block = match context {
            Some(excerpt) => format!("\n\nSECTION CONTEXT:\n{excerpt}"),
            None => String::new(),
        };

        format!(
            r#"You are an expert academic writer producing publication-quality scholarly work for the project "{title}".

SECTION TYPE: {kind}
{guidance}

REQUIREMENTS:
- Write at least {min_words} words of substantive, original academic prose for this section.
- Use formal scholarly register and cite sources in {style} style.
- Format as continuous prose paragraphs. Markdown headings (#, ##, ###) are allowed to organise the section; avoid bullet points and numbered lists.
- Deliver the complete section in one response.

STRICT OUTPUT HYGIENE:
- Output only the section content itself.
- Never add meta-commentary about the writing, the task or your process.
- Never ask whether to continue, and never offer to write more.
- Never include bracketed editorial notes such as [Note: ...] or [This section represents ...].
- Never include disclaimers, word counts or remarks about length or completeness.{context}"#,
            title = project_title,
            kind = content_type.as_str(),
            guidance = content_type.guidance(),
            min_words = self.min_words_per_section,
            style = citation_style,
            context = context_block,
        )
    }
}
