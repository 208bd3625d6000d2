use serde::{Deserialize, Serialize};

use super::request::GenerationRequest;

/// 项目文件中的单个章节
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionSpec {
    pub custom_id: String,
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// 一个待生成的项目（对应一个 TOML 文件）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub title: String,
    #[serde(default = "default_citation_style")]
    pub citation_style: String,
    #[serde(default = "default_project_type")]
    pub project_type: String,
    pub sections: Vec<SectionSpec>,
    #[serde(skip_serializing, skip_deserializing)]
    pub file_path: Option<String>,
}

fn default_citation_style() -> String {
    "APA".to_string()
}

fn default_project_type() -> String {
    "dissertation".to_string()
}

impl ProjectFile {
    /// 转换为生成请求，未指定 max_tokens 的章节使用默认值
    pub fn to_requests(&self, model: &str, default_max_tokens: u32) -> Vec<GenerationRequest> {
        self.sections
            .iter()
            .map(|section| {
                GenerationRequest::new(
                    section.custom_id.clone(),
                    section.prompt.clone(),
                    model,
                    section.max_tokens.unwrap_or(default_max_tokens),
                )
            })
            .collect()
    }
}
