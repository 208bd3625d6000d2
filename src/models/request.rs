use serde::{Deserialize, Serialize};

/// 消息角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// 调用方提交的单个章节生成请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// 任务内唯一的请求标识
    pub custom_id: String,
    pub messages: Vec<Message>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(default)]
    pub system: String,
}

impl GenerationRequest {
    /// 以单条用户消息创建请求
    pub fn new(
        custom_id: impl Into<String>,
        prompt: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        Self {
            custom_id: custom_id.into(),
            messages: vec![Message::user(prompt)],
            model: model.into(),
            max_tokens,
            temperature: 1.0,
            system: String::new(),
        }
    }
}

/// 调用方提供的项目元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectMetadata {
    pub project_title: String,
    pub citation_style: String,
    pub project_type: String,
}

/// 经过增强的请求
///
/// 只能由 `RequestEnricher` 构建，构建后不可修改。
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRequest {
    custom_id: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    system: String,
    messages: Vec<Message>,
}

impl EnrichedRequest {
    pub(crate) fn new(
        custom_id: String,
        model: String,
        max_tokens: u32,
        temperature: f32,
        system: String,
        messages: Vec<Message>,
    ) -> Self {
        Self {
            custom_id,
            model,
            max_tokens,
            temperature,
            system,
            messages,
        }
    }

    pub fn custom_id(&self) -> &str {
        &self.custom_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_tokens(&self) -> u32 {
        self.max_tokens
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn system(&self) -> &str {
        &self.system
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// 上游 `params` 字段
    pub fn params(&self) -> MessageParams<'_> {
        MessageParams {
            model: &self.model,
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            system: &self.system,
            messages: &self.messages,
        }
    }

    /// 批量提交中的一项 `{custom_id, params}`
    pub fn batch_item(&self) -> BatchRequestItem<'_> {
        BatchRequestItem {
            custom_id: &self.custom_id,
            params: self.params(),
        }
    }
}

/// 单条补全接口的请求体
#[derive(Debug, Serialize)]
pub struct MessageParams<'a> {
    pub model: &'a str,
    pub max_tokens: u32,
    pub temperature: f32,
    pub system: &'a str,
    pub messages: &'a [Message],
}

#[derive(Debug, Serialize)]
pub struct BatchRequestItem<'a> {
    pub custom_id: &'a str,
    pub params: MessageParams<'a>,
}
