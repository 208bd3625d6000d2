/// 上游生成 API 客户端
///
/// 封装批量提交、状态查询、结果下载与单条补全四个接口。
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, ConfigError};
use crate::models::{BatchHandle, BatchSnapshot, EnrichedRequest, MessagePayload};

/// 上游 API 能力
///
/// 编排层只依赖这个 trait，测试时可以替换成脚本化的实现。
#[async_trait]
pub trait ProviderApi: Send + Sync {
    /// 将全部请求作为一个批量任务提交
    async fn create_batch(&self, requests: &[EnrichedRequest]) -> AppResult<BatchHandle>;

    /// 查询批量任务状态
    async fn get_batch(&self, batch_id: &str) -> AppResult<BatchSnapshot>;

    /// 下载 JSONL 结果文件
    async fn fetch_results(&self, results_url: &str) -> AppResult<String>;

    /// 单条补全
    async fn create_message(&self, request: &EnrichedRequest) -> AppResult<MessagePayload>;
}

/// 基于 reqwest 的实现
pub struct HttpProviderClient {
    http: Client,
    base_url: String,
}

impl HttpProviderClient {
    /// 创建客户端；密钥缺失或格式错误时立即失败，不发出任何请求
    pub fn new(config: &Config) -> AppResult<Self> {
        let api_key = config.provider_credential()?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("x-api-key", header_value("provider_api_key", api_key)?);
        headers.insert(
            "anthropic-version",
            header_value("provider_api_version", &config.provider_api_version)?,
        );

        let http = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|source| ApiError::Transport {
                endpoint: "client builder".to_string(),
                source,
            })?;

        Ok(Self {
            http,
            base_url: config.provider_api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// 非 2xx 响应按状态码归类
    async fn check(endpoint: &str, response: Response) -> AppResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        warn!("上游返回错误 {} ({}): {}", status.as_u16(), endpoint, body);
        Err(ApiError::from_status(status.as_u16(), body).into())
    }

    async fn read_json<T: DeserializeOwned>(endpoint: &str, response: Response) -> AppResult<T> {
        let response = Self::check(endpoint, response).await?;
        let body = response.text().await.map_err(|source| transport(endpoint, source))?;
        serde_json::from_str(&body).map_err(|e| {
            ApiError::MalformedResponse {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }
}

fn header_value(field: &str, value: &str) -> AppResult<HeaderValue> {
    HeaderValue::from_str(value).map_err(|e| {
        AppError::from(ConfigError::InvalidValue {
            field: field.to_string(),
            reason: e.to_string(),
        })
    })
}

fn transport(endpoint: &str, source: reqwest::Error) -> AppError {
    ApiError::Transport {
        endpoint: endpoint.to_string(),
        source,
    }
    .into()
}

#[async_trait]
impl ProviderApi for HttpProviderClient {
    async fn create_batch(&self, requests: &[EnrichedRequest]) -> AppResult<BatchHandle> {
        let endpoint = self.endpoint("/v1/messages/batches");
        let items: Vec<_> = requests.iter().map(EnrichedRequest::batch_item).collect();
        debug!("提交批量任务: {} 个请求", items.len());

        let response = self
            .http
            .post(&endpoint)
            .json(&json!({ "requests": items }))
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        Self::read_json(&endpoint, response).await
    }

    async fn get_batch(&self, batch_id: &str) -> AppResult<BatchSnapshot> {
        let endpoint = self.endpoint(&format!("/v1/messages/batches/{batch_id}"));
        let response = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        Self::read_json(&endpoint, response).await
    }

    async fn fetch_results(&self, results_url: &str) -> AppResult<String> {
        let response = self
            .http
            .get(results_url)
            .send()
            .await
            .map_err(|e| transport(results_url, e))?;

        let response = Self::check(results_url, response).await?;
        response.text().await.map_err(|e| transport(results_url, e))
    }

    async fn create_message(&self, request: &EnrichedRequest) -> AppResult<MessagePayload> {
        let endpoint = self.endpoint("/v1/messages");
        debug!("单条补全: {}", request.custom_id());

        let response = self
            .http
            .post(&endpoint)
            .json(&request.params())
            .send()
            .await
            .map_err(|e| transport(&endpoint, e))?;

        Self::read_json(&endpoint, response).await
    }
}
