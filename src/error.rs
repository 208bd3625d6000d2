use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    /// 上游 API 调用错误
    #[error("Provider error: {0}")]
    Api(#[from] ApiError),
    /// 任务登记 / 请求集错误
    #[error("Job error: {0}")]
    Job(#[from] JobError),
    /// 内部正则编译失败
    #[error("Invalid internal pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 未配置 API 密钥
    #[error("no provider credential is configured (set {var_name})")]
    MissingCredential { var_name: String },
    /// 密钥格式不符合上游文档
    #[error("provider credential does not match the expected format ({expected})")]
    InvalidCredentialFormat { expected: String },
    /// 配置值不合法
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// 上游 API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// HTTP 401
    #[error("provider rejected the credential (401): {message}")]
    UpstreamAuthFailure { message: String },
    /// HTTP 429
    #[error("provider rate limit reached (429): {message}")]
    UpstreamRateLimited { message: String },
    /// HTTP 400
    #[error("provider rejected the request (400): {message}")]
    UpstreamBadRequest { message: String },
    /// 其他非 2xx 状态
    #[error("provider returned HTTP {status}: {body}")]
    UpstreamUnknown { status: u16, body: String },
    /// 网络层失败
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 响应体无法解析
    #[error("malformed response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

impl ApiError {
    /// 按 HTTP 状态码归类非 2xx 响应
    pub fn from_status(status: u16, body: String) -> Self {
        let message = extract_error_message(&body).unwrap_or_else(|| body.clone());
        match status {
            401 => ApiError::UpstreamAuthFailure { message },
            429 => ApiError::UpstreamRateLimited { message },
            400 => ApiError::UpstreamBadRequest { message },
            _ => ApiError::UpstreamUnknown { status, body },
        }
    }
}

/// 上游错误体通常是 `{"type":"error","error":{"type":..,"message":..}}`
fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .get("error")
        .and_then(|e| e.get("message"))
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

/// 任务错误
#[derive(Debug, Error)]
pub enum JobError {
    #[error("job {0} was not found")]
    JobNotFound(String),
    #[error("job {0} is already registered")]
    DuplicateJob(String),
    #[error("a job needs at least one request")]
    EmptyRequestSet,
    #[error("request identifier {0} appears more than once")]
    DuplicateRequestId(String),
}

/// 单条结果的失败原因
///
/// 不会中断整个任务，只会变成一条 `Error:` 开头的 NormalizedResult。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ItemError {
    #[error("{0}")]
    ResultParse(String),
    #[error("Generated content was too short after cleanup ({length} characters). Original excerpt: {excerpt}")]
    Sanitization { length: usize, excerpt: String },
    #[error("No content was generated for this section.")]
    EmptyContent,
    #[error("No text content found in successful response")]
    NoTextContent,
    #[error("Request was canceled before it completed")]
    Canceled,
    #[error("Request expired before it could be processed")]
    Expired,
    #[error("No result was returned for this request")]
    MissingResult,
    #[error("{0}")]
    Upstream(String),
}

impl AppError {
    /// 调用方可以稍后重试的错误
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Api(ApiError::UpstreamRateLimited { .. })
                | AppError::Api(ApiError::Transport { .. })
        )
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, AppError::Api(ApiError::UpstreamAuthFailure { .. }))
    }

    /// 是否允许 Auto 模式降级到逐条执行
    pub fn allows_fallback(&self) -> bool {
        matches!(
            self,
            AppError::Api(ApiError::UpstreamUnknown { .. })
                | AppError::Api(ApiError::Transport { .. })
        )
    }
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
