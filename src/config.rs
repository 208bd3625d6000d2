use std::str::FromStr;
use std::time::Duration;

use crate::error::{AppResult, ConfigError};

/// 上游文档中的密钥前缀
pub const CREDENTIAL_PREFIX: &str = "sk-ant-";
const CREDENTIAL_MIN_LEN: usize = 20;
const CREDENTIAL_ENV: &str = "ANTHROPIC_API_KEY";

/// 任务执行路径
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    /// 整批提交，轮询结果
    Batch,
    /// 逐条调用单条补全接口
    Sequential,
    /// 优先整批提交，上游不可用时降级为逐条执行
    Auto,
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "batch" => Ok(ExecutionMode::Batch),
            "sequential" => Ok(ExecutionMode::Sequential),
            "auto" => Ok(ExecutionMode::Auto),
            other => Err(format!("unknown execution mode: {other}")),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- 上游配置 ---
    pub provider_api_key: String,
    pub provider_api_base_url: String,
    pub provider_api_version: String,
    pub model_name: String,
    /// 调用方未指定时的输出 token 上限
    pub default_max_tokens: u32,
    // --- 生成配置 ---
    /// 每个章节的目标字数（用于估算 target word count 与系统提示词）
    pub words_per_section: u64,
    pub execution_mode: ExecutionMode,
    /// 逐条执行时两次请求之间的间隔
    pub sequential_pacing_ms: u64,
    // --- 调用方（命令行）配置 ---
    pub poll_interval_secs: u64,
    pub job_deadline_secs: u64,
    pub job_ttl_secs: u64,
    pub max_concurrent_projects: usize,
    /// 项目 TOML 文件存放目录
    pub project_folder: String,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider_api_key: String::new(),
            provider_api_base_url: "https://api.anthropic.com".to_string(),
            provider_api_version: "2023-06-01".to_string(),
            model_name: "claude-3-5-sonnet-20241022".to_string(),
            default_max_tokens: 8192,
            words_per_section: 3000,
            execution_mode: ExecutionMode::Auto,
            sequential_pacing_ms: 1000,
            poll_interval_secs: 30,
            job_deadline_secs: 3600,
            job_ttl_secs: 86_400,
            max_concurrent_projects: 4,
            project_folder: "projects".to_string(),
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            provider_api_key: std::env::var(CREDENTIAL_ENV).unwrap_or(default.provider_api_key),
            provider_api_base_url: std::env::var("PROVIDER_API_BASE_URL").unwrap_or(default.provider_api_base_url),
            provider_api_version: std::env::var("PROVIDER_API_VERSION").unwrap_or(default.provider_api_version),
            model_name: std::env::var("MODEL_NAME").unwrap_or(default.model_name),
            default_max_tokens: std::env::var("DEFAULT_MAX_TOKENS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.default_max_tokens),
            words_per_section: std::env::var("WORDS_PER_SECTION").ok().and_then(|v| v.parse().ok()).unwrap_or(default.words_per_section),
            execution_mode: std::env::var("EXECUTION_MODE").ok().and_then(|v| v.parse().ok()).unwrap_or(default.execution_mode),
            sequential_pacing_ms: std::env::var("SEQUENTIAL_PACING_MS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.sequential_pacing_ms),
            poll_interval_secs: std::env::var("POLL_INTERVAL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.poll_interval_secs),
            job_deadline_secs: std::env::var("JOB_DEADLINE_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.job_deadline_secs),
            job_ttl_secs: std::env::var("JOB_TTL_SECS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.job_ttl_secs),
            max_concurrent_projects: std::env::var("MAX_CONCURRENT_PROJECTS").ok().and_then(|v| v.parse().ok()).unwrap_or(default.max_concurrent_projects),
            project_folder: std::env::var("PROJECT_FOLDER").unwrap_or(default.project_folder),
            verbose_logging: std::env::var("VERBOSE_LOGGING").ok().and_then(|v| v.parse().ok()).unwrap_or(default.verbose_logging),
        }
    }

    /// 校验并返回上游密钥
    ///
    /// 必须在任何网络调用之前执行。
    pub fn provider_credential(&self) -> AppResult<&str> {
        let key = self.provider_api_key.trim();
        if key.is_empty() {
            return Err(ConfigError::MissingCredential {
                var_name: CREDENTIAL_ENV.to_string(),
            }
            .into());
        }
        let well_formed = key.starts_with(CREDENTIAL_PREFIX)
            && key.len() >= CREDENTIAL_MIN_LEN
            && !key.chars().any(char::is_whitespace);
        if !well_formed {
            return Err(ConfigError::InvalidCredentialFormat {
                expected: format!("{CREDENTIAL_PREFIX}… with at least {CREDENTIAL_MIN_LEN} characters"),
            }
            .into());
        }
        Ok(key)
    }

    /// 检查不可能成立的配置值
    pub fn validate(&self) -> AppResult<()> {
        if self.words_per_section == 0 {
            return Err(invalid("words_per_section", "must be greater than zero"));
        }
        if self.max_concurrent_projects == 0 {
            return Err(invalid("max_concurrent_projects", "must be greater than zero"));
        }
        if self.default_max_tokens == 0 {
            return Err(invalid("default_max_tokens", "must be greater than zero"));
        }
        Ok(())
    }

    pub fn sequential_pacing(&self) -> Duration {
        Duration::from_millis(self.sequential_pacing_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn job_deadline(&self) -> Duration {
        Duration::from_secs(self.job_deadline_secs)
    }
}

fn invalid(field: &str, reason: &str) -> crate::error::AppError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
    .into()
}
