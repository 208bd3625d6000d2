//! 业务能力层
//!
//! 每个服务只负责一件事，不发起网络调用：
//! 请求增强、内容清洗、结果规范化、统计汇总、任务登记。

pub mod content_sanitizer;
pub mod job_registry;
pub mod request_enricher;
pub mod result_normalizer;
pub mod stats_aggregator;

pub use content_sanitizer::ContentSanitizer;
pub use job_registry::{InMemoryJobStore, JobRegistry, JobStore};
pub use request_enricher::{classify_content_type, ContentType, RequestEnricher};
pub use result_normalizer::{normalize, normalize_message, parse_results_jsonl, reconcile};
pub use stats_aggregator::aggregate;
