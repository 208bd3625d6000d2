pub mod job;
pub mod loaders;
pub mod project;
pub mod provider;
pub mod request;
pub mod result;

pub use job::{
    CanonicalStatus, ExecutionPath, Job, JobRecord, JobState, JobStatusView, SubmitReceipt,
    UpstreamStatus,
};
pub use loaders::{load_all_project_files, load_project_file};
pub use project::{ProjectFile, SectionSpec};
pub use provider::{
    BatchHandle, BatchSnapshot, ContentBlock, ErrorPayload, MessagePayload, RequestCounts, Usage,
};
pub use request::{EnrichedRequest, GenerationRequest, Message, ProjectMetadata, Role};
pub use result::{count_words, BatchStats, NormalizedResult, ResultStatus};
