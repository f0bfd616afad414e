pub mod record;
pub mod store;

pub use record::{GenerationJob, JobError, JobResult, JobStatus};
pub use store::{JobCounts, JobStore};
