//! Real-time event streaming for job progress.

pub mod job_events;

pub use job_events::{JobEvent, JobEventBroadcaster};
