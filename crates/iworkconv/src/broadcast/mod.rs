//! Broadcasting modules for real-time job progress streaming.
//!
//! One channel per job, fan-out to every attached subscriber, no replay of
//! events published before a subscriber attached.

pub mod job_store;
pub mod progress;

pub use job_store::{Job, JobStore};
pub use progress::{ProgressBus, ProgressEvent, ProgressSubscription, Stage};
