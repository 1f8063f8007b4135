pub mod broadcast;
pub mod bundle;
pub mod config;
pub mod error;
pub mod gc;
pub mod mappings;
pub mod pipeline;
pub mod queue;
pub mod rate_limit;
pub mod storage;
pub mod synth;

pub use broadcast::{Job, JobStore, ProgressBus, ProgressEvent, ProgressSubscription, Stage};
pub use config::{Config, StorageDriver};
pub use error::{ConvertError, ConverterError, Result, StorageError, SubmitError};
pub use mappings::{SourceKind, TargetFormat};
pub use pipeline::{Converter, Orchestrator, UnconfiguredConverter};
pub use queue::TaskQueue;
pub use rate_limit::RateLimiter;
pub use storage::{StorageAdapter, StoredBlob, StoredFile};
