//! The conversion orchestrator: accepts uploads, admits and runs jobs, and
//! serves the resulting artifacts.

use std::sync::Arc;

use uuid::Uuid;

use crate::broadcast::{Job, JobStore, ProgressBus, ProgressEvent, ProgressSubscription, Stage};
use crate::bundle;
use crate::config::Config;
use crate::error::{ConvertError, ConverterError, Result, StorageError, SubmitError};
use crate::gc;
use crate::mappings::{self, SourceKind, TargetFormat};
use crate::pipeline::converter::Converter;
use crate::queue::TaskQueue;
use crate::rate_limit::RateLimiter;
use crate::storage::{self, StorageAdapter, StoredBlob, StoredFile};
use crate::synth;

/// Central handle tying together storage, the work queue, the progress bus,
/// admission control and the optional conversion engine. Clone-cheap; all
/// clones share state.
#[derive(Clone)]
pub struct Orchestrator {
    storage: Arc<dyn StorageAdapter>,
    queue: TaskQueue,
    bus: ProgressBus,
    limiter: Arc<RateLimiter>,
    jobs: Arc<JobStore>,
    converter: Option<Arc<dyn Converter>>,
    config: Arc<Config>,
}

impl Orchestrator {
    /// Builds an orchestrator over an already-constructed storage backend.
    /// Spawns the queue workers; the garbage collector is started separately
    /// via [`Orchestrator::start_gc`].
    pub fn new(config: Config, storage: Arc<dyn StorageAdapter>) -> Self {
        Self {
            queue: TaskQueue::new(config.concurrency),
            bus: ProgressBus::new(config.channel_grace),
            limiter: Arc::new(RateLimiter::new()),
            jobs: Arc::new(JobStore::new()),
            converter: None,
            storage,
            config: Arc::new(config),
        }
    }

    /// Builds the storage backend named by the config, then the orchestrator.
    pub async fn from_config(config: Config) -> Result<Self> {
        let storage = storage::from_config(&config).await?;
        Ok(Self::new(config, storage))
    }

    /// Wires up a real conversion engine. Without one, every job falls back
    /// to placeholder synthesis.
    pub fn with_converter(mut self, converter: Arc<dyn Converter>) -> Self {
        self.converter = Some(converter);
        self
    }

    /// Starts the background sweep deleting blobs older than the configured
    /// retention.
    pub fn start_gc(&self) {
        gc::spawn(
            Arc::clone(&self.storage),
            self.config.auto_delete,
            self.config.gc_interval,
        );
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Accepts an upload into storage. Rejects when the client is over its
    /// hourly budget or the payload exceeds the configured maximum.
    pub async fn upload(
        &self,
        client_key: &str,
        file_name: &str,
        data: &[u8],
    ) -> Result<StoredFile> {
        if !self.limiter.allow(client_key, self.config.rate_limit_per_hour) {
            return Err(SubmitError::RateLimited.into());
        }
        if data.len() > self.config.upload_max_bytes {
            return Err(SubmitError::PayloadTooLarge {
                size: data.len(),
                max: self.config.upload_max_bytes,
            }
            .into());
        }

        let meta = self.storage.save(file_name, data).await?;
        tracing::info!(
            id = %meta.id,
            name = %meta.name,
            size = %mappings::format_bytes(meta.size),
            "Upload stored"
        );
        Ok(meta)
    }

    /// Admits a conversion job for an already-uploaded file. On success the
    /// job is queued, its record exists, and its progress channel is live;
    /// all further outcomes arrive as progress events.
    pub async fn submit(&self, client_key: &str, file_id: &str, target_ext: &str) -> Result<Job> {
        if !self.limiter.allow(client_key, self.config.rate_limit_per_hour) {
            return Err(SubmitError::RateLimited.into());
        }

        let target = TargetFormat::from_ext(target_ext)
            .ok_or_else(|| SubmitError::InvalidTarget(target_ext.to_string()))?;

        let source = self
            .storage
            .load(file_id)
            .await
            .map_err(SubmitError::Storage)?
            .ok_or_else(|| SubmitError::SourceNotFound(file_id.to_string()))?;

        let kind = SourceKind::from_file_name(&source.meta.name);
        if !kind.is_valid_mapping(target) {
            return Err(SubmitError::UnsupportedMapping {
                kind: kind.to_string(),
                target: target.to_string(),
            }
            .into());
        }

        let job_id = Uuid::new_v4().to_string();
        let job = Job::new(&job_id, file_id, &source.meta.name, kind, target);
        self.jobs.insert(job.clone());

        // Channel must exist before the task can race a subscriber to it.
        self.bus.channel(&job_id);
        self.emit(&job_id, ProgressEvent::stage(Stage::Queued, 0));

        let worker = self.clone();
        let task_job_id = job_id.clone();
        self.queue.enqueue(async move {
            worker.run_job(&task_job_id, source).await;
        });

        tracing::info!(job_id = %job_id, kind = %kind, target = %target, "Job queued");
        Ok(job)
    }

    /// Attaches a progress subscriber to a job's channel.
    pub fn subscribe(&self, job_id: &str) -> ProgressSubscription {
        self.bus.subscribe(job_id)
    }

    /// Point-in-time snapshot of a job's record.
    pub fn job(&self, job_id: &str) -> Option<Job> {
        self.jobs.get(job_id)
    }

    /// Loads a stored artifact along with the MIME type its name implies.
    pub async fn fetch(&self, id: &str) -> Result<(StoredBlob, &'static str)> {
        let blob = self
            .storage
            .load(id)
            .await?
            .ok_or_else(|| StorageError::NotFound(id.to_string()))?;
        let mime = mappings::mime_for_name(&blob.meta.name);
        Ok((blob, mime))
    }

    /// Bundles several stored artifacts into one ZIP archive.
    pub async fn fetch_zip(&self, ids: &[String]) -> Result<Vec<u8>> {
        Ok(bundle::zip_blobs(&self.storage, ids).await?)
    }

    fn emit(&self, job_id: &str, event: ProgressEvent) {
        self.jobs.update(job_id, &event);
        self.bus.publish(job_id, event);
    }

    /// Executes one job to its terminal event. Every exit path emits exactly
    /// one of `done` or `failed`.
    async fn run_job(&self, job_id: &str, source: StoredBlob) {
        let Some(job) = self.jobs.get(job_id) else {
            log::error!("Job {} vanished before it could run", job_id);
            return;
        };

        self.emit(job_id, ProgressEvent::stage(Stage::Uploading, 10));

        match self.produce_output(&job, &source).await {
            Ok(output) => {
                self.emit(job_id, ProgressEvent::stage(Stage::Preparing, 90));
                let output_name = mappings::derive_output_name(&job.file_name, job.target);
                match self.storage.save(&output_name, &output).await {
                    Ok(meta) => {
                        tracing::info!(
                            job_id = %job_id,
                            output = %meta.id,
                            size = %mappings::format_bytes(meta.size),
                            "Job finished"
                        );
                        self.emit(job_id, ProgressEvent::done(&meta.id));
                    }
                    Err(e) => {
                        log::error!("Job {} could not store its output: {}", job_id, e);
                        self.emit(job_id, ProgressEvent::failed(&e.to_string()));
                    }
                }
            }
            Err(e) => {
                log::error!("Job {} failed: {}", job_id, e);
                self.emit(job_id, ProgressEvent::failed(&e.to_string()));
            }
        }
    }

    /// Runs the configured engine under its timeout. An engine that errors,
    /// times out, or produces nothing fails the job; only the unconfigured
    /// path falls back to the embedded preview (PDF targets) and then
    /// placeholder synthesis.
    async fn produce_output(
        &self,
        job: &Job,
        source: &StoredBlob,
    ) -> std::result::Result<Vec<u8>, ConverterError> {
        self.emit(&job.job_id, ProgressEvent::stage(Stage::Converting, 25));

        if let Some(converter) = &self.converter {
            let attempt = tokio::time::timeout(
                self.config.converter_timeout,
                converter.convert(&source.data, &job.file_name, job.source_kind, job.target),
            )
            .await;

            match attempt {
                Ok(Ok(output)) if output.is_empty() => {
                    return Err(ConvertError::NoOutput.into());
                }
                Ok(Ok(output)) => {
                    self.emit(&job.job_id, ProgressEvent::stage(Stage::Converting, 65));
                    return Ok(output);
                }
                Ok(Err(ConvertError::Unconfigured)) => {
                    log::debug!("No converter configured, synthesizing output");
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) => {
                    return Err(ConvertError::Timeout(self.config.converter_timeout).into());
                }
            }
        }

        if job.target == TargetFormat::Pdf {
            if let Some(preview) = synth::extract_embedded_pdf(&source.data) {
                tracing::info!(job_id = %job.job_id, "Using embedded preview PDF");
                self.emit(&job.job_id, ProgressEvent::stage(Stage::Converting, 65));
                return Ok(preview);
            }
        }

        self.emit(&job.job_id, ProgressEvent::stage(Stage::Converting, 65));
        Ok(synth::synthesize(&source.data, &job.file_name, job.target))
    }
}
