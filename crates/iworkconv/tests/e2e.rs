//! End-to-end tests driving the full pipeline: upload, submit, stream
//! progress, download the artifact.

use std::io::{Cursor, Read, Write};
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;
use zip::write::SimpleFileOptions;

use iworkconv::{
    gc, Config, ConverterError, Orchestrator, ProgressEvent, Stage, StorageAdapter, SubmitError,
};
use iworkconv::storage::{DiskStorage, MemoryStorage};

/// One conversion scenario run through the whole pipeline.
struct Scenario {
    name: &'static str,
    input_file: &'static str,
    target: &'static str,
    expected_output_name: &'static str,
    expected_mime: &'static str,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "pages_to_pdf",
        input_file: "report.pages",
        target: "pdf",
        expected_output_name: "report.pdf",
        expected_mime: "application/pdf",
    },
    Scenario {
        name: "pages_to_docx",
        input_file: "report.pages",
        target: "docx",
        expected_output_name: "report.docx",
        expected_mime: "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    },
    Scenario {
        name: "numbers_to_csv",
        input_file: "budget.numbers",
        target: "csv",
        expected_output_name: "budget.csv",
        expected_mime: "text/csv",
    },
    Scenario {
        name: "keynote_to_pptx",
        input_file: "pitch.key",
        target: "pptx",
        expected_output_name: "pitch.pptx",
        expected_mime: "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    },
];

/// Captures pipeline tracing in test output; safe to call from every test.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

fn orchestrator() -> Orchestrator {
    init_tracing();
    let config = Config {
        channel_grace: Duration::from_millis(50),
        ..Config::default()
    };
    Orchestrator::new(config, Arc::new(MemoryStorage::new()))
}

async fn run_to_done(orch: &Orchestrator, job_id: &str) -> ProgressEvent {
    let mut sub = orch.subscribe(job_id);
    let mut last = None;
    while let Some(event) = sub.recv().await {
        last = Some(event);
    }
    let last = last.expect("job published no events");
    assert!(last.stage.is_terminal());
    last
}

#[tokio::test]
async fn test_every_supported_mapping_end_to_end() {
    let orch = orchestrator();

    for scenario in SCENARIOS {
        let meta = orch
            .upload("client", scenario.input_file, b"iwork document bytes")
            .await
            .unwrap();
        let job = orch.submit("client", &meta.id, scenario.target).await.unwrap();

        let done = run_to_done(&orch, &job.job_id).await;
        assert_eq!(done.stage, Stage::Done, "scenario {}", scenario.name);

        let (blob, mime) = orch.fetch(done.download_id.as_deref().unwrap()).await.unwrap();
        assert_eq!(blob.meta.name, scenario.expected_output_name);
        assert_eq!(mime, scenario.expected_mime);
        assert!(!blob.data.is_empty());
    }
}

#[tokio::test]
async fn test_pdf_output_opens_in_a_reader() {
    let orch = orchestrator();
    let meta = orch.upload("client", "report.pages", b"bytes").await.unwrap();
    let job = orch.submit("client", &meta.id, "pdf").await.unwrap();

    let done = run_to_done(&orch, &job.job_id).await;
    let (blob, _) = orch.fetch(done.download_id.as_deref().unwrap()).await.unwrap();

    let doc = lopdf::Document::load_mem(&blob.data).unwrap();
    assert_eq!(doc.get_pages().len(), 1);
}

#[tokio::test]
async fn test_embedded_preview_is_served_for_real_containers() {
    // A realistic iWork container: ZIP with the document payload and a
    // QuickLook preview.
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    writer
        .start_file("Index/Document.iwa", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"protobuf-ish payload").unwrap();
    writer
        .start_file("QuickLook/Preview.pdf", SimpleFileOptions::default())
        .unwrap();
    writer.write_all(b"%PDF-1.7 the real preview").unwrap();
    let container = writer.finish().unwrap().into_inner();

    let orch = orchestrator();
    let meta = orch.upload("client", "report.pages", &container).await.unwrap();
    let job = orch.submit("client", &meta.id, "pdf").await.unwrap();

    let done = run_to_done(&orch, &job.job_id).await;
    let (blob, _) = orch.fetch(done.download_id.as_deref().unwrap()).await.unwrap();
    assert_eq!(blob.data, b"%PDF-1.7 the real preview");
}

#[tokio::test]
async fn test_progress_events_serialize_for_the_wire() {
    let orch = orchestrator();
    let meta = orch.upload("client", "report.pages", b"bytes").await.unwrap();
    let job = orch.submit("client", &meta.id, "pdf").await.unwrap();

    let mut sub = orch.subscribe(&job.job_id);
    let mut frames = Vec::new();
    while let Some(event) = sub.recv().await {
        frames.push(serde_json::to_string(&event).unwrap());
    }

    for frame in &frames {
        let value: serde_json::Value = serde_json::from_str(frame).unwrap();
        assert!(value.get("stage").is_some());
        // Wire casing is camelCase; the snake_case spelling must not leak
        assert!(value.get("download_id").is_none());
    }
    assert!(frames.last().unwrap().contains(r#""stage":"done""#));
    assert!(frames.last().unwrap().contains("downloadId"));
}

#[tokio::test]
async fn test_disk_backend_survives_process_restart() {
    init_tracing();
    let dir = TempDir::new().unwrap();
    let config = Config {
        channel_grace: Duration::from_millis(50),
        ..Config::default()
    };

    let download_id = {
        let orch = Orchestrator::new(config.clone(), Arc::new(DiskStorage::new(dir.path())));
        let meta = orch.upload("client", "report.pages", b"bytes").await.unwrap();
        let job = orch.submit("client", &meta.id, "pdf").await.unwrap();
        run_to_done(&orch, &job.job_id).await.download_id.unwrap()
    };

    // A fresh orchestrator over the same directory still serves the artifact
    let orch = Orchestrator::new(config, Arc::new(DiskStorage::new(dir.path())));
    let (blob, mime) = orch.fetch(&download_id).await.unwrap();
    assert_eq!(blob.meta.name, "report.pdf");
    assert_eq!(mime, "application/pdf");
}

#[tokio::test]
async fn test_bundle_download_of_multiple_artifacts() {
    let orch = orchestrator();
    let mut ids = Vec::new();

    for scenario in &SCENARIOS[..2] {
        let meta = orch
            .upload("client", scenario.input_file, b"bytes")
            .await
            .unwrap();
        let job = orch.submit("client", &meta.id, scenario.target).await.unwrap();
        ids.push(run_to_done(&orch, &job.job_id).await.download_id.unwrap());
    }

    let bytes = orch.fetch_zip(&ids).await.unwrap();
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    assert_eq!(archive.len(), 2);

    let mut first = String::new();
    let name = archive.by_index(0).unwrap().name().to_string();
    assert_eq!(name, "report.pdf");
    archive
        .by_name("report.pdf")
        .unwrap()
        .read_to_string(&mut first)
        .unwrap_or_default();
}

#[tokio::test]
async fn test_retention_sweep_removes_finished_artifacts() {
    init_tracing();
    let storage: Arc<dyn StorageAdapter> = Arc::new(MemoryStorage::new());
    let config = Config {
        channel_grace: Duration::from_millis(50),
        ..Config::default()
    };
    let orch = Orchestrator::new(config, Arc::clone(&storage));

    let meta = orch.upload("client", "report.pages", b"bytes").await.unwrap();
    let job = orch.submit("client", &meta.id, "pdf").await.unwrap();
    let done = run_to_done(&orch, &job.job_id).await;
    let download_id = done.download_id.unwrap();

    let ttl = Duration::from_secs(30 * 60);
    let later = chrono::Utc::now() + chrono::Duration::hours(1);
    let deleted = gc::sweep(&storage, ttl, later).await;
    assert!(deleted >= 2); // source and artifact

    let err = orch.fetch(&download_id).await.unwrap_err();
    assert!(matches!(err, ConverterError::Storage(_)));
}

#[tokio::test]
async fn test_rejections_never_create_jobs() {
    let orch = orchestrator();
    let meta = orch.upload("client", "pitch.key", b"bytes").await.unwrap();

    for target in ["xlsx", "csv", "rtf", "docx"] {
        let err = orch.submit("client", &meta.id, target).await.unwrap_err();
        assert!(matches!(
            err,
            ConverterError::Submit(SubmitError::UnsupportedMapping { .. })
        ));
    }
    let err = orch.submit("client", &meta.id, "wasm").await.unwrap_err();
    assert!(matches!(
        err,
        ConverterError::Submit(SubmitError::InvalidTarget(_))
    ));
}
