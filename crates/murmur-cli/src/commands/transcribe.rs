use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use murmur_core::{
    InMemoryQueue, JobQueue, JobRequest, JobStatus, LocalBlobStore, MemoryJobStore, Pipeline,
    PipelineConfig, TranscriptDocument, WorkerPool,
};

/// Transcribe one local file end-to-end with an inline worker.
pub async fn run(
    file: PathBuf,
    provider: String,
    language: String,
    prompt: Option<String>,
    output: Option<PathBuf>,
    workdir: Option<PathBuf>,
) -> Result<()> {
    if !file.is_file() {
        bail!("input file not found: {}", file.display());
    }

    let config = PipelineConfig::from_env()?;

    // Blob tree lives in --workdir when given, otherwise a temp dir that is
    // removed on exit.
    let _tempdir;
    let blob_root = match workdir {
        Some(dir) => {
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("cannot create workdir {}", dir.display()))?;
            dir
        }
        None => {
            let tempdir = tempfile::tempdir().context("cannot create temp dir")?;
            let root = tempdir.path().to_path_buf();
            _tempdir = tempdir;
            root
        }
    };

    let store = Arc::new(MemoryJobStore::new());
    let blobs = Arc::new(LocalBlobStore::new(blob_root));
    let pipeline = Arc::new(Pipeline::new(store.clone(), blobs.clone(), config)?);
    let queue = Arc::new(InMemoryQueue::new());

    let job = pipeline
        .submit(
            &file,
            JobRequest {
                provider,
                language,
                prompt,
                webhook_url: None,
            },
        )
        .await?;
    queue.push(job.id).await?;
    queue.close();

    WorkerPool::new(pipeline.clone(), queue).run(1).await?;

    let finished = murmur_core::JobStore::get_job(store.as_ref(), job.id)
        .await?
        .context("job disappeared from the store")?;
    match finished.status {
        JobStatus::Completed => {}
        JobStatus::Failed => {
            let code = finished
                .error_code
                .map(|c| c.as_str())
                .unwrap_or("unknown");
            bail!(
                "transcription failed ({code}): {}",
                finished.error_message.unwrap_or_default()
            );
        }
        other => bail!("job ended in unexpected status {}", other.as_str()),
    }

    let result_key = finished.result_key.context("completed job has no result")?;
    let payload = murmur_core::BlobStore::get(blobs.as_ref(), &result_key).await?;

    match output {
        Some(path) => {
            std::fs::write(&path, &payload)
                .with_context(|| format!("cannot write {}", path.display()))?;
            eprintln!("Transcript written to {}", path.display());
        }
        None => {
            let document: TranscriptDocument =
                serde_json::from_slice(&payload).context("malformed transcript document")?;
            println!("{}", document.transcript.text);
        }
    }
    Ok(())
}
