//! Command handlers.

use anyhow::{anyhow, Context, Result};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;

use mailcarve_ai::AiServiceClient;
use mailcarve_core::job::QueueItem;
use mailcarve_core::links::{InMemoryBrandLinkStore, InMemoryBrandProvider};
use mailcarve_core::store::{InMemoryEarlyResultStore, InMemoryJobStore, JobStore};
use mailcarve_image::HttpImageFetcher;
use mailcarve_pipeline::{Collaborators, PipelineController};

use crate::config::AppConfig;

/// Everything `process` needs to describe the incoming design.
pub struct ProcessArgs {
    pub image_url: String,
    pub width: u32,
    pub height: u32,
    pub brand: Option<String>,
    pub subject: Option<String>,
    pub preview: Option<String>,
    pub tracked_subject: Option<String>,
    pub tracked_preview: Option<String>,
    pub watch: bool,
}

/// Enqueue one job and run the pipeline on it, printing the finished
/// record as JSON.
pub async fn process(config: &AppConfig, args: ProcessArgs) -> Result<()> {
    let client = Arc::new(
        AiServiceClient::with_timeout(
            &config.service.endpoint,
            Duration::from_secs(config.service.timeout_secs),
        )
        .map_err(|e| anyhow!("building AI service client: {}", e))?,
    );
    debug!(endpoint = client.endpoint(), "AI service client ready");

    let jobs = Arc::new(InMemoryJobStore::new());
    let controller = PipelineController::new(
        jobs.clone(),
        Arc::new(InMemoryEarlyResultStore::new()),
        Arc::new(InMemoryBrandProvider::new()),
        Arc::new(InMemoryBrandLinkStore::new()),
        Arc::new(HttpImageFetcher::new()),
        Collaborators {
            segmenter: client.clone(),
            annotator: client.clone(),
            link_resolver: client.clone(),
            copy_generator: client.clone(),
            spelling_checker: client,
        },
        config.image_views(),
        config.pipeline_config(),
    );

    let mut item = QueueItem::new(format!("job-{}", Uuid::new_v4()), args.image_url)
        .with_dimensions(args.width, args.height);
    if let Some(brand) = args.brand {
        item = item.with_brand(brand);
    }
    item.provided_subject_line = args.subject;
    item.provided_preview_text = args.preview;
    item.tracked_subject_line = args.tracked_subject;
    item.tracked_preview_text = args.tracked_preview;

    let job_id = controller
        .enqueue(item)
        .await
        .map_err(|e| anyhow!("enqueue failed: {}", e))?;

    let watcher = args.watch.then(|| {
        let jobs = jobs.clone();
        let job_id = job_id.clone();
        tokio::spawn(async move { watch_progress(jobs, job_id).await })
    });

    let outcome = controller.process(&job_id).await;

    if let Some(watcher) = watcher {
        let _ = watcher.await;
    }

    let job = jobs
        .get(&job_id)
        .await
        .map_err(|e| anyhow!("reading job record: {}", e))?
        .ok_or_else(|| anyhow!("job record vanished: {}", job_id))?;

    match outcome {
        Ok(outcome) => {
            eprintln!(
                "job {} ready for review in {} ms",
                outcome.job_id, outcome.processing_time_ms
            );
            print_record(&job)?;
            Ok(())
        }
        Err(e) => {
            print_record(&job)?;
            Err(anyhow!("pipeline failed: {}", e))
        }
    }
}

/// Print progress checkpoints until the job reaches a terminal status.
async fn watch_progress(jobs: Arc<InMemoryJobStore>, job_id: String) {
    let mut last_percent = 0u8;
    loop {
        tokio::time::sleep(Duration::from_millis(250)).await;
        let Ok(Some(job)) = jobs.get(&job_id).await else {
            continue;
        };
        if job.processing_percent != last_percent {
            last_percent = job.processing_percent;
            eprintln!("[{:>3}%] {}", job.processing_percent, job.processing_step);
        }
        if job.status.is_terminal() {
            break;
        }
    }
}

fn print_record(job: &QueueItem) -> Result<()> {
    let summary = json!({
        "id": job.id,
        "status": job.status.to_string(),
        "processing_step": job.processing_step,
        "processing_percent": job.processing_percent,
        "image": {
            "url": job.image_url,
            "width": job.image_width,
            "height": job.image_height,
        },
        "slices": job.slices,
        "footer_start_percent": job.footer_start_percent,
        "selected_subject_line": job.selected_subject_line,
        "selected_preview_text": job.selected_preview_text,
        "generated_subject_lines": job.generated_subject_lines,
        "generated_preview_texts": job.generated_preview_texts,
        "copy_source": job.copy_source,
        "qa_flags": job.qa_flags,
        "spelling_errors": job.spelling_errors,
        "error_message": job.error_message,
    });
    println!(
        "{}",
        serde_json::to_string_pretty(&summary).context("serializing job record")?
    );
    Ok(())
}
