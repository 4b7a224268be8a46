//! Pipeline orchestration.
//!
//! `PipelineController` owns the full run for one job: claim, image
//! resolution, segmentation, crop-view generation, link annotation, copy
//! selection, spelling QA, and finalization. Each stage persists a
//! checkpoint before it runs, so an observer polling the job record sees
//! monotonic progress, and a crash leaves behind the last completed stage.

use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use mailcarve_core::collab::{
    CopyGenerator, LinkResolver, Segmenter, SliceAnnotator, SpellingChecker,
};
use mailcarve_core::error::PipelineError;
use mailcarve_core::job::{JobId, JobStatus, JobUpdate, QueueItem};
use mailcarve_core::links::{BrandContext, BrandLinkStore, BrandProvider};
use mailcarve_core::progress::{percent_after, PipelineStep};
use mailcarve_core::store::{EarlyResultStore, JobStore, StoreError};
use mailcarve_image::{ImageFetcher, ImageResolver, ImageViews};

use crate::config::PipelineConfig;
use crate::copy::CopyOrchestrator;
use crate::early::{copy_key, qa_key, EarlyTaskDispatcher};
use crate::links::LinkAnnotator;
use crate::qa::QaOrchestrator;
use crate::slicer::Slicer;

/// The five external AI collaborators, bundled for injection.
pub struct Collaborators {
    pub segmenter: Arc<dyn Segmenter>,
    pub annotator: Arc<dyn SliceAnnotator>,
    pub link_resolver: Arc<dyn LinkResolver>,
    pub copy_generator: Arc<dyn CopyGenerator>,
    pub spelling_checker: Arc<dyn SpellingChecker>,
}

/// Result of one successful `process` invocation.
#[derive(Debug, Clone)]
pub struct ProcessOutcome {
    pub job_id: JobId,
    pub processing_time_ms: u64,
}

pub struct PipelineController {
    jobs: Arc<dyn JobStore>,
    early_results: Arc<dyn EarlyResultStore>,
    brands: Arc<dyn BrandProvider>,
    dispatcher: EarlyTaskDispatcher,
    resolver: ImageResolver,
    slicer: Slicer,
    link_annotator: LinkAnnotator,
    copy: CopyOrchestrator,
    qa: QaOrchestrator,
    views: ImageViews,
    config: PipelineConfig,
}

impl PipelineController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: Arc<dyn JobStore>,
        early_results: Arc<dyn EarlyResultStore>,
        brands: Arc<dyn BrandProvider>,
        link_store: Arc<dyn BrandLinkStore>,
        fetcher: Arc<dyn ImageFetcher>,
        collaborators: Collaborators,
        views: ImageViews,
        config: PipelineConfig,
    ) -> Self {
        let dispatcher = EarlyTaskDispatcher::new(
            early_results.clone(),
            collaborators.copy_generator.clone(),
            collaborators.spelling_checker.clone(),
            config.copy_pair_count,
        );
        let slicer = Slicer::new(
            collaborators.segmenter,
            views.clone(),
            config.max_analyzed_height,
        );
        let link_annotator = LinkAnnotator::new(
            collaborators.annotator,
            collaborators.link_resolver,
            link_store,
            config.verified_confidence,
        );
        let copy = CopyOrchestrator::new(
            early_results.clone(),
            collaborators.copy_generator,
            config.copy_pair_count,
            config.poll_interval,
            config.poll_timeout,
        );
        let qa = QaOrchestrator::new(
            early_results.clone(),
            collaborators.spelling_checker,
            config.poll_interval,
            config.poll_timeout,
        );

        Self {
            jobs,
            early_results,
            brands,
            dispatcher,
            resolver: ImageResolver::new(fetcher),
            slicer,
            link_annotator,
            copy,
            qa,
            views,
            config,
        }
    }

    /// Enqueue a new job. The record starts `queued` at zero percent and is
    /// picked up by a later `process` call.
    pub async fn enqueue(&self, item: QueueItem) -> Result<JobId, PipelineError> {
        let id = item.id.clone();
        self.jobs.insert(item).await?;
        info!(job_id = %id, "job enqueued");
        Ok(id)
    }

    /// Current job record, for status polling.
    pub async fn job(&self, job_id: &str) -> Result<Option<QueueItem>, PipelineError> {
        Ok(self.jobs.get(job_id).await?)
    }

    /// Run the full pipeline for one queued job.
    ///
    /// Exactly one concurrent invocation per id gets past the claim; the
    /// rest return [`PipelineError::NotClaimed`] without touching the
    /// record. Fatal stage errors persist `failed` plus an error message
    /// before surfacing.
    pub async fn process(&self, job_id: &str) -> Result<ProcessOutcome, PipelineError> {
        let started = Instant::now();

        let job = self
            .jobs
            .get(job_id)
            .await?
            .ok_or_else(|| StoreError::NotFound(job_id.to_string()))?;

        if !self.jobs.claim(job_id).await? {
            return Err(PipelineError::NotClaimed(job_id.to_string()));
        }
        info!(job_id, image_url = %job.image_url, "job claimed");

        let brand = self.brand_context(&job).await;

        // Early tasks go out before the image is even fetched; they work
        // from a height-bounded view built on the nominal dimensions.
        let early_view =
            self.views
                .height_bounded(&job.image_url, job.image_height, self.config.max_analyzed_height);
        let session = self.dispatcher.dispatch(&early_view, &brand);

        // Image resolution.
        self.checkpoint(job_id, PipelineStep::FetchingImage).await?;
        let phase = Instant::now();
        let image = match self
            .resolver
            .resolve(&job.image_url, job.image_width, job.image_height)
            .await
        {
            Ok(image) => image,
            Err(e) => {
                return Err(self
                    .fail(job_id, PipelineStep::FetchingImage, e.to_string())
                    .await);
            }
        };
        if image.corrected {
            self.jobs
                .update(
                    job_id,
                    JobUpdate {
                        image_width: Some(image.width),
                        image_height: Some(image.height),
                        ..Default::default()
                    },
                )
                .await?;
        }
        info!(job_id, duration_ms = phase.elapsed().as_millis() as u64, "image resolved");

        // Segmentation.
        self.checkpoint(job_id, PipelineStep::Slicing).await?;
        let phase = Instant::now();
        let campaign = match self.slicer.slice(&image, Some(&brand)).await {
            Ok(campaign) => campaign,
            Err(e) => return Err(self.fail(job_id, PipelineStep::Slicing, e.to_string()).await),
        };
        info!(
            job_id,
            slices = campaign.slices.len(),
            duration_ms = phase.elapsed().as_millis() as u64,
            "segmentation complete"
        );

        // Crop views.
        self.checkpoint(job_id, PipelineStep::GeneratingSliceUrls).await?;
        let mut slices = match self.slicer.generate_slice_urls(&campaign.slices, &image.url) {
            Ok(slices) => slices,
            Err(e) => {
                return Err(self
                    .fail(job_id, PipelineStep::GeneratingSliceUrls, e.to_string())
                    .await);
            }
        };
        self.jobs
            .update(
                job_id,
                JobUpdate {
                    slices: Some(slices.clone()),
                    footer_start_percent: Some(campaign.footer_start_percent),
                    ..Default::default()
                },
            )
            .await?;

        // Link annotation; degrades, never fails.
        self.checkpoint(job_id, PipelineStep::LinkValidation).await?;
        let phase = Instant::now();
        self.link_annotator
            .annotate(&mut slices, &brand, &image.url)
            .await;
        self.jobs
            .update(job_id, JobUpdate::default().with_slices(slices.clone()))
            .await?;
        info!(job_id, duration_ms = phase.elapsed().as_millis() as u64, "links annotated");

        // Copy.
        self.checkpoint(job_id, PipelineStep::GeneratingCopy).await?;
        let phase = Instant::now();
        let bounded_view =
            self.views
                .height_bounded(&image.url, image.height, self.config.max_analyzed_height);
        let copy = self
            .copy
            .run(&job, &brand, &slices, &session, &bounded_view)
            .await;
        self.jobs
            .update(
                job_id,
                JobUpdate {
                    generated_subject_lines: Some(copy.subject_lines),
                    generated_preview_texts: Some(copy.preview_texts),
                    selected_subject_line: copy.selected_subject_line,
                    selected_preview_text: copy.selected_preview_text,
                    copy_source: copy.copy_source,
                    ..Default::default()
                },
            )
            .await?;
        info!(job_id, duration_ms = phase.elapsed().as_millis() as u64, "copy selected");

        // Spelling QA.
        self.checkpoint(job_id, PipelineStep::QaCheck).await?;
        let phase = Instant::now();
        let qa = self.qa.run(&session, &image.url).await;
        self.jobs
            .update(
                job_id,
                JobUpdate {
                    spelling_errors: Some(qa.spelling_errors),
                    qa_flags: Some(qa.qa_flags),
                    ..Default::default()
                },
            )
            .await?;
        info!(job_id, duration_ms = phase.elapsed().as_millis() as u64, "qa complete");

        // Finalize: drop early-result entries; stale ones are harmless but
        // the store shouldn't accumulate them.
        self.checkpoint(job_id, PipelineStep::Finalizing).await?;
        for key in [copy_key(&session), qa_key(&session)] {
            if let Err(e) = self.early_results.remove(&key).await {
                warn!(key, error = %e, "failed to remove early result");
            }
        }

        self.jobs
            .update(
                job_id,
                JobUpdate::checkpoint(
                    JobStatus::ReadyForReview,
                    PipelineStep::Ready.name(),
                    percent_after(PipelineStep::Ready),
                ),
            )
            .await?;

        let processing_time_ms = started.elapsed().as_millis() as u64;
        info!(job_id, processing_time_ms, "job ready for review");
        Ok(ProcessOutcome {
            job_id: job_id.to_string(),
            processing_time_ms,
        })
    }

    /// Brand lookup; any miss or provider error degrades to an empty
    /// context so the pipeline still runs.
    async fn brand_context(&self, job: &QueueItem) -> BrandContext {
        let Some(brand_id) = job.brand_id.as_deref() else {
            return BrandContext::default();
        };
        match self.brands.brand(brand_id).await {
            Ok(Some(brand)) => brand,
            Ok(None) => {
                warn!(brand_id, "brand not found; proceeding without brand context");
                BrandContext::default()
            }
            Err(e) => {
                warn!(brand_id, error = %e, "brand lookup failed; proceeding without brand context");
                BrandContext::default()
            }
        }
    }

    /// Persist the stage-entry checkpoint.
    async fn checkpoint(&self, job_id: &str, step: PipelineStep) -> Result<(), PipelineError> {
        self.jobs
            .update(
                job_id,
                JobUpdate::checkpoint(JobStatus::Processing, step.name(), percent_after(step)),
            )
            .await?;
        Ok(())
    }

    /// Persist the terminal failure and build the error to surface. A
    /// store failure while recording the failure is logged, not masked.
    async fn fail(&self, job_id: &str, step: PipelineStep, message: String) -> PipelineError {
        error!(job_id, step = step.name(), message, "pipeline stage failed");
        let tagged = format!("{}: {}", step.name(), message);
        let update = JobUpdate {
            status: Some(JobStatus::Failed),
            error_message: Some(tagged.clone()),
            ..Default::default()
        };
        if let Err(e) = self.jobs.update(job_id, update).await {
            error!(job_id, error = %e, "failed to persist job failure");
        }
        match step {
            PipelineStep::FetchingImage => PipelineError::Fetch(tagged),
            PipelineStep::Slicing => PipelineError::Segmentation(tagged),
            PipelineStep::GeneratingSliceUrls => PipelineError::CropUrls(tagged),
            _ => PipelineError::Fetch(tagged),
        }
    }
}
