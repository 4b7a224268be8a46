//! Copy generation and selection.
//!
//! Candidates come from the early background task when it finished in
//! time; otherwise one synchronous generation call is made. Selection then
//! prefers externally tracked copy over design-provided copy over the
//! generated candidates.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use mailcarve_core::collab::{CopyExample, CopyGenerator, CopyRequest, SliceView};
use mailcarve_core::job::{CopySource, QueueItem, Slice};
use mailcarve_core::links::BrandContext;
use mailcarve_core::store::{EarlyResultStore, EarlyTaskResult};

use crate::early::{copy_key, poll_result};

/// Final copy decision for one job.
#[derive(Debug, Clone, Default)]
pub struct CopyOutcome {
    pub subject_lines: Vec<String>,
    pub preview_texts: Vec<String>,
    pub selected_subject_line: Option<String>,
    pub selected_preview_text: Option<String>,
    pub copy_source: Option<CopySource>,
}

pub struct CopyOrchestrator {
    results: Arc<dyn EarlyResultStore>,
    generator: Arc<dyn CopyGenerator>,
    pair_count: u32,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl CopyOrchestrator {
    pub fn new(
        results: Arc<dyn EarlyResultStore>,
        generator: Arc<dyn CopyGenerator>,
        pair_count: u32,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            results,
            generator,
            pair_count,
            poll_interval,
            poll_timeout,
        }
    }

    /// Produce the candidate lists and selections for a job. Collaborator
    /// failures degrade to empty candidate lists, never fail the job.
    pub async fn run(
        &self,
        job: &QueueItem,
        brand: &BrandContext,
        slices: &[Slice],
        session: &str,
        image_url: &str,
    ) -> CopyOutcome {
        let (mut subject_lines, mut preview_texts) = self.early_candidates(session).await;

        if subject_lines.is_empty() && preview_texts.is_empty() {
            debug!("no early copy result; generating synchronously");
            let request = CopyRequest {
                slices: slices
                    .iter()
                    .enumerate()
                    .map(|(index, s)| SliceView {
                        index,
                        image_url: s.image_url.clone(),
                        description: s.description.clone(),
                        alt_text: Some(s.alt_text.clone()),
                    })
                    .collect(),
                brand: brand.clone(),
                pair_count: self.pair_count,
                examples: brand
                    .copy_examples
                    .iter()
                    .map(|subject| CopyExample {
                        subject_line: subject.clone(),
                        preview_text: None,
                    })
                    .collect(),
                image_url: image_url.to_string(),
            };
            match self.generator.generate_copy(request).await {
                Ok(response) => {
                    subject_lines = response.subject_lines;
                    preview_texts = response.preview_texts;
                }
                Err(e) => warn!(error = %e, "copy generation failed; proceeding without candidates"),
            }
        }

        // A reprocessed job keeps its earlier candidates when this run
        // produced fewer (or none).
        let subject_lines = merge_candidates(subject_lines, job.generated_subject_lines.clone());
        let preview_texts = merge_candidates(preview_texts, job.generated_preview_texts.clone());

        let (selected_subject_line, subject_source) = select(
            job.tracked_subject_line.as_deref(),
            job.provided_subject_line.as_deref(),
            subject_lines.first().map(String::as_str),
        );
        let (selected_preview_text, _) = select(
            job.tracked_preview_text.as_deref(),
            job.provided_preview_text.as_deref(),
            preview_texts.first().map(String::as_str),
        );

        info!(
            candidates = subject_lines.len(),
            source = subject_source.map(|s| s.to_string()).unwrap_or_default(),
            "copy selection complete"
        );

        CopyOutcome {
            subject_lines,
            preview_texts,
            selected_subject_line,
            selected_preview_text,
            copy_source: subject_source,
        }
    }

    /// Wait for the early copy result; merged per-list with the empty
    /// fallback so a present-but-one-sided result still contributes.
    async fn early_candidates(&self, session: &str) -> (Vec<String>, Vec<String>) {
        let key = copy_key(session);
        match poll_result(&self.results, &key, self.poll_interval, self.poll_timeout).await {
            Ok(Some(EarlyTaskResult::Copy(result))) if result.has_candidates() => {
                debug!(key, "using early copy result");
                (result.subject_lines, result.preview_texts)
            }
            Ok(Some(_)) | Ok(None) => (Vec::new(), Vec::new()),
            Err(e) => {
                warn!(key, error = %e, "reading early copy result failed");
                (Vec::new(), Vec::new())
            }
        }
    }
}

/// Merge two candidate lists, preferring the longer; a non-empty list is
/// never displaced by an empty one.
pub fn merge_candidates(primary: Vec<String>, secondary: Vec<String>) -> Vec<String> {
    if secondary.len() > primary.len() {
        secondary
    } else {
        primary
    }
}

/// Selection priority: tracked (task tracker) > provided (design source) >
/// first generated candidate. Blank strings count as absent.
fn select(
    tracked: Option<&str>,
    provided: Option<&str>,
    generated: Option<&str>,
) -> (Option<String>, Option<CopySource>) {
    fn present(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }
    if let Some(value) = present(tracked) {
        return (Some(value.to_string()), Some(CopySource::Clickup));
    }
    if let Some(value) = present(provided) {
        return (Some(value.to_string()), Some(CopySource::Figma));
    }
    if let Some(value) = present(generated) {
        return (Some(value.to_string()), Some(CopySource::Ai));
    }
    (None, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use mailcarve_core::collab::{CollabError, CollabResult, CopyResponse};
    use mailcarve_core::store::{EarlyCopyResult, InMemoryEarlyResultStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingGenerator {
        calls: AtomicUsize,
        response: CollabResult<CopyResponse>,
    }

    impl CountingGenerator {
        fn ok(subjects: Vec<&str>, previews: Vec<&str>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Ok(CopyResponse {
                    subject_lines: subjects.into_iter().map(str::to_string).collect(),
                    preview_texts: previews.into_iter().map(str::to_string).collect(),
                }),
            }
        }

        fn failing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                response: Err(CollabError::Request("down".to_string())),
            }
        }
    }

    #[async_trait]
    impl CopyGenerator for CountingGenerator {
        async fn generate_copy(&self, _r: CopyRequest) -> CollabResult<CopyResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(r) => Ok(r.clone()),
                Err(_) => Err(CollabError::Request("down".to_string())),
            }
        }
    }

    fn orchestrator(
        results: Arc<dyn EarlyResultStore>,
        generator: Arc<CountingGenerator>,
    ) -> CopyOrchestrator {
        CopyOrchestrator::new(
            results,
            generator,
            3,
            Duration::from_millis(5),
            Duration::from_millis(30),
        )
    }

    fn job() -> QueueItem {
        QueueItem::new("job-1", "https://cdn.example.com/a.png")
    }

    #[tokio::test]
    async fn early_result_skips_synchronous_generation() {
        let results: Arc<dyn EarlyResultStore> = Arc::new(InMemoryEarlyResultStore::new());
        results
            .put(
                &copy_key("s1"),
                EarlyTaskResult::Copy(EarlyCopyResult {
                    subject_lines: vec!["Early subject".to_string()],
                    preview_texts: vec!["Early preview".to_string()],
                    created_at: Utc::now(),
                }),
            )
            .await
            .unwrap();
        let generator = Arc::new(CountingGenerator::ok(vec!["Sync"], vec!["Sync"]));

        let outcome = orchestrator(results, generator.clone())
            .run(
                &job(),
                &BrandContext::default(),
                &[],
                "s1",
                "https://cdn.example.com/a.png",
            )
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 0);
        assert_eq!(outcome.selected_subject_line.as_deref(), Some("Early subject"));
        assert_eq!(outcome.copy_source, Some(CopySource::Ai));
    }

    #[tokio::test]
    async fn missing_early_result_generates_exactly_once() {
        let results: Arc<dyn EarlyResultStore> = Arc::new(InMemoryEarlyResultStore::new());
        let generator = Arc::new(CountingGenerator::ok(
            vec!["Sync subject"],
            vec!["Sync preview"],
        ));

        let outcome = orchestrator(results, generator.clone())
            .run(
                &job(),
                &BrandContext::default(),
                &[],
                "absent",
                "https://cdn.example.com/a.png",
            )
            .await;

        assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
        assert_eq!(outcome.subject_lines, vec!["Sync subject".to_string()]);
        assert_eq!(outcome.selected_preview_text.as_deref(), Some("Sync preview"));
    }

    #[tokio::test]
    async fn generation_failure_degrades_to_empty_candidates() {
        let results: Arc<dyn EarlyResultStore> = Arc::new(InMemoryEarlyResultStore::new());
        let generator = Arc::new(CountingGenerator::failing());

        let outcome = orchestrator(results, generator)
            .run(
                &job(),
                &BrandContext::default(),
                &[],
                "absent",
                "https://cdn.example.com/a.png",
            )
            .await;

        assert!(outcome.subject_lines.is_empty());
        assert!(outcome.selected_subject_line.is_none());
        assert!(outcome.copy_source.is_none());
    }

    #[tokio::test]
    async fn tracked_copy_wins_over_provided_and_generated() {
        let results: Arc<dyn EarlyResultStore> = Arc::new(InMemoryEarlyResultStore::new());
        let generator = Arc::new(CountingGenerator::ok(vec!["AI subject"], vec!["AI preview"]));

        let mut job = job();
        job.tracked_subject_line = Some("Tracked subject".to_string());
        job.provided_subject_line = Some("Figma subject".to_string());
        job.provided_preview_text = Some("Figma preview".to_string());

        let outcome = orchestrator(results, generator)
            .run(
                &job,
                &BrandContext::default(),
                &[],
                "absent",
                "https://cdn.example.com/a.png",
            )
            .await;

        assert_eq!(outcome.selected_subject_line.as_deref(), Some("Tracked subject"));
        assert_eq!(outcome.copy_source, Some(CopySource::Clickup));
        // Preview falls through to the design-provided value.
        assert_eq!(outcome.selected_preview_text.as_deref(), Some("Figma preview"));
    }

    #[test]
    fn blank_tracked_copy_counts_as_absent() {
        let (value, source) = select(Some("   "), Some("Figma"), Some("AI"));
        assert_eq!(value.as_deref(), Some("Figma"));
        assert_eq!(source, Some(CopySource::Figma));
    }

    #[tokio::test]
    async fn reprocessing_keeps_prior_candidates_when_generation_fails() {
        let results: Arc<dyn EarlyResultStore> = Arc::new(InMemoryEarlyResultStore::new());
        let generator = Arc::new(CountingGenerator::failing());

        let mut job = job();
        job.generated_subject_lines = vec!["Old subject".to_string()];
        job.generated_preview_texts = vec!["Old preview".to_string()];

        let outcome = orchestrator(results, generator)
            .run(
                &job,
                &BrandContext::default(),
                &[],
                "absent",
                "https://cdn.example.com/a.png",
            )
            .await;

        assert_eq!(outcome.subject_lines, vec!["Old subject".to_string()]);
        assert_eq!(outcome.selected_subject_line.as_deref(), Some("Old subject"));
    }

    #[test]
    fn merge_prefers_longer_never_empty_over_nonempty() {
        let a = vec!["x".to_string()];
        assert_eq!(merge_candidates(a.clone(), Vec::new()), a);
        assert_eq!(merge_candidates(Vec::new(), a.clone()), a);
        let longer = vec!["x".to_string(), "y".to_string()];
        assert_eq!(merge_candidates(a, longer.clone()), longer);
    }
}
