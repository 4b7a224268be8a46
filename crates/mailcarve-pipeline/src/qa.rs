//! Spelling QA orchestration.
//!
//! Uses the early background check when it finished in time; falls back to
//! one synchronous check otherwise. Findings are deduplicated by text and
//! location before they reach the job record.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use mailcarve_core::collab::{SpellingChecker, SpellingRequest};
use mailcarve_core::job::{QaFlags, SpellingError};
use mailcarve_core::store::{EarlyResultStore, EarlyTaskResult};

use crate::early::{poll_result, qa_key};

#[derive(Debug, Clone, Default)]
pub struct QaOutcome {
    pub spelling_errors: Vec<SpellingError>,
    pub qa_flags: QaFlags,
}

pub struct QaOrchestrator {
    results: Arc<dyn EarlyResultStore>,
    checker: Arc<dyn SpellingChecker>,
    poll_interval: Duration,
    poll_timeout: Duration,
}

impl QaOrchestrator {
    pub fn new(
        results: Arc<dyn EarlyResultStore>,
        checker: Arc<dyn SpellingChecker>,
        poll_interval: Duration,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            results,
            checker,
            poll_interval,
            poll_timeout,
        }
    }

    /// Collect spelling findings for the job. Checker failures degrade to
    /// zero findings, never fail the job.
    pub async fn run(&self, session: &str, image_url: &str) -> QaOutcome {
        let key = qa_key(session);
        let early = match poll_result(&self.results, &key, self.poll_interval, self.poll_timeout)
            .await
        {
            Ok(Some(EarlyTaskResult::Spelling(result))) => {
                debug!(key, "using early spelling result");
                Some(result.errors)
            }
            Ok(Some(_)) | Ok(None) => None,
            Err(e) => {
                warn!(key, error = %e, "reading early spelling result failed");
                None
            }
        };

        let errors = match early {
            Some(errors) => errors,
            None => {
                debug!("no early spelling result; checking synchronously");
                let request = SpellingRequest {
                    image_url: image_url.to_string(),
                };
                match self.checker.check_spelling(request).await {
                    Ok(response) => response.errors,
                    Err(e) => {
                        warn!(error = %e, "spelling check failed; skipping QA findings");
                        Vec::new()
                    }
                }
            }
        };

        let spelling_errors = dedup_findings(errors);
        info!(findings = spelling_errors.len(), "spelling QA complete");
        QaOutcome {
            qa_flags: QaFlags {
                spelling: !spelling_errors.is_empty(),
            },
            spelling_errors,
        }
    }
}

/// Deduplicate by (text, location), keeping first occurrence order. A later
/// duplicate's suggestion is adopted when the kept finding lacks one.
pub fn dedup_findings(errors: Vec<SpellingError>) -> Vec<SpellingError> {
    let mut out: Vec<SpellingError> = Vec::with_capacity(errors.len());
    for error in errors {
        match out.iter_mut().find(|e| e.dedup_key() == error.dedup_key()) {
            Some(existing) => {
                if existing.suggestion.is_none() {
                    existing.suggestion = error.suggestion;
                }
            }
            None => out.push(error),
        }
    }
    out
}
