//! Early background tasks.
//!
//! At job start, copy generation and the spelling check are dispatched
//! fire-and-forget: the spawned tasks outlive the dispatching call and
//! communicate results only through the session-keyed store. Each composite
//! key has exactly one writer, so a result is either fully present or
//! absent when the poller looks.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

use mailcarve_core::collab::{CopyGenerator, CopyRequest, SpellingChecker, SpellingRequest};
use mailcarve_core::links::BrandContext;
use mailcarve_core::store::{
    EarlyCopyResult, EarlyResultStore, EarlySpellingResult, EarlyTaskResult, StoreResult,
};
use mailcarve_core::CopyExample;

/// Composite store key for the early copy result.
pub fn copy_key(session: &str) -> String {
    format!("{}:copy", session)
}

/// Composite store key for the early spelling result.
pub fn qa_key(session: &str) -> String {
    format!("{}:qa", session)
}

/// Fires the early background tasks at job start.
pub struct EarlyTaskDispatcher {
    results: Arc<dyn EarlyResultStore>,
    copy_generator: Arc<dyn CopyGenerator>,
    spelling_checker: Arc<dyn SpellingChecker>,
    pair_count: u32,
}

impl EarlyTaskDispatcher {
    pub fn new(
        results: Arc<dyn EarlyResultStore>,
        copy_generator: Arc<dyn CopyGenerator>,
        spelling_checker: Arc<dyn SpellingChecker>,
        pair_count: u32,
    ) -> Self {
        Self {
            results,
            copy_generator,
            spelling_checker,
            pair_count,
        }
    }

    /// Dispatch both background tasks and return the new session key
    /// immediately. The caller never awaits the spawned work; failures are
    /// logged and the corresponding key simply stays empty, which the
    /// pollers treat as a timeout.
    pub fn dispatch(&self, image_url: &str, brand: &BrandContext) -> String {
        let session = format!("early-{}", Uuid::new_v4());
        debug!(session, "dispatching early generation tasks");

        let copy_request = CopyRequest {
            slices: Vec::new(),
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
        let generator = self.copy_generator.clone();
        let results = self.results.clone();
        let key = copy_key(&session);
        tokio::spawn(async move {
            match generator.generate_copy(copy_request).await {
                Ok(response) => {
                    let result = EarlyTaskResult::Copy(EarlyCopyResult {
                        subject_lines: response.subject_lines,
                        preview_texts: response.preview_texts,
                        created_at: chrono::Utc::now(),
                    });
                    if let Err(e) = results.put(&key, result).await {
                        warn!(key, error = %e, "failed to store early copy result");
                    }
                }
                Err(e) => warn!(key, error = %e, "early copy generation failed"),
            }
        });

        let spelling_request = SpellingRequest {
            image_url: image_url.to_string(),
        };
        let checker = self.spelling_checker.clone();
        let results = self.results.clone();
        let key = qa_key(&session);
        tokio::spawn(async move {
            match checker.check_spelling(spelling_request).await {
                Ok(response) => {
                    let result = EarlyTaskResult::Spelling(EarlySpellingResult {
                        errors: response.errors,
                        created_at: chrono::Utc::now(),
                    });
                    if let Err(e) = results.put(&key, result).await {
                        warn!(key, error = %e, "failed to store early spelling result");
                    }
                }
                Err(e) => warn!(key, error = %e, "early spelling check failed"),
            }
        });

        session
    }
}

/// Poll the store for a result under `key` until it appears or `timeout`
/// elapses. The timeout affects only this wait; the background task keeps
/// running and may still write a result nobody consumes.
pub async fn poll_result(
    store: &Arc<dyn EarlyResultStore>,
    key: &str,
    interval: Duration,
    timeout: Duration,
) -> StoreResult<Option<EarlyTaskResult>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(result) = store.get(key).await? {
            return Ok(Some(result));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        tokio::time::sleep(interval.min(deadline - now)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailcarve_core::collab::{CollabError, CollabResult, CopyResponse, SpellingResponse};
    use mailcarve_core::store::InMemoryEarlyResultStore;

    struct StubCopy {
        response: CopyResult,
    }

    enum CopyResult {
        Ok(Vec<String>),
        Err,
    }

    #[async_trait]
    impl CopyGenerator for StubCopy {
        async fn generate_copy(&self, _request: CopyRequest) -> CollabResult<CopyResponse> {
            match &self.response {
                CopyResult::Ok(lines) => Ok(CopyResponse {
                    subject_lines: lines.clone(),
                    preview_texts: lines.clone(),
                }),
                CopyResult::Err => Err(CollabError::Request("boom".to_string())),
            }
        }
    }

    struct StubSpelling;

    #[async_trait]
    impl SpellingChecker for StubSpelling {
        async fn check_spelling(&self, _request: SpellingRequest) -> CollabResult<SpellingResponse> {
            Ok(SpellingResponse::default())
        }
    }

    fn store() -> Arc<dyn EarlyResultStore> {
        Arc::new(InMemoryEarlyResultStore::new())
    }

    #[tokio::test]
    async fn dispatch_writes_results_under_composite_keys() {
        let results = store();
        let dispatcher = EarlyTaskDispatcher::new(
            results.clone(),
            Arc::new(StubCopy {
                response: CopyResult::Ok(vec!["Subject A".to_string()]),
            }),
            Arc::new(StubSpelling),
            3,
        );

        let session = dispatcher.dispatch(
            "https://cdn.example.com/a.png",
            &BrandContext::default(),
        );

        let copy = poll_result(
            &results,
            &copy_key(&session),
            Duration::from_millis(5),
            Duration::from_millis(500),
        )
        .await
        .unwrap();
        assert!(matches!(copy, Some(EarlyTaskResult::Copy(c)) if c.subject_lines.len() == 1));

        let qa = poll_result(
            &results,
            &qa_key(&session),
            Duration::from_millis(5),
            Duration::from_millis(500),
        )
        .await
        .unwrap();
        assert!(matches!(qa, Some(EarlyTaskResult::Spelling(_))));
    }

    #[tokio::test]
    async fn failed_task_leaves_key_empty() {
        let results = store();
        let dispatcher = EarlyTaskDispatcher::new(
            results.clone(),
            Arc::new(StubCopy {
                response: CopyResult::Err,
            }),
            Arc::new(StubSpelling),
            3,
        );

        let session = dispatcher.dispatch(
            "https://cdn.example.com/a.png",
            &BrandContext::default(),
        );

        let copy = poll_result(
            &results,
            &copy_key(&session),
            Duration::from_millis(5),
            Duration::from_millis(50),
        )
        .await
        .unwrap();
        assert!(copy.is_none());
    }

    #[tokio::test]
    async fn poll_times_out_on_absent_key() {
        let results = store();
        let started = std::time::Instant::now();
        let result = poll_result(
            &results,
            "missing:copy",
            Duration::from_millis(10),
            Duration::from_millis(40),
        )
        .await
        .unwrap();
        assert!(result.is_none());
        assert!(started.elapsed() >= Duration::from_millis(40));
    }

    #[test]
    fn session_keys_are_distinct_per_kind() {
        assert_ne!(copy_key("s"), qa_key("s"));
        assert!(copy_key("s").starts_with("s:"));
    }
}
