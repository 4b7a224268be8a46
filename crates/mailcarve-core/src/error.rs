use crate::store::StoreError;
use thiserror::Error;

/// Fatal pipeline failures.
///
/// Non-fatal degradations (annotation, resolution, copy, QA) never become a
/// `PipelineError`; each step handles them locally and the job continues
/// with placeholder data. Anything that reaches this enum halts the job
/// with `status = failed`.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Source image unreachable or its header unparsable.
    #[error("failed to fetch or parse source image: {0}")]
    Fetch(String),

    /// Segmentation call failed or returned zero usable slices.
    #[error("segmentation failed: {0}")]
    Segmentation(String),

    /// Zero slices survived rescale/crop-URL synthesis.
    #[error("crop url generation left no slices: {0}")]
    CropUrls(String),

    /// Job record could not be read or persisted.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// The job was not in a claimable state when `process` started.
    #[error("job {0} could not be claimed (not queued, or claimed concurrently)")]
    NotClaimed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_error_message_names_the_image() {
        let err = PipelineError::Fetch("timeout after 30s".to_string());
        assert!(err.to_string().contains("fetch"));
        assert!(err.to_string().contains("timeout after 30s"));
    }

    #[test]
    fn store_error_converts() {
        let err: PipelineError = StoreError::NotFound("job-1".to_string()).into();
        assert!(matches!(err, PipelineError::Store(_)));
    }
}
