//! Pipeline tuning knobs.

use std::time::Duration;

/// Configuration for pipeline behavior.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// How often the orchestrators re-check the early-result store.
    pub poll_interval: Duration,
    /// Hard deadline on waiting for an early result before falling back to
    /// synchronous generation.
    pub poll_timeout: Duration,
    /// Height cap on the image view sent to segmentation; keeps payloads
    /// under the collaborator's limits.
    pub max_analyzed_height: u32,
    /// Subject/preview pairs requested from copy generation.
    pub copy_pair_count: u32,
    /// Confidence above which a resolved link counts as verified.
    pub verified_confidence: f64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            poll_timeout: Duration::from_secs(15),
            max_analyzed_height: 7900,
            copy_pair_count: 3,
            verified_confidence: 0.8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_within_contract_bounds() {
        let config = PipelineConfig::default();
        assert!(config.poll_timeout >= Duration::from_secs(12));
        assert!(config.poll_timeout <= Duration::from_secs(20));
        assert!(config.max_analyzed_height <= 7900);
    }
}
