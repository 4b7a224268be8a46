//! Declarative progress table.
//!
//! Progress percentages are derived by summing step weights rather than
//! hardcoding literals at each checkpoint, so reordering or reweighting a
//! stage cannot break monotonicity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Pipeline stages in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    FetchingImage,
    Slicing,
    GeneratingSliceUrls,
    LinkValidation,
    GeneratingCopy,
    QaCheck,
    Finalizing,
    Ready,
}

impl PipelineStep {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineStep::FetchingImage => "fetching_image",
            PipelineStep::Slicing => "slicing",
            PipelineStep::GeneratingSliceUrls => "generating_slice_urls",
            PipelineStep::LinkValidation => "link_validation",
            PipelineStep::GeneratingCopy => "generating_copy",
            PipelineStep::QaCheck => "qa_check",
            PipelineStep::Finalizing => "finalizing",
            PipelineStep::Ready => "ready",
        }
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of the progress table.
#[derive(Debug, Clone, Copy)]
pub struct StepWeight {
    pub step: PipelineStep,
    pub weight: u8,
}

/// Relative weight of each stage. Weights sum to 100.
pub const STEP_WEIGHTS: [StepWeight; 8] = [
    StepWeight {
        step: PipelineStep::FetchingImage,
        weight: 10,
    },
    StepWeight {
        step: PipelineStep::Slicing,
        weight: 25,
    },
    StepWeight {
        step: PipelineStep::GeneratingSliceUrls,
        weight: 10,
    },
    StepWeight {
        step: PipelineStep::LinkValidation,
        weight: 15,
    },
    StepWeight {
        step: PipelineStep::GeneratingCopy,
        weight: 20,
    },
    StepWeight {
        step: PipelineStep::QaCheck,
        weight: 10,
    },
    StepWeight {
        step: PipelineStep::Finalizing,
        weight: 5,
    },
    StepWeight {
        step: PipelineStep::Ready,
        weight: 5,
    },
];

/// Cumulative percent after the given step completes.
pub fn percent_after(step: PipelineStep) -> u8 {
    let mut total = 0u8;
    for entry in STEP_WEIGHTS {
        total += entry.weight;
        if entry.step == step {
            return total;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weights_sum_to_100() {
        let total: u32 = STEP_WEIGHTS.iter().map(|w| w.weight as u32).sum();
        assert_eq!(total, 100);
    }

    #[test]
    fn cumulative_percents_match_checkpoints() {
        assert_eq!(percent_after(PipelineStep::FetchingImage), 10);
        assert_eq!(percent_after(PipelineStep::Slicing), 35);
        assert_eq!(percent_after(PipelineStep::GeneratingSliceUrls), 45);
        assert_eq!(percent_after(PipelineStep::LinkValidation), 60);
        assert_eq!(percent_after(PipelineStep::GeneratingCopy), 80);
        assert_eq!(percent_after(PipelineStep::QaCheck), 90);
        assert_eq!(percent_after(PipelineStep::Finalizing), 95);
        assert_eq!(percent_after(PipelineStep::Ready), 100);
    }

    #[test]
    fn cumulative_percents_are_strictly_increasing() {
        let mut previous = 0;
        for entry in STEP_WEIGHTS {
            let percent = percent_after(entry.step);
            assert!(percent > previous, "{} did not increase", entry.step);
            previous = percent;
        }
    }

    #[test]
    fn step_names_are_snake_case() {
        assert_eq!(PipelineStep::FetchingImage.to_string(), "fetching_image");
        assert_eq!(
            PipelineStep::GeneratingSliceUrls.to_string(),
            "generating_slice_urls"
        );
    }
}
