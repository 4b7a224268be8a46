//! # Mailcarve Pipeline
//!
//! Orchestration of the campaign processing pipeline: claiming queued
//! jobs, resolving source images, segmenting them into slices, annotating
//! links, selecting copy, and running spelling QA.
//!
//! The entry point is [`PipelineController`]; everything else here is a
//! stage it composes. Collaborator and storage implementations are
//! injected as trait objects, so the whole pipeline runs against in-memory
//! fakes in tests.

pub mod config;
pub mod controller;
pub mod copy;
pub mod early;
pub mod links;
pub mod qa;
pub mod slicer;

pub use config::PipelineConfig;
pub use controller::{Collaborators, PipelineController, ProcessOutcome};
pub use copy::{CopyOrchestrator, CopyOutcome};
pub use early::{copy_key, poll_result, qa_key, EarlyTaskDispatcher};
pub use links::{AnnotationStats, LinkAnnotator, LinkRule, DEFAULT_RULES};
pub use qa::{dedup_findings, QaOrchestrator, QaOutcome};
pub use slicer::{SlicedCampaign, Slicer};
