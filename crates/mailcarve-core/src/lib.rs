//! # Mailcarve Core
//!
//! Core domain types and trait abstractions for the mailcarve campaign
//! processing pipeline.
//!
//! ## Design Principles
//!
//! - **Traits in core, implementations in infrastructure**: storage and
//!   collaborator interfaces live here; networked implementations live in
//!   `mailcarve-ai` and `mailcarve-image`.
//! - **Backend agnostic**: in-memory implementations are provided for every
//!   store trait so orchestration logic is testable without live services.
//! - **Serde everywhere**: every domain and wire type serializes, because
//!   job state is persisted between checkpoints and collaborator payloads
//!   travel over HTTP.

pub mod collab;
pub mod error;
pub mod job;
pub mod links;
pub mod progress;
pub mod store;

pub use collab::{
    AnnotateRequest, AnnotateResponse, CollabError, CollabResult, CopyExample, CopyGenerator,
    CopyRequest, CopyResponse, DiscoveredUrl, FlaggedSlice, HorizontalSplit, LinkResolver,
    ResolveRequest, ResolveResponse, ResolvedLink, SegmentBoundary, SegmentRequest,
    SegmentResponse, Segmenter, SliceAnnotation, SliceAnnotator, SliceView, SpellingChecker,
    SpellingRequest, SpellingResponse,
};
pub use error::PipelineError;
pub use job::{
    CopySource, JobId, JobStatus, JobUpdate, LinkSource, QaFlags, QueueItem, Slice, SliceType,
    SpellingError,
};
pub use links::{
    product_key, BrandContext, BrandLinkStore, BrandProvider, InMemoryBrandLinkStore,
    InMemoryBrandProvider, LinkIndexEntry, LinkType,
};
pub use progress::{percent_after, PipelineStep, StepWeight, STEP_WEIGHTS};
pub use store::{
    EarlyCopyResult, EarlyResultStore, EarlySpellingResult, EarlyTaskResult, InMemoryEarlyResultStore,
    InMemoryJobStore, JobStore, StoreError, StoreResult,
};
