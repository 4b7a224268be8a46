//! Collaborator contracts.
//!
//! The AI and image services are opaque external collaborators; only their
//! input/output shapes are specified here. Networked implementations live
//! in `mailcarve-ai`; tests inject hand-rolled mocks.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::job::SpellingError;
use crate::links::{BrandContext, LinkIndexEntry};

/// Error types for collaborator calls.
#[derive(Debug, Error)]
pub enum CollabError {
    /// Transport-level failure (connect, timeout, TLS).
    #[error("request failed: {0}")]
    Request(String),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response payload: {0}")]
    InvalidResponse(String),
}

/// Convenient Result type for collaborator calls.
pub type CollabResult<T> = Result<T, CollabError>;

// ============================================================================
// Segmentation
// ============================================================================

/// Multi-column layout detected within a boundary.
///
/// `gutter_positions` are percentages (0-100) of the analyzed width where
/// column gutters fall, in ascending order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizontalSplit {
    pub columns: u32,
    pub gutter_positions: Vec<f64>,
}

/// One ordered boundary in analyzed-space coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentBoundary {
    pub y_top: u32,
    pub y_bottom: u32,
    pub has_cta: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub horizontal_split: Option<HorizontalSplit>,
    /// What the segmenter saw in this region; feeds the link heuristics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Provisional link assigned from the brand's link index, when one was
    /// passed in the request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_link: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRequest {
    /// Bounded-size view of the source design (height-capped).
    pub image_url: String,
    /// Actual, header-verified dimensions of the original image.
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_index: Option<Vec<LinkIndexEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_destination_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_rules: Option<String>,
}

/// Segmentation result, expressed in analyzed-space (the coordinate system
/// of the possibly-resized image the collaborator actually analyzed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentResponse {
    pub slices: Vec<SegmentBoundary>,
    pub footer_start_y: u32,
    pub image_width: u32,
    pub image_height: u32,
    pub analyzed_width: u32,
    pub analyzed_height: u32,
}

#[async_trait]
pub trait Segmenter: Send + Sync {
    async fn segment(&self, request: SegmentRequest) -> CollabResult<SegmentResponse>;
}

// ============================================================================
// Slice annotation
// ============================================================================

/// Per-slice view sent for annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceView {
    /// Stable slice index; responses merge by this field, never by array
    /// position.
    pub index: usize,
    pub image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateRequest {
    pub slices: Vec<SliceView>,
    pub brand_domain: String,
    /// Full-campaign image for context.
    pub full_image_url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub known_urls: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SliceAnnotation {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_link: Option<String>,
    #[serde(default)]
    pub is_clickable: bool,
    #[serde(default)]
    pub link_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_warning: Option<String>,
}

/// A product-name/URL pair the annotator discovered along the way.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveredUrl {
    pub product_name: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnnotateResponse {
    pub analyses: Vec<SliceAnnotation>,
    #[serde(default)]
    pub discovered_urls: Vec<DiscoveredUrl>,
}

#[async_trait]
pub trait SliceAnnotator: Send + Sync {
    async fn annotate_slices(&self, request: AnnotateRequest) -> CollabResult<AnnotateResponse>;
}

// ============================================================================
// Link resolution
// ============================================================================

/// A slice whose provisional link failed a guardrail rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlaggedSlice {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alt_text: Option<String>,
    pub image_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveRequest {
    pub brand_id: String,
    pub brand_domain: String,
    /// All flagged slices in one batch, bounding outbound fan-out.
    pub slices: Vec<FlaggedSlice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedLink {
    pub index: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default)]
    pub confidence: f64,
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolveResponse {
    pub results: Vec<ResolvedLink>,
}

#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve_links(&self, request: ResolveRequest) -> CollabResult<ResolveResponse>;
}

// ============================================================================
// Copy generation
// ============================================================================

/// A past subject-line/preview-text pair used as a generation example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyExample {
    pub subject_line: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CopyRequest {
    /// Slice summaries; empty for the early request fired before slicing.
    #[serde(default)]
    pub slices: Vec<SliceView>,
    pub brand: BrandContext,
    /// How many subject/preview pairs to produce.
    pub pair_count: u32,
    #[serde(default)]
    pub examples: Vec<CopyExample>,
    /// Bounded-size image view.
    pub image_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CopyResponse {
    #[serde(default)]
    pub subject_lines: Vec<String>,
    #[serde(default)]
    pub preview_texts: Vec<String>,
}

impl CopyResponse {
    pub fn candidate_count(&self) -> usize {
        self.subject_lines.len().max(self.preview_texts.len())
    }
}

#[async_trait]
pub trait CopyGenerator: Send + Sync {
    async fn generate_copy(&self, request: CopyRequest) -> CollabResult<CopyResponse>;
}

// ============================================================================
// Spelling check
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpellingRequest {
    /// Full image; QA reads the whole design.
    pub image_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpellingResponse {
    #[serde(default)]
    pub has_errors: bool,
    #[serde(default)]
    pub errors: Vec<SpellingError>,
}

#[async_trait]
pub trait SpellingChecker: Send + Sync {
    async fn check_spelling(&self, request: SpellingRequest) -> CollabResult<SpellingResponse>;
}
