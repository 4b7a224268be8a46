use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

pub type JobId = String;

/// Lifecycle status of a queued campaign job.
///
/// A job is created `Queued` by the enqueue operation, claimed to
/// `Processing` by the controller, and ends in exactly one of the two
/// terminal states per invocation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    ReadyForReview,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::ReadyForReview | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Queued => write!(f, "queued"),
            JobStatus::Processing => write!(f, "processing"),
            JobStatus::ReadyForReview => write!(f, "ready_for_review"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}

/// What kind of template block a slice becomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SliceType {
    #[default]
    Image,
    Cta,
}

/// Where a slice's destination link came from.
///
/// `Resolved` carries the resolver's source tag and serializes as
/// `resolved_<source>` to keep the persisted form flat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkSource {
    Ai,
    Manual,
    NeedsResolution,
    Resolved(String),
    DefaultFallback,
}

impl LinkSource {
    pub fn parse(s: &str) -> Self {
        match s {
            "ai" => LinkSource::Ai,
            "manual" => LinkSource::Manual,
            "needs_resolution" => LinkSource::NeedsResolution,
            "default_fallback" => LinkSource::DefaultFallback,
            other => match other.strip_prefix("resolved_") {
                Some(source) => LinkSource::Resolved(source.to_string()),
                None => LinkSource::Ai,
            },
        }
    }
}

impl fmt::Display for LinkSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkSource::Ai => write!(f, "ai"),
            LinkSource::Manual => write!(f, "manual"),
            LinkSource::NeedsResolution => write!(f, "needs_resolution"),
            LinkSource::Resolved(source) => write!(f, "resolved_{}", source),
            LinkSource::DefaultFallback => write!(f, "default_fallback"),
        }
    }
}

impl Serialize for LinkSource {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for LinkSource {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(LinkSource::parse(&s))
    }
}

/// Which system supplied the selected subject line / preview text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CopySource {
    Ai,
    Figma,
    Clickup,
}

impl fmt::Display for CopySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopySource::Ai => write!(f, "ai"),
            CopySource::Figma => write!(f, "figma"),
            CopySource::Clickup => write!(f, "clickup"),
        }
    }
}

/// A single spelling/quality finding from the QA check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpellingError {
    pub text: String,
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl SpellingError {
    /// Dedup identity: two findings with the same text at the same
    /// location are the same finding.
    pub fn dedup_key(&self) -> (String, String) {
        (self.text.clone(), self.location.clone())
    }
}

/// QA outcome flags surfaced to the review UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct QaFlags {
    #[serde(default)]
    pub spelling: bool,
}

/// A horizontal (optionally multi-column) region of the source design,
/// expressed in original-image-space pixels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slice {
    pub y_top: u32,
    pub y_bottom: u32,
    pub width: u32,
    pub height: u32,
    /// y_top / original height.
    pub start_percent: f64,
    /// y_bottom / original height.
    pub end_percent: f64,
    pub slice_type: SliceType,
    pub column: u32,
    pub total_columns: u32,
    pub row_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    pub link_source: LinkSource,
    pub link_verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link_warning: Option<String>,
    pub alt_text: String,
    /// Crop/resize view reference, not raw bytes.
    pub image_url: String,
    /// Description carried over from segmentation, used by link heuristics.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Slice {
    pub fn is_multi_column(&self) -> bool {
        self.total_columns > 1
    }

    /// Text the link heuristics match against: the segmentation description
    /// when present, otherwise the alt text.
    pub fn heuristic_text(&self) -> &str {
        self.description.as_deref().unwrap_or(&self.alt_text)
    }
}

/// Persistent record of one campaign job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: JobId,
    pub status: JobStatus,
    /// Name of the stage currently (or last) executing.
    pub processing_step: String,
    /// Monotonic 0-100 across persisted updates.
    pub processing_percent: u8,
    pub image_url: String,
    /// Nominal dimensions from enqueue time; may be stale until the
    /// resolver self-heals them against the decoded header.
    pub image_width: u32,
    pub image_height: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand_id: Option<String>,
    #[serde(default)]
    pub source_metadata: HashMap<String, serde_json::Value>,
    /// Copy supplied by the design source (figma).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_subject_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provided_preview_text: Option<String>,
    /// Copy tracked externally in the task tracker (clickup).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_subject_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracked_preview_text: Option<String>,
    #[serde(default)]
    pub generated_subject_lines: Vec<String>,
    #[serde(default)]
    pub generated_preview_texts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_subject_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_preview_text: Option<String>,
    #[serde(default)]
    pub spelling_errors: Vec<SpellingError>,
    #[serde(default)]
    pub qa_flags: QaFlags,
    #[serde(default)]
    pub slices: Vec<Slice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_start_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_source: Option<CopySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(id: impl Into<JobId>, image_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status: JobStatus::Queued,
            processing_step: String::new(),
            processing_percent: 0,
            image_url: image_url.into(),
            image_width: 0,
            image_height: 0,
            brand_id: None,
            source_metadata: HashMap::new(),
            provided_subject_line: None,
            provided_preview_text: None,
            tracked_subject_line: None,
            tracked_preview_text: None,
            generated_subject_lines: Vec::new(),
            generated_preview_texts: Vec::new(),
            selected_subject_line: None,
            selected_preview_text: None,
            spelling_errors: Vec::new(),
            qa_flags: QaFlags::default(),
            slices: Vec::new(),
            footer_start_percent: None,
            copy_source: None,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[must_use]
    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.image_width = width;
        self.image_height = height;
        self
    }

    #[must_use]
    pub fn with_brand(mut self, brand_id: impl Into<String>) -> Self {
        self.brand_id = Some(brand_id.into());
        self
    }

    /// Apply a partial-field update.
    ///
    /// `processing_percent` is clamped so it can never decrease across
    /// successive persisted updates for one job.
    pub fn apply(&mut self, update: JobUpdate) {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(step) = update.processing_step {
            self.processing_step = step;
        }
        if let Some(percent) = update.processing_percent {
            self.processing_percent = self.processing_percent.max(percent.min(100));
        }
        if let Some(width) = update.image_width {
            self.image_width = width;
        }
        if let Some(height) = update.image_height {
            self.image_height = height;
        }
        if let Some(slices) = update.slices {
            self.slices = slices;
        }
        if let Some(footer) = update.footer_start_percent {
            self.footer_start_percent = Some(footer);
        }
        if let Some(lines) = update.generated_subject_lines {
            self.generated_subject_lines = lines;
        }
        if let Some(texts) = update.generated_preview_texts {
            self.generated_preview_texts = texts;
        }
        if let Some(selected) = update.selected_subject_line {
            self.selected_subject_line = Some(selected);
        }
        if let Some(selected) = update.selected_preview_text {
            self.selected_preview_text = Some(selected);
        }
        if let Some(errors) = update.spelling_errors {
            self.spelling_errors = errors;
        }
        if let Some(flags) = update.qa_flags {
            self.qa_flags = flags;
        }
        if let Some(source) = update.copy_source {
            self.copy_source = Some(source);
        }
        if let Some(message) = update.error_message {
            self.error_message = Some(message);
        }
        self.updated_at = Utc::now();
    }
}

/// Partial-field upsert consumed by [`crate::store::JobStore::update`].
///
/// Every pipeline checkpoint persists only the fields it changed, so
/// updates are idempotent and cheap to re-apply.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<JobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_step: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slices: Option<Vec<Slice>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub footer_start_percent: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_subject_lines: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generated_preview_texts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_subject_line: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected_preview_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spelling_errors: Option<Vec<SpellingError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qa_flags: Option<QaFlags>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_source: Option<CopySource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl JobUpdate {
    /// Checkpoint update: status + step + percent, the triple every stage
    /// persists before proceeding.
    pub fn checkpoint(status: JobStatus, step: impl Into<String>, percent: u8) -> Self {
        Self {
            status: Some(status),
            processing_step: Some(step.into()),
            processing_percent: Some(percent),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_slices(mut self, slices: Vec<Slice>) -> Self {
        self.slices = Some(slices);
        self
    }

    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
