//! # Mailcarve Image
//!
//! Image acquisition for the campaign pipeline: fetch the source design,
//! read true pixel dimensions from the format header, and synthesize
//! crop/resize view references.
//!
//! This crate deliberately contains no image codec. Dimension parsing reads
//! format headers only; pixel transforms are the image CDN's job and are
//! expressed as view URLs.

pub mod dimensions;
pub mod resolver;
pub mod view;

use thiserror::Error;

pub use dimensions::{parse_dimensions, Dimensions};
pub use resolver::{
    HttpImageFetcher, ImageFetcher, ImageResolver, ResolvedImage, DEFAULT_PREFIX_BYTES,
};
pub use view::{CropBounds, ImageViews};

/// Error types for image acquisition and header parsing.
#[derive(Debug, Error)]
pub enum ImageError {
    /// Not a PNG or JPEG.
    #[error("unsupported image format")]
    UnsupportedFormat,

    /// The buffer ended before the header did; a fuller read may succeed.
    #[error("image data truncated before header was complete")]
    Truncated,

    #[error("malformed image header: {0}")]
    Malformed(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("unexpected status {status} fetching image")]
    Status { status: u16 },
}
