//! Source image resolution.
//!
//! Fetches the leading bytes of the source image (a header-only range read
//! when the server honors it) and derives the true pixel dimensions from
//! the format header, self-healing stale enqueue-time metadata.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::dimensions::parse_dimensions;
use crate::ImageError;

/// Default header prefix: 64 KiB covers the IHDR chunk and almost every
/// JPEG SOF, including files with EXIF blocks.
pub const DEFAULT_PREFIX_BYTES: u64 = 64 * 1024;

/// Transport abstraction so the resolver is testable without live HTTP.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch up to `max_bytes` leading bytes of the resource.
    ///
    /// Implementations should attempt a range read and fall back to
    /// truncating a full response when ranges are ignored.
    async fn fetch_prefix(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, ImageError>;

    /// Fetch the entire resource.
    async fn fetch_all(&self, url: &str) -> Result<Vec<u8>, ImageError>;
}

/// reqwest-backed [`ImageFetcher`].
pub struct HttpImageFetcher {
    client: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    async fn body_or_status(response: reqwest::Response) -> Result<Vec<u8>, ImageError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ImageError::Status {
                status: status.as_u16(),
            });
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| ImageError::Transport(e.to_string()))?;
        Ok(body.to_vec())
    }
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch_prefix(&self, url: &str, max_bytes: u64) -> Result<Vec<u8>, ImageError> {
        let response = self
            .client
            .get(url)
            .header("Range", format!("bytes=0-{}", max_bytes.saturating_sub(1)))
            .send()
            .await
            .map_err(|e| ImageError::Transport(e.to_string()))?;

        // 200 means the server ignored the range; truncate locally.
        let mut body = Self::body_or_status(response).await?;
        body.truncate(max_bytes as usize);
        Ok(body)
    }

    async fn fetch_all(&self, url: &str) -> Result<Vec<u8>, ImageError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ImageError::Transport(e.to_string()))?;
        Self::body_or_status(response).await
    }
}

/// Resolution outcome: the true dimensions and whether they corrected the
/// nominal values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
    /// True when the decoded header disagreed with the stored metadata;
    /// the controller persists the corrected values.
    pub corrected: bool,
}

/// Fetches source images and verifies their dimensions against the header.
pub struct ImageResolver {
    fetcher: Arc<dyn ImageFetcher>,
    prefix_bytes: u64,
}

impl ImageResolver {
    pub fn new(fetcher: Arc<dyn ImageFetcher>) -> Self {
        Self {
            fetcher,
            prefix_bytes: DEFAULT_PREFIX_BYTES,
        }
    }

    #[must_use]
    pub fn with_prefix_bytes(mut self, prefix_bytes: u64) -> Self {
        self.prefix_bytes = prefix_bytes;
        self
    }

    /// Resolve the image at `url`, comparing header dimensions against the
    /// nominal `(width, height)` from the job record.
    ///
    /// Unreachable or unparsable images are fatal to the job; the error is
    /// surfaced as-is for the controller's failure policy.
    pub async fn resolve(
        &self,
        url: &str,
        nominal_width: u32,
        nominal_height: u32,
    ) -> Result<ResolvedImage, ImageError> {
        let prefix = self.fetcher.fetch_prefix(url, self.prefix_bytes).await?;

        let dims = match parse_dimensions(&prefix) {
            Ok(dims) => dims,
            Err(ImageError::Truncated) => {
                // The header sits past the prefix (large EXIF, unusual
                // segment order). One full read settles it.
                debug!(url, "header not within prefix, fetching full image");
                let full = self.fetcher.fetch_all(url).await?;
                parse_dimensions(&full)?
            }
            Err(e) => return Err(e),
        };

        let corrected = dims.width != nominal_width || dims.height != nominal_height;
        if corrected {
            warn!(
                url,
                nominal_width,
                nominal_height,
                actual_width = dims.width,
                actual_height = dims.height,
                "stored image dimensions were stale, using header values"
            );
        }

        Ok(ResolvedImage {
            url: url.to_string(),
            width: dims.width,
            height: dims.height,
            corrected,
        })
    }
}
