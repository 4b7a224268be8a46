//! reqwest-backed implementations of the collaborator traits.
//!
//! All five collaborators live behind one service; each trait maps to one
//! endpoint. Responses are deserialized straight into the wire types from
//! `mailcarve-core::collab`.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use mailcarve_core::collab::{
    AnnotateRequest, AnnotateResponse, CollabError, CollabResult, CopyGenerator, CopyRequest,
    CopyResponse, LinkResolver, ResolveRequest, ResolveResponse, SegmentRequest, SegmentResponse,
    Segmenter, SliceAnnotator, SpellingChecker, SpellingRequest, SpellingResponse,
};

/// Default per-request timeout. Segmentation on a tall design is the slow
/// path and sets the bound.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// HTTP client for the AI collaborator service.
#[derive(Debug, Clone)]
pub struct AiServiceClient {
    endpoint: String,
    client: reqwest::Client,
}

impl AiServiceClient {
    pub fn new(endpoint: impl Into<String>) -> CollabResult<Self> {
        Self::with_timeout(endpoint, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> CollabResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CollabError::Request(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post<Req, Resp>(&self, path: &str, request: &Req) -> CollabResult<Resp>
    where
        Req: serde::Serialize + ?Sized,
        Resp: serde::de::DeserializeOwned,
    {
        let url = format!("{}{}", self.endpoint, path);
        debug!(url, "collaborator request");

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| CollabError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CollabError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| CollabError::InvalidResponse(e.to_string()))
    }
}

#[async_trait]
impl Segmenter for AiServiceClient {
    async fn segment(&self, request: SegmentRequest) -> CollabResult<SegmentResponse> {
        self.post("/v1/segment", &request).await
    }
}

#[async_trait]
impl SliceAnnotator for AiServiceClient {
    async fn annotate_slices(&self, request: AnnotateRequest) -> CollabResult<AnnotateResponse> {
        self.post("/v1/annotate-slices", &request).await
    }
}

#[async_trait]
impl LinkResolver for AiServiceClient {
    async fn resolve_links(&self, request: ResolveRequest) -> CollabResult<ResolveResponse> {
        self.post("/v1/resolve-links", &request).await
    }
}

#[async_trait]
impl CopyGenerator for AiServiceClient {
    async fn generate_copy(&self, request: CopyRequest) -> CollabResult<CopyResponse> {
        self.post("/v1/generate-copy", &request).await
    }
}

#[async_trait]
impl SpellingChecker for AiServiceClient {
    async fn check_spelling(&self, request: SpellingRequest) -> CollabResult<SpellingResponse> {
        self.post("/v1/check-spelling", &request).await
    }
}
