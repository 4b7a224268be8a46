//! Brand link catalog types and the additive learning cache.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::store::StoreResult;

/// What a curated destination URL points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkType {
    Product,
    Collection,
    Page,
}

/// One entry in a brand's curated link catalog.
///
/// Consulted read-only by the link annotator; the segmentation collaborator
/// receives the whole index so it can assign provisional links.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkIndexEntry {
    pub title: String,
    pub url: String,
    pub link_type: LinkType,
    #[serde(default)]
    pub use_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_verified_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_healthy: bool,
}

/// Brand context passed to collaborators alongside the image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BrandContext {
    pub id: String,
    pub name: String,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_destination_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preference_rules: Option<String>,
    #[serde(default)]
    pub link_index: Vec<LinkIndexEntry>,
    /// Copy examples from past campaigns, fed to copy generation.
    #[serde(default)]
    pub copy_examples: Vec<String>,
}

impl BrandContext {
    pub fn has_link_index(&self) -> bool {
        !self.link_index.is_empty()
    }
}

/// Read access to brand context.
///
/// Brand assignment happens before the pipeline starts; the controller only
/// looks the context up by the id already on the job record.
#[async_trait]
pub trait BrandProvider: Send + Sync {
    async fn brand(&self, brand_id: &str) -> StoreResult<Option<BrandContext>>;
}

/// In-memory [`BrandProvider`].
#[derive(Clone, Default)]
pub struct InMemoryBrandProvider {
    brands: Arc<RwLock<HashMap<String, BrandContext>>>,
}

impl InMemoryBrandProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, brand: BrandContext) {
        self.brands.write().await.insert(brand.id.clone(), brand);
    }
}

#[async_trait]
impl BrandProvider for InMemoryBrandProvider {
    async fn brand(&self, brand_id: &str) -> StoreResult<Option<BrandContext>> {
        Ok(self.brands.read().await.get(brand_id).cloned())
    }
}

/// Blanket implementation of BrandProvider for Arc<T>
#[async_trait]
impl<T: BrandProvider + ?Sized> BrandProvider for Arc<T> {
    async fn brand(&self, brand_id: &str) -> StoreResult<Option<BrandContext>> {
        (**self).brand(brand_id).await
    }
}

/// Additive product-name -> URL learning cache.
///
/// Newly discovered pairs from slice annotation are persisted keyed by
/// lower-cased trimmed product name; keys already known are skipped. The
/// cache is advisory, never authoritative.
#[async_trait]
pub trait BrandLinkStore: Send + Sync {
    /// All known (product name -> url) pairs for a brand.
    async fn known_urls(&self, brand_id: &str) -> StoreResult<HashMap<String, String>>;

    /// Persist newly discovered pairs, skipping keys already present.
    ///
    /// Returns the number of pairs actually added.
    async fn learn_urls(
        &self,
        brand_id: &str,
        pairs: Vec<(String, String)>,
    ) -> StoreResult<usize>;
}

/// Normalized cache key for a discovered product name.
pub fn product_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// In-memory [`BrandLinkStore`].
#[derive(Clone, Default)]
pub struct InMemoryBrandLinkStore {
    urls: Arc<RwLock<HashMap<String, HashMap<String, String>>>>,
}

impl InMemoryBrandLinkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BrandLinkStore for InMemoryBrandLinkStore {
    async fn known_urls(&self, brand_id: &str) -> StoreResult<HashMap<String, String>> {
        Ok(self
            .urls
            .read()
            .await
            .get(brand_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn learn_urls(
        &self,
        brand_id: &str,
        pairs: Vec<(String, String)>,
    ) -> StoreResult<usize> {
        let mut urls = self.urls.write().await;
        let brand = urls.entry(brand_id.to_string()).or_default();
        let mut added = 0;
        for (name, url) in pairs {
            let key = product_key(&name);
            if key.is_empty() || brand.contains_key(&key) {
                continue;
            }
            brand.insert(key, url);
            added += 1;
        }
        Ok(added)
    }
}

/// Blanket implementation of BrandLinkStore for Arc<T>
#[async_trait]
impl<T: BrandLinkStore + ?Sized> BrandLinkStore for Arc<T> {
    async fn known_urls(&self, brand_id: &str) -> StoreResult<HashMap<String, String>> {
        (**self).known_urls(brand_id).await
    }

    async fn learn_urls(
        &self,
        brand_id: &str,
        pairs: Vec<(String, String)>,
    ) -> StoreResult<usize> {
        (**self).learn_urls(brand_id, pairs).await
    }
}
