//! Link guardrails and annotation.
//!
//! Two paths, chosen by whether the brand carries a curated link index:
//! with an index, provisional links were already assigned during
//! segmentation and only need to pass the guardrail rules, with flagged
//! ones sent out for re-resolution; without one, every slice goes through
//! the annotation collaborator. Every failure here degrades the job rather
//! than failing it.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use mailcarve_core::collab::{
    AnnotateRequest, FlaggedSlice, LinkResolver, ResolveRequest, SliceAnnotator, SliceView,
};
use mailcarve_core::job::{LinkSource, Slice};
use mailcarve_core::links::{BrandContext, BrandLinkStore};

lazy_static! {
    static ref PRICE_RE: Regex = Regex::new(r"\$\s?\d+(?:\.\d{2})?").unwrap();
    static ref YEAR_RE: Regex = Regex::new(r"\b20(?:2[4-9]|3[0-9])\b").unwrap();
}

const APPAREL_KEYWORDS: &[&str] = &[
    "shirt", "tee", "hoodie", "jacket", "pant", "short", "dress", "skirt", "sock", "shoe",
    "sneaker", "boot", "hat", "cap", "bag", "legging", "sweater", "vest",
];

fn looks_like_product(text: &str) -> bool {
    let lower = text.to_lowercase();
    PRICE_RE.is_match(text) || APPAREL_KEYWORDS.iter().any(|kw| lower.contains(kw))
}

fn is_collection_link(link: &str) -> bool {
    link.contains("/collections/") || link.contains("/category/")
}

/// Guardrail rules applied to each provisional link, in fixed order. The
/// first rule that fires wins; its name becomes the slice's link warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkRule {
    /// Product-looking content pointed at a collection-level URL.
    ProductCollectionMismatch,
    /// The link carries a year the surrounding text doesn't mention.
    YearMismatch,
    /// Multiple columns in a row all share one collection link; each column
    /// likely deserves its own destination.
    SharedMultiColumnLink,
}

pub const DEFAULT_RULES: [LinkRule; 3] = [
    LinkRule::ProductCollectionMismatch,
    LinkRule::YearMismatch,
    LinkRule::SharedMultiColumnLink,
];

impl LinkRule {
    pub fn name(&self) -> &'static str {
        match self {
            LinkRule::ProductCollectionMismatch => "product_collection_mismatch",
            LinkRule::YearMismatch => "year_mismatch",
            LinkRule::SharedMultiColumnLink => "shared_multi_column_link",
        }
    }

    pub fn flags(&self, slice: &Slice, link: &str) -> bool {
        let text = slice.heuristic_text();
        match self {
            LinkRule::ProductCollectionMismatch => {
                (looks_like_product(text) || slice.is_multi_column())
                    && !link.contains("/products/")
                    && is_collection_link(link)
            }
            LinkRule::YearMismatch => {
                let text_years: Vec<&str> =
                    YEAR_RE.find_iter(text).map(|m| m.as_str()).collect();
                // A year-free description says nothing about the link's year.
                !text_years.is_empty()
                    && YEAR_RE
                        .find_iter(link)
                        .any(|m| !text_years.contains(&m.as_str()))
            }
            LinkRule::SharedMultiColumnLink => {
                slice.is_multi_column() && is_collection_link(link)
            }
        }
    }
}

/// Outcome counters for one annotation pass, for logging.
#[derive(Debug, Default, Clone, Copy)]
pub struct AnnotationStats {
    pub flagged: usize,
    pub resolved: usize,
    pub defaulted: usize,
    pub learned: usize,
}

pub struct LinkAnnotator {
    annotator: Arc<dyn SliceAnnotator>,
    resolver: Arc<dyn LinkResolver>,
    link_store: Arc<dyn BrandLinkStore>,
    verified_confidence: f64,
    rules: Vec<LinkRule>,
}

impl LinkAnnotator {
    pub fn new(
        annotator: Arc<dyn SliceAnnotator>,
        resolver: Arc<dyn LinkResolver>,
        link_store: Arc<dyn BrandLinkStore>,
        verified_confidence: f64,
    ) -> Self {
        Self {
            annotator,
            resolver,
            link_store,
            verified_confidence,
            rules: DEFAULT_RULES.to_vec(),
        }
    }

    /// Annotate links in place. Never fails the job: collaborator errors
    /// leave slices in their current state with a warning logged.
    pub async fn annotate(
        &self,
        slices: &mut [Slice],
        brand: &BrandContext,
        full_image_url: &str,
    ) -> AnnotationStats {
        if brand.has_link_index() {
            self.validate_provisional(slices, brand).await
        } else {
            self.annotate_fresh(slices, brand, full_image_url).await
        }
    }

    /// Index path: guardrail the provisional links segmentation assigned,
    /// batch-resolve the flagged ones, fall back to the brand default.
    async fn validate_provisional(
        &self,
        slices: &mut [Slice],
        brand: &BrandContext,
    ) -> AnnotationStats {
        let mut stats = AnnotationStats::default();

        for slice in slices.iter_mut() {
            let Some(link) = slice.link.clone() else {
                continue;
            };
            if let Some(rule) = self.rules.iter().find(|r| r.flags(slice, &link)) {
                debug!(
                    rule = rule.name(),
                    link, row_index = slice.row_index, "provisional link flagged"
                );
                slice.link = None;
                slice.link_source = LinkSource::NeedsResolution;
                slice.link_verified = false;
                slice.link_warning = Some(rule.name().to_string());
                stats.flagged += 1;
            } else {
                slice.link_verified = true;
            }
        }

        if stats.flagged > 0 {
            let flagged: Vec<FlaggedSlice> = slices
                .iter()
                .enumerate()
                .filter(|(_, s)| s.link_source == LinkSource::NeedsResolution)
                .map(|(index, s)| FlaggedSlice {
                    index,
                    description: s.description.clone(),
                    alt_text: Some(s.alt_text.clone()),
                    image_url: s.image_url.clone(),
                })
                .collect();

            let request = ResolveRequest {
                brand_id: brand.id.clone(),
                brand_domain: brand.domain.clone(),
                slices: flagged,
            };
            match self.resolver.resolve_links(request).await {
                Ok(response) => {
                    for resolved in response.results {
                        let Some(slice) = slices.get_mut(resolved.index) else {
                            warn!(index = resolved.index, "resolver returned unknown index");
                            continue;
                        };
                        if let Some(url) = resolved.url {
                            slice.link = Some(url);
                            slice.link_verified = resolved.confidence > self.verified_confidence;
                            slice.link_source = LinkSource::Resolved(resolved.source);
                            stats.resolved += 1;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "link resolution failed; using fallbacks"),
            }

            for slice in slices.iter_mut() {
                if slice.link_source == LinkSource::NeedsResolution {
                    slice.link = brand.default_destination_url.clone();
                    slice.link_source = LinkSource::DefaultFallback;
                    slice.link_verified = false;
                    stats.defaulted += 1;
                }
            }
        }

        info!(
            flagged = stats.flagged,
            resolved = stats.resolved,
            defaulted = stats.defaulted,
            "provisional link validation complete"
        );
        stats
    }

    /// No-index path: send every slice out for annotation and learn any
    /// product URLs the annotator discovered.
    async fn annotate_fresh(
        &self,
        slices: &mut [Slice],
        brand: &BrandContext,
        full_image_url: &str,
    ) -> AnnotationStats {
        let mut stats = AnnotationStats::default();

        let known_urls: HashMap<String, String> =
            match self.link_store.known_urls(&brand.id).await {
                Ok(urls) => urls,
                Err(e) => {
                    warn!(error = %e, "loading known urls failed; annotating without them");
                    HashMap::new()
                }
            };

        let request = AnnotateRequest {
            slices: slices
                .iter()
                .enumerate()
                .map(|(index, s)| SliceView {
                    index,
                    image_url: s.image_url.clone(),
                    description: s.description.clone(),
                    alt_text: Some(s.alt_text.clone()),
                })
                .collect(),
            brand_domain: brand.domain.clone(),
            full_image_url: full_image_url.to_string(),
            known_urls,
        };

        let response = match self.annotator.annotate_slices(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "slice annotation failed; keeping slices unannotated");
                return stats;
            }
        };

        for annotation in response.analyses {
            let Some(slice) = slices.get_mut(annotation.index) else {
                warn!(index = annotation.index, "annotator returned unknown index");
                continue;
            };
            if let Some(alt) = annotation.alt_text {
                slice.alt_text = alt;
            }
            if annotation.is_clickable {
                if let Some(link) = annotation.suggested_link {
                    slice.link = Some(link);
                    slice.link_verified = annotation.link_verified;
                    slice.link_warning = annotation.link_warning;
                    slice.link_source = LinkSource::Ai;
                }
            }
        }

        if !response.discovered_urls.is_empty() {
            let pairs = response
                .discovered_urls
                .into_iter()
                .map(|d| (d.product_name, d.url))
                .collect();
            match self.link_store.learn_urls(&brand.id, pairs).await {
                Ok(added) => stats.learned = added,
                Err(e) => warn!(error = %e, "persisting discovered urls failed"),
            }
        }

        info!(learned = stats.learned, "slice annotation complete");
        stats
    }
}
