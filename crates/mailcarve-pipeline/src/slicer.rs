//! Segmentation and coordinate rescaling.
//!
//! The segmentation collaborator analyzes a possibly-resized view of the
//! design, so every boundary it returns lives in analyzed-space. This
//! module rescales boundaries into original-space, expands multi-column
//! rows into per-column slices, and drops anything at or below the footer,
//! which belongs to a separate subsystem.

use std::sync::Arc;
use tracing::{debug, info, warn};

use mailcarve_core::collab::{SegmentRequest, SegmentResponse, Segmenter};
use mailcarve_core::error::PipelineError;
use mailcarve_core::job::{LinkSource, Slice, SliceType};
use mailcarve_core::links::BrandContext;
use mailcarve_image::{CropBounds, ImageViews, ResolvedImage};

/// Ordered, original-space slices plus the rescaled footer boundary.
#[derive(Debug, Clone)]
pub struct SlicedCampaign {
    pub slices: Vec<Slice>,
    pub footer_start_y: u32,
    pub footer_start_percent: f64,
}

/// Invokes segmentation and rescales the result into original-space.
pub struct Slicer {
    segmenter: Arc<dyn Segmenter>,
    views: ImageViews,
    max_analyzed_height: u32,
}

impl Slicer {
    pub fn new(segmenter: Arc<dyn Segmenter>, views: ImageViews, max_analyzed_height: u32) -> Self {
        Self {
            segmenter,
            views,
            max_analyzed_height,
        }
    }

    /// Run segmentation for the resolved image and emit ordered slices.
    ///
    /// Zero slices surviving the footer filter is fatal: a campaign with no
    /// content blocks cannot be built.
    pub async fn slice(
        &self,
        image: &ResolvedImage,
        brand: Option<&BrandContext>,
    ) -> Result<SlicedCampaign, PipelineError> {
        let view = self
            .views
            .height_bounded(&image.url, image.height, self.max_analyzed_height);

        let request = SegmentRequest {
            image_url: view,
            image_width: image.width,
            image_height: image.height,
            link_index: brand
                .filter(|b| b.has_link_index())
                .map(|b| b.link_index.clone()),
            default_destination_url: brand.and_then(|b| b.default_destination_url.clone()),
            preference_rules: brand.and_then(|b| b.preference_rules.clone()),
        };

        let response = self
            .segmenter
            .segment(request)
            .await
            .map_err(|e| PipelineError::Segmentation(e.to_string()))?;

        if response.slices.is_empty() {
            return Err(PipelineError::Segmentation(
                "segmenter returned zero boundaries".to_string(),
            ));
        }
        if response.analyzed_width == 0 || response.analyzed_height == 0 {
            return Err(PipelineError::Segmentation(format!(
                "segmenter reported degenerate analyzed dimensions {}x{}",
                response.analyzed_width, response.analyzed_height
            )));
        }

        let campaign = rescale(&response, image.width, image.height);
        if campaign.slices.is_empty() {
            return Err(PipelineError::Segmentation(
                "no slices survived footer filtering".to_string(),
            ));
        }

        info!(
            slices = campaign.slices.len(),
            footer_start_y = campaign.footer_start_y,
            "segmentation complete"
        );
        Ok(campaign)
    }

    /// Synthesize per-slice crop view URLs against the original image.
    ///
    /// Degenerate slices (zero width or height after rounding) are skipped;
    /// ending up with zero slices here is fatal.
    pub fn generate_slice_urls(
        &self,
        slices: &[Slice],
        source_url: &str,
    ) -> Result<Vec<Slice>, PipelineError> {
        let mut out = Vec::with_capacity(slices.len());
        let mut row = u32::MAX;
        let mut x_offset = 0u32;

        for slice in slices {
            if slice.row_index != row {
                row = slice.row_index;
                x_offset = 0;
            }
            if slice.width == 0 || slice.height == 0 {
                warn!(
                    row_index = slice.row_index,
                    column = slice.column,
                    "skipping degenerate slice"
                );
                continue;
            }
            let mut slice = slice.clone();
            slice.image_url = self.views.cropped(
                source_url,
                CropBounds {
                    x: x_offset,
                    y: slice.y_top,
                    width: slice.width,
                    height: slice.height,
                },
            );
            x_offset += slice.width;
            out.push(slice);
        }

        if out.is_empty() {
            return Err(PipelineError::CropUrls(
                "all slices were degenerate".to_string(),
            ));
        }
        Ok(out)
    }
}

/// Scale an analyzed-space coordinate into original-space.
///
/// Rounding keeps the mapping order-preserving: for y1 < y2,
/// round(y1 * s) <= round(y2 * s) whenever s > 0.
fn scale_coord(value: u32, scale: f64) -> u32 {
    (value as f64 * scale).round() as u32
}

fn rescale(response: &SegmentResponse, actual_width: u32, actual_height: u32) -> SlicedCampaign {
    let scale_x = actual_width as f64 / response.analyzed_width as f64;
    let scale_y = actual_height as f64 / response.analyzed_height as f64;

    let footer_start_y = scale_coord(response.footer_start_y, scale_y).min(actual_height);
    let footer_start_percent = footer_start_y as f64 / actual_height as f64;

    let mut boundaries: Vec<_> = response.slices.iter().collect();
    boundaries.sort_by_key(|b| (b.y_top, b.y_bottom));

    let mut slices = Vec::new();
    let mut row_index = 0u32;
    let mut ordinal = 0usize;

    for boundary in boundaries {
        let y_top = scale_coord(boundary.y_top, scale_y).min(actual_height);
        let y_bottom = scale_coord(boundary.y_bottom, scale_y).min(actual_height);
        if y_top >= y_bottom {
            debug!(
                y_top = boundary.y_top,
                y_bottom = boundary.y_bottom,
                "dropping boundary that collapsed under rescaling"
            );
            continue;
        }
        // Footer content belongs to a separate subsystem.
        if y_bottom > footer_start_y {
            debug!(y_bottom, footer_start_y, "dropping footer boundary");
            continue;
        }

        let slice_type = if boundary.has_cta {
            SliceType::Cta
        } else {
            SliceType::Image
        };
        let height = y_bottom - y_top;
        let start_percent = y_top as f64 / actual_height as f64;
        let end_percent = y_bottom as f64 / actual_height as f64;

        let column_widths = match &boundary.horizontal_split {
            Some(split) if split.columns > 1 => column_widths(
                split.columns,
                &split.gutter_positions,
                response.analyzed_width,
                scale_x,
                actual_width,
            ),
            _ => vec![actual_width],
        };
        let total_columns = column_widths.len() as u32;

        for (column, width) in column_widths.into_iter().enumerate() {
            ordinal += 1;
            slices.push(Slice {
                y_top,
                y_bottom,
                width,
                height,
                start_percent,
                end_percent,
                slice_type,
                column: column as u32,
                total_columns,
                row_index,
                link: boundary.suggested_link.clone(),
                link_source: LinkSource::Ai,
                link_verified: false,
                link_warning: None,
                alt_text: boundary
                    .description
                    .clone()
                    .unwrap_or_else(|| format!("Email section {}", ordinal)),
                image_url: String::new(),
                description: boundary.description.clone(),
            });
        }
        row_index += 1;
    }

    SlicedCampaign {
        slices,
        footer_start_y,
        footer_start_percent,
    }
}

/// Column widths in original-space pixels.
///
/// Gutter percentages are taken against the analyzed width, converted to
/// analyzed-space x positions, scaled, and rounded; widths are boundary
/// differences so they sum exactly to the parent width. When the gutter
/// list doesn't match the declared column count, fall back to an even
/// split.
fn column_widths(
    columns: u32,
    gutter_positions: &[f64],
    analyzed_width: u32,
    scale_x: f64,
    actual_width: u32,
) -> Vec<u32> {
    let mut xs = vec![0u32];
    if gutter_positions.len() as u32 + 1 == columns {
        for pct in gutter_positions {
            let analyzed_x = pct / 100.0 * analyzed_width as f64;
            let x = (analyzed_x * scale_x).round() as u32;
            xs.push(x.min(actual_width).max(*xs.last().unwrap_or(&0)));
        }
    } else {
        for i in 1..columns {
            let x = (actual_width as f64 * i as f64 / columns as f64).round() as u32;
            xs.push(x);
        }
    }
    xs.push(actual_width);

    xs.windows(2).map(|pair| pair[1] - pair[0]).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailcarve_core::collab::{CollabResult, HorizontalSplit, SegmentBoundary};

    struct StubSegmenter {
        response: SegmentResponse,
    }

    #[async_trait]
    impl Segmenter for StubSegmenter {
        async fn segment(&self, _request: SegmentRequest) -> CollabResult<SegmentResponse> {
            Ok(self.response.clone())
        }
    }

    fn boundary(y_top: u32, y_bottom: u32) -> SegmentBoundary {
        SegmentBoundary {
            y_top,
            y_bottom,
            has_cta: false,
            horizontal_split: None,
            description: None,
            suggested_link: None,
        }
    }

    fn image(width: u32, height: u32) -> ResolvedImage {
        ResolvedImage {
            url: "https://cdn.example.com/a.png".to_string(),
            width,
            height,
            corrected: false,
        }
    }

    fn slicer(response: SegmentResponse) -> Slicer {
        Slicer::new(Arc::new(StubSegmenter { response }), ImageViews::new(), 7900)
    }

    #[tokio::test]
    async fn rescales_boundaries_into_original_space() {
        // Analyzed at 2/3 height: scale_y = 1.5
        let slicer = slicer(SegmentResponse {
            slices: vec![boundary(0, 280), boundary(280, 600)],
            footer_start_y: 2000,
            image_width: 600,
            image_height: 5400,
            analyzed_width: 600,
            analyzed_height: 3600,
        });

        let campaign = slicer.slice(&image(600, 5400), None).await.unwrap();
        assert_eq!(campaign.slices.len(), 2);
        assert_eq!(campaign.slices[0].y_top, 0);
        assert_eq!(campaign.slices[0].y_bottom, 420);
        assert_eq!(campaign.slices[1].y_top, 420);
        assert_eq!(campaign.slices[1].y_bottom, 900);
        assert_eq!(campaign.footer_start_y, 3000);
    }

    #[tokio::test]
    async fn slices_respect_bounds_and_footer() {
        let slicer = slicer(SegmentResponse {
            slices: vec![boundary(0, 1000), boundary(1000, 2100), boundary(2100, 3500)],
            footer_start_y: 2200,
            image_width: 600,
            image_height: 4800,
            analyzed_width: 600,
            analyzed_height: 4800,
        });

        let campaign = slicer.slice(&image(600, 4800), None).await.unwrap();
        // The third boundary crosses the footer and is dropped.
        assert_eq!(campaign.slices.len(), 2);
        for slice in &campaign.slices {
            assert!(slice.y_top < slice.y_bottom);
            assert!(slice.y_bottom <= campaign.footer_start_y);
            assert!(slice.y_bottom <= 4800);
        }
    }

    #[tokio::test]
    async fn multi_column_widths_sum_to_parent_width() {
        let slicer = slicer(SegmentResponse {
            slices: vec![SegmentBoundary {
                y_top: 100,
                y_bottom: 400,
                has_cta: false,
                horizontal_split: Some(HorizontalSplit {
                    columns: 3,
                    gutter_positions: vec![33.3, 66.6],
                }),
                description: Some("Three featured products".to_string()),
                suggested_link: None,
            }],
            footer_start_y: 500,
            image_width: 601,
            image_height: 500,
            analyzed_width: 601,
            analyzed_height: 500,
        });

        let campaign = slicer.slice(&image(601, 500), None).await.unwrap();
        assert_eq!(campaign.slices.len(), 3);
        let total: u32 = campaign.slices.iter().map(|s| s.width).sum();
        assert_eq!(total, 601);
        for (i, slice) in campaign.slices.iter().enumerate() {
            assert_eq!(slice.column, i as u32);
            assert_eq!(slice.total_columns, 3);
            assert_eq!(slice.row_index, 0);
        }
    }

    #[tokio::test]
    async fn mismatched_gutters_fall_back_to_even_split() {
        let widths = column_widths(2, &[], 600, 1.0, 600);
        assert_eq!(widths, vec![300, 300]);
    }

    #[tokio::test]
    async fn zero_surviving_slices_is_fatal() {
        let slicer = slicer(SegmentResponse {
            slices: vec![boundary(900, 1200)],
            footer_start_y: 800,
            image_width: 600,
            image_height: 1200,
            analyzed_width: 600,
            analyzed_height: 1200,
        });

        let err = slicer.slice(&image(600, 1200), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Segmentation(_)));
    }

    #[tokio::test]
    async fn empty_response_is_fatal() {
        let slicer = slicer(SegmentResponse {
            slices: vec![],
            footer_start_y: 800,
            image_width: 600,
            image_height: 1200,
            analyzed_width: 600,
            analyzed_height: 1200,
        });

        let err = slicer.slice(&image(600, 1200), None).await.unwrap_err();
        assert!(matches!(err, PipelineError::Segmentation(_)));
    }

    #[test]
    fn rescaling_is_order_preserving() {
        let scale = 5400.0 / 3600.0;
        let mut previous = 0u32;
        for y in (0..3600).step_by(7) {
            let scaled = scale_coord(y, scale);
            assert!(scaled >= previous);
            previous = scaled;
        }
    }

    #[test]
    fn crop_urls_carry_row_local_offsets() {
        let slicer = slicer(SegmentResponse {
            slices: vec![],
            footer_start_y: 0,
            image_width: 0,
            image_height: 0,
            analyzed_width: 1,
            analyzed_height: 1,
        });

        let template = Slice {
            y_top: 100,
            y_bottom: 400,
            width: 300,
            height: 300,
            start_percent: 0.0,
            end_percent: 0.0,
            slice_type: SliceType::Image,
            column: 0,
            total_columns: 2,
            row_index: 0,
            link: None,
            link_source: LinkSource::Ai,
            link_verified: false,
            link_warning: None,
            alt_text: "a".to_string(),
            image_url: String::new(),
            description: None,
        };
        let mut second = template.clone();
        second.column = 1;

        let out = slicer
            .generate_slice_urls(&[template, second], "https://cdn.example.com/a.png")
            .unwrap();
        assert!(out[0].image_url.contains("crop=0,100,300,300"));
        assert!(out[1].image_url.contains("crop=300,100,300,300"));
    }

    #[test]
    fn all_degenerate_slices_is_fatal() {
        let slicer = slicer(SegmentResponse {
            slices: vec![],
            footer_start_y: 0,
            image_width: 0,
            image_height: 0,
            analyzed_width: 1,
            analyzed_height: 1,
        });

        let degenerate = Slice {
            y_top: 100,
            y_bottom: 100,
            width: 0,
            height: 0,
            start_percent: 0.0,
            end_percent: 0.0,
            slice_type: SliceType::Image,
            column: 0,
            total_columns: 1,
            row_index: 0,
            link: None,
            link_source: LinkSource::Ai,
            link_verified: false,
            link_warning: None,
            alt_text: "a".to_string(),
            image_url: String::new(),
            description: None,
        };

        let err = slicer
            .generate_slice_urls(&[degenerate], "https://cdn.example.com/a.png")
            .unwrap_err();
        assert!(matches!(err, PipelineError::CropUrls(_)));
    }
}
