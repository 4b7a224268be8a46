//! View-reference synthesis.
//!
//! A "view" is a URL describing a resized and/or cropped rendition of the
//! source image, served by the image CDN. Building one is pure string work:
//! no bytes are downloaded, decoded, or re-encoded here.

/// Rectangular crop in original-image-space pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropBounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Builds crop/resize view URLs.
///
/// With a proxy base configured, views are routed through the transform
/// endpoint (`{base}?src=<url>&...`); otherwise transform parameters are
/// appended to the source URL directly, which the CDN in front of the
/// asset bucket understands.
#[derive(Debug, Clone, Default)]
pub struct ImageViews {
    proxy_base: Option<String>,
}

impl ImageViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_proxy(base: impl Into<String>) -> Self {
        Self {
            proxy_base: Some(base.into()),
        }
    }

    /// A view scaled down to fit within `max_height`, preserving aspect
    /// ratio. Returns the source unchanged when it already fits.
    pub fn height_bounded(&self, url: &str, height: u32, max_height: u32) -> String {
        if height <= max_height {
            return url.to_string();
        }
        self.build(url, &[("h", max_height.to_string())])
    }

    /// A rectangular crop view.
    pub fn cropped(&self, url: &str, bounds: CropBounds) -> String {
        self.build(
            url,
            &[(
                "crop",
                format!(
                    "{},{},{},{}",
                    bounds.x, bounds.y, bounds.width, bounds.height
                ),
            )],
        )
    }

    fn build(&self, url: &str, params: &[(&str, String)]) -> String {
        match &self.proxy_base {
            Some(base) => {
                let mut out = format!("{}?src={}", base, urlencoding::encode(url));
                for (key, value) in params {
                    out.push_str(&format!("&{}={}", key, urlencoding::encode(value)));
                }
                out
            }
            None => {
                let mut out = url.to_string();
                let mut separator = if url.contains('?') { '&' } else { '?' };
                for (key, value) in params {
                    out.push(separator);
                    out.push_str(&format!("{}={}", key, value));
                    separator = '&';
                }
                out
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_bounded_leaves_small_images_alone() {
        let views = ImageViews::new();
        let url = "https://cdn.example.com/a.png";
        assert_eq!(views.height_bounded(url, 4000, 7900), url);
    }

    #[test]
    fn height_bounded_caps_tall_images() {
        let views = ImageViews::new();
        let view = views.height_bounded("https://cdn.example.com/a.png", 12000, 7900);
        assert_eq!(view, "https://cdn.example.com/a.png?h=7900");
    }

    #[test]
    fn cropped_appends_bounds() {
        let views = ImageViews::new();
        let view = views.cropped(
            "https://cdn.example.com/a.png",
            CropBounds {
                x: 0,
                y: 400,
                width: 600,
                height: 250,
            },
        );
        assert_eq!(view, "https://cdn.example.com/a.png?crop=0,400,600,250");
    }

    #[test]
    fn existing_query_string_is_extended() {
        let views = ImageViews::new();
        let view = views.cropped(
            "https://cdn.example.com/a.png?v=3",
            CropBounds {
                x: 10,
                y: 20,
                width: 30,
                height: 40,
            },
        );
        assert_eq!(view, "https://cdn.example.com/a.png?v=3&crop=10,20,30,40");
    }

    #[test]
    fn proxy_mode_encodes_source_url() {
        let views = ImageViews::with_proxy("https://img.example.com/transform");
        let view = views.height_bounded("https://cdn.example.com/a b.png", 9000, 7900);
        assert_eq!(
            view,
            "https://img.example.com/transform?src=https%3A%2F%2Fcdn.example.com%2Fa%20b.png&h=7900"
        );
    }
}
