//! Lazy image promotion and load-failure fallback.

use tracing::{debug, trace, warn};
use url::Url;

use crate::config::ImageConfig;
use crate::dom::{ElementId, Host, LazyImage, Marker};

#[derive(Debug, Clone)]
pub struct ImageLoader {
    fallback_src: String,
    fallback_alt: String,
    base_url: Option<Url>,
}

impl ImageLoader {
    pub fn new(config: &ImageConfig) -> Self {
        let base_url = config.base_url.as_deref().and_then(|base| match Url::parse(base) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(base, error = %e, "Ignoring invalid image base URL");
                None
            }
        });

        Self {
            fallback_src: config.fallback_src.clone(),
            fallback_alt: config.fallback_alt.clone(),
            base_url,
        }
    }

    pub fn fallback_src(&self) -> &str {
        &self.fallback_src
    }

    /// Swap the pending source in. Only images that still carry a pending
    /// source are promoted.
    pub fn promote(&self, host: &mut impl Host, element: &ElementId) -> bool {
        let Some(image) = host
            .lazy_images()
            .into_iter()
            .find(|image| &image.element == element)
        else {
            trace!(%element, "No pending source, nothing to promote");
            return false;
        };

        self.promote_image(host, &image);
        true
    }

    pub fn promote_image(&self, host: &mut impl Host, image: &LazyImage) {
        host.set_image_source(&image.element, &image.pending_src);
        host.set_attribute(&image.element, "data-src", None);
        host.add_marker(&image.element, Marker::Loaded);
        debug!(element = %image.element, src = %image.pending_src, "Lazy image promoted");
    }

    /// Substitute the fallback source once. Returns false when the failing
    /// source already is the fallback, which keeps a broken fallback from looping.
    pub fn handle_error(&self, host: &mut impl Host, element: &ElementId) -> bool {
        if let Some(current) = host.image_source(element) {
            if self.is_fallback(&current) {
                trace!(%element, "Fallback image failed too, leaving it");
                return false;
            }
        }

        host.set_image_source(element, &self.fallback_src);
        host.set_attribute(element, "alt", Some(&self.fallback_alt));
        debug!(%element, "Image failed to load, substituted fallback");
        true
    }

    /// Compare after resolving both sides against the document base, so an
    /// absolute current source still matches a relative fallback path
    fn is_fallback(&self, src: &str) -> bool {
        if src == self.fallback_src {
            return true;
        }
        match (self.resolve(src), self.resolve(&self.fallback_src)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    fn resolve(&self, src: &str) -> Option<Url> {
        match &self.base_url {
            Some(base) => base.join(src).ok(),
            None => Url::parse(src).ok(),
        }
    }
}
