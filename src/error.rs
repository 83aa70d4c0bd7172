//! Error types for image loading.

use thiserror::Error;

/// Why an image could not be shown.
///
/// Every variant is handled the same way by the LOD controller: the node
/// keeps its previous image and the URL's failure count goes up.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    /// Transport failure (DNS, connect, timeout, body read).
    #[error("request failed: {0}")]
    Http(String),

    /// Non-success HTTP status.
    #[error("unexpected status {0}")]
    Status(u16),

    /// Bytes arrived but are not a decodable image.
    #[error("decode failed: {0}")]
    Decode(String),

    /// Decoded to an image with no pixels.
    #[error("image has zero dimensions")]
    Corrupt,
}

impl ImageError {
    /// Corrupt images get one cache-busted retry before counting as failed.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, ImageError::Corrupt)
    }

    /// Gateway errors from the image proxy are worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, ImageError::Status(502 | 503 | 504))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages() {
        assert_eq!(ImageError::Status(404).to_string(), "unexpected status 404");
        assert_eq!(ImageError::Corrupt.to_string(), "image has zero dimensions");
    }

    #[test]
    fn gateway_errors_are_transient() {
        assert!(ImageError::Status(502).is_transient());
        assert!(!ImageError::Status(404).is_transient());
        assert!(!ImageError::Http("timed out".into()).is_transient());
        assert!(ImageError::Corrupt.is_corrupt());
    }
}
