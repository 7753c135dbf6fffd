use serde::{Deserialize, Serialize};

/// Encoding used for canonical stored images. Lossless formats only, so
/// signatures derived from stored bytes stay stable across re-ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CanonicalFormat {
    #[default]
    Png,
    WebP,
}

impl CanonicalFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            CanonicalFormat::Png => "png",
            CanonicalFormat::WebP => "webp",
        }
    }

    pub(crate) fn image_format(&self) -> image::ImageFormat {
        match self {
            CanonicalFormat::Png => image::ImageFormat::Png,
            CanonicalFormat::WebP => image::ImageFormat::WebP,
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "png" => Some(CanonicalFormat::Png),
            "webp" => Some(CanonicalFormat::WebP),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Neither stored dimension may exceed this. Images already within the
    /// bound are never upscaled.
    pub max_dimension: u32,
    /// Default combined Hamming distance (structural + intensity) at or
    /// below which two entries are considered linked.
    pub similarity_threshold: u32,
    pub canonical_format: CanonicalFormat,
    /// Lowercase extensions accepted at the ingestion boundary. Anything
    /// else is ignored, not errored.
    pub allowed_extensions: Vec<String>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_dimension: 400,
            similarity_threshold: 10,
            canonical_format: CanonicalFormat::Png,
            allowed_extensions: vec![
                "jpg".to_string(),
                "jpeg".to_string(),
                "png".to_string(),
                "webp".to_string(),
            ],
        }
    }
}

impl StoreConfig {
    pub fn is_allowed_extension(&self, ext: &str) -> bool {
        let ext = ext.to_lowercase();
        self.allowed_extensions.iter().any(|e| *e == ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_allow_list() {
        let config = StoreConfig::default();
        assert!(config.is_allowed_extension("jpg"));
        assert!(config.is_allowed_extension("JPEG"));
        assert!(config.is_allowed_extension("png"));
        assert!(config.is_allowed_extension("webp"));
        assert!(!config.is_allowed_extension("gif"));
        assert!(!config.is_allowed_extension("txt"));
    }

    #[test]
    fn test_canonical_format_extension_roundtrip() {
        for format in [CanonicalFormat::Png, CanonicalFormat::WebP] {
            assert_eq!(CanonicalFormat::from_extension(format.extension()), Some(format));
        }
        assert_eq!(CanonicalFormat::from_extension("jpg"), None);
    }
}
