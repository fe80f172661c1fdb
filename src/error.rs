//! Error types for archetype_preload

use thiserror::Error;

use crate::texture::TextureError;

/// Main error type for asset operations
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Fetch failed for '{locator}': {reason}")]
    Fetch { locator: String, reason: String },

    #[error("Decode failed for '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error("Texture error: {0}")]
    Texture(#[from] TextureError),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed atlas '{atlas}': {reason}")]
    MalformedAtlas { atlas: String, reason: String },

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Asset '{key}' is missing required field '{field}'")]
    MissingField { key: String, field: &'static str },

    #[error("Asset '{key}' failed after {attempts} attempt(s): {source}")]
    RetriesExhausted {
        key: String,
        attempts: u32,
        #[source]
        source: Box<AssetError>,
    },

    #[error("Cache error: {0}")]
    Cache(String),
}

impl AssetError {
    /// Wrap a transport error for `locator`.
    pub fn fetch(locator: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Fetch {
            locator: locator.into(),
            reason: err.to_string(),
        }
    }

    /// Wrap a decode error for asset `key`.
    pub fn decode(key: impl Into<String>, err: impl std::fmt::Display) -> Self {
        Self::Decode {
            key: key.into(),
            reason: err.to_string(),
        }
    }

    /// Build a malformed-atlas error.
    pub fn malformed_atlas(atlas: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedAtlas {
            atlas: atlas.into(),
            reason: reason.into(),
        }
    }

    /// Whether retrying the same load could plausibly succeed.
    ///
    /// Every fetch or decode failure is retried, unsupported formats
    /// included. A malformed atlas is the one loader failure that never is.
    /// Descriptor and cache errors never come from a load attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::MalformedAtlas { .. } | Self::MissingField { .. } | Self::Cache(_) => false,
            Self::RetriesExhausted { source, .. } => source.is_transient(),
            Self::Texture(_)
            | Self::UnsupportedFormat(_)
            | Self::Fetch { .. }
            | Self::Decode { .. }
            | Self::Image(_)
            | Self::Json(_)
            | Self::Io(_) => true,
        }
    }
}

/// Result type alias for asset operations
pub type Result<T> = std::result::Result<T, AssetError>;
