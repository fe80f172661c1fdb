//! Preload manifest: typed asset descriptors grouped into fixed phases

use serde::Deserialize;

use crate::error::{AssetError, Result};

/// Asset type; also names the phase that loads it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum AssetKind {
    Image,
    Atlas,
    SkeletalPackage,
    StructuredData,
    Audio,
    Font,
}

impl AssetKind {
    /// Phase order of a preload run.
    pub const PHASES: [AssetKind; 6] = [
        AssetKind::Image,
        AssetKind::Atlas,
        AssetKind::SkeletalPackage,
        AssetKind::StructuredData,
        AssetKind::Audio,
        AssetKind::Font,
    ];

    pub fn phase_name(self) -> &'static str {
        match self {
            AssetKind::Image => "images",
            AssetKind::Atlas => "atlases",
            AssetKind::SkeletalPackage => "skeletalPackages",
            AssetKind::StructuredData => "structuredData",
            AssetKind::Audio => "audio",
            AssetKind::Font => "fonts",
        }
    }
}

impl std::fmt::Display for AssetKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.phase_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageAsset {
    pub key: String,
    #[serde(default)]
    pub locator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AtlasAsset {
    pub key: String,
    /// Atlas JSON locator.
    #[serde(default)]
    pub locator: Option<String>,
    /// Base image locator; defaults to the atlas's `meta.image` next to the JSON.
    #[serde(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SkeletalAsset {
    pub key: String,
    /// Skeleton data locator.
    #[serde(default)]
    pub skeleton: Option<String>,
    /// Text atlas locator; defaults to the skeleton locator with an `.atlas` extension.
    #[serde(default)]
    pub atlas: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DataAsset {
    pub key: String,
    #[serde(default)]
    pub locator: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AudioAsset {
    pub key: String,
    /// Alternative encodings, tried in order.
    #[serde(default)]
    pub locators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FontAsset {
    pub key: String,
    #[serde(default)]
    pub locator: Option<String>,
    #[serde(default)]
    pub family: String,
}

/// One asset to load, tagged by kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetDescriptor {
    Image(ImageAsset),
    Atlas(AtlasAsset),
    Skeletal(SkeletalAsset),
    Data(DataAsset),
    Audio(AudioAsset),
    Font(FontAsset),
}

impl AssetDescriptor {
    pub fn image(key: &str, locator: &str) -> Self {
        Self::Image(ImageAsset {
            key: key.to_string(),
            locator: Some(locator.to_string()),
        })
    }

    pub fn atlas(key: &str, locator: &str) -> Self {
        Self::Atlas(AtlasAsset {
            key: key.to_string(),
            locator: Some(locator.to_string()),
            image: None,
        })
    }

    pub fn data(key: &str, locator: &str) -> Self {
        Self::Data(DataAsset {
            key: key.to_string(),
            locator: Some(locator.to_string()),
        })
    }

    pub fn key(&self) -> &str {
        match self {
            Self::Image(asset) => &asset.key,
            Self::Atlas(asset) => &asset.key,
            Self::Skeletal(asset) => &asset.key,
            Self::Data(asset) => &asset.key,
            Self::Audio(asset) => &asset.key,
            Self::Font(asset) => &asset.key,
        }
    }

    pub fn kind(&self) -> AssetKind {
        match self {
            Self::Image(_) => AssetKind::Image,
            Self::Atlas(_) => AssetKind::Atlas,
            Self::Skeletal(_) => AssetKind::SkeletalPackage,
            Self::Data(_) => AssetKind::StructuredData,
            Self::Audio(_) => AssetKind::Audio,
            Self::Font(_) => AssetKind::Font,
        }
    }

    /// Per-field presence checks.
    pub fn validate(&self) -> Result<()> {
        if self.key().trim().is_empty() {
            return Err(AssetError::MissingField {
                key: format!("<unnamed {}>", self.kind()),
                field: "key",
            });
        }
        if let Self::Font(font) = self {
            if font.family.trim().is_empty() {
                return Err(AssetError::MissingField {
                    key: font.key.clone(),
                    field: "family",
                });
            }
        }
        Ok(())
    }
}

/// Assets to preload, one list per phase
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PreloadManifest {
    pub images: Vec<ImageAsset>,
    pub atlases: Vec<AtlasAsset>,
    pub skeletal_packages: Vec<SkeletalAsset>,
    pub structured_data: Vec<DataAsset>,
    pub audio: Vec<AudioAsset>,
    pub fonts: Vec<FontAsset>,
}

impl PreloadManifest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Appends `asset` to the phase its kind belongs to.
    pub fn push(&mut self, asset: AssetDescriptor) {
        match asset {
            AssetDescriptor::Image(a) => self.images.push(a),
            AssetDescriptor::Atlas(a) => self.atlases.push(a),
            AssetDescriptor::Skeletal(a) => self.skeletal_packages.push(a),
            AssetDescriptor::Data(a) => self.structured_data.push(a),
            AssetDescriptor::Audio(a) => self.audio.push(a),
            AssetDescriptor::Font(a) => self.fonts.push(a),
        }
    }

    pub fn with(mut self, asset: AssetDescriptor) -> Self {
        self.push(asset);
        self
    }

    /// Descriptors of one phase, in manifest order.
    pub fn phase(&self, kind: AssetKind) -> Vec<AssetDescriptor> {
        match kind {
            AssetKind::Image => self.images.iter().cloned().map(AssetDescriptor::Image).collect(),
            AssetKind::Atlas => self.atlases.iter().cloned().map(AssetDescriptor::Atlas).collect(),
            AssetKind::SkeletalPackage => self
                .skeletal_packages
                .iter()
                .cloned()
                .map(AssetDescriptor::Skeletal)
                .collect(),
            AssetKind::StructuredData => self
                .structured_data
                .iter()
                .cloned()
                .map(AssetDescriptor::Data)
                .collect(),
            AssetKind::Audio => self.audio.iter().cloned().map(AssetDescriptor::Audio).collect(),
            AssetKind::Font => self.fonts.iter().cloned().map(AssetDescriptor::Font).collect(),
        }
    }

    pub fn total_count(&self) -> usize {
        self.images.len()
            + self.atlases.len()
            + self.skeletal_packages.len()
            + self.structured_data.len()
            + self.audio.len()
            + self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.total_count() == 0
    }
}
