//! Type-specific asset loading
//!
//! [`AssetLoader`] performs exactly one attempt for one descriptor: fetch
//! the bytes, decode them and build the [`Resource`]. Retrying and caching
//! are layered on top by [`executor::FetchExecutor`].

pub mod executor;

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, warn};

use crate::atlas::{AtlasDescriptor, AtlasParser};
use crate::cache::AssetCache;
use crate::error::{AssetError, Result};
use crate::preload::manifest::{AssetDescriptor, AtlasAsset, AudioAsset, FontAsset, SkeletalAsset};
use crate::resolver::{join_relative, PathResolver};
use crate::resource::{AudioClip, FontFace, Resource, SkeletonPackage, StructuredData};
use crate::source::AssetSource;
use crate::texture::{Texture, TextureLoader};

pub use executor::{FailedAssets, FetchExecutor, LoadOutcome};

const IMAGE_EXTENSIONS: [&str; 4] = [".png", ".jpg", ".jpeg", ".webp"];

/// Fetches and decodes single assets
#[derive(Clone)]
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    resolver: Arc<dyn PathResolver>,
    cache: Arc<AssetCache>,
    textures: TextureLoader,
    namespace: Option<String>,
}

impl std::fmt::Debug for AssetLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AssetLoader")
            .field("source", &self.source.source_name())
            .field("namespace", &self.namespace)
            .finish()
    }
}

impl AssetLoader {
    pub fn new(
        source: Arc<dyn AssetSource>,
        resolver: Arc<dyn PathResolver>,
        cache: Arc<AssetCache>,
    ) -> Self {
        Self {
            source,
            resolver,
            cache,
            textures: TextureLoader::new(),
            namespace: None,
        }
    }

    /// Cache namespace for atlas frames this loader registers.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn cache(&self) -> &Arc<AssetCache> {
        &self.cache
    }

    /// Primary locator of `asset`, resolved when the manifest omits it.
    pub fn locator_for(&self, asset: &AssetDescriptor) -> String {
        let explicit = match asset {
            AssetDescriptor::Image(a) => a.locator.as_deref(),
            AssetDescriptor::Atlas(a) => a.locator.as_deref(),
            AssetDescriptor::Skeletal(a) => a.skeleton.as_deref(),
            AssetDescriptor::Data(a) => a.locator.as_deref(),
            AssetDescriptor::Audio(a) => a.locators.first().map(String::as_str),
            AssetDescriptor::Font(a) => a.locator.as_deref(),
        };
        match explicit {
            Some(locator) => locator.to_string(),
            None => self.resolver.resolve(asset.kind(), asset.key()),
        }
    }

    /// One fetch-and-decode attempt.
    pub async fn load(&self, asset: &AssetDescriptor) -> Result<Resource> {
        let locator = self.locator_for(asset);
        debug!(key = asset.key(), kind = %asset.kind(), locator = %locator, "loading asset");

        match asset {
            AssetDescriptor::Image(image) => {
                let texture = self.load_texture(&image.key, &locator).await?;
                Ok(Resource::Image(Arc::new(texture)))
            }
            AssetDescriptor::Atlas(atlas) => self.load_atlas(atlas, &locator).await,
            AssetDescriptor::Skeletal(skeletal) => self.load_skeleton(skeletal, &locator).await,
            AssetDescriptor::Data(data) => {
                let bytes = self.fetch(&locator).await?;
                let value = serde_json::from_slice(&bytes)
                    .map_err(|e| AssetError::decode(&data.key, e))?;
                Ok(Resource::Data(StructuredData {
                    value,
                    byte_len: bytes.len(),
                }))
            }
            AssetDescriptor::Audio(audio) => self.load_audio(audio, locator).await,
            AssetDescriptor::Font(font) => self.load_font(font, &locator).await,
        }
    }

    async fn fetch(&self, locator: &str) -> Result<Bytes> {
        self.source
            .fetch(locator)
            .await
            .map_err(|e| AssetError::fetch(locator, format!("{e:#}")))
    }

    async fn load_texture(&self, key: &str, locator: &str) -> Result<Texture> {
        let bytes = self.fetch(locator).await?;
        let texture = self.textures.load(&bytes)?;
        debug!(key, width = texture.width, height = texture.height, "image decoded");
        Ok(texture)
    }

    async fn load_atlas(&self, atlas: &AtlasAsset, locator: &str) -> Result<Resource> {
        let json = self.fetch(locator).await?;

        let image_locator = match &atlas.image {
            Some(image) => image.clone(),
            None => {
                let descriptor = AtlasDescriptor::from_json(&atlas.key, &json)?;
                if descriptor.base_image_ref.is_empty() {
                    return Err(AssetError::malformed_atlas(
                        &atlas.key,
                        "no base image in meta.image and none in the manifest",
                    ));
                }
                join_relative(locator, &descriptor.base_image_ref)
            }
        };

        let base = match self.load_texture(&atlas.key, &image_locator).await {
            Ok(texture) => Some(Arc::new(texture)),
            Err(err) => {
                warn!(
                    atlas = %atlas.key,
                    image = %image_locator,
                    error = %err,
                    "atlas base image failed to load"
                );
                None
            }
        };

        let parsed = AtlasParser::new(Arc::clone(&self.cache))
            .with_namespace(self.namespace.clone())
            .parse(&atlas.key, &json, base)
            .await?;
        Ok(Resource::Atlas(parsed))
    }

    async fn load_skeleton(&self, skeletal: &SkeletalAsset, locator: &str) -> Result<Resource> {
        let skeleton = self.fetch(locator).await?;

        let atlas_locator = match &skeletal.atlas {
            Some(atlas) => atlas.clone(),
            None => replace_extension(locator, ".atlas"),
        };
        let atlas_bytes = self.fetch(&atlas_locator).await?;
        let atlas_text = String::from_utf8(atlas_bytes.to_vec())
            .map_err(|e| AssetError::decode(&skeletal.key, e))?;

        let mut pages = Vec::new();
        for page in atlas_page_names(&atlas_text) {
            let page_locator = join_relative(&atlas_locator, &page);
            let texture = self.load_texture(&skeletal.key, &page_locator).await?;
            pages.push((page, Arc::new(texture)));
        }

        Ok(Resource::Skeleton(SkeletonPackage {
            skeleton,
            atlas_text,
            pages,
        }))
    }

    /// Tries each alternative in order; the last failure is reported.
    async fn load_audio(&self, audio: &AudioAsset, primary: String) -> Result<Resource> {
        let alternatives = if audio.locators.is_empty() {
            vec![primary]
        } else {
            audio.locators.clone()
        };

        let mut last_err = None;
        for locator in alternatives {
            match self.fetch(&locator).await {
                Ok(bytes) if !bytes.is_empty() => {
                    return Ok(Resource::Audio(AudioClip { locator, bytes }));
                }
                Ok(_) => last_err = Some(AssetError::decode(&audio.key, "empty audio payload")),
                Err(err) => {
                    debug!(key = %audio.key, locator = %locator, error = %err, "audio alternative failed");
                    last_err = Some(err);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| AssetError::MissingField {
            key: audio.key.clone(),
            field: "locators",
        }))
    }

    async fn load_font(&self, font: &FontAsset, locator: &str) -> Result<Resource> {
        let bytes = self.fetch(locator).await?;
        if !is_font(&bytes) {
            return Err(AssetError::UnsupportedFormat(format!(
                "'{}' is not a TTF, OTF, WOFF or WOFF2 font",
                font.key
            )));
        }
        Ok(Resource::Font(FontFace {
            family: font.family.clone(),
            bytes,
        }))
    }
}

/// Page image names listed in a Spine-style text atlas.
pub fn atlas_page_names(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains(':'))
        .filter(|line| {
            let lower = line.to_ascii_lowercase();
            IMAGE_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
        })
        .map(str::to_string)
        .collect()
}

fn replace_extension(locator: &str, extension: &str) -> String {
    let file_start = locator.rfind('/').map_or(0, |slash| slash + 1);
    match locator[file_start..].rfind('.') {
        Some(dot) if dot > 0 => format!("{}{}", &locator[..file_start + dot], extension),
        _ => format!("{locator}{extension}"),
    }
}

fn is_font(bytes: &[u8]) -> bool {
    matches!(
        bytes.get(..4),
        Some([0x00, 0x01, 0x00, 0x00]) | Some(b"OTTO") | Some(b"true") | Some(b"wOFF") | Some(b"wOF2")
    )
}
