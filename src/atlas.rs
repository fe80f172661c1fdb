//! Packed-atlas parsing
//!
//! Reads TexturePacker-style JSON (hash or array `frames`, plus `meta`),
//! validates every frame against the base image and registers each frame
//! as its own cache entry under `"{atlas}:{frame}"`. A normalized alias
//! for symbol lookup goes into the cache's separate alias index.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};
use xxhash_rust::xxh3::xxh3_64;

use crate::cache::AssetCache;
use crate::error::{AssetError, Result};
use crate::resource::{FrameImage, Resource};
use crate::texture::Texture;

/// Cache key of frame `frame_name` inside atlas `atlas_key`
pub fn frame_key(atlas_key: &str, frame_name: &str) -> String {
    format!("{atlas_key}:{frame_name}")
}

/// Normalized lookup alias for a frame name.
///
/// Drops any directory prefix and file extension and lowercases the rest:
/// `"Symbols/Cherry.png"` becomes `"cherry"`.
pub fn alias_key(frame_name: &str) -> String {
    let file = frame_name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(frame_name);
    let stem = match file.rfind('.') {
        Some(dot) if dot > 0 => &file[..dot],
        _ => file,
    };
    stem.to_lowercase()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Size {
    pub w: u32,
    pub h: u32,
}

/// Placement of the trimmed sprite inside its original bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SpriteOffset {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// One frame's rectangle in the base image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRect {
    pub x: u32,
    pub y: u32,
    /// Sprite width before rotation.
    pub w: u32,
    /// Sprite height before rotation.
    pub h: u32,
    /// Packed rotated 90°; occupies `h x w` in the base image.
    pub rotated: bool,
    pub trimmed: bool,
    pub source_size: Size,
    pub sprite_offset: SpriteOffset,
}

impl FrameRect {
    /// Untrimmed, unrotated rectangle.
    pub fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self {
            x,
            y,
            w,
            h,
            rotated: false,
            trimmed: false,
            source_size: Size { w, h },
            sprite_offset: SpriteOffset { x: 0, y: 0, w, h },
        }
    }

    /// Footprint in the base image.
    pub fn packed_size(&self) -> (u32, u32) {
        if self.rotated {
            (self.h, self.w)
        } else {
            (self.w, self.h)
        }
    }

    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        let (w, h) = self.packed_size();
        self.x.checked_add(w).is_some_and(|right| right <= width)
            && self.y.checked_add(h).is_some_and(|bottom| bottom <= height)
    }
}

/// Canonical atlas description
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasDescriptor {
    /// Frames by unique name.
    pub frames: BTreeMap<String, FrameRect>,
    /// Base image reference as written in the atlas (`meta.image`).
    pub base_image_ref: String,
    pub scale: f32,
    /// Declared base image size, if any.
    pub size: Option<Size>,
    /// xxh3 of the atlas bytes.
    pub fingerprint: u64,
}

impl AtlasDescriptor {
    /// Parses and validates atlas JSON.
    ///
    /// Any problem is a [`AssetError::MalformedAtlas`] for the whole atlas.
    pub fn from_json(atlas_key: &str, bytes: &[u8]) -> Result<Self> {
        let file: AtlasFile = serde_json::from_slice(bytes)
            .map_err(|e| AssetError::malformed_atlas(atlas_key, e.to_string()))?;

        let named: Vec<(String, FrameFile)> = match file.frames {
            FramesFile::Hash(frames) => frames.into_iter().collect(),
            FramesFile::List(frames) => frames
                .into_iter()
                .map(|named| (named.filename, named.frame))
                .collect(),
        };

        let mut frames = BTreeMap::new();
        for (name, raw) in named {
            if name.is_empty() {
                return Err(AssetError::malformed_atlas(atlas_key, "frame with empty name"));
            }
            let rect = raw.into_rect(atlas_key, &name)?;
            if let Some(size) = file.meta.size {
                if !rect.fits_within(size.w, size.h) {
                    return Err(AssetError::malformed_atlas(
                        atlas_key,
                        format!(
                            "frame '{name}' exceeds declared {}x{} atlas size",
                            size.w, size.h
                        ),
                    ));
                }
            }
            if frames.insert(name.clone(), rect).is_some() {
                return Err(AssetError::malformed_atlas(
                    atlas_key,
                    format!("duplicate frame name '{name}'"),
                ));
            }
        }

        let scale = match file.meta.scale {
            None => 1.0,
            Some(ScaleFile::Number(scale)) => scale,
            Some(ScaleFile::Text(text)) => text.trim().parse().map_err(|_| {
                AssetError::malformed_atlas(atlas_key, format!("invalid scale '{text}'"))
            })?,
        };
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AssetError::malformed_atlas(
                atlas_key,
                format!("scale must be positive, got {scale}"),
            ));
        }

        Ok(Self {
            frames,
            base_image_ref: file.meta.image.unwrap_or_default(),
            scale,
            size: file.meta.size,
            fingerprint: xxh3_64(bytes),
        })
    }

    /// Fails if any frame lies outside a `width x height` base image.
    pub fn validate_bounds(&self, atlas_key: &str, width: u32, height: u32) -> Result<()> {
        match self
            .frames
            .iter()
            .find(|(_, rect)| !rect.fits_within(width, height))
        {
            Some((name, rect)) => Err(AssetError::malformed_atlas(
                atlas_key,
                format!(
                    "frame '{name}' at {},{} {}x{} exceeds {width}x{height} base image",
                    rect.x, rect.y, rect.w, rect.h
                ),
            )),
            None => Ok(()),
        }
    }
}

/// An atlas after parsing and frame registration
#[derive(Debug, Clone)]
pub struct ParsedAtlas {
    pub key: String,
    pub descriptor: AtlasDescriptor,
    /// `None` when the base image could not be loaded.
    pub base: Option<Arc<Texture>>,
    /// Cache keys of the registered frames, in frame-name order.
    pub frame_keys: Vec<String>,
    /// Aliases this atlas set in the cache's alias index.
    pub alias_keys: Vec<String>,
}

impl ParsedAtlas {
    /// Present but without frames because its base image is missing.
    pub fn is_degraded(&self) -> bool {
        self.base.is_none()
    }

    pub fn frame_count(&self) -> usize {
        self.frame_keys.len()
    }

    pub fn estimated_size(&self) -> usize {
        self.base
            .as_ref()
            .map(|texture| texture.estimated_size())
            .unwrap_or(0)
    }
}

/// Registers atlas frames in an [`AssetCache`]
#[derive(Debug, Clone)]
pub struct AtlasParser {
    cache: Arc<AssetCache>,
    namespace: Option<String>,
}

impl AtlasParser {
    pub fn new(cache: Arc<AssetCache>) -> Self {
        Self {
            cache,
            namespace: None,
        }
    }

    /// Tag registered frames with a cache namespace.
    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Parses `atlas_bytes` and registers one cache entry per frame.
    ///
    /// Malformed JSON or any out-of-bounds frame fails the whole atlas
    /// before anything is registered. A missing `base_image` is not an
    /// error: the atlas comes back degraded with zero frames.
    pub async fn parse(
        &self,
        atlas_key: &str,
        atlas_bytes: &[u8],
        base_image: Option<Arc<Texture>>,
    ) -> Result<ParsedAtlas> {
        let descriptor = AtlasDescriptor::from_json(atlas_key, atlas_bytes)?;

        let Some(base) = base_image else {
            warn!(
                atlas = atlas_key,
                image = %descriptor.base_image_ref,
                "atlas base image unavailable, registering zero frames"
            );
            return Ok(ParsedAtlas {
                key: atlas_key.to_string(),
                descriptor,
                base: None,
                frame_keys: Vec::new(),
                alias_keys: Vec::new(),
            });
        };

        descriptor.validate_bounds(atlas_key, base.width, base.height)?;

        let namespace = self.namespace.as_deref();
        let mut frame_keys = Vec::with_capacity(descriptor.frames.len());
        let mut alias_keys = Vec::new();
        for (name, rect) in &descriptor.frames {
            let key = frame_key(atlas_key, name);
            let frame = FrameImage {
                name: name.clone(),
                rect: *rect,
                base: Arc::clone(&base),
            };
            self.cache
                .get_or_load_in(namespace, &key, atlas_key, || async move {
                    Ok(Resource::Frame(frame))
                })
                .await?;

            if self.cache.register_alias(name, &key) {
                alias_keys.push(alias_key(name));
            } else {
                debug!(atlas = atlas_key, frame = %name, "alias already registered, skipping");
            }
            frame_keys.push(key);
        }

        debug!(
            atlas = atlas_key,
            frames = frame_keys.len(),
            aliases = alias_keys.len(),
            "atlas frames registered"
        );

        Ok(ParsedAtlas {
            key: atlas_key.to_string(),
            descriptor,
            base: Some(base),
            frame_keys,
            alias_keys,
        })
    }
}

#[derive(Deserialize)]
struct AtlasFile {
    frames: FramesFile,
    #[serde(default)]
    meta: MetaFile,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum FramesFile {
    Hash(BTreeMap<String, FrameFile>),
    List(Vec<NamedFrameFile>),
}

#[derive(Deserialize)]
struct NamedFrameFile {
    filename: String,
    #[serde(flatten)]
    frame: FrameFile,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FrameFile {
    frame: RectFile,
    #[serde(default)]
    rotated: bool,
    #[serde(default)]
    trimmed: bool,
    sprite_source_size: Option<RectFile>,
    source_size: Option<Size>,
}

#[derive(Deserialize)]
struct RectFile {
    x: i64,
    y: i64,
    w: i64,
    h: i64,
}

#[derive(Default, Deserialize)]
struct MetaFile {
    image: Option<String>,
    size: Option<Size>,
    scale: Option<ScaleFile>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ScaleFile {
    Number(f32),
    Text(String),
}

impl FrameFile {
    fn into_rect(self, atlas_key: &str, name: &str) -> Result<FrameRect> {
        let malformed = |what: &str| {
            AssetError::malformed_atlas(atlas_key, format!("frame '{name}' has {what}"))
        };
        let to_u32 = |value: i64| u32::try_from(value).ok();

        let RectFile { x, y, w, h } = self.frame;
        let (Some(x), Some(y), Some(w), Some(h)) = (to_u32(x), to_u32(y), to_u32(w), to_u32(h))
        else {
            return Err(malformed("a negative or oversized rectangle"));
        };
        if w == 0 || h == 0 {
            return Err(malformed("an empty rectangle"));
        }

        let sprite_offset = match self.sprite_source_size {
            Some(RectFile { x, y, w, h }) => {
                match (to_u32(x), to_u32(y), to_u32(w), to_u32(h)) {
                    (Some(x), Some(y), Some(w), Some(h)) => SpriteOffset { x, y, w, h },
                    _ => return Err(malformed("an invalid spriteSourceSize")),
                }
            }
            None => SpriteOffset { x: 0, y: 0, w, h },
        };

        Ok(FrameRect {
            x,
            y,
            w,
            h,
            rotated: self.rotated,
            trimmed: self.trimmed,
            source_size: self.source_size.unwrap_or(Size { w, h }),
            sprite_offset,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;

    const THREE_FRAMES: &str = r#"{
        "frames": {
            "Cherry.png": { "frame": { "x": 0, "y": 0, "w": 8, "h": 8 } },
            "bell.png": { "frame": { "x": 8, "y": 0, "w": 8, "h": 8 }, "rotated": false },
            "x": {
                "frame": { "x": 0, "y": 8, "w": 4, "h": 8 },
                "rotated": true,
                "trimmed": true,
                "spriteSourceSize": { "x": 1, "y": 2, "w": 4, "h": 8 },
                "sourceSize": { "w": 6, "h": 10 }
            }
        },
        "meta": { "image": "symbols.png", "size": { "w": 16, "h": 16 }, "scale": "1" }
    }"#;

    fn base(width: u32, height: u32) -> Arc<Texture> {
        Arc::new(
            Texture::from_rgba8(width, height, vec![0; (width * height * 4) as usize]).unwrap(),
        )
    }

    #[test]
    fn test_alias_key() {
        assert_eq!(alias_key("Symbols/Cherry.png"), "cherry");
        assert_eq!(alias_key("BELL"), "bell");
        assert_eq!(alias_key(".hidden"), ".hidden");
        assert_eq!(frame_key("reels", "bell"), "reels:bell");
    }

    #[test]
    fn test_descriptor_from_hash() {
        let atlas = AtlasDescriptor::from_json("reels", THREE_FRAMES.as_bytes()).unwrap();
        assert_eq!(atlas.frames.len(), 3);
        assert_eq!(atlas.base_image_ref, "symbols.png");
        assert_eq!(atlas.scale, 1.0);

        let rotated = atlas.frames["x"];
        assert!(rotated.rotated);
        assert!(rotated.trimmed);
        assert_eq!(rotated.packed_size(), (8, 4));
        assert_eq!(rotated.source_size, Size { w: 6, h: 10 });
        assert_eq!(rotated.sprite_offset, SpriteOffset { x: 1, y: 2, w: 4, h: 8 });
    }

    #[test]
    fn test_descriptor_from_array() {
        let json = r#"{
            "frames": [
                { "filename": "a", "frame": { "x": 0, "y": 0, "w": 2, "h": 2 } },
                { "filename": "b", "frame": { "x": 2, "y": 0, "w": 2, "h": 2 } }
            ],
            "meta": { "image": "ab.png", "scale": 0.5 }
        }"#;
        let atlas = AtlasDescriptor::from_json("ab", json.as_bytes()).unwrap();
        assert_eq!(atlas.frames.keys().collect::<Vec<_>>(), ["a", "b"]);
        assert_eq!(atlas.scale, 0.5);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{ "frames": [
            { "filename": "a", "frame": { "x": 0, "y": 0, "w": 2, "h": 2 } },
            { "filename": "a", "frame": { "x": 2, "y": 0, "w": 2, "h": 2 } }
        ] }"#;
        let err = AtlasDescriptor::from_json("dup", json.as_bytes()).unwrap_err();
        assert!(matches!(err, AssetError::MalformedAtlas { .. }));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_bad_rectangles_rejected() {
        for frame in [
            r#"{ "x": -1, "y": 0, "w": 2, "h": 2 }"#,
            r#"{ "x": 0, "y": 0, "w": 0, "h": 2 }"#,
            r#"{ "x": 0, "y": 0, "w": 2 }"#,
        ] {
            let json = format!(r#"{{ "frames": {{ "f": {{ "frame": {frame} }} }} }}"#);
            assert!(
                matches!(
                    AtlasDescriptor::from_json("bad", json.as_bytes()),
                    Err(AssetError::MalformedAtlas { .. })
                ),
                "accepted {frame}"
            );
        }
    }

    #[test]
    fn test_parse_is_idempotent() {
        let first = AtlasDescriptor::from_json("reels", THREE_FRAMES.as_bytes()).unwrap();
        let second = AtlasDescriptor::from_json("reels", THREE_FRAMES.as_bytes()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_parse_registers_frames_and_aliases() {
        let cache = Arc::new(AssetCache::new(1024 * 1024));
        let parser = AtlasParser::new(Arc::clone(&cache));

        let parsed =
            block_on(parser.parse("reels", THREE_FRAMES.as_bytes(), Some(base(16, 16)))).unwrap();

        assert!(!parsed.is_degraded());
        assert_eq!(parsed.frame_count(), 3);
        assert_eq!(parsed.alias_keys, ["cherry", "bell", "x"]);
        assert_eq!(cache.len(), 3);
        assert!(!cache.contains("cherry"));

        let cherry = cache.get_frame("reels", "Cherry.png").unwrap();
        assert!(cherry.ptr_eq(&cache.get_alias("cherry").unwrap()));
        assert_eq!(cherry.size_bytes(), 0);
        assert_eq!(cherry.as_frame().unwrap().pixel_bytes(), 8 * 8 * 4);

        // only "x" is registered; "X" falls back to lowercase
        assert!(cache.get_frame("reels", "x").is_some());
        assert!(cache.get_frame("reels", "X").is_some());
        assert!(cache.get_frame("reels", "missing").is_none());
    }

    #[test]
    fn test_uppercase_fallback() {
        let json = r#"{ "frames": { "WILD": { "frame": { "x": 0, "y": 0, "w": 1, "h": 1 } } } }"#;
        let cache = Arc::new(AssetCache::new(1024));
        let parser = AtlasParser::new(Arc::clone(&cache));
        block_on(parser.parse("reels", json.as_bytes(), Some(base(1, 1)))).unwrap();

        assert!(cache.get_frame("reels", "wild").is_some());
        assert!(cache.get_frame("reels", "Wild").is_some());
    }

    #[test]
    fn test_out_of_bounds_fails_whole_atlas() {
        let cache = Arc::new(AssetCache::new(1024 * 1024));
        let parser = AtlasParser::new(Arc::clone(&cache));

        let result = block_on(parser.parse("reels", THREE_FRAMES.as_bytes(), Some(base(12, 16))));
        assert!(matches!(result, Err(AssetError::MalformedAtlas { .. })));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_base_image_is_degraded() {
        let cache = Arc::new(AssetCache::new(1024 * 1024));
        let parser = AtlasParser::new(Arc::clone(&cache));

        let parsed = block_on(parser.parse("reels", THREE_FRAMES.as_bytes(), None)).unwrap();
        assert!(parsed.is_degraded());
        assert_eq!(parsed.frame_count(), 0);
        assert_eq!(parsed.descriptor.frames.len(), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_reparse_pins_existing_frames() {
        let cache = Arc::new(AssetCache::new(1024 * 1024));
        let parser = AtlasParser::new(Arc::clone(&cache)).with_namespace(Some("slots".into()));
        let texture = base(16, 16);

        let first =
            block_on(parser.parse("reels", THREE_FRAMES.as_bytes(), Some(Arc::clone(&texture))))
                .unwrap();
        let second =
            block_on(parser.parse("reels", THREE_FRAMES.as_bytes(), Some(texture))).unwrap();

        assert_eq!(first.frame_keys, second.frame_keys);
        assert_eq!(first.descriptor, second.descriptor);
        assert!(second.alias_keys.is_empty());
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.ref_count("reels:bell.png"), Some(2));
        assert_eq!(
            cache.entry_info("reels:bell.png").unwrap().namespace.as_deref(),
            Some("slots")
        );
    }
}
