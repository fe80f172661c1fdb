//! Decoded resources and the handles the cache hands out

use std::sync::Arc;

use bytes::Bytes;

use crate::atlas::{FrameRect, ParsedAtlas};
use crate::texture::{Texture, TextureError};

/// A decoded, in-memory asset
#[derive(Debug)]
pub enum Resource {
    /// Standalone bitmap
    Image(Arc<Texture>),
    /// Named sub-rectangle of an atlas base image
    Frame(FrameImage),
    /// Parsed atlas with its base image
    Atlas(ParsedAtlas),
    /// Skeletal animation package
    Skeleton(SkeletonPackage),
    /// Parsed structured data
    Data(StructuredData),
    /// Encoded audio, decoded later by the playback runtime
    Audio(AudioClip),
    /// Font file bytes
    Font(FontFace),
    /// Opaque payload
    Bytes(Bytes),
}

impl Resource {
    /// Estimated resident size in bytes.
    ///
    /// Bitmaps count `width * height * 4` and everything else counts its
    /// payload length. A frame counts nothing: its pixels belong to the
    /// base image, which the atlas entry already counts.
    pub fn estimated_size(&self) -> usize {
        match self {
            Resource::Image(texture) => texture.estimated_size(),
            Resource::Frame(_) => 0,
            Resource::Atlas(atlas) => atlas.estimated_size(),
            Resource::Skeleton(package) => package.estimated_size(),
            Resource::Data(data) => data.byte_len,
            Resource::Audio(clip) => clip.bytes.len(),
            Resource::Font(font) => font.bytes.len(),
            Resource::Bytes(bytes) => bytes.len(),
        }
    }

    /// Short type tag for logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Resource::Image(_) => "image",
            Resource::Frame(_) => "frame",
            Resource::Atlas(_) => "atlas",
            Resource::Skeleton(_) => "skeleton",
            Resource::Data(_) => "data",
            Resource::Audio(_) => "audio",
            Resource::Font(_) => "font",
            Resource::Bytes(_) => "bytes",
        }
    }
}

/// Shared reference to a cached [`Resource`]
///
/// Cloning is cheap. Holding a handle does not pin the cache entry; pinning
/// is done through the cache's ref count (`get_or_load` / `release`).
#[derive(Debug, Clone)]
pub struct ResourceHandle(Arc<Resource>);

impl ResourceHandle {
    pub fn new(resource: Resource) -> Self {
        Self(Arc::new(resource))
    }

    pub fn resource(&self) -> &Resource {
        &self.0
    }

    pub fn size_bytes(&self) -> usize {
        self.0.estimated_size()
    }

    /// Whether both handles point at the same allocation.
    pub fn ptr_eq(&self, other: &ResourceHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn as_image(&self) -> Option<&Arc<Texture>> {
        match self.resource() {
            Resource::Image(texture) => Some(texture),
            _ => None,
        }
    }

    pub fn as_frame(&self) -> Option<&FrameImage> {
        match self.resource() {
            Resource::Frame(frame) => Some(frame),
            _ => None,
        }
    }

    pub fn as_atlas(&self) -> Option<&ParsedAtlas> {
        match self.resource() {
            Resource::Atlas(atlas) => Some(atlas),
            _ => None,
        }
    }

    pub fn as_skeleton(&self) -> Option<&SkeletonPackage> {
        match self.resource() {
            Resource::Skeleton(package) => Some(package),
            _ => None,
        }
    }

    pub fn as_data(&self) -> Option<&serde_json::Value> {
        match self.resource() {
            Resource::Data(data) => Some(&data.value),
            _ => None,
        }
    }

    pub fn as_audio(&self) -> Option<&AudioClip> {
        match self.resource() {
            Resource::Audio(clip) => Some(clip),
            _ => None,
        }
    }

    pub fn as_font(&self) -> Option<&FontFace> {
        match self.resource() {
            Resource::Font(font) => Some(font),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self.resource() {
            Resource::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }
}

impl From<Resource> for ResourceHandle {
    fn from(resource: Resource) -> Self {
        Self::new(resource)
    }
}

/// One atlas frame
///
/// Shares the atlas base image; pixels are only copied on [`FrameImage::crop`].
#[derive(Debug, Clone)]
pub struct FrameImage {
    pub name: String,
    pub rect: FrameRect,
    pub base: Arc<Texture>,
}

impl FrameImage {
    /// Bytes of the frame's region inside the shared base image.
    pub fn pixel_bytes(&self) -> usize {
        self.rect.w as usize * self.rect.h as usize * 4
    }

    /// Copy this frame's packed pixels out of the base image.
    ///
    /// Rotated frames are returned as packed (not un-rotated).
    pub fn crop(&self) -> Result<Texture, TextureError> {
        let (w, h) = self.rect.packed_size();
        self.base.crop(self.rect.x, self.rect.y, w, h)
    }
}

/// Skeleton data, its text atlas and the atlas page images
#[derive(Debug, Clone)]
pub struct SkeletonPackage {
    /// Raw skeleton data (JSON or binary export)
    pub skeleton: Bytes,
    /// Text atlas describing the page regions
    pub atlas_text: String,
    /// Page images keyed by page name, in atlas order
    pub pages: Vec<(String, Arc<Texture>)>,
}

impl SkeletonPackage {
    pub fn estimated_size(&self) -> usize {
        self.skeleton.len()
            + self.atlas_text.len()
            + self
                .pages
                .iter()
                .map(|(_, texture)| texture.estimated_size())
                .sum::<usize>()
    }

    pub fn page(&self, name: &str) -> Option<&Arc<Texture>> {
        self.pages
            .iter()
            .find(|(page, _)| page == name)
            .map(|(_, texture)| texture)
    }
}

/// Parsed JSON with the length of its encoded form
#[derive(Debug, Clone)]
pub struct StructuredData {
    pub value: serde_json::Value,
    pub byte_len: usize,
}

/// Encoded audio and the locator variant that produced it
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub locator: String,
    pub bytes: Bytes,
}

/// Font file for a family
#[derive(Debug, Clone)]
pub struct FontFace {
    pub family: String,
    pub bytes: Bytes,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        let texture = Arc::new(Texture::from_rgba8(8, 8, vec![0; 256]).unwrap());
        let image = ResourceHandle::new(Resource::Image(Arc::clone(&texture)));
        assert_eq!(image.size_bytes(), 256);
        assert!(image.as_image().is_some());
        assert!(image.as_frame().is_none());

        let frame = ResourceHandle::new(Resource::Frame(FrameImage {
            name: "coin".into(),
            rect: FrameRect::new(0, 0, 2, 3),
            base: texture,
        }));
        assert_eq!(frame.size_bytes(), 0);
        assert_eq!(frame.as_frame().unwrap().pixel_bytes(), 2 * 3 * 4);

        let raw = ResourceHandle::new(Resource::Bytes(Bytes::from_static(b"abc")));
        assert_eq!(raw.size_bytes(), 3);
        assert_eq!(raw.resource().kind_name(), "bytes");
    }

    #[test]
    fn test_clone_shares_allocation() {
        let a = ResourceHandle::new(Resource::Bytes(Bytes::new()));
        let b = a.clone();
        let c = ResourceHandle::new(Resource::Bytes(Bytes::new()));
        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
    }

    #[test]
    fn test_frame_crop_uses_packed_size() {
        let texture = Arc::new(Texture::from_rgba8(4, 4, vec![7; 64]).unwrap());
        let mut rect = FrameRect::new(0, 0, 1, 3);
        rect.rotated = true;
        let frame = FrameImage {
            name: "r".into(),
            rect,
            base: texture,
        };
        let cropped = frame.crop().unwrap();
        assert_eq!((cropped.width, cropped.height), (3, 1));
    }
}
