//! Texture decoding and cropping

use image::{ImageFormat, RgbaImage};
use thiserror::Error;

/// Error type for texture loading operations
#[derive(Error, Debug)]
pub enum TextureError {
    #[error("Image decoding error: {0}")]
    DecodeError(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Crop rectangle {x},{y} {w}x{h} exceeds {width}x{height} texture")]
    CropOutOfBounds {
        x: u32,
        y: u32,
        w: u32,
        h: u32,
        width: u32,
        height: u32,
    },
}

/// A decoded RGBA8 bitmap
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub format: TextureFormat,
}

/// Supported texture formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    Rgba8,
}

impl Texture {
    /// Wrap raw RGBA8 pixels.
    pub fn from_rgba8(width: u32, height: u32, data: Vec<u8>) -> Result<Self, TextureError> {
        let expected = width as usize * height as usize * 4;
        if data.len() != expected {
            return Err(TextureError::DecodeError(format!(
                "expected {expected} bytes for {width}x{height} RGBA8, got {}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            data,
            format: TextureFormat::Rgba8,
        })
    }

    /// Resident size estimate: `width * height * 4`.
    pub fn estimated_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Whether `x,y,w,h` lies fully inside this texture.
    pub fn contains(&self, x: u32, y: u32, w: u32, h: u32) -> bool {
        x.checked_add(w).is_some_and(|right| right <= self.width)
            && y.checked_add(h).is_some_and(|bottom| bottom <= self.height)
    }

    /// Copy a sub-rectangle into a new texture.
    pub fn crop(&self, x: u32, y: u32, w: u32, h: u32) -> Result<Texture, TextureError> {
        if !self.contains(x, y, w, h) {
            return Err(TextureError::CropOutOfBounds {
                x,
                y,
                w,
                h,
                width: self.width,
                height: self.height,
            });
        }

        let image = RgbaImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or_else(|| TextureError::DecodeError("pixel buffer size mismatch".into()))?;
        let cropped = image::imageops::crop_imm(&image, x, y, w, h).to_image();

        Ok(Texture {
            width: w,
            height: h,
            data: cropped.into_raw(),
            format: TextureFormat::Rgba8,
        })
    }
}

/// Decodes encoded image bytes into RGBA8 textures
#[derive(Default, Clone, Debug)]
pub struct TextureLoader;

impl TextureLoader {
    /// Create a new texture loader
    pub fn new() -> Self {
        Self
    }

    /// Load a texture from binary data
    pub fn load(&self, data: &[u8]) -> Result<Texture, TextureError> {
        let format =
            image::guess_format(data).map_err(|e| TextureError::DecodeError(e.to_string()))?;

        match format {
            ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::WebP => {}
            _ => {
                return Err(TextureError::UnsupportedFormat(format!(
                    "Only PNG, JPEG and WebP images are supported, got {:?}",
                    format.extensions_str()
                )))
            }
        }

        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| TextureError::DecodeError(e.to_string()))?;

        let rgba_img = img.into_rgba8();
        let (width, height) = rgba_img.dimensions();

        Ok(Texture {
            width,
            height,
            data: rgba_img.into_raw(),
            format: TextureFormat::Rgba8,
        })
    }
}

#[cfg(test)]
pub(crate) fn encode_png(width: u32, height: u32, rgba: [u8; 4]) -> Vec<u8> {
    let img = RgbaImage::from_pixel(width, height, image::Rgba(rgba));
    let mut png = Vec::new();
    img.write_to(&mut std::io::Cursor::new(&mut png), ImageFormat::Png)
        .expect("Failed to encode test image");
    png
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_jpeg() {
        let loader = TextureLoader::new();

        let img = image::RgbImage::from_pixel(1, 1, image::Rgb([255, 255, 255]));
        let mut jpeg_data = Vec::new();
        img.write_to(
            &mut std::io::Cursor::new(&mut jpeg_data),
            image::ImageFormat::Jpeg,
        )
        .expect("Failed to encode test image");

        let result = loader.load(&jpeg_data);
        assert!(result.is_ok(), "Failed to load JPEG: {:?}", result.err());

        let texture = result.unwrap();
        assert_eq!(texture.width, 1);
        assert_eq!(texture.height, 1);
        assert_eq!(texture.format, TextureFormat::Rgba8);
    }

    #[test]
    fn test_load_png() {
        let loader = TextureLoader::new();
        let texture = loader.load(&encode_png(4, 2, [255, 0, 0, 255])).unwrap();

        assert_eq!(texture.width, 4);
        assert_eq!(texture.height, 2);
        assert_eq!(texture.estimated_size(), 32);
        assert_eq!(&texture.data[..4], &[255, 0, 0, 255]);
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let loader = TextureLoader::new();
        assert!(matches!(
            loader.load(b"definitely not an image"),
            Err(TextureError::DecodeError(_))
        ));
    }

    #[test]
    fn test_crop() {
        let mut data = vec![0u8; 4 * 4 * 4];
        // pixel (2, 1) is white
        let offset = (4 + 2) * 4;
        data[offset..offset + 4].copy_from_slice(&[255; 4]);
        let texture = Texture::from_rgba8(4, 4, data).unwrap();

        let cropped = texture.crop(2, 1, 2, 2).unwrap();
        assert_eq!((cropped.width, cropped.height), (2, 2));
        assert_eq!(&cropped.data[..4], &[255; 4]);
        assert_eq!(&cropped.data[4..8], &[0; 4]);

        assert!(matches!(
            texture.crop(3, 3, 2, 1),
            Err(TextureError::CropOutOfBounds { .. })
        ));
    }
}
