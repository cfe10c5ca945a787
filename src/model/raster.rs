use std::fmt;

use image::{DynamicImage, GenericImageView, GrayImage, RgbImage, RgbaImage};

use crate::error::CompressError;

/// Color-channel layout of a decoded pixel buffer (8 bits per channel).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Gray,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn channels(&self) -> usize {
        match self {
            ChannelLayout::Gray => 1,
            ChannelLayout::Rgb => 3,
            ChannelLayout::Rgba => 4,
        }
    }
}

impl fmt::Display for ChannelLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelLayout::Gray => write!(f, "gray"),
            ChannelLayout::Rgb => write!(f, "rgb"),
            ChannelLayout::Rgba => write!(f, "rgba"),
        }
    }
}

/// Decoded, row-major pixel data.
///
/// A buffer is always structurally valid: both dimensions are non-zero and
/// `pixels.len() == width * height * channels`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    pixels: Vec<u8>,
}

impl RasterBuffer {
    pub fn new(
        width: u32,
        height: u32,
        layout: ChannelLayout,
        pixels: Vec<u8>,
    ) -> Result<Self, CompressError> {
        if width == 0 || height == 0 {
            return Err(CompressError::InvalidInput(format!(
                "raster dimensions must be non-zero, got {}x{}",
                width, height
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|px| px.checked_mul(layout.channels()))
            .ok_or_else(|| {
                CompressError::InvalidInput(format!(
                    "raster dimensions overflow: {}x{}",
                    width, height
                ))
            })?;

        if pixels.len() != expected {
            return Err(CompressError::InvalidInput(format!(
                "{}x{} {} buffer needs {} bytes, got {}",
                width,
                height,
                layout,
                expected,
                pixels.len()
            )));
        }

        Ok(Self {
            width,
            height,
            layout,
            pixels,
        })
    }

    /// Decode any image format the `image` crate understands.
    pub fn decode(bytes: &[u8]) -> Result<Self, CompressError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| CompressError::InvalidInput(format!("cannot decode image: {}", e)))?;
        Self::from_dynamic(img)
    }

    /// Convert a decoded image, keeping grayscale and alpha where present.
    pub fn from_dynamic(img: DynamicImage) -> Result<Self, CompressError> {
        let (width, height) = img.dimensions();
        let color = img.color();

        if color.has_alpha() {
            Self::new(width, height, ChannelLayout::Rgba, img.into_rgba8().into_raw())
        } else if !color.has_color() {
            Self::new(width, height, ChannelLayout::Gray, img.into_luma8().into_raw())
        } else {
            Self::new(width, height, ChannelLayout::Rgb, img.into_rgb8().into_raw())
        }
    }

    pub fn into_dynamic(self) -> DynamicImage {
        let (width, height) = (self.width, self.height);
        // Lengths were validated in `new`, so the `from_raw` calls cannot fail.
        match self.layout {
            ChannelLayout::Gray => GrayImage::from_raw(width, height, self.pixels)
                .map(DynamicImage::ImageLuma8),
            ChannelLayout::Rgb => {
                RgbImage::from_raw(width, height, self.pixels).map(DynamicImage::ImageRgb8)
            }
            ChannelLayout::Rgba => {
                RgbaImage::from_raw(width, height, self.pixels).map(DynamicImage::ImageRgba8)
            }
        }
        .unwrap_or_else(|| DynamicImage::new_rgb8(width, height))
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel_count(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}
