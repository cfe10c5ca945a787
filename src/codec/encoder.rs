//! Raster → compressed bytes at a given quality.

use std::borrow::Cow;

use image::codecs::jpeg;
use image::ExtendedColorType;

use crate::config::defaults::{MAX_CODEC_QUALITY, MIN_CODEC_QUALITY};
use crate::error::CompressError;
use crate::model::{ChannelLayout, EncodedArtifact, RasterBuffer};

/// A lossy codec driven by a single quality knob.
///
/// Implementations must be deterministic: the same buffer and quality always
/// produce the same bytes. The search relies on this to never re-encode a
/// quality it has already measured.
pub trait Encoder: Send + Sync {
    fn encode(&self, buffer: &RasterBuffer, quality: u8) -> Result<EncodedArtifact, CompressError>;
}

/// Baseline JPEG through the `image` crate.
///
/// Alpha is composited onto white, since JPEG has no alpha channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct JpegEncoder;

impl JpegEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Encoder for JpegEncoder {
    fn encode(&self, buffer: &RasterBuffer, quality: u8) -> Result<EncodedArtifact, CompressError> {
        if !(MIN_CODEC_QUALITY..=MAX_CODEC_QUALITY).contains(&quality) {
            return Err(CompressError::Encode(format!(
                "quality {} outside {}..={}",
                quality, MIN_CODEC_QUALITY, MAX_CODEC_QUALITY
            )));
        }

        let (width, height) = buffer.dimensions();
        let (pixels, layout, color_type) = match buffer.layout() {
            ChannelLayout::Gray => (
                Cow::Borrowed(buffer.pixels()),
                ChannelLayout::Gray,
                ExtendedColorType::L8,
            ),
            ChannelLayout::Rgb => (
                Cow::Borrowed(buffer.pixels()),
                ChannelLayout::Rgb,
                ExtendedColorType::Rgb8,
            ),
            ChannelLayout::Rgba => (
                Cow::Owned(flatten_alpha(buffer.pixels())),
                ChannelLayout::Rgb,
                ExtendedColorType::Rgb8,
            ),
        };

        let mut out = Vec::new();
        let mut encoder = jpeg::JpegEncoder::new_with_quality(&mut out, quality);
        encoder
            .encode(&pixels, width, height, color_type)
            .map_err(|e| {
                CompressError::Encode(format!(
                    "JPEG encoding of {}x{} at quality {} failed: {}",
                    width, height, quality, e
                ))
            })?;

        Ok(EncodedArtifact::new(out, quality, width, height, layout))
    }
}

/// Composite RGBA over a white background into packed RGB
fn flatten_alpha(rgba: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for px in rgba.chunks_exact(4) {
        let alpha = px[3];
        for &channel in &px[..3] {
            rgb.push(blend_over_white(channel, alpha));
        }
    }
    rgb
}

#[inline]
fn blend_over_white(channel: u8, alpha: u8) -> u8 {
    let c = channel as u16;
    let a = alpha as u16;
    ((c * a + 255 * (255 - a) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32, layout: ChannelLayout) -> RasterBuffer {
        let channels = layout.channels();
        let mut pixels = Vec::with_capacity((width * height) as usize * channels);
        for y in 0..height {
            for x in 0..width {
                for c in 0..channels {
                    let v = if c == 3 { 255 } else { ((x * 7 + y * 13 + c as u32 * 31) % 256) as u8 };
                    pixels.push(v);
                }
            }
        }
        RasterBuffer::new(width, height, layout, pixels).unwrap()
    }

    #[test]
    fn test_encodes_jpeg() {
        let buf = gradient(32, 24, ChannelLayout::Rgb);
        let art = JpegEncoder.encode(&buf, 80).unwrap();
        assert!(art.bytes().starts_with(&[0xFF, 0xD8]));
        assert_eq!(art.quality(), 80);
        assert_eq!((art.width(), art.height()), (32, 24));
        assert_eq!(art.byte_len(), art.bytes().len() as u64);
    }

    #[test]
    fn test_rgba_is_flattened_to_rgb() {
        let buf = gradient(16, 16, ChannelLayout::Rgba);
        let art = JpegEncoder.encode(&buf, 70).unwrap();
        assert_eq!(art.layout(), ChannelLayout::Rgb);
    }

    #[test]
    fn test_gray_stays_gray() {
        let buf = gradient(16, 16, ChannelLayout::Gray);
        let art = JpegEncoder.encode(&buf, 70).unwrap();
        assert_eq!(art.layout(), ChannelLayout::Gray);
    }

    #[test]
    fn test_deterministic() {
        let buf = gradient(40, 30, ChannelLayout::Rgb);
        let a = JpegEncoder.encode(&buf, 55).unwrap();
        let b = JpegEncoder.encode(&buf, 55).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_rejects_out_of_range_quality() {
        let buf = gradient(8, 8, ChannelLayout::Rgb);
        assert!(matches!(
            JpegEncoder.encode(&buf, 0),
            Err(CompressError::Encode(_))
        ));
        assert!(matches!(
            JpegEncoder.encode(&buf, 101),
            Err(CompressError::Encode(_))
        ));
    }

    #[test]
    fn test_blend_over_white() {
        assert_eq!(blend_over_white(0, 0), 255);
        assert_eq!(blend_over_white(0, 255), 0);
        assert_eq!(blend_over_white(100, 255), 100);
    }
}
