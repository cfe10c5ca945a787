//! Dimension reduction for raster buffers.
//!
//! The rescaler only ever shrinks: factors above 1.0 are rejected. Resampling
//! goes through `fast_image_resize`, falling back to `image::imageops` if the
//! fast path fails.

use fast_image_resize as fr;
use image::imageops::FilterType;

use crate::config::defaults::DEFAULT_RESIZE_FILTER;
use crate::error::CompressError;
use crate::model::{ChannelLayout, RasterBuffer};

#[derive(Debug, Clone, Copy)]
pub struct Rescaler {
    filter: FilterType,
}

impl Default for Rescaler {
    fn default() -> Self {
        Self::new(DEFAULT_RESIZE_FILTER)
    }
}

impl Rescaler {
    pub fn new(filter: FilterType) -> Self {
        Self { filter }
    }

    /// Dimensions `rescale` would produce, without touching any pixels.
    ///
    /// With `lock_aspect` the longer side is scaled and the shorter side is
    /// derived from it, so the ratio survives rounding. Without it each axis
    /// is floored independently.
    pub fn target_dimensions(
        &self,
        width: u32,
        height: u32,
        factor: f64,
        lock_aspect: bool,
    ) -> Result<(u32, u32), CompressError> {
        check_factor(factor)?;

        let (new_width, new_height) = if !lock_aspect {
            (scale_axis(width, factor), scale_axis(height, factor))
        } else if width >= height {
            let w = scale_axis(width, factor);
            (w, (w as f64 * height as f64 / width as f64).round() as u32)
        } else {
            let h = scale_axis(height, factor);
            ((h as f64 * width as f64 / height as f64).round() as u32, h)
        };

        if new_width == 0 || new_height == 0 {
            return Err(CompressError::Rescale(format!(
                "scaling {}x{} by {:.3} collapses to {}x{}",
                width, height, factor, new_width, new_height
            )));
        }

        Ok((new_width, new_height))
    }

    /// Shrink both axes by `factor` in (0, 1].
    pub fn rescale(
        &self,
        buffer: &RasterBuffer,
        factor: f64,
        lock_aspect: bool,
    ) -> Result<RasterBuffer, CompressError> {
        let (width, height) =
            self.target_dimensions(buffer.width(), buffer.height(), factor, lock_aspect)?;
        self.resize_to(buffer, width, height)
    }

    /// Shrink each axis by its own factor.
    pub fn rescale_axes(
        &self,
        buffer: &RasterBuffer,
        factor_x: f64,
        factor_y: f64,
    ) -> Result<RasterBuffer, CompressError> {
        check_factor(factor_x)?;
        check_factor(factor_y)?;

        let width = scale_axis(buffer.width(), factor_x);
        let height = scale_axis(buffer.height(), factor_y);
        if width == 0 || height == 0 {
            return Err(CompressError::Rescale(format!(
                "scaling {}x{} by ({:.3}, {:.3}) collapses to {}x{}",
                buffer.width(),
                buffer.height(),
                factor_x,
                factor_y,
                width,
                height
            )));
        }

        self.resize_to(buffer, width, height)
    }

    /// Resample to exact dimensions, neither of which may exceed the source.
    pub fn resize_to(
        &self,
        buffer: &RasterBuffer,
        width: u32,
        height: u32,
    ) -> Result<RasterBuffer, CompressError> {
        if width == 0 || height == 0 {
            return Err(CompressError::Rescale(format!(
                "target dimensions {}x{} are degenerate",
                width, height
            )));
        }
        if width > buffer.width() || height > buffer.height() {
            return Err(CompressError::InvalidInput(format!(
                "refusing to upsample {}x{} to {}x{}",
                buffer.width(),
                buffer.height(),
                width,
                height
            )));
        }
        if (width, height) == buffer.dimensions() {
            return Ok(buffer.clone());
        }

        log::debug!(
            "Rescaling {}x{} -> {}x{} (filter={:?})",
            buffer.width(),
            buffer.height(),
            width,
            height,
            self.filter
        );

        match self.resize_with_fast_image_resize(buffer, width, height) {
            Ok(resized) => Ok(resized),
            Err(err) => {
                log::warn!(
                    "fast_image_resize failed, falling back to image::resize_exact: {}",
                    err
                );
                let resized = buffer
                    .clone()
                    .into_dynamic()
                    .resize_exact(width, height, self.filter);
                RasterBuffer::from_dynamic(resized)
            }
        }
    }

    fn resize_with_fast_image_resize(
        &self,
        buffer: &RasterBuffer,
        width: u32,
        height: u32,
    ) -> Result<RasterBuffer, CompressError> {
        let pixel_type = match buffer.layout() {
            ChannelLayout::Gray => fr::PixelType::U8,
            ChannelLayout::Rgb => fr::PixelType::U8x3,
            ChannelLayout::Rgba => fr::PixelType::U8x4,
        };

        let src_image = fr::images::Image::from_vec_u8(
            buffer.width(),
            buffer.height(),
            buffer.pixels().to_vec(),
            pixel_type,
        )
        .map_err(|e| CompressError::Rescale(format!("cannot wrap source buffer: {}", e)))?;

        let mut dst_image = fr::images::Image::new(width, height, pixel_type);

        let mut resizer = fr::Resizer::new();
        let options = fr::ResizeOptions::new()
            .resize_alg(fr::ResizeAlg::Convolution(to_fast_filter(self.filter)));

        resizer
            .resize(&src_image, &mut dst_image, Some(&options))
            .map_err(|e| CompressError::Rescale(format!("resize failed: {}", e)))?;

        RasterBuffer::new(width, height, buffer.layout(), dst_image.into_vec())
    }
}

fn check_factor(factor: f64) -> Result<(), CompressError> {
    if !(factor > 0.0 && factor <= 1.0) {
        return Err(CompressError::InvalidInput(format!(
            "scale factor must be in (0, 1], got {}",
            factor
        )));
    }
    Ok(())
}

fn scale_axis(length: u32, factor: f64) -> u32 {
    // Tolerate float error so that e.g. 0.3 * 10 lands on 3, not 2
    (length as f64 * factor + 1e-9).floor() as u32
}

fn to_fast_filter(filter: FilterType) -> fr::FilterType {
    match filter {
        FilterType::Nearest => fr::FilterType::Box,
        FilterType::Triangle => fr::FilterType::Bilinear,
        FilterType::CatmullRom => fr::FilterType::CatmullRom,
        FilterType::Gaussian => fr::FilterType::Mitchell,
        FilterType::Lanczos3 => fr::FilterType::Lanczos3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, layout: ChannelLayout) -> RasterBuffer {
        let len = (width * height) as usize * layout.channels();
        RasterBuffer::new(width, height, layout, vec![128; len]).unwrap()
    }

    #[test]
    fn test_locked_rescale_keeps_ratio() {
        let r = Rescaler::default();
        assert_eq!(r.target_dimensions(400, 300, 0.5, true).unwrap(), (200, 150));
        assert_eq!(r.target_dimensions(300, 400, 0.9, true).unwrap(), (270, 360));
    }

    #[test]
    fn test_unlocked_rescale_floors_each_axis() {
        let r = Rescaler::default();
        assert_eq!(r.target_dimensions(101, 33, 0.5, false).unwrap(), (50, 16));
    }

    #[test]
    fn test_rejects_upsampling_factor() {
        let r = Rescaler::default();
        let err = r.target_dimensions(100, 100, 1.5, true).unwrap_err();
        assert!(matches!(err, CompressError::InvalidInput(_)));
        assert!(r.target_dimensions(100, 100, 0.0, true).is_err());
    }

    #[test]
    fn test_collapse_to_zero_is_rescale_error() {
        let r = Rescaler::default();
        let err = r.target_dimensions(3, 3, 0.2, true).unwrap_err();
        assert!(matches!(err, CompressError::Rescale(_)));
    }

    #[test]
    fn test_rescale_produces_smaller_buffer() {
        let r = Rescaler::default();
        for layout in [ChannelLayout::Gray, ChannelLayout::Rgb, ChannelLayout::Rgba] {
            let out = r.rescale(&solid(64, 48, layout), 0.5, true).unwrap();
            assert_eq!(out.dimensions(), (32, 24));
            assert_eq!(out.layout(), layout);
        }
    }

    #[test]
    fn test_factor_one_is_identity() {
        let r = Rescaler::default();
        let src = solid(10, 10, ChannelLayout::Rgb);
        assert_eq!(r.rescale(&src, 1.0, true).unwrap(), src);
    }

    #[test]
    fn test_rescale_axes_independently() {
        let r = Rescaler::default();
        let out = r
            .rescale_axes(&solid(100, 80, ChannelLayout::Rgb), 1.0, 0.5)
            .unwrap();
        assert_eq!(out.dimensions(), (100, 40));
    }

    #[test]
    fn test_resize_to_refuses_upsample() {
        let r = Rescaler::default();
        let err = r
            .resize_to(&solid(10, 10, ChannelLayout::Gray), 11, 10)
            .unwrap_err();
        assert!(matches!(err, CompressError::InvalidInput(_)));
    }
}
