//! Image XObjects inside a PDF: which ones we can decode, and how.

use image::ImageFormat;
use lopdf::{Dictionary, Object, Stream};

use crate::error::CompressError;
use crate::model::{ChannelLayout, RasterBuffer};

/// How the stored bytes of an image stream are encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEncoding {
    Raw,
    Flate,
    Dct,
}

pub fn is_image_xobject(dict: &Dictionary) -> bool {
    dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice())
}

/// Single filter on the stream, if it is one we handle.
///
/// Filter chains are not supported; `[/FlateDecode]` counts as a single filter.
pub fn stream_encoding(dict: &Dictionary) -> Option<StreamEncoding> {
    let filter = match dict.get(b"Filter") {
        Err(_) => return Some(StreamEncoding::Raw),
        Ok(Object::Name(name)) => name.as_slice(),
        Ok(Object::Array(filters)) if filters.len() == 1 => filters[0].as_name().ok()?,
        Ok(_) => return None,
    };

    match filter {
        b"FlateDecode" => Some(StreamEncoding::Flate),
        b"DCTDecode" => Some(StreamEncoding::Dct),
        _ => None,
    }
}

fn color_layout(dict: &Dictionary) -> Option<ChannelLayout> {
    match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) if name == b"DeviceRGB" => Some(ChannelLayout::Rgb),
        Ok(Object::Name(name)) if name == b"DeviceGray" => Some(ChannelLayout::Gray),
        _ => None,
    }
}

fn positive_int(dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match dict.get(key).and_then(Object::as_i64) {
        Ok(value) if value > 0 => u32::try_from(value).ok(),
        _ => None,
    }
}

/// Decode an image XObject into pixels.
///
/// Handles 8-bit DeviceRGB and DeviceGray, stored raw, Flate-compressed or
/// as DCT. Image masks, indexed/ICC colour, soft masks and other bit depths
/// are reported as `InvalidInput` and left alone by callers.
pub fn decode_image_stream(stream: &Stream) -> Result<RasterBuffer, CompressError> {
    let dict = &stream.dict;
    let unsupported = |why: &str| Err(CompressError::InvalidInput(why.to_string()));

    if !is_image_xobject(dict) {
        return unsupported("not an image XObject");
    }
    if matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true))) {
        return unsupported("image masks are not recompressed");
    }
    if dict.get(b"SMask").is_ok() || dict.get(b"Mask").is_ok() {
        return unsupported("masked images are not recompressed");
    }
    let bits = dict
        .get(b"BitsPerComponent")
        .and_then(Object::as_i64)
        .unwrap_or(8);
    if bits != 8 {
        return Err(CompressError::InvalidInput(format!(
            "{} bits per component is not supported",
            bits
        )));
    }

    let (Some(width), Some(height)) = (positive_int(dict, b"Width"), positive_int(dict, b"Height"))
    else {
        return unsupported("missing or invalid image dimensions");
    };
    let Some(layout) = color_layout(dict) else {
        return unsupported("only DeviceRGB and DeviceGray are supported");
    };

    match stream_encoding(dict) {
        Some(StreamEncoding::Dct) => {
            let decoded = image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
                .map_err(|e| CompressError::InvalidInput(format!("bad DCT stream: {}", e)))?;
            RasterBuffer::from_dynamic(decoded)
        }
        Some(encoding) => {
            let samples = match encoding {
                StreamEncoding::Flate => stream.decompressed_content().map_err(|e| {
                    CompressError::InvalidInput(format!("bad Flate stream: {}", e))
                })?,
                _ => stream.content.clone(),
            };

            let expected = (width as usize)
                .checked_mul(height as usize)
                .and_then(|n| n.checked_mul(layout.channels()))
                .ok_or_else(|| {
                    CompressError::InvalidInput(format!(
                        "{}x{} {} image is too large",
                        width, height, layout
                    ))
                })?;
            if samples.len() < expected {
                return Err(CompressError::InvalidInput(format!(
                    "{}x{} {} image needs {} bytes, stream has {}",
                    width,
                    height,
                    layout,
                    expected,
                    samples.len()
                )));
            }
            let mut samples = samples;
            samples.truncate(expected);
            RasterBuffer::new(width, height, layout, samples)
        }
        None => unsupported("unsupported filter"),
    }
}
