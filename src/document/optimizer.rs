//! Pass 1: shrink a PDF without touching its page geometry.
//!
//! Embedded raster images are recompressed at a fixed quality and the object
//! graph is cleaned up. Text and vector content are left exactly as they are.

use lopdf::{Document, Object};

use crate::codec::Encoder;
use crate::error::CompressError;
use crate::model::ChannelLayout;

use super::images::{decode_image_stream, is_image_xobject};

#[derive(Debug, Clone)]
pub struct OptimizedDocument {
    pub bytes: Vec<u8>,
    pub achieved_bytes: u64,
    pub page_count: usize,
    pub images_recompressed: usize,
    /// Encoder calls made while recompressing
    pub attempts: u32,
}

pub struct DocumentOptimizer<'a> {
    encoder: &'a dyn Encoder,
}

impl<'a> DocumentOptimizer<'a> {
    pub fn new(encoder: &'a dyn Encoder) -> Self {
        Self { encoder }
    }

    /// Recompress images at `quality`, then prune and compress the document.
    ///
    /// Never returns a document larger than `document`: if the rewrite does
    /// not help, the input bytes come back unchanged.
    pub fn optimize(
        &self,
        document: &[u8],
        quality: u8,
    ) -> Result<OptimizedDocument, CompressError> {
        let mut doc = Document::load_mem(document)
            .map_err(|e| CompressError::InvalidInput(format!("cannot parse PDF: {}", e)))?;

        let page_count = doc.get_pages().len();
        if page_count == 0 {
            return Err(CompressError::InvalidInput(
                "document has no pages".to_string(),
            ));
        }

        log::info!(
            "Optimizing {}-page document ({} bytes) at quality {}",
            page_count,
            document.len(),
            quality
        );

        let (images_recompressed, attempts) = self.recompress_images(&mut doc, quality)?;

        let pruned = doc.prune_objects();
        let emptied = doc.delete_zero_length_streams();
        doc.compress();
        doc.renumber_objects();
        log::debug!(
            "Recompressed {} images, pruned {} objects, dropped {} empty streams",
            images_recompressed,
            pruned.len(),
            emptied.len()
        );

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)
            .map_err(|e| CompressError::Io(std::io::Error::other(e.to_string())))?;

        if bytes.len() >= document.len() {
            log::info!(
                "Optimized output ({} bytes) is not smaller; keeping the original",
                bytes.len()
            );
            bytes = document.to_vec();
        } else {
            log::info!("Optimized {} -> {} bytes", document.len(), bytes.len());
        }

        Ok(OptimizedDocument {
            achieved_bytes: bytes.len() as u64,
            bytes,
            page_count,
            images_recompressed,
            attempts,
        })
    }

    /// Re-encode every decodable image XObject; returns (replaced, encodes).
    fn recompress_images(
        &self,
        doc: &mut Document,
        quality: u8,
    ) -> Result<(usize, u32), CompressError> {
        let mut replaced = 0;
        let mut attempts = 0;

        for (id, object) in doc.objects.iter_mut() {
            let Object::Stream(stream) = object else {
                continue;
            };
            if !is_image_xobject(&stream.dict) {
                continue;
            }

            let buffer = match decode_image_stream(stream) {
                Ok(buffer) => buffer,
                Err(e) => {
                    log::warn!("Skipping image {} {}: {}", id.0, id.1, e);
                    continue;
                }
            };

            let artifact = self.encoder.encode(&buffer, quality)?;
            attempts += 1;
            if artifact.byte_len() >= stream.content.len() as u64 {
                log::debug!(
                    "Image {} {}: re-encode ({} bytes) is not smaller than {} bytes",
                    id.0,
                    id.1,
                    artifact.byte_len(),
                    stream.content.len()
                );
                continue;
            }

            log::debug!(
                "Image {} {}: {} -> {} bytes",
                id.0,
                id.1,
                stream.content.len(),
                artifact.byte_len()
            );

            let color_space = match artifact.layout() {
                ChannelLayout::Gray => "DeviceGray",
                _ => "DeviceRGB",
            };
            stream.dict.set("Filter", "DCTDecode");
            stream.dict.set("ColorSpace", color_space);
            stream.dict.set("BitsPerComponent", 8);
            stream.dict.remove(b"DecodeParms");
            stream.set_content(artifact.into_bytes());
            stream.allows_compression = false;
            replaced += 1;
        }

        Ok((replaced, attempts))
    }
}
