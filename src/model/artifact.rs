use super::ChannelLayout;

/// Bytes produced by one encoder call.
///
/// Records the quality that produced it together with the pixel geometry
/// written into the bitstream, so a page can be embedded without decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedArtifact {
    bytes: Vec<u8>,
    quality: u8,
    width: u32,
    height: u32,
    layout: ChannelLayout,
}

impl EncodedArtifact {
    pub fn new(bytes: Vec<u8>, quality: u8, width: u32, height: u32, layout: ChannelLayout) -> Self {
        Self {
            bytes,
            quality,
            width,
            height,
            layout,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Layout of the encoded stream (never `Rgba` for JPEG output)
    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }
}
