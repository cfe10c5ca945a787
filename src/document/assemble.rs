//! Builds the rasterized output PDF, one full-bleed image per page.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use crate::error::CompressError;
use crate::model::{ChannelLayout, EncodedArtifact};

pub struct PdfAssembler {
    doc: Document,
    pages_id: ObjectId,
    kids: Vec<Object>,
}

impl Default for PdfAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfAssembler {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            kids: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Append a page whose MediaBox is the image's pixel size.
    ///
    /// The JPEG bytes are embedded as-is under `DCTDecode`.
    pub fn add_page(&mut self, artifact: &EncodedArtifact) -> Result<ObjectId, CompressError> {
        let width = artifact.width() as i64;
        let height = artifact.height() as i64;
        let color_space = match artifact.layout() {
            ChannelLayout::Gray => "DeviceGray",
            _ => "DeviceRGB",
        };

        let image = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width,
                "Height" => height,
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            artifact.bytes().to_vec(),
        )
        .with_compression(false);
        let image_id = self.doc.add_object(image);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        width.into(),
                        0.into(),
                        0.into(),
                        height.into(),
                        0.into(),
                        0.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode().map_err(|e| {
            CompressError::Encode(format!("cannot encode page content: {}", e))
        })?;
        let content_id = self.doc.add_object(Stream::new(Dictionary::new(), content_bytes));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
            "Contents" => content_id,
        });
        self.kids.push(page_id.into());

        Ok(page_id)
    }

    /// Close the page tree and serialize.
    pub fn finish(mut self) -> Result<Vec<u8>, CompressError> {
        let count = self.kids.len() as i64;
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => self.kids,
            "Count" => count,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);
        self.doc.compress();

        let mut bytes = Vec::new();
        self.doc
            .save_to(&mut bytes)
            .map_err(|e| CompressError::Io(std::io::Error::other(e.to_string())))?;
        Ok(bytes)
    }
}
