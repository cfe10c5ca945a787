//! Page rendering for the rasterize pass.
//!
//! The pure-Rust [`EmbeddedImageRenderer`] handles scanned documents, where
//! each page is exactly one image painted over the whole MediaBox. Anything
//! else needs a real rasterizer; with the `pdfium` feature enabled,
//! [`PdfiumRenderer`] renders any page through the pdfium library.

use image::imageops::FilterType;
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::error::CompressError;
use crate::model::RasterBuffer;

use super::images::{decode_image_stream, is_image_xobject};

/// Points of slack allowed when checking that an image covers the page
const COVER_TOLERANCE: f32 = 1.0;

/// Graphics-state and marked-content operators; none of them paint
const STATE_OPERATORS: [&str; 13] = [
    "w", "J", "j", "M", "d", "ri", "i", "gs", "BMC", "BDC", "EMC", "MP", "DP",
];

#[cfg(feature = "pdfium")]
pub use self::pdfium::PdfiumRenderer;

/// Parent-chain depth limit when resolving inherited page attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Text-showing operators
const TEXT_OPERATORS: [&str; 4] = ["Tj", "TJ", "'", "\""];

/// An opened document, ready to render page by page.
pub trait PageSource {
    fn page_count(&self) -> usize;

    /// Render page `page_index` (0-based) at `scale` (1.0 = one pixel per point)
    fn render_page(&self, page_index: usize, scale: f32) -> Result<RasterBuffer, CompressError>;
}

/// Turns document bytes into page rasters.
pub trait PageRenderer {
    fn name(&self) -> &'static str;

    /// Parse `document` once for repeated page rendering.
    fn open<'a>(&'a self, document: &'a [u8]) -> Result<Box<dyn PageSource + 'a>, CompressError>;

    /// Render a single page without keeping the document open.
    fn render_page(
        &self,
        document: &[u8],
        page_index: usize,
        scale: f32,
    ) -> Result<RasterBuffer, CompressError> {
        self.open(document)?.render_page(page_index, scale)
    }
}

/// Best renderer this build can offer.
pub fn default_renderer() -> Box<dyn PageRenderer> {
    #[cfg(feature = "pdfium")]
    {
        match PdfiumRenderer::new() {
            Ok(renderer) => return Box::new(renderer),
            Err(e) => log::warn!("{}; falling back to the embedded-image renderer", e),
        }
    }

    Box::new(EmbeddedImageRenderer)
}

/// Renders scanned pages by resampling their one full-page image.
///
/// A page qualifies when its content paints a single image XObject whose
/// placement covers the MediaBox and nothing else. Pages with text, vector
/// drawing, several images or a partially placed image are refused with a
/// `Render` error rather than approximated.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddedImageRenderer;

struct EmbeddedPages {
    doc: Document,
    pages: Vec<ObjectId>,
}

impl PageRenderer for EmbeddedImageRenderer {
    fn name(&self) -> &'static str {
        "embedded-image"
    }

    fn open<'a>(&'a self, document: &'a [u8]) -> Result<Box<dyn PageSource + 'a>, CompressError> {
        let doc = Document::load_mem(document)
            .map_err(|e| CompressError::InvalidInput(format!("cannot parse PDF: {}", e)))?;
        let pages = doc.get_pages().into_values().collect();
        Ok(Box::new(EmbeddedPages { doc, pages }))
    }
}

impl PageSource for EmbeddedPages {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(&self, page_index: usize, scale: f32) -> Result<RasterBuffer, CompressError> {
        let page_id = *self
            .pages
            .get(page_index)
            .ok_or_else(|| CompressError::render(page_index, "no such page"))?;

        if self.draws_text(page_id) {
            return Err(CompressError::render(
                page_index,
                "page draws text; rebuild with the `pdfium` feature to rasterize it",
            ));
        }

        let media_box = self
            .media_box(page_id)
            .ok_or_else(|| CompressError::render(page_index, "missing or malformed MediaBox"))?;
        let width = ((media_box.width() * scale).round() as u32).max(1);
        let height = ((media_box.height() * scale).round() as u32).max(1);

        let stream = self.full_page_image(page_id, &media_box).map_err(|why| {
            CompressError::render(
                page_index,
                format!(
                    "{}; rebuild with the `pdfium` feature to rasterize it",
                    why
                ),
            )
        })?;
        let image = decode_image_stream(stream)
            .map_err(|e| CompressError::render(page_index, e.to_string()))?;

        log::debug!(
            "Page {}: {}x{} image -> {}x{} px",
            page_index + 1,
            image.width(),
            image.height(),
            width,
            height
        );

        if image.dimensions() == (width, height) {
            return Ok(image);
        }
        let resized = image
            .into_dynamic()
            .resize_exact(width, height, FilterType::Triangle);
        RasterBuffer::from_dynamic(resized)
    }
}

impl EmbeddedPages {
    /// Look up `key` on the page or the nearest ancestor that has it
    fn inherited(&self, page_id: ObjectId, key: &[u8]) -> Option<&Object> {
        let mut node = self.doc.get_dictionary(page_id).ok()?;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = node.get(key) {
                return self.doc.dereference(value).ok().map(|(_, object)| object);
            }
            let parent = node.get(b"Parent").and_then(Object::as_reference).ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    fn media_box(&self, page_id: ObjectId) -> Option<PageBox> {
        let values = self.inherited(page_id, b"MediaBox")?.as_array().ok()?;
        if values.len() != 4 {
            return None;
        }
        let mut numbers = [0.0f32; 4];
        for (slot, value) in numbers.iter_mut().zip(values) {
            *slot = number(self.doc.dereference(value).ok()?.1)?;
        }
        let page_box = PageBox {
            x0: numbers[0].min(numbers[2]),
            y0: numbers[1].min(numbers[3]),
            x1: numbers[0].max(numbers[2]),
            y1: numbers[1].max(numbers[3]),
        };
        (page_box.width() > 0.0 && page_box.height() > 0.0).then_some(page_box)
    }

    fn draws_text(&self, page_id: ObjectId) -> bool {
        let Ok(bytes) = self.doc.get_page_content(page_id) else {
            return false;
        };
        match Content::decode(&bytes) {
            Ok(content) => content
                .operations
                .iter()
                .any(|op| TEXT_OPERATORS.contains(&op.operator.as_str())),
            // Unparseable content might draw anything
            Err(_) => true,
        }
    }

    fn xobjects(&self, page_id: ObjectId) -> Option<&Dictionary> {
        let resources = self.inherited(page_id, b"Resources")?.as_dict().ok()?;
        let xobjects = resources.get(b"XObject").ok()?;
        self.doc.dereference(xobjects).ok()?.1.as_dict().ok()
    }

    /// The single image the page paints, provided it covers `media_box`.
    ///
    /// Errors describe why the page is not a plain scan.
    fn full_page_image(&self, page_id: ObjectId, media_box: &PageBox) -> Result<&Stream, String> {
        let bytes = self
            .doc
            .get_page_content(page_id)
            .map_err(|e| format!("cannot read page content: {}", e))?;
        let content =
            Content::decode(&bytes).map_err(|e| format!("cannot parse page content: {}", e))?;

        let mut ctm = Matrix::IDENTITY;
        let mut saved = Vec::new();
        let mut painted: Option<(&Stream, Matrix)> = None;

        for op in &content.operations {
            match op.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(Matrix::IDENTITY),
                "cm" => {
                    let values: Option<Vec<f32>> = op.operands.iter().map(number).collect();
                    match values.as_deref() {
                        Some(&[a, b, c, d, e, f]) => {
                            ctm = Matrix { a, b, c, d, e, f }.then(&ctm);
                        }
                        _ => return Err("malformed cm operator".to_string()),
                    }
                }
                "Do" => {
                    if painted.is_some() {
                        return Err("page paints more than one XObject".to_string());
                    }
                    let name = op
                        .operands
                        .first()
                        .and_then(|o| o.as_name().ok())
                        .ok_or("malformed Do operator")?;
                    let stream = self
                        .xobjects(page_id)
                        .and_then(|x| x.get(name).ok())
                        .and_then(|o| self.doc.dereference(o).ok())
                        .and_then(|(_, o)| o.as_stream().ok())
                        .ok_or("page references a missing XObject")?;
                    if !is_image_xobject(&stream.dict) {
                        return Err("page paints a form XObject".to_string());
                    }
                    painted = Some((stream, ctm));
                }
                op if STATE_OPERATORS.contains(&op) => {}
                other => return Err(format!("page draws vector content ({})", other)),
            }
        }

        let (stream, placement) = painted.ok_or("page paints no image")?;
        if !placement.covers(media_box) {
            return Err("page image does not cover the whole page".to_string());
        }
        Ok(stream)
    }
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r as f32),
        _ => None,
    }
}

/// Normalized page rectangle in default user space
#[derive(Debug, Clone, Copy)]
struct PageBox {
    x0: f32,
    y0: f32,
    x1: f32,
    y1: f32,
}

impl PageBox {
    fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    fn height(&self) -> f32 {
        self.y1 - self.y0
    }
}

/// PDF transformation matrix `[a b c d e f]`
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix {
    a: f32,
    b: f32,
    c: f32,
    d: f32,
    e: f32,
    f: f32,
}

impl Matrix {
    const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// `self` applied first, then `outer`
    fn then(&self, outer: &Matrix) -> Matrix {
        Matrix {
            a: self.a * outer.a + self.b * outer.c,
            b: self.a * outer.b + self.b * outer.d,
            c: self.c * outer.a + self.d * outer.c,
            d: self.c * outer.b + self.d * outer.d,
            e: self.e * outer.a + self.f * outer.c + outer.e,
            f: self.e * outer.b + self.f * outer.d + outer.f,
        }
    }

    /// Whether the unit square, mapped upright and unflipped, covers `page`
    fn covers(&self, page: &PageBox) -> bool {
        let upright = self.b.abs() < 1e-4 && self.c.abs() < 1e-4 && self.a > 0.0 && self.d > 0.0;
        upright
            && self.e <= page.x0 + COVER_TOLERANCE
            && self.f <= page.y0 + COVER_TOLERANCE
            && self.e + self.a >= page.x1 - COVER_TOLERANCE
            && self.f + self.d >= page.y1 - COVER_TOLERANCE
    }
}

#[cfg(feature = "pdfium")]
mod pdfium {
    use pdfium_render::prelude::*;

    use super::{PageRenderer, PageSource};
    use crate::error::CompressError;
    use crate::model::RasterBuffer;

    /// Full page rasterization through the system pdfium library.
    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    impl PdfiumRenderer {
        pub fn new() -> Result<Self, CompressError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|e| {
                CompressError::render(0, format!("pdfium library not available: {}", e))
            })?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    struct PdfiumPages<'a> {
        document: PdfDocument<'a>,
    }

    impl PageRenderer for PdfiumRenderer {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn open<'a>(
            &'a self,
            document: &'a [u8],
        ) -> Result<Box<dyn PageSource + 'a>, CompressError> {
            let document = self
                .pdfium
                .load_pdf_from_byte_slice(document, None)
                .map_err(|e| CompressError::InvalidInput(format!("pdfium cannot open PDF: {}", e)))?;
            Ok(Box::new(PdfiumPages { document }))
        }
    }

    impl PageSource for PdfiumPages<'_> {
        fn page_count(&self) -> usize {
            self.document.pages().len() as usize
        }

        fn render_page(
            &self,
            page_index: usize,
            scale: f32,
        ) -> Result<RasterBuffer, CompressError> {
            let index = u16::try_from(page_index)
                .map_err(|_| CompressError::render(page_index, "page index out of range"))?;
            let page = self
                .document
                .pages()
                .get(index)
                .map_err(|e| CompressError::render(page_index, e.to_string()))?;

            let config = PdfRenderConfig::new().scale_page_by_factor(scale);
            let bitmap = page
                .render_with_config(&config)
                .map_err(|e| CompressError::render(page_index, e.to_string()))?;

            RasterBuffer::from_dynamic(bitmap.as_image())
        }
    }
}
