use std::fmt;

/// What kind of source the caller handed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// A single raster image in any format the `image` crate decodes
    Image,
    /// A paginated PDF document
    Document,
}

impl InputKind {
    /// Sniff the kind from the leading bytes.
    ///
    /// Anything that does not carry the `%PDF` magic is treated as an image;
    /// the image decoder reports a proper error if it is not one.
    pub fn detect(bytes: &[u8]) -> Self {
        let head = &bytes[..bytes.len().min(1024)];
        if head.windows(4).any(|w| w == b"%PDF") {
            InputKind::Document
        } else {
            InputKind::Image
        }
    }
}

impl fmt::Display for InputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputKind::Image => write!(f, "image"),
            InputKind::Document => write!(f, "document"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_pdf_magic() {
        assert_eq!(InputKind::detect(b"%PDF-1.7\n..."), InputKind::Document);
    }

    #[test]
    fn test_detect_pdf_after_leading_garbage() {
        assert_eq!(InputKind::detect(b"\xef\xbb\xbf%PDF-1.4"), InputKind::Document);
    }

    #[test]
    fn test_detect_image() {
        assert_eq!(InputKind::detect(&[0xFF, 0xD8, 0xFF, 0xE0]), InputKind::Image);
        assert_eq!(InputKind::detect(&[]), InputKind::Image);
    }
}
