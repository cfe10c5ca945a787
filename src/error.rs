use thiserror::Error;

/// Errors that abort a compression request.
///
/// Missing the byte budget is not an error: it is reported through
/// [`crate::model::OutcomeStatus::BestEffortOverTarget`].
#[derive(Error, Debug)]
pub enum CompressError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Rescale error: {0}")]
    Rescale(String),

    #[error("Failed to render page {page}: {message}")]
    Render { page: usize, message: String },

    #[error("Compression cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CompressError {
    pub fn render(page: usize, message: impl Into<String>) -> Self {
        CompressError::Render {
            page,
            message: message.into(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid aspect ratio: {0}")]
    InvalidAspectRatio(String),
}
