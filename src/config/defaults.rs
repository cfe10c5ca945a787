use image::imageops::FilterType;

/// Lowest quality the search is allowed to try
pub const DEFAULT_MIN_QUALITY: u8 = 30;

/// Highest quality the search is allowed to try
pub const DEFAULT_MAX_QUALITY: u8 = 95;

/// Step used when the search falls back to a linear scan
pub const DEFAULT_QUALITY_STEP: u8 = 5;

/// Binary-search iteration cap (a 1..=100 window collapses in 7)
pub const DEFAULT_MAX_SEARCH_ITERATIONS: u32 = 8;

/// Untried qualities probed above the best candidate
pub const DEFAULT_NEIGHBOR_PROBE: u8 = 2;

/// Per-step shrink factor when quality alone cannot meet the target
pub const DEFAULT_SCALE_STEP: f64 = 0.9;

/// Smallest scale (relative to the source) the image path will try
pub const DEFAULT_SCALE_FLOOR: f64 = 0.1;

/// Render scale for rasterized pages (1.0 = 72 dpi)
pub const DEFAULT_RENDER_SCALE: f32 = 0.7;

/// Largest accepted render scale (576 dpi)
pub const MAX_RENDER_SCALE: f32 = 8.0;

/// Quality used when recompressing embedded images in the optimize pass
pub const DEFAULT_OPTIMIZE_QUALITY: u8 = 85;

/// Resampling filter for dimension reduction
pub const DEFAULT_RESIZE_FILTER: FilterType = FilterType::Lanczos3;

/// Valid codec quality range
pub const MIN_CODEC_QUALITY: u8 = 1;
pub const MAX_CODEC_QUALITY: u8 = 100;

/// Bytes reserved for the PDF skeleton (header, catalog, page tree, xref, trailer)
pub const PDF_BASE_OVERHEAD: u64 = 1024;

/// Bytes reserved per rasterized page (page dict, image dict, content stream, xref rows)
pub const PDF_PAGE_OVERHEAD: u64 = 640;
