/// Width and height of the raster handed to the inference backend.
pub const FEATURE_SIZE: u32 = 28;

pub const DEFAULT_JPEG_QUALITY: u8 = 90;

/// Decoded images wider or taller than this are rejected before allocation.
pub const DEFAULT_MAX_DIMENSION: u32 = 8192;

pub const DEFAULT_MAX_ALLOC_BYTES: u64 = 256 * 1024 * 1024;
