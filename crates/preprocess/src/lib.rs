//! Upload preprocessing for the digit gateway.
//!
//! Three stages, each a pure in-memory transformation:
//!
//! 1. [`sniff`]: classify raw bytes as PNG or JPEG from their magic number.
//! 2. [`normalize`]: decode, resize to [`FEATURE_SIZE`]² with Lanczos3, convert to luma.
//! 3. [`encode`]: write the normalized raster back into the upload's container format.

pub mod config;
pub mod encode;
pub mod error;
pub mod normalize;
pub mod sniff;
pub mod types;

pub use config::{DEFAULT_JPEG_QUALITY, FEATURE_SIZE};
pub use encode::Encoder;
pub use error::PreprocessError;
pub use normalize::{NormalizeOptions, Normalizer};
pub use sniff::{sniff_bytes, sniff_reader};
pub use types::{EncodedImage, ImageKind, NormalizedImage, UploadArtifact};
