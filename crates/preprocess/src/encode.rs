use crate::config::{DEFAULT_JPEG_QUALITY, FEATURE_SIZE};
use crate::error::PreprocessError;
use crate::types::{EncodedImage, ImageKind, NormalizedImage};
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use tracing_macros::traced;

/// Serializes a normalized raster back into the container it arrived in,
/// so the filename extension sent downstream stays truthful.
#[derive(Debug, Clone, Copy)]
pub struct Encoder {
    jpeg_quality: u8,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl Encoder {
    /// `jpeg_quality` is clamped to 1..=100.
    pub fn new(jpeg_quality: u8) -> Self {
        Self {
            jpeg_quality: jpeg_quality.clamp(1, 100),
        }
    }

    pub fn jpeg_quality(&self) -> u8 {
        self.jpeg_quality
    }

    #[traced("reencode", level = "debug", fields(format = %image.source_format()))]
    pub fn encode(&self, image: &NormalizedImage) -> Result<EncodedImage, PreprocessError> {
        let format = image.source_format();
        let pixels = image.pixels();

        // A raw 28x28 luma raster is 784 bytes; containers add headers.
        let mut bytes = Vec::with_capacity((FEATURE_SIZE * FEATURE_SIZE) as usize + 256);

        let written = match format {
            ImageKind::Png => pixels.write_with_encoder(PngEncoder::new(&mut bytes)),
            ImageKind::Jpeg => pixels.write_with_encoder(JpegEncoder::new_with_quality(
                &mut bytes,
                self.jpeg_quality,
            )),
        };
        written.map_err(|e| PreprocessError::encode(format, e))?;

        tracing::trace!(format = %format, len = bytes.len(), "Re-encoded image");

        Ok(EncodedImage { bytes, format })
    }
}
