use crate::config::{DEFAULT_MAX_ALLOC_BYTES, DEFAULT_MAX_DIMENSION, FEATURE_SIZE};
use crate::error::PreprocessError;
use crate::types::{ImageKind, NormalizedImage};
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::{DynamicImage, GrayImage, ImageReader, Limits, Luma, RgbImage};
use std::io::Cursor;
use tracing_macros::traced;

#[derive(Debug, Clone, Copy)]
pub struct NormalizeOptions {
    /// Largest accepted decoded width or height.
    pub max_dimension: u32,
    /// Upper bound on decoder allocations.
    ///
    /// Only the decoder honors this cap. An 8-bit RGB frame goes to the
    /// resizer without a copy; other color types are converted into one extra
    /// RGB buffer, so peak memory can reach about twice this value.
    pub max_alloc_bytes: u64,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_alloc_bytes: DEFAULT_MAX_ALLOC_BYTES,
        }
    }
}

/// Decodes an upload and reduces it to a `FEATURE_SIZE`² luma raster.
///
/// The resize is non-uniform: the whole source is stretched onto the square
/// output with no letterboxing or cropping.
#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    options: NormalizeOptions,
}

impl Normalizer {
    pub fn new(options: NormalizeOptions) -> Self {
        Self { options }
    }

    #[traced("normalize", level = "debug", fields(format = %kind, bytes = bytes.len()))]
    pub fn normalize(
        &self,
        bytes: &[u8],
        kind: ImageKind,
    ) -> Result<NormalizedImage, PreprocessError> {
        let decoded = self.decode(bytes, kind)?;

        tracing::trace!(
            width = decoded.width(),
            height = decoded.height(),
            color = ?decoded.color(),
            "Decoded upload"
        );

        // Moves the buffer when the source is already 8-bit RGB.
        let rgb = decoded.into_rgb8();
        let resized = resize_rgb(&rgb).map_err(|e| PreprocessError::decode(kind, e))?;
        let gray = to_luma(&resized);

        Ok(NormalizedImage::from_parts(gray, kind))
    }

    /// Decode strictly as `kind`; the container is never guessed.
    fn decode(&self, bytes: &[u8], kind: ImageKind) -> Result<DynamicImage, PreprocessError> {
        let _s = common::span_debug!("decode");

        let mut reader = ImageReader::with_format(Cursor::new(bytes), kind.image_format());
        reader.limits(self.limits());

        reader.decode().map_err(|e| {
            tracing::debug!(format = %kind, error = %e, "Decoder rejected upload");
            PreprocessError::decode(kind, e)
        })
    }

    fn limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.options.max_dimension);
        limits.max_image_height = Some(self.options.max_dimension);
        limits.max_alloc = Some(self.options.max_alloc_bytes);
        limits
    }
}

fn resize_rgb(rgb: &RgbImage) -> Result<RgbImage, String> {
    let _s = common::span_debug!("resize");

    let src = ImageRef::new(rgb.width(), rgb.height(), rgb.as_raw(), PixelType::U8x3)
        .map_err(|e| e.to_string())?;
    let mut dst = Image::new(FEATURE_SIZE, FEATURE_SIZE, PixelType::U8x3);

    Resizer::new()
        .resize(
            &src,
            &mut dst,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3)),
        )
        .map_err(|e| e.to_string())?;

    RgbImage::from_raw(FEATURE_SIZE, FEATURE_SIZE, dst.into_vec())
        .ok_or_else(|| "resized buffer has unexpected length".to_string())
}

/// BT.601 luma in 8-bit fixed point: Y = (77 R + 150 G + 29 B + 128) >> 8.
///
/// The weights sum to 256, so neutral gray maps to itself.
fn bt601_luma(r: u8, g: u8, b: u8) -> u8 {
    ((77 * r as u32 + 150 * g as u32 + 29 * b as u32 + 128) >> 8) as u8
}

fn to_luma(rgb: &RgbImage) -> GrayImage {
    GrayImage::from_fn(rgb.width(), rgb.height(), |x, y| {
        let [r, g, b] = rgb.get_pixel(x, y).0;
        Luma([bt601_luma(r, g, b)])
    })
}
