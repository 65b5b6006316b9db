use crate::config::FEATURE_SIZE;
use crate::error::PreprocessError;
use crate::sniff::sniff_bytes;
use bytes::Bytes;
use image::GrayImage;
use std::fmt;

/// Container formats accepted by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Png,
    Jpeg,
}

impl ImageKind {
    pub fn mime_type(&self) -> &'static str {
        match self {
            ImageKind::Png => "image/png",
            ImageKind::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageKind::Png => "png",
            ImageKind::Jpeg => "jpg",
        }
    }

    pub(crate) fn image_format(&self) -> image::ImageFormat {
        match self {
            ImageKind::Png => image::ImageFormat::Png,
            ImageKind::Jpeg => image::ImageFormat::Jpeg,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Png => f.write_str("PNG"),
            ImageKind::Jpeg => f.write_str("JPEG"),
        }
    }
}

/// Raw upload as received from the client.
///
/// The detected format is set once by [`UploadArtifact::sniff`]; the bytes
/// are never modified.
#[derive(Debug, Clone)]
pub struct UploadArtifact {
    bytes: Bytes,
    filename: String,
    format: Option<ImageKind>,
}

impl UploadArtifact {
    pub fn new(bytes: impl Into<Bytes>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            format: None,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// `None` until the artifact has been sniffed successfully.
    pub fn format(&self) -> Option<ImageKind> {
        self.format
    }

    /// Classify the payload by magic number. Repeated calls return the first result.
    pub fn sniff(&mut self) -> Result<ImageKind, PreprocessError> {
        if let Some(format) = self.format {
            return Ok(format);
        }
        let format = sniff_bytes(&self.bytes)?;
        self.format = Some(format);
        Ok(format)
    }
}

/// A `FEATURE_SIZE` x `FEATURE_SIZE` single-channel raster.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    pixels: GrayImage,
    source_format: ImageKind,
}

impl NormalizedImage {
    pub(crate) fn from_parts(pixels: GrayImage, source_format: ImageKind) -> Self {
        debug_assert_eq!(pixels.dimensions(), (FEATURE_SIZE, FEATURE_SIZE));
        Self {
            pixels,
            source_format,
        }
    }

    pub fn pixels(&self) -> &GrayImage {
        &self.pixels
    }

    pub fn source_format(&self) -> ImageKind {
        self.source_format
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }
}

/// Normalized image serialized back into its source container.
#[derive(Debug, Clone)]
pub struct EncodedImage {
    pub bytes: Vec<u8>,
    pub format: ImageKind,
}

impl EncodedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.mime_type()
    }
}
