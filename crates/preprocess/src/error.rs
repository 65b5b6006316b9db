use crate::types::ImageKind;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("Unsupported image format: expected PNG or JPEG magic number")]
    UnsupportedFormat,

    #[error("Failed to decode {format} image: {message}")]
    Decode { format: ImageKind, message: String },

    #[error("Failed to encode {format} image: {message}")]
    Encode { format: ImageKind, message: String },

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl PreprocessError {
    pub(crate) fn decode(format: ImageKind, err: impl std::fmt::Display) -> Self {
        PreprocessError::Decode {
            format,
            message: err.to_string(),
        }
    }

    pub(crate) fn encode(format: ImageKind, err: impl std::fmt::Display) -> Self {
        PreprocessError::Encode {
            format,
            message: err.to_string(),
        }
    }
}
