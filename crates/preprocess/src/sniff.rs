use crate::error::PreprocessError;
use crate::types::ImageKind;
use std::io::{self, Read, Seek, SeekFrom};

/// Number of leading bytes inspected. Shorter inputs are rejected.
pub const SNIFF_LEN: usize = 4;

/// Classify an upload by its leading bytes.
///
/// Only the first [`SNIFF_LEN`] bytes are looked at:
/// - `89 50 4E 47` is PNG
/// - `FF D8 .. ..` is JPEG
///
/// The client's declared filename and MIME type are ignored.
pub fn sniff_bytes(bytes: &[u8]) -> Result<ImageKind, PreprocessError> {
    let Some(head) = bytes.get(..SNIFF_LEN) else {
        tracing::debug!(len = bytes.len(), "Upload shorter than magic number window");
        return Err(PreprocessError::UnsupportedFormat);
    };

    match head {
        [0x89, 0x50, 0x4E, 0x47] => Ok(ImageKind::Png),
        [0xFF, 0xD8, _, _] => Ok(ImageKind::Jpeg),
        _ => {
            tracing::debug!(head = ?head, "No known magic number");
            Err(PreprocessError::UnsupportedFormat)
        }
    }
}

/// Classify a seekable stream without consuming it.
///
/// The reader is returned to its starting position whether or not
/// classification succeeds.
pub fn sniff_reader<R: Read + Seek>(reader: &mut R) -> Result<ImageKind, PreprocessError> {
    let start = reader.stream_position()?;

    let mut head = [0u8; SNIFF_LEN];
    let read = read_up_to(reader, &mut head);

    reader.seek(SeekFrom::Start(start))?;

    sniff_bytes(&head[..read?])
}

fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}
