//! Input decompression
//!
//! Annotation dumps ship both plain and gzip-compressed. The format is
//! detected from the leading magic bytes rather than the file extension, and
//! concatenated gzip members (as produced by `bgzip` and `cat a.gz b.gz`) are
//! read through to the end.

use crate::error::Result;
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tracing::debug;

/// Gzip member header magic
pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Whether a buffer starts with the gzip magic bytes
pub fn is_gzip(header: &[u8]) -> bool {
    header.starts_with(&GZIP_MAGIC)
}

/// Wrap any reader in a line reader, transparently decompressing gzip
pub fn decode_reader<R: Read + 'static>(reader: R) -> Result<Box<dyn BufRead>> {
    let mut buffered = BufReader::new(reader);
    let compressed = is_gzip(buffered.fill_buf()?);

    if compressed {
        debug!("Detected gzip input");
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(buffered))))
    } else {
        Ok(Box::new(buffered))
    }
}

/// Open an annotation file for line-oriented reading
pub fn open_input(path: impl AsRef<Path>) -> Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    debug!(path = %path.display(), "Opening input");
    let file = File::open(path)?;
    decode_reader(file)
}
