pub mod inflate;

use crate::error::{Error, Result};
use flate2::read::GzDecoder;
use flate2::{Decompress, FlushDecompress, Status};
use serde::Deserialize;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// Compression scheme tag stored in front of every region-file entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionScheme {
    Gzip,
    Zlib,
    Uncompressed,
}

impl CompressionScheme {
    pub const EXTERNAL_FLAG: u8 = 0x80;

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(CompressionScheme::Gzip),
            2 => Some(CompressionScheme::Zlib),
            3 => Some(CompressionScheme::Uncompressed),
            _ => None,
        }
    }

    pub fn tag(&self) -> u8 {
        match self {
            CompressionScheme::Gzip => 1,
            CompressionScheme::Zlib => 2,
            CompressionScheme::Uncompressed => 3,
        }
    }
}

/// Strategy used to turn compressed payloads into decoded buffers.
///
/// Both variants produce identical output for well-formed input; they only
/// differ in throughput. The choice is fixed for the duration of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decompressor {
    /// The crate's own inflate implementation.
    #[default]
    Internal,
    /// `flate2`, backed by the platform's deflate library.
    Platform,
}

impl Decompressor {
    pub fn decode(&self, scheme: CompressionScheme, bytes: &[u8]) -> Result<Vec<u8>> {
        match scheme {
            CompressionScheme::Uncompressed => Ok(bytes.to_vec()),
            CompressionScheme::Gzip => self.gunzip(bytes),
            CompressionScheme::Zlib => self.unzlib(bytes),
        }
    }

    pub fn gunzip(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            Decompressor::Internal => {
                inflate::gzip_decode(bytes).map_err(|reason| Error::corrupt("gzip stream", reason))
            }
            Decompressor::Platform => read_all(GzDecoder::new(bytes), "gzip stream"),
        }
    }

    pub fn unzlib(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        match self {
            Decompressor::Internal => {
                inflate::zlib_decode(bytes).map_err(|reason| Error::corrupt("zlib stream", reason))
            }
            Decompressor::Platform => platform_inflate(bytes, "zlib stream"),
        }
    }
}

fn read_all<R: Read>(mut decoder: R, context: &str) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|err| Error::corrupt(context, err.to_string()))?;
    Ok(out)
}

/// Drives `flate2::Decompress` directly so a stream that runs out of input
/// before its final block is reported instead of yielding partial output.
fn platform_inflate(bytes: &[u8], context: &str) -> Result<Vec<u8>> {
    let mut inflater = Decompress::new(true);
    let mut out = Vec::with_capacity(bytes.len() * 4);
    loop {
        out.reserve(32 * 1024);
        let (before_in, before_out) = (inflater.total_in(), inflater.total_out());
        let status = inflater
            .decompress_vec(&bytes[before_in as usize..], &mut out, FlushDecompress::Finish)
            .map_err(|err| Error::corrupt(context, err.to_string()))?;
        if status == Status::StreamEnd {
            return Ok(out);
        }
        if inflater.total_in() == before_in && inflater.total_out() == before_out {
            return Err(Error::corrupt(context, "stream ended early"));
        }
    }
}

impl FromStr for Decompressor {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.to_ascii_lowercase().as_str() {
            "internal" => Ok(Decompressor::Internal),
            "platform" | "java" => Ok(Decompressor::Platform),
            other => Err(Error::InvalidArgument(format!(
                "unknown decompressor '{}' (expected internal|platform)",
                other
            ))),
        }
    }
}

impl fmt::Display for Decompressor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decompressor::Internal => write!(f, "internal"),
            Decompressor::Platform => write!(f, "platform"),
        }
    }
}
