//! Brick payload codecs
//!
//! Every brick records its decoded length in the brick table; decoding never produces more
//! than that many bytes, so a corrupt or hostile payload cannot expand past its brick.

use crate::error::{Result, VolumeError};
use flate2::write::DeflateEncoder;
use flate2::Compression as FlateCompression;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};

/// Compression methods a brick payload may be stored with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompressionMethod {
    /// Stored verbatim
    None,
    /// Raw deflate stream
    #[default]
    Deflate,
    /// Byte-wise (run, value) pairs, good for label and mask volumes
    RLE,
    /// Zstandard frame
    Zstd,
}

impl CompressionMethod {
    /// Encode one decoded brick
    pub fn encode(self, raw: &[u8], level: CompressionLevel) -> Result<Vec<u8>> {
        match self {
            CompressionMethod::None => Ok(raw.to_vec()),
            CompressionMethod::Deflate => {
                let mut encoder =
                    DeflateEncoder::new(Vec::new(), FlateCompression::new(level.value().into()));
                encoder
                    .write_all(raw)
                    .and_then(|()| encoder.finish())
                    .map_err(|e| VolumeError::Compression(e.to_string()))
            }
            CompressionMethod::RLE => Ok(rle_encode(raw)),
            CompressionMethod::Zstd => zstd::bulk::compress(raw, level.value().into())
                .map_err(|e| VolumeError::Compression(e.to_string())),
        }
    }

    /// Decode one stored brick that must expand to exactly `decoded_len` bytes
    pub fn decode(self, stored: &[u8], decoded_len: usize) -> Result<Vec<u8>> {
        let decoded = match self {
            CompressionMethod::None => stored.to_vec(),
            CompressionMethod::Deflate => {
                read_bounded(flate2::read::DeflateDecoder::new(stored), decoded_len)?
            }
            CompressionMethod::RLE => rle_decode(stored, decoded_len)?,
            CompressionMethod::Zstd => {
                let decoder = zstd::stream::read::Decoder::new(stored)
                    .map_err(|e| VolumeError::Decompression(e.to_string()))?;
                read_bounded(decoder, decoded_len)?
            }
        };

        if decoded.len() != decoded_len {
            return Err(VolumeError::Decompression(format!(
                "{:?} payload decoded to {} bytes, brick holds {}",
                self,
                decoded.len(),
                decoded_len
            )));
        }
        Ok(decoded)
    }
}

/// Compression level (0-9, where 0 is no compression and 9 is maximum)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    pub fn new(level: u8) -> Self {
        Self(level.min(9))
    }

    pub fn value(&self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self(6)
    }
}

/// Read at most one byte past `limit`, enough to tell an oversized stream apart
fn read_bounded<R: Read>(reader: R, limit: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(limit);
    reader
        .take(limit as u64 + 1)
        .read_to_end(&mut out)
        .map_err(|e| VolumeError::Decompression(e.to_string()))?;
    Ok(out)
}

fn rle_encode(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut bytes = raw.iter().copied().peekable();

    while let Some(byte) = bytes.next() {
        let mut run = 1u8;
        while run < u8::MAX && bytes.next_if_eq(&byte).is_some() {
            run += 1;
        }
        out.extend_from_slice(&[run, byte]);
    }

    out
}

fn rle_decode(stored: &[u8], decoded_len: usize) -> Result<Vec<u8>> {
    if stored.len() % 2 != 0 {
        return Err(VolumeError::Decompression(
            "RLE payload must hold whole (run, value) pairs".to_string(),
        ));
    }

    let mut out = Vec::with_capacity(decoded_len);
    for pair in stored.chunks_exact(2) {
        let (run, byte) = (usize::from(pair[0]), pair[1]);
        if run == 0 || out.len() + run > decoded_len {
            return Err(VolumeError::Decompression(format!(
                "RLE run of {} at byte {} does not fit a {} byte brick",
                run,
                out.len(),
                decoded_len
            )));
        }
        out.resize(out.len() + run, byte);
    }

    Ok(out)
}
