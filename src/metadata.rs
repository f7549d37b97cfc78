//! Volume file header structures

use crate::compression::{CompressionLevel, CompressionMethod};
use crate::error::{Result, VolumeError};
use crate::layout::VolumeLayout;
use crate::types::Scaling;
use crate::VOLUME_MAGIC;
use bytes::{Buf, BufMut};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Container format version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u16,
}

impl FormatVersion {
    pub const CURRENT: Self = Self { major: 2, minor: 0 };

    pub fn new(major: u16, minor: u16) -> Self {
        Self { major, minor }
    }

    pub fn is_compatible(&self, other: &Self) -> bool {
        self.major == other.major
    }
}

impl Default for FormatVersion {
    fn default() -> Self {
        Self::CURRENT
    }
}

/// Fixed-size block at the start of every volume file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Preamble {
    pub version: FormatVersion,
    /// Length of the encoded [`VolumeHeader`] that follows
    pub header_len: u64,
}

impl Preamble {
    /// Encoded length in bytes
    pub const LEN: usize = 16;

    pub fn encode(&self) -> [u8; Self::LEN] {
        let mut out = [0u8; Self::LEN];
        let mut buf = &mut out[..];
        buf.put_slice(VOLUME_MAGIC);
        buf.put_u16_le(self.version.major);
        buf.put_u16_le(self.version.minor);
        buf.put_u64_le(self.header_len);
        out
    }

    pub fn decode(mut bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::LEN {
            return Err(VolumeError::InvalidFormat(format!(
                "file too short: {} bytes",
                bytes.len()
            )));
        }
        if &bytes[..4] != VOLUME_MAGIC {
            return Err(VolumeError::InvalidFormat("bad magic number".to_string()));
        }
        bytes.advance(4);

        let version = FormatVersion::new(bytes.get_u16_le(), bytes.get_u16_le());
        if !version.is_compatible(&FormatVersion::CURRENT) {
            return Err(VolumeError::UnsupportedVersion(version.major));
        }

        Ok(Self {
            version,
            header_len: bytes.get_u64_le(),
        })
    }
}

/// Location and integrity information for one stored brick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrickEntry {
    /// Offset of the payload from the end of the header
    pub offset: u64,
    /// Stored (compressed) size in bytes
    pub compressed_size: u64,
    /// Decoded size in bytes
    pub uncompressed_size: u64,
    /// CRC32 of the decoded payload
    pub checksum: u32,
}

impl BrickEntry {
    pub fn compression_ratio(&self) -> f64 {
        if self.compressed_size == 0 {
            0.0
        } else {
            self.uncompressed_size as f64 / self.compressed_size as f64
        }
    }
}

/// Complete header of a volume file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeHeader {
    /// Format version
    pub version: FormatVersion,

    /// Voxel grid layout
    pub layout: VolumeLayout,

    /// Compression method used for bricks
    pub compression: CompressionMethod,

    /// Level the bricks were compressed with
    pub compression_level: CompressionLevel,

    /// Map from stored to real values; `None` means stored values are real values
    pub scaling: Option<Scaling>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Processing history, one line per step
    pub history: Vec<String>,

    /// Free-form attributes
    pub attributes: BTreeMap<String, String>,

    /// One entry per brick, in brick index order
    pub bricks: Vec<BrickEntry>,
}

impl VolumeHeader {
    /// Create a header with no bricks recorded yet
    pub fn new(layout: VolumeLayout) -> Self {
        Self {
            version: FormatVersion::default(),
            layout,
            compression: CompressionMethod::default(),
            compression_level: CompressionLevel::default(),
            scaling: None,
            created_at: Utc::now(),
            history: Vec::new(),
            attributes: BTreeMap::new(),
            bricks: Vec::new(),
        }
    }

    /// Get an attribute
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(|s| s.as_str())
    }

    /// Check that the brick table is consistent with the layout
    pub fn validate(&self) -> Result<()> {
        self.layout
            .validate()
            .map_err(|e| VolumeError::InvalidFormat(format!("bad layout: {}", e)))?;

        let expected = self.layout.total_bricks();
        if self.bricks.len() != expected {
            return Err(VolumeError::InvalidFormat(format!(
                "brick table has {} entries, layout needs {}",
                self.bricks.len(),
                expected
            )));
        }

        for (index, entry) in self.bricks.iter().enumerate() {
            let coords = self.layout.brick_index_to_coords(index);
            let expected_size = self.layout.brick_size_bytes(&coords) as u64;
            if entry.uncompressed_size != expected_size {
                return Err(VolumeError::InvalidFormat(format!(
                    "brick {} decodes to {} bytes, layout needs {}",
                    index, entry.uncompressed_size, expected_size
                )));
            }
        }

        if let Some(scaling) = &self.scaling {
            if !scaling.valid_range.is_valid() || !scaling.real_range.is_valid() {
                return Err(VolumeError::InvalidFormat(
                    "scaling ranges must be finite and ordered".to_string(),
                ));
            }
        }

        Ok(())
    }

    /// Total size of all stored brick payloads
    pub fn payload_len(&self) -> u64 {
        self.bricks.iter().map(|b| b.compressed_size).sum()
    }

    /// Pretty JSON rendering of the header
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataType, Dimension};

    fn header() -> VolumeHeader {
        let layout = VolumeLayout::new(
            DataType::U8,
            vec![
                Dimension::new("yspace", 4, 1.0, 0.0),
                Dimension::new("xspace", 3, 1.0, 0.0),
            ],
        )
        .unwrap();
        VolumeHeader::new(layout)
    }

    #[test]
    fn test_version_compatibility() {
        assert!(FormatVersion::new(2, 0).is_compatible(&FormatVersion::new(2, 3)));
        assert!(!FormatVersion::new(2, 0).is_compatible(&FormatVersion::new(1, 0)));
    }

    #[test]
    fn test_preamble() {
        let preamble = Preamble {
            version: FormatVersion::CURRENT,
            header_len: 1234,
        };
        let bytes = preamble.encode();
        assert_eq!(&bytes[..4], b"MNC\0");
        assert_eq!(Preamble::decode(&bytes).unwrap(), preamble);
    }

    #[test]
    fn test_preamble_rejects_garbage() {
        assert!(matches!(
            Preamble::decode(b"short"),
            Err(VolumeError::InvalidFormat(_))
        ));
        assert!(matches!(
            Preamble::decode(&[0u8; 16]),
            Err(VolumeError::InvalidFormat(_))
        ));

        let mut bytes = Preamble {
            version: FormatVersion::new(1, 0),
            header_len: 0,
        }
        .encode();
        assert!(matches!(
            Preamble::decode(&bytes),
            Err(VolumeError::UnsupportedVersion(1))
        ));
        bytes[4] = 2;
        assert!(Preamble::decode(&bytes).is_ok());
    }

    #[test]
    fn test_validate_brick_table() {
        let mut header = header();
        assert!(header.validate().is_err());

        header.bricks.push(BrickEntry {
            offset: 0,
            compressed_size: 3,
            uncompressed_size: 12,
            checksum: 0,
        });
        header.validate().unwrap();
        assert_eq!(header.payload_len(), 3);
        assert_eq!(header.bricks[0].compression_ratio(), 4.0);

        header.bricks[0].uncompressed_size = 11;
        assert!(header.validate().is_err());
    }

    #[test]
    fn test_overflowing_layout_is_a_format_error() {
        let mut header = header();
        header.layout = VolumeLayout {
            data_type: DataType::U16,
            dimensions: ["zspace", "yspace", "xspace"]
                .iter()
                .map(|name| Dimension::new(*name, 1 << 21, 1.0, 0.0))
                .collect(),
            brick_size: crate::layout::BrickSize::uniform(3, 1 << 21),
        };
        assert!(matches!(
            header.validate(),
            Err(VolumeError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_header_json() {
        let mut header = header();
        header.attributes.insert("patient".into(), "anon".into());
        let json = header.to_json().unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["attributes"]["patient"], "anon");
        assert_eq!(parsed["layout"]["dimensions"][1]["name"], "xspace");
        assert_eq!(header.attribute("patient"), Some("anon"));
    }
}
