//! Bricked volume cache files
//!
//! A compact single-file container holding a volume as independently compressed bricks behind a
//! bincode header. It is not MINC; it serves as a local cache and a fixture format that needs no
//! HDF5 library at read time. [`BrickBackend`] plugs it into the handle seam.

use crate::config::global_config;
use crate::error::{Result, VolumeError};
use crate::io::{HyperslabValues, VolumeBackend, VolumeHandle};
use crate::layout::VolumeLayout;
use crate::metadata::{Preamble, VolumeHeader};
use crate::slab::{Slab, Voxel};
use crate::types::{Dimension, DimensionClass};
use crate::utils::{calculate_checksum, for_each_index, strides};
use log::debug;
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

/// Backend reading brick cache files from the local file system
#[derive(Debug, Clone, Copy, Default)]
pub struct BrickBackend;

impl VolumeBackend for BrickBackend {
    type Handle = BrickFile;

    fn open(&self, path: &Path) -> Result<BrickFile> {
        BrickFile::open(path)
    }
}

/// An open brick cache file
///
/// The header and brick table are read at open; brick payloads are read on demand, so a
/// hyperslab read only touches the bricks it overlaps.
#[derive(Debug)]
pub struct BrickFile {
    path: PathBuf,
    file: File,
    header: VolumeHeader,
    /// Absolute offset of the first brick payload
    data_start: u64,
}

impl BrickFile {
    /// Open a brick cache file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let volume = Self::open_inner(path).map_err(|e| VolumeError::open(path, e))?;
        debug!(
            "opened {} ({})",
            path.display(),
            volume.header.layout.summary()
        );
        Ok(volume)
    }

    fn open_inner(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let mut preamble = [0u8; Preamble::LEN];
        file.read_exact(&mut preamble).map_err(truncated)?;
        let preamble = Preamble::decode(&preamble)?;

        let data_start = (Preamble::LEN as u64)
            .checked_add(preamble.header_len)
            .filter(|&start| start <= file_len)
            .ok_or_else(|| {
                VolumeError::InvalidFormat(format!(
                    "header length {} exceeds file size {}",
                    preamble.header_len, file_len
                ))
            })?;

        let mut header_bytes = vec![0u8; preamble.header_len as usize];
        file.read_exact(&mut header_bytes).map_err(truncated)?;
        let header: VolumeHeader = bincode::deserialize(&header_bytes)?;
        header.validate()?;

        let payload_end = header
            .bricks
            .iter()
            .map(|b| b.offset.saturating_add(b.compressed_size))
            .max()
            .unwrap_or(0);
        if data_start.saturating_add(payload_end) > file_len {
            return Err(VolumeError::InvalidFormat(format!(
                "brick payloads extend past end of file ({} > {})",
                data_start.saturating_add(payload_end),
                file_len
            )));
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            header,
            data_start,
        })
    }

    /// Parsed file header
    pub fn header(&self) -> &VolumeHeader {
        &self.header
    }

    /// Voxel grid layout
    pub fn layout(&self) -> &VolumeLayout {
        &self.header.layout
    }

    /// Read and decode one brick payload
    fn read_brick(&self, index: usize) -> Result<Vec<u8>> {
        let entry = self.header.bricks.get(index).ok_or_else(|| {
            VolumeError::OutOfBounds(format!("brick {} does not exist", index))
        })?;

        let mut file = &self.file;
        file.seek(SeekFrom::Start(self.data_start + entry.offset))?;
        let mut stored = vec![0u8; entry.compressed_size as usize];
        file.read_exact(&mut stored).map_err(truncated)?;

        let decoded = self
            .header
            .compression
            .decode(&stored, entry.uncompressed_size as usize)?;

        if global_config().validate_checksums() {
            let found = calculate_checksum(&decoded);
            if found != entry.checksum {
                return Err(VolumeError::ChecksumMismatch {
                    index,
                    expected: entry.checksum,
                    found,
                });
            }
        }

        Ok(decoded)
    }

    /// Copy the part of `slab` covered by one brick into `buffer`
    fn copy_from_brick<T: Voxel>(
        &self,
        values: HyperslabValues,
        slab: &Slab,
        brick_coords: &[usize],
        brick: &[u8],
        buffer: &mut [T],
    ) {
        let layout = &self.header.layout;
        let data_type = layout.data_type;
        let elem = data_type.size_in_bytes();
        let scaling = match values {
            HyperslabValues::Real => self.header.scaling,
            HyperslabValues::Voxel => None,
        };

        let range = layout.brick_data_range(brick_coords);
        let brick_shape: Vec<usize> = range.iter().map(|(s, e)| e - s).collect();
        let brick_strides = strides(&brick_shape);
        let out_strides = strides(slab.counts());
        let slab_end = slab.end();

        let lo: Vec<usize> = range
            .iter()
            .zip(slab.offsets())
            .map(|(&(start, _), &offset)| start.max(offset))
            .collect();
        let hi: Vec<usize> = range
            .iter()
            .zip(&slab_end)
            .map(|(&(_, end), &slab_end)| end.min(slab_end))
            .collect();

        // Walk the intersection one row (last axis) at a time
        let last = lo.len() - 1;
        let row_len = hi[last] - lo[last];
        let mut row_end = hi.clone();
        row_end[last] = lo[last] + 1;

        for_each_index(&lo, &row_end, |coords| {
            let mut brick_at = 0;
            let mut out_at = 0;
            for axis in 0..coords.len() {
                brick_at += (coords[axis] - range[axis].0) * brick_strides[axis];
                out_at += (coords[axis] - slab.offsets()[axis]) * out_strides[axis];
            }

            for i in 0..row_len {
                let at = (brick_at + i) * elem;
                let voxel = data_type.decode_le(&brick[at..at + elem]);
                let value = match &scaling {
                    Some(scaling) => scaling.to_real(voxel),
                    None => voxel,
                };
                buffer[out_at + i] = T::from_real(value);
            }
        });
    }
}

impl VolumeHandle for BrickFile {
    fn path(&self) -> &Path {
        &self.path
    }

    fn dimensions(&self, class: DimensionClass) -> Result<Vec<Dimension>> {
        Ok(self
            .header
            .layout
            .dimensions_of_class(class)
            .into_iter()
            .cloned()
            .collect())
    }

    fn sizes(&self) -> Vec<usize> {
        self.header.layout.size()
    }

    fn read_hyperslab<T: Voxel>(
        &self,
        values: HyperslabValues,
        slab: &Slab,
        buffer: &mut [T],
    ) -> Result<()> {
        let layout = &self.header.layout;
        slab.check_within(&layout.size())?;
        if buffer.len() != slab.voxel_count() {
            return Err(VolumeError::InvalidDimensions(format!(
                "buffer holds {} values, slab needs {}",
                buffer.len(),
                slab.voxel_count()
            )));
        }
        if slab.voxel_count() == 0 {
            return Ok(());
        }

        let min_brick: Vec<usize> = slab
            .offsets()
            .iter()
            .enumerate()
            .map(|(i, &offset)| offset / layout.brick_size.get(i))
            .collect();
        let end_brick: Vec<usize> = slab
            .end()
            .iter()
            .enumerate()
            .map(|(i, &end)| (end - 1) / layout.brick_size.get(i) + 1)
            .collect();

        let mut bricks = Vec::new();
        for_each_index(&min_brick, &end_brick, |coords| bricks.push(coords.to_vec()));
        debug!(
            "reading {} from {} ({} bricks)",
            slab,
            self.path.display(),
            bricks.len()
        );

        for coords in bricks {
            let data = self.read_brick(layout.brick_coords_to_index(&coords))?;
            self.copy_from_brick(values, slab, &coords, &data, buffer);
        }

        Ok(())
    }

    fn close(self) -> Result<()> {
        debug!("closed {}", self.path.display());
        Ok(())
    }
}

fn truncated(err: std::io::Error) -> VolumeError {
    if err.kind() == ErrorKind::UnexpectedEof {
        VolumeError::InvalidFormat("unexpected end of file".to_string())
    } else {
        VolumeError::Io(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compression::CompressionMethod;
    use crate::layout::BrickSize;
    use crate::types::{DataType, Scaling, ValueRange};
    use crate::writer::VolumeWriter;
    use tempfile::TempDir;

    fn layout(data_type: DataType, sizes: [usize; 3], brick: usize) -> VolumeLayout {
        VolumeLayout::new(
            data_type,
            vec![
                Dimension::new("zspace", sizes[0], 2.0, -10.0),
                Dimension::new("yspace", sizes[1], 1.0, 0.0),
                Dimension::new("xspace", sizes[2], 0.5, 4.0),
            ],
        )
        .unwrap()
        .with_brick_size(BrickSize::uniform(3, brick))
        .unwrap()
    }

    #[test]
    fn test_read_across_bricks() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("grid.mnc");

        let data: Vec<u16> = (0..5 * 6 * 7).map(|v| v as u16).collect();
        VolumeWriter::new(layout(DataType::U16, [5, 6, 7], 4))
            .with_compression(CompressionMethod::Zstd)
            .write(&path, &data)
            .unwrap();

        let file = BrickFile::open(&path).unwrap();
        assert_eq!(file.sizes(), vec![5, 6, 7]);
        assert_eq!(file.header().bricks.len(), 2 * 2 * 2);

        let slab = Slab::new(vec![1, 2, 3], vec![3, 3, 3]).unwrap();
        let mut buffer = vec![0.0f64; 27];
        file.read_hyperslab(HyperslabValues::Real, &slab, &mut buffer).unwrap();

        let mut expected = Vec::new();
        for z in 1..4 {
            for y in 2..5 {
                for x in 3..6 {
                    expected.push((z * 42 + y * 7 + x) as f64);
                }
            }
        }
        assert_eq!(buffer, expected);
        file.close().unwrap();
    }

    #[test]
    fn test_scaled_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("scaled.mnc");

        let scaling = Scaling::new(ValueRange::new(0.0, 200.0), ValueRange::new(-1.0, 1.0));
        VolumeWriter::new(layout(DataType::U8, [1, 1, 3], 8))
            .with_scaling(scaling)
            .write(&path, &[0u8, 100, 200])
            .unwrap();

        let file = BrickFile::open(&path).unwrap();
        let slab = Slab::whole(&file.sizes());

        let mut real = vec![0.0f64; 3];
        file.read_hyperslab(HyperslabValues::Real, &slab, &mut real).unwrap();
        assert_eq!(real, vec![-1.0, 0.0, 1.0]);

        let mut stored = vec![0u8; 3];
        file.read_hyperslab(HyperslabValues::Voxel, &slab, &mut stored).unwrap();
        assert_eq!(stored, vec![0, 100, 200]);
    }

    #[test]
    fn test_spatial_dimensions() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("dims.mnc");
        VolumeWriter::new(layout(DataType::F32, [2, 3, 4], 8))
            .write(&path, &[0.0f32; 24])
            .unwrap();

        let file = BrickFile::open(&path).unwrap();
        let dims = file.dimensions(DimensionClass::Spatial).unwrap();
        let names: Vec<&str> = dims.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["zspace", "yspace", "xspace"]);
        assert!(file.dimensions(DimensionClass::Time).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_bad_requests() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("small.mnc");
        VolumeWriter::new(layout(DataType::I16, [2, 2, 2], 8))
            .write(&path, &[1i16; 8])
            .unwrap();
        let file = BrickFile::open(&path).unwrap();

        let outside = Slab::new(vec![0, 0, 1], vec![2, 2, 2]).unwrap();
        let mut buffer = vec![0.0f64; 8];
        assert!(matches!(
            file.read_hyperslab(HyperslabValues::Real, &outside, &mut buffer),
            Err(VolumeError::OutOfBounds(_))
        ));

        let whole = Slab::whole(&[2, 2, 2]);
        let mut short = vec![0.0f64; 7];
        assert!(matches!(
            file.read_hyperslab(HyperslabValues::Real, &whole, &mut short),
            Err(VolumeError::InvalidDimensions(_))
        ));

        let empty = Slab::new(vec![1, 1, 1], vec![0, 1, 1]).unwrap();
        file.read_hyperslab::<f64>(HyperslabValues::Real, &empty, &mut [])
            .unwrap();
    }

    #[test]
    fn test_open_failures() {
        let temp_dir = TempDir::new().unwrap();

        let missing = temp_dir.path().join("missing.mnc");
        let err = BrickFile::open(&missing).unwrap_err();
        assert!(matches!(err, VolumeError::Open { ref path, .. } if path == &missing));

        let garbage = temp_dir.path().join("garbage.mnc");
        std::fs::write(&garbage, b"this is not a volume file").unwrap();
        assert!(matches!(
            BrickFile::open(&garbage),
            Err(VolumeError::Open { .. })
        ));
    }

    #[test]
    fn test_truncated_file_fails_to_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cut.mnc");
        let data: Vec<f64> = (0..64).map(|v| v as f64).collect();
        VolumeWriter::new(layout(DataType::F64, [4, 4, 4], 2))
            .with_compression(CompressionMethod::None)
            .write(&path, &data)
            .unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::write(&path, &bytes[..bytes.len() - 10]).unwrap();
        let err = BrickFile::open(&path).unwrap_err();
        match err {
            VolumeError::Open { source, .. } => {
                assert!(matches!(*source, VolumeError::InvalidFormat(_)))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_overflowing_header_fails_to_open() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("huge.mnc");

        let mut header = VolumeHeader::new(layout(DataType::U16, [2, 2, 2], 2));
        header.layout.dimensions.iter_mut().for_each(|d| d.size = 1 << 21);
        header.layout.brick_size = BrickSize::uniform(3, 1 << 21);
        let header_bytes = bincode::serialize(&header).unwrap();
        let preamble = Preamble {
            version: header.version,
            header_len: header_bytes.len() as u64,
        };
        std::fs::write(&path, [&preamble.encode()[..], &header_bytes].concat()).unwrap();

        match BrickFile::open(&path).unwrap_err() {
            VolumeError::Open { source, .. } => {
                assert!(matches!(*source, VolumeError::InvalidFormat(_)))
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_corrupt_brick_detected() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("corrupt.mnc");
        VolumeWriter::new(layout(DataType::U8, [1, 1, 16], 16))
            .with_compression(CompressionMethod::None)
            .write(&path, &[3u8; 16])
            .unwrap();

        // Flip the last payload byte
        let mut bytes = std::fs::read(&path).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xff;
        std::fs::write(&path, &bytes).unwrap();

        let file = BrickFile::open(&path).unwrap();
        let mut buffer = vec![0u8; 16];
        let whole = Slab::whole(&[1, 1, 16]);
        let result = file.read_hyperslab(HyperslabValues::Voxel, &whole, &mut buffer);
        assert!(matches!(result, Err(VolumeError::ChecksumMismatch { index: 0, .. })));
    }
}
