//! Writing brick cache files

use crate::compression::{CompressionLevel, CompressionMethod};
use crate::error::{Result, VolumeError};
use crate::layout::VolumeLayout;
use crate::metadata::{BrickEntry, Preamble, VolumeHeader};
use crate::slab::Voxel;
use crate::types::{DataType, Scaling};
use crate::utils::{calculate_checksum, for_each_index, strides};
use log::debug;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Builder writing a whole volume to a new brick cache file
///
/// ```rust,no_run
/// use minc_volume::{DataType, Dimension, VolumeLayout, VolumeWriter};
///
/// # fn main() -> minc_volume::Result<()> {
/// let layout = VolumeLayout::new(
///     DataType::U8,
///     vec![
///         Dimension::new("zspace", 2, 1.0, 0.0),
///         Dimension::new("yspace", 2, 1.0, 0.0),
///         Dimension::new("xspace", 2, 1.0, 0.0),
///     ],
/// )?;
/// VolumeWriter::new(layout)
///     .with_history("created by example")
///     .write("out.mnc", &[0u8, 1, 2, 3, 4, 5, 6, 7])?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct VolumeWriter {
    header: VolumeHeader,
}

impl VolumeWriter {
    pub fn new(layout: VolumeLayout) -> Self {
        Self {
            header: VolumeHeader::new(layout),
        }
    }

    /// Set compression method
    pub fn with_compression(mut self, method: CompressionMethod) -> Self {
        self.header.compression = method;
        self
    }

    /// Set compression level
    pub fn with_compression_level(mut self, level: CompressionLevel) -> Self {
        self.header.compression_level = level;
        self
    }

    /// Map stored values to real values
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.header.scaling = Some(scaling);
        self
    }

    /// Append a history line
    pub fn with_history(mut self, line: impl Into<String>) -> Self {
        self.header.history.push(line.into());
        self
    }

    /// Add a free-form attribute
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.header.attributes.insert(key.into(), value.into());
        self
    }

    /// Write real values, mapping them through the scaling (if any) to the layout's data type
    pub fn write_real(&self, path: impl AsRef<Path>, values: &[f64]) -> Result<()> {
        fn stored<T: Voxel>(values: &[f64], scaling: Option<Scaling>) -> Vec<T> {
            values
                .iter()
                .map(|&v| T::from_real(scaling.map_or(v, |s| s.to_voxel(v))))
                .collect()
        }

        let scaling = self.header.scaling;
        match self.header.layout.data_type {
            DataType::U8 => self.write(path, &stored::<u8>(values, scaling)),
            DataType::U16 => self.write(path, &stored::<u16>(values, scaling)),
            DataType::U32 => self.write(path, &stored::<u32>(values, scaling)),
            DataType::U64 => self.write(path, &stored::<u64>(values, scaling)),
            DataType::I8 => self.write(path, &stored::<i8>(values, scaling)),
            DataType::I16 => self.write(path, &stored::<i16>(values, scaling)),
            DataType::I32 => self.write(path, &stored::<i32>(values, scaling)),
            DataType::I64 => self.write(path, &stored::<i64>(values, scaling)),
            DataType::F32 => self.write(path, &stored::<f32>(values, scaling)),
            DataType::F64 => self.write(path, values),
        }
    }

    /// Write `data` (row-major in file order) to `path`, replacing any existing file
    pub fn write<T: Voxel>(&self, path: impl AsRef<Path>, data: &[T]) -> Result<()> {
        let path = path.as_ref();
        let layout = &self.header.layout;
        layout.validate()?;

        if T::DATA_TYPE != layout.data_type {
            return Err(VolumeError::InvalidDataType {
                expected: layout.data_type,
                found: T::DATA_TYPE,
            });
        }
        if data.len() != layout.total_voxels() {
            return Err(VolumeError::InvalidDimensions(format!(
                "volume needs {} values, got {}",
                layout.total_voxels(),
                data.len()
            )));
        }

        let grid_strides = strides(&layout.size());
        let mut header = self.header.clone();
        let mut payloads = Vec::with_capacity(layout.total_bricks());
        let mut offset = 0u64;

        for index in 0..layout.total_bricks() {
            let coords = layout.brick_index_to_coords(index);
            let range = layout.brick_data_range(&coords);
            let start: Vec<usize> = range.iter().map(|r| r.0).collect();
            let end: Vec<usize> = range.iter().map(|r| r.1).collect();

            let mut raw = Vec::with_capacity(layout.brick_size_bytes(&coords));
            for_each_index(&start, &end, |voxel| {
                let at: usize = voxel.iter().zip(&grid_strides).map(|(c, s)| c * s).sum();
                data[at].write_le(&mut raw);
            });

            let stored = header.compression.encode(&raw, header.compression_level)?;
            let entry = BrickEntry {
                offset,
                compressed_size: stored.len() as u64,
                uncompressed_size: raw.len() as u64,
                checksum: calculate_checksum(&raw),
            };
            offset += entry.compressed_size;
            header.bricks.push(entry);
            payloads.push(stored);
        }

        header.validate()?;
        let header_bytes = bincode::serialize(&header)?;
        let preamble = Preamble {
            version: header.version,
            header_len: header_bytes.len() as u64,
        };

        let mut out = BufWriter::new(File::create(path)?);
        out.write_all(&preamble.encode())?;
        out.write_all(&header_bytes)?;
        for payload in &payloads {
            out.write_all(payload)?;
        }
        out.flush()?;

        debug!(
            "wrote {} ({} bricks, {} payload bytes)",
            path.display(),
            header.bricks.len(),
            offset
        );
        Ok(())
    }
}
