//! Core data types for volume files

use serde::{Deserialize, Serialize};
use std::fmt;

/// Voxel storage types supported by the container format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum DataType {
    /// Unsigned 8-bit integer
    U8 = 1,
    /// Unsigned 16-bit integer
    U16 = 2,
    /// Unsigned 32-bit integer
    U32 = 3,
    /// Unsigned 64-bit integer
    U64 = 4,
    /// Signed 8-bit integer
    I8 = 5,
    /// Signed 16-bit integer
    I16 = 6,
    /// Signed 32-bit integer
    I32 = 7,
    /// Signed 64-bit integer
    I64 = 8,
    /// 32-bit floating point
    F32 = 9,
    /// 64-bit floating point
    F64 = 10,
}

impl DataType {
    /// Size in bytes of this data type
    pub fn size_in_bytes(&self) -> usize {
        match self {
            DataType::U8 | DataType::I8 => 1,
            DataType::U16 | DataType::I16 => 2,
            DataType::U32 | DataType::I32 | DataType::F32 => 4,
            DataType::U64 | DataType::I64 | DataType::F64 => 8,
        }
    }

    /// Check if this is a floating point type
    pub fn is_float(&self) -> bool {
        matches!(self, DataType::F32 | DataType::F64)
    }

    /// Every value the type can store, as used when a file records no valid range
    pub fn full_range(&self) -> ValueRange {
        let (min, max) = match self {
            DataType::U8 => (0.0, u8::MAX as f64),
            DataType::U16 => (0.0, u16::MAX as f64),
            DataType::U32 => (0.0, u32::MAX as f64),
            DataType::U64 => (0.0, u64::MAX as f64),
            DataType::I8 => (i8::MIN as f64, i8::MAX as f64),
            DataType::I16 => (i16::MIN as f64, i16::MAX as f64),
            DataType::I32 => (i32::MIN as f64, i32::MAX as f64),
            DataType::I64 => (i64::MIN as f64, i64::MAX as f64),
            DataType::F32 => (f32::MIN as f64, f32::MAX as f64),
            DataType::F64 => (f64::MIN, f64::MAX),
        };
        ValueRange::new(min, max)
    }

    /// Decode one little-endian stored value as `f64`.
    ///
    /// `bytes` must be exactly [`DataType::size_in_bytes`] long.
    pub fn decode_le(&self, bytes: &[u8]) -> f64 {
        fn arr<const N: usize>(bytes: &[u8]) -> [u8; N] {
            let mut out = [0u8; N];
            out.copy_from_slice(&bytes[..N]);
            out
        }

        match self {
            DataType::U8 => bytes[0] as f64,
            DataType::I8 => bytes[0] as i8 as f64,
            DataType::U16 => u16::from_le_bytes(arr(bytes)) as f64,
            DataType::I16 => i16::from_le_bytes(arr(bytes)) as f64,
            DataType::U32 => u32::from_le_bytes(arr(bytes)) as f64,
            DataType::I32 => i32::from_le_bytes(arr(bytes)) as f64,
            DataType::U64 => u64::from_le_bytes(arr(bytes)) as f64,
            DataType::I64 => i64::from_le_bytes(arr(bytes)) as f64,
            DataType::F32 => f32::from_le_bytes(arr(bytes)) as f64,
            DataType::F64 => f64::from_le_bytes(arr(bytes)),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Class of a volume dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DimensionClass {
    /// Physical space (`xspace`, `yspace`, `zspace`)
    Spatial,
    /// Time
    Time,
    /// Spatial or temporal frequency
    Frequency,
    /// Record (e.g. vector components)
    Record,
    /// Anything else
    User,
}

impl DimensionClass {
    /// Infer the class from a conventional dimension name
    pub fn from_name(name: &str) -> Self {
        match name {
            "xspace" | "yspace" | "zspace" => DimensionClass::Spatial,
            "time" => DimensionClass::Time,
            "xfrequency" | "yfrequency" | "zfrequency" | "tfrequency" => DimensionClass::Frequency,
            "vector_dimension" => DimensionClass::Record,
            _ => DimensionClass::User,
        }
    }
}

/// A named axis of the voxel grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dimension {
    /// Name of the dimension (e.g., "xspace", "time")
    pub name: String,
    /// Dimension class
    pub class: DimensionClass,
    /// Number of samples along this dimension
    pub size: usize,
    /// Separation between samples
    pub step: f64,
    /// World coordinate of the first sample
    pub start: f64,
    /// Unit of measurement (e.g., "mm", "s")
    pub unit: String,
}

impl Dimension {
    /// Create a new dimension, inferring the class from its name
    pub fn new(name: impl Into<String>, size: usize, step: f64, start: f64) -> Self {
        let name = name.into();
        let class = DimensionClass::from_name(&name);
        let unit = match class {
            DimensionClass::Time => "s",
            DimensionClass::Spatial => "mm",
            _ => "",
        };
        Self {
            name,
            class,
            size,
            step,
            start,
            unit: unit.to_string(),
        }
    }

    /// Override the dimension class
    pub fn with_class(mut self, class: DimensionClass) -> Self {
        self.class = class;
        self
    }

    /// Set the unit
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    /// Convert sample index to world coordinate
    pub fn index_to_coord(&self, index: usize) -> f64 {
        self.start + index as f64 * self.step
    }

    /// World coordinate of the last sample
    pub fn coord_end(&self) -> f64 {
        self.index_to_coord(self.size.saturating_sub(1))
    }
}

/// Value range for a volume
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min <= self.max
    }

    pub fn width(&self) -> f64 {
        self.max - self.min
    }
}

/// Linear map from stored voxel values to real values
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scaling {
    /// Range of stored values
    pub valid_range: ValueRange,
    /// Range of real values the valid range maps onto
    pub real_range: ValueRange,
}

impl Scaling {
    pub fn new(valid_range: ValueRange, real_range: ValueRange) -> Self {
        Self {
            valid_range,
            real_range,
        }
    }

    /// Convert a stored value to its real value
    pub fn to_real(&self, voxel: f64) -> f64 {
        let valid_width = self.valid_range.width();
        if valid_width == 0.0 {
            return self.real_range.min;
        }
        let scale = self.real_range.width() / valid_width;
        self.real_range.min + (voxel - self.valid_range.min) * scale
    }

    /// Convert a real value to the nearest stored value
    pub fn to_voxel(&self, real: f64) -> f64 {
        let real_width = self.real_range.width();
        if real_width == 0.0 {
            return self.valid_range.min;
        }
        let scale = self.valid_range.width() / real_width;
        (self.valid_range.min + (real - self.real_range.min) * scale).round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::U8.size_in_bytes(), 1);
        assert_eq!(DataType::U16.size_in_bytes(), 2);
        assert_eq!(DataType::F32.size_in_bytes(), 4);
        assert_eq!(DataType::F64.size_in_bytes(), 8);
        assert!(DataType::F32.is_float());
        assert!(!DataType::I16.is_float());
    }

    #[test]
    fn test_full_range() {
        assert_eq!(DataType::U8.full_range(), ValueRange::new(0.0, 255.0));
        assert_eq!(DataType::I16.full_range(), ValueRange::new(-32768.0, 32767.0));
    }

    #[test]
    fn test_decode_le() {
        assert_eq!(DataType::U8.decode_le(&[200]), 200.0);
        assert_eq!(DataType::I8.decode_le(&[0xff]), -1.0);
        assert_eq!(DataType::I16.decode_le(&(-300i16).to_le_bytes()), -300.0);
        assert_eq!(DataType::U32.decode_le(&70000u32.to_le_bytes()), 70000.0);
        assert_eq!(DataType::F32.decode_le(&1.5f32.to_le_bytes()), 1.5);
        assert_eq!(DataType::F64.decode_le(&(-2.25f64).to_le_bytes()), -2.25);
    }

    #[test]
    fn test_dimension_class_from_name() {
        assert_eq!(DimensionClass::from_name("xspace"), DimensionClass::Spatial);
        assert_eq!(DimensionClass::from_name("zspace"), DimensionClass::Spatial);
        assert_eq!(DimensionClass::from_name("time"), DimensionClass::Time);
        assert_eq!(DimensionClass::from_name("vector_dimension"), DimensionClass::Record);
        assert_eq!(DimensionClass::from_name("echo"), DimensionClass::User);
    }

    #[test]
    fn test_dimension_coords() {
        let dim = Dimension::new("zspace", 11, 2.0, -10.0);
        assert_eq!(dim.class, DimensionClass::Spatial);
        assert_eq!(dim.unit, "mm");
        assert_eq!(dim.index_to_coord(0), -10.0);
        assert_eq!(dim.coord_end(), 10.0);
    }

    #[test]
    fn test_scaling() {
        let scaling = Scaling::new(ValueRange::new(0.0, 255.0), ValueRange::new(-1.0, 1.0));
        assert_eq!(scaling.to_real(0.0), -1.0);
        assert_eq!(scaling.to_real(255.0), 1.0);
        assert_eq!(scaling.to_voxel(1.0), 255.0);
        assert_eq!(scaling.to_voxel(-1.0), 0.0);
    }
}
