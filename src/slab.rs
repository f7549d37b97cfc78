//! Slab requests and owned voxel buffers

use crate::error::{Result, VolumeError};
use crate::types::DataType;
use crate::utils::{checked_product, strides};
use ndarray::{ArrayD, IxDyn};
use num_traits::ToPrimitive;
use std::fmt;
use std::ops::Deref;

/// A rectangular region of the voxel grid: one offset and one count per dimension
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Slab {
    offsets: Vec<usize>,
    counts: Vec<usize>,
}

impl Slab {
    /// Create a slab request.
    ///
    /// Bounds are not checked here; the backend rejects regions outside its grid.
    pub fn new(offsets: Vec<usize>, counts: Vec<usize>) -> Result<Self> {
        if offsets.len() != counts.len() {
            return Err(VolumeError::InvalidDimensions(format!(
                "slab has {} offsets but {} counts",
                offsets.len(),
                counts.len()
            )));
        }
        Ok(Self { offsets, counts })
    }

    /// The slab covering a whole grid of the given sizes
    pub fn whole(sizes: &[usize]) -> Self {
        Self {
            offsets: vec![0; sizes.len()],
            counts: sizes.to_vec(),
        }
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn counts(&self) -> &[usize] {
        &self.counts
    }

    pub fn dimensionality(&self) -> usize {
        self.offsets.len()
    }

    /// Number of voxels in the region
    pub fn voxel_count(&self) -> usize {
        self.counts.iter().product()
    }

    /// Exclusive end coordinate in each dimension
    pub fn end(&self) -> Vec<usize> {
        self.offsets
            .iter()
            .zip(&self.counts)
            .map(|(o, c)| o + c)
            .collect()
    }

    /// Check the slab lies inside a grid of the given sizes
    pub fn check_within(&self, sizes: &[usize]) -> Result<()> {
        if self.dimensionality() != sizes.len() {
            return Err(VolumeError::InvalidDimensions(format!(
                "slab has {} dimensions, volume has {}",
                self.dimensionality(),
                sizes.len()
            )));
        }

        for (axis, ((&offset, &count), &size)) in
            self.offsets.iter().zip(&self.counts).zip(sizes).enumerate()
        {
            let in_range = offset
                .checked_add(count)
                .is_some_and(|end| end <= size);
            if !in_range {
                return Err(VolumeError::OutOfBounds(format!(
                    "axis {}: offset {} + count {} exceeds size {}",
                    axis, offset, count, size
                )));
            }
        }

        Ok(())
    }
}

impl fmt::Display for Slab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "offsets {:?} counts {:?}", self.offsets, self.counts)
    }
}

/// Element types voxel values can be read into and written from
pub trait Voxel: Copy + Default + ToPrimitive + fmt::Debug + 'static {
    /// Storage type with the same representation
    const DATA_TYPE: DataType;

    /// Convert a real value, rounding to nearest and saturating for integers
    fn from_real(value: f64) -> Self;

    /// Append the little-endian representation
    fn write_le(self, out: &mut Vec<u8>);
}

macro_rules! impl_voxel_int {
    ($($t:ty => $dt:ident),* $(,)?) => {$(
        impl Voxel for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn from_real(value: f64) -> Self {
                value.round() as $t
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

macro_rules! impl_voxel_float {
    ($($t:ty => $dt:ident),* $(,)?) => {$(
        impl Voxel for $t {
            const DATA_TYPE: DataType = DataType::$dt;

            fn from_real(value: f64) -> Self {
                value as $t
            }

            fn write_le(self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }
        }
    )*};
}

impl_voxel_int!(
    u8 => U8, u16 => U16, u32 => U32, u64 => U64,
    i8 => I8, i16 => I16, i32 => I32, i64 => I64,
);
impl_voxel_float!(f32 => F32, f64 => F64);

/// Owned voxel values of a slab, in row-major file order
#[derive(Debug, Clone, PartialEq)]
pub struct VoxelBuffer<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T: Voxel> VoxelBuffer<T> {
    /// A buffer of default values sized for `shape`
    pub fn zeroed(shape: Vec<usize>) -> Result<Self> {
        let len = buffer_len(&shape)?;
        Ok(Self {
            shape,
            data: vec![T::default(); len],
        })
    }

    /// Wrap existing values; `data` must hold exactly one value per voxel of `shape`
    pub fn from_vec(shape: Vec<usize>, data: Vec<T>) -> Result<Self> {
        let expected = buffer_len(&shape)?;
        if data.len() != expected {
            return Err(VolumeError::InvalidDimensions(format!(
                "buffer of shape {:?} needs {} values, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Value at a multi-dimensional index, `None` when out of range
    pub fn get(&self, index: &[usize]) -> Option<&T> {
        let outside = index.iter().zip(&self.shape).any(|(i, s)| i >= s);
        if index.len() != self.shape.len() || outside {
            return None;
        }
        let linear: usize = index
            .iter()
            .zip(strides(&self.shape))
            .map(|(i, s)| i * s)
            .sum();
        self.data.get(linear)
    }

    /// Smallest and largest value, ignoring NaN
    pub fn min_max(&self) -> Option<(f64, f64)> {
        self.data
            .iter()
            .filter_map(|v| v.to_f64())
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    /// Convert into an n-dimensional array with the buffer's shape
    pub fn into_array(self) -> Result<ArrayD<T>> {
        ArrayD::from_shape_vec(IxDyn(&self.shape), self.data)
            .map_err(|e| VolumeError::InvalidDimensions(e.to_string()))
    }
}

fn buffer_len(shape: &[usize]) -> Result<usize> {
    checked_product(shape).ok_or_else(|| {
        VolumeError::InvalidDimensions(format!("buffer of shape {:?} is too large", shape))
    })
}

impl<T> Deref for VoxelBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.data
    }
}
