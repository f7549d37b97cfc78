//! MINC2 volume files
//!
//! A MINC2 file is an HDF5 file laid out as:
//!
//! - `/minc-2.0/image/0/image`: the voxel array, with a `dimorder` attribute naming its
//!   dimensions slowest varying first and an optional `valid_range` of stored values
//! - `/minc-2.0/image/0/image-min` and `image-max`: real values the ends of the valid range map
//!   to, either scalars or one pair per slice of the leading dimensions
//! - `/minc-2.0/dimensions/<name>`: one variable per dimension carrying `step`, `start` and
//!   `units` attributes
//!
//! Integer images are converted to real values slice by slice; float images store real values.

use crate::compression::CompressionLevel;
use crate::error::{Result, VolumeError};
use crate::io::{HyperslabValues, VolumeBackend, VolumeHandle};
use crate::layout::{VolumeLayout, MAX_DIMENSIONS};
use crate::slab::{Slab, Voxel};
use crate::types::{DataType, Dimension, DimensionClass, Scaling, ValueRange};
use crate::utils::{checked_product, for_each_index, strides};
use hdf5::types::{
    FixedAscii, FixedUnicode, FloatSize, IntSize, TypeDescriptor, VarLenAscii, VarLenUnicode,
};
use hdf5::{Dataset, File, Group, H5Type, Hyperslab, Location, Selection, SliceOrIndex};
use log::debug;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const ROOT: &str = "minc-2.0";
const DIMENSIONS: &str = "minc-2.0/dimensions";
const IMAGE: &str = "minc-2.0/image/0/image";
const IMAGE_MIN: &str = "minc-2.0/image/0/image-min";
const IMAGE_MAX: &str = "minc-2.0/image/0/image-max";

/// Longest fixed-length string attribute read back
const MAX_STRING_ATTR: usize = 4096;

/// Backend reading MINC2 files through HDF5
#[derive(Debug, Clone, Copy, Default)]
pub struct Minc2Backend;

impl VolumeBackend for Minc2Backend {
    type Handle = Minc2File;

    fn open(&self, path: &Path) -> Result<Minc2File> {
        Minc2File::open(path)
    }
}

/// Map from stored to real values for one image
#[derive(Debug, Clone, PartialEq)]
enum ImageScaling {
    /// Stored values are real values
    Identity,
    /// One real range per slice of the leading `shape.len()` image dimensions
    Slices {
        valid_range: ValueRange,
        real_ranges: Vec<ValueRange>,
        shape: Vec<usize>,
    },
}

impl ImageScaling {
    fn read(file: &File, image: &Dataset, data_type: DataType, shape: &[usize]) -> Result<Self> {
        if data_type.is_float() {
            return Ok(ImageScaling::Identity);
        }
        let (Ok(min_var), Ok(max_var)) = (file.dataset(IMAGE_MIN), file.dataset(IMAGE_MAX)) else {
            return Ok(ImageScaling::Identity);
        };

        let slices = min_var.shape();
        if slices != max_var.shape()
            || slices.len() >= shape.len()
            || slices[..] != shape[..slices.len()]
        {
            return Err(VolumeError::InvalidFormat(format!(
                "image-min {:?} / image-max {:?} do not cover the leading dimensions of {:?}",
                slices,
                max_var.shape(),
                shape
            )));
        }

        let mins = min_var.read_raw::<f64>()?;
        let maxs = max_var.read_raw::<f64>()?;
        let real_ranges = mins
            .into_iter()
            .zip(maxs)
            .map(|(min, max)| ValueRange::new(min, max))
            .collect();

        let valid_range = match image.attr("valid_range") {
            Ok(attr) => match attr.read_raw::<f64>()?[..] {
                [a, b] => ValueRange::new(a.min(b), a.max(b)),
                ref other => {
                    return Err(VolumeError::InvalidFormat(format!(
                        "valid_range holds {} values",
                        other.len()
                    )))
                }
            },
            Err(_) => data_type.full_range(),
        };

        Ok(ImageScaling::Slices {
            valid_range,
            real_ranges,
            shape: slices,
        })
    }

    /// Scaling for the voxel at `coords`; `None` for real-valued images
    fn at(&self, coords: &[usize]) -> Option<Scaling> {
        match self {
            ImageScaling::Identity => None,
            ImageScaling::Slices {
                valid_range,
                real_ranges,
                shape,
            } => {
                let slice: usize = coords
                    .iter()
                    .zip(strides(shape))
                    .map(|(c, s)| c * s)
                    .sum();
                Some(Scaling::new(*valid_range, real_ranges[slice]))
            }
        }
    }
}

/// An open MINC2 file
#[derive(Debug)]
pub struct Minc2File {
    path: PathBuf,
    file: File,
    image: Dataset,
    data_type: DataType,
    dimensions: Vec<Dimension>,
    scaling: ImageScaling,
}

impl Minc2File {
    /// Open a MINC2 file for reading
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let volume = Self::open_inner(path).map_err(|e| VolumeError::open(path, e))?;
        debug!(
            "opened {} ({} {:?})",
            path.display(),
            volume.data_type,
            volume.sizes()
        );
        Ok(volume)
    }

    fn open_inner(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let image = file.dataset(IMAGE)?;

        let shape = image.shape();
        if shape.is_empty() || shape.len() > MAX_DIMENSIONS {
            return Err(VolumeError::InvalidFormat(format!(
                "image has {} dimensions",
                shape.len()
            )));
        }
        checked_product(&shape).ok_or_else(|| {
            VolumeError::InvalidFormat(format!("image of {:?} voxels is too large", shape))
        })?;

        let data_type = data_type_of(&image)?;
        let names = match string_attr(&image, "dimorder")? {
            Some(order) => order.split(',').map(|n| n.trim().to_string()).collect(),
            None => Vec::new(),
        };
        if names.len() != shape.len() {
            return Err(VolumeError::InvalidFormat(format!(
                "dimorder names {} dimensions, image has {}",
                names.len(),
                shape.len()
            )));
        }

        let dims_group = file.group(DIMENSIONS)?;
        let dimensions = names
            .iter()
            .zip(&shape)
            .map(|(name, &size)| read_dimension(&dims_group, name, size))
            .collect::<Result<Vec<_>>>()?;
        let scaling = ImageScaling::read(&file, &image, data_type, &shape)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            image,
            data_type,
            dimensions,
            scaling,
        })
    }

    /// Stored voxel type
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// All dimensions in file order
    pub fn all_dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// The `history` attribute, one processing step per line
    pub fn history(&self) -> Result<Option<String>> {
        string_attr(&*self.file.group(ROOT)?, "history")
    }
}

impl VolumeHandle for Minc2File {
    fn path(&self) -> &Path {
        &self.path
    }

    fn dimensions(&self, class: DimensionClass) -> Result<Vec<Dimension>> {
        Ok(self
            .dimensions
            .iter()
            .filter(|d| d.class == class)
            .cloned()
            .collect())
    }

    fn sizes(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.size).collect()
    }

    fn read_hyperslab<T: Voxel>(
        &self,
        values: HyperslabValues,
        slab: &Slab,
        buffer: &mut [T],
    ) -> Result<()> {
        slab.check_within(&self.sizes())?;
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

        // Read one 2-D plane (or the single row of a 1-D image) per HDF5 selection
        let ndim = slab.dimensionality();
        let lead = ndim.saturating_sub(2);
        let counts = slab.counts();
        let row_len = counts[ndim - 1];
        let plane_len: usize = counts[lead..].iter().product();

        let mut plane_end = slab.end();
        for axis in lead..ndim {
            plane_end[axis] = slab.offsets()[axis] + 1;
        }
        let mut planes = Vec::new();
        for_each_index(slab.offsets(), &plane_end, |start| planes.push(start.to_vec()));
        debug!(
            "reading {} from {} ({} planes)",
            slab,
            self.path.display(),
            planes.len()
        );

        for (start, out) in planes.iter().zip(buffer.chunks_mut(plane_len)) {
            let selection = plane_selection(start, counts, lead);
            let stored: Vec<f64> = if ndim == 1 {
                self.image.read_slice_1d::<f64, _>(selection)?.to_vec()
            } else {
                self.image
                    .read_slice_2d::<f64, _>(selection)?
                    .iter()
                    .copied()
                    .collect()
            };
            if stored.len() != plane_len {
                return Err(VolumeError::InvalidFormat(format!(
                    "selection returned {} values, expected {}",
                    stored.len(),
                    plane_len
                )));
            }

            for (row, (row_out, row_in)) in
                out.chunks_mut(row_len).zip(stored.chunks(row_len)).enumerate()
            {
                let scaling = match values {
                    HyperslabValues::Real => {
                        let mut coords = start.clone();
                        if ndim > 1 {
                            coords[lead] += row;
                        }
                        self.scaling.at(&coords)
                    }
                    HyperslabValues::Voxel => None,
                };
                for (slot, &voxel) in row_out.iter_mut().zip(row_in) {
                    let value = scaling.map_or(voxel, |s| s.to_real(voxel));
                    *slot = T::from_real(value);
                }
            }
        }

        Ok(())
    }

    fn close(self) -> Result<()> {
        let Self {
            path, file, image, ..
        } = self;
        drop(image);
        file.close()?;
        debug!("closed {}", path.display());
        Ok(())
    }
}

/// Builder writing a whole volume to a new MINC2 file
///
/// Bricks of the layout become HDF5 chunks; a non-zero compression level enables deflate.
#[derive(Debug, Clone)]
pub struct Minc2Writer {
    layout: VolumeLayout,
    compression_level: CompressionLevel,
    valid_range: Option<ValueRange>,
    real_ranges: Vec<ValueRange>,
    history: Vec<String>,
}

impl Minc2Writer {
    pub fn new(layout: VolumeLayout) -> Self {
        Self {
            layout,
            compression_level: CompressionLevel::default(),
            valid_range: None,
            real_ranges: Vec::new(),
            history: Vec::new(),
        }
    }

    /// Set the deflate level; zero stores chunks uncompressed
    pub fn with_compression_level(mut self, level: CompressionLevel) -> Self {
        self.compression_level = level;
        self
    }

    /// Map every stored value through one scaling
    pub fn with_scaling(mut self, scaling: Scaling) -> Self {
        self.valid_range = Some(scaling.valid_range);
        self.real_ranges = vec![scaling.real_range];
        self
    }

    /// Map each slice of the first dimension through its own real range
    pub fn with_slice_scaling(
        mut self,
        valid_range: ValueRange,
        real_ranges: Vec<ValueRange>,
    ) -> Self {
        self.valid_range = Some(valid_range);
        self.real_ranges = real_ranges;
        self
    }

    /// Append a history line
    pub fn with_history(mut self, line: impl Into<String>) -> Self {
        self.history.push(line.into());
        self
    }

    /// Write `data` (row-major in file order) to `path`, replacing any existing file
    pub fn write<T: Voxel + H5Type>(&self, path: impl AsRef<Path>, data: &[T]) -> Result<()> {
        let path = path.as_ref();
        let layout = &self.layout;
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
        let per_slice = self.real_ranges.len() > 1;
        if per_slice && self.real_ranges.len() != layout.dimensions[0].size {
            return Err(VolumeError::InvalidDimensions(format!(
                "{} slice ranges for {} slices of {}",
                self.real_ranges.len(),
                layout.dimensions[0].size,
                layout.dimensions[0].name
            )));
        }

        let file = File::create(path)?;
        let root = file.create_group(ROOT)?;
        if !self.history.is_empty() {
            set_string_attr(&root, "history", &self.history.join("\n"))?;
        }

        let dims_group = root.create_group("dimensions")?;
        for dim in &layout.dimensions {
            let length = i32::try_from(dim.size).map_err(|_| {
                VolumeError::InvalidDimensions(format!("{} is too long for MINC2", dim.name))
            })?;
            let var = dims_group.new_dataset::<i32>().shape(()).create(dim.name.as_str())?;
            var.new_attr::<i32>().create("length")?.write_scalar(&length)?;
            var.new_attr::<f64>().create("step")?.write_scalar(&dim.step)?;
            var.new_attr::<f64>().create("start")?.write_scalar(&dim.start)?;
            if !dim.unit.is_empty() {
                set_string_attr(&var, "units", &dim.unit)?;
            }
        }

        let image_group = root.create_group("image")?.create_group("0")?;
        let chunk: Vec<usize> = layout
            .size()
            .iter()
            .enumerate()
            .map(|(axis, &size)| layout.brick_size.get(axis).min(size))
            .collect();
        let mut builder = image_group
            .new_dataset::<T>()
            .shape(layout.size())
            .chunk(chunk);
        if self.compression_level.value() > 0 {
            builder = builder.deflate(self.compression_level.value());
        }
        let image = builder.create("image")?;
        image.write_raw(data)?;

        let dimorder: Vec<&str> = layout.dimensions.iter().map(|d| d.name.as_str()).collect();
        set_string_attr(&image, "dimorder", &dimorder.join(","))?;

        if let Some(valid) = self.valid_range {
            image
                .new_attr::<f64>()
                .shape((2,))
                .create("valid_range")?
                .write_raw(&[valid.min, valid.max][..])?;

            let mins: Vec<f64> = self.real_ranges.iter().map(|r| r.min).collect();
            let maxs: Vec<f64> = self.real_ranges.iter().map(|r| r.max).collect();
            for (name, values) in [("image-min", mins), ("image-max", maxs)] {
                if per_slice {
                    let var = image_group
                        .new_dataset::<f64>()
                        .shape(values.len())
                        .create(name)?;
                    var.write_raw(&values[..])?;
                    set_string_attr(&var, "dimorder", &layout.dimensions[0].name)?;
                } else {
                    image_group
                        .new_dataset::<f64>()
                        .shape(())
                        .create(name)?
                        .write_scalar(&values[0])?;
                }
            }
        }

        debug!(
            "wrote {} ({} {:?})",
            path.display(),
            layout.data_type,
            layout.size()
        );
        Ok(())
    }
}

fn data_type_of(image: &Dataset) -> Result<DataType> {
    let data_type = match image.dtype()?.to_descriptor()? {
        TypeDescriptor::Unsigned(IntSize::U1) => DataType::U8,
        TypeDescriptor::Unsigned(IntSize::U2) => DataType::U16,
        TypeDescriptor::Unsigned(IntSize::U4) => DataType::U32,
        TypeDescriptor::Unsigned(IntSize::U8) => DataType::U64,
        TypeDescriptor::Integer(IntSize::U1) => DataType::I8,
        TypeDescriptor::Integer(IntSize::U2) => DataType::I16,
        TypeDescriptor::Integer(IntSize::U4) => DataType::I32,
        TypeDescriptor::Integer(IntSize::U8) => DataType::I64,
        TypeDescriptor::Float(FloatSize::U4) => DataType::F32,
        TypeDescriptor::Float(FloatSize::U8) => DataType::F64,
        other => {
            return Err(VolumeError::InvalidFormat(format!(
                "unsupported voxel type {:?}",
                other
            )))
        }
    };
    Ok(data_type)
}

fn read_dimension(group: &Group, name: &str, size: usize) -> Result<Dimension> {
    let mut dim = Dimension::new(name, size, 1.0, 0.0);

    // Dimensions without a variable (e.g. vector_dimension) keep the defaults
    if let Ok(var) = group.dataset(name) {
        if let Some(step) = scalar_attr::<f64>(&var, "step")? {
            dim.step = step;
        }
        if let Some(start) = scalar_attr::<f64>(&var, "start")? {
            dim.start = start;
        }
        if let Some(units) = string_attr(&var, "units")? {
            dim.unit = units;
        }
    }

    Ok(dim)
}

fn plane_selection(start: &[usize], counts: &[usize], lead: usize) -> Selection {
    let slices: Vec<SliceOrIndex> = start
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(axis, (&start, &count))| {
            if axis < lead {
                SliceOrIndex::Index(start)
            } else {
                SliceOrIndex::SliceCount {
                    start,
                    step: 1,
                    count,
                    block: 1,
                }
            }
        })
        .collect();
    Selection::from(Hyperslab::from(slices))
}

fn scalar_attr<T: H5Type>(location: &Location, name: &str) -> Result<Option<T>> {
    match location.attr(name) {
        Ok(attr) => Ok(Some(attr.read_scalar::<T>()?)),
        Err(_) => Ok(None),
    }
}

/// Read a string attribute stored either fixed-length (libminc) or variable-length
fn string_attr(location: &Location, name: &str) -> Result<Option<String>> {
    let Ok(attr) = location.attr(name) else {
        return Ok(None);
    };

    let value = match attr.dtype()?.to_descriptor()? {
        TypeDescriptor::VarLenUnicode => attr.read_scalar::<VarLenUnicode>()?.as_str().to_owned(),
        TypeDescriptor::VarLenAscii => attr.read_scalar::<VarLenAscii>()?.as_str().to_owned(),
        TypeDescriptor::FixedUnicode(_) => attr
            .read_scalar::<FixedUnicode<MAX_STRING_ATTR>>()?
            .as_str()
            .to_owned(),
        TypeDescriptor::FixedAscii(_) => attr
            .read_scalar::<FixedAscii<MAX_STRING_ATTR>>()?
            .as_str()
            .to_owned(),
        other => {
            return Err(VolumeError::InvalidFormat(format!(
                "attribute {} is {:?}, not a string",
                name, other
            )))
        }
    };

    Ok(Some(value.trim_end_matches('\0').to_string()))
}

fn set_string_attr(location: &Location, name: &str, value: &str) -> Result<()> {
    let value = VarLenUnicode::from_str(value)
        .map_err(|e| VolumeError::InvalidFormat(format!("attribute {}: {}", name, e)))?;
    location
        .new_attr::<VarLenUnicode>()
        .create(name)?
        .write_scalar(&value)?;
    Ok(())
}
