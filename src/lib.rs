//! minc-volume - volumetric image access
//!
//! A Rust library for reading voxel data out of MINC2 volume files: whole volumes or
//! rectangular hyperslabs, converted to the numeric type the caller asks for.
//!
//! # Features
//!
//! - Handle-based backend seam ([`VolumeBackend`], [`VolumeHandle`])
//! - MINC2 (HDF5) reading and writing with per-slice image-min/image-max scaling
//! - Real-value reads through the volume's scaling, or raw stored values
//! - Owned, shape-aware [`VoxelBuffer`]s
//! - Batch opening that releases already-opened volumes when one fails
//! - Spatial dimension checks across volumes
//! - Short labels for batches of file paths
//! - A bricked cache format with Deflate, Zstd and RLE codecs and CRC32 verification
//!
//! # Example
//!
//! ```rust,no_run
//! use minc_volume::{Slab, Volume, VoxelBuffer};
//!
//! # fn main() -> minc_volume::Result<()> {
//! let volume = Volume::open("/data/subject01.mnc")?;
//! println!("grid: {:?}", volume.sizes());
//!
//! // One axial slice
//! let sizes = volume.sizes().to_vec();
//! let slab = Slab::new(vec![40, 0, 0], vec![1, sizes[1], sizes[2]])?;
//! let slice: VoxelBuffer<f64> = volume.read_slab(&slab)?;
//! println!("slice range: {:?}", slice.min_max());
//!
//! volume.close()?;
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod brick;
pub mod compression;
pub mod config;
pub mod error;
pub mod host;
pub mod io;
pub mod labels;
pub mod layout;
pub mod metadata;
pub mod minc2;
pub mod slab;
pub mod types;
pub mod utils;
pub mod volume;
pub mod writer;

// Re-exports
pub use batch::{
    check_same_dimensions, get_step_sizes, get_volume_dimensions, open_volumes,
    open_volumes_with,
};
pub use brick::{BrickBackend, BrickFile};
pub use compression::{CompressionLevel, CompressionMethod};
pub use config::{global_config, global_config_mut, Config};
pub use error::{Result, VolumeError};
pub use host::get_volume;
pub use io::{HyperslabValues, VolumeBackend, VolumeHandle};
pub use labels::path_to_filename;
pub use layout::{BrickSize, VolumeLayout};
pub use metadata::VolumeHeader;
pub use minc2::{Minc2Backend, Minc2File, Minc2Writer};
pub use slab::{Slab, Voxel, VoxelBuffer};
pub use types::{DataType, Dimension, DimensionClass, Scaling, ValueRange};
pub use volume::Volume;
pub use writer::VolumeWriter;

/// Version of the library
pub const MINC_VOLUME_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Magic number for the brick cache format
pub const VOLUME_MAGIC: &[u8; 4] = b"MNC\0";
