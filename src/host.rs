//! Entry points for host environments that only exchange flat numeric arrays

use crate::error::Result;
use crate::volume::Volume;
use std::path::Path;

/// Read every voxel of a MINC2 file as real `f64` values, in file order.
pub fn get_volume(filename: impl AsRef<Path>) -> Result<Vec<f64>> {
    let volume = Volume::open(filename)?;
    let mut values = vec![0.0; volume.size()];
    volume.read_volume_to_buffer(&mut values)?;
    volume.close()?;
    Ok(values)
}
