//! Volume wrapper - the main API for reading voxel data

use crate::error::{Result, VolumeError};
use crate::io::{HyperslabValues, VolumeBackend, VolumeHandle};
use crate::minc2::{Minc2Backend, Minc2File};
use crate::slab::{Slab, Voxel, VoxelBuffer};
use std::path::Path;

/// An open volume and the size of its voxel grid
///
/// Read failures are reported as [`VolumeError::Read`] naming the file.
#[derive(Debug)]
pub struct Volume<H: VolumeHandle = Minc2File> {
    handle: H,
    sizes: Vec<usize>,
}

impl Volume<Minc2File> {
    /// Open a MINC2 file read-only
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(&Minc2Backend, path)
    }
}

impl<H: VolumeHandle> Volume<H> {
    /// Open `path` through a specific backend
    pub fn open_with<B>(backend: &B, path: impl AsRef<Path>) -> Result<Self>
    where
        B: VolumeBackend<Handle = H>,
    {
        Ok(Self::from_handle(backend.open(path.as_ref())?))
    }

    /// Wrap an already open handle
    pub fn from_handle(handle: H) -> Self {
        let sizes = handle.sizes();
        Self { handle, sizes }
    }

    /// Size of every dimension, in file order
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Total number of voxels
    pub fn size(&self) -> usize {
        self.sizes.iter().product()
    }

    /// Path the volume was opened from
    pub fn path(&self) -> &Path {
        self.handle.path()
    }

    /// The backend handle
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Read the real values of `slab` into a caller-provided buffer
    pub fn read_slab_to_buffer<T: Voxel>(&self, slab: &Slab, buffer: &mut [T]) -> Result<()> {
        self.read_values(HyperslabValues::Real, slab, buffer)
    }

    /// Read the real values of `slab` into a new buffer shaped like the slab
    pub fn read_slab<T: Voxel>(&self, slab: &Slab) -> Result<VoxelBuffer<T>> {
        let mut buffer = self.slab_buffer(slab)?;
        self.read_slab_to_buffer(slab, buffer.as_mut_slice())?;
        Ok(buffer)
    }

    /// Read the stored (unscaled) values of `slab`
    pub fn read_voxel_slab<T: Voxel>(&self, slab: &Slab) -> Result<VoxelBuffer<T>> {
        let mut buffer = self.slab_buffer(slab)?;
        self.read_values(HyperslabValues::Voxel, slab, buffer.as_mut_slice())?;
        Ok(buffer)
    }

    /// Read the whole volume into a caller-provided buffer
    pub fn read_volume_to_buffer<T: Voxel>(&self, buffer: &mut [T]) -> Result<()> {
        self.read_slab_to_buffer(&Slab::whole(&self.sizes), buffer)
    }

    /// Read the whole volume into a new buffer
    pub fn read_volume<T: Voxel>(&self) -> Result<VoxelBuffer<T>> {
        self.read_slab(&Slab::whole(&self.sizes))
    }

    /// Release the underlying handle
    pub fn close(self) -> Result<()> {
        self.handle.close()
    }

    /// Give up the wrapper and keep the open handle
    pub fn into_handle(self) -> H {
        self.handle
    }

    /// Output buffer for `slab`, allocated only once the slab is known to fit the grid
    fn slab_buffer<T: Voxel>(&self, slab: &Slab) -> Result<VoxelBuffer<T>> {
        slab.check_within(&self.sizes)
            .and_then(|()| VoxelBuffer::zeroed(slab.counts().to_vec()))
            .map_err(|e| VolumeError::read(self.handle.path(), e))
    }

    fn read_values<T: Voxel>(
        &self,
        values: HyperslabValues,
        slab: &Slab,
        buffer: &mut [T],
    ) -> Result<()> {
        self.handle
            .read_hyperslab(values, slab, buffer)
            .map_err(|e| VolumeError::read(self.handle.path(), e))
    }
}
