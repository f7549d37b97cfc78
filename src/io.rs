//! Handle-based access to volume files
//!
//! [`VolumeBackend`] opens files and hands out [`VolumeHandle`]s; everything above this module
//! (the [`Volume`](crate::Volume) wrapper, batch opening, dimension checks) only talks to these
//! two traits. [`Minc2Backend`](crate::Minc2Backend) reads MINC2 files;
//! [`BrickBackend`](crate::BrickBackend) reads local brick caches.

use crate::error::Result;
use crate::slab::{Slab, Voxel};
use crate::types::{Dimension, DimensionClass};
use std::path::Path;

/// Which values a hyperslab read returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HyperslabValues {
    /// Stored values mapped through the volume's scaling
    #[default]
    Real,
    /// Stored values as they are on disk
    Voxel,
}

/// An open volume resource, valid until [`VolumeHandle::close`]
pub trait VolumeHandle {
    /// Path the handle was opened from
    fn path(&self) -> &Path;

    /// Dimensions of the given class, in file order
    fn dimensions(&self, class: DimensionClass) -> Result<Vec<Dimension>>;

    /// Size of every dimension, in file order
    fn sizes(&self) -> Vec<usize>;

    /// Fill `buffer` with the values of `slab`, converted to `T`.
    ///
    /// `buffer` must hold exactly `slab.voxel_count()` values.
    fn read_hyperslab<T: Voxel>(
        &self,
        values: HyperslabValues,
        slab: &Slab,
        buffer: &mut [T],
    ) -> Result<()>;

    /// Release the handle
    fn close(self) -> Result<()>
    where
        Self: Sized;
}

/// Something that can open volume files read-only
pub trait VolumeBackend {
    type Handle: VolumeHandle;

    /// Open `path` for reading
    fn open(&self, path: &Path) -> Result<Self::Handle>;
}
