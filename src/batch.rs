//! Opening groups of volumes and comparing their spatial grids

use crate::error::{Result, VolumeError};
use crate::io::{VolumeBackend, VolumeHandle};
use crate::minc2::{Minc2Backend, Minc2File};
use crate::types::{Dimension, DimensionClass};
use log::{debug, warn};
use std::path::Path;

/// Number of spatial dimensions the accessors expect
pub const SPATIAL_DIMENSIONS: usize = 3;

/// Open every MINC2 path read-only, in order.
///
/// If any open fails, the volumes opened before it are closed and the original error is
/// returned.
pub fn open_volumes<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Minc2File>> {
    open_volumes_with(&Minc2Backend, paths)
}

/// [`open_volumes`] through a specific backend
pub fn open_volumes_with<B, P>(backend: &B, paths: &[P]) -> Result<Vec<B::Handle>>
where
    B: VolumeBackend,
    P: AsRef<Path>,
{
    let mut volumes = Vec::with_capacity(paths.len());

    for path in paths {
        match backend.open(path.as_ref()) {
            Ok(handle) => volumes.push(handle),
            Err(err) => {
                debug!(
                    "failed to open {}, closing {} opened volumes",
                    path.as_ref().display(),
                    volumes.len()
                );
                for volume in volumes {
                    let opened = volume.path().to_path_buf();
                    if let Err(close_err) = volume.close() {
                        warn!("failed to close {}: {}", opened.display(), close_err);
                    }
                }
                return Err(err);
            }
        }
    }

    Ok(volumes)
}

/// Check that every volume has the same spatial sizes as the first one.
///
/// Stops at the first mismatch. Fails if `volumes` is empty or a volume's spatial dimensions
/// cannot be read.
pub fn check_same_dimensions<H: VolumeHandle>(volumes: &[H]) -> Result<bool> {
    let (first, rest) = volumes.split_first().ok_or(VolumeError::EmptyBatch)?;
    let reference = get_volume_dimensions(first)?;

    for volume in rest {
        if get_volume_dimensions(volume)? != reference {
            debug!(
                "{} does not match the spatial grid of {}",
                volume.path().display(),
                first.path().display()
            );
            return Ok(false);
        }
    }

    Ok(true)
}

/// Sizes of the three spatial dimensions, in file order
pub fn get_volume_dimensions<H: VolumeHandle>(volume: &H) -> Result<[usize; SPATIAL_DIMENSIONS]> {
    let dims = spatial_dimensions(volume)?;

    let mut sizes = [0; SPATIAL_DIMENSIONS];
    for (size, dim) in sizes.iter_mut().zip(&dims) {
        if dim.size == 0 {
            return Err(VolumeError::DimensionQuery {
                path: volume.path().to_path_buf(),
                message: "Couldn't read dimension sizes".to_string(),
            });
        }
        *size = dim.size;
    }
    Ok(sizes)
}

/// Separations of the three spatial dimensions, in file order
pub fn get_step_sizes<H: VolumeHandle>(volume: &H) -> Result<[f64; SPATIAL_DIMENSIONS]> {
    let dims = spatial_dimensions(volume)?;

    let mut steps = [0.0; SPATIAL_DIMENSIONS];
    for (step, dim) in steps.iter_mut().zip(&dims) {
        if !dim.step.is_finite() {
            return Err(VolumeError::StepQuery {
                path: volume.path().to_path_buf(),
                message: "Couldn't read volume step sizes".to_string(),
            });
        }
        *step = dim.step;
    }
    Ok(steps)
}

fn spatial_dimensions<H: VolumeHandle>(volume: &H) -> Result<Vec<Dimension>> {
    let query_failed = || VolumeError::DimensionQuery {
        path: volume.path().to_path_buf(),
        message: "Couldn't read volume dimensions".to_string(),
    };

    let dims = volume
        .dimensions(DimensionClass::Spatial)
        .map_err(|_| query_failed())?;
    if dims.len() != SPATIAL_DIMENSIONS {
        return Err(query_failed());
    }
    Ok(dims)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::HyperslabValues;
    use crate::slab::{Slab, Voxel};
    use std::cell::RefCell;
    use std::path::PathBuf;

    /// In-memory handle that only knows its dimensions
    #[derive(Debug)]
    struct FakeHandle<'a> {
        path: PathBuf,
        dims: Vec<Dimension>,
        closed: &'a RefCell<Vec<PathBuf>>,
    }

    impl VolumeHandle for FakeHandle<'_> {
        fn path(&self) -> &Path {
            &self.path
        }

        fn dimensions(&self, class: DimensionClass) -> Result<Vec<Dimension>> {
            Ok(self.dims.iter().filter(|d| d.class == class).cloned().collect())
        }

        fn sizes(&self) -> Vec<usize> {
            self.dims.iter().map(|d| d.size).collect()
        }

        fn read_hyperslab<T: Voxel>(
            &self,
            _values: HyperslabValues,
            _slab: &Slab,
            _buffer: &mut [T],
        ) -> Result<()> {
            Ok(())
        }

        fn close(self) -> Result<()> {
            self.closed.borrow_mut().push(self.path);
            Ok(())
        }
    }

    /// Opens any path not containing "missing"; records closes
    struct FakeBackend {
        opened: RefCell<usize>,
        closed: RefCell<Vec<PathBuf>>,
    }

    impl FakeBackend {
        fn new() -> Self {
            Self {
                opened: RefCell::new(0),
                closed: RefCell::new(Vec::new()),
            }
        }

        fn handle(&self, path: &str, sizes: [usize; 3]) -> FakeHandle<'_> {
            FakeHandle {
                path: PathBuf::from(path),
                dims: vec![
                    Dimension::new("zspace", sizes[0], 1.0, 0.0),
                    Dimension::new("yspace", sizes[1], 1.0, 0.0),
                    Dimension::new("xspace", sizes[2], 1.0, 0.0),
                ],
                closed: &self.closed,
            }
        }
    }

    impl<'a> VolumeBackend for &'a FakeBackend {
        type Handle = FakeHandle<'a>;

        fn open(&self, path: &Path) -> Result<FakeHandle<'a>> {
            let name = path.to_string_lossy();
            if name.contains("missing") {
                return Err(VolumeError::open(
                    path,
                    VolumeError::InvalidFormat("no such volume".into()),
                ));
            }
            *self.opened.borrow_mut() += 1;
            Ok((*self).handle(&name, [2, 2, 2]))
        }
    }

    #[test]
    fn test_batch_open_closes_on_failure() {
        let backend = FakeBackend::new();
        let paths = ["a.mnc", "b.mnc", "missing.mnc", "d.mnc"];

        let err = open_volumes_with(&&backend, &paths).unwrap_err();
        assert!(matches!(
            err,
            VolumeError::Open { ref path, .. } if path == Path::new("missing.mnc")
        ));

        // Exactly the two volumes opened before the failure were closed
        assert_eq!(*backend.opened.borrow(), 2);
        assert_eq!(
            *backend.closed.borrow(),
            vec![PathBuf::from("a.mnc"), PathBuf::from("b.mnc")]
        );
    }

    #[test]
    fn test_batch_open_success() {
        let backend = FakeBackend::new();
        let volumes = open_volumes_with(&&backend, &["a.mnc", "b.mnc"]).unwrap();
        assert_eq!(volumes.len(), 2);
        assert!(backend.closed.borrow().is_empty());
        assert!(check_same_dimensions(&volumes).unwrap());
    }

    #[test]
    fn test_first_open_failure_closes_nothing() {
        let backend = FakeBackend::new();
        assert!(open_volumes_with(&&backend, &["missing.mnc", "b.mnc"]).is_err());
        assert_eq!(*backend.opened.borrow(), 0);
        assert!(backend.closed.borrow().is_empty());
    }

    #[test]
    fn test_check_same_dimensions() {
        let backend = FakeBackend::new();
        let same = vec![
            backend.handle("a", [10, 20, 30]),
            backend.handle("b", [10, 20, 30]),
            backend.handle("c", [10, 20, 30]),
        ];
        assert!(check_same_dimensions(&same).unwrap());

        for axis in 0..3 {
            let mut sizes = [10, 20, 30];
            sizes[axis] += 1;
            let differ = vec![
                backend.handle("a", [10, 20, 30]),
                backend.handle("b", [10, 20, 30]),
                backend.handle("c", sizes),
            ];
            assert!(!check_same_dimensions(&differ).unwrap());
        }

        assert!(check_same_dimensions(&same[..1]).unwrap());
    }

    #[test]
    fn test_check_short_circuits() {
        let backend = FakeBackend::new();
        let mut broken = backend.handle("broken", [1, 1, 1]);
        broken.dims.truncate(2);

        // The mismatch at "b" is found before the unreadable volume is queried
        let volumes = vec![
            backend.handle("a", [4, 4, 4]),
            backend.handle("b", [4, 4, 5]),
            broken,
        ];
        assert!(!check_same_dimensions(&volumes).unwrap());
    }

    #[test]
    fn test_check_empty_batch() {
        let volumes: Vec<FakeHandle<'_>> = Vec::new();
        assert!(matches!(
            check_same_dimensions(&volumes),
            Err(VolumeError::EmptyBatch)
        ));
    }

    #[test]
    fn test_dimension_accessors() {
        let backend = FakeBackend::new();
        let mut handle = backend.handle("a", [3, 4, 5]);
        handle.dims[1].step = -1.5;
        assert_eq!(get_volume_dimensions(&handle).unwrap(), [3, 4, 5]);
        assert_eq!(get_step_sizes(&handle).unwrap(), [1.0, -1.5, 1.0]);

        handle.dims[2].step = f64::NAN;
        assert!(matches!(
            get_step_sizes(&handle),
            Err(VolumeError::StepQuery { .. })
        ));

        // A time axis does not count as spatial
        handle.dims.push(Dimension::new("time", 7, 1.0, 0.0));
        assert_eq!(get_volume_dimensions(&handle).unwrap(), [3, 4, 5]);

        handle.dims.remove(0);
        let err = get_volume_dimensions(&handle).unwrap_err();
        assert_eq!(err.to_string(), "Couldn't read volume dimensions: a");
    }
}
