//! Volume layout - describes the voxel grid and how it is divided into bricks

use crate::config::global_config;
use crate::error::{Result, VolumeError};
use crate::types::{DataType, Dimension, DimensionClass};
use crate::utils::checked_product;
use serde::{Deserialize, Serialize};

/// Maximum number of dimensions a volume may have
pub const MAX_DIMENSIONS: usize = 8;

/// Size of a brick in each dimension (file order)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrickSize {
    dims: Vec<usize>,
}

impl BrickSize {
    /// Create a new brick size
    pub fn new(dims: Vec<usize>) -> Self {
        Self { dims }
    }

    /// Create a brick size with the same edge length in every dimension
    pub fn uniform(dimensionality: usize, size: usize) -> Self {
        Self {
            dims: vec![size; dimensionality],
        }
    }

    /// Get the size for a specific dimension
    pub fn get(&self, dim: usize) -> usize {
        self.dims.get(dim).copied().unwrap_or(1)
    }

    /// Get all dimensions
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }
}

/// Layout of volume data - describes how the volume is organized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeLayout {
    /// Stored voxel type
    pub data_type: DataType,

    /// Dimensions in file order, slowest varying first
    pub dimensions: Vec<Dimension>,

    /// Brick size for chunking
    pub brick_size: BrickSize,
}

impl VolumeLayout {
    /// Create a new layout using the configured default brick size
    pub fn new(data_type: DataType, dimensions: Vec<Dimension>) -> Result<Self> {
        let edge = global_config().default_brick_size();
        let brick_size = BrickSize::uniform(dimensions.len(), edge);
        let layout = Self {
            data_type,
            dimensions,
            brick_size,
        };
        layout.validate()?;
        Ok(layout)
    }

    /// Set the brick size
    pub fn with_brick_size(mut self, brick_size: BrickSize) -> Result<Self> {
        self.brick_size = brick_size;
        self.validate()?;
        Ok(self)
    }

    /// Check the structural invariants of the layout
    pub fn validate(&self) -> Result<()> {
        let dimensionality = self.dimensionality();
        if dimensionality == 0 || dimensionality > MAX_DIMENSIONS {
            return Err(VolumeError::InvalidDimensions(format!(
                "Dimensionality must be between 1 and {}, got {}",
                MAX_DIMENSIONS, dimensionality
            )));
        }

        if self.brick_size.dims().len() != dimensionality {
            return Err(VolumeError::InvalidDimensions(
                "Brick size dimensionality must match volume dimensionality".to_string(),
            ));
        }

        if self.brick_size.dims().iter().any(|&b| b == 0) {
            return Err(VolumeError::InvalidDimensions(
                "Brick sizes must be non-zero".to_string(),
            ));
        }

        if let Some(dim) = self.dimensions.iter().find(|d| d.size == 0) {
            return Err(VolumeError::InvalidDimensions(format!(
                "Dimension {} has zero size",
                dim.name
            )));
        }

        // Every other size computed from the layout is bounded by the total byte count
        let total_bytes = checked_product(&self.size())
            .and_then(|voxels| voxels.checked_mul(self.data_type.size_in_bytes()));
        if total_bytes.is_none() {
            return Err(VolumeError::InvalidDimensions(format!(
                "a {:?} grid of {} voxels does not fit in memory",
                self.size(),
                self.data_type
            )));
        }

        Ok(())
    }

    /// Number of dimensions
    pub fn dimensionality(&self) -> usize {
        self.dimensions.len()
    }

    /// Get the total size in each dimension
    pub fn size(&self) -> Vec<usize> {
        self.dimensions.iter().map(|d| d.size).collect()
    }

    /// Total number of voxels
    pub fn total_voxels(&self) -> usize {
        self.dimensions.iter().map(|d| d.size).product()
    }

    /// Dimensions of the given class, in file order
    pub fn dimensions_of_class(&self, class: DimensionClass) -> Vec<&Dimension> {
        self.dimensions.iter().filter(|d| d.class == class).collect()
    }

    /// Get the number of bricks in each dimension
    pub fn brick_count(&self) -> Vec<usize> {
        self.dimensions
            .iter()
            .enumerate()
            .map(|(i, dim)| dim.size.div_ceil(self.brick_size.get(i)))
            .collect()
    }

    /// Get the total number of bricks
    pub fn total_bricks(&self) -> usize {
        self.brick_count().iter().product()
    }

    /// Convert a brick index to brick coordinates
    pub fn brick_index_to_coords(&self, index: usize) -> Vec<usize> {
        let brick_count = self.brick_count();
        let mut coords = vec![0; self.dimensionality()];
        let mut remaining = index;

        for (i, coord) in coords.iter_mut().enumerate() {
            let stride: usize = brick_count.iter().skip(i + 1).product();
            *coord = remaining / stride;
            remaining %= stride;
        }

        coords
    }

    /// Convert brick coordinates to a brick index
    pub fn brick_coords_to_index(&self, coords: &[usize]) -> usize {
        let brick_count = self.brick_count();
        let mut index = 0;

        for (i, &coord) in coords.iter().enumerate().take(self.dimensionality()) {
            let stride: usize = brick_count.iter().skip(i + 1).product();
            index += coord * stride;
        }

        index
    }

    /// Get the voxel range `[start, end)` of a brick in each dimension
    pub fn brick_data_range(&self, brick_coords: &[usize]) -> Vec<(usize, usize)> {
        brick_coords
            .iter()
            .enumerate()
            .map(|(i, &coord)| {
                let brick_dim = self.brick_size.get(i);
                let start = coord * brick_dim;
                let end = start.saturating_add(brick_dim).min(self.dimensions[i].size);
                (start, end)
            })
            .collect()
    }

    /// Size in bytes of a brick once decompressed (edge bricks are smaller)
    pub fn brick_size_bytes(&self, brick_coords: &[usize]) -> usize {
        let voxels: usize = self
            .brick_data_range(brick_coords)
            .iter()
            .map(|(start, end)| end - start)
            .product();
        voxels * self.data_type.size_in_bytes()
    }

    /// Calculate the total volume size in bytes (uncompressed)
    pub fn total_size_bytes(&self) -> usize {
        self.total_voxels() * self.data_type.size_in_bytes()
    }

    /// Get a summary string of the layout
    pub fn summary(&self) -> String {
        let size_str = self
            .dimensions
            .iter()
            .map(|d| format!("{}={}", d.name, d.size))
            .collect::<Vec<_>>()
            .join(" x ");

        format!(
            "{}D Volume: {} ({:?}), {} bricks, {:.2} MB uncompressed",
            self.dimensionality(),
            size_str,
            self.data_type,
            self.total_bricks(),
            self.total_size_bytes() as f64 / (1024.0 * 1024.0)
        )
    }
}
