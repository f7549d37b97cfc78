//! Example: Print a summary of each MINC2 file and check they share a grid
//!
//! Run with: cargo run --example volume_info -- a.mnc b.mnc ...
//!
//! With no arguments, two small demo volumes are written to a temporary directory first.

use anyhow::{bail, Context};
use minc_volume::{
    check_same_dimensions, get_step_sizes, open_volumes, path_to_filename, utils::format_bytes,
    DataType, Dimension, Minc2Writer, VolumeLayout,
};
use std::path::PathBuf;

fn write_demo_volumes(dir: &std::path::Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for subject in ["s01", "s02"] {
        let subject_dir = dir.join(subject);
        std::fs::create_dir_all(&subject_dir)?;

        let layout = VolumeLayout::new(
            DataType::U8,
            vec![
                Dimension::new("zspace", 20, 1.0, -10.0),
                Dimension::new("yspace", 24, 1.0, -12.0),
                Dimension::new("xspace", 16, 1.0, -8.0),
            ],
        )?;
        let data: Vec<u8> = (0..20 * 24 * 16).map(|v| (v % 251) as u8).collect();

        let path = subject_dir.join("t1.mnc");
        Minc2Writer::new(layout)
            .with_history(format!("volume_info demo volume for {subject}"))
            .write(&path, &data)?;
        paths.push(path);
    }
    Ok(paths)
}

fn main() -> anyhow::Result<()> {
    let temp_dir = tempfile::tempdir()?;
    let mut paths: Vec<PathBuf> = std::env::args().skip(1).map(PathBuf::from).collect();
    if paths.is_empty() {
        paths = write_demo_volumes(temp_dir.path())?;
    }

    let names: Vec<String> = paths
        .iter()
        .map(|p| p.to_string_lossy().into_owned())
        .collect();
    let labels = path_to_filename(&names);

    let volumes = open_volumes(&paths).context("opening volumes")?;
    for ((label, path), volume) in labels.iter().zip(&paths).zip(&volumes) {
        let layout = VolumeLayout::new(volume.data_type(), volume.all_dimensions().to_vec())?;
        println!("{label}");
        println!("  {}", layout.summary());
        println!("  on disk: {}", format_bytes(std::fs::metadata(path)?.len()));
        println!("  steps: {:?}", get_step_sizes(volume)?);
        for line in volume.history()?.iter().flat_map(|h| h.lines()) {
            println!("  history: {line}");
        }
    }

    if !check_same_dimensions(&volumes)? {
        bail!("volumes do not share a spatial grid");
    }
    println!("all {} volumes share a spatial grid", volumes.len());
    Ok(())
}
