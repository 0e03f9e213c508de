//! Ensemble of denoised outputs
//!
//! Combines the results of several noise levels with a per-pixel weighted
//! average. The same computation can also be emitted as a standalone Python
//! helper (`create_ensemble.py`) for users who want to tweak it by hand; the
//! runner never executes that script.

use anyhow::{bail, Context, Result};
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::layout::Layout;
use crate::pipeline::ResultMap;

/// Suffix `main_test_swinir.py` appends to output file stems
pub const OUTPUT_SUFFIX: &str = "_SwinIR";

const ENSEMBLE_SCRIPT: &str = include_str!("../templates/create_ensemble.py");

/// Weighted per-pixel average of same-sized images
///
/// Without `weights`, every readable image gets `1 / n`. Weights are used
/// as given (not normalised); the sum is clamped to `[0, 255]` per channel.
/// Unreadable inputs are skipped together with their weight.
///
/// # Returns
/// `false` when none of the inputs could be read, `true` once `output` is written
pub fn ensemble_images(paths: &[PathBuf], weights: Option<&[f32]>, output: &Path) -> Result<bool> {
    if let Some(weights) = weights {
        if weights.len() != paths.len() {
            bail!(
                "Got {} weights for {} images",
                weights.len(),
                paths.len()
            );
        }
    }

    let mut loaded: Vec<(RgbImage, Option<f32>)> = Vec::with_capacity(paths.len());
    for (i, path) in paths.iter().enumerate() {
        match image::open(path) {
            Ok(img) => loaded.push((img.to_rgb8(), weights.map(|w| w[i]))),
            Err(e) => warn!(path = %path.display(), "Skipping unreadable image: {}", e),
        }
    }

    let Some((first, _)) = loaded.first() else {
        return Ok(false);
    };
    let (width, height) = first.dimensions();

    let uniform = 1.0 / loaded.len() as f32;
    let mut acc = vec![0f32; (width as usize) * (height as usize) * 3];
    for (img, weight) in &loaded {
        if img.dimensions() != (width, height) {
            bail!(
                "Image size mismatch: expected {}x{}, got {}x{}",
                width,
                height,
                img.width(),
                img.height()
            );
        }
        let weight = weight.unwrap_or(uniform);
        for (sum, &px) in acc.iter_mut().zip(img.as_raw()) {
            *sum += px as f32 * weight;
        }
    }

    let pixels: Vec<u8> = acc.iter().map(|v| v.clamp(0.0, 255.0) as u8).collect();
    let result = RgbImage::from_raw(width, height, pixels)
        .ok_or_else(|| anyhow::anyhow!("Failed to create image buffer"))?;
    result
        .save(output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    Ok(true)
}

/// Ensemble every image that exists in all result directories
///
/// The lowest noise level's directory is the reference: for each
/// `{name}_SwinIR.png` in it, the same file name is looked up in the other
/// directories and, if present everywhere, averaged into
/// `results/ensemble_{name}.png`.
///
/// # Returns
/// Paths of the written ensemble images
pub fn ensemble_results(
    layout: &Layout,
    results: &ResultMap,
    weights: Option<&[f32]>,
) -> Result<Vec<PathBuf>> {
    if let Some(weights) = weights {
        if weights.len() != results.len() {
            bail!(
                "Got {} weights for {} noise levels",
                weights.len(),
                results.len()
            );
        }
    }

    let mut dirs = results.values();
    let Some(reference) = dirs.next() else {
        return Ok(Vec::new());
    };
    let others: Vec<&PathBuf> = dirs.collect();

    let mut reference_files: Vec<PathBuf> = std::fs::read_dir(reference)
        .with_context(|| format!("Failed to read {}", reference.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().map(|e| e == "png").unwrap_or(false))
        .collect();
    reference_files.sort();

    let mut written = Vec::new();
    for file in reference_files {
        let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let base = stem.strip_suffix(OUTPUT_SUFFIX).unwrap_or(stem);
        let counterpart = format!("{}{}.png", base, OUTPUT_SUFFIX);

        let mut inputs = vec![file.clone()];
        inputs.extend(others.iter().map(|dir| dir.join(&counterpart)));
        if !inputs[1..].iter().all(|p| p.exists()) {
            continue;
        }

        let output = layout.ensemble_output_path(base);
        if ensemble_images(&inputs, weights, &output)? {
            info!("✓ Ensemble completed: {}", base);
            written.push(output);
        }
    }

    Ok(written)
}

/// Write the standalone `create_ensemble.py` helper into the workspace root
pub fn write_ensemble_script(layout: &Layout) -> Result<PathBuf> {
    let path = layout.ensemble_script_path();
    std::fs::write(&path, ENSEMBLE_SCRIPT)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    info!("✓ Ensemble script written: {}", path.display());
    Ok(path)
}
