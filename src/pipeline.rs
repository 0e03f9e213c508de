//! Denoising workflow
//!
//! Runs the inference program once per requested noise level:
//! 1. Check the weight file for the level is on disk
//! 2. Invoke the program and wait for it to exit
//! 3. Move `results/swinir_color_dn_noise{N}` to `results/project_denoised_noise{N}`
//!
//! A failing level is logged and skipped; the remaining levels still run.

use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::inference::{suggests_tiling, InferenceRequest, InferenceRunner, TileOptions};
use crate::layout::Layout;

/// Noise level → final result directory, one entry per successful run
///
/// Iterates in ascending noise level whatever the request order was, so
/// summaries list levels low to high and the lowest level is the ensemble
/// reference.
pub type ResultMap = BTreeMap<u32, PathBuf>;

/// Denoise the input folder at each noise level in `noise_levels`
///
/// # Arguments
/// * `layout` - Workspace paths (weights, inputs, results)
/// * `runner` - Inference program boundary
/// * `noise_levels` - Levels to run, in order
/// * `tile` - Tiling options, or `None` to process whole images
///
/// # Returns
/// Result directories for the levels that succeeded. Levels that failed
/// are missing from the map.
pub async fn run_denoising<R: InferenceRunner>(
    layout: &Layout,
    runner: &R,
    noise_levels: &[u32],
    tile: Option<TileOptions>,
) -> ResultMap {
    let mut results = ResultMap::new();

    for &noise in noise_levels {
        println!();
        println!("🚀 Denoising - noise level {}", noise);

        match denoise_level(layout, runner, noise, tile).await {
            Ok(Some(dir)) => {
                println!("✓ Done - results saved to {}", dir.display());
                results.insert(noise, dir);
            }
            Ok(None) => {}
            Err(e) => error!(noise, "✗ Noise level {} failed: {:#}", noise, e),
        }
    }

    info!(
        succeeded = results.len(),
        requested = noise_levels.len(),
        "Denoising finished"
    );
    results
}

/// Run one noise level. `Ok(None)` means the level was skipped after a
/// reported failure.
async fn denoise_level<R: InferenceRunner>(
    layout: &Layout,
    runner: &R,
    noise: u32,
    tile: Option<TileOptions>,
) -> Result<Option<PathBuf>> {
    let weight_path = layout.weight_path(noise);
    if !weight_path.exists() {
        warn!(
            noise,
            "⚠️  No weights for noise level {}: {} not found",
            noise,
            weight_path.display()
        );
        return Ok(None);
    }

    let request = InferenceRequest::color_denoise(noise, weight_path, layout.input_dir(), tile);
    let output = runner.run(&request).await?;

    if !output.success() {
        error!(noise, exit_code = ?output.exit_code, "✗ Inference failed");
        eprintln!("✗ Inference failed for noise level {}", noise);
        eprintln!("Error output: {}", output.stderr.trim_end());
        if suggests_tiling(&output.stderr) {
            println!("💡 Looks like a memory problem, try again with tiling mode (--tile)");
        }
        return Ok(None);
    }

    if !output.output_dir.is_dir() {
        warn!(
            noise,
            "⚠️  Result directory not found: {}",
            output.output_dir.display()
        );
        return Ok(None);
    }

    let dest = layout.result_dir(noise);
    replace_dir(&output.output_dir, &dest)?;
    Ok(Some(dest))
}

/// Move `src` to `dest`, discarding whatever was at `dest` before
pub fn replace_dir(src: &Path, dest: &Path) -> Result<()> {
    if dest.exists() {
        std::fs::remove_dir_all(dest)
            .with_context(|| format!("Failed to remove old results in {}", dest.display()))?;
    }
    std::fs::rename(src, dest).with_context(|| {
        format!("Failed to move {} to {}", src.display(), dest.display())
    })?;
    Ok(())
}
