//! Run configuration
//!
//! Everything the workflow needs to decide is collected into [`RunConfig`]
//! up front, either from command-line flags or from the interactive prompts
//! in [`crate::prompt`].

use anyhow::{bail, Context, Result};
use clap::ValueEnum;

use crate::inference::TileOptions;

/// Noise level used when nothing else is chosen
pub const DEFAULT_NOISE: u32 = 25;

/// Named selections of noise levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum NoisePreset {
    /// Medium noise only (25)
    Medium,
    /// Every released level (15, 25, 50)
    All,
}

impl NoisePreset {
    pub fn levels(self) -> Vec<u32> {
        match self {
            NoisePreset::Medium => vec![DEFAULT_NOISE],
            NoisePreset::All => vec![15, 25, 50],
        }
    }
}

/// What a single run should do
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfig {
    /// Levels to denoise at, in order
    pub noise_levels: Vec<u32>,
    /// Tiling mode, `None` for whole-image inference
    pub tile: Option<TileOptions>,
    /// Write `create_ensemble.py` when more than one level succeeded
    pub emit_ensemble_script: bool,
    /// Compute `results/ensemble_*.png` when more than one level succeeded
    pub ensemble: bool,
    /// Ensemble weights, one per successful level; uniform when `None`
    pub weights: Option<Vec<f32>>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            noise_levels: vec![DEFAULT_NOISE],
            tile: None,
            emit_ensemble_script: false,
            ensemble: false,
            weights: None,
        }
    }
}

impl RunConfig {
    /// Pick noise levels from explicit values, then a preset, then the default
    pub fn resolve_levels(noise: &[u32], preset: Option<NoisePreset>) -> Result<Vec<u32>> {
        let levels = if !noise.is_empty() {
            noise.to_vec()
        } else if let Some(preset) = preset {
            preset.levels()
        } else {
            vec![DEFAULT_NOISE]
        };
        validate_levels(&levels)?;
        Ok(levels)
    }
}

/// Parse a whitespace-separated list such as `"15 25"`
pub fn parse_noise_list(input: &str) -> Result<Vec<u32>> {
    let levels = input
        .split_whitespace()
        .map(|token| {
            token
                .parse::<u32>()
                .with_context(|| format!("Invalid noise level: {:?}", token))
        })
        .collect::<Result<Vec<_>>>()?;

    if levels.is_empty() {
        bail!("No noise levels given");
    }
    validate_levels(&levels)?;
    Ok(levels)
}

fn validate_levels(levels: &[u32]) -> Result<()> {
    if levels.contains(&0) {
        bail!("Noise level must be a positive integer");
    }
    Ok(())
}
