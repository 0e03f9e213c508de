//! Workspace directory layout
//!
//! Every path the runner reads or writes is derived from a single workspace
//! root, so a run can be pointed anywhere with `--root`:
//!
//! ```text
//! <root>/
//! ├── model_zoo/swinir/*.pth
//! ├── testsets/project_images/*
//! ├── results/
//! │   ├── swinir_color_dn_noise{N}/     (written by main_test_swinir.py)
//! │   ├── project_denoised_noise{N}/    (renamed by us)
//! │   └── ensemble_{name}.png
//! └── create_ensemble.py
//! ```

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

pub const MODEL_DIR: &str = "model_zoo/swinir";
pub const INPUT_DIR: &str = "testsets/project_images";
pub const RESULTS_DIR: &str = "results";
pub const ENSEMBLE_SCRIPT: &str = "create_ensemble.py";

/// Paths of a runner workspace
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the working directories (and any missing parents)
    ///
    /// Safe to call repeatedly; existing directories are left untouched.
    pub fn setup(&self) -> Result<()> {
        for dir in [MODEL_DIR, INPUT_DIR, RESULTS_DIR] {
            let path = self.root.join(dir);
            std::fs::create_dir_all(&path)
                .with_context(|| format!("Failed to create directory {}", path.display()))?;
            info!("✓ Directory ready: {}", dir);
        }
        Ok(())
    }

    pub fn model_dir(&self) -> PathBuf {
        self.root.join(MODEL_DIR)
    }

    pub fn input_dir(&self) -> PathBuf {
        self.root.join(INPUT_DIR)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    /// Pretrained weight file for a noise level
    pub fn weight_path(&self, noise: u32) -> PathBuf {
        self.model_dir().join(weight_file_name(noise))
    }

    /// Directory `main_test_swinir.py` writes its output to
    pub fn raw_output_dir(&self, noise: u32) -> PathBuf {
        self.results_dir()
            .join(format!("swinir_color_dn_noise{}", noise))
    }

    /// Final, project-specific result directory for a noise level
    pub fn result_dir(&self, noise: u32) -> PathBuf {
        self.results_dir()
            .join(format!("project_denoised_noise{}", noise))
    }

    pub fn ensemble_output_path(&self, base_name: &str) -> PathBuf {
        self.results_dir().join(format!("ensemble_{}.png", base_name))
    }

    pub fn ensemble_script_path(&self) -> PathBuf {
        self.root.join(ENSEMBLE_SCRIPT)
    }

    /// Noise levels that already have a `project_denoised_noise{N}` directory
    pub fn existing_result_levels(&self) -> Result<Vec<u32>> {
        let results = self.results_dir();
        if !results.is_dir() {
            return Ok(Vec::new());
        }

        let mut levels = Vec::new();
        for entry in std::fs::read_dir(&results)
            .with_context(|| format!("Failed to read {}", results.display()))?
        {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let level = name
                .to_str()
                .and_then(|n| n.strip_prefix("project_denoised_noise"))
                .and_then(|n| n.parse::<u32>().ok());
            if let Some(level) = level {
                levels.push(level);
            }
        }
        levels.sort_unstable();
        Ok(levels)
    }
}

impl Default for Layout {
    fn default() -> Self {
        Self::new(".")
    }
}

/// Released colour-denoising checkpoint name for a noise level
pub fn weight_file_name(noise: u32) -> String {
    format!("005_colorDN_DFWB_s128w8_SwinIR-M_noise{}.pth", noise)
}
