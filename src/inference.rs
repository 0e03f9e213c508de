//! Boundary to the external SwinIR inference program
//!
//! The denoising network lives in `main_test_swinir.py` from the SwinIR
//! repository. We only ever talk to it through its command line, exit code and
//! stderr, so the orchestration code depends on the [`InferenceRunner`] trait
//! and tests can swap in a fake.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tracing::debug;

use crate::layout::Layout;

/// Task selector for colour image denoising
pub const COLOR_DN_TASK: &str = "color_dn";

pub const DEFAULT_PYTHON: &str = "python";
pub const DEFAULT_SCRIPT: &str = "main_test_swinir.py";

/// Split large images into overlapping patches to bound memory use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileOptions {
    pub tile: u32,
    pub overlap: u32,
}

impl Default for TileOptions {
    fn default() -> Self {
        Self {
            tile: 400,
            overlap: 32,
        }
    }
}

/// One invocation of the inference program
#[derive(Debug, Clone)]
pub struct InferenceRequest {
    pub task: &'static str,
    pub noise: u32,
    pub weight_path: PathBuf,
    pub input_dir: PathBuf,
    pub tile: Option<TileOptions>,
}

impl InferenceRequest {
    pub fn color_denoise(
        noise: u32,
        weight_path: impl Into<PathBuf>,
        input_dir: impl Into<PathBuf>,
        tile: Option<TileOptions>,
    ) -> Self {
        Self {
            task: COLOR_DN_TASK,
            noise,
            weight_path: weight_path.into(),
            input_dir: input_dir.into(),
            tile,
        }
    }

    /// Arguments passed to `main_test_swinir.py`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--task".into(),
            self.task.into(),
            "--noise".into(),
            self.noise.to_string().into(),
            "--model_path".into(),
            self.weight_path.clone().into(),
            "--folder_gt".into(),
            self.input_dir.clone().into(),
        ];

        if let Some(tile) = self.tile {
            args.extend([
                "--tile".into(),
                tile.tile.to_string().into(),
                "--tile_overlap".into(),
                tile.overlap.to_string().into(),
            ]);
        }

        args
    }
}

/// What the inference program left behind
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
    pub stderr: String,
    /// Where the program writes its results by convention
    pub output_dir: PathBuf,
}

impl InferenceOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Runs the denoising program for one request
///
/// `Err` means the program could not be started at all; a program that ran
/// and failed is reported through [`InferenceOutput::exit_code`].
pub trait InferenceRunner {
    fn run(
        &self,
        request: &InferenceRequest,
    ) -> impl Future<Output = Result<InferenceOutput>> + Send;
}

/// Heuristic: does the error text look like an out-of-memory / accelerator failure?
pub fn suggests_tiling(stderr: &str) -> bool {
    let stderr = stderr.to_lowercase();
    stderr.contains("out of memory") || stderr.contains("cuda")
}

/// Launches `python main_test_swinir.py ...` inside the workspace root
#[derive(Debug, Clone)]
pub struct SwinIrProcess {
    layout: Layout,
    python: PathBuf,
    script: PathBuf,
}

impl SwinIrProcess {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            python: PathBuf::from(DEFAULT_PYTHON),
            script: PathBuf::from(DEFAULT_SCRIPT),
        }
    }

    /// Interpreter used to launch the script
    pub fn with_python(mut self, python: impl Into<PathBuf>) -> Self {
        self.python = python.into();
        self
    }

    /// Script path, resolved against the workspace root when relative
    pub fn with_script(mut self, script: impl Into<PathBuf>) -> Self {
        self.script = script.into();
        self
    }

    pub fn python(&self) -> &Path {
        &self.python
    }

    pub fn script(&self) -> &Path {
        &self.script
    }
}

impl InferenceRunner for SwinIrProcess {
    async fn run(&self, request: &InferenceRequest) -> Result<InferenceOutput> {
        let mut command = tokio::process::Command::new(&self.python);
        command
            .arg(&self.script)
            .args(request.args())
            .current_dir(self.layout.root())
            .stdin(Stdio::null())
            .kill_on_drop(true);

        debug!(command = ?command, "Launching inference program");

        let output = command
            .output()
            .await
            .with_context(|| format!("Failed to launch {}", self.python.display()))?;

        Ok(InferenceOutput {
            exit_code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            output_dir: self.layout.raw_output_dir(request.noise),
        })
    }
}
