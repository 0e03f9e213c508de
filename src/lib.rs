//! SwinIR denoising runner
//!
//! Runs the pretrained SwinIR colour-denoising model over a folder of your
//! own images. The network itself lives in the SwinIR repository's
//! `main_test_swinir.py`; this crate handles everything around it.
//!
//! ## Features
//!
//! - **Workspace setup**: creates `model_zoo/`, `testsets/` and `results/`
//! - **Weight download**: fetches the released noise 15/25/50 checkpoints, skipping files already on disk
//! - **Batch denoising**: one inference run per noise level, results renamed to `project_denoised_noise{N}`
//! - **Comparison**: per-level result counts
//! - **Ensemble**: weighted pixel average across noise levels, or a standalone `create_ensemble.py`
//!
//! ## Usage
//!
//! ```rust,ignore
//! use swinir_runner::config::RunConfig;
//! use swinir_runner::download::{ModelDownloader, DEFAULT_BASE_URL};
//! use swinir_runner::inference::SwinIrProcess;
//! use swinir_runner::layout::Layout;
//! use swinir_runner::workflow::{run_workflow, Unattended};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let layout = Layout::new(".");
//!     let downloader = ModelDownloader::new(layout.clone(), DEFAULT_BASE_URL)?;
//!     let runner = SwinIrProcess::new(layout.clone());
//!
//!     let config = RunConfig {
//!         noise_levels: vec![15, 25],
//!         ..Default::default()
//!     };
//!     run_workflow(&layout, &downloader, &runner, &config, &mut Unattended).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod compare;
pub mod config;
pub mod download;
pub mod ensemble;
pub mod images;
pub mod inference;
pub mod layout;
pub mod pipeline;
pub mod prompt;
pub mod workflow;
