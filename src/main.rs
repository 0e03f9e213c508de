//! CLI entry point for the SwinIR denoising runner

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use swinir_runner::compare::{print_comparison, summarize_results};
use swinir_runner::config::{NoisePreset, RunConfig};
use swinir_runner::download::{ModelDownloader, DEFAULT_BASE_URL, RELEASED_NOISE_LEVELS};
use swinir_runner::ensemble::{ensemble_results, write_ensemble_script};
use swinir_runner::inference::{SwinIrProcess, TileOptions, DEFAULT_PYTHON, DEFAULT_SCRIPT};
use swinir_runner::layout::Layout;
use swinir_runner::pipeline::ResultMap;
use swinir_runner::prompt::Prompter;
use swinir_runner::workflow::{run_workflow, Outcome, Unattended};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "swinir-runner")]
#[command(version)]
#[command(about = "Denoise your own images with pretrained SwinIR", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Workspace root holding model_zoo/, testsets/ and results/
    #[arg(long, global = true, env = "SWINIR_ROOT", default_value = ".")]
    root: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the workspace directories
    Setup,

    /// Download the released colour-denoising weights (noise 15, 25, 50)
    ///
    /// Files already present in model_zoo/swinir are not downloaded again.
    Download {
        /// Release URL the weight file names are appended to
        #[arg(long, env = "SWINIR_BASE_URL", default_value = DEFAULT_BASE_URL)]
        base_url: String,
    },

    /// Run the full workflow: setup, download, denoise, compare
    ///
    /// Put your noisy images into testsets/project_images first. Each noise
    /// level ends up in results/project_denoised_noise{N}.
    Run(RunArgs),

    /// Summarise existing results/project_denoised_noise* directories
    Compare {
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Average the results of several noise levels into results/ensemble_*.png
    Ensemble {
        /// Noise levels to combine (default: every existing result directory)
        #[arg(short, long, num_args = 1.., value_delimiter = ',')]
        noise: Vec<u32>,

        /// One weight per noise level (default: plain average)
        #[arg(short, long, num_args = 1.., value_delimiter = ',')]
        weights: Vec<f32>,
    },

    /// Write the standalone create_ensemble.py helper
    EnsembleScript,
}

#[derive(Args)]
struct RunArgs {
    /// Noise levels to denoise at, e.g. `--noise 15 25`
    #[arg(short, long, num_args = 1.., value_delimiter = ',')]
    noise: Vec<u32>,

    /// Named noise level selection
    #[arg(long, value_enum, conflicts_with = "noise")]
    preset: Option<NoisePreset>,

    /// Split images into overlapping tiles (large images or low memory)
    #[arg(long)]
    tile: bool,

    /// Tile size in pixels
    #[arg(long, default_value_t = TileOptions::default().tile)]
    tile_size: u32,

    /// Overlap between neighbouring tiles in pixels
    #[arg(long, default_value_t = TileOptions::default().overlap)]
    tile_overlap: u32,

    /// Python interpreter used to launch the inference script
    #[arg(long, env = "SWINIR_PYTHON", default_value = DEFAULT_PYTHON)]
    python: PathBuf,

    /// Inference script, relative to the workspace root
    #[arg(long, default_value = DEFAULT_SCRIPT)]
    script: PathBuf,

    /// Release URL the weight file names are appended to
    #[arg(long, env = "SWINIR_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// Write create_ensemble.py when more than one noise level succeeds
    #[arg(long)]
    emit_ensemble_script: bool,

    /// Compute ensemble images when more than one noise level succeeds
    #[arg(long)]
    ensemble: bool,

    /// Ensemble weights, one per successful noise level
    #[arg(long, num_args = 1.., value_delimiter = ',', requires = "ensemble")]
    weights: Vec<f32>,

    /// Ask for the settings on the console instead of using flags
    #[arg(short, long)]
    interactive: bool,
}

impl RunArgs {
    fn tile_options(&self) -> TileOptions {
        TileOptions {
            tile: self.tile_size,
            overlap: self.tile_overlap,
        }
    }

    fn weights(&self) -> Option<Vec<f32>> {
        (!self.weights.is_empty()).then(|| self.weights.clone())
    }

    fn to_config(&self) -> Result<RunConfig> {
        Ok(RunConfig {
            noise_levels: RunConfig::resolve_levels(&self.noise, self.preset)?,
            tile: self.tile.then(|| self.tile_options()),
            emit_ensemble_script: self.emit_ensemble_script,
            ensemble: self.ensemble,
            weights: self.weights(),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    std::fs::create_dir_all(&cli.root)
        .with_context(|| format!("Failed to create workspace {}", cli.root.display()))?;
    let root = std::fs::canonicalize(&cli.root)
        .with_context(|| format!("Failed to resolve workspace {}", cli.root.display()))?;
    let layout = Layout::new(root);

    match cli.command {
        Commands::Setup => {
            layout.setup()?;
            println!();
            println!("✓ Workspace ready: {}", layout.root().display());
            println!("  Put your noisy images into {}", layout.input_dir().display());
        }

        Commands::Download { base_url } => {
            layout.setup()?;
            let downloader = ModelDownloader::new(layout.clone(), base_url)?;
            println!("📥 Fetching models from {}", downloader.base_url());
            let paths = match downloader.download_all().await {
                Ok(paths) => paths,
                Err(e) => {
                    eprintln!("❌ Model download failed, check your network connection");
                    return Err(e);
                }
            };

            println!();
            println!("✓ All models downloaded successfully!");
            println!();
            println!("Model locations:");
            for noise in RELEASED_NOISE_LEVELS {
                if let Some(path) = paths.get(noise) {
                    println!("  noise {:2}: {}", noise, path.display());
                }
            }
        }

        Commands::Run(args) => {
            let downloader = ModelDownloader::new(layout.clone(), args.base_url.clone())?;
            let runner = SwinIrProcess::new(layout.clone())
                .with_python(args.python.clone())
                .with_script(args.script.clone());
            info!(
                python = %runner.python().display(),
                script = %runner.script().display(),
                "Inference program"
            );

            let outcome = if args.interactive {
                // Levels are chosen after the download, so fetch every released one
                let config = RunConfig {
                    noise_levels: NoisePreset::All.levels(),
                    ensemble: args.ensemble,
                    weights: args.weights(),
                    ..Default::default()
                };
                let mut prompter = Prompter::new(std::io::stdin().lock(), std::io::stdout())
                    .with_tile_options(args.tile_options());
                run_workflow(&layout, &downloader, &runner, &config, &mut prompter).await?
            } else {
                let config = args.to_config()?;
                run_workflow(&layout, &downloader, &runner, &config, &mut Unattended).await?
            };

            if let Outcome::Completed(report) = outcome {
                for path in report.ensembles.iter().chain(&report.ensemble_script) {
                    println!("  → {}", path.display());
                }
            }
        }

        Commands::Compare { json } => {
            let results = existing_results(&layout, &[])?;
            let summaries = summarize_results(&results)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else if summaries.is_empty() {
                println!("No results yet in {}", layout.results_dir().display());
            } else {
                print_comparison(&summaries);
            }
        }

        Commands::Ensemble { noise, weights } => {
            let results = existing_results(&layout, &noise)?;
            if results.len() < 2 {
                bail!(
                    "Need results for at least two noise levels, found {}",
                    results.len()
                );
            }
            let weights = (!weights.is_empty()).then_some(weights);
            let written = ensemble_results(&layout, &results, weights.as_deref())?;

            println!();
            println!(
                "✓ {} ensemble image(s) from noise levels {:?}",
                written.len(),
                results.keys().collect::<Vec<_>>()
            );
            for path in &written {
                println!("  {}", path.display());
            }
        }

        Commands::EnsembleScript => {
            let path = write_ensemble_script(&layout)?;
            println!("✓ Ensemble script written: {}", path.display());
        }
    }

    Ok(())
}

/// Result directories for `noise`, or for every level on disk when empty
fn existing_results(layout: &Layout, noise: &[u32]) -> Result<ResultMap> {
    let levels = if noise.is_empty() {
        layout.existing_result_levels()?
    } else {
        noise.to_vec()
    };

    let mut results = ResultMap::new();
    for level in levels {
        let dir = layout.result_dir(level);
        if !dir.is_dir() {
            bail!("No results for noise level {}: {} not found", level, dir.display());
        }
        results.insert(level, dir);
    }
    Ok(results)
}
