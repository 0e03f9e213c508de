//! End-to-end denoising workflow
//!
//! Ties the steps together in order: directories, weights, input images,
//! denoising, comparison, ensemble. Console interaction goes through the
//! [`Interaction`] trait so the same workflow runs attended or unattended.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::compare::{print_comparison, summarize_results, ResultSummary};
use crate::config::RunConfig;
use crate::download::{ModelDownloader, RELEASED_NOISE_LEVELS};
use crate::ensemble::{ensemble_results, write_ensemble_script};
use crate::images::{discover_images, is_empty_dir, IMAGE_EXTENSIONS};
use crate::inference::InferenceRunner;
use crate::layout::Layout;
use crate::pipeline::{run_denoising, ResultMap};

/// Points where the workflow may ask the user something
pub trait Interaction {
    /// Called when the input folder is empty, before it is scanned
    fn await_images(&mut self, input_dir: &Path) -> Result<()>;

    /// Final say on the run settings, once weights and images are in place
    fn configure(&mut self, config: RunConfig) -> Result<RunConfig>;

    /// Whether to write `create_ensemble.py`; `default` comes from the config
    fn confirm_ensemble_script(&mut self, default: bool) -> Result<bool>;
}

/// Never asks, always takes the configured answer
#[derive(Debug, Default, Clone, Copy)]
pub struct Unattended;

impl Interaction for Unattended {
    fn await_images(&mut self, _input_dir: &Path) -> Result<()> {
        Ok(())
    }

    fn configure(&mut self, config: RunConfig) -> Result<RunConfig> {
        Ok(config)
    }

    fn confirm_ensemble_script(&mut self, default: bool) -> Result<bool> {
        Ok(default)
    }
}

/// How a run ended
#[derive(Debug)]
pub enum Outcome {
    /// A weight file could not be fetched; nothing was denoised
    DownloadFailed,
    /// The input folder has no images
    NoImages,
    Completed(WorkflowReport),
}

/// What a completed run produced
#[derive(Debug, Default)]
pub struct WorkflowReport {
    pub results: ResultMap,
    pub summaries: Vec<ResultSummary>,
    pub ensembles: Vec<PathBuf>,
    pub ensemble_script: Option<PathBuf>,
}

/// Run the whole workflow once
///
/// Only the released weights for the requested levels are fetched. Levels
/// added by [`Interaction::configure`] are fetched after it returns. Errors
/// are returned only for broken workspace I/O; step failures end up in the
/// [`Outcome`].
pub async fn run_workflow<R, I>(
    layout: &Layout,
    downloader: &ModelDownloader,
    runner: &R,
    config: &RunConfig,
    interaction: &mut I,
) -> Result<Outcome>
where
    R: InferenceRunner,
    I: Interaction,
{
    println!("🎯 SwinIR Image Denoising");
    println!("{}", "=".repeat(60));

    println!();
    println!("📁 Setting up directories...");
    layout.setup()?;

    println!();
    println!("📥 Fetching pretrained models...");
    if !fetch_weights(downloader, &config.noise_levels).await {
        return Ok(Outcome::DownloadFailed);
    }

    println!();
    println!("🖼️  Preparing test images...");
    let input_dir = layout.input_dir();
    if is_empty_dir(&input_dir)? {
        println!("📁 Put your noisy images into:");
        println!("   {}", input_dir.display());
        println!();
        println!("Supported formats: {}", supported_formats());
        interaction.await_images(&input_dir)?;
    }

    let images = discover_images(&input_dir)?;
    if images.is_empty() {
        println!("❌ No test images found");
        return Ok(Outcome::NoImages);
    }

    let config = interaction.configure(config.clone())?;
    let missing: Vec<u32> = config
        .noise_levels
        .iter()
        .copied()
        .filter(|&noise| {
            RELEASED_NOISE_LEVELS.contains(&noise) && !layout.weight_path(noise).exists()
        })
        .collect();
    if !fetch_weights(downloader, &missing).await {
        return Ok(Outcome::DownloadFailed);
    }

    println!();
    println!("🚀 Denoising at noise levels {:?}", config.noise_levels);
    let results = run_denoising(layout, runner, &config.noise_levels, config.tile).await;

    let summaries = summarize_results(&results)?;
    print_comparison(&summaries);

    let mut report = WorkflowReport {
        results,
        summaries,
        ..Default::default()
    };

    if report.results.len() > 1 {
        if config.ensemble {
            match ensemble_results(layout, &report.results, config.weights.as_deref()) {
                Ok(written) => {
                    info!(count = written.len(), "Ensemble images written");
                    report.ensembles = written;
                }
                Err(e) => error!("✗ Ensemble failed: {:#}", e),
            }
        }

        if interaction.confirm_ensemble_script(config.emit_ensemble_script)? {
            report.ensemble_script = Some(write_ensemble_script(layout)?);
        }
    }

    println!();
    println!("🎉 All done!");
    println!();
    println!("📝 Next steps:");
    println!("  1. Compare PSNR/SSIM across noise levels");
    println!("  2. Show the visual difference (original vs denoised)");
    println!("  3. With several results, try the ensemble");
    println!("  4. Weigh up the strengths and weaknesses of each setting");

    Ok(Outcome::Completed(report))
}

/// Download the released weights among `levels`; `false` after the first failure
async fn fetch_weights(downloader: &ModelDownloader, levels: &[u32]) -> bool {
    for &noise in levels {
        if !RELEASED_NOISE_LEVELS.contains(&noise) {
            warn!(noise, "No released weights for noise level {}", noise);
            continue;
        }
        if let Err(e) = downloader.download_weights(noise).await {
            error!("{:#}", e);
            println!("❌ Model download failed, check your network connection");
            return false;
        }
    }
    true
}

fn supported_formats() -> String {
    IMAGE_EXTENSIONS
        .iter()
        .map(|ext| format!(".{}", ext))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{InferenceOutput, InferenceRequest};
    use image::{Rgb, RgbImage};
    use std::sync::Mutex;

    /// Records the requested levels and fails every run
    #[derive(Default)]
    struct FailingRunner {
        calls: Mutex<Vec<u32>>,
    }

    impl FailingRunner {
        fn calls(&self) -> Vec<u32> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl InferenceRunner for FailingRunner {
        async fn run(&self, request: &InferenceRequest) -> Result<InferenceOutput> {
            self.calls.lock().unwrap().push(request.noise);
            Ok(InferenceOutput {
                exit_code: Some(1),
                stderr: String::new(),
                output_dir: PathBuf::from(format!("missing{}", request.noise)),
            })
        }
    }

    /// Logs every question it is asked
    #[derive(Default)]
    struct Recording {
        asked: Vec<&'static str>,
        drop_image: bool,
        levels: Option<Vec<u32>>,
    }

    impl Interaction for Recording {
        fn await_images(&mut self, input_dir: &Path) -> Result<()> {
            self.asked.push("await_images");
            if self.drop_image {
                RgbImage::from_pixel(2, 2, Rgb([10, 20, 30]))
                    .save(input_dir.join("dropped.png"))?;
            }
            Ok(())
        }

        fn configure(&mut self, config: RunConfig) -> Result<RunConfig> {
            self.asked.push("configure");
            Ok(match self.levels.clone() {
                Some(noise_levels) => RunConfig {
                    noise_levels,
                    ..config
                },
                None => config,
            })
        }

        fn confirm_ensemble_script(&mut self, default: bool) -> Result<bool> {
            self.asked.push("confirm_ensemble_script");
            Ok(default)
        }
    }

    /// Base URL nothing listens on; any request fails
    const DEAD_URL: &str = "http://127.0.0.1:1/";

    fn workspace(weights: &[u32]) -> (tempfile::TempDir, Layout) {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        layout.setup().unwrap();
        for &noise in weights {
            std::fs::write(layout.weight_path(noise), b"w").unwrap();
        }
        (tmp, layout)
    }

    async fn run<I: Interaction>(
        layout: &Layout,
        runner: &FailingRunner,
        interaction: &mut I,
    ) -> Outcome {
        let downloader = ModelDownloader::new(layout.clone(), DEAD_URL).unwrap();
        run_workflow(layout, &downloader, runner, &RunConfig::default(), interaction)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_download_failure_stops_before_denoising() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        let runner = FailingRunner::default();

        let outcome = run(&layout, &runner, &mut Unattended).await;

        assert!(matches!(outcome, Outcome::DownloadFailed));
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_download_failure_comes_before_any_question() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        let runner = FailingRunner::default();
        let mut interaction = Recording::default();

        let outcome = run(&layout, &runner, &mut interaction).await;

        assert!(matches!(outcome, Outcome::DownloadFailed));
        assert!(interaction.asked.is_empty());
    }

    #[tokio::test]
    async fn test_no_images_stops_before_denoising() {
        let (_tmp, layout) = workspace(&[25]);
        std::fs::write(layout.input_dir().join("notes.txt"), b"").unwrap();
        let runner = FailingRunner::default();
        let mut interaction = Recording::default();

        let outcome = run(&layout, &runner, &mut interaction).await;

        assert!(matches!(outcome, Outcome::NoImages));
        assert!(interaction.asked.is_empty());
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_empty_input_folder_waits_for_images() {
        let (_tmp, layout) = workspace(&[25]);
        let runner = FailingRunner::default();
        let mut interaction = Recording::default();

        let outcome = run(&layout, &runner, &mut interaction).await;

        assert!(matches!(outcome, Outcome::NoImages));
        assert_eq!(interaction.asked, vec!["await_images"]);
        assert!(runner.calls().is_empty());
    }

    #[tokio::test]
    async fn test_images_placed_while_waiting_are_denoised() {
        let (_tmp, layout) = workspace(&[25]);
        let runner = FailingRunner::default();
        let mut interaction = Recording {
            drop_image: true,
            ..Default::default()
        };

        let outcome = run(&layout, &runner, &mut interaction).await;

        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(interaction.asked, vec!["await_images", "configure"]);
        assert_eq!(runner.calls(), vec![25]);
    }

    #[tokio::test]
    async fn test_configured_levels_replace_requested_ones() {
        let (_tmp, layout) = workspace(&[15, 25]);
        std::fs::write(layout.input_dir().join("a.png"), b"png").unwrap();
        let runner = FailingRunner::default();
        let mut interaction = Recording {
            levels: Some(vec![15]),
            ..Default::default()
        };

        let outcome = run(&layout, &runner, &mut interaction).await;

        assert!(matches!(outcome, Outcome::Completed(_)));
        assert_eq!(interaction.asked, vec!["configure"]);
        assert_eq!(runner.calls(), vec![15]);
    }

    #[tokio::test]
    async fn test_configured_level_without_weights_is_fetched() {
        let (_tmp, layout) = workspace(&[25]);
        std::fs::write(layout.input_dir().join("a.png"), b"png").unwrap();
        let runner = FailingRunner::default();
        let mut interaction = Recording {
            levels: Some(vec![50]),
            ..Default::default()
        };

        let outcome = run(&layout, &runner, &mut interaction).await;

        assert!(matches!(outcome, Outcome::DownloadFailed));
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn test_supported_formats() {
        assert_eq!(supported_formats(), ".jpg, .jpeg, .png, .bmp, .tiff");
    }
}
