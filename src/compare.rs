//! Per-noise-level result summary
//!
//! Counts the denoised PNGs each successful run produced so the user can
//! compare noise levels side by side.

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::pipeline::ResultMap;

/// One line of the comparison table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSummary {
    pub noise: u32,
    pub file_count: usize,
    pub dir: PathBuf,
}

impl ResultSummary {
    /// `Noise level 25: 3 files -> results/project_denoised_noise25`
    pub fn line(&self) -> String {
        let unit = if self.file_count == 1 { "file" } else { "files" };
        format!(
            "Noise level {:2}: {} {} -> {}",
            self.noise,
            self.file_count,
            unit,
            self.dir.display()
        )
    }
}

/// Count `*.png` files directly inside `dir`
pub fn count_png_files(dir: &Path) -> Result<usize> {
    let mut count = 0;
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let path = entry?.path();
        let is_png = path.is_file()
            && path
                .extension()
                .map(|ext| ext == "png")
                .unwrap_or(false);
        if is_png {
            count += 1;
        }
    }
    Ok(count)
}

/// Summarise every result directory that still exists
pub fn summarize_results(results: &ResultMap) -> Result<Vec<ResultSummary>> {
    let mut summaries = Vec::with_capacity(results.len());
    for (&noise, dir) in results {
        if !dir.is_dir() {
            continue;
        }
        summaries.push(ResultSummary {
            noise,
            file_count: count_png_files(dir)?,
            dir: dir.clone(),
        });
    }
    Ok(summaries)
}

/// Print the comparison table followed by what to do next
///
/// Prints nothing when no level succeeded.
pub fn print_comparison(summaries: &[ResultSummary]) {
    if summaries.is_empty() {
        return;
    }

    println!();
    println!("📊 Results:");
    println!("{}", "=".repeat(50));
    for summary in summaries {
        println!("{}", summary.line());
    }

    println!();
    println!("💡 Tips:");
    println!("  1. Look through each noise level and pick the one that works best");
    println!("  2. Several results can be combined with `swinir-runner ensemble`");
    println!("  3. Showing more than one noise level makes a good comparison");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_line_pluralization() {
        let mut summary = ResultSummary {
            noise: 15,
            file_count: 1,
            dir: PathBuf::from("results/project_denoised_noise15"),
        };
        assert_eq!(
            summary.line(),
            "Noise level 15: 1 file -> results/project_denoised_noise15"
        );

        summary.file_count = 4;
        summary.noise = 5;
        assert_eq!(
            summary.line(),
            "Noise level  5: 4 files -> results/project_denoised_noise15"
        );
    }

    #[test]
    fn test_counts_only_png_and_skips_missing_dirs() {
        let tmp = tempfile::tempdir().unwrap();
        let dir15 = tmp.path().join("n15");
        std::fs::create_dir(&dir15).unwrap();
        for name in ["a_SwinIR.png", "b_SwinIR.png", "log.txt", "c.PNG"] {
            std::fs::write(dir15.join(name), b"").unwrap();
        }

        let mut results = ResultMap::new();
        results.insert(15, dir15.clone());
        results.insert(25, tmp.path().join("gone"));

        let summaries = summarize_results(&results).unwrap();
        assert_eq!(
            summaries,
            vec![ResultSummary {
                noise: 15,
                file_count: 2,
                dir: dir15,
            }]
        );
    }
}
