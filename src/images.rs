//! Input image discovery

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

/// Extensions accepted as input images, compared case-insensitively
pub const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "tiff"];

/// How many file names the discovery report lists
const PREVIEW_COUNT: usize = 5;

/// Whether a file name carries one of the allow-listed image extensions
///
/// Only the suffix is inspected, the content is never opened.
pub fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}

/// List the image files directly inside `dir` (not recursive), sorted by name
pub fn find_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut images = Vec::new();
    for entry in
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?
    {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_file() && has_image_extension(&path) {
            images.push(path);
        }
    }
    images.sort();
    Ok(images)
}

/// Whether the directory has no entries at all
pub fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries =
        std::fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    Ok(entries.next().is_none())
}

/// Scan `dir` and log how many images were found plus the first few names
pub fn discover_images(dir: &Path) -> Result<Vec<PathBuf>> {
    let images = find_images(dir)?;

    info!("✓ Found {} image file(s)", images.len());
    for image in images.iter().take(PREVIEW_COUNT) {
        info!(
            "  - {}",
            image.file_name().unwrap_or_default().to_string_lossy()
        );
    }
    if images.len() > PREVIEW_COUNT {
        info!("  ... and {} more", images.len() - PREVIEW_COUNT);
    }

    Ok(images)
}
