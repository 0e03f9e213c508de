//! Pretrained weight downloader
//!
//! Fetches the released SwinIR colour-denoising checkpoints (noise 15, 25, 50)
//! from the GitHub release page into `model_zoo/swinir/`.
//!
//! Files already on disk are never requested again. New files are streamed to
//! `<name>.part` and only renamed into place once the whole body has been
//! written, so an interrupted download is never mistaken for a finished one.

use anyhow::{Context, Result};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::info;

use crate::layout::{weight_file_name, Layout};

pub const DEFAULT_BASE_URL: &str = "https://github.com/JingyunLiang/SwinIR/releases/download/v0.0/";

/// Noise levels with published colour-denoising weights
pub const RELEASED_NOISE_LEVELS: [u32; 3] = [15, 25, 50];

const WRITE_BUFFER_SIZE: usize = 8192;

/// Downloads weight files over plain HTTP GET
pub struct ModelDownloader {
    client: reqwest::Client,
    base_url: String,
    layout: Layout,
}

impl ModelDownloader {
    /// Create a downloader that resolves `base_url + file name`
    pub fn new(layout: Layout, base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("swinir-runner/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(Self {
            client,
            base_url,
            layout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Make sure every released checkpoint is on disk
    ///
    /// Downloads run one after another. The first failure aborts the
    /// remaining downloads and is returned to the caller.
    pub async fn download_all(&self) -> Result<ModelPaths> {
        let mut weights = BTreeMap::new();
        for noise in RELEASED_NOISE_LEVELS {
            let path = self.download_weights(noise).await?;
            weights.insert(noise, path);
        }
        Ok(ModelPaths { weights })
    }

    /// Fetch the checkpoint for one noise level unless it already exists
    pub async fn download_weights(&self, noise: u32) -> Result<PathBuf> {
        let file_name = weight_file_name(noise);
        let path = self.layout.weight_path(noise);

        if path.exists() {
            info!("✓ Model already present: {}", file_name);
            return Ok(path);
        }

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        info!("📥 Downloading {}", file_name);
        let url = format!("{}{}", self.base_url, file_name);
        let bytes = download_file(&self.client, &url, &path)
            .await
            .with_context(|| format!("Failed to download {}", file_name))?;

        info!(size_kb = bytes / 1024, "  ✓ Downloaded: {}", path.display());
        Ok(path)
    }
}

/// Locations of the released checkpoints
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub weights: BTreeMap<u32, PathBuf>,
}

impl ModelPaths {
    pub fn get(&self, noise: u32) -> Option<&Path> {
        self.weights.get(&noise).map(PathBuf::as_path)
    }
}

async fn download_file(client: &reqwest::Client, url: &str, dest: &Path) -> Result<u64> {
    let response = client.get(url).send().await?.error_for_status()?;

    let partial = partial_path(dest);
    let written = match stream_to_file(response, &partial).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
    };

    tokio::fs::rename(&partial, dest)
        .await
        .with_context(|| format!("Failed to move {} into place", partial.display()))?;

    Ok(written)
}

async fn stream_to_file(response: reqwest::Response, path: &Path) -> Result<u64> {
    let total_size = response.content_length().unwrap_or(0);

    let file = tokio::fs::File::create(path)
        .await
        .with_context(|| format!("Failed to create file {}", path.display()))?;
    let mut writer = BufWriter::with_capacity(WRITE_BUFFER_SIZE, file);

    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;
    let mut last_logged = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer
            .write_all(&chunk)
            .await
            .with_context(|| format!("Failed to write to {}", path.display()))?;
        downloaded += chunk.len() as u64;

        if let Some(progress) = progress_step(downloaded, total_size, last_logged) {
            last_logged = progress;
            info!(progress, downloaded, total_size, "  {}% downloaded", progress);
        }
    }

    writer.flush().await?;
    Ok(downloaded)
}

/// Next 10% mark reached since `last_logged`, if any. Unknown sizes never report.
fn progress_step(downloaded: u64, total_size: u64, last_logged: u64) -> Option<u64> {
    if total_size == 0 {
        return None;
    }
    let progress = downloaded * 100 / total_size;
    (progress >= last_logged + 10).then(|| progress - progress % 10)
}

fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Minimal HTTP/1.1 server: 404 for the noise 50 checkpoint, otherwise
    /// responds with `body`. Records every requested path.
    async fn serve(body: &'static [u8]) -> (String, Arc<Mutex<Vec<String>>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = requests.clone();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let mut buf = Vec::new();
                let mut chunk = [0u8; 1024];
                while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => buf.extend_from_slice(&chunk[..n]),
                    }
                }
                let request = String::from_utf8_lossy(&buf);
                let path = request
                    .split_whitespace()
                    .nth(1)
                    .unwrap_or_default()
                    .to_string();
                seen.lock().unwrap().push(path.clone());

                let response = if path.contains("noise50") {
                    b"HTTP/1.1 404 Not Found\r\ncontent-length: 0\r\nconnection: close\r\n\r\n".to_vec()
                } else {
                    let mut r = format!(
                        "HTTP/1.1 200 OK\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                        body.len()
                    )
                    .into_bytes();
                    r.extend_from_slice(body);
                    r
                };
                let _ = socket.write_all(&response).await;
                let _ = socket.shutdown().await;
            }
        });

        (format!("http://{}/release", addr), requests)
    }

    #[tokio::test]
    async fn test_existing_weights_are_not_requested() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        layout.setup().unwrap();
        for noise in RELEASED_NOISE_LEVELS {
            std::fs::write(layout.weight_path(noise), b"weights").unwrap();
        }

        let (base_url, requests) = serve(b"fresh").await;
        let downloader = ModelDownloader::new(layout.clone(), base_url).unwrap();
        let paths = downloader.download_all().await.unwrap();

        assert!(requests.lock().unwrap().is_empty());
        assert_eq!(paths.weights.len(), 3);
        assert_eq!(paths.get(50), Some(layout.weight_path(50).as_path()));
        assert_eq!(
            std::fs::read(layout.weight_path(15)).unwrap(),
            b"weights".to_vec()
        );
    }

    #[tokio::test]
    async fn test_downloads_missing_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        layout.setup().unwrap();
        std::fs::write(layout.weight_path(15), b"old").unwrap();

        let (base_url, requests) = serve(b"checkpoint-bytes").await;
        let downloader = ModelDownloader::new(layout.clone(), base_url).unwrap();
        let path = downloader.download_weights(25).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"checkpoint-bytes".to_vec());
        assert!(!partial_path(&path).exists());
        assert_eq!(
            *requests.lock().unwrap(),
            vec![format!("/release/{}", weight_file_name(25))]
        );
    }

    #[tokio::test]
    async fn test_http_error_aborts_and_leaves_no_file() {
        let tmp = tempfile::tempdir().unwrap();
        let layout = Layout::new(tmp.path());
        layout.setup().unwrap();

        let (base_url, requests) = serve(b"checkpoint-bytes").await;
        let downloader = ModelDownloader::new(layout.clone(), base_url).unwrap();
        let err = downloader.download_all().await.unwrap_err();

        assert!(err.to_string().contains("noise50"));
        assert!(layout.weight_path(15).exists());
        assert!(layout.weight_path(25).exists());
        assert!(!layout.weight_path(50).exists());
        assert!(!partial_path(&layout.weight_path(50)).exists());
        assert_eq!(requests.lock().unwrap().len(), 3);
    }

    #[test]
    fn test_base_url_gets_trailing_slash() {
        let downloader = ModelDownloader::new(Layout::default(), "http://host/v0.0").unwrap();
        assert_eq!(downloader.base_url(), "http://host/v0.0/");

        let downloader = ModelDownloader::new(Layout::default(), DEFAULT_BASE_URL).unwrap();
        assert_eq!(downloader.base_url(), DEFAULT_BASE_URL);
    }

    #[test]
    fn test_progress_reported_every_ten_percent() {
        assert_eq!(progress_step(5, 100, 0), None);
        assert_eq!(progress_step(10, 100, 0), Some(10));
        assert_eq!(progress_step(19, 100, 10), None);
        assert_eq!(progress_step(47, 100, 10), Some(40));
        assert_eq!(progress_step(100, 100, 90), Some(100));
        assert_eq!(progress_step(500, 0, 0), None);
    }

    #[test]
    fn test_partial_path() {
        assert_eq!(
            partial_path(Path::new("/m/a.pth")),
            PathBuf::from("/m/a.pth.part")
        );
    }
}
