use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use gv_core::{Error, ModelFetcher, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Response};
use tokio::fs::{self, File};
use tokio::io::AsyncWriteExt;
use tracing::debug;
use url::Url;

use super::gdrive;

/// Confirmation pages to follow before giving up on a URL.
const MAX_CONFIRMATIONS: usize = 3;

/// Downloads artifacts over HTTP(S), following Google Drive confirmation pages.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("gv/", env!("CARGO_PKG_VERSION")))
            .cookie_store(true)
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn save(&self, response: Response, dest: &Path) -> Result<u64> {
        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let mut part = PartFile::new(dest);
        let written = stream_to_file(response, &part.path).await?;
        fs::rename(&part.path, dest).await?;
        part.keep();
        Ok(written)
    }
}

/// `<dest>.part` while a download is in flight. Removed on drop unless kept,
/// which also covers a fetch future cancelled by a timeout.
struct PartFile {
    path: PathBuf,
    kept: bool,
}

impl PartFile {
    fn new(dest: &Path) -> Self {
        Self {
            path: part_path(dest),
            kept: false,
        }
    }

    fn keep(&mut self) {
        self.kept = true;
    }
}

impl Drop for PartFile {
    fn drop(&mut self) {
        if !self.kept {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

#[async_trait]
impl ModelFetcher for HttpFetcher {
    async fn fetch(&self, url: &str, dest: &Path) -> Result<u64> {
        let mut url = Url::parse(url).map_err(|e| Error::Fetch(format!("invalid URL {}: {}", url, e)))?;

        for _ in 0..=MAX_CONFIRMATIONS {
            let response = self.client.get(url.clone()).send().await?.error_for_status()?;
            if !is_html(&response) {
                return self.save(response, dest).await;
            }

            let page_url = response.url().clone();
            let page = response.text().await?;
            url = gdrive::resolve_download_url(&page_url, &page)?.ok_or_else(|| {
                Error::Fetch(format!(
                    "{} returned a page without a download link; is the file shared publicly?",
                    page_url
                ))
            })?;
            debug!("Following download confirmation to {}", url);
        }

        Err(Error::Fetch(format!(
            "gave up after {} confirmation pages",
            MAX_CONFIRMATIONS
        )))
    }
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.starts_with("text/html"))
        .unwrap_or(false)
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn stream_to_file(response: Response, path: &Path) -> Result<u64> {
    let total = response.content_length();
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written: u64 = 0;
    let mut reported = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;

        if let Some(total) = total.filter(|t| *t > 0) {
            let percent = written * 100 / total;
            if percent >= reported + 10 {
                reported = percent;
                debug!("Downloaded {}% ({}/{} bytes)", percent, written, total);
            }
        }
    }
    file.flush().await?;

    if let Some(total) = total {
        if written != total {
            return Err(Error::Fetch(format!(
                "incomplete download: got {} of {} bytes",
                written, total
            )));
        }
    }
    if written == 0 {
        return Err(Error::Fetch("server returned an empty file".to_string()));
    }
    Ok(written)
}
