// avmerge - Video/Audio Download and Merge
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Single-shot HTTP download to a file
//!
//! # Behavior
//! - One GET per call, no Range requests, no retries
//! - Non-2xx status is `BadStatus { code }`
//! - A missing or zero Content-Length is `UnknownSize`; the body is never
//!   read and the destination is not touched
//! - The destination is truncated and written through a buffered writer
//! - An error mid-stream leaves the partial file in place

use crate::download::progress::ProgressReader;
use crate::error::{AvMergeError, Result};
use futures_util::StreamExt;
use reqwest::Client;
use std::fmt;
use std::num::NonZeroU64;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{debug, info};
use url::Url;

const DOWNLOAD_BUFF_SZ: usize = 8 * 1024;
const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// One URL to one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    /// HTTP(s) URL of the file
    pub source_url: String,
    /// Local file path to save to
    pub destination_path: PathBuf,
}

impl DownloadTask {
    pub fn new(source_url: impl Into<String>, destination_path: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination_path: destination_path.into(),
        }
    }
}

impl fmt::Display for DownloadTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_url, self.destination_path.display())
    }
}

/// HTTP file downloader
pub struct Downloader {
    client: Client,
}

impl Downloader {
    /// Create a downloader with its own client
    pub fn new(timeout: Option<Duration>, user_agent: Option<&str>) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)));
        if let Some(agent) = user_agent {
            builder = builder.user_agent(agent.to_string());
        }
        Ok(Self {
            client: builder.build()?,
        })
    }

    /// Download `task.source_url` into `task.destination_path`
    ///
    /// `on_progress` receives the completed fraction after every chunk.
    /// Returns the number of bytes written.
    pub async fn fetch<F>(&self, task: &DownloadTask, on_progress: F) -> Result<u64>
    where
        F: FnMut(f64) + Send + Unpin,
    {
        let url = Url::parse(&task.source_url).map_err(|e| AvMergeError::InvalidUrl {
            url: task.source_url.clone(),
            reason: e.to_string(),
        })?;

        debug!(%url, "sending GET");
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AvMergeError::BadStatus {
                code: status.as_u16(),
            });
        }

        let total = response
            .content_length()
            .and_then(NonZeroU64::new)
            .ok_or(AvMergeError::UnknownSize)?;
        info!(total = total.get(), dest = %task.destination_path.display(), "download started");

        write_body(response, &task.destination_path, total, on_progress).await
    }
}

async fn write_body<F>(
    response: reqwest::Response,
    destination: &Path,
    total: NonZeroU64,
    on_progress: F,
) -> Result<u64>
where
    F: FnMut(f64) + Send + Unpin,
{
    let file = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(destination)
        .await?;
    let mut writer = BufWriter::with_capacity(DOWNLOAD_BUFF_SZ, file);

    let mut body = ProgressReader::new(Box::pin(response.bytes_stream()), total, on_progress);
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
    }
    writer.flush().await?;

    let written = body.bytes_read();
    debug!(written, expected = total.get(), "download finished");
    Ok(written)
}

/// Convenience function to download a file with a one-off client
pub async fn fetch<F>(url: &str, destination: &Path, on_progress: F) -> Result<u64>
where
    F: FnMut(f64) + Send + Unpin,
{
    let downloader = Downloader::new(None, None)?;
    downloader
        .fetch(&DownloadTask::new(url, destination), on_progress)
        .await
}
