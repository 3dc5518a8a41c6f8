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


//! Stream-copy merge of one video and one audio input
//!
//! # Command
//! `ffmpeg -i video -i audio -c copy -map 0:v:0 -map 1:a:0 -y output -progress pipe:1`
//!
//! - `-c copy`: no re-encoding
//! - `-map 0:v:0` / `-map 1:a:0`: first video stream of input 1, first audio
//!   stream of input 2
//! - `-y`: overwrite the output
//! - `-progress pipe:1`: `key=value` progress blocks on stdout
//!
//! # Progress Protocol
//! ffmpeg writes blocks like
//! ```text
//! out_time_ms=5005000
//! out_time=00:00:05.005000
//! progress=continue
//! ```
//! Only `out_time_ms` is used. The value is compared directly against the
//! probed duration in milliseconds and clamped to 1.0.

use crate::download::progress::{ProgressCallback, ProgressState};
use crate::error::{AvMergeError, Result};
use crate::media::probe::MediaDuration;
use std::collections::VecDeque;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

const OUT_TIME_KEY: &str = "out_time_ms=";
const STDERR_TAIL_LINES: usize = 8;
/// Longer lines are truncated
const MAX_LINE_BYTES: usize = 1024;

/// Build the ffmpeg argument list for a stream-copy merge
pub fn merge_args(video: &Path, audio: &Path, output: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = Vec::with_capacity(16);
    args.push("-i".into());
    args.push(video.as_os_str().to_owned());
    args.push("-i".into());
    args.push(audio.as_os_str().to_owned());
    args.push("-c".into());
    args.push("copy".into());
    args.push("-map".into());
    args.push("0:v:0".into());
    args.push("-map".into());
    args.push("1:a:0".into());
    args.push("-y".into());
    args.push(output.as_os_str().to_owned());
    args.push("-progress".into());
    args.push("pipe:1".into());
    args
}

/// Elapsed sample from one progress line, `None` for any other line
pub fn parse_out_time_ms(line: &str) -> Option<i64> {
    line.trim_end()
        .strip_prefix(OUT_TIME_KEY)
        .and_then(|value| value.trim().parse::<i64>().ok())
}

/// Fraction for an elapsed sample; `None` if the total is unknown
pub fn progress_fraction(elapsed: i64, total: u64) -> Option<f64> {
    ProgressState {
        done: elapsed.max(0) as u64,
        total,
    }
    .fraction()
}

/// Runs the merge invocation
pub struct Merger {
    program: PathBuf,
}

impl Merger {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Merge `video` and `audio` into `output`
    ///
    /// Progress is only reported when `duration` is known and positive.
    pub async fn merge(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
        duration: Option<MediaDuration>,
        on_progress: ProgressCallback,
    ) -> Result<()> {
        let args = merge_args(video, audio, output);
        debug!(program = %self.program.display(), ?args, "launching merge");

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AvMergeError::from_spawn(e, &self.program))?;

        let stdout = child.stdout.take().ok_or_else(|| {
            AvMergeError::ToolLaunchFailed("Failed to capture ffmpeg stdout".to_string())
        })?;
        let stderr = child.stderr.take().ok_or_else(|| {
            AvMergeError::ToolLaunchFailed("Failed to capture ffmpeg stderr".to_string())
        })?;

        let total = duration.map(|d| d.total_milliseconds).unwrap_or(0);
        let reader = tokio::spawn(read_progress(stdout, total, on_progress));

        // stderr has to be drained or ffmpeg stalls once the pipe fills
        let (status, stderr_tail) = tokio::join!(child.wait(), collect_tail(stderr));
        let status = status.map_err(|e| {
            AvMergeError::ToolLaunchFailed(format!("Failed to wait for ffmpeg: {}", e))
        })?;

        let samples = match reader.await {
            Ok(samples) => samples,
            Err(e) => {
                warn!("progress reader ended abnormally: {}", e);
                0
            }
        };
        info!(%status, samples, "merge finished");

        if !status.success() {
            return Err(AvMergeError::tool_failed(status, &stderr_tail));
        }
        Ok(())
    }
}

/// Forward every `out_time_ms` sample until the pipe closes
async fn read_progress<R>(stdout: R, total: u64, on_progress: ProgressCallback) -> usize
where
    R: AsyncRead + Unpin,
{
    let mut samples = 0;
    for_each_line(stdout, |line| {
        let Some(elapsed) = parse_out_time_ms(line) else {
            return;
        };
        samples += 1;
        if let Some(fraction) = progress_fraction(elapsed, total) {
            on_progress(fraction);
        }
    })
    .await;
    samples
}

/// Keep the last few stderr lines for error details
async fn collect_tail<R>(stderr: R) -> String
where
    R: AsyncRead + Unpin,
{
    let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);
    for_each_line(stderr, |line| {
        if tail.len() == STDERR_TAIL_LINES {
            tail.pop_front();
        }
        tail.push_back(line.to_string());
    })
    .await;
    Vec::from(tail).join("\n")
}

/// Read `pipe` to EOF, handing each non-empty line to `on_line`
///
/// Both `\n` and `\r` end a line, since ffmpeg redraws its stats line with
/// carriage returns. Bytes that are not UTF-8 are replaced, and lines are cut
/// at `MAX_LINE_BYTES`. Only EOF or a read error stops the loop, so the child
/// never sees its pipe closed early.
async fn for_each_line<R, F>(pipe: R, mut on_line: F)
where
    R: AsyncRead + Unpin,
    F: FnMut(&str),
{
    let mut reader = BufReader::new(pipe);
    let mut line: Vec<u8> = Vec::with_capacity(256);
    loop {
        let chunk = match reader.fill_buf().await {
            Ok(chunk) => chunk,
            Err(e) => {
                debug!("pipe read failed: {}", e);
                break;
            }
        };
        if chunk.is_empty() {
            break;
        }
        for &byte in chunk {
            if byte == b'\n' || byte == b'\r' {
                if !line.is_empty() {
                    on_line(&*String::from_utf8_lossy(&line));
                    line.clear();
                }
            } else if line.len() < MAX_LINE_BYTES {
                line.push(byte);
            }
        }
        let consumed = chunk.len();
        reader.consume(consumed);
    }
    if !line.is_empty() {
        on_line(&*String::from_utf8_lossy(&line));
    }
}
