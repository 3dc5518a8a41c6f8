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


//! Media duration probing
//!
//! Runs `ffmpeg -i <file>` with no output. ffmpeg prints the stream summary
//! to stderr and then exits non-zero ("At least one output file must be
//! specified"); that exit is expected and ignored. Only the text matters:
//!
//! ```text
//!   Duration: 00:03:25.47, start: 0.000000, bitrate: 1288 kb/s
//! ```

use crate::error::{AvMergeError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

lazy_static! {
    static ref DURATION_REGEX: Regex =
        Regex::new(r"Duration: ([0-9]{2}):([0-9]{2}):([0-9]{2})\.([0-9]{2})").unwrap();
}

/// Total length of a media file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct MediaDuration {
    pub total_milliseconds: u64,
}

impl MediaDuration {
    pub fn from_millis(total_milliseconds: u64) -> Self {
        Self { total_milliseconds }
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.total_milliseconds)
    }

    /// Probe `media` with `tool`
    pub async fn probe(tool: &Path, media: &Path) -> Result<Self> {
        probe_duration_ms(tool, media).await.map(Self::from_millis)
    }
}

/// Extract the first `Duration: HH:MM:SS.CC` from ffmpeg output, in milliseconds
pub fn parse_duration_ms(text: &str) -> Result<u64> {
    let caps = DURATION_REGEX
        .captures(text)
        .ok_or(AvMergeError::DurationUnparseable)?;

    // Groups are two ASCII digits, so the parse cannot fail
    let field = |i: usize| -> u64 { caps[i].parse().unwrap_or(0) };
    let (hours, minutes, seconds, centis) = (field(1), field(2), field(3), field(4));

    Ok((hours * 3600 + minutes * 60 + seconds) * 1000 + centis * 10)
}

/// Run the tool in inspect-only mode and parse the media duration
pub async fn probe_duration_ms(tool: &Path, media: &Path) -> Result<u64> {
    let output = Command::new(tool)
        .arg("-i")
        .arg(media.as_os_str())
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| AvMergeError::from_spawn(e, tool))?;

    debug!(status = %output.status, "probe finished");

    let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
    combined.push_str(&String::from_utf8_lossy(&output.stderr));

    parse_duration_ms(&combined)
}
