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


//! Output naming and per-run file layout
//!
//! # Derived Names
//! The default output name is the last path segment of the video URL,
//! without the query string, with `.mp4` appended unless the segment already
//! ends in `.mp4`:
//! - `https://host/path/clip.mp4?sig=1` → `clip.mp4`
//! - `https://host/path/clip.webm?x=1` → `clip.webm.mp4`
//!
//! # Run Layout
//! Both temporary downloads live next to the final output in the
//! destination directory.

use std::path::{Path, PathBuf};
use url::Url;

const OUTPUT_EXTENSION: &str = ".mp4";

/// Derive an output file name from a video URL
///
/// Returns `None` when the URL has no usable final segment.
pub fn derive_file_name(url: &str) -> Option<String> {
    let url = url.trim();
    let segment = match Url::parse(url) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(|s| s.to_string())?,
        // Not an absolute URL; treat it as a bare path
        Err(_) => {
            let path = url.split(['?', '#']).next().unwrap_or("");
            path.rsplit('/').next().unwrap_or("").to_string()
        }
    };

    let segment = segment.split('?').next().unwrap_or("");
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let mut name = sanitize_filename(&decoded);
    if name.is_empty() {
        return None;
    }

    if !name.ends_with(OUTPUT_EXTENSION) {
        name.push_str(OUTPUT_EXTENSION);
    }
    Some(name)
}

/// Replace characters that are invalid in file names on common filesystems
///
/// Returns an empty string if nothing usable is left.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    // Trim leading/trailing whitespace and trailing dots
    let trimmed = replaced.trim().trim_end_matches('.');
    if trimmed.chars().all(|c| c == '_') {
        return String::new();
    }
    trimmed.to_string()
}

/// File locations for one pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunPaths {
    /// Temporary video download
    pub video: PathBuf,
    /// Temporary audio download
    pub audio: PathBuf,
    /// Final merged file
    pub output: PathBuf,
}

impl RunPaths {
    pub fn new(destination_dir: &Path, video_name: &str, audio_name: &str, output_name: &str) -> Self {
        Self {
            video: destination_dir.join(video_name),
            audio: destination_dir.join(audio_name),
            output: destination_dir.join(output_name),
        }
    }

    /// Temporary files removed after a successful run
    pub fn temporaries(&self) -> [&Path; 2] {
        [&self.video, &self.audio]
    }
}
