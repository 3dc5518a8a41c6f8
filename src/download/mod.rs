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


//! HTTP downloads with progress
//!
//! Each download is one GET streamed straight to disk. There is no resume,
//! retry or parallelism; the pipeline runs the video and audio downloads
//! one after the other.

pub mod progress;
pub mod stream;

// Re-export commonly used types
pub use progress::{ProgressCallback, ProgressCell, ProgressReader, ProgressState};
pub use stream::{DownloadTask, Downloader};
