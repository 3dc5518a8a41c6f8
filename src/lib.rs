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


//! avmerge core
//!
//! Downloads a video-only stream and an audio-only stream over HTTP and
//! multiplexes them into a single file with ffmpeg, reporting progress and
//! log lines to a front end along the way.
//!
//! # Modules
//! - [`download`]: streaming HTTP downloads with progress
//! - [`media`]: locating ffmpeg, probing duration, merging
//! - [`file`]: output naming and run layout
//! - [`pipeline`]: the run state machine and observer interface
//! - [`storage`]: remembered inputs
//! - [`error`]: the crate error type

pub mod download;
pub mod error;
pub mod file;
pub mod media;
pub mod pipeline;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{AvMergeError, Result};
pub use pipeline::{
    ChannelObserver, Pipeline, PipelineConfig, PipelineEvent, PipelineObserver, PipelineRequest,
    PipelineResult, PipelineState,
};
