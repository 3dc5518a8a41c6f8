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


//! Pipeline states
//!
//! ```text
//! Idle → DownloadingVideo → DownloadingAudio → Probing → Merging → Cleanup → Done
//!   └──────────┴──────────────────┴───────────────┴──────────┴─→ Failed
//! ```
//!
//! `Done` and `Failed` are absorbing. `Cleanup` only fails through to
//! `Done`; removal errors there are logged and ignored.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Idle,
    DownloadingVideo,
    DownloadingAudio,
    Probing,
    Merging,
    Cleanup,
    Done,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::DownloadingVideo => "downloading_video",
            PipelineState::DownloadingAudio => "downloading_audio",
            PipelineState::Probing => "probing",
            PipelineState::Merging => "merging",
            PipelineState::Cleanup => "cleanup",
            PipelineState::Done => "done",
            PipelineState::Failed => "failed",
        }
    }

    /// Check if the run is over (done or failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Done | PipelineState::Failed)
    }

    /// State entered when this one completes successfully
    pub fn next(&self) -> Option<PipelineState> {
        match self {
            PipelineState::Idle => Some(PipelineState::DownloadingVideo),
            PipelineState::DownloadingVideo => Some(PipelineState::DownloadingAudio),
            PipelineState::DownloadingAudio => Some(PipelineState::Probing),
            PipelineState::Probing => Some(PipelineState::Merging),
            PipelineState::Merging => Some(PipelineState::Cleanup),
            PipelineState::Cleanup => Some(PipelineState::Done),
            PipelineState::Done | PipelineState::Failed => None,
        }
    }

    /// Whether a failure in this state ends the run
    ///
    /// Cleanup problems are reported but never fail a merged output.
    pub fn can_fail(&self) -> bool {
        !self.is_terminal() && *self != PipelineState::Cleanup
    }

    /// Prefix for the log line emitted when this stage fails
    pub fn failure_prefix(&self) -> Option<&'static str> {
        match self {
            PipelineState::DownloadingVideo => Some("Failed to download video"),
            PipelineState::DownloadingAudio => Some("Failed to download audio"),
            PipelineState::Probing => Some("Failed to get video duration"),
            PipelineState::Merging => Some("Failed to merge video and audio"),
            _ => None,
        }
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}
