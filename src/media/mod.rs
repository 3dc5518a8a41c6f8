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


//! External media tool integration
//!
//! ffmpeg is invoked with exactly two argument shapes:
//! - inspect-only (`-i <file>`) to read the media duration
//! - stream-copy merge with `-progress pipe:1`
//!
//! # Module Organization
//!
//! ## tool
//! - `ToolSource` - system path or compiled-in bytes
//! - `ToolInstaller` - idempotent write-once materialization
//! - `MediaTool` - resolved tool for one run
//!
//! ## probe
//! - `MediaDuration` - total length in milliseconds
//! - `probe_duration_ms` / `parse_duration_ms`
//!
//! ## merger
//! - `Merger` - runs the merge and forwards progress fractions
//! - `parse_out_time_ms` / `progress_fraction`

pub mod merger;
pub mod probe;
pub mod tool;

// Re-export commonly used types for convenience
pub use merger::Merger;
pub use probe::{probe_duration_ms, MediaDuration};
pub use tool::{MediaTool, ToolInstaller, ToolSource};
