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


//! Error types for avmerge
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by the pipeline stage that produces them:
//!
//! - **Input validation**: missing fields, nonexistent destination directory
//! - **Network**: transport failures, non-2xx status, unknown content length
//! - **Tool invocation**: ffmpeg could not be found or started
//! - **Tool exit**: ffmpeg ran the merge and exited non-zero
//! - **Probe parse**: no `Duration:` timestamp in ffmpeg's diagnostic output
//!
//! Every error is terminal for a pipeline run. The orchestrator turns it into
//! a single log line and stops; nothing is retried or rolled back.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using our AvMergeError type
pub type Result<T> = std::result::Result<T, AvMergeError>;

/// Main error type for avmerge
#[derive(Error, Debug)]
pub enum AvMergeError {
    // ===== Input Validation =====

    /// A required pipeline input was empty
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    /// Destination directory does not exist or is not a directory
    #[error("Destination directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Output file name would overwrite one of the temporary downloads
    #[error("Output file name '{0}' is reserved for a temporary download")]
    OutputNameConflict(String),

    /// URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // ===== Network =====

    /// Transport-level failure (DNS, connect, TLS, body read)
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Server answered with a non-2xx status
    #[error("Bad status: {code}")]
    BadStatus { code: u16 },

    /// Server did not declare a usable content length
    #[error("Unable to determine file size")]
    UnknownSize,

    // ===== Tool Invocation =====

    /// The ffmpeg executable does not exist at the configured path
    #[error("FFmpeg not found: {}", .0.display())]
    ToolNotFound(PathBuf),

    /// The ffmpeg executable exists but could not be started
    #[error("Failed to start ffmpeg: {0}")]
    ToolLaunchFailed(String),

    /// No bundled tool was compiled into this build
    #[error("No bundled ffmpeg available in this build")]
    BundledToolUnavailable,

    // ===== Tool Exit =====

    /// The merge invocation exited with a non-zero status
    #[error("FFmpeg error: {details}")]
    ToolFailed { details: String },

    // ===== Probe Parse =====

    /// No duration timestamp in the probe output
    #[error("Unable to parse duration")]
    DurationUnparseable,

    // ===== Ambient =====

    /// Settings file could not be read or written
    #[error("Settings error: {0}")]
    Settings(String),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AvMergeError {
    /// Build a ToolFailed error from an exit status and captured stderr
    pub fn tool_failed(status: std::process::ExitStatus, stderr_tail: &str) -> Self {
        let tail = stderr_tail.trim();
        let details = if tail.is_empty() {
            format!("exit status {}", status)
        } else {
            format!("exit status {}: {}", status, tail)
        };
        AvMergeError::ToolFailed { details }
    }

    /// Map a spawn failure to the matching invocation error
    pub fn from_spawn(err: std::io::Error, program: &std::path::Path) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            AvMergeError::ToolNotFound(program.to_path_buf())
        } else {
            AvMergeError::ToolLaunchFailed(format!("{}: {}", program.display(), err))
        }
    }

    /// Missing field, bad directory or unparseable URL
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AvMergeError::MissingField(_)
                | AvMergeError::DirectoryNotFound(_)
                | AvMergeError::OutputNameConflict(_)
                | AvMergeError::InvalidUrl { .. }
        )
    }

    /// Transport failure, bad status or unknown size
    pub fn is_network_error(&self) -> bool {
        matches!(
            self,
            AvMergeError::Network(_) | AvMergeError::BadStatus { .. } | AvMergeError::UnknownSize
        )
    }

    /// Any failure attributable to the external tool
    pub fn is_tool_error(&self) -> bool {
        matches!(
            self,
            AvMergeError::ToolNotFound(_)
                | AvMergeError::ToolLaunchFailed(_)
                | AvMergeError::BundledToolUnavailable
                | AvMergeError::ToolFailed { .. }
                | AvMergeError::DurationUnparseable
        )
    }

    /// HTTP status code, if this error carries one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AvMergeError::BadStatus { code } => Some(*code),
            AvMergeError::Network(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Get a user-friendly error message
    ///
    /// Shown in the log surface; technical variants fall back to `Display`.
    pub fn user_message(&self) -> String {
        match self {
            AvMergeError::MissingField(_) => "Please fill in all fields.".to_string(),
            AvMergeError::DirectoryNotFound(_) => {
                "Destination directory does not exist.".to_string()
            }
            AvMergeError::ToolNotFound(path) => format!(
                "FFmpeg is required but was not found at '{}'. Install FFmpeg or pass its location with --ffmpeg.",
                path.display()
            ),
            AvMergeError::UnknownSize => {
                "The server did not report the file size, so the download cannot be tracked."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert!(AvMergeError::MissingField("video URL").is_input_error());
        assert!(AvMergeError::DirectoryNotFound(PathBuf::from("/nope")).is_input_error());
        assert!(AvMergeError::BadStatus { code: 404 }.is_network_error());
        assert!(AvMergeError::UnknownSize.is_network_error());
        assert!(AvMergeError::DurationUnparseable.is_tool_error());
        assert!(!AvMergeError::UnknownSize.is_tool_error());
    }

    #[test]
    fn test_status_code() {
        assert_eq!(AvMergeError::BadStatus { code: 404 }.status_code(), Some(404));
        assert_eq!(AvMergeError::UnknownSize.status_code(), None);
    }

    #[test]
    fn test_spawn_not_found_maps_to_tool_not_found() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let mapped = AvMergeError::from_spawn(err, std::path::Path::new("/opt/ffmpeg"));
        assert!(matches!(mapped, AvMergeError::ToolNotFound(p) if p == PathBuf::from("/opt/ffmpeg")));
    }

    #[test]
    fn test_user_message() {
        assert_eq!(
            AvMergeError::MissingField("audio URL").user_message(),
            "Please fill in all fields."
        );
        assert_eq!(AvMergeError::BadStatus { code: 500 }.user_message(), "Bad status: 500");
    }
}
