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


//! Pipeline configuration and per-run inputs

use crate::error::{AvMergeError, Result};
use crate::file::{derive_file_name, RunPaths};
use crate::media::ToolSource;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// File name of the temporary video download
    pub video_temp_name: String,

    /// File name of the temporary audio download
    pub audio_temp_name: String,

    /// HTTP client timeout in seconds
    pub request_timeout_secs: u64,

    /// Optional User-Agent header for downloads
    pub user_agent: Option<String>,

    /// Where ffmpeg comes from
    pub tool: ToolSource,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            video_temp_name: "video.mp4".to_string(),
            audio_temp_name: "audio.mp4".to_string(),
            request_timeout_secs: 300,
            user_agent: None,
            tool: ToolSource::default(),
        }
    }
}

impl PipelineConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn with_tool(mut self, tool: ToolSource) -> Self {
        self.tool = tool;
        self
    }
}

/// The four inputs of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub video_url: String,
    pub audio_url: String,
    pub destination_dir: PathBuf,
    /// Explicit output file name; derived from the video URL when absent
    pub output_name: Option<String>,
}

impl PipelineRequest {
    pub fn new(
        video_url: impl Into<String>,
        audio_url: impl Into<String>,
        destination_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            video_url: video_url.into(),
            audio_url: audio_url.into(),
            destination_dir: destination_dir.into(),
            output_name: None,
        }
    }

    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }

    /// Explicit output name, or one derived from the video URL
    pub fn resolved_output_name(&self) -> Result<String> {
        match self.output_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name.to_string()),
            _ => derive_file_name(&self.video_url).ok_or(AvMergeError::MissingField("output file name")),
        }
    }

    /// Check every input and lay out the files of the run
    ///
    /// Empty fields are reported before the directory is looked at.
    pub fn validate(&self, config: &PipelineConfig) -> Result<RunPaths> {
        if self.video_url.trim().is_empty() {
            return Err(AvMergeError::MissingField("video URL"));
        }
        if self.audio_url.trim().is_empty() {
            return Err(AvMergeError::MissingField("audio URL"));
        }
        if self.destination_dir.as_os_str().is_empty() {
            return Err(AvMergeError::MissingField("destination directory"));
        }

        let output_name = self.resolved_output_name()?;
        if output_name == config.video_temp_name || output_name == config.audio_temp_name {
            return Err(AvMergeError::OutputNameConflict(output_name));
        }

        if !self.destination_dir.is_dir() {
            return Err(AvMergeError::DirectoryNotFound(self.destination_dir.clone()));
        }

        Ok(RunPaths::new(
            &self.destination_dir,
            &config.video_temp_name,
            &config.audio_temp_name,
            &output_name,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn request(dir: &std::path::Path) -> PipelineRequest {
        PipelineRequest::new(
            "https://cdn.example.com/v/clip.webm?sig=1",
            "https://cdn.example.com/a/clip.m4a",
            dir,
        )
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.video_temp_name, "video.mp4");
        assert_eq!(config.audio_temp_name, "audio.mp4");
        assert_eq!(config.request_timeout(), Duration::from_secs(300));
        assert_eq!(config.tool, ToolSource::default());
    }

    #[test]
    fn test_config_fills_missing_fields() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"request_timeout_secs": 30}"#).unwrap();
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.video_temp_name, "video.mp4");
    }

    #[test]
    fn test_validate_derives_output_name() {
        let dir = TempDir::new().unwrap();
        let paths = request(dir.path()).validate(&PipelineConfig::default()).unwrap();
        assert_eq!(paths.output, dir.path().join("clip.webm.mp4"));
        assert_eq!(paths.video, dir.path().join("video.mp4"));
        assert_eq!(paths.audio, dir.path().join("audio.mp4"));
    }

    #[test]
    fn test_validate_prefers_explicit_name() {
        let dir = TempDir::new().unwrap();
        let paths = request(dir.path())
            .with_output_name("out.mp4")
            .validate(&PipelineConfig::default())
            .unwrap();
        assert_eq!(paths.output, dir.path().join("out.mp4"));
    }

    #[test]
    fn test_validate_missing_fields() {
        let dir = TempDir::new().unwrap();
        let config = PipelineConfig::default();

        let mut req = request(dir.path());
        req.video_url = "  ".to_string();
        assert!(matches!(req.validate(&config), Err(AvMergeError::MissingField("video URL"))));

        let mut req = request(dir.path());
        req.audio_url.clear();
        assert!(matches!(req.validate(&config), Err(AvMergeError::MissingField("audio URL"))));

        let mut req = request(dir.path());
        req.destination_dir = PathBuf::new();
        assert!(matches!(
            req.validate(&config),
            Err(AvMergeError::MissingField("destination directory"))
        ));

        let req = PipelineRequest::new("https://host/", "https://host/a.m4a", dir.path());
        assert!(matches!(
            req.validate(&config),
            Err(AvMergeError::MissingField("output file name"))
        ));
    }

    #[test]
    fn test_validate_missing_directory() {
        let dir = TempDir::new().unwrap();
        let req = request(&dir.path().join("absent"));
        let err = req.validate(&PipelineConfig::default()).unwrap_err();
        assert!(matches!(err, AvMergeError::DirectoryNotFound(_)));
        assert_eq!(err.user_message(), "Destination directory does not exist.");
    }

    #[test]
    fn test_validate_rejects_temp_name_as_output() {
        let dir = TempDir::new().unwrap();
        let err = request(dir.path())
            .with_output_name("audio.mp4")
            .validate(&PipelineConfig::default())
            .unwrap_err();
        assert!(matches!(err, AvMergeError::OutputNameConflict(name) if name == "audio.mp4"));
    }
}
