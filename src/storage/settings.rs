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


//! Remembered inputs
//!
//! The last video URL, audio URL, output name and destination directory are
//! kept in `<config_dir>/avmerge/settings.json` and offered as defaults on
//! the next run.

use crate::error::{AvMergeError, Result};
use crate::file::derive_file_name;
use crate::pipeline::PipelineRequest;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

const APP_DIR: &str = "avmerge";
const SETTINGS_FILE: &str = "settings.json";

/// Values remembered between runs
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_video_url: String,
    pub last_audio_url: String,
    pub last_output_name: String,
    pub last_directory: Option<PathBuf>,
}

impl Settings {
    /// Platform location of the settings file
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs::config_dir()
            .ok_or_else(|| AvMergeError::Settings("No configuration directory on this platform".to_string()))?;
        Ok(base.join(APP_DIR).join(SETTINGS_FILE))
    }

    /// Load from the default location
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?).await
    }

    /// Load from `path`; a missing file yields defaults
    pub async fn load_from(path: &Path) -> Result<Self> {
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no settings file, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };
        let settings: Self = serde_json::from_str(&json)?;
        Ok(settings)
    }

    /// Save to the default location
    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?).await
    }

    /// Save to `path`, creating its directory
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(self)?;
        tokio::fs::write(path, json).await?;
        debug!(path = %path.display(), "settings saved");
        Ok(())
    }

    /// Remember a new video URL and re-derive the output name from it
    ///
    /// The previous output name is kept when nothing can be derived.
    pub fn set_video_url(&mut self, url: &str) {
        self.last_video_url = url.to_string();
        if let Some(name) = derive_file_name(url) {
            self.last_output_name = name;
        }
    }

    /// Build a request from explicit values, falling back to remembered ones
    ///
    /// A remembered output name only applies when the video URL is also the
    /// remembered one; a new URL gets a freshly derived name at validation.
    pub fn fill_request(
        &self,
        video_url: Option<String>,
        audio_url: Option<String>,
        destination_dir: Option<PathBuf>,
        output_name: Option<String>,
    ) -> PipelineRequest {
        let output_name = match output_name {
            Some(name) => Some(name),
            None if video_url.is_none() && !self.last_output_name.is_empty() => {
                Some(self.last_output_name.clone())
            }
            None => None,
        };
        PipelineRequest {
            video_url: video_url.unwrap_or_else(|| self.last_video_url.clone()),
            audio_url: audio_url.unwrap_or_else(|| self.last_audio_url.clone()),
            destination_dir: destination_dir
                .or_else(|| self.last_directory.clone())
                .unwrap_or_default(),
            output_name,
        }
    }

    /// Store the inputs of a run that is about to start
    pub fn remember(&mut self, request: &PipelineRequest) {
        self.set_video_url(&request.video_url);
        self.last_audio_url = request.audio_url.clone();
        if let Some(name) = request.output_name.as_ref().filter(|n| !n.trim().is_empty()) {
            self.last_output_name = name.clone();
        }
        if !request.destination_dir.as_os_str().is_empty() {
            self.last_directory = Some(request.destination_dir.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let settings = Settings::load_from(&dir.path().join("settings.json")).await.unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let settings = Settings {
            last_video_url: "https://host/v/clip.mp4".to_string(),
            last_audio_url: "https://host/a/clip.m4a".to_string(),
            last_output_name: "clip.mp4".to_string(),
            last_directory: Some(PathBuf::from("/videos")),
        };
        settings.save_to(&path).await.unwrap();

        let loaded = Settings::load_from(&path).await.unwrap();
        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_partial_file_fills_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, r#"{"last_audio_url":"https://host/a.m4a"}"#)
            .await
            .unwrap();
        let loaded = Settings::load_from(&path).await.unwrap();
        assert_eq!(loaded.last_audio_url, "https://host/a.m4a");
        assert!(loaded.last_video_url.is_empty());
        assert!(loaded.last_directory.is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        tokio::fs::write(&path, "not json").await.unwrap();
        assert!(matches!(
            Settings::load_from(&path).await,
            Err(AvMergeError::SerdeJson(_))
        ));
    }

    #[test]
    fn test_set_video_url_derives_name() {
        let mut settings = Settings::default();
        settings.set_video_url("https://host/path/clip.webm?x=1");
        assert_eq!(settings.last_output_name, "clip.webm.mp4");

        settings.set_video_url("https://host/");
        assert_eq!(settings.last_video_url, "https://host/");
        assert_eq!(settings.last_output_name, "clip.webm.mp4");
    }

    #[test]
    fn test_fill_request_uses_remembered_values() {
        let settings = Settings {
            last_video_url: "https://host/v/old.mp4".to_string(),
            last_audio_url: "https://host/a/old.m4a".to_string(),
            last_output_name: "renamed.mp4".to_string(),
            last_directory: Some(PathBuf::from("/videos")),
        };

        let request = settings.fill_request(None, None, None, None);
        assert_eq!(request.video_url, "https://host/v/old.mp4");
        assert_eq!(request.audio_url, "https://host/a/old.m4a");
        assert_eq!(request.destination_dir, PathBuf::from("/videos"));
        assert_eq!(request.output_name.as_deref(), Some("renamed.mp4"));

        // A new video URL does not inherit the old output name
        let request = settings.fill_request(Some("https://host/v/new.mp4".to_string()), None, None, None);
        assert_eq!(request.output_name, None);
        assert_eq!(request.resolved_output_name().unwrap(), "new.mp4");
    }

    #[test]
    fn test_remember_request() {
        let mut settings = Settings::default();
        let request = PipelineRequest::new("https://host/v/clip.mp4", "https://host/a.m4a", "/videos");
        settings.remember(&request);
        assert_eq!(settings.last_output_name, "clip.mp4");
        assert_eq!(settings.last_directory, Some(PathBuf::from("/videos")));

        settings.remember(&request.clone().with_output_name("final.mp4"));
        assert_eq!(settings.last_output_name, "final.mp4");
    }
}
