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


//! Download-and-merge orchestration
//!
//! A run is strictly sequential: video download, audio download, duration
//! probe, merge, cleanup. The first error ends the run in `Failed` and
//! leaves every file written so far on disk, including a materialized tool.

use super::config::{PipelineConfig, PipelineRequest};
use super::observer::PipelineObserver;
use super::state::PipelineState;
use crate::download::{DownloadTask, Downloader, ProgressCallback};
use crate::error::{AvMergeError, Result};
use crate::file::RunPaths;
use crate::media::{MediaDuration, MediaTool, Merger};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outcome of one run
#[derive(Debug)]
pub struct PipelineResult {
    /// Every line sent to the log surface
    pub log: Vec<String>,
    /// Every state entered, starting with `Idle`
    pub transitions: Vec<PipelineState>,
    /// Path of the merged file, or the error that stopped the run
    pub outcome: Result<PathBuf>,
}

impl PipelineResult {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    pub fn final_state(&self) -> PipelineState {
        self.transitions
            .last()
            .copied()
            .unwrap_or(PipelineState::Idle)
    }
}

/// One download-and-merge run
pub struct Pipeline {
    config: PipelineConfig,
    request: PipelineRequest,
    observer: Arc<dyn PipelineObserver>,
    state: PipelineState,
    log: Vec<String>,
    transitions: Vec<PipelineState>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        request: PipelineRequest,
        observer: Arc<dyn PipelineObserver>,
    ) -> Self {
        Self {
            config,
            request,
            observer,
            state: PipelineState::Idle,
            log: Vec::new(),
            transitions: vec![PipelineState::Idle],
        }
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Run on a background task
    pub fn spawn(self) -> JoinHandle<PipelineResult> {
        tokio::spawn(self.run())
    }

    /// Run to completion on the current task
    pub async fn run(mut self) -> PipelineResult {
        let outcome = self.execute().await;
        PipelineResult {
            log: self.log,
            transitions: self.transitions,
            outcome,
        }
    }

    async fn execute(&mut self) -> Result<PathBuf> {
        let paths = match self.request.validate(&self.config) {
            Ok(paths) => paths,
            Err(e) => return Err(self.fail(e)),
        };
        let downloader = match Downloader::new(
            Some(self.config.request_timeout()),
            self.config.user_agent.as_deref(),
        ) {
            Ok(downloader) => downloader,
            Err(e) => return Err(self.fail(e)),
        };
        let mut tool = match MediaTool::from_source(&self.config.tool) {
            Ok(tool) => tool,
            Err(e) => return Err(self.fail(e)),
        };
        info!(output = %paths.output.display(), "pipeline started");

        let outcome = self.run_stages(&paths, &downloader, &mut tool).await;
        if outcome.is_err() {
            // Leave a materialized tool in place but stop holding it
            if let Err(e) = tool.detach().await {
                warn!("failed to release materialized tool: {}", e);
            }
        }
        outcome
    }

    async fn run_stages(
        &mut self,
        paths: &RunPaths,
        downloader: &Downloader,
        tool: &mut MediaTool,
    ) -> Result<PathBuf> {
        self.enter(PipelineState::DownloadingVideo);
        self.log_line("Downloading video...");
        let task = DownloadTask::new(self.request.video_url.as_str(), &paths.video);
        if let Err(e) = self.download(downloader, &task).await {
            return Err(self.fail(e));
        }
        self.log_line("Video download completed.");

        self.enter(PipelineState::DownloadingAudio);
        self.log_line("Downloading audio...");
        let task = DownloadTask::new(self.request.audio_url.as_str(), &paths.audio);
        if let Err(e) = self.download(downloader, &task).await {
            return Err(self.fail(e));
        }
        self.log_line("Audio download completed.");

        self.enter(PipelineState::Probing);
        let program = match tool.program().await {
            Ok(program) => program,
            Err(e) => {
                let line = format!("Failed to get ffmpeg path: {}", e);
                return Err(self.fail_with(line, e));
            }
        };
        let duration = match MediaDuration::probe(&program, &paths.video).await {
            Ok(duration) => duration,
            Err(e) => return Err(self.fail(e)),
        };
        debug!(ms = duration.total_milliseconds, length = ?duration.as_duration(), "video duration");

        self.enter(PipelineState::Merging);
        self.log_line("Merging video and audio...");
        let observer = Arc::clone(&self.observer);
        let on_progress: ProgressCallback = Arc::new(move |f: f64| observer.on_progress(f));
        let merged = Merger::new(program)
            .merge(&paths.video, &paths.audio, &paths.output, Some(duration), on_progress)
            .await;
        if let Err(e) = merged {
            return Err(self.fail(e));
        }
        self.log_line("Merging completed.");

        self.enter(PipelineState::Cleanup);
        remove_artifacts(paths, tool).await;

        self.enter(PipelineState::Done);
        self.log_line(&format!(
            "Process completed. The final video is located at {}",
            paths.output.display()
        ));
        Ok(paths.output.clone())
    }

    async fn download(&self, downloader: &Downloader, task: &DownloadTask) -> Result<u64> {
        let observer = Arc::clone(&self.observer);
        let written = downloader
            .fetch(task, move |f| observer.on_progress(f))
            .await?;
        debug!(%task, written, "download stage finished");
        Ok(written)
    }

    fn enter(&mut self, state: PipelineState) {
        debug_assert!(
            state == PipelineState::Failed || self.state.next() == Some(state),
            "{} cannot move to {}",
            self.state,
            state
        );
        debug!(from = %self.state, to = %state, "state transition");
        self.state = state;
        self.transitions.push(state);
        self.observer.on_state(state);
        if !state.is_terminal() {
            self.observer.on_progress(0.0);
        }
    }

    fn log_line(&mut self, line: &str) {
        info!("{}", line);
        self.observer.on_log_line(line);
        self.log.push(line.to_string());
    }

    fn fail(&mut self, err: AvMergeError) -> AvMergeError {
        let line = match self.state.failure_prefix() {
            Some(prefix) => format!("{}: {}", prefix, err),
            None => err.user_message(),
        };
        self.fail_with(line, err)
    }

    fn fail_with(&mut self, line: String, err: AvMergeError) -> AvMergeError {
        debug_assert!(self.state.can_fail(), "{} cannot fail", self.state);
        warn!(state = %self.state, "pipeline failed: {}", err);
        self.log_line(&line);
        self.enter(PipelineState::Failed);
        err
    }
}

/// Remove temporaries and a materialized tool; failures are only warned
async fn remove_artifacts(paths: &RunPaths, tool: &mut MediaTool) {
    for temp in paths.temporaries() {
        if let Err(e) = tokio::fs::remove_file(temp).await {
            warn!(path = %temp.display(), "failed to remove temporary file: {}", e);
        }
    }
    match tool.cleanup().await {
        Ok(true) => debug!("removed materialized tool"),
        Ok(false) => {}
        Err(e) => warn!("failed to remove materialized tool: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::observer::{ChannelObserver, NullObserver, PipelineEvent};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_field_fails_from_idle() {
        let dir = TempDir::new().unwrap();
        let request = PipelineRequest::new("", "http://127.0.0.1:9/a.m4a", dir.path());
        let result = Pipeline::new(PipelineConfig::default(), request, Arc::new(NullObserver))
            .run()
            .await;

        assert!(!result.is_success());
        assert_eq!(result.transitions, vec![PipelineState::Idle, PipelineState::Failed]);
        assert_eq!(result.log, vec!["Please fill in all fields.".to_string()]);
        assert!(matches!(result.outcome, Err(AvMergeError::MissingField("video URL"))));
    }

    #[tokio::test]
    async fn test_missing_directory_fails_from_idle() {
        let dir = TempDir::new().unwrap();
        let request = PipelineRequest::new(
            "http://127.0.0.1:9/v.mp4",
            "http://127.0.0.1:9/a.m4a",
            dir.path().join("nope"),
        );
        let (observer, mut rx) = ChannelObserver::new();
        let result = Pipeline::new(PipelineConfig::default(), request, Arc::new(observer))
            .spawn()
            .await
            .unwrap();

        assert_eq!(result.final_state(), PipelineState::Failed);
        assert_eq!(
            rx.recv().await,
            Some(PipelineEvent::Log("Destination directory does not exist.".to_string()))
        );
        assert_eq!(rx.recv().await, Some(PipelineEvent::State(PipelineState::Failed)));
    }

    #[test]
    fn test_new_pipeline_is_idle() {
        let pipeline = Pipeline::new(
            PipelineConfig::default(),
            PipelineRequest::default(),
            Arc::new(NullObserver),
        );
        assert_eq!(pipeline.state(), PipelineState::Idle);
    }
}
