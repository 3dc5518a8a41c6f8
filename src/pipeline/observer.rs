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


//! Reporting pipeline activity to a front end
//!
//! The worker calls the observer from its own task, so implementations must
//! be `Send + Sync`. A front end either reads a [`ProgressCell`] whenever it
//! redraws or drains the events of a [`ChannelObserver`].

use super::state::PipelineState;
use crate::download::ProgressCell;
use tokio::sync::mpsc;

/// Sink for progress, log lines and state changes
pub trait PipelineObserver: Send + Sync {
    /// Completed fraction of the current stage, in `[0, 1]`
    fn on_progress(&self, fraction: f64);

    /// One human-readable line for the log surface
    fn on_log_line(&self, line: &str);

    /// The run entered `state`
    fn on_state(&self, _state: PipelineState) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {
    fn on_progress(&self, _fraction: f64) {}
    fn on_log_line(&self, _line: &str) {}
}

impl PipelineObserver for ProgressCell {
    fn on_progress(&self, fraction: f64) {
        self.store(fraction);
    }

    fn on_log_line(&self, _line: &str) {}

    fn on_state(&self, _state: PipelineState) {
        self.reset();
    }
}

/// Everything the pipeline reports, in order
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Progress(f64),
    Log(String),
    State(PipelineState),
}

/// Forwards every report into an unbounded channel
///
/// Sends after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelObserver {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PipelineObserver for ChannelObserver {
    fn on_progress(&self, fraction: f64) {
        let _ = self.tx.send(PipelineEvent::Progress(fraction));
    }

    fn on_log_line(&self, line: &str) {
        let _ = self.tx.send(PipelineEvent::Log(line.to_string()));
    }

    fn on_state(&self, state: PipelineState) {
        let _ = self.tx.send(PipelineEvent::State(state));
    }
}
