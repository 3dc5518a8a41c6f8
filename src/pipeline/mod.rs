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


//! Pipeline orchestration
//!
//! [`Pipeline`] drives one run through [`PipelineState`] and reports to a
//! [`PipelineObserver`]. Typical use from a front end:
//!
//! ```no_run
//! use avmerge_core::pipeline::{ChannelObserver, Pipeline, PipelineConfig, PipelineRequest};
//! use std::sync::Arc;
//!
//! # async fn demo() {
//! let (observer, mut events) = ChannelObserver::new();
//! let request = PipelineRequest::new("https://host/v.mp4", "https://host/a.m4a", "/tmp")
//!     .with_output_name("out.mp4");
//! let handle = Pipeline::new(PipelineConfig::default(), request, Arc::new(observer)).spawn();
//! while let Some(event) = events.recv().await {
//!     println!("{:?}", event);
//! }
//! let result = handle.await.unwrap();
//! # }
//! ```

pub mod config;
pub mod observer;
pub mod runner;
pub mod state;

// Re-export commonly used types
pub use config::{PipelineConfig, PipelineRequest};
pub use observer::{ChannelObserver, NullObserver, PipelineEvent, PipelineObserver};
pub use runner::{Pipeline, PipelineResult};
pub use state::PipelineState;
