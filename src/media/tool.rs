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


//! Locating the ffmpeg executable
//!
//! Two sources are supported:
//! - **System**: a path or bare program name resolved through `PATH`. Used
//!   as-is and never deleted.
//! - **Bundled**: ffmpeg bytes compiled in with the `bundled-ffmpeg` feature,
//!   written to `<temp_dir>/ffmpeg[.exe]` on first use and removed after a
//!   successful run once no other run still holds it.
//!
//! Materialization is write-once: an existing file at the target path is
//! reused. Each installer serializes `ensure_present` behind one lock, and
//! the compiled-in tool has a single installer per process, so overlapping
//! runs share it. Staging files carry the pid and a sequence number, so
//! separate installers aimed at one path never write the same staging file.

use crate::error::{AvMergeError, Result};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

#[cfg(all(feature = "bundled-ffmpeg", target_os = "windows"))]
const BUNDLED_FFMPEG: Option<&[u8]> =
    Some(include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/bin/ffmpeg.exe")));
#[cfg(all(feature = "bundled-ffmpeg", not(target_os = "windows")))]
const BUNDLED_FFMPEG: Option<&[u8]> =
    Some(include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/assets/bin/ffmpeg")));
#[cfg(not(feature = "bundled-ffmpeg"))]
const BUNDLED_FFMPEG: Option<&[u8]> = None;

/// Platform file name of the tool
pub fn tool_file_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "ffmpeg.exe"
    } else {
        "ffmpeg"
    }
}

/// Where the tool comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolSource {
    /// Executable on disk or on `PATH`
    System { path: PathBuf },
    /// Bytes compiled into this binary
    Bundled,
}

impl Default for ToolSource {
    fn default() -> Self {
        ToolSource::System {
            path: PathBuf::from(tool_file_name()),
        }
    }
}

lazy_static! {
    /// One installer for the compiled-in bytes, shared by every run in the process
    static ref BUNDLED_INSTALLER: Option<Arc<ToolInstaller>> = BUNDLED_FFMPEG
        .map(|bytes| Arc::new(ToolInstaller::new(bytes, ToolInstaller::default_path())));
}

/// Distinguishes staging files of installers in the same process
static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Default)]
struct InstallState {
    installed: bool,
    leases: usize,
}

/// Writes tool bytes to a fixed path at most once
///
/// Runs that execute the tool hold a lease; the file is only removed when
/// the last lease is released.
pub struct ToolInstaller {
    bytes: Cow<'static, [u8]>,
    path: PathBuf,
    state: Mutex<InstallState>,
}

impl ToolInstaller {
    pub fn new(bytes: impl Into<Cow<'static, [u8]>>, path: impl Into<PathBuf>) -> Self {
        Self {
            bytes: bytes.into(),
            path: path.into(),
            state: Mutex::new(InstallState::default()),
        }
    }

    /// Shared installer for the compiled-in tool at the default temp path
    pub fn bundled() -> Result<Arc<Self>> {
        BUNDLED_INSTALLER
            .clone()
            .ok_or(AvMergeError::BundledToolUnavailable)
    }

    pub fn default_path() -> PathBuf {
        std::env::temp_dir().join(tool_file_name())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Make sure the tool exists at `path()` and return that path
    pub async fn ensure_present(&self) -> Result<PathBuf> {
        let mut state = self.state.lock().await;
        self.install(&mut state).await
    }

    /// Like `ensure_present`, and hold the file until `release`
    pub async fn acquire(&self) -> Result<PathBuf> {
        let mut state = self.state.lock().await;
        let path = self.install(&mut state).await?;
        state.leases += 1;
        Ok(path)
    }

    /// Give back a lease; with `remove_if_last` the last holder deletes the file
    ///
    /// Returns whether the file was removed.
    pub async fn release(&self, remove_if_last: bool) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.leases = state.leases.saturating_sub(1);
        if state.leases > 0 || !remove_if_last {
            debug!(leases = state.leases, "tool still in use or kept");
            return Ok(false);
        }
        state.installed = false;
        remove_file_if_present(&self.path).await
    }

    /// Delete the materialized file regardless of leases
    pub async fn remove(&self) -> Result<bool> {
        let mut state = self.state.lock().await;
        state.installed = false;
        remove_file_if_present(&self.path).await
    }

    async fn install(&self, state: &mut InstallState) -> Result<PathBuf> {
        if !state.installed {
            self.materialize().await?;
            state.installed = true;
        }
        Ok(self.path.clone())
    }

    async fn materialize(&self) -> Result<()> {
        if tokio::fs::try_exists(&self.path).await? {
            debug!(path = %self.path.display(), "reusing materialized tool");
        } else {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            // Write beside the target and rename so a half-written file is never picked up
            let staging = self.path.with_extension(format!(
                "partial-{}-{}",
                std::process::id(),
                STAGING_SEQ.fetch_add(1, Ordering::Relaxed)
            ));
            tokio::fs::write(&staging, &self.bytes).await?;
            if let Err(e) = tokio::fs::rename(&staging, &self.path).await {
                let _ = tokio::fs::remove_file(&staging).await;
                // Another installer got there first
                if !tokio::fs::try_exists(&self.path).await? {
                    return Err(e.into());
                }
                debug!(path = %self.path.display(), "tool materialized concurrently");
            }
            info!(path = %self.path.display(), bytes = self.bytes.len(), "materialized tool");
        }
        ensure_executable(&self.path).await
    }
}

async fn remove_file_if_present(path: &Path) -> Result<bool> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
async fn ensure_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = tokio::fs::metadata(path).await?.permissions();
    let mode = perms.mode();
    if mode & 0o111 != 0o111 {
        perms.set_mode(mode | 0o755);
        tokio::fs::set_permissions(path, perms).await?;
    }
    Ok(())
}

#[cfg(not(unix))]
async fn ensure_executable(_path: &Path) -> Result<()> {
    Ok(())
}

/// Resolved tool for one pipeline run
pub enum MediaTool {
    System(PathBuf),
    Bundled {
        installer: Arc<ToolInstaller>,
        leased: bool,
    },
}

impl MediaTool {
    pub fn from_source(source: &ToolSource) -> Result<Self> {
        match source {
            ToolSource::System { path } => Ok(MediaTool::System(path.clone())),
            ToolSource::Bundled => Ok(Self::from_installer(ToolInstaller::bundled()?)),
        }
    }

    pub fn from_installer(installer: Arc<ToolInstaller>) -> Self {
        MediaTool::Bundled {
            installer,
            leased: false,
        }
    }

    /// Path to execute, materializing a bundled tool if needed
    pub async fn program(&mut self) -> Result<PathBuf> {
        match self {
            MediaTool::System(path) => Ok(path.clone()),
            MediaTool::Bundled { installer, leased } => {
                if *leased {
                    return Ok(installer.path().to_path_buf());
                }
                let path = installer.acquire().await?;
                *leased = true;
                Ok(path)
            }
        }
    }

    /// Remove a materialized tool unless another run still holds it
    ///
    /// System tools are left alone.
    pub async fn cleanup(&mut self) -> Result<bool> {
        self.finish(true).await
    }

    /// Give up this run's hold on a materialized tool and leave the file
    pub async fn detach(&mut self) -> Result<()> {
        self.finish(false).await.map(|_| ())
    }

    async fn finish(&mut self, remove: bool) -> Result<bool> {
        match self {
            MediaTool::System(_) => Ok(false),
            MediaTool::Bundled { installer, leased } => {
                if !*leased {
                    return Ok(false);
                }
                *leased = false;
                installer.release(remove).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_source_is_system_ffmpeg() {
        assert_eq!(
            ToolSource::default(),
            ToolSource::System {
                path: PathBuf::from(tool_file_name())
            }
        );
    }

    #[test]
    fn test_source_serialization() {
        let json = serde_json::to_string(&ToolSource::Bundled).unwrap();
        assert_eq!(json, r#"{"kind":"bundled"}"#);
        let back: ToolSource =
            serde_json::from_str(r#"{"kind":"system","path":"/usr/bin/ffmpeg"}"#).unwrap();
        assert_eq!(
            back,
            ToolSource::System {
                path: PathBuf::from("/usr/bin/ffmpeg")
            }
        );
    }

    #[tokio::test]
    async fn test_ensure_present_writes_once() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("bin").join("ffmpeg");
        let installer = ToolInstaller::new(b"#!/bin/sh\nexit 0\n".as_slice(), &target);

        let path = installer.ensure_present().await.unwrap();
        assert_eq!(path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"#!/bin/sh\nexit 0\n");

        // Overwrite behind the installer's back; a second call must not rewrite
        std::fs::write(&target, b"changed").unwrap();
        installer.ensure_present().await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"changed");
    }

    #[tokio::test]
    async fn test_ensure_present_reuses_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        std::fs::write(&target, b"already here").unwrap();

        let installer = ToolInstaller::new(b"new bytes".as_slice(), &target);
        installer.ensure_present().await.unwrap();
        assert_eq!(std::fs::read(&target).unwrap(), b"already here");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_materialized_tool_is_executable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        let installer = ToolInstaller::new(b"bin".as_slice(), &target);
        installer.ensure_present().await.unwrap();

        let mode = std::fs::metadata(&target).unwrap().permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
    }

    #[tokio::test]
    async fn test_concurrent_ensure_present() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        let installer = Arc::new(ToolInstaller::new(vec![1u8; 64 * 1024], &target));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let installer = installer.clone();
            handles.push(tokio::spawn(async move { installer.ensure_present().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), target);
        }
        assert_eq!(std::fs::read(&target).unwrap().len(), 64 * 1024);
    }

    #[tokio::test]
    async fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        let installer = ToolInstaller::new(b"bin".as_slice(), &target);

        assert!(!installer.remove().await.unwrap());
        installer.ensure_present().await.unwrap();
        assert!(installer.remove().await.unwrap());
        assert!(!target.exists());

        // A removed tool is materialized again on the next request
        installer.ensure_present().await.unwrap();
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_installers_sharing_a_path_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        let bytes = vec![7u8; 256 * 1024];

        let mut handles = Vec::new();
        for _ in 0..8 {
            let installer = ToolInstaller::new(bytes.clone(), &target);
            handles.push(tokio::spawn(async move { installer.ensure_present().await }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap().unwrap(), target);
        }
        assert_eq!(std::fs::read(&target).unwrap(), bytes);

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .filter(|name| name != "ffmpeg")
            .collect();
        assert!(leftovers.is_empty(), "staging files left: {:?}", leftovers);
    }

    #[tokio::test]
    async fn test_shared_tool_survives_until_last_cleanup() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        let installer = Arc::new(ToolInstaller::new(b"bin".as_slice(), &target));

        let mut first = MediaTool::from_installer(installer.clone());
        let mut second = MediaTool::from_installer(installer.clone());
        assert_eq!(first.program().await.unwrap(), target);
        assert_eq!(second.program().await.unwrap(), target);

        // The second run is still merging when the first one finishes
        assert!(!first.cleanup().await.unwrap());
        assert!(target.exists());

        assert!(second.cleanup().await.unwrap());
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_detached_tool_stays_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        let installer = Arc::new(ToolInstaller::new(b"bin".as_slice(), &target));

        let mut failed = MediaTool::from_installer(installer.clone());
        let mut succeeded = MediaTool::from_installer(installer.clone());
        failed.program().await.unwrap();
        succeeded.program().await.unwrap();

        // A failed run lets go without deleting; the last successful one removes it
        failed.detach().await.unwrap();
        assert!(target.exists());
        assert!(succeeded.cleanup().await.unwrap());
        assert!(!target.exists());

        // Repeated calls on a released tool do nothing
        assert!(!succeeded.cleanup().await.unwrap());
    }

    #[tokio::test]
    async fn test_unused_bundled_tool_cleanup_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("ffmpeg");
        std::fs::write(&target, b"owned by someone else").unwrap();

        let mut tool = MediaTool::from_installer(Arc::new(ToolInstaller::new(b"bin".as_slice(), &target)));
        assert!(!tool.cleanup().await.unwrap());
        assert!(target.exists());
    }

    #[tokio::test]
    async fn test_system_tool_is_not_cleaned_up() {
        let mut tool = MediaTool::from_source(&ToolSource::default()).unwrap();
        assert_eq!(tool.program().await.unwrap(), PathBuf::from(tool_file_name()));
        assert!(!tool.cleanup().await.unwrap());
    }

    #[cfg(not(feature = "bundled-ffmpeg"))]
    #[test]
    fn test_bundled_unavailable_without_feature() {
        assert!(matches!(
            ToolInstaller::bundled(),
            Err(AvMergeError::BundledToolUnavailable)
        ));
    }
}
