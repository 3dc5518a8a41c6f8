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


//! Progress tracking and reporting
//!
//! # Progress Information
//! - `ProgressState`: done/total counter owned by one operation
//! - `ProgressReader`: byte-counting decorator for a chunk stream or a
//!   blocking reader, reporting a fraction after every non-empty read
//! - `ProgressCell`: last reported fraction, shared between the worker
//!   task that writes it and the surface that polls it

use futures_util::Stream;
use std::io::Read;
use std::num::NonZeroU64;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{ready, Context, Poll};

/// Callback type for progress updates (fraction in [0, 1])
pub type ProgressCallback = std::sync::Arc<dyn Fn(f64) + Send + Sync>;

/// Done/total counter for one download or merge
///
/// `done` counts bytes for downloads and elapsed tool time for merges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressState {
    /// Bytes or time units completed
    pub done: u64,
    /// Bytes or time units expected (0 if unknown)
    pub total: u64,
}

impl ProgressState {
    pub fn new(total: u64) -> Self {
        Self { done: 0, total }
    }

    /// Completion fraction clamped to [0, 1], `None` if total is unknown
    pub fn fraction(&self) -> Option<f64> {
        if self.total == 0 {
            return None;
        }
        Some((self.done as f64 / self.total as f64).clamp(0.0, 1.0))
    }
}

/// Byte-counting decorator
///
/// Wraps either a `Stream` of byte chunks (the HTTP body) or a blocking
/// `Read`. The total is non-zero by construction: a source that cannot
/// report its size cannot be wrapped.
pub struct ProgressReader<R, F> {
    inner: R,
    state: ProgressState,
    on_progress: F,
}

impl<R, F> ProgressReader<R, F>
where
    F: FnMut(f64),
{
    pub fn new(inner: R, total: NonZeroU64, on_progress: F) -> Self {
        Self {
            inner,
            state: ProgressState::new(total.get()),
            on_progress,
        }
    }

    /// Bytes seen so far
    pub fn bytes_read(&self) -> u64 {
        self.state.done
    }

    fn record(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        self.state.done += n as u64;
        if let Some(fraction) = self.state.fraction() {
            (self.on_progress)(fraction);
        }
    }
}

impl<S, B, E, F> Stream for ProgressReader<S, F>
where
    S: Stream<Item = std::result::Result<B, E>> + Unpin,
    B: AsRef<[u8]>,
    F: FnMut(f64) + Unpin,
{
    type Item = std::result::Result<B, E>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let item = ready!(Pin::new(&mut this.inner).poll_next(cx));
        if let Some(Ok(chunk)) = &item {
            let n = chunk.as_ref().len();
            this.record(n);
        }
        Poll::Ready(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<R, F> Read for ProgressReader<R, F>
where
    R: Read,
    F: FnMut(f64),
{
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.record(n);
        Ok(n)
    }
}

/// Last reported progress fraction
///
/// One writer (the pipeline worker), one reader (the surface). Stored as the
/// bit pattern of an `f64`.
#[derive(Debug, Default)]
pub struct ProgressCell {
    bits: AtomicU64,
}

impl ProgressCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, fraction: f64) {
        self.bits
            .store(fraction.clamp(0.0, 1.0).to_bits(), Ordering::Release);
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn reset(&self) {
        self.store(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::{stream, StreamExt};
    use std::io::Cursor;

    fn total(n: u64) -> NonZeroU64 {
        NonZeroU64::new(n).unwrap()
    }

    #[test]
    fn test_progress_state_fraction() {
        let mut state = ProgressState::new(1_000_000);
        state.done = 250_000;
        assert_eq!(state.fraction(), Some(0.25));

        state.done = 2_000_000;
        assert_eq!(state.fraction(), Some(1.0));

        assert_eq!(ProgressState::new(0).fraction(), None);
    }

    #[tokio::test]
    async fn test_stream_reader_ends_at_one() {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(vec![0u8; 3]),
            Ok(Vec::new()),
            Ok(vec![0u8; 5]),
            Ok(vec![0u8; 2]),
        ];
        let mut seen = Vec::new();
        let mut reader = ProgressReader::new(stream::iter(chunks), total(10), |f| seen.push(f));

        while let Some(chunk) = reader.next().await {
            chunk.unwrap();
        }
        assert_eq!(reader.bytes_read(), 10);
        drop(reader);

        // Empty chunk produces no callback
        assert_eq!(seen, vec![0.3, 0.8, 1.0]);
    }

    #[tokio::test]
    async fn test_stream_reader_passes_errors_through() {
        let chunks: Vec<std::result::Result<Vec<u8>, &'static str>> =
            vec![Ok(vec![1, 2]), Err("connection reset"), Ok(vec![3])];
        let mut calls = 0;
        let mut reader = ProgressReader::new(stream::iter(chunks), total(4), |_| calls += 1);

        assert!(reader.next().await.unwrap().is_ok());
        assert_eq!(reader.next().await.unwrap().unwrap_err(), "connection reset");
        assert!(reader.next().await.unwrap().is_ok());
        assert!(reader.next().await.is_none());
        drop(reader);
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_blocking_reader_monotonic_and_clamped() {
        let data = vec![7u8; 4096];
        let mut seen = Vec::new();
        {
            let mut reader =
                ProgressReader::new(Cursor::new(data), total(1000), |f| seen.push(f));
            let mut buf = [0u8; 300];
            while reader.read(&mut buf).unwrap() > 0 {}
        }

        assert!(!seen.is_empty());
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert!(seen.iter().all(|f| (0.0..=1.0).contains(f)));
        assert_eq!(*seen.last().unwrap(), 1.0);
    }

    #[test]
    fn test_blocking_reader_exact_total() {
        for chunk in [1usize, 7, 64, 1000] {
            let mut last = 0.0;
            {
                let mut reader =
                    ProgressReader::new(Cursor::new(vec![0u8; 1000]), total(1000), |f| last = f);
                let mut sink = Vec::new();
                let mut buf = vec![0u8; chunk];
                loop {
                    let n = reader.read(&mut buf).unwrap();
                    if n == 0 {
                        break;
                    }
                    sink.extend_from_slice(&buf[..n]);
                }
                assert_eq!(sink.len(), 1000);
            }
            assert_eq!(last, 1.0);
        }
    }

    #[test]
    fn test_progress_cell() {
        let cell = ProgressCell::new();
        assert_eq!(cell.load(), 0.0);
        cell.store(0.42);
        assert_eq!(cell.load(), 0.42);
        cell.store(3.0);
        assert_eq!(cell.load(), 1.0);
        cell.reset();
        assert_eq!(cell.load(), 0.0);
    }
}
