//! Sampling events and the observers that receive them.
//!
//! Sampling tasks never log free text about their progress directly; they emit
//! `SamplingEvent`s tagged with the sample id to an observer handed in by the
//! caller.

use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use super::FailureKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SamplingEvent {
    SampleStarted {
        sample_id: String,
    },
    PageFetched {
        sample_id: String,
        page_index: usize,
        offset: usize,
        items: usize,
    },
    PageFailed {
        sample_id: String,
        /// Set when the failure was recorded as an empty page
        page_index: Option<usize>,
        offset: usize,
        kind: FailureKind,
        attempt: u32,
        error: String,
        /// `None` once the retry budget is spent
        retry_in_ms: Option<u64>,
    },
    SampleCompleted {
        sample_id: String,
        pages: usize,
        items: usize,
    },
    SamplePersisted {
        sample_id: String,
        fingerprint: String,
        path: PathBuf,
    },
    SampleFailed {
        sample_id: String,
        error: String,
    },
}

impl SamplingEvent {
    pub fn sample_id(&self) -> &str {
        match self {
            Self::SampleStarted { sample_id }
            | Self::PageFetched { sample_id, .. }
            | Self::PageFailed { sample_id, .. }
            | Self::SampleCompleted { sample_id, .. }
            | Self::SamplePersisted { sample_id, .. }
            | Self::SampleFailed { sample_id, .. } => sample_id,
        }
    }
}

pub trait SamplingObserver: Send + Sync {
    fn notify(&self, event: &SamplingEvent);
}

/// Emits every event as a structured `tracing` record
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl SamplingObserver for TracingObserver {
    fn notify(&self, event: &SamplingEvent) {
        match event {
            SamplingEvent::SampleStarted { sample_id } => {
                info!(sample_id = %sample_id, "🚀 Sample started");
            }
            SamplingEvent::PageFetched {
                sample_id,
                page_index,
                offset,
                items,
            } => {
                info!(sample_id = %sample_id, page_index, offset, items, "📄 Page fetched");
            }
            SamplingEvent::PageFailed {
                sample_id,
                page_index,
                offset,
                kind,
                attempt,
                error,
                retry_in_ms,
            } => match retry_in_ms {
                Some(delay) => warn!(
                    sample_id = %sample_id,
                    page_index = ?page_index,
                    offset,
                    kind = %kind,
                    attempt,
                    retry_in_ms = delay,
                    "⚠️ Page fetch failed, retrying same offset: {}",
                    error
                ),
                None => error!(
                    sample_id = %sample_id,
                    offset,
                    kind = %kind,
                    attempt,
                    "❌ Page fetch failed, retry budget exhausted: {}",
                    error
                ),
            },
            SamplingEvent::SampleCompleted {
                sample_id,
                pages,
                items,
            } => {
                info!(sample_id = %sample_id, pages, items, "✅ Sample completed");
            }
            SamplingEvent::SamplePersisted {
                sample_id,
                fingerprint,
                path,
            } => {
                info!(sample_id = %sample_id, fingerprint = %fingerprint, path = %path.display(), "💾 Sample written");
            }
            SamplingEvent::SampleFailed { sample_id, error } => {
                error!(sample_id = %sample_id, "❌ Sample failed: {}", error);
            }
        }
    }
}

/// Forwards events to an unbounded channel; a closed receiver is ignored
#[derive(Debug, Clone)]
pub struct ChannelObserver {
    tx: mpsc::UnboundedSender<SamplingEvent>,
}

impl ChannelObserver {
    pub const fn new(tx: mpsc::UnboundedSender<SamplingEvent>) -> Self {
        Self { tx }
    }

    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SamplingEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(tx), rx)
    }
}

impl SamplingObserver for ChannelObserver {
    fn notify(&self, event: &SamplingEvent) {
        let _ = self.tx.send(event.clone());
    }
}
