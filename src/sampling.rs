//! # Sampling Module
//!
//! Assembles complete samples of the listing collection and persists them.
//! - `PageSource`: one page fetch at one cursor position
//! - `collector`: walks the cursor to exhaustion for one sample
//! - `canonical`: deterministic row form and fingerprint of a sample
//! - `orchestrator`: runs many collectors on a bounded worker pool

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::{PageRequest, WorkItem};
use crate::infrastructure::sample_store::StoreError;

pub mod canonical;
pub mod collector;
pub mod observer;
pub mod orchestrator;
pub mod retry;

pub use canonical::{CanonicalError, CanonicalSample, Fingerprint};
pub use collector::SampleCollector;
pub use observer::{ChannelObserver, SamplingEvent, SamplingObserver, TracingObserver};
pub use orchestrator::{PersistedSample, SampleOutcome, Sampler, SamplerSettings, SamplingSummary};
pub use retry::{RetryPolicies, RetryPolicy};

/// Page fetch failure
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// No usable response: connect/timeout failure or an undecodable body
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP error {status}: {body}")]
    ServerError { status: u16, body: String },
}

impl FetchError {
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::ServerError { .. } => FailureKind::ServerError,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Transport,
    ServerError,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::ServerError => f.write_str("server_error"),
        }
    }
}

/// Why a sampling task produced no artifact
#[derive(Error, Debug)]
pub enum SampleError {
    #[error("Page at offset {offset} failed {attempts} times: {last_error}")]
    PageFailed {
        offset: usize,
        attempts: u32,
        last_error: FetchError,
    },

    #[error("Canonicalization failed: {0}")]
    Canonical(#[from] CanonicalError),

    #[error("Persisting sample failed: {0}")]
    Store(#[from] StoreError),

    #[error("Sampling task panicked: {0}")]
    Panicked(String),

    #[error("Worker pool closed before the task could start")]
    PoolClosed,
}

/// Source of listing pages.
///
/// A successful fetch is authoritative for its offset; retrying is the
/// caller's business.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<Vec<WorkItem>, FetchError>;
}
