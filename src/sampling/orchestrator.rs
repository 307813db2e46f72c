//! # Sampler
//!
//! Runs `sample_count` independent collect → canonicalize → persist tasks on a
//! pool of `workers` permits and gathers their outcomes over a channel.
//!
//! Every task sends exactly one `SampleOutcome`. The sampler stops listening
//! once all outcomes are in or the global wait timeout passes; tasks still
//! running at that point are abandoned, not cancelled, and anything they
//! persist later is picked up by the next comparison.

use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, mpsc};
use tokio::time::{Instant, timeout_at};
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::infrastructure::config::SamplingConfig;
use crate::infrastructure::sample_store::{FileSampleStore, StoreError};

use super::canonical::{Fingerprint, canonicalize};
use super::collector::SampleCollector;
use super::observer::SamplingEvent;
use super::SampleError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerSettings {
    pub sample_count: usize,
    pub workers: usize,
    pub wait_timeout: Duration,
}

impl SamplerSettings {
    pub fn from_config(config: &SamplingConfig) -> Self {
        Self {
            sample_count: config.sample_count,
            workers: config.threads,
            wait_timeout: config.wait_timeout(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PersistedSample {
    pub sample_id: String,
    pub fingerprint: Fingerprint,
    pub path: PathBuf,
    pub pages: usize,
    pub items: usize,
}

#[derive(Debug)]
pub struct SampleOutcome {
    pub sample_id: String,
    pub result: Result<PersistedSample, SampleError>,
}

#[derive(Debug, Default)]
pub struct SamplingSummary {
    pub persisted: Vec<PersistedSample>,
    pub failed: Vec<(String, SampleError)>,
    /// Tasks with no outcome when the wait timeout expired
    pub abandoned: usize,
}

impl SamplingSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty() && self.abandoned == 0
    }

    /// Distinct fingerprints among this run's persisted samples
    pub fn distinct_fingerprints(&self) -> usize {
        let mut fingerprints: Vec<&Fingerprint> =
            self.persisted.iter().map(|p| &p.fingerprint).collect();
        fingerprints.sort();
        fingerprints.dedup();
        fingerprints.len()
    }
}

pub struct Sampler {
    collector: Arc<SampleCollector>,
    store: Arc<FileSampleStore>,
    settings: SamplerSettings,
}

impl Sampler {
    pub const fn new(
        collector: Arc<SampleCollector>,
        store: Arc<FileSampleStore>,
        settings: SamplerSettings,
    ) -> Self {
        Self {
            collector,
            store,
            settings,
        }
    }

    /// Fails only if the target directory cannot be created; per-sample
    /// failures are reported in the summary.
    pub async fn run(&self) -> Result<SamplingSummary, StoreError> {
        self.store.ensure_dir().await?;

        let total = self.settings.sample_count;
        let semaphore = Arc::new(Semaphore::new(self.settings.workers.max(1)));
        let (outcome_tx, mut outcome_rx) = mpsc::channel::<SampleOutcome>(total.max(1));

        info!(
            "🚀 Starting {} samples on {} workers into {}",
            total,
            self.settings.workers,
            self.store.dir().display()
        );

        for _ in 0..total {
            let sample_id = new_sample_id();
            let collector = Arc::clone(&self.collector);
            let store = Arc::clone(&self.store);
            let semaphore_clone = Arc::clone(&semaphore);
            let outcome_tx_clone = outcome_tx.clone();
            let span = info_span!("sample", id = %sample_id);

            tokio::spawn(
                async move {
                    let result = match semaphore_clone.acquire().await {
                        Ok(_permit) => {
                            debug!("🔓 Acquired worker permit");
                            AssertUnwindSafe(run_sample(&collector, &store, &sample_id))
                                .catch_unwind()
                                .await
                                .unwrap_or_else(|panic| {
                                    Err(SampleError::Panicked(panic_message(&*panic)))
                                })
                        }
                        Err(_) => Err(SampleError::PoolClosed),
                    };

                    match &result {
                        Ok(persisted) => collector.observer().notify(&SamplingEvent::SamplePersisted {
                            sample_id: sample_id.clone(),
                            fingerprint: persisted.fingerprint.to_string(),
                            path: persisted.path.clone(),
                        }),
                        Err(e) => collector.observer().notify(&SamplingEvent::SampleFailed {
                            sample_id: sample_id.clone(),
                            error: e.to_string(),
                        }),
                    }

                    let _ = outcome_tx_clone
                        .send(SampleOutcome { sample_id, result })
                        .await;
                }
                .instrument(span),
            );
        }
        drop(outcome_tx);

        let deadline = Instant::now() + self.settings.wait_timeout;
        let mut summary = SamplingSummary::default();
        let mut received = 0;
        while received < total {
            match timeout_at(deadline, outcome_rx.recv()).await {
                Ok(Some(outcome)) => {
                    received += 1;
                    match outcome.result {
                        Ok(persisted) => summary.persisted.push(persisted),
                        Err(e) => summary.failed.push((outcome.sample_id, e)),
                    }
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "⏰ Wait timeout of {:?} elapsed with {} samples outstanding",
                        self.settings.wait_timeout,
                        total - received
                    );
                    break;
                }
            }
        }
        summary.abandoned = total - received;

        info!(
            "🏁 Sampling finished: {} persisted, {} failed, {} abandoned",
            summary.persisted.len(),
            summary.failed.len(),
            summary.abandoned
        );
        Ok(summary)
    }
}

async fn run_sample(
    collector: &SampleCollector,
    store: &FileSampleStore,
    sample_id: &str,
) -> Result<PersistedSample, SampleError> {
    let sample = collector.collect(sample_id).await?;
    let canonical = canonicalize(&sample)?;
    let path = store.persist(&canonical).await?;
    Ok(PersistedSample {
        sample_id: sample_id.to_owned(),
        fingerprint: canonical.fingerprint().clone(),
        path,
        pages: sample.pages().len(),
        items: sample.item_count(),
    })
}

/// Short random id used to tag a sample's events and log lines
pub fn new_sample_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}
