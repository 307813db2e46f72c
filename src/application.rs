//! Application use cases
//!
//! Wires configuration, the listing client, the collector and the store into
//! the two workflows the binary exposes: taking samples and comparing them.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::comparison::ComparisonReport;
use crate::infrastructure::config::SamplerConfig;
use crate::infrastructure::listing_client::ListingClient;
use crate::infrastructure::sample_store::FileSampleStore;
use crate::sampling::{
    PageSource, SampleCollector, Sampler, SamplerSettings, SamplingObserver, SamplingSummary,
};

pub struct SamplingUseCases {
    config: SamplerConfig,
    observer: Arc<dyn SamplingObserver>,
}

impl SamplingUseCases {
    pub fn new(config: SamplerConfig, observer: Arc<dyn SamplingObserver>) -> Self {
        Self { config, observer }
    }

    pub fn store(&self) -> FileSampleStore {
        FileSampleStore::new(&self.config.sampling.target_dir)
    }

    /// Sampler over any page source, configured from the sampler configuration
    pub fn sampler(&self, source: Arc<dyn PageSource>) -> Sampler {
        let collector = SampleCollector::new(
            source,
            self.config.listing_query(),
            self.config.retry.clone(),
            Arc::clone(&self.observer),
        );
        Sampler::new(
            Arc::new(collector),
            Arc::new(self.store()),
            SamplerSettings::from_config(&self.config.sampling),
        )
    }

    /// Takes the configured number of samples from the HTTP endpoint
    pub async fn run_sampling(&self) -> Result<SamplingSummary> {
        let client = ListingClient::from_config(&self.config.api)
            .context("Failed to create listing client")?;
        info!(
            "📡 Sampling {}{} from {} to {}",
            self.config.api.url,
            self.config.api.resource_path,
            self.config.sampling.start_date,
            self.config.sampling.end_date
        );
        let summary = self
            .sampler(Arc::new(client))
            .run()
            .await
            .context("Failed to prepare sample directory")?;
        Ok(summary)
    }

    pub async fn compare(&self) -> Result<ComparisonReport> {
        compare_directory(&self.config.sampling.target_dir).await
    }
}

/// Loads every artifact in `dir` and builds the report
pub async fn compare_directory(dir: &Path) -> Result<ComparisonReport> {
    let loaded = FileSampleStore::new(dir)
        .load_all()
        .await
        .with_context(|| format!("Failed to read samples from {}", dir.display()))?;
    Ok(ComparisonReport::from_loaded(loaded))
}
