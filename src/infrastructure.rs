//! Infrastructure layer: configuration, logging, the HTTP listing client and
//! the file-backed sample store.

pub mod config;
pub mod listing_client;
pub mod logging;
pub mod sample_store;

pub use config::{ApiConfig, ConfigError, LoggingConfig, SamplerConfig, SamplingConfig};
pub use listing_client::ListingClient;
pub use logging::init_logging;
pub use sample_store::{
    CorruptArtifact, FileSampleStore, LoadedSamples, SampleRow, StoreError, StoredSample,
};
