//! Pagination Sampler - repeated full-collection sampling of a paginated
//! listing API, with fingerprint based comparison of the samples.
//!
//! A run takes N independent samples, each walking the skip/top cursor to the
//! end of the collection, and stores every sample as a fingerprinted artifact.
//! The comparison groups artifacts by fingerprint and reports which items
//! appear, disappear or repeat between otherwise identical requests.

// Module declarations
pub mod application;
pub mod comparison;
pub mod domain;
pub mod infrastructure;
pub mod sampling;

pub use application::{SamplingUseCases, compare_directory};
pub use comparison::ComparisonReport;
pub use infrastructure::config::SamplerConfig;
pub use sampling::{Sampler, SamplingSummary};
