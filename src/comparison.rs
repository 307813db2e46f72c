//! # Comparison Module
//!
//! Turns persisted samples into a consistency report.
//! - `engine`: grouping by fingerprint, presence matrix, duplicates
//! - `report`: text tables for the console

pub mod engine;
pub mod report;

pub use engine::{ComparisonReport, DuplicateItem, GroupSummary, PresenceRow, find_duplicates};
pub use report::{render, render_json};
