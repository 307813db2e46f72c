//! Domain module - listing payload and sampling entities
//!
//! Modern Rust module organization (Rust 2018+ style):
//! - Each module is its own file in the domain/ directory
//! - Public exports are defined here for convenience

pub mod sample;
pub mod work_item;

pub use sample::{ListingQuery, Page, PageRequest, Sample};
pub use work_item::{
    CustomField, CustomFieldValue, Issue, ListingUser, Project, WorkItem, WorkItemDuration,
    WorkItemType,
};
