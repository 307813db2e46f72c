//! Canonical row form and content fingerprint of a sample.
//!
//! The canonical text is the header followed by one row per item, pages in
//! fetch order and items in response order, joined by `\n` without a trailing
//! newline. The fingerprint is the SHA-256 of that text, so it changes with
//! membership, ordering, duplication and any reported attribute.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt;
use thiserror::Error;

use crate::domain::{Page, Sample, WorkItem};

pub const DELIMITER: char = ';';

pub const HEADER: &str = "Request ID;Request Params;Work Item ID; Work Item CreateDate;Work Item UpdateDate;Work Item Date;Duration;";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CanonicalError {
    #[error("Work item '{item_id}' on page {page_index} has no valid {field}")]
    MissingField {
        page_index: usize,
        item_id: String,
        field: &'static str,
    },

    #[error("{field} '{value}' on page {page_index} contains a delimiter or line break")]
    ReservedCharacter {
        page_index: usize,
        field: &'static str,
        value: String,
    },
}

/// Lowercase hex SHA-256 digest of a canonical text
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub const HEX_LEN: usize = 64;

    pub fn of(canonical_text: &str) -> Self {
        let digest = Sha256::digest(canonical_text.as_bytes());
        Self(format!("{digest:x}"))
    }

    /// Accepts exactly 64 lowercase hex characters
    pub fn parse(text: &str) -> Option<Self> {
        let valid = text.len() == Self::HEX_LEN
            && text
                .bytes()
                .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        valid.then(|| Self(text.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn short(&self, len: usize) -> &str {
        &self.0[..len.min(self.0.len())]
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical rows (header first) with their fingerprint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalSample {
    rows: Vec<String>,
    fingerprint: Fingerprint,
}

impl CanonicalSample {
    pub fn rows(&self) -> &[String] {
        &self.rows
    }

    pub fn item_rows(&self) -> &[String] {
        &self.rows[1..]
    }

    pub const fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// The hashed form: rows joined by `\n`, no trailing newline
    pub fn text(&self) -> String {
        self.rows.join("\n")
    }

    /// The persisted form: every row newline-terminated
    pub fn artifact_contents(&self) -> String {
        let mut contents = String::with_capacity(self.rows.iter().map(|r| r.len() + 1).sum());
        for row in &self.rows {
            contents.push_str(row);
            contents.push('\n');
        }
        contents
    }
}

pub fn canonicalize(sample: &Sample) -> Result<CanonicalSample, CanonicalError> {
    let mut rows = Vec::with_capacity(sample.item_count() + 1);
    rows.push(HEADER.to_owned());
    for page in sample.pages() {
        check_reserved(page.index, "Request params", page.request.params())?;
        for item in &page.items {
            rows.push(canonical_row(page, item)?);
        }
    }
    let fingerprint = Fingerprint::of(&rows.join("\n"));
    Ok(CanonicalSample { rows, fingerprint })
}

fn canonical_row(page: &Page, item: &WorkItem) -> Result<String, CanonicalError> {
    check_reserved(page.index, "Work item id", &item.id)?;
    let missing = |field| CanonicalError::MissingField {
        page_index: page.index,
        item_id: item.id.clone(),
        field,
    };
    let created = item.created_at().ok_or_else(|| missing("creation timestamp"))?;
    let date = item.date().ok_or_else(|| missing("date"))?;
    let updated = item.updated_at().map(format_timestamp).unwrap_or_default();

    Ok(format!(
        "{index};{params};{id};{created};{updated};{date};{minutes}m;",
        index = page.index,
        params = page.request.params(),
        id = item.id,
        created = format_timestamp(created),
        date = date.format("%Y-%m-%d"),
        minutes = item.duration.minutes,
    ))
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn check_reserved(page_index: usize, field: &'static str, value: &str) -> Result<(), CanonicalError> {
    if value.contains([DELIMITER, '\n', '\r']) {
        return Err(CanonicalError::ReservedCharacter {
            page_index,
            field,
            value: value.to_owned(),
        });
    }
    Ok(())
}
