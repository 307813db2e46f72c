//! File-backed sample store.
//!
//! Each sample is one write-once artifact `<fingerprint>-<suffix>-results.csv`
//! holding the canonical rows, header included, each terminated by `\n`. The
//! suffix is a fresh UUID. Contents are written to a hidden `.partial` staging
//! file opened with create-new semantics and renamed into place once complete,
//! so concurrent writers never overwrite each other even for equal fingerprints
//! and an abandoned write leaves no artifact that a later comparison would load.
//!
//! Loading never fails on a single bad artifact: unreadable, unparseable or
//! tampered files are reported as `CorruptArtifact`s next to the good samples.

use serde::Serialize;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sampling::canonical::{CanonicalSample, DELIMITER, Fingerprint};

pub const ARTIFACT_SUFFIX: &str = "-results.csv";
pub const STAGING_SUFFIX: &str = ".partial";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Corrupt artifact {}: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
}

impl StoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One parsed data row of a persisted sample
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleRow {
    pub page_index: usize,
    pub request_params: String,
    pub item_id: String,
    pub created: String,
    pub updated: String,
    pub date: String,
    pub duration_minutes: i64,
}

impl SampleRow {
    pub fn parse(line: &str) -> Result<Self, String> {
        let fields: Vec<&str> = line.split(DELIMITER).collect();
        if fields.len() < 7 {
            return Err(format!("expected 7 fields, found {}", fields.len()));
        }
        let page_index = fields[0]
            .parse()
            .map_err(|e| format!("invalid page index '{}': {e}", fields[0]))?;
        let duration_minutes = fields[6]
            .strip_suffix('m')
            .and_then(|minutes| minutes.parse().ok())
            .ok_or_else(|| format!("invalid duration '{}'", fields[6]))?;
        Ok(Self {
            page_index,
            request_params: fields[1].to_owned(),
            item_id: fields[2].to_owned(),
            created: fields[3].to_owned(),
            updated: fields[4].to_owned(),
            date: fields[5].to_owned(),
            duration_minutes,
        })
    }
}

/// A persisted sample read back from disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredSample {
    pub fingerprint: Fingerprint,
    pub path: PathBuf,
    pub rows: Vec<SampleRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CorruptArtifact {
    pub path: PathBuf,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedSamples {
    pub samples: Vec<StoredSample>,
    pub corrupt: Vec<CorruptArtifact>,
}

#[derive(Debug, Clone)]
pub struct FileSampleStore {
    dir: PathBuf,
}

impl FileSampleStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))
    }

    /// Writes the artifact under a staging name and renames it into place,
    /// so an interrupted write never leaves a partial `-results.csv` behind.
    pub async fn persist(&self, sample: &CanonicalSample) -> Result<PathBuf, StoreError> {
        let contents = sample.artifact_contents();
        loop {
            let name = artifact_name(sample.fingerprint());
            let path = self.dir.join(&name);
            let staging = self.dir.join(staging_name(&name));
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&staging)
                .await
            {
                Ok(file) => file,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!("Artifact name clash on {}, drawing a new suffix", staging.display());
                    continue;
                }
                Err(e) => return Err(StoreError::io(&staging, e)),
            };
            let written = async {
                file.write_all(contents.as_bytes()).await?;
                file.flush().await?;
                file.sync_all().await
            }
            .await;
            drop(file);
            if let Err(e) = written {
                discard_staging(&staging).await;
                return Err(StoreError::io(&staging, e));
            }

            match fs::try_exists(&path).await {
                Ok(false) => {}
                Ok(true) => {
                    warn!("Artifact name clash on {}, drawing a new suffix", path.display());
                    discard_staging(&staging).await;
                    continue;
                }
                Err(e) => {
                    discard_staging(&staging).await;
                    return Err(StoreError::io(&path, e));
                }
            }
            if let Err(e) = fs::rename(&staging, &path).await {
                discard_staging(&staging).await;
                return Err(StoreError::io(&path, e));
            }
            debug!("Wrote {} rows to {}", sample.rows().len(), path.display());
            return Ok(path);
        }
    }

    /// Reads and verifies a single artifact
    pub async fn load(path: &Path) -> Result<StoredSample, StoreError> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::io(path, e))?;
        parse_artifact(path, &contents).map_err(|reason| StoreError::Corrupt {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Reads every artifact in the directory, sorted by file name
    pub async fn load_all(&self) -> Result<LoadedSamples, StoreError> {
        let mut entries = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;
        let mut paths = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let path = entry.path();
            let is_artifact = path
                .file_name()
                .and_then(OsStr::to_str)
                .is_some_and(|name| name.ends_with(ARTIFACT_SUFFIX));
            if is_artifact {
                paths.push(path);
            }
        }
        paths.sort();

        let mut loaded = LoadedSamples::default();
        for path in paths {
            match Self::load(&path).await {
                Ok(sample) => loaded.samples.push(sample),
                Err(e) => {
                    warn!("Skipping corrupt artifact {}: {}", path.display(), e);
                    let reason = match e {
                        StoreError::Corrupt { reason, .. } => reason,
                        StoreError::Io { source, .. } => format!("unreadable: {source}"),
                    };
                    loaded.corrupt.push(CorruptArtifact { path, reason });
                }
            }
        }
        info!(
            "Loaded {} samples ({} corrupt) from {}",
            loaded.samples.len(),
            loaded.corrupt.len(),
            self.dir.display()
        );
        Ok(loaded)
    }
}

pub fn artifact_name(fingerprint: &Fingerprint) -> String {
    format!("{fingerprint}-{}{ARTIFACT_SUFFIX}", Uuid::new_v4().simple())
}

/// Hidden in-progress name of an artifact; never matches `ARTIFACT_SUFFIX`
pub fn staging_name(artifact_name: &str) -> String {
    format!(".{artifact_name}{STAGING_SUFFIX}")
}

async fn discard_staging(staging: &Path) {
    if let Err(e) = fs::remove_file(staging).await {
        warn!("Failed to remove staging file {}: {}", staging.display(), e);
    }
}

/// Everything before the first `-` of an artifact file name
pub fn fingerprint_prefix(file_name: &str) -> &str {
    file_name
        .split_once('-')
        .map_or(file_name, |(prefix, _)| prefix)
}

/// Rebuilds a stored sample from artifact contents, verifying the fingerprint
pub fn parse_artifact(path: &Path, contents: &str) -> Result<StoredSample, String> {
    let file_name = path
        .file_name()
        .and_then(OsStr::to_str)
        .ok_or("file name is not valid UTF-8")?;
    let fingerprint = Fingerprint::parse(fingerprint_prefix(file_name))
        .ok_or("file name does not start with a fingerprint")?;

    let body = contents
        .strip_suffix('\n')
        .ok_or("missing final newline")?;
    let actual = Fingerprint::of(body);
    if actual != fingerprint {
        return Err(format!("contents hash to {actual}"));
    }

    let rows = body
        .split('\n')
        .enumerate()
        .skip(1)
        .map(|(line_no, line)| {
            SampleRow::parse(line).map_err(|e| format!("line {}: {e}", line_no + 1))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(StoredSample {
        fingerprint,
        path: path.to_path_buf(),
        rows,
    })
}
