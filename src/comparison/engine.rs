//! Groups persisted samples by fingerprint and derives the cross-sample
//! statistics. Pure: works on already loaded samples, never touches the
//! network or the filesystem.

use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::PathBuf;

use crate::infrastructure::sample_store::{CorruptArtifact, LoadedSamples, SampleRow, StoredSample};
use crate::sampling::canonical::Fingerprint;

/// One fingerprint group
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupSummary {
    pub fingerprint: Fingerprint,
    /// Number of artifacts sharing the fingerprint
    pub sample_count: usize,
    /// Row count of the representative sample
    pub item_count: usize,
    pub artifacts: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateItem {
    pub item_id: String,
    /// Every page index the item was received on, ascending, one per row
    pub page_indices: Vec<usize>,
}

impl DuplicateItem {
    pub fn times_present(&self) -> usize {
        self.page_indices.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PresenceRow {
    pub item_id: String,
    /// One flag per group, in group order
    pub present: Vec<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComparisonReport {
    groups: Vec<GroupSummary>,
    presence: Vec<PresenceRow>,
    duplicates: Vec<Vec<DuplicateItem>>,
    corrupt: Vec<CorruptArtifact>,
}

impl ComparisonReport {
    pub fn build(samples: &[StoredSample]) -> Self {
        Self::build_with_corrupt(samples, Vec::new())
    }

    pub fn from_loaded(loaded: LoadedSamples) -> Self {
        Self::build_with_corrupt(&loaded.samples, loaded.corrupt)
    }

    fn build_with_corrupt(samples: &[StoredSample], corrupt: Vec<CorruptArtifact>) -> Self {
        // First loaded sample of each fingerprint represents the group
        let mut by_fingerprint: BTreeMap<&Fingerprint, (Vec<PathBuf>, &[SampleRow])> = BTreeMap::new();
        for sample in samples {
            by_fingerprint
                .entry(&sample.fingerprint)
                .or_insert_with(|| (Vec::new(), sample.rows.as_slice()))
                .0
                .push(sample.path.clone());
        }

        let mut ordered: Vec<(&Fingerprint, Vec<PathBuf>, &[SampleRow])> = by_fingerprint
            .into_iter()
            .map(|(fingerprint, (artifacts, rows))| (fingerprint, artifacts, rows))
            .collect();
        // Stable sort keeps fingerprint order among equal sizes
        ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let universe: BTreeSet<&str> = ordered
            .iter()
            .flat_map(|(_, _, rows)| rows.iter().map(|row| row.item_id.as_str()))
            .collect();

        let members: Vec<BTreeSet<&str>> = ordered
            .iter()
            .map(|(_, _, rows)| rows.iter().map(|row| row.item_id.as_str()).collect())
            .collect();

        let presence = universe
            .into_iter()
            .map(|item_id| PresenceRow {
                item_id: item_id.to_owned(),
                present: members.iter().map(|ids| ids.contains(item_id)).collect(),
            })
            .collect();

        let duplicates = ordered.iter().map(|(_, _, rows)| find_duplicates(rows)).collect();

        let groups = ordered
            .into_iter()
            .map(|(fingerprint, artifacts, rows)| GroupSummary {
                fingerprint: fingerprint.clone(),
                sample_count: artifacts.len(),
                item_count: rows.len(),
                artifacts,
            })
            .collect();

        Self {
            groups,
            presence,
            duplicates,
            corrupt,
        }
    }

    /// Groups by descending size, ties by ascending fingerprint
    pub fn groups(&self) -> &[GroupSummary] {
        &self.groups
    }

    /// Rows ordered by item id, flags ordered as `groups()`
    pub fn presence(&self) -> &[PresenceRow] {
        &self.presence
    }

    pub fn is_present(&self, item_id: &str, group: usize) -> bool {
        self.presence
            .binary_search_by(|row| row.item_id.as_str().cmp(item_id))
            .ok()
            .and_then(|index| self.presence[index].present.get(group).copied())
            .unwrap_or(false)
    }

    /// Duplicates of the group at the same position in `groups()`
    pub fn duplicates(&self, group: usize) -> &[DuplicateItem] {
        self.duplicates
            .get(group)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn item_ids(&self) -> impl Iterator<Item = &str> {
        self.presence.iter().map(|row| row.item_id.as_str())
    }

    pub fn corrupt(&self) -> &[CorruptArtifact] {
        &self.corrupt
    }

    pub fn sample_count(&self) -> usize {
        self.groups.iter().map(|g| g.sample_count).sum()
    }

    /// True when every loaded sample has the same fingerprint
    pub fn is_consistent(&self) -> bool {
        self.groups.len() <= 1
    }
}

/// Item ids with more than one row, in order of first appearance
pub fn find_duplicates(rows: &[SampleRow]) -> Vec<DuplicateItem> {
    let mut order: Vec<&str> = Vec::new();
    let mut pages: HashMap<&str, Vec<usize>> = HashMap::new();
    for row in rows {
        pages
            .entry(row.item_id.as_str())
            .or_insert_with(|| {
                order.push(row.item_id.as_str());
                Vec::new()
            })
            .push(row.page_index);
    }

    order
        .into_iter()
        .filter_map(|item_id| {
            let mut page_indices = pages.remove(item_id)?;
            if page_indices.len() < 2 {
                return None;
            }
            page_indices.sort_unstable();
            Some(DuplicateItem {
                item_id: item_id.to_owned(),
                page_indices,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(page_index: usize, item_id: &str) -> SampleRow {
        SampleRow {
            page_index,
            request_params: format!("/workItems?$skip={page_index}"),
            item_id: item_id.to_owned(),
            created: "2021-01-01T00:00:00.000Z".into(),
            updated: String::new(),
            date: "2021-01-01".into(),
            duration_minutes: 1,
        }
    }

    fn stored(tag: &str, name: &str, rows: Vec<SampleRow>) -> StoredSample {
        StoredSample {
            fingerprint: Fingerprint::of(tag),
            path: PathBuf::from(name),
            rows,
        }
    }

    #[test]
    fn identical_samples_form_one_group() {
        let rows = vec![row(0, "1"), row(0, "2")];
        let samples: Vec<StoredSample> = (0..3)
            .map(|n| stored("same", &format!("a{n}"), rows.clone()))
            .collect();
        let report = ComparisonReport::build(&samples);

        assert_eq!(report.groups().len(), 1);
        assert_eq!(report.groups()[0].sample_count, 3);
        assert_eq!(report.groups()[0].item_count, 2);
        assert!(report.is_present("1", 0) && report.is_present("2", 0));
        assert!(report.duplicates(0).is_empty());
        assert!(report.is_consistent());
    }

    #[test]
    fn duplicate_across_pages_is_reported_for_its_group_only() {
        let samples = vec![
            stored("dup", "a", vec![row(0, "42"), row(0, "7"), row(1, "42")]),
            stored("clean", "b", vec![row(0, "42"), row(0, "7")]),
        ];
        let report = ComparisonReport::build(&samples);
        assert_eq!(report.groups().len(), 2);

        let dup_group = report
            .groups()
            .iter()
            .position(|g| g.fingerprint == Fingerprint::of("dup"))
            .unwrap();
        assert_eq!(
            report.duplicates(dup_group),
            &[DuplicateItem {
                item_id: "42".into(),
                page_indices: vec![0, 1],
            }]
        );
        assert!(report.duplicates(1 - dup_group).is_empty());
    }

    #[test]
    fn groups_sorted_by_size_then_fingerprint() {
        let samples = vec![
            stored("x", "1", vec![row(0, "1")]),
            stored("y", "2", vec![row(0, "2")]),
            stored("y", "3", vec![row(0, "2")]),
            stored("z", "4", vec![row(0, "3")]),
        ];
        let report = ComparisonReport::build(&samples);
        let sizes: Vec<usize> = report.groups().iter().map(|g| g.sample_count).collect();
        assert_eq!(sizes, vec![2, 1, 1]);
        assert_eq!(report.groups()[0].fingerprint, Fingerprint::of("y"));
        assert!(report.groups()[1].fingerprint < report.groups()[2].fingerprint);
        assert_eq!(report.sample_count(), 4);
    }

    #[test]
    fn presence_uses_string_order_and_group_order() {
        let samples = vec![
            stored("a", "1", vec![row(0, "10"), row(0, "9")]),
            stored("b", "2", vec![row(0, "9")]),
            stored("b", "3", vec![row(0, "9")]),
        ];
        let report = ComparisonReport::build(&samples);
        let ids: Vec<&str> = report.item_ids().collect();
        assert_eq!(ids, vec!["10", "9"]);
        assert_eq!(report.presence()[0].present, vec![false, true]);
        assert_eq!(report.presence()[1].present, vec![true, true]);
        assert!(!report.is_present("missing", 0));
        assert!(!report.is_present("9", 5));
    }

    #[test]
    fn duplicates_keep_first_appearance_order() {
        let rows = vec![row(2, "b"), row(0, "a"), row(1, "b"), row(3, "a"), row(3, "c")];
        let duplicates = find_duplicates(&rows);
        let ids: Vec<&str> = duplicates.iter().map(|d| d.item_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(duplicates[0].page_indices, vec![1, 2]);
        assert_eq!(duplicates[1].times_present(), 2);
    }

    #[test]
    fn empty_input_gives_empty_report() {
        let report = ComparisonReport::from_loaded(LoadedSamples::default());
        assert!(report.groups().is_empty());
        assert!(report.presence().is_empty());
        assert!(report.duplicates(0).is_empty());
        assert!(report.is_consistent());
    }
}
