//! Text rendering of a `ComparisonReport`.
//!
//! Four sections separated by blank lines: identical-sample counts, item
//! counts, the presence matrix and the per-group duplicate tables. Rejected
//! artifacts are listed at the end when there are any.

use std::fmt::{self, Write};

use super::engine::ComparisonReport;

/// Characters of a fingerprint shown as a presence matrix column header
pub const SHORT_FINGERPRINT_LEN: usize = 5;

pub const PRESENT_MARK: &str = "✓";
pub const MISSING_MARK: &str = "missing";

impl fmt::Display for ComparisonReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_frequencies(self, f)?;
        writeln!(f)?;
        write_item_counts(self, f)?;
        writeln!(f)?;
        write_presence(self, f)?;
        writeln!(f)?;
        write_duplicates(self, f)?;
        write_corrupt(self, f)
    }
}

pub fn render(report: &ComparisonReport) -> String {
    report.to_string()
}

/// Machine-readable form of the same report
pub fn render_json(report: &ComparisonReport) -> serde_json::Result<String> {
    serde_json::to_string_pretty(report)
}

fn write_frequencies(report: &ComparisonReport, f: &mut impl Write) -> fmt::Result {
    writeln!(f, "Results by same response")?;
    writeln!(f, "| {:>64} | Number of identical Samples |", "Checksum")?;
    for group in report.groups() {
        writeln!(f, "| {:>64} | {:>27} |", group.fingerprint, group.sample_count)?;
    }
    Ok(())
}

fn write_item_counts(report: &ComparisonReport, f: &mut impl Write) -> fmt::Result {
    writeln!(f, "Total WorkItems in Sample File")?;
    writeln!(f, "| {:>64} | Number of WorkItems |", "Checksum")?;
    for group in report.groups() {
        writeln!(f, "| {:>64} | {:>19} |", group.fingerprint, group.item_count)?;
    }
    Ok(())
}

fn write_presence(report: &ComparisonReport, f: &mut impl Write) -> fmt::Result {
    writeln!(f, "WorkItems presence in samples")?;
    write!(f, "| Work Item Id |")?;
    for group in report.groups() {
        write!(f, " {}... |", group.fingerprint.short(SHORT_FINGERPRINT_LEN))?;
    }
    writeln!(f)?;

    for row in report.presence() {
        write!(f, "| {:>12} |", row.item_id)?;
        for present in &row.present {
            let mark = if *present { PRESENT_MARK } else { MISSING_MARK };
            write!(f, " {mark:>8} |")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn write_duplicates(report: &ComparisonReport, f: &mut impl Write) -> fmt::Result {
    writeln!(f, "Responses containing duplicate WorkItems")?;
    for (index, group) in report.groups().iter().enumerate() {
        writeln!(f, "Files with checksum {}", group.fingerprint)?;
        let duplicates = report.duplicates(index);
        if duplicates.is_empty() {
            writeln!(f, "No duplicates present")?;
        } else {
            writeln!(
                f,
                "| {:>15} | Times present in Sample | Received in requests |",
                "WorkItem Id"
            )?;
            for duplicate in duplicates {
                let pages = duplicate
                    .page_indices
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                writeln!(
                    f,
                    "| {:>15} | {:>23} | {:>20} |",
                    duplicate.item_id,
                    duplicate.times_present(),
                    pages
                )?;
            }
        }
        writeln!(f)?;
    }
    Ok(())
}

fn write_corrupt(report: &ComparisonReport, f: &mut impl Write) -> fmt::Result {
    if report.corrupt().is_empty() {
        return Ok(());
    }
    writeln!(f, "Corrupted artifacts: {}", report.corrupt().len())?;
    for artifact in report.corrupt() {
        writeln!(f, "  {}: {}", artifact.path.display(), artifact.reason)?;
    }
    Ok(())
}
