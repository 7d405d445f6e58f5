use crate::files::{SampleFileMap, SampleFiles};
use crate::metrics;
use crate::types::{Platform, SampleQc};
use anyhow::{Context, Result};
use colored::{ColoredString, Colorize};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Style};

pub const QC_COLUMNS: [&str; 9] = [
    "Sample",
    "Reads",
    "QC reads",
    "Host reads",
    "Alignments",
    "Coverage",
    "Mean Depth",
    "Missing",
    "Completeness",
];

/// Colour tier of a QC row, by consensus completeness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletenessTier {
    /// >= 95%
    Pass,
    /// 90% to < 95%
    Warn,
    /// < 90% or unknown
    Fail,
}

impl CompletenessTier {
    pub fn from_completeness(completeness: Option<f64>) -> Self {
        match completeness {
            Some(c) if c >= 95.0 => CompletenessTier::Pass,
            Some(c) if c >= 90.0 => CompletenessTier::Warn,
            _ => CompletenessTier::Fail,
        }
    }

    fn paint(&self, text: &str) -> ColoredString {
        match self {
            CompletenessTier::Pass => text.bright_green(),
            CompletenessTier::Warn => text.bright_yellow(),
            CompletenessTier::Fail => text.bright_red(),
        }
    }
}

/// Extract the QC metrics of one sample from its files.
pub fn sample_qc(sample: &str, files: &SampleFiles, platform: Platform) -> Result<SampleQc> {
    let reads = metrics::read_counts_or_default(files.qc_report.as_deref(), platform.is_long_read())?;
    let coverage = metrics::coverage_or_default(files.coverage.as_deref())?;
    let consensus = metrics::read_consensus(&files.assembly)?;
    let host_reads = metrics::host_reads_or_default(files.depletion.as_deref(), platform.is_paired_end())?;

    Ok(SampleQc {
        sample: sample.to_string(),
        reads: reads.total,
        qc_reads: reads.filtered,
        host_reads,
        aligned_reads: coverage.aligned_reads,
        coverage: coverage.coverage,
        mean_depth: coverage.mean_depth,
        missing: consensus.missing,
        completeness: consensus.completeness,
    })
}

/// Extract QC metrics for every sample (in parallel), sorted for display.
pub fn collect_sample_qc(files: &SampleFileMap, platform: Platform) -> Result<Vec<SampleQc>> {
    let mut rows: Vec<SampleQc> = files
        .par_iter()
        .map(|(sample, sample_files)| {
            sample_qc(sample, sample_files, platform)
                .with_context(|| format!("Failed to collect QC metrics for sample '{}'", sample))
        })
        .collect::<Result<Vec<_>>>()?;
    sort_rows(&mut rows);
    Ok(rows)
}

/// Missing values sort after present ones.
fn cmp_option_f64(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Sort by sample, then completeness, coverage and mean depth.
pub fn sort_rows(rows: &mut [SampleQc]) {
    rows.sort_by(|a, b| {
        a.sample
            .cmp(&b.sample)
            .then_with(|| cmp_option_f64(a.completeness, b.completeness))
            .then_with(|| cmp_option_f64(Some(a.coverage), Some(b.coverage)))
            .then_with(|| cmp_option_f64(Some(a.mean_depth), Some(b.mean_depth)))
    });
}

/// Table title suffix: `high_freq` -> `HighFreq`; no subdirectory -> `ONT`.
pub fn table_title(subdir: Option<&str>) -> String {
    match subdir {
        Some(sub) => sub
            .split('_')
            .map(|part| {
                let mut chars = part.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().chain(chars.flat_map(|c| c.to_lowercase())).collect(),
                    None => String::new(),
                }
            })
            .collect(),
        None => "ONT".to_string(),
    }
}

fn display_cells(row: &SampleQc) -> [String; 9] {
    [
        row.sample.clone(),
        row.reads.to_string(),
        row.qc_reads.to_string(),
        row.host_reads.to_string(),
        row.aligned_reads.to_string(),
        row.coverage.to_string(),
        row.mean_depth.to_string(),
        row.missing.to_string(),
        row.completeness.map_or("-".to_string(), |v| v.to_string()),
    ]
}

/// Render the QC rows as a console table, each row coloured by its completeness tier.
pub fn render_table(rows: &[SampleQc], title: &str) -> String {
    let mut builder = Builder::default();
    builder.push_record(QC_COLUMNS.iter().map(|c| c.to_string()));
    for row in rows {
        let tier = CompletenessTier::from_completeness(row.completeness);
        builder.push_record(display_cells(row).iter().map(|cell| tier.paint(cell).to_string()));
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table.modify(Columns::new(1..), Alignment::right());

    format!("{}\n{}", title.bold(), table)
}

/// Samples meeting the minimum completeness and mean depth.
pub fn passing_samples(rows: &[SampleQc], min_complete: f64, min_depth: f64) -> HashSet<String> {
    rows.iter()
        .filter(|r| r.completeness.is_some_and(|c| c >= min_complete) && r.mean_depth >= min_depth)
        .map(|r| r.sample.clone())
        .collect()
}

/// Write QC rows to a tab-separated file. Unknown values are written as empty cells.
pub fn write_qc_table(rows: &[SampleQc], path: &Path) -> Result<()> {
    let mut wtr = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create QC table: {}", path.display()))?;

    wtr.write_record(QC_COLUMNS)?;
    for row in rows {
        wtr.write_record(&[
            row.sample.clone(),
            row.reads.to_string(),
            row.qc_reads.to_string(),
            row.host_reads.to_string(),
            row.aligned_reads.to_string(),
            row.coverage.to_string(),
            row.mean_depth.to_string(),
            row.missing.to_string(),
            row.completeness.map_or(String::new(), |v| v.to_string()),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Read a QC table written by [`write_qc_table`].
pub fn read_qc_table(path: &Path) -> Result<Vec<SampleQc>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to open QC table: {}", path.display()))?;

    let mut rows = Vec::new();
    for (i, record) in rdr.records().enumerate() {
        let record = record.with_context(|| format!("Failed to parse QC table row {}", i + 1))?;
        rows.push(parse_qc_record(&record, i + 1)?);
    }
    Ok(rows)
}

fn parse_qc_record(record: &csv::StringRecord, row: usize) -> Result<SampleQc> {
    let ctx = || format!("row {}", row);
    let optional = |idx: usize| -> Option<&str> { record.get(idx).filter(|v| !v.is_empty()) };

    Ok(SampleQc {
        sample: record.get(0).with_context(ctx)?.to_string(),
        reads: record.get(1).with_context(ctx)?.parse().with_context(ctx)?,
        qc_reads: record.get(2).with_context(ctx)?.parse().with_context(ctx)?,
        host_reads: record.get(3).with_context(ctx)?.parse().with_context(ctx)?,
        aligned_reads: record.get(4).with_context(ctx)?.parse().with_context(ctx)?,
        coverage: record.get(5).with_context(ctx)?.parse().with_context(ctx)?,
        mean_depth: record.get(6).with_context(ctx)?.parse().with_context(ctx)?,
        missing: record.get(7).with_context(ctx)?.parse().with_context(ctx)?,
        completeness: optional(8).map(str::parse::<f64>).transpose().with_context(ctx)?,
    })
}
