use crate::error::ReportError;
use anyhow::{Context, Result};
use bio::io::fasta;
use serde::Deserialize;
use std::path::Path;

#[derive(Deserialize)]
struct FastpReport {
    summary: FastpSummary,
}

#[derive(Deserialize)]
struct FastpSummary {
    before_filtering: FastpCounts,
    after_filtering: FastpCounts,
}

#[derive(Deserialize)]
struct FastpCounts {
    total_reads: u64,
}

#[derive(Deserialize)]
struct NanoqReport {
    reads: u64,
    filtered: u64,
}

#[derive(Deserialize)]
struct DepletionReport {
    reads: Vec<DepletionEntry>,
}

#[derive(Deserialize)]
struct DepletionEntry {
    depleted: u64,
}

/// Read counts before and after read filtering.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadCounts {
    pub total: u64,
    pub filtered: u64,
}

/// Alignment summary from `samtools coverage`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoverageStats {
    pub aligned_reads: u64,
    pub coverage: f64,
    pub mean_depth: f64,
}

/// Missing-base summary of a consensus assembly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsensusStats {
    pub length: usize,
    pub missing: u64,
    pub completeness: Option<f64>,
}

pub fn round_to(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Percentage of non-`N` bases; `None` for an empty sequence.
pub fn completeness(length: usize, n_count: u64) -> Option<f64> {
    if length == 0 {
        return None;
    }
    Some(round_to(100.0 - (n_count as f64 / length as f64) * 100.0, 6))
}

fn read_json<T: for<'de> Deserialize<'de>>(path: &Path, kind: &'static str) -> Result<T> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open {} report: {}", kind, path.display()))?;
    serde_json::from_reader(std::io::BufReader::new(file)).map_err(|e| {
        ReportError::Malformed {
            kind,
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
        .into()
    })
}

/// Illumina read counts from a fastp JSON report.
pub fn read_fastp(path: &Path) -> Result<ReadCounts> {
    let report: FastpReport = read_json(path, "fastp")?;
    Ok(ReadCounts {
        total: report.summary.before_filtering.total_reads,
        filtered: report.summary.after_filtering.total_reads,
    })
}

/// Long-read counts from a nanoq JSON report. `reads` are the reads kept,
/// `filtered` the reads removed.
pub fn read_nanoq(path: &Path) -> Result<ReadCounts> {
    let report: NanoqReport = read_json(path, "nanoq")?;
    Ok(ReadCounts {
        total: report.reads + report.filtered,
        filtered: report.reads,
    })
}

/// Reads for the platform's QC report, or zeros when the sample has none.
pub fn read_counts_or_default(path: Option<&Path>, long_read: bool) -> Result<ReadCounts> {
    match path {
        None => Ok(ReadCounts::default()),
        Some(p) if long_read => read_nanoq(p),
        Some(p) => read_fastp(p),
    }
}

/// Host reads removed by depletion; paired-end reports sum both mates.
pub fn read_host_reads(path: &Path, paired: bool) -> Result<u64> {
    let report: DepletionReport = read_json(path, "host depletion")?;
    let needed = if paired { 2 } else { 1 };
    if report.reads.len() < needed {
        return Err(ReportError::Malformed {
            kind: "host depletion",
            path: path.to_path_buf(),
            reason: format!("expected {} read entries, found {}", needed, report.reads.len()),
        }
        .into());
    }
    Ok(report.reads[..needed].iter().map(|r| r.depleted).sum())
}

pub fn host_reads_or_default(path: Option<&Path>, paired: bool) -> Result<u64> {
    match path {
        Some(p) => read_host_reads(p, paired),
        None => Ok(0),
    }
}

/// Parse the single data line of a `samtools coverage` report.
///
/// Columns (0-indexed): 3 = numreads, 5 = coverage (%), 6 = meandepth.
pub fn read_coverage(path: &Path) -> Result<CoverageStats> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read coverage file: {}", path.display()))?;
    let malformed = |reason: String| ReportError::Malformed {
        kind: "coverage",
        path: path.to_path_buf(),
        reason,
    };

    let line = content
        .lines()
        .nth(1)
        .ok_or_else(|| malformed("missing data line".to_string()))?;
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < 7 {
        return Err(malformed(format!("expected at least 7 columns, found {}", fields.len())).into());
    }

    let aligned_reads: u64 = fields[3]
        .parse()
        .map_err(|_| malformed(format!("invalid read count '{}'", fields[3])))?;
    let coverage: f64 = fields[5]
        .parse()
        .map_err(|_| malformed(format!("invalid coverage '{}'", fields[5])))?;
    let mean_depth: f64 = fields[6]
        .parse()
        .map_err(|_| malformed(format!("invalid mean depth '{}'", fields[6])))?;

    Ok(CoverageStats {
        aligned_reads,
        coverage: round_to(coverage, 4),
        mean_depth: round_to(mean_depth, 6),
    })
}

pub fn coverage_or_default(path: Option<&Path>) -> Result<CoverageStats> {
    match path {
        Some(p) => read_coverage(p),
        None => Ok(CoverageStats::default()),
    }
}

/// Count missing bases in the first record of a consensus FASTA.
pub fn read_consensus(path: &Path) -> Result<ConsensusStats> {
    let reader = fasta::Reader::from_file(path)
        .with_context(|| format!("Failed to open consensus assembly: {}", path.display()))?;

    let record = match reader.records().next() {
        Some(record) => record
            .with_context(|| format!("Failed to parse consensus assembly: {}", path.display()))?,
        None => {
            return Ok(ConsensusStats {
                length: 0,
                missing: 0,
                completeness: None,
            })
        }
    };

    let seq = record.seq();
    let missing = seq
        .iter()
        .filter(|b| b.to_ascii_uppercase() == b'N')
        .count() as u64;

    Ok(ConsensusStats {
        length: seq.len(),
        missing,
        completeness: completeness(seq.len(), missing),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Write;

    fn write_temp(content: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_completeness() {
        assert_relative_eq!(completeness(100, 5).unwrap(), 95.0, epsilon = 1e-9);
        assert_relative_eq!(completeness(3, 1).unwrap(), 66.666667, epsilon = 1e-9);
        assert_eq!(completeness(0, 0), None);
        assert_eq!(completeness(10, 0), Some(100.0));
    }

    #[test]
    fn test_read_fastp() {
        let f = write_temp(
            r#"{"summary": {"before_filtering": {"total_reads": 1000},
                "after_filtering": {"total_reads": 900}}}"#,
        );
        let counts = read_fastp(f.path()).unwrap();
        assert_eq!(counts, ReadCounts { total: 1000, filtered: 900 });
    }

    #[test]
    fn test_read_nanoq() {
        let f = write_temp(r#"{"reads": 800, "filtered": 200, "bases": 12345}"#);
        let counts = read_nanoq(f.path()).unwrap();
        assert_eq!(counts, ReadCounts { total: 1000, filtered: 800 });
    }

    #[test]
    fn test_missing_report_defaults_to_zero() {
        assert_eq!(read_counts_or_default(None, false).unwrap(), ReadCounts::default());
        assert_eq!(host_reads_or_default(None, true).unwrap(), 0);
        assert_eq!(coverage_or_default(None).unwrap(), CoverageStats::default());
    }

    #[test]
    fn test_host_reads_paired_and_single() {
        let f = write_temp(r#"{"reads": [{"depleted": 10}, {"depleted": 7}]}"#);
        assert_eq!(read_host_reads(f.path(), true).unwrap(), 17);
        assert_eq!(read_host_reads(f.path(), false).unwrap(), 10);

        let single = write_temp(r#"{"reads": [{"depleted": 3}]}"#);
        assert!(read_host_reads(single.path(), true).is_err());
    }

    #[test]
    fn test_read_coverage_rounds() {
        let f = write_temp(
            "#rname\tstartpos\tendpos\tnumreads\tcovbases\tcoverage\tmeandepth\tmeanbaseq\tmeanmapq\n\
             MPXV\t1\t197209\t52341\t196000\t99.38694512\t215.1234567891\t36.5\t59.8\n",
        );
        let stats = read_coverage(f.path()).unwrap();
        assert_eq!(stats.aligned_reads, 52341);
        assert_relative_eq!(stats.coverage, 99.3869, epsilon = 1e-12);
        assert_relative_eq!(stats.mean_depth, 215.123457, epsilon = 1e-12);
    }

    #[test]
    fn test_read_coverage_missing_line() {
        let f = write_temp("#rname\tstartpos\n");
        let err = read_coverage(f.path()).unwrap_err();
        assert!(err.downcast_ref::<ReportError>().is_some());
    }

    #[test]
    fn test_read_consensus() {
        let f = write_temp(">sample1\nACGTNNnnAC\nGT\n>ignored\nNNNN\n");
        let stats = read_consensus(f.path()).unwrap();
        assert_eq!(stats.length, 12);
        assert_eq!(stats.missing, 4);
        assert_relative_eq!(stats.completeness.unwrap(), 66.666667, epsilon = 1e-9);
    }

    #[test]
    fn test_read_consensus_empty_sequence() {
        let f = write_temp(">empty\n");
        let stats = read_consensus(f.path()).unwrap();
        assert_eq!(stats.length, 0);
        assert_eq!(stats.completeness, None);
    }
}
