use crate::error::ReportError;
use crate::types::{Platform, Strictness};
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const CONSENSUS_SUFFIX: &str = ".consensus.fasta";
pub const COVERAGE_SUFFIX: &str = ".coverage.txt";
pub const FASTP_SUFFIX: &str = ".json";
pub const NANOQ_SUFFIX: &str = ".nanoq.json";
pub const DEPLETION_SUFFIX: &str = ".json";

/// Files belonging to one sample. Only the consensus assembly is required.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleFiles {
    pub assembly: PathBuf,
    pub qc_report: Option<PathBuf>,
    pub coverage: Option<PathBuf>,
    pub depletion: Option<PathBuf>,
}

/// Sample id -> files, ordered by sample id.
pub type SampleFileMap = BTreeMap<String, SampleFiles>;

/// `results/consensus` or `results/consensus/<subdir>`.
pub fn consensus_dir(results: &Path, subdir: Option<&str>) -> PathBuf {
    let dir = results.join("consensus");
    match subdir {
        Some(sub) => dir.join(sub),
        None => dir,
    }
}

/// List files in `dir` whose names end in `suffix`, keyed by the name with the suffix removed.
///
/// A missing directory yields an empty map. Paths are returned sorted by stem.
pub fn files_by_stem(dir: &Path, suffix: &str) -> Result<BTreeMap<String, PathBuf>> {
    let mut found = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(found);
    }
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to list directory: {}", dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(n) => n,
            None => continue,
        };
        if let Some(stem) = name.strip_suffix(suffix) {
            if !stem.is_empty() {
                found.insert(stem.to_string(), path.clone());
            }
        }
    }
    Ok(found)
}

/// Match the consensus assemblies of a run with their QC, coverage and
/// host-depletion companions by filename stem.
pub fn resolve_sample_files(
    results: &Path,
    subdir: Option<&str>,
    platform: Platform,
    strictness: Strictness,
) -> Result<SampleFileMap> {
    let consensus = consensus_dir(results, subdir);
    let assemblies = files_by_stem(&consensus, CONSENSUS_SUFFIX)?;
    if assemblies.is_empty() {
        return Err(ReportError::NoConsensus(consensus).into());
    }

    let qc_suffix = if platform.is_long_read() {
        NANOQ_SUFFIX
    } else {
        FASTP_SUFFIX
    };
    let mut qc_reports = files_by_stem(&results.join("quality_control"), qc_suffix)?;
    let mut coverage = files_by_stem(&results.join("coverage"), COVERAGE_SUFFIX)?;
    let mut depletion = files_by_stem(&results.join("host_depletion"), DEPLETION_SUFFIX)?;

    let mut samples = SampleFileMap::new();
    for (sample, assembly) in assemblies {
        let files = SampleFiles {
            assembly,
            qc_report: qc_reports.remove(&sample),
            coverage: coverage.remove(&sample),
            depletion: depletion.remove(&sample),
        };
        if strictness == Strictness::Strict {
            check_complete(&sample, &files)?;
        } else {
            for kind in missing_companions(&files) {
                log::warn!("Sample '{}' has no {} file; using default metrics", sample, kind);
            }
        }
        samples.insert(sample, files);
    }

    Ok(samples)
}

fn missing_companions(files: &SampleFiles) -> Vec<&'static str> {
    let mut missing = Vec::new();
    if files.qc_report.is_none() {
        missing.push("read QC");
    }
    if files.coverage.is_none() {
        missing.push("coverage");
    }
    if files.depletion.is_none() {
        missing.push("host depletion");
    }
    missing
}

fn check_complete(sample: &str, files: &SampleFiles) -> Result<()> {
    match missing_companions(files).first() {
        Some(kind) => Err(ReportError::MissingCompanion {
            sample: sample.to_string(),
            kind: *kind,
        }
        .into()),
        None => Ok(()),
    }
}
