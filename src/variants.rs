use crate::error::ReportError;
use crate::files::files_by_stem;
use crate::types::{CallMetrics, IvarMetrics, MedakaMetrics, VariantCall};
use anyhow::{Context, Result};
use rust_htslib::{bcf, bcf::Read};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

pub const IVAR_SUFFIX: &str = ".variants.tsv";
pub const MEDAKA_SUFFIX: &str = ".pass.vcf.gz";

/// Cell values treated as missing in iVar tables.
fn is_missing(value: &str) -> bool {
    matches!(value, "" | "NA" | "NaN" | "nan" | "None")
}

/// Column lookup for an iVar table, tolerant of column order and optional columns.
struct IvarColumns {
    index: HashMap<String, usize>,
}

impl IvarColumns {
    fn new(headers: &csv::StringRecord) -> Self {
        Self {
            index: headers
                .iter()
                .enumerate()
                .map(|(i, h)| (h.trim().to_string(), i))
                .collect(),
        }
    }

    fn text(&self, record: &csv::StringRecord, column: &str) -> Option<String> {
        let idx = *self.index.get(column)?;
        record
            .get(idx)
            .map(str::trim)
            .filter(|v| !is_missing(v))
            .map(str::to_string)
    }

    fn parsed<T>(&self, record: &csv::StringRecord, column: &str, row: usize) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        self.text(record, column)
            .map(|v| v.parse::<T>())
            .transpose()
            .with_context(|| format!("row {}: invalid {} value", row, column))
    }

    fn flag(&self, record: &csv::StringRecord, column: &str, row: usize) -> Result<Option<bool>> {
        match self.text(record, column) {
            None => Ok(None),
            Some(v) if v.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(v) if v.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(v) => anyhow::bail!("row {}: invalid {} value '{}'", row, column, v),
        }
    }
}

/// Parse one iVar `*.variants.tsv` table. An empty table yields a single placeholder row.
pub fn read_ivar_table(path: &Path, sample: &str) -> Result<Vec<VariantCall>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to open iVar table: {}", path.display()))?;

    let columns = IvarColumns::new(rdr.headers()?);
    let mut calls = Vec::new();

    for (i, record) in rdr.records().enumerate() {
        let row = i + 1;
        let record = record.with_context(|| format!("Failed to parse {} row {}", path.display(), row))?;

        let metrics = IvarMetrics {
            ref_dp: columns.parsed(&record, "REF_DP", row)?,
            ref_rv: columns.parsed(&record, "REF_RV", row)?,
            ref_qual: columns.parsed(&record, "REF_QUAL", row)?,
            alt_dp: columns.parsed(&record, "ALT_DP", row)?,
            alt_rv: columns.parsed(&record, "ALT_RV", row)?,
            alt_qual: columns.parsed(&record, "ALT_QUAL", row)?,
            alt_freq: columns.parsed(&record, "ALT_FREQ", row)?,
            total_dp: columns.parsed(&record, "TOTAL_DP", row)?,
            pval: columns.parsed(&record, "PVAL", row)?,
            pass: columns.flag(&record, "PASS", row)?,
            gff_feature: columns.text(&record, "GFF_FEATURE"),
            ref_codon: columns.text(&record, "REF_CODON"),
            ref_aa: columns.text(&record, "REF_AA"),
            alt_codon: columns.text(&record, "ALT_CODON"),
            alt_aa: columns.text(&record, "ALT_AA"),
        };

        calls.push(VariantCall {
            sample: sample.to_string(),
            chrom: columns.text(&record, "REGION"),
            pos: columns.parsed(&record, "POS", row)?,
            ref_allele: columns.text(&record, "REF"),
            alt_allele: columns.text(&record, "ALT"),
            metrics: CallMetrics::Ivar(metrics),
        });
    }

    if calls.is_empty() {
        log::debug!("No variants called for sample {}", sample);
        calls.push(VariantCall::placeholder(sample, CallMetrics::Ivar(IvarMetrics::default())));
    }

    Ok(calls)
}

/// Parse one Medaka `*.pass.vcf.gz`. Only the first ALT allele is kept.
pub fn read_medaka_vcf(path: &Path, sample: &str) -> Result<Vec<VariantCall>> {
    let mut reader = bcf::Reader::from_path(path)
        .with_context(|| format!("Failed to open VCF file: {}", path.display()))?;
    let header = reader.header().clone();

    let mut calls = Vec::new();
    for result in reader.records() {
        let record = result.context("Failed to read VCF record")?;

        let chrom = match record.rid() {
            Some(rid) => Some(String::from_utf8_lossy(header.rid2name(rid)?).to_string()),
            None => None,
        };
        let pos = record.pos() as u64 + 1; // BCF is 0-based

        let alleles = record.alleles();
        let ref_allele = alleles.first().map(|a| String::from_utf8_lossy(a).to_string());
        let alt_allele = alleles.get(1).map(|a| String::from_utf8_lossy(a).to_string());

        let qual = record.qual();
        let qual = if qual.is_nan() { None } else { Some(qual as f64) };

        let filters: Vec<String> = record
            .filters()
            .map(|id| String::from_utf8_lossy(&header.id_to_name(id)).to_string())
            .filter(|name| name != "PASS")
            .collect();
        let filter = if filters.is_empty() {
            None
        } else {
            Some(filters.join(";"))
        };

        calls.push(VariantCall {
            sample: sample.to_string(),
            chrom,
            pos: Some(pos),
            ref_allele,
            alt_allele,
            metrics: CallMetrics::Medaka(MedakaMetrics { qual, filter }),
        });
    }

    if calls.is_empty() {
        log::debug!("No variants called for sample {}", sample);
        calls.push(VariantCall::placeholder(sample, CallMetrics::Medaka(MedakaMetrics::default())));
    }

    Ok(calls)
}

fn load_calls<F>(dir: &Path, suffix: &'static str, read: F) -> Result<Vec<VariantCall>>
where
    F: Fn(&Path, &str) -> Result<Vec<VariantCall>>,
{
    let files = files_by_stem(dir, suffix)?;
    if files.is_empty() {
        return Err(ReportError::NoVariantFiles {
            dir: dir.to_path_buf(),
            suffix,
        }
        .into());
    }

    let mut calls = Vec::new();
    for (sample, path) in &files {
        calls.extend(read(path, sample)?);
    }

    log::info!(
        "Loaded {} variant rows from {} samples in {}",
        calls.len(),
        files.len(),
        dir.display()
    );
    Ok(calls)
}

/// Combine the iVar tables of every sample in a consensus directory.
pub fn load_ivar_variants(dir: &Path) -> Result<Vec<VariantCall>> {
    load_calls(dir, IVAR_SUFFIX, read_ivar_table)
}

/// Combine the Medaka VCFs of every sample in a consensus directory.
pub fn load_medaka_variants(dir: &Path) -> Result<Vec<VariantCall>> {
    load_calls(dir, MEDAKA_SUFFIX, read_medaka_vcf)
}
