//! Static reference resources: the GenBank record (sequence and CDS features)
//! and the list of masked regions. Both are read once and only queried afterwards.

use crate::error::ReportError;
use crate::types::MaskRegion;
use anyhow::{Context, Result};
use gb_io::seq::{Feature, Location};
use std::path::Path;

/// A coding sequence with the qualifiers used for annotation.
///
/// `ranges` are 0-based half-open spans; `start`/`end` are the outer bounds.
#[derive(Debug, Clone, PartialEq)]
pub struct CdsFeature {
    pub start: i64,
    pub end: i64,
    pub ranges: Vec<(i64, i64)>,
    pub gene: Option<String>,
    pub locus_tag: Option<String>,
    pub protein_id: Option<String>,
    pub product: Option<String>,
    pub note: Option<String>,
}

impl CdsFeature {
    /// Whether a 0-based position lies within any span of the feature.
    pub fn contains(&self, pos0: i64) -> bool {
        self.ranges.iter().any(|&(start, end)| start <= pos0 && pos0 < end)
    }
}

/// Reference genome: sequence plus CDS features, in file order.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: String,
    pub sequence: Vec<u8>,
    pub cds: Vec<CdsFeature>,
}

impl Reference {
    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }
}

fn collect_ranges(location: &Location, ranges: &mut Vec<(i64, i64)>) {
    match location {
        Location::Range((from, _), (to, _)) | Location::Between(from, to) => {
            let (start, end) = if to < from { (*to, *from) } else { (*from, *to) };
            ranges.push((start, end));
        }
        Location::Complement(inner) => collect_ranges(inner, ranges),
        Location::Join(parts) | Location::Order(parts) | Location::Bond(parts) | Location::OneOf(parts) => {
            for part in parts {
                collect_ranges(part, ranges);
            }
        }
        Location::External(_, maybe_loc) => {
            if let Some(loc) = maybe_loc {
                collect_ranges(loc, ranges);
            }
        }
        Location::Gap(_) => {}
    }
}

/// All values of a qualifier joined with `;`, or `None` if the key is absent.
fn joined_qualifier(feature: &Feature, key: &str) -> Option<String> {
    let values: Vec<&str> = feature.qualifier_values(key).collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join(";"))
    }
}

pub fn cds_from_feature(feature: &Feature) -> Option<CdsFeature> {
    let mut ranges = Vec::new();
    collect_ranges(&feature.location, &mut ranges);
    if ranges.is_empty() {
        let (from, to) = feature.location.find_bounds().ok()?;
        ranges.push((from.min(to), from.max(to)));
    }

    let start = ranges.iter().map(|r| r.0).min()?;
    let end = ranges.iter().map(|r| r.1).max()?;

    Some(CdsFeature {
        start,
        end,
        ranges,
        gene: joined_qualifier(feature, "gene"),
        locus_tag: joined_qualifier(feature, "locus_tag"),
        protein_id: joined_qualifier(feature, "protein_id"),
        product: joined_qualifier(feature, "product"),
        note: joined_qualifier(feature, "note"),
    })
}

/// Load the first record of a GenBank file.
pub fn read_genbank(path: &Path) -> Result<Reference> {
    let records = gb_io::reader::parse_file(path)
        .with_context(|| format!("Failed to parse GenBank file: {}", path.display()))?;

    let record = records
        .into_iter()
        .next()
        .ok_or_else(|| ReportError::NoReferenceRecord(path.to_path_buf()))?;

    let name = record
        .name
        .clone()
        .unwrap_or_else(|| path.display().to_string());
    if record.seq.is_empty() {
        return Err(ReportError::EmptyReference(name).into());
    }

    let cds: Vec<CdsFeature> = record
        .features
        .iter()
        .filter(|f| f.kind == "CDS")
        .filter_map(cds_from_feature)
        .collect();

    log::info!(
        "Loaded reference {} ({} bp, {} CDS features)",
        name,
        record.seq.len(),
        cds.len()
    );

    Ok(Reference {
        name,
        sequence: record.seq,
        cds,
    })
}

/// Read masked regions from a tab-separated file with a header
/// (`start`, `end`, `annotation`, `source`; an optional `chrom` column).
pub fn read_mask_regions(path: &Path) -> Result<Vec<MaskRegion>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to open mask file: {}", path.display()))?;

    let mut regions = Vec::new();
    for (i, result) in rdr.deserialize().enumerate() {
        let region: MaskRegion =
            result.with_context(|| format!("Failed to parse mask file row {}", i + 1))?;
        regions.push(region);
    }
    Ok(regions)
}
