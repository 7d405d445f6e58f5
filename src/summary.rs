//! Aggregations over the annotated variant table.

use crate::metrics::round_to;
use crate::reference::CdsFeature;
use crate::types::{AnnotatedVariant, Apobec3Pattern, MaskRegion};
use statrs::statistics::Statistics;
use std::collections::{BTreeMap, BTreeSet};

/// One distinct (POS, REF, ALT) across the cohort.
#[derive(Debug, Clone, PartialEq)]
pub struct PopulationVariant {
    pub pop_count: usize,
    pub pop_freq: f64,
    /// First row of the group in input order
    pub representative: AnnotatedVariant,
}

type VariantKey = (u64, String, String);

fn variant_key(row: &AnnotatedVariant) -> Option<VariantKey> {
    Some((
        row.call.pos?,
        row.call.ref_allele.clone()?,
        row.call.alt_allele.clone()?,
    ))
}

/// Collapse the per-sample table to one row per distinct variant.
///
/// `pop_freq` is the fraction of distinct samples in `rows` carrying the
/// variant; a sample with several rows for it (one per GFF feature) counts once. Rows without a position or alleles do not form groups but their
/// samples still count towards the cohort size.
pub fn population_summary(rows: &[AnnotatedVariant]) -> Vec<PopulationVariant> {
    let samples: BTreeSet<&str> = rows.iter().map(|r| r.call.sample.as_str()).collect();
    let n = samples.len();

    let mut groups: BTreeMap<VariantKey, (BTreeSet<&str>, &AnnotatedVariant)> = BTreeMap::new();
    for row in rows {
        if let Some(key) = variant_key(row) {
            let (carriers, _) = groups.entry(key).or_insert_with(|| (BTreeSet::new(), row));
            carriers.insert(row.call.sample.as_str());
        }
    }

    groups
        .into_values()
        .map(|(carriers, first)| PopulationVariant {
            pop_count: carriers.len(),
            pop_freq: carriers.len() as f64 / n as f64,
            representative: first.clone(),
        })
        .collect()
}

/// A CDS feature with an end point inside a mask region.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskCdsOverlap {
    pub region: MaskRegion,
    pub feature: CdsFeature,
}

/// Pair every mask region with the CDS features that start or end inside it.
///
/// Feature coordinates are compared as stored (0-based start, exclusive end)
/// against the inclusive region bounds.
pub fn mask_cds_overlaps(regions: &[MaskRegion], features: &[CdsFeature]) -> Vec<MaskCdsOverlap> {
    let mut overlaps = Vec::new();
    for region in regions {
        let inside = |coord: i64| coord >= 0 && region.contains(coord as u64);
        for feature in features.iter().filter(|f| inside(f.start) || inside(f.end)) {
            overlaps.push(MaskCdsOverlap {
                region: region.clone(),
                feature: feature.clone(),
            });
        }
    }
    overlaps
}

/// Per-sample tally of APOBEC3 motifs.
#[derive(Debug, Clone, PartialEq)]
pub struct Apobec3Profile {
    pub sample: String,
    pub ga_aa: usize,
    pub tc_tt: usize,
    pub other: usize,
    pub apobec3_percent: f64,
    pub other_percent: f64,
}

impl Apobec3Profile {
    fn new(sample: &str, ga_aa: usize, tc_tt: usize, other: usize) -> Self {
        let total = ga_aa + tc_tt + other;
        let (apobec3_percent, other_percent) = if ga_aa == 0 && tc_tt == 0 {
            (0.0, 0.0)
        } else {
            let pct = round_to((ga_aa + tc_tt) as f64 / total as f64 * 100.0, 4);
            (pct, 100.0 - pct)
        };
        Self {
            sample: sample.to_string(),
            ga_aa,
            tc_tt,
            other,
            apobec3_percent,
            other_percent,
        }
    }
}

/// Motif counts and APOBEC3 share for each sample with classified variants.
pub fn apobec3_profiles(rows: &[AnnotatedVariant]) -> Vec<Apobec3Profile> {
    let mut counts: BTreeMap<&str, [usize; 3]> = BTreeMap::new();
    for row in rows {
        let idx = match row.annotation.pattern {
            Some(Apobec3Pattern::GaAa) => 0,
            Some(Apobec3Pattern::TcTt) => 1,
            Some(Apobec3Pattern::Other) => 2,
            None => continue,
        };
        counts.entry(row.call.sample.as_str()).or_default()[idx] += 1;
    }

    let profiles: Vec<Apobec3Profile> = counts
        .into_iter()
        .map(|(sample, [ga, tc, other])| Apobec3Profile::new(sample, ga, tc, other))
        .collect();

    if !profiles.is_empty() {
        let mean = profiles.iter().map(|p| p.apobec3_percent).mean();
        log::info!("Mean APOBEC3 mutations across samples: {:.2}%", mean);
    }
    profiles
}

/// Per-sample share of non-synonymous calls.
#[derive(Debug, Clone, PartialEq)]
pub struct NonSynonymousProfile {
    pub sample: String,
    pub ns_percent: f64,
    pub synonymous_percent: f64,
}

pub fn non_synonymous_profiles(rows: &[AnnotatedVariant]) -> Vec<NonSynonymousProfile> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(ns) = row.annotation.non_synonymous {
            let entry = counts.entry(row.call.sample.as_str()).or_default();
            if ns {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    counts
        .into_iter()
        .map(|(sample, (ns, syn))| {
            let total = (ns + syn) as f64;
            NonSynonymousProfile {
                sample: sample.to_string(),
                ns_percent: ns as f64 / total * 100.0,
                synonymous_percent: syn as f64 / total * 100.0,
            }
        })
        .collect()
}
