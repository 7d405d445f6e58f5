//! Entry points tying the stages together: the assembly QC table and the
//! annotated variant report.

use crate::annotate::{annotate_variants, AnnotationConfig};
use crate::error::ReportError;
use crate::files::{consensus_dir, resolve_sample_files};
use crate::filter::{pass_only, qc_pass, ThresholdLadder};
use crate::output::{write_annotated_variants, write_mask_cds, write_population_summary, OutputNames};
use crate::qc::{collect_sample_qc, passing_samples, render_table, table_title, write_qc_table};
use crate::reference::{read_genbank, read_mask_regions};
use crate::summary::{
    apobec3_profiles, mask_cds_overlaps, non_synonymous_profiles, population_summary, Apobec3Profile,
    MaskCdsOverlap, NonSynonymousProfile, PopulationVariant,
};
use crate::types::{AnnotatedVariant, MaskRegion, Platform, SampleQc, Strictness, VariantCall};
use crate::variants::{load_ivar_variants, load_medaka_variants};
use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::path::PathBuf;

/// Where a run's outputs live and how they were produced.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub results: PathBuf,
    pub subdir: Option<String>,
    pub platform: Platform,
    pub strictness: Strictness,
}

impl RunOptions {
    pub fn subdir(&self) -> Option<&str> {
        self.subdir.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct QcOptions {
    pub run: RunOptions,
    pub table_output: Option<PathBuf>,
}

/// Assembly QC rows plus their rendered console table.
#[derive(Debug, Clone)]
pub struct QcReport {
    pub rows: Vec<SampleQc>,
    pub table: String,
}

/// Sample-level gate applied before annotation.
#[derive(Debug, Clone, Copy)]
pub struct QcPass {
    pub min_complete: f64,
    pub min_depth: f64,
}

impl Default for QcPass {
    fn default() -> Self {
        Self {
            min_complete: 95.0,
            min_depth: 50.0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct VariantOptions {
    pub run: RunOptions,
    pub outdir: PathBuf,
    pub qc_pass: Option<QcPass>,
    pub genbank: Option<PathBuf>,
    pub mask: Option<PathBuf>,
    /// Keep only iVar calls flagged PASS
    pub variant_pass: bool,
    pub low_freq_depth: Option<ThresholdLadder>,
    pub annotation: AnnotationConfig,
}

/// Everything produced by an annotated variant run.
#[derive(Debug, Clone)]
pub struct VariantReport {
    pub platform: Platform,
    pub names: OutputNames,
    pub reference_length: usize,
    pub regions: Vec<MaskRegion>,
    pub variants: Vec<AnnotatedVariant>,
    pub population: Vec<PopulationVariant>,
    pub mask_cds: Vec<MaskCdsOverlap>,
    pub apobec3: Vec<Apobec3Profile>,
    pub non_synonymous: Vec<NonSynonymousProfile>,
}

/// Build the assembly QC table for a run, optionally writing it to TSV.
pub fn quality_control(opts: &QcOptions) -> Result<QcReport> {
    let run = &opts.run;
    let files = resolve_sample_files(&run.results, run.subdir(), run.platform, run.strictness)?;
    log::info!("Found {} consensus assemblies", files.len());

    let rows = collect_sample_qc(&files, run.platform)?;
    let title = format!("Assembly QC ({})", table_title(run.subdir()));
    let table = render_table(&rows, &title);

    if let Some(path) = &opts.table_output {
        write_qc_table(&rows, path)?;
        log::info!("QC table written to: {}", path.display());
    }

    Ok(QcReport { rows, table })
}

fn load_calls(run: &RunOptions) -> Result<Vec<VariantCall>> {
    if run.platform.uses_ivar() {
        let subdir = run.subdir().ok_or(ReportError::MissingSubdir)?;
        load_ivar_variants(&consensus_dir(&run.results, Some(subdir)))
    } else {
        load_medaka_variants(&consensus_dir(&run.results, None))
    }
}

/// Load, gate, annotate, filter and export the variant calls of a run.
///
/// Returns `None` when the GenBank or mask file is missing; the calls are
/// still loaded (and validated) but nothing is annotated or written.
pub fn variant_report(opts: &VariantOptions, progress: Option<&ProgressBar>) -> Result<Option<VariantReport>> {
    let run = &opts.run;
    let calls = load_calls(run)?;

    let passing = match opts.qc_pass {
        Some(gate) => {
            let qc = quality_control(&QcOptions {
                run: run.clone(),
                table_output: None,
            })?;
            let passing = passing_samples(&qc.rows, gate.min_complete, gate.min_depth);
            log::info!(
                "{} of {} samples pass QC (completeness >= {}, mean depth >= {})",
                passing.len(),
                qc.rows.len(),
                gate.min_complete,
                gate.min_depth
            );
            Some(passing)
        }
        None => None,
    };
    let calls = match &passing {
        Some(samples) => qc_pass(calls, samples),
        None => calls,
    };

    let (genbank, mask) = match (&opts.genbank, &opts.mask) {
        (Some(g), Some(m)) => (g, m),
        _ => {
            log::warn!("No GenBank file and/or mask file specified, skipping variant annotation");
            return Ok(None);
        }
    };

    std::fs::create_dir_all(&opts.outdir)
        .with_context(|| format!("Failed to create output directory: {}", opts.outdir.display()))?;

    let reference = read_genbank(genbank)?;
    let regions = read_mask_regions(mask)?;
    log::info!("Loaded {} mask regions from {}", regions.len(), mask.display());

    if let Some(pb) = progress {
        pb.set_length(calls.len() as u64);
    }
    let mut variants = annotate_variants(calls, &reference, &regions, &opts.annotation, progress);
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    if run.platform.uses_ivar() {
        if opts.variant_pass {
            let before = variants.len();
            variants = pass_only(variants);
            log::info!("PASS filter kept {} of {} variants", variants.len(), before);
        }
        if let Some(ladder) = &opts.low_freq_depth {
            variants = ladder.apply(variants);
        }
    }

    let names = OutputNames::new(&opts.outdir, run.subdir(), mask, genbank);
    let population = population_summary(&variants);
    let overlaps = mask_cds_overlaps(&regions, &reference.cds);

    write_annotated_variants(&variants, run.platform, &names.variants())?;
    write_population_summary(&population, run.platform, &names.variants_summary())?;
    write_mask_cds(&overlaps, &names.mask_cds())?;
    log::info!("Variant tables written to: {}", opts.outdir.display());

    Ok(Some(VariantReport {
        platform: run.platform,
        apobec3: apobec3_profiles(&variants),
        non_synonymous: non_synonymous_profiles(&variants),
        reference_length: reference.len(),
        names,
        regions,
        variants,
        population,
        mask_cds: overlaps,
    }))
}
