use std::fmt;

/// Sequencing/calling platform of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Platform {
    /// Illumina paired-end reads, fastp QC, iVar variant calls
    Illumina,
    /// ONT reads, nanoq QC, ARTIC/Medaka variant calls
    Ont,
    /// ONT reads, nanoq QC, iVar variant calls
    OntIvar,
}

impl Platform {
    pub fn is_long_read(&self) -> bool {
        !matches!(self, Platform::Illumina)
    }

    /// Host depletion reports carry a second (reverse) read entry.
    pub fn is_paired_end(&self) -> bool {
        matches!(self, Platform::Illumina)
    }

    pub fn uses_ivar(&self) -> bool {
        !matches!(self, Platform::Ont)
    }
}

/// How to treat a sample whose companion files (QC, coverage, depletion) are missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strictness {
    /// Substitute zero/default metrics
    #[default]
    Lenient,
    /// Abort the run
    Strict,
}

/// Per-sample quality-control metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleQc {
    pub sample: String,
    pub reads: u64,
    pub qc_reads: u64,
    pub host_reads: u64,
    pub aligned_reads: u64,
    pub coverage: f64,
    pub mean_depth: f64,
    pub missing: u64,
    pub completeness: Option<f64>,
}

/// Mutational motif assigned to a substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Apobec3Pattern {
    TcTt,
    GaAa,
    Other,
}

impl Apobec3Pattern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Apobec3Pattern::TcTt => "TC>TT",
            Apobec3Pattern::GaAa => "GA>AA",
            Apobec3Pattern::Other => "other",
        }
    }

    pub fn is_apobec3(&self) -> bool {
        !matches!(self, Apobec3Pattern::Other)
    }
}

impl fmt::Display for Apobec3Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-specific columns of an iVar variant table row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IvarMetrics {
    pub ref_dp: Option<u64>,
    pub ref_rv: Option<u64>,
    pub ref_qual: Option<f64>,
    pub alt_dp: Option<u64>,
    pub alt_rv: Option<u64>,
    pub alt_qual: Option<f64>,
    pub alt_freq: Option<f64>,
    pub total_dp: Option<u64>,
    pub pval: Option<f64>,
    pub pass: Option<bool>,
    pub gff_feature: Option<String>,
    pub ref_codon: Option<String>,
    pub ref_aa: Option<String>,
    pub alt_codon: Option<String>,
    pub alt_aa: Option<String>,
}

/// Caller-specific columns of a Medaka VCF record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MedakaMetrics {
    pub qual: Option<f64>,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallMetrics {
    Ivar(IvarMetrics),
    Medaka(MedakaMetrics),
}

/// A single variant call of one sample.
///
/// A sample without any calls is represented by one placeholder row in which
/// everything but `sample` is null.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantCall {
    pub sample: String,
    pub chrom: Option<String>,
    /// 1-based reference position
    pub pos: Option<u64>,
    pub ref_allele: Option<String>,
    pub alt_allele: Option<String>,
    pub metrics: CallMetrics,
}

impl VariantCall {
    pub fn placeholder(sample: &str, metrics: CallMetrics) -> Self {
        Self {
            sample: sample.to_string(),
            chrom: None,
            pos: None,
            ref_allele: None,
            alt_allele: None,
            metrics,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.pos.is_none()
    }

    pub fn ivar(&self) -> Option<&IvarMetrics> {
        match &self.metrics {
            CallMetrics::Ivar(m) => Some(m),
            CallMetrics::Medaka(_) => None,
        }
    }

    pub fn alt_freq(&self) -> Option<f64> {
        self.ivar().and_then(|m| m.alt_freq)
    }

    pub fn alt_depth(&self) -> Option<u64> {
        self.ivar().and_then(|m| m.alt_dp)
    }

    pub fn passed(&self) -> bool {
        self.ivar().and_then(|m| m.pass).unwrap_or(false)
    }
}

/// Mask-region membership of a variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MaskHit {
    pub masked: bool,
    pub mask_type: Option<String>,
    pub source: Option<String>,
}

/// Coding-sequence context of a variant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CdsHit {
    pub intergenic: bool,
    pub gene: Option<String>,
    pub locus_tag: Option<String>,
    pub protein_id: Option<String>,
    pub product: Option<String>,
    pub note: Option<String>,
}

/// Derived fields attached to a variant call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Annotation {
    pub apobec3: Option<bool>,
    pub pattern: Option<Apobec3Pattern>,
    pub context: Option<String>,
    pub non_synonymous: Option<bool>,
    pub mask: MaskHit,
    pub cds: Option<CdsHit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedVariant {
    pub call: VariantCall,
    pub annotation: Annotation,
}

/// Masked reference interval, 1-based inclusive.
#[derive(Debug, Clone, PartialEq, serde::Deserialize, serde::Serialize)]
pub struct MaskRegion {
    #[serde(default)]
    pub chrom: Option<String>,
    pub start: u64,
    pub end: u64,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
}

impl MaskRegion {
    pub fn contains(&self, pos: u64) -> bool {
        self.start <= pos && pos <= self.end
    }
}
