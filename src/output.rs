use crate::summary::{MaskCdsOverlap, PopulationVariant};
use crate::types::{Annotation, AnnotatedVariant, CallMetrics, Platform, VariantCall};
use anyhow::{Context, Result};
use csv::Writer;
use std::fmt::Display;
use std::fs::File;
use std::path::{Path, PathBuf};

const IVAR_COLUMNS: [&str; 19] = [
    "REGION",
    "POS",
    "REF",
    "ALT",
    "REF_DP",
    "REF_RV",
    "REF_QUAL",
    "ALT_DP",
    "ALT_RV",
    "ALT_QUAL",
    "ALT_FREQ",
    "TOTAL_DP",
    "PVAL",
    "PASS",
    "GFF_FEATURE",
    "REF_CODON",
    "REF_AA",
    "ALT_CODON",
    "ALT_AA",
];

const MEDAKA_COLUMNS: [&str; 6] = ["CHROM", "POS", "REF", "ALT", "QUAL", "FILTER"];

const ANNOTATION_COLUMNS: [&str; 13] = [
    "APOBEC3",
    "PATTERN",
    "CONTEXT",
    "NS",
    "MASK",
    "MASK_TYPE",
    "MASK_SOURCE",
    "INTERGENIC",
    "GBK_GENE",
    "GBK_LOCUS_TAG",
    "GBK_PROTEIN_ID",
    "GBK_PRODUCT",
    "GBK_NOTE",
];

/// iVar columns that only make sense per sample; dropped from the population summary.
const PER_SAMPLE_COLUMNS: [&str; 10] = [
    "REF_DP", "REF_RV", "REF_QUAL", "ALT_DP", "ALT_RV", "ALT_QUAL", "ALT_FREQ", "TOTAL_DP", "PASS", "PVAL",
];

const MASK_CDS_COLUMNS: [&str; 10] = [
    "chrom",
    "start",
    "end",
    "annotation",
    "source",
    "GBK_GENE",
    "GBK_LOCUS_TAG",
    "GBK_PROTEIN_ID",
    "GBK_PRODUCT",
    "GBK_NOTE",
];

fn cell<T: Display>(value: &Option<T>) -> String {
    value.as_ref().map_or(String::new(), |v| v.to_string())
}

fn pass_cell(value: Option<bool>) -> String {
    match value {
        Some(true) => "TRUE".to_string(),
        Some(false) => "FALSE".to_string(),
        None => String::new(),
    }
}

/// Output file names shared by one variant report run.
///
/// `mask` and `gbk` are the second-to-last dot-separated components of the
/// mask and GenBank file names (`mpxv.mask.tsv` -> `mask`).
#[derive(Debug, Clone)]
pub struct OutputNames {
    outdir: PathBuf,
    sub: String,
    mask: String,
    gbk: String,
}

/// Second-to-last dot-separated component of a file name, or the whole name if it has no dot.
pub fn name_component(path: &Path) -> String {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let parts: Vec<&str> = name.split('.').collect();
    if parts.len() >= 2 {
        parts[parts.len() - 2].to_string()
    } else {
        name
    }
}

impl OutputNames {
    pub fn new(outdir: &Path, subdir: Option<&str>, mask: &Path, genbank: &Path) -> Self {
        Self {
            outdir: outdir.to_path_buf(),
            sub: match subdir {
                Some(s) => format!("_{}_", s),
                None => "_".to_string(),
            },
            mask: name_component(mask),
            gbk: name_component(genbank),
        }
    }

    fn path(&self, name: String) -> PathBuf {
        self.outdir.join(name)
    }

    pub fn variants(&self) -> PathBuf {
        self.path(format!("variants{}{}_{}.tsv", self.sub, self.mask, self.gbk))
    }

    pub fn variants_summary(&self) -> PathBuf {
        self.path(format!("variants_summary{}{}_{}.tsv", self.sub, self.mask, self.gbk))
    }

    pub fn mask_cds(&self) -> PathBuf {
        self.path(format!("mask_cds{}{}_{}.tsv", self.sub, self.mask, self.gbk))
    }

    pub fn variant_distribution(&self, extension: &str) -> PathBuf {
        self.path(format!("variant_distr{}{}_{}.{}", self.sub, self.mask, self.gbk, extension))
    }

    pub fn apobec_samples(&self, extension: &str) -> PathBuf {
        self.path(format!("apobec_sample{}{}.{}", self.sub, self.gbk, extension))
    }

    pub fn ns_samples(&self, extension: &str) -> PathBuf {
        self.path(format!("ns_sample{}{}.{}", self.sub, self.gbk, extension))
    }
}

fn call_columns(platform: Platform) -> Vec<&'static str> {
    if platform.uses_ivar() {
        IVAR_COLUMNS.to_vec()
    } else {
        MEDAKA_COLUMNS.to_vec()
    }
}

fn call_cells(call: &VariantCall) -> Vec<String> {
    let mut cells = vec![cell(&call.chrom), cell(&call.pos), cell(&call.ref_allele), cell(&call.alt_allele)];
    match &call.metrics {
        CallMetrics::Ivar(m) => cells.extend([
            cell(&m.ref_dp),
            cell(&m.ref_rv),
            cell(&m.ref_qual),
            cell(&m.alt_dp),
            cell(&m.alt_rv),
            cell(&m.alt_qual),
            cell(&m.alt_freq),
            cell(&m.total_dp),
            cell(&m.pval),
            pass_cell(m.pass),
            cell(&m.gff_feature),
            cell(&m.ref_codon),
            cell(&m.ref_aa),
            cell(&m.alt_codon),
            cell(&m.alt_aa),
        ]),
        CallMetrics::Medaka(m) => cells.extend([cell(&m.qual), cell(&m.filter)]),
    }
    cells
}

fn annotation_cells(annotation: &Annotation) -> Vec<String> {
    let cds = annotation.cds.as_ref();
    vec![
        cell(&annotation.apobec3),
        cell(&annotation.pattern),
        cell(&annotation.context),
        cell(&annotation.non_synonymous),
        annotation.mask.masked.to_string(),
        cell(&annotation.mask.mask_type),
        cell(&annotation.mask.source),
        cell(&cds.map(|c| c.intergenic)),
        cell(&cds.and_then(|c| c.gene.clone())),
        cell(&cds.and_then(|c| c.locus_tag.clone())),
        cell(&cds.and_then(|c| c.protein_id.clone())),
        cell(&cds.and_then(|c| c.product.clone())),
        cell(&cds.and_then(|c| c.note.clone())),
    ]
}

fn tsv_writer(path: &Path) -> Result<Writer<File>> {
    csv::WriterBuilder::new()
        .delimiter(b'\t')
        .from_path(path)
        .with_context(|| format!("Failed to create output file: {}", path.display()))
}

/// Write the annotated per-sample variant table.
pub fn write_annotated_variants(rows: &[AnnotatedVariant], platform: Platform, path: &Path) -> Result<()> {
    let mut wtr = tsv_writer(path)?;

    let mut header = call_columns(platform);
    header.push("SAMPLE");
    header.extend(ANNOTATION_COLUMNS);
    wtr.write_record(&header)?;

    for row in rows {
        let mut record = call_cells(&row.call);
        record.push(row.call.sample.clone());
        record.extend(annotation_cells(&row.annotation));
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write the population summary: the call columns with `POP_COUNT` and
/// `POP_FREQ` after the first, per-sample iVar metrics removed.
pub fn write_population_summary(rows: &[PopulationVariant], platform: Platform, path: &Path) -> Result<()> {
    let mut wtr = tsv_writer(path)?;

    let mut columns = call_columns(platform);
    if !platform.uses_ivar() {
        columns.push("SAMPLE");
    }
    columns.extend(ANNOTATION_COLUMNS);
    let keep: Vec<bool> = columns.iter().map(|c| !PER_SAMPLE_COLUMNS.contains(c)).collect();

    let select = |cells: Vec<String>| -> Vec<String> {
        cells
            .into_iter()
            .zip(&keep)
            .filter(|(_, k)| **k)
            .map(|(c, _)| c)
            .collect()
    };
    let with_population = |mut cells: Vec<String>, count: String, freq: String| {
        cells.insert(1, count);
        cells.insert(2, freq);
        cells
    };

    let header = select(columns.iter().map(|c| c.to_string()).collect());
    wtr.write_record(with_population(header, "POP_COUNT".to_string(), "POP_FREQ".to_string()))?;

    for row in rows {
        let rep = &row.representative;
        let mut cells = call_cells(&rep.call);
        if !platform.uses_ivar() {
            cells.push(rep.call.sample.clone());
        }
        cells.extend(annotation_cells(&rep.annotation));
        let record = with_population(select(cells), row.pop_count.to_string(), row.pop_freq.to_string());
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Write mask regions with the CDS features starting or ending inside them.
pub fn write_mask_cds(rows: &[MaskCdsOverlap], path: &Path) -> Result<()> {
    let mut wtr = tsv_writer(path)?;
    wtr.write_record(MASK_CDS_COLUMNS)?;

    for row in rows {
        let (region, feature) = (&row.region, &row.feature);
        wtr.write_record(&[
            cell(&region.chrom),
            region.start.to_string(),
            region.end.to_string(),
            cell(&region.annotation),
            cell(&region.source),
            cell(&feature.gene),
            cell(&feature.locus_tag),
            cell(&feature.protein_id),
            cell(&feature.product),
            cell(&feature.note),
        ])?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::CdsFeature;
    use crate::types::{Apobec3Pattern, CdsHit, IvarMetrics, MaskHit, MaskRegion, MedakaMetrics};

    fn ivar_row(sample: &str) -> AnnotatedVariant {
        AnnotatedVariant {
            call: VariantCall {
                sample: sample.to_string(),
                chrom: Some("MPXV".to_string()),
                pos: Some(42),
                ref_allele: Some("C".to_string()),
                alt_allele: Some("T".to_string()),
                metrics: CallMetrics::Ivar(IvarMetrics {
                    alt_dp: Some(120),
                    alt_freq: Some(0.75),
                    pass: Some(true),
                    ref_aa: Some("S".to_string()),
                    alt_aa: Some("L".to_string()),
                    ..IvarMetrics::default()
                }),
            },
            annotation: Annotation {
                apobec3: Some(true),
                pattern: Some(Apobec3Pattern::TcTt),
                context: Some("ACTTG".to_string()),
                non_synonymous: Some(true),
                mask: MaskHit::default(),
                cds: Some(CdsHit {
                    intergenic: false,
                    gene: Some("OPG001".to_string()),
                    ..CdsHit::default()
                }),
            },
        }
    }

    fn read_lines(path: &Path) -> Vec<Vec<String>> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| l.split('\t').map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn test_name_component() {
        assert_eq!(name_component(Path::new("/data/mpxv.mask.tsv")), "mask");
        assert_eq!(name_component(Path::new("MN908947.gbk")), "MN908947");
        assert_eq!(name_component(Path::new("plain")), "plain");
    }

    #[test]
    fn test_output_names() {
        let names = OutputNames::new(Path::new("out"), Some("high_freq"), Path::new("ref.mask.tsv"), Path::new("ref.gbk"));
        assert_eq!(names.variants(), Path::new("out/variants_high_freq_mask_ref.tsv"));
        assert_eq!(names.variants_summary(), Path::new("out/variants_summary_high_freq_mask_ref.tsv"));
        assert_eq!(names.mask_cds(), Path::new("out/mask_cds_high_freq_mask_ref.tsv"));
        assert_eq!(names.variant_distribution("png"), Path::new("out/variant_distr_high_freq_mask_ref.png"));
        assert_eq!(names.apobec_samples("svg"), Path::new("out/apobec_sample_high_freq_ref.svg"));

        let names = OutputNames::new(Path::new("."), None, Path::new("m.tsv"), Path::new("g.gbk"));
        assert_eq!(names.ns_samples("png"), Path::new("./ns_sample_g.png"));
        assert_eq!(names.variants(), Path::new("./variants_m_g.tsv"));
    }

    #[test]
    fn test_write_annotated_variants_ivar() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variants.tsv");
        let placeholder = AnnotatedVariant {
            call: VariantCall::placeholder("S2", CallMetrics::Ivar(IvarMetrics::default())),
            annotation: Annotation::default(),
        };
        write_annotated_variants(&[ivar_row("S1"), placeholder], Platform::Illumina, &path).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines.len(), 3);
        let header = &lines[0];
        assert_eq!(header.len(), 19 + 1 + 13);
        assert_eq!(header[0], "REGION");
        assert_eq!(header[19], "SAMPLE");

        let col = |name: &str| header.iter().position(|h| h == name).unwrap();
        let first = &lines[1];
        assert_eq!(first[col("POS")], "42");
        assert_eq!(first[col("PASS")], "TRUE");
        assert_eq!(first[col("PATTERN")], "TC>TT");
        assert_eq!(first[col("MASK")], "false");
        assert_eq!(first[col("INTERGENIC")], "false");
        assert_eq!(first[col("GBK_GENE")], "OPG001");

        let second = &lines[2];
        assert_eq!(second[col("SAMPLE")], "S2");
        assert_eq!(second[col("POS")], "");
        assert_eq!(second[col("APOBEC3")], "");
    }

    #[test]
    fn test_write_annotated_variants_medaka() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variants.tsv");
        let mut row = ivar_row("S1");
        row.call.metrics = CallMetrics::Medaka(MedakaMetrics {
            qual: Some(55.5),
            filter: None,
        });
        write_annotated_variants(&[row], Platform::Ont, &path).unwrap();

        let lines = read_lines(&path);
        assert_eq!(&lines[0][..7], &["CHROM", "POS", "REF", "ALT", "QUAL", "FILTER", "SAMPLE"]);
        assert_eq!(lines[1][4], "55.5");
        assert_eq!(lines[1][5], "");
        assert_eq!(lines[1].len(), lines[0].len());
    }

    #[test]
    fn test_write_population_summary_drops_sample_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.tsv");
        let rows = vec![PopulationVariant {
            pop_count: 2,
            pop_freq: 0.5,
            representative: ivar_row("S1"),
        }];
        write_population_summary(&rows, Platform::Illumina, &path).unwrap();

        let lines = read_lines(&path);
        let header = &lines[0];
        assert_eq!(&header[..5], &["REGION", "POP_COUNT", "POP_FREQ", "POS", "REF"]);
        for dropped in ["ALT_FREQ", "PASS", "PVAL", "SAMPLE", "TOTAL_DP"] {
            assert!(!header.iter().any(|h| h == dropped), "{} should be dropped", dropped);
        }
        assert!(header.iter().any(|h| h == "REF_AA"));
        assert_eq!(&lines[1][..4], &["MPXV", "2", "0.5", "42"]);
        assert_eq!(lines[1].len(), header.len());
    }

    #[test]
    fn test_write_mask_cds() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mask_cds.tsv");
        let rows = vec![MaskCdsOverlap {
            region: MaskRegion {
                chrom: None,
                start: 1,
                end: 10,
                annotation: Some("ITR".to_string()),
                source: Some("manual".to_string()),
            },
            feature: CdsFeature {
                start: 4,
                end: 30,
                    ranges: vec![(4, 30)],
                gene: Some("OPG001".to_string()),
                locus_tag: Some("L1".to_string()),
                protein_id: None,
                product: Some("protein".to_string()),
                note: None,
            },
        }];
        write_mask_cds(&rows, &path).unwrap();

        let lines = read_lines(&path);
        assert_eq!(lines[0][0], "chrom");
        assert_eq!(lines[1], vec!["", "1", "10", "ITR", "manual", "OPG001", "L1", "", "protein", ""]);
    }
}
