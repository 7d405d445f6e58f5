//! Per-variant annotation against the reference genome and the mask list.
//!
//! Each row is annotated independently from its own position and alleles, so
//! rows are processed in parallel and collected in input order.

use crate::reference::{CdsFeature, Reference};
use crate::types::{
    AnnotatedVariant, Annotation, Apobec3Pattern, CallMetrics, CdsHit, MaskHit, MaskRegion, VariantCall,
};
use colored::Colorize;
use indicatif::ProgressBar;
use rayon::prelude::*;

/// Settings for variant annotation.
#[derive(Debug, Clone)]
pub struct AnnotationConfig {
    /// Bases either side of the variant in the context string
    pub context_size: usize,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self { context_size: 5 }
    }
}

fn base_is(reference: &[u8], idx: Option<usize>, base: u8) -> bool {
    idx.and_then(|i| reference.get(i))
        .is_some_and(|b| b.to_ascii_uppercase() == base)
}

/// Classify a substitution by its APOBEC3 motif.
///
/// C>T is `TC>TT` when the preceding reference base is T; G>A is `GA>AA`
/// when the following reference base is A. `pos0` is 0-based.
pub fn classify_apobec3(reference: &[u8], pos0: usize, ref_allele: &str, alt_allele: &str) -> (bool, Apobec3Pattern) {
    let is = |allele: &str, base: &str| allele.eq_ignore_ascii_case(base);

    if is(ref_allele, "C") && is(alt_allele, "T") && base_is(reference, pos0.checked_sub(1), b'T') {
        return (true, Apobec3Pattern::TcTt);
    }
    if is(ref_allele, "G") && is(alt_allele, "A") && base_is(reference, pos0.checked_add(1), b'A') {
        return (true, Apobec3Pattern::GaAa);
    }
    (false, Apobec3Pattern::Other)
}

/// Split the window `[pos0 - size, pos0 + size + 1)` around a variant, clipped to the sequence.
fn context_parts(reference: &[u8], pos0: usize, size: usize) -> (String, String) {
    let len = reference.len();
    let start = pos0.saturating_sub(size).min(len);
    let end = pos0.saturating_add(size).saturating_add(1).min(len);
    let left = &reference[start..pos0.min(len)];
    let right = if pos0 + 1 < end {
        &reference[pos0 + 1..end]
    } else {
        &[][..]
    };
    (
        String::from_utf8_lossy(left).to_ascii_uppercase(),
        String::from_utf8_lossy(right).to_ascii_uppercase(),
    )
}

/// Reference context around a variant with the ALT allele substituted in.
pub fn context_sequence(reference: &[u8], pos0: usize, alt_allele: &str, size: usize) -> String {
    let (left, right) = context_parts(reference, pos0, size);
    format!("{}{}{}", left, alt_allele, right)
}

/// Same as [`context_sequence`] with the ALT allele highlighted for the console.
pub fn context_display(reference: &[u8], pos0: usize, alt_allele: &str, size: usize) -> String {
    let (left, right) = context_parts(reference, pos0, size);
    format!("{}{}{}", left, alt_allele.red().bold(), right)
}

/// First mask region (in file order) containing the 1-based position.
pub fn mask_hit(regions: &[MaskRegion], pos: Option<u64>) -> MaskHit {
    let pos = match pos {
        Some(p) => p,
        None => return MaskHit::default(),
    };
    match regions.iter().find(|r| r.contains(pos)) {
        Some(region) => MaskHit {
            masked: true,
            mask_type: region.annotation.clone(),
            source: region.source.clone(),
        },
        None => MaskHit::default(),
    }
}

/// First CDS containing the 1-based position; intergenic when none does.
pub fn cds_hit(features: &[CdsFeature], pos: Option<u64>) -> Option<CdsHit> {
    let pos0 = pos?.checked_sub(1)? as i64;
    let hit = match features.iter().find(|f| f.contains(pos0)) {
        Some(f) => CdsHit {
            intergenic: false,
            gene: f.gene.clone(),
            locus_tag: f.locus_tag.clone(),
            protein_id: f.protein_id.clone(),
            product: f.product.clone(),
            note: f.note.clone(),
        },
        None => CdsHit {
            intergenic: true,
            ..CdsHit::default()
        },
    };
    Some(hit)
}

/// Whether the call changes the encoded amino acid.
///
/// Only iVar reports amino acids; a call without an ALT amino acid is synonymous.
pub fn non_synonymous(call: &VariantCall) -> Option<bool> {
    if call.is_placeholder() {
        return None;
    }
    match &call.metrics {
        CallMetrics::Ivar(m) => match &m.alt_aa {
            None => Some(false),
            Some(alt_aa) => Some(m.ref_aa.as_deref() != Some(alt_aa.as_str())),
        },
        CallMetrics::Medaka(_) => None,
    }
}

/// Annotate a single call.
pub fn annotate_call(
    call: &VariantCall,
    reference: &Reference,
    regions: &[MaskRegion],
    config: &AnnotationConfig,
) -> Annotation {
    let pos = match call.pos {
        Some(p) if p > 0 => p,
        _ => return Annotation::default(),
    };
    let pos0 = (pos - 1) as usize;
    let ref_allele = call.ref_allele.as_deref().unwrap_or("");
    let alt_allele = call.alt_allele.as_deref().unwrap_or("");

    let (apobec3, pattern) = classify_apobec3(&reference.sequence, pos0, ref_allele, alt_allele);
    let context = if apobec3 {
        context_sequence(&reference.sequence, pos0, alt_allele, config.context_size)
    } else {
        String::new()
    };

    if log::log_enabled!(log::Level::Debug) {
        log::debug!(
            "Variant [{}: {}] context - REF: {} ALT: {} - CONTEXT: {} - APOBEC3: {}",
            call.sample,
            pos,
            ref_allele,
            alt_allele,
            context_display(&reference.sequence, pos0, alt_allele, config.context_size),
            apobec3
        );
    }

    Annotation {
        apobec3: Some(apobec3),
        pattern: Some(pattern),
        context: Some(context),
        non_synonymous: non_synonymous(call),
        mask: mask_hit(regions, Some(pos)),
        cds: cds_hit(&reference.cds, Some(pos)),
    }
}

/// Annotate every call, preserving input order.
pub fn annotate_variants(
    calls: Vec<VariantCall>,
    reference: &Reference,
    regions: &[MaskRegion],
    config: &AnnotationConfig,
    progress: Option<&ProgressBar>,
) -> Vec<AnnotatedVariant> {
    calls
        .into_par_iter()
        .map(|call| {
            let annotation = annotate_call(&call, reference, regions, config);
            if let Some(pb) = progress {
                pb.inc(1);
            }
            AnnotatedVariant { call, annotation }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::IvarMetrics;

    fn region(start: u64, end: u64, annotation: &str) -> MaskRegion {
        MaskRegion {
            chrom: None,
            start,
            end,
            annotation: Some(annotation.to_string()),
            source: Some("test".to_string()),
        }
    }

    fn cds(start: i64, end: i64, gene: &str) -> CdsFeature {
        CdsFeature {
            start,
            end,
            ranges: vec![(start, end)],
            gene: Some(gene.to_string()),
            locus_tag: None,
            protein_id: None,
            product: Some(format!("{} protein", gene)),
            note: None,
        }
    }

    fn ivar_call(pos: u64, r: &str, a: &str, ref_aa: Option<&str>, alt_aa: Option<&str>) -> VariantCall {
        VariantCall {
            sample: "S1".to_string(),
            chrom: Some("REF".to_string()),
            pos: Some(pos),
            ref_allele: Some(r.to_string()),
            alt_allele: Some(a.to_string()),
            metrics: CallMetrics::Ivar(IvarMetrics {
                ref_aa: ref_aa.map(str::to_string),
                alt_aa: alt_aa.map(str::to_string),
                ..IvarMetrics::default()
            }),
        }
    }

    #[test]
    fn test_apobec3_tc_to_tt() {
        // T at index 2 precedes C at index 3
        let seq = b"AATCGG";
        assert_eq!(classify_apobec3(seq, 3, "C", "T"), (true, Apobec3Pattern::TcTt));
        // lowercase reference
        assert_eq!(classify_apobec3(b"aatcgg", 3, "C", "T"), (true, Apobec3Pattern::TcTt));
        // preceding base is not T
        assert_eq!(classify_apobec3(b"AAGCGG", 3, "C", "T"), (false, Apobec3Pattern::Other));
    }

    #[test]
    fn test_apobec3_ga_to_aa() {
        let seq = b"CCGATT";
        assert_eq!(classify_apobec3(seq, 2, "G", "A"), (true, Apobec3Pattern::GaAa));
        assert_eq!(classify_apobec3(b"CCGCTT", 2, "G", "A"), (false, Apobec3Pattern::Other));
    }

    #[test]
    fn test_apobec3_other_substitutions() {
        let seq = b"TTCAAGAA";
        assert_eq!(classify_apobec3(seq, 3, "A", "G"), (false, Apobec3Pattern::Other));
        assert_eq!(classify_apobec3(seq, 2, "C", "A"), (false, Apobec3Pattern::Other));
        assert_eq!(classify_apobec3(seq, 2, "CT", "TT"), (false, Apobec3Pattern::Other));
    }

    #[test]
    fn test_apobec3_sequence_edges() {
        // no preceding base at position 0, no following base at the end
        assert_eq!(classify_apobec3(b"CAAT", 0, "C", "T"), (false, Apobec3Pattern::Other));
        assert_eq!(classify_apobec3(b"AAAG", 3, "G", "A"), (false, Apobec3Pattern::Other));
    }

    #[test]
    fn test_context_sequence_interior() {
        let seq = b"ACGTACGTACGTACG";
        assert_eq!(context_sequence(seq, 7, "A", 2), "CGAAC");
        assert_eq!(context_sequence(seq, 7, "A", 5), "GTACGAACGTA");
    }

    #[test]
    fn test_context_sequence_clipped_at_edges() {
        let seq = b"ACGTACGTAC";
        // window shrinks at the start
        assert_eq!(context_sequence(seq, 0, "T", 5), "TCGTAC");
        // and at the end
        assert_eq!(context_sequence(seq, 9, "G", 5), "ACGTAG");
        assert_eq!(context_sequence(b"acgt", 1, "T", 1), "ATG");
    }

    #[test]
    fn test_context_display_highlights_alt() {
        let seq = b"ACGTACGTACGTACG";
        let display = context_display(seq, 7, "A", 2);
        assert!(display.starts_with("CG"));
        assert!(display.ends_with("AC"));
        assert!(display.contains('A'));
        // colour codes only wrap the ALT allele
        assert_eq!(context_display(b"acgt", 0, "T", 1).chars().last(), Some('C'));
    }

    #[test]
    fn test_mask_hit_inclusive_bounds() {
        let regions = vec![region(10, 20, "ITR")];
        assert!(mask_hit(&regions, Some(10)).masked);
        assert!(mask_hit(&regions, Some(20)).masked);
        assert!(!mask_hit(&regions, Some(21)).masked);
        assert!(!mask_hit(&regions, Some(9)).masked);
        assert_eq!(mask_hit(&regions, None), MaskHit::default());
    }

    #[test]
    fn test_mask_hit_first_region_wins() {
        let regions = vec![region(1, 100, "first"), region(50, 60, "second")];
        let hit = mask_hit(&regions, Some(55));
        assert_eq!(hit.mask_type.as_deref(), Some("first"));
        assert_eq!(hit.source.as_deref(), Some("test"));
    }

    #[test]
    fn test_cds_hit() {
        let features = vec![cds(9, 20, "A"), cds(15, 30, "B")];
        // 1-based 10 is 0-based 9
        assert_eq!(cds_hit(&features, Some(10)).unwrap().gene.as_deref(), Some("A"));
        // overlapping features: first wins
        assert_eq!(cds_hit(&features, Some(18)).unwrap().gene.as_deref(), Some("A"));
        assert_eq!(cds_hit(&features, Some(21)).unwrap().gene.as_deref(), Some("B"));

        let intergenic = cds_hit(&features, Some(31)).unwrap();
        assert!(intergenic.intergenic);
        assert_eq!(intergenic.gene, None);

        assert_eq!(cds_hit(&features, None), None);
    }

    #[test]
    fn test_non_synonymous() {
        assert_eq!(non_synonymous(&ivar_call(1, "C", "T", Some("S"), Some("L"))), Some(true));
        assert_eq!(non_synonymous(&ivar_call(1, "C", "T", Some("S"), Some("S"))), Some(false));
        assert_eq!(non_synonymous(&ivar_call(1, "C", "T", None, None)), Some(false));

        let placeholder = VariantCall::placeholder("S2", CallMetrics::Ivar(IvarMetrics::default()));
        assert_eq!(non_synonymous(&placeholder), None);
    }

    #[test]
    fn test_annotate_variants_preserves_order_and_placeholders() {
        let reference = Reference {
            name: "REF".to_string(),
            sequence: b"AATCGGCCGATTAAAAAAAA".to_vec(),
            cds: vec![cds(0, 10, "G1")],
        };
        let regions = vec![region(11, 12, "low-complexity")];
        let calls = vec![
            ivar_call(4, "C", "T", Some("P"), Some("L")),
            VariantCall::placeholder("S2", CallMetrics::Ivar(IvarMetrics::default())),
            ivar_call(9, "G", "A", Some("R"), Some("R")),
            ivar_call(12, "T", "C", None, None),
        ];

        let annotated = annotate_variants(calls, &reference, &regions, &AnnotationConfig::default(), None);
        assert_eq!(annotated.len(), 4);

        let first = &annotated[0].annotation;
        assert_eq!(first.apobec3, Some(true));
        assert_eq!(first.pattern, Some(Apobec3Pattern::TcTt));
        assert_eq!(first.context.as_deref(), Some("AATTGGCCG"));
        assert_eq!(first.non_synonymous, Some(true));
        assert_eq!(first.cds.as_ref().unwrap().gene.as_deref(), Some("G1"));

        assert_eq!(annotated[1].call.sample, "S2");
        assert_eq!(annotated[1].annotation, Annotation::default());

        let third = &annotated[2].annotation;
        assert_eq!(third.pattern, Some(Apobec3Pattern::GaAa));
        assert_eq!(third.non_synonymous, Some(false));

        let fourth = &annotated[3].annotation;
        assert_eq!(fourth.apobec3, Some(false));
        assert_eq!(fourth.context.as_deref(), Some(""));
        assert!(fourth.mask.masked);
        assert!(fourth.cds.as_ref().unwrap().intergenic);
    }
}
