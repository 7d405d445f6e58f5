use crate::error::ReportError;
use crate::types::{AnnotatedVariant, VariantCall};
use anyhow::Result;
use std::collections::HashSet;
use std::fmt;

/// One `frequency:depth` step of a [`ThresholdLadder`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Threshold {
    pub max_freq: f64,
    pub min_depth: u64,
}

/// Ordered low-frequency filter steps.
///
/// Parsed from `"<freq>:<depth>[-<freq>:<depth>...]"`. At each step a call
/// with ALT frequency at or below `max_freq` needs at least `min_depth`
/// ALT-supporting reads to survive.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdLadder {
    steps: Vec<Threshold>,
}

impl ThresholdLadder {
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || ReportError::Threshold(text.to_string());

        let mut steps = Vec::new();
        for step in text.trim().split('-') {
            let (freq, depth) = step.split_once(':').ok_or_else(invalid)?;
            let max_freq: f64 = freq.trim().parse().map_err(|_| invalid())?;
            let min_depth: u64 = depth.trim().parse().map_err(|_| invalid())?;
            if !max_freq.is_finite() || max_freq < 0.0 {
                return Err(invalid().into());
            }
            steps.push(Threshold { max_freq, min_depth });
        }

        steps.sort_by(|a, b| a.max_freq.total_cmp(&b.max_freq));
        Ok(Self { steps })
    }

    pub fn steps(&self) -> &[Threshold] {
        &self.steps
    }

    fn drops(&self, row: &AnnotatedVariant) -> bool {
        let (freq, depth) = match (row.call.alt_freq(), row.call.alt_depth()) {
            (Some(f), Some(d)) => (f, d),
            _ => return false,
        };
        self.steps
            .iter()
            .any(|t| freq <= t.max_freq && depth < t.min_depth)
    }

    /// Apply each step in ascending frequency order.
    pub fn apply(&self, rows: Vec<AnnotatedVariant>) -> Vec<AnnotatedVariant> {
        let before = rows.len();
        let kept: Vec<AnnotatedVariant> = rows.into_iter().filter(|r| !self.drops(r)).collect();
        log::info!(
            "Low frequency filter ({}) removed {} of {} variants",
            self,
            before - kept.len(),
            before
        );
        kept
    }
}

impl fmt::Display for ThresholdLadder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .steps
            .iter()
            .map(|t| format!("{}:{}", t.max_freq, t.min_depth))
            .collect();
        f.write_str(&parts.join("-"))
    }
}

/// Keep iVar calls that passed the caller's significance test.
pub fn pass_only(rows: Vec<AnnotatedVariant>) -> Vec<AnnotatedVariant> {
    rows.into_iter().filter(|r| r.call.passed()).collect()
}

/// Keep calls whose sample passed assembly QC.
pub fn qc_pass(calls: Vec<VariantCall>, samples: &HashSet<String>) -> Vec<VariantCall> {
    calls.into_iter().filter(|c| samples.contains(&c.sample)).collect()
}
