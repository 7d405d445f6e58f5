mod bars;
mod scatter;

use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;
use std::sync::OnceLock;

use crate::summary::{Apobec3Profile, NonSynonymousProfile};
use crate::types::{AnnotatedVariant, MaskRegion};

/// Environment variable pointing at a TrueType font to use for plot text.
pub const FONT_ENV: &str = "ASSEMBLY_REPORT_FONT";

const FONT_CANDIDATES: [&str; 6] = [
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
];

static FONTS: OnceLock<Option<String>> = OnceLock::new();

fn register_system_font() -> Option<String> {
    let from_env = std::env::var(FONT_ENV).ok();
    let candidates = from_env.iter().map(String::as_str).chain(FONT_CANDIDATES);

    for path in candidates {
        let Ok(bytes) = std::fs::read(path) else {
            continue;
        };
        // register_font needs 'static data; runs once per process.
        let data: &'static [u8] = Box::leak(bytes.into_boxed_slice());
        let registered = [FontStyle::Normal, FontStyle::Bold, FontStyle::Italic]
            .into_iter()
            .all(|style| plotters::style::register_font("sans-serif", style, data).is_ok());
        if registered {
            log::debug!("Using plot font: {}", path);
            return Some(path.to_string());
        }
    }
    None
}

/// Whether a font for plot text could be registered (looked up once).
pub fn fonts_available() -> bool {
    FONTS.get_or_init(register_system_font).is_some()
}

fn ensure_fonts() -> Result<()> {
    if !fonts_available() {
        anyhow::bail!(
            "No usable TrueType font found for plot labels; set {} to a .ttf file",
            FONT_ENV
        );
    }
    Ok(())
}

/// Output format for plots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PlotFormat {
    Png,
    Svg,
}

impl PlotFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            PlotFormat::Png => "png",
            PlotFormat::Svg => "svg",
        }
    }
}

/// Configuration for plot generation.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub format: PlotFormat,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 1600,
            height: 900,
            format: PlotFormat::Png,
        }
    }
}

pub const COLOR_TRUE: RGBColor = RGBColor(160, 146, 183); // #A092B7
pub const COLOR_FALSE: RGBColor = RGBColor(81, 128, 106); // #51806a
pub const COLOR_ACCENT: RGBColor = RGBColor(214, 164, 96); // #D6A460
pub const COLOR_MASK: RGBColor = RGBColor(128, 128, 128);
pub const COLOR_GRID: RGBColor = RGBColor(200, 200, 200);

fn render_bitmap<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: Fn(&DrawingArea<BitMapBackend<'_>, Shift>) -> Result<()>,
{
    let root = BitMapBackend::new(path, size).into_drawing_area();
    draw(&root)?;
    root.present()?;
    log::info!("Plot saved to: {}", path.display());
    Ok(())
}

fn render_svg<F>(path: &Path, size: (u32, u32), draw: F) -> Result<()>
where
    F: Fn(&DrawingArea<SVGBackend<'_>, Shift>) -> Result<()>,
{
    let root = SVGBackend::new(path, size).into_drawing_area();
    draw(&root)?;
    root.present()?;
    log::info!("Plot saved to: {}", path.display());
    Ok(())
}

/// Scatter of variant frequency along the genome, coloured by APOBEC3 and by NS.
pub fn plot_variant_distribution(
    rows: &[AnnotatedVariant],
    reference_length: usize,
    regions: &[MaskRegion],
    alpha: f64,
    path: &Path,
    config: &PlotConfig,
) -> Result<()> {
    ensure_fonts()?;
    let size = (config.width, config.height);
    match config.format {
        PlotFormat::Png => render_bitmap(path, size, |root| {
            scatter::draw_variant_distribution(root, rows, reference_length, regions, alpha)
        }),
        PlotFormat::Svg => render_svg(path, size, |root| {
            scatter::draw_variant_distribution(root, rows, reference_length, regions, alpha)
        }),
    }
}

/// Per-sample motif counts and APOBEC3 share.
pub fn plot_apobec3_profiles(profiles: &[Apobec3Profile], path: &Path, config: &PlotConfig) -> Result<()> {
    if profiles.is_empty() {
        anyhow::bail!("No data to plot");
    }
    ensure_fonts()?;
    let size = (config.width, config.height / 2);
    match config.format {
        PlotFormat::Png => render_bitmap(path, size, |root| bars::draw_apobec3_profiles(root, profiles)),
        PlotFormat::Svg => render_svg(path, size, |root| bars::draw_apobec3_profiles(root, profiles)),
    }
}

/// Per-sample share of non-synonymous calls.
pub fn plot_non_synonymous_profiles(
    profiles: &[NonSynonymousProfile],
    path: &Path,
    config: &PlotConfig,
) -> Result<()> {
    if profiles.is_empty() {
        anyhow::bail!("No data to plot");
    }
    ensure_fonts()?;
    let size = (config.width / 2, config.height / 2);
    match config.format {
        PlotFormat::Png => render_bitmap(path, size, |root| bars::draw_non_synonymous_profiles(root, profiles)),
        PlotFormat::Svg => render_svg(path, size, |root| bars::draw_non_synonymous_profiles(root, profiles)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Annotation, CallMetrics, IvarMetrics, VariantCall};

    fn svg_config() -> PlotConfig {
        PlotConfig {
            width: 800,
            height: 600,
            format: PlotFormat::Svg,
        }
    }

    fn call(sample: &str, pos: u64, freq: f64, apobec3: bool) -> AnnotatedVariant {
        AnnotatedVariant {
            call: VariantCall {
                sample: sample.to_string(),
                chrom: Some("REF".to_string()),
                pos: Some(pos),
                ref_allele: Some("C".to_string()),
                alt_allele: Some("T".to_string()),
                metrics: CallMetrics::Ivar(IvarMetrics {
                    alt_freq: Some(freq),
                    ..IvarMetrics::default()
                }),
            },
            annotation: Annotation {
                apobec3: Some(apobec3),
                non_synonymous: Some(!apobec3),
                ..Annotation::default()
            },
        }
    }

    fn assert_svg(path: &Path) {
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("<svg"), "{} is not an SVG", path.display());
    }

    #[test]
    fn test_variant_distribution_svg() {
        if !fonts_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("distribution.svg");
        let rows = vec![call("S1", 10, 0.2, true), call("S2", 25, 0.9, false)];
        let regions = vec![MaskRegion {
            chrom: None,
            start: 30,
            end: 35,
            annotation: Some("repeat".to_string()),
            source: None,
        }];

        plot_variant_distribution(&rows, 40, &regions, 0.3, &path, &svg_config()).unwrap();
        assert_svg(&path);
    }

    #[test]
    fn test_profile_bars_svg() {
        if !fonts_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let apobec3 = vec![Apobec3Profile {
            sample: "S1".to_string(),
            ga_aa: 2,
            tc_tt: 1,
            other: 1,
            apobec3_percent: 75.0,
            other_percent: 25.0,
        }];
        let ns = vec![NonSynonymousProfile {
            sample: "S1".to_string(),
            ns_percent: 40.0,
            synonymous_percent: 60.0,
        }];

        let apobec3_path = dir.path().join("apobec3.svg");
        plot_apobec3_profiles(&apobec3, &apobec3_path, &svg_config()).unwrap();
        assert_svg(&apobec3_path);

        let ns_path = dir.path().join("ns.svg");
        plot_non_synonymous_profiles(&ns, &ns_path, &svg_config()).unwrap();
        assert_svg(&ns_path);
    }

    #[test]
    fn test_font_lookup_is_cached() {
        assert_eq!(ensure_fonts().is_ok(), fonts_available());
        assert_eq!(fonts_available(), fonts_available());
    }

    #[test]
    fn test_empty_profiles_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(plot_apobec3_profiles(&[], &dir.path().join("a.svg"), &svg_config()).is_err());
        assert!(plot_non_synonymous_profiles(&[], &dir.path().join("b.svg"), &svg_config()).is_err());
    }
}
