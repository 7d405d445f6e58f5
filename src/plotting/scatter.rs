use anyhow::Result;
use plotters::prelude::*;

use super::{COLOR_FALSE, COLOR_GRID, COLOR_MASK, COLOR_TRUE};
use crate::types::{AnnotatedVariant, MaskRegion};

/// A panel colours each call by one boolean annotation.
struct Panel {
    title: &'static str,
    hue: fn(&AnnotatedVariant) -> Option<bool>,
}

fn apobec3(row: &AnnotatedVariant) -> Option<bool> {
    row.annotation.apobec3
}

fn non_synonymous(row: &AnnotatedVariant) -> Option<bool> {
    row.annotation.non_synonymous
}

const PANELS: [Panel; 2] = [
    Panel {
        title: "APOBEC3",
        hue: apobec3,
    },
    Panel {
        title: "Non-synonymous",
        hue: non_synonymous,
    },
];

/// Draw two stacked frequency-by-position panels with masked regions shaded.
pub fn draw_variant_distribution<DB: DrawingBackend>(
    root: &DrawingArea<DB, plotters::coord::Shift>,
    rows: &[AnnotatedVariant],
    reference_length: usize,
    regions: &[MaskRegion],
    alpha: f64,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let (title_area, chart_area) = root.split_vertically(50);
    title_area.titled(
        "Variant frequency along the reference",
        ("sans-serif", 22).into_font().color(&BLACK),
    )?;
    let panel_areas = chart_area.split_evenly((PANELS.len(), 1));

    let x_max = reference_length.max(2) as f64;
    let y_max = 1.05;

    let points: Vec<(f64, f64, &AnnotatedVariant)> = rows
        .iter()
        .filter_map(|r| Some((r.call.pos? as f64, r.call.alt_freq()?, r)))
        .collect();

    for (panel, area) in PANELS.iter().zip(panel_areas.iter()) {
        let mut chart = ChartBuilder::on(area)
            .caption(panel.title, ("sans-serif", 16).into_font().color(&BLACK))
            .margin(10)
            .x_label_area_size(35)
            .y_label_area_size(55)
            .build_cartesian_2d(1.0..x_max, 0.0..y_max)?;

        chart
            .configure_mesh()
            .x_desc("Position")
            .y_desc("Variant frequency")
            .x_label_style(("sans-serif", 12))
            .y_label_style(("sans-serif", 12))
            .light_line_style(COLOR_GRID.mix(0.3))
            .draw()?;

        chart.draw_series(regions.iter().map(|region| {
            Rectangle::new(
                [(region.start as f64, 0.0), (region.end as f64, y_max)],
                COLOR_MASK.mix(0.3).filled(),
            )
        }))?;

        for (value, color, label) in [(true, COLOR_TRUE, "True"), (false, COLOR_FALSE, "False")] {
            chart
                .draw_series(
                    points
                        .iter()
                        .filter(|(_, _, row)| (panel.hue)(row) == Some(value))
                        .map(|&(x, y, _)| Circle::new((x, y), 3, color.mix(alpha).filled())),
                )?
                .label(label)
                .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
        }

        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font(("sans-serif", 12))
            .background_style(WHITE.mix(0.8))
            .border_style(BLACK)
            .draw()?;
    }

    Ok(())
}
