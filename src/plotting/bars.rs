use anyhow::Result;
use plotters::coord::Shift;
use plotters::prelude::*;

use super::{COLOR_ACCENT, COLOR_FALSE, COLOR_GRID, COLOR_TRUE};
use crate::summary::{Apobec3Profile, NonSynonymousProfile};

/// One stacked layer: a value per sample.
struct Layer {
    label: &'static str,
    color: RGBColor,
    values: Vec<f64>,
}

fn draw_stacked_bars<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    title: &str,
    y_desc: &str,
    samples: &[String],
    layers: &[Layer],
    y_max: f64,
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    let n = samples.len();
    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 16).into_font().color(&BLACK))
        .margin(10)
        .x_label_area_size(70)
        .y_label_area_size(55)
        .build_cartesian_2d((0..n).into_segmented(), 0.0..y_max)?;

    chart
        .configure_mesh()
        .disable_x_mesh()
        .y_desc(y_desc)
        .x_labels(n)
        .x_label_formatter(&|x| match x {
            SegmentValue::CenterOf(i) => samples.get(*i).cloned().unwrap_or_default(),
            _ => String::new(),
        })
        .x_label_style(("sans-serif", 11).into_font().transform(FontTransform::Rotate90))
        .y_label_style(("sans-serif", 12))
        .light_line_style(COLOR_GRID.mix(0.3))
        .draw()?;

    let mut bottoms = vec![0.0; n];
    for layer in layers {
        let bars: Vec<Rectangle<(SegmentValue<usize>, f64)>> = layer
            .values
            .iter()
            .enumerate()
            .map(|(i, &value)| {
                let mut bar = Rectangle::new(
                    [
                        (SegmentValue::Exact(i), bottoms[i]),
                        (SegmentValue::Exact(i + 1), bottoms[i] + value),
                    ],
                    layer.color.filled(),
                );
                bar.set_margin(0, 0, 6, 6);
                bar
            })
            .collect();
        for (bottom, value) in bottoms.iter_mut().zip(&layer.values) {
            *bottom += value;
        }

        let color = layer.color;
        chart
            .draw_series(bars)?
            .label(layer.label)
            .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));
    }

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::UpperRight)
        .label_font(("sans-serif", 12))
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    Ok(())
}

/// Motif counts per sample (left) and APOBEC3 percentage per sample (right).
pub fn draw_apobec3_profiles<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    profiles: &[Apobec3Profile],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;
    let halves = root.split_evenly((1, 2));

    let samples: Vec<String> = profiles.iter().map(|p| p.sample.clone()).collect();
    let max_total = profiles
        .iter()
        .map(|p| (p.ga_aa + p.tc_tt + p.other) as f64)
        .fold(1.0, f64::max);

    let counts = [
        Layer {
            label: "GA>AA",
            color: COLOR_TRUE,
            values: profiles.iter().map(|p| p.ga_aa as f64).collect(),
        },
        Layer {
            label: "TC>TT",
            color: COLOR_ACCENT,
            values: profiles.iter().map(|p| p.tc_tt as f64).collect(),
        },
        Layer {
            label: "other",
            color: COLOR_FALSE,
            values: profiles.iter().map(|p| p.other as f64).collect(),
        },
    ];
    draw_stacked_bars(&halves[0], "Mutation patterns", "Variants", &samples, &counts, max_total * 1.1)?;

    let percents = [
        Layer {
            label: "Putative APOBEC3 target sites",
            color: COLOR_TRUE,
            values: profiles.iter().map(|p| p.apobec3_percent).collect(),
        },
        Layer {
            label: "Other",
            color: COLOR_FALSE,
            values: profiles.iter().map(|p| p.other_percent).collect(),
        },
    ];
    draw_stacked_bars(&halves[1], "APOBEC3 signature", "Variants (%)", &samples, &percents, 100.0)?;

    Ok(())
}

pub fn draw_non_synonymous_profiles<DB: DrawingBackend>(
    root: &DrawingArea<DB, Shift>,
    profiles: &[NonSynonymousProfile],
) -> Result<()>
where
    DB::ErrorType: 'static,
{
    root.fill(&WHITE)?;

    let samples: Vec<String> = profiles.iter().map(|p| p.sample.clone()).collect();
    let layers = [
        Layer {
            label: "Non-synonymous",
            color: COLOR_TRUE,
            values: profiles.iter().map(|p| p.ns_percent).collect(),
        },
        Layer {
            label: "Synonymous",
            color: COLOR_FALSE,
            values: profiles.iter().map(|p| p.synonymous_percent).collect(),
        },
    ];
    draw_stacked_bars(root, "Amino acid changes", "Variants (%)", &samples, &layers, 100.0)
}
