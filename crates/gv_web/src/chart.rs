use gv_core::{Error, Prediction, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};

pub const CHART_TITLE: &str = "Grape Leaf Disease Class Probabilities";
pub const CHART_SIZE: (u32, u32) = (720, 360);

const BAR_COLOR: RGBColor = RGBColor(99, 110, 250);

fn chart_error<E: std::fmt::Display>(e: E) -> Error {
    Error::External(anyhow::anyhow!("failed to render chart: {}", e))
}

/// Horizontal bar chart of the per-class percentages as an SVG document.
pub fn render_bar_chart(prediction: &Prediction) -> Result<String> {
    let rows = prediction.rows();
    // leave room for the value labels to the right of the longest bar
    let x_max = prediction.max_percentage().max(100.0) * 1.12;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, CHART_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(CHART_TITLE, ("sans-serif", 22))
            .margin(12)
            .x_label_area_size(40)
            .y_label_area_size(130)
            .build_cartesian_2d(0f32..x_max, (0..rows.len()).into_segmented())
            .map_err(chart_error)?;

        let label_for = |value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(i) => rows
                .get(*i)
                .map(|row| row.label.to_string())
                .unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(rows.len())
            .y_label_formatter(&label_for)
            .x_desc("Probability (%)")
            .y_desc("Class")
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(rows.iter().enumerate().map(|(i, row)| {
                let mut bar = Rectangle::new(
                    [
                        (0.0, SegmentValue::Exact(i)),
                        (row.percentage.max(0.0), SegmentValue::Exact(i + 1)),
                    ],
                    BAR_COLOR.filled(),
                );
                bar.set_margin(6, 6, 0, 0);
                bar
            }))
            .map_err(chart_error)?;

        let value_style = TextStyle::from(("sans-serif", 14).into_font())
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Center));
        chart
            .draw_series(rows.iter().enumerate().map(|(i, row)| {
                Text::new(
                    format!("{:.2}", row.percentage),
                    (row.percentage.max(0.0) + x_max * 0.01, SegmentValue::CenterOf(i)),
                    value_style.clone(),
                )
            }))
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}
