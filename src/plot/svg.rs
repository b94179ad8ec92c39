//! SVG figure of one fit, rendered with Plotters.
//!
//! Layout: measured curve as an orange line, fitted model as a black line
//! labelled with the model name, light mesh and a legend in the lower right.

use std::path::Path;

use plotters::prelude::*;

use crate::error::AppError;
use crate::plot::PlotSeries;

/// Write the figure of `series` to an SVG file of `size` pixels.
pub fn write_svg(path: &Path, series: &PlotSeries, size: (u32, u32)) -> Result<(), AppError> {
    let Some((x_bounds, y_bounds)) = series.bounds() else {
        return Err(AppError::runtime(format!(
            "Nothing to plot for '{}' (no finite points).",
            series.title
        )));
    };
    let (x0, x1) = pad(x_bounds[0], x_bounds[1]);
    let (y0, y1) = pad(y_bounds[0], y_bounds[1]);

    draw(path, series, size, (x0, x1), (y0, y1))
        .map_err(|e| AppError::runtime(format!("Failed to render SVG '{}': {e}", path.display())))
}

fn draw(
    path: &Path,
    series: &PlotSeries,
    size: (u32, u32),
    (x0, x1): (f64, f64),
    (y0, y1): (f64, f64),
) -> Result<(), Box<dyn std::error::Error>> {
    let root = SVGBackend::new(path, size).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&series.title, ("sans-serif", 18))
        .margin(12)
        .set_label_area_size(LabelAreaPosition::Left, 60)
        .set_label_area_size(LabelAreaPosition::Bottom, 40)
        .build_cartesian_2d(x0..x1, y0..y1)?;

    chart
        .configure_mesh()
        .x_desc(series.x_label.as_str())
        .y_desc(series.y_label.as_str())
        .light_line_style(&RGBColor(235, 235, 235))
        .draw()?;

    let orange = RGBColor(255, 165, 0);
    if !series.observed.is_empty() {
        chart
            .draw_series(LineSeries::new(
                series.observed.iter().copied(),
                orange.stroke_width(3),
            ))?
            .label("experiment")
            .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], orange.stroke_width(3)));
    }

    chart
        .draw_series(LineSeries::new(series.fitted.iter().copied(), BLACK.stroke_width(1)))?
        .label(series.fit_label.as_str())
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLACK));

    chart
        .configure_series_labels()
        .position(SeriesLabelPosition::LowerRight)
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;

    root.present()?;
    Ok(())
}

fn pad(min: f64, max: f64) -> (f64, f64) {
    if max > min {
        let p = (max - min) * 0.03;
        (min - p, max + p)
    } else {
        (min - 0.5, max + 0.5)
    }
}
