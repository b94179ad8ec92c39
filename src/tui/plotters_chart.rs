//! Creep chart widget for Ratatui, drawn with Plotters through
//! `plotters-ratatui-backend`.

use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Smallest area the chart is drawn in.
const MIN_SIZE: (u16, u16) = (24, 8);

/// Measured points plus fitted curve, with precomputed bounds.
pub struct CreepPlottersChart<'a> {
    pub fitted: &'a [(f64, f64)],
    pub observed: &'a [(f64, f64)],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub x_label: &'a str,
    pub y_label: &'a str,
}

impl CreepPlottersChart<'_> {
    fn bounds_ok(&self) -> bool {
        let [x0, x1] = self.x_bounds;
        let [y0, y1] = self.y_bounds;
        [x0, x1, y0, y1].iter().all(|v| v.is_finite()) && x1 > x0 && y1 > y0
    }
}

impl Widget for CreepPlottersChart<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width < MIN_SIZE.0 || area.height < MIN_SIZE.1 {
            buf.set_string(area.x, area.y, "Terminal too small for the chart.", Style::default().fg(Color::Yellow));
            return;
        }
        if !self.bounds_ok() {
            return;
        }

        let (x_range, y_range) = (self.x_bounds[0]..self.x_bounds[1], self.y_bounds[0]..self.y_bounds[1]);
        let widget = widget_fn(move |root| {
            let text = ("sans-serif", 10).into_font().color(&WHITE);
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .x_label_area_size(3)
                .y_label_area_size(9)
                .build_cartesian_2d(x_range.clone(), y_range.clone())?;

            // Axes and ticks only; grid lines clutter at cell resolution.
            chart
                .configure_mesh()
                .disable_mesh()
                .x_desc(self.x_label)
                .y_desc(self.y_label)
                .x_labels(6)
                .y_labels(5)
                .x_label_formatter(&|t| format!("{t:.1}"))
                .y_label_formatter(&|d| format!("{d:.3}"))
                .label_style(text)
                .axis_style(&WHITE)
                .draw()?;

            // Orange points like the saved figures; the fit on top in white.
            let orange = RGBColor(255, 165, 0);
            chart.draw_series(self.observed.iter().map(|&p| Pixel::new(p, orange)))?;
            chart.draw_series(LineSeries::new(self.fitted.iter().copied(), &WHITE))?;
            Ok(())
        });

        widget.render(area, buf);
    }
}
