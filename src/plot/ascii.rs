//! Fixed-size character plot of one fit, for a quick look in the terminal.
//!
//! Measured points are drawn as `o` on top of the fitted curve (`-`). The
//! output is deterministic, so it can be compared verbatim in tests.

use crate::plot::PlotSeries;

const POINT: char = 'o';
const CURVE: char = '-';

/// Render `series` on a `width` x `height` character grid with a header line.
pub fn render_ascii_plot(series: &PlotSeries, width: usize, height: usize) -> String {
    let Some((x_bounds, y_bounds)) = series.bounds() else {
        return format!("Plot: {} | nothing to plot\n", series.title);
    };
    let x_range = non_degenerate(x_bounds[0], x_bounds[1]);
    let (lo, hi) = non_degenerate(y_bounds[0], y_bounds[1]);
    let margin = ((hi - lo).abs() * 0.05).max(1e-12);
    let y_range = (lo - margin, hi + margin);

    let mut canvas = Canvas::new(width.max(10), height.max(5), x_range, y_range);
    canvas.polyline(&series.fitted, CURVE);
    for &p in &series.observed {
        canvas.put(canvas.cell(p), POINT);
    }

    let mut out = format!(
        "Plot: {} ({}) | {}=[{:.3}, {:.3}] | {}=[{:.4}, {:.4}]\n",
        series.title, series.fit_label, series.x_label, x_range.0, x_range.1, series.y_label, y_range.0, y_range.1
    );
    out.push_str(&canvas.into_text());
    out
}

fn non_degenerate(min: f64, max: f64) -> (f64, f64) {
    if max > min { (min, max) } else { (min - 0.5, max + 0.5) }
}

/// Character grid with data coordinates mapped onto cells (row 0 on top).
struct Canvas {
    cols: usize,
    rows: usize,
    x_range: (f64, f64),
    y_range: (f64, f64),
    cells: Vec<char>,
}

impl Canvas {
    fn new(cols: usize, rows: usize, x_range: (f64, f64), y_range: (f64, f64)) -> Self {
        Self {
            cols,
            rows,
            x_range,
            y_range,
            cells: vec![' '; cols * rows],
        }
    }

    fn cell(&self, (x, y): (f64, f64)) -> (usize, usize) {
        let fx = ((x - self.x_range.0) / (self.x_range.1 - self.x_range.0)).clamp(0.0, 1.0);
        let fy = ((y - self.y_range.0) / (self.y_range.1 - self.y_range.0)).clamp(0.0, 1.0);
        let last_col = (self.cols - 1) as f64;
        let last_row = (self.rows - 1) as f64;
        ((fx * last_col).round() as usize, (last_row - fy * last_row).round() as usize)
    }

    fn put(&mut self, (col, row): (usize, usize), ch: char) {
        if col < self.cols && row < self.rows {
            self.cells[row * self.cols + col] = ch;
        }
    }

    fn put_if_blank(&mut self, (col, row): (usize, usize), ch: char) {
        if col < self.cols && row < self.rows && self.cells[row * self.cols + col] == ' ' {
            self.cells[row * self.cols + col] = ch;
        }
    }

    /// Connect consecutive points with straight segments.
    fn polyline(&mut self, points: &[(f64, f64)], ch: char) {
        let cells: Vec<(usize, usize)> = points.iter().map(|&p| self.cell(p)).collect();
        if let [only] = cells.as_slice() {
            self.put_if_blank(*only, ch);
        }
        for pair in cells.windows(2) {
            self.segment(pair[0], pair[1], ch);
        }
    }

    // Uniform stepping along the longer axis.
    fn segment(&mut self, from: (usize, usize), to: (usize, usize), ch: char) {
        let (c0, r0) = (from.0 as f64, from.1 as f64);
        let (dc, dr) = (to.0 as f64 - c0, to.1 as f64 - r0);
        let steps = dc.abs().max(dr.abs()) as usize;
        if steps == 0 {
            self.put_if_blank(from, ch);
            return;
        }
        for i in 0..=steps {
            let f = i as f64 / steps as f64;
            let col = (c0 + f * dc).round() as usize;
            let row = (r0 + f * dr).round() as usize;
            self.put_if_blank((col, row), ch);
        }
    }

    fn into_text(self) -> String {
        let mut text = String::with_capacity((self.cols + 1) * self.rows);
        for line in self.cells.chunks(self.cols) {
            let row: String = line.iter().collect();
            text.push_str(row.trim_end());
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(observed: Vec<(f64, f64)>, fitted: Vec<(f64, f64)>) -> PlotSeries {
        PlotSeries {
            title: "h.txt".into(),
            fit_label: "Power law".into(),
            x_label: "t [s]".into(),
            y_label: "h [um]".into(),
            observed,
            fitted,
        }
    }

    #[test]
    fn small_plot_matches_snapshot() {
        let s = series(
            vec![(1.0, 100.0), (10.0, 110.0)],
            vec![(1.0, 100.0), (10.0, 100.0)],
        );
        let text = render_ascii_plot(&s, 10, 5);
        let expected = concat!(
            "Plot: h.txt (Power law) | t [s]=[1.000, 10.000] | h [um]=[99.5000, 110.5000]\n",
            "         o\n",
            "\n",
            "\n",
            "\n",
            "o---------\n",
        );
        assert_eq!(text, expected);
    }

    #[test]
    fn diagonal_curve_is_continuous() {
        let s = series(vec![], vec![(0.0, 0.0), (9.0, 9.0)]);
        let text = render_ascii_plot(&s, 10, 10);
        let body: Vec<&str> = text.lines().skip(1).collect();
        assert_eq!(body.len(), 10);
        assert!(body.iter().all(|row| row.contains(CURVE)));
    }

    #[test]
    fn empty_series_reports_nothing_to_plot() {
        let text = render_ascii_plot(&series(vec![], vec![]), 20, 5);
        assert_eq!(text, "Plot: h.txt | nothing to plot\n");
    }

    #[test]
    fn constant_series_still_renders() {
        let s = series(vec![(2.0, 1.0)], vec![(2.0, 1.0)]);
        let text = render_ascii_plot(&s, 12, 6);
        assert!(text.contains(POINT));
        assert_eq!(text.lines().count(), 7);
    }
}
