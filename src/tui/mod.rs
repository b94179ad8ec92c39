//! Ratatui-based terminal UI.
//!
//! Lists the datafiles on the left and shows the selected file's data and
//! fitted curve on the right, with the parameter line and R² below. Fits are
//! computed on demand and cached until the model choice changes.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
};

use crate::app::pipeline::{FileRun, datafile_name, run_file_with_spec};
use crate::cli::picker::pretty_path;
use crate::domain::{FitConfig, ModelSpec};
use crate::error::AppError;
use crate::plot::{PlotSeries, build_series};

mod plotters_chart;

use plotters_chart::CreepPlottersChart;

/// Start the TUI over `files`.
pub fn run(config: FitConfig, files: Vec<PathBuf>) -> Result<(), AppError> {
    let _guard = TerminalGuard::new()?;

    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal = Terminal::new(backend)
        .map_err(|e| AppError::runtime(format!("Failed to initialize terminal: {e}")))?;

    let mut app = App::new(config, files);
    app.refit_selected();
    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::runtime(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::runtime(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

/// Fit outcome of one file; errors are kept as text for display.
type CachedRun = Result<FileRun, String>;

struct App {
    config: FitConfig,
    files: Vec<PathBuf>,
    selected: usize,
    spec: ModelSpec,
    runs: Vec<Option<CachedRun>>,
    status: String,
}

impl App {
    fn new(config: FitConfig, files: Vec<PathBuf>) -> Self {
        let runs = vec![None; files.len()];
        Self {
            spec: config.model_spec,
            config,
            files,
            selected: 0,
            runs,
            status: String::new(),
        }
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::runtime(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::runtime(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::runtime(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => needs_redraw = true,
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the app should quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Up => {
                if self.selected > 0 {
                    self.selected -= 1;
                    self.refit_selected();
                }
            }
            KeyCode::Down => {
                if self.selected + 1 < self.files.len() {
                    self.selected += 1;
                    self.refit_selected();
                }
            }
            KeyCode::Char('m') => {
                self.spec = next_model_spec(self.spec);
                self.runs.iter_mut().for_each(|r| *r = None);
                self.refit_selected();
            }
            KeyCode::Char('l') => {
                self.config.plot.logscale = !self.config.plot.logscale;
                self.status = format!("logscale: {}", self.config.plot.logscale);
            }
            KeyCode::Char('r') => {
                self.runs[self.selected] = None;
                self.refit_selected();
            }
            _ => {}
        }
        false
    }

    fn refit_selected(&mut self) {
        let Some(path) = self.files.get(self.selected) else {
            self.status = "No datafiles.".to_string();
            return;
        };
        if self.runs[self.selected].is_some() {
            return;
        }
        let run = run_file_with_spec(path, &self.config, self.spec).map_err(|e| e.to_string());
        self.status = match &run {
            Ok(r) => format!("{}: {}", r.result.datafile, r.result.fit.model.name),
            Err(err) => err.clone(),
        };
        self.runs[self.selected] = Some(run);
    }

    fn current(&self) -> Option<&FileRun> {
        match self.runs.get(self.selected) {
            Some(Some(Ok(run))) => Some(run),
            _ => None,
        }
    }

    fn draw(&self, frame: &mut ratatui::Frame<'_>) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(4),
                Constraint::Min(0),
                Constraint::Length(5),
                Constraint::Length(3),
            ])
            .split(frame.area());

        self.draw_header(frame, chunks[0]);

        let body = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Length(32), Constraint::Min(0)])
            .split(chunks[1]);
        self.draw_files(frame, body[0]);
        self.draw_chart(frame, body[1]);

        self.draw_params(frame, chunks[2]);
        self.draw_footer(frame, chunks[3]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let exp = &self.config.experiment;
        let win = &self.config.window;
        let lines = vec![
            Line::from(vec![
                Span::styled("mcreep", Style::default().fg(Color::Cyan)),
                Span::raw(format!(" | {}", exp.kind.description())),
            ]),
            Line::from(Span::styled(
                format!(
                    "model: {} | window: [{}, {}] s | fit: [{}, {}] s",
                    spec_label(self.spec),
                    win.t_start,
                    win.read_end(),
                    win.fit_start(),
                    win.fit_end()
                ),
                Style::default().fg(Color::Gray),
            )),
        ];
        let p = Paragraph::new(Text::from(lines)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_files(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .files
            .iter()
            .zip(&self.runs)
            .map(|(path, run)| {
                let mark = match run {
                    Some(Ok(_)) => "+",
                    Some(Err(_)) => "!",
                    None => " ",
                };
                ListItem::new(format!("{mark} {}", pretty_path(path)))
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Datafiles").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        state.select(Some(self.selected));
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = self
            .files
            .get(self.selected)
            .map(|p| datafile_name(p))
            .unwrap_or_default();
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(run) = self.current() else {
            let msg = match self.runs.get(self.selected) {
                Some(Some(Err(err))) => err.clone(),
                _ => "No fit.".to_string(),
            };
            frame.render_widget(Paragraph::new(msg).style(Style::default().fg(Color::Yellow)), inner);
            return;
        };

        let series = chart_series(run, &self.config);
        let Some((x_bounds, y_bounds)) = padded_bounds(&series) else {
            frame.render_widget(Paragraph::new("Nothing to plot."), inner);
            return;
        };
        let widget = CreepPlottersChart {
            fitted: &series.fitted,
            observed: &series.observed,
            x_bounds,
            y_bounds,
            x_label: &series.x_label,
            y_label: &series.y_label,
        };
        frame.render_widget(widget, inner);
    }

    fn draw_params(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut lines = Vec::new();
        if let Some(run) = self.current() {
            let r = &run.result;
            lines.push(Line::from(crate::report::format_fit_line(&r.datafile, &r.fit)));
            lines.push(Line::from(Span::styled(
                format!(
                    "R2fit={} | R2all={} | RMSE={:.4e} | BIC={:.3}",
                    fmt_opt(r.r2_fit),
                    fmt_opt(r.r2_all),
                    r.fit.quality.rmse,
                    r.fit.quality.bic
                ),
                Style::default().fg(Color::Gray),
            )));
            if let Some(c) = &r.compliances {
                let cs: Vec<String> = c.c.iter().map(|v| format!("{v:.4}")).collect();
                lines.push(Line::from(Span::styled(
                    format!("C0={:.4} Cv={:.4e} C=[{}]", c.c0, c.cv, cs.join(", ")),
                    Style::default().fg(Color::Gray),
                )));
            }
        }
        let p = Paragraph::new(Text::from(lines))
            .block(Block::default().title("Fit").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "↑/↓ file  m model  l logscale  r refit  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(
                self.status.as_str(),
                Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
            ),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

fn chart_series(run: &FileRun, config: &FitConfig) -> PlotSeries {
    build_series(
        &run.result.datafile,
        &run.data,
        &run.result.fit.model,
        &config.experiment,
        &config.plot,
    )
}

fn padded_bounds(series: &PlotSeries) -> Option<([f64; 2], [f64; 2])> {
    let ([x0, x1], [y0, y1]) = series.bounds()?;
    let pad = |lo: f64, hi: f64| {
        let p = ((hi - lo).abs() * 0.05).max(1e-9);
        [lo - p, hi + p]
    };
    Some((pad(x0, x1), pad(y0, y1)))
}

fn next_model_spec(cur: ModelSpec) -> ModelSpec {
    match cur {
        ModelSpec::All => ModelSpec::PowerLaw,
        ModelSpec::PowerLaw => ModelSpec::NuttingLaw,
        ModelSpec::NuttingLaw => ModelSpec::Evp1,
        ModelSpec::Evp1 => ModelSpec::Evp2,
        ModelSpec::Evp2 => ModelSpec::Evp3,
        ModelSpec::Evp3 => ModelSpec::All,
    }
}

fn spec_label(spec: ModelSpec) -> &'static str {
    match spec.to_kind() {
        Some(kind) => kind.display_name(),
        None => "all (BIC)",
    }
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|v| format!("{v:.6}")).unwrap_or_else(|| "NaN".to_string())
}
