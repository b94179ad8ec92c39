//! Formatted terminal output and the final report.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized (tables are compared verbatim in tests)

use crate::domain::{ExperimentKind, FileResult, FitResult, ModelKind};
use crate::fit::selection::FitSelection;

/// Title of the main results table on stdout.
pub const RESULTS_TITLE: &str = "Fitting results and statistics:";
/// Title of the main results table in the report file.
pub const RESULTS_TITLE_SAVED: &str = "Fitting results & statistics:";
pub const EVP_TITLE: &str = "Final compliances and retardation times of EVP model:";

/// One-line result for a datafile, e.g. `h1.txt [C,n]:   0.8123   0.3012`.
///
/// Linear parameters use `%8.4f`, retardation times `%6.2f`; fixed
/// retardation times are not part of the list.
pub fn format_fit_line(datafile: &str, fit: &FitResult) -> String {
    let model = &fit.model;
    let fixed = model.fixed_rtimes.is_some();
    let names = model.kind.free_param_names(fixed);

    let values: Vec<String> = names
        .iter()
        .zip(&model.params)
        .map(|(name, v)| {
            if name.starts_with("tau") {
                format!("{v:6.2}")
            } else {
                format!("{v:8.4}")
            }
        })
        .collect();

    format!("{datafile} [{}]: {}", names.join(","), values.join(" "))
}

/// Covariance matrix block (rows in the order of [`format_fit_line`]).
pub fn format_covariance(cov: Option<&[Vec<f64>]>) -> String {
    let mut out = String::from("\nCovariance matrix of all parameters after fitting:\n");
    match cov {
        Some(rows) => {
            for row in rows {
                for v in row {
                    out.push_str(&format!("{v:10.6}"));
                }
                out.push('\n');
            }
        }
        None => out.push_str("(not available: too few points or singular Jacobian)\n"),
    }
    out
}

/// Experiment and model description (ends with an empty line).
pub fn describe(experiment: ExperimentKind, model: ModelKind) -> String {
    let [function, units] = model.description();
    format!("{}\n{function}\n{units}\n\n", experiment.description())
}

/// A small text table with a string index, rendered like a data frame.
#[derive(Debug, Clone, PartialEq)]
pub struct TextTable {
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<Option<f64>>)>,
}

impl TextTable {
    /// Render with `decimals` digits; missing values print as `NaN`.
    pub fn render(&self, decimals: usize) -> String {
        let cells: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|(_, vals)| {
                vals.iter()
                    .map(|v| match v {
                        Some(x) => format!("{x:.decimals$}"),
                        None => "NaN".to_string(),
                    })
                    .collect()
            })
            .collect();

        let index_w = self.rows.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
        let widths: Vec<usize> = self
            .columns
            .iter()
            .enumerate()
            .map(|(j, col)| {
                cells
                    .iter()
                    .filter_map(|r| r.get(j).map(String::len))
                    .chain(std::iter::once(col.len()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let mut out = String::new();
        out.push_str(&" ".repeat(index_w));
        for (col, w) in self.columns.iter().zip(&widths) {
            out.push_str(&format!("  {col:>w$}"));
        }
        out.push('\n');

        for ((name, _), row) in self.rows.iter().zip(&cells) {
            out.push_str(&format!("{name:<index_w$}"));
            for (cell, w) in row.iter().zip(&widths) {
                out.push_str(&format!("  {cell:>w$}"));
            }
            out.push('\n');
        }
        out
    }
}

/// Table values of one result in the order of [`ModelKind::table_columns`].
fn table_values(result: &FileResult) -> Vec<Option<f64>> {
    let model = &result.fit.model;
    let kind = model.kind;
    let mut vals: Vec<Option<f64>> = Vec::new();
    if kind.is_evp() {
        let k = kind.kv_count();
        vals.push(Some(model.constant));
        vals.extend(model.params[..2 + k].iter().map(|v| Some(*v)));
        vals.extend(model.rtimes().into_iter().map(Some));
    } else {
        vals.extend(model.params.iter().map(|v| Some(*v)));
    }
    vals.push(result.r2_fit);
    vals.push(result.r2_all);
    vals
}

/// Group results by fitted model kind, keeping first-appearance order.
pub fn group_by_model(results: &[FileResult]) -> Vec<(ModelKind, Vec<&FileResult>)> {
    let mut groups: Vec<(ModelKind, Vec<&FileResult>)> = Vec::new();
    for r in results {
        let kind = r.fit.model.kind;
        match groups.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, members)) => members.push(r),
            None => groups.push((kind, vec![r])),
        }
    }
    groups
}

/// Results table for results fitted with the same model kind.
pub fn results_table(kind: ModelKind, results: &[&FileResult]) -> TextTable {
    let mut columns = kind.table_columns();
    columns.push("R2fit".to_string());
    columns.push("R2all".to_string());
    TextTable {
        columns,
        rows: results
            .iter()
            .map(|r| (r.datafile.clone(), table_values(r)))
            .collect(),
    }
}

/// EVP compliance table; `None` for the empirical laws.
pub fn compliance_table(kind: ModelKind, results: &[&FileResult]) -> Option<TextTable> {
    if !kind.is_evp() {
        return None;
    }
    Some(TextTable {
        columns: kind.compliance_columns(),
        rows: results
            .iter()
            .map(|r| {
                let vals = match &r.compliances {
                    Some(c) => c.values().into_iter().map(Some).collect(),
                    None => vec![None; kind.compliance_columns().len()],
                };
                (r.datafile.clone(), vals)
            })
            .collect(),
    })
}

/// Summary tables printed to stdout at the end of a run (4 decimals).
pub fn format_results(results: &[FileResult]) -> String {
    let mut out = String::new();
    for (kind, group) in group_by_model(results) {
        out.push_str(&format!("\n{RESULTS_TITLE}\n\n"));
        out.push_str(&results_table(kind, &group).render(4));
        if let Some(table) = compliance_table(kind, &group) {
            out.push_str(&format!("\n{EVP_TITLE}\n\n"));
            out.push_str(&table.render(4));
        }
    }
    out
}

/// Text of the final report file (6 decimals).
///
/// `generated` is a timestamp written into the header line.
pub fn final_report(experiment: ExperimentKind, results: &[FileResult], generated: &str) -> String {
    let mut out = format!(
        "# {} {} | {generated}\n\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );
    for (i, (kind, group)) in group_by_model(results).into_iter().enumerate() {
        if i > 0 {
            out.push_str("\n\n");
        }
        out.push_str(&describe(experiment, kind));
        out.push_str(&format!("{RESULTS_TITLE_SAVED}\n\n"));
        out.push_str(&results_table(kind, &group).render(6));
        if let Some(table) = compliance_table(kind, &group) {
            out.push_str(&format!("\n\n{EVP_TITLE}\n\n"));
            out.push_str(&table.render(6));
        }
    }
    out
}

/// Model comparison block for `--model all`.
pub fn format_model_comparison(datafile: &str, selection: &FitSelection) -> String {
    let mut out = format!("\nModel diagnostics ({datafile}):\n");
    for fit in &selection.fits {
        let chosen = if fit.model.kind == selection.best.model.kind { "*" } else { " " };
        out.push_str(&format!(
            "{chosen} {:<14} SSE={:.6e} RMSE={:.6e} BIC={:.3}\n",
            fit.model.kind.display_name(),
            fit.quality.sse,
            fit.quality.rmse,
            fit.quality.bic
        ));
    }
    for (kind, reason) in &selection.skipped {
        out.push_str(&format!("  (skipped {}) {reason}\n", kind.display_name()));
    }
    out
}
