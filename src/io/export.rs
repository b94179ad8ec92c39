//! Export per-point residuals to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream scripts:
//! `t_s,deformation,fitted,residual` with fitted values in deformation units.

use std::path::Path;

use crate::error::AppError;
use crate::report::ResidualRow;

/// Write per-point residuals to a CSV file.
pub fn write_residuals_csv(path: &Path, rows: &[ResidualRow]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::runtime(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| AppError::runtime(format!("Failed to write export CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::runtime(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("h.fit.csv");
        let rows = vec![
            ResidualRow { time: 1.0, deformation: 0.5, fitted: 0.4, residual: 0.1 },
            ResidualRow { time: 2.0, deformation: 0.6, fitted: 0.6, residual: 0.0 },
        ];
        write_residuals_csv(&path, &rows).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("t_s,deformation,fitted,residual"));
        assert_eq!(lines.next(), Some("1.0,0.5,0.4,0.1"));
        assert_eq!(lines.count(), 1);
    }
}
