//! Steady-state averages of recorded coefficients.
//!
//! Reads a coefficient file written by the loop and averages each column over
//! the last part of the simulated time, once the transient has washed out.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{DriverError, DriverResult};

/// Default share of the run that is averaged.
pub const DEFAULT_TAIL_FRACTION: f64 = 0.2;

/// One parsed coefficient row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    /// Simulation step.
    pub step: u64,
    /// Physical time (s).
    pub time_s: f64,
    /// The three coefficients.
    pub values: [f64; 3],
}

/// Contents of a `forces.dat` or `torques.dat` file.
#[derive(Clone, Debug, PartialEq)]
pub struct CoefficientTable {
    path: PathBuf,
    rows: Vec<CoefficientRow>,
}

/// Column averages over the tail of a run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SteadyState {
    /// Averaging starts at this time (s).
    pub from_s: f64,
    /// Rows averaged.
    pub rows: usize,
    /// Mean of each coefficient.
    pub mean: [f64; 3],
}

impl CoefficientTable {
    /// Read and parse `path`. Lines starting with `#` and blank lines are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the file cannot be read and
    /// [`DriverError::Parse`] on a malformed row.
    pub fn read(path: impl Into<PathBuf>) -> DriverResult<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path).map_err(|e| DriverError::io(&path, e))?;
        let rows = text
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with('#')
            })
            .map(|(index, line)| parse_row(line).map_err(|reason| DriverError::Parse {
                path: path.clone(),
                line: index + 1,
                reason,
            }))
            .collect::<DriverResult<Vec<_>>>()?;
        Ok(Self { path, rows })
    }

    /// Source file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All rows in file order.
    #[must_use]
    pub fn rows(&self) -> &[CoefficientRow] {
        &self.rows
    }

    /// Average every column over rows with `time ≥ (1 − fraction) · t_max`.
    ///
    /// Returns `None` for an empty table or a fraction outside `(0, 1]`.
    #[must_use]
    pub fn steady_state(&self, fraction: f64) -> Option<SteadyState> {
        if !(fraction > 0.0 && fraction <= 1.0) {
            return None;
        }
        let t_max = self.rows.iter().map(|r| r.time_s).reduce(f64::max)?;
        let from_s = (1.0 - fraction) * t_max;

        let mut sum = [0.0; 3];
        let mut rows = 0;
        for row in self.rows.iter().filter(|r| r.time_s >= from_s) {
            for (acc, v) in sum.iter_mut().zip(row.values) {
                *acc += v;
            }
            rows += 1;
        }
        (rows > 0).then(|| SteadyState {
            from_s,
            rows,
            mean: sum.map(|s| s / rows as f64),
        })
    }
}

fn parse_row(line: &str) -> Result<CoefficientRow, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
        return Err(format!("expected 5 columns, found {}", fields.len()));
    }
    let step = fields[0]
        .parse::<u64>()
        .map_err(|e| format!("step {:?}: {e}", fields[0]))?;
    let mut numbers = [0.0; 4];
    for (slot, field) in numbers.iter_mut().zip(&fields[1..]) {
        *slot = field
            .parse::<f64>()
            .map_err(|e| format!("value {field:?}: {e}"))?;
    }
    Ok(CoefficientRow {
        step,
        time_s: numbers[0],
        values: [numbers[1], numbers[2], numbers[3]],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{CoefficientLog, FORCES_HEADER};

    fn write_table(dir: &Path, rows: &[(u64, f64, [f64; 3])]) -> PathBuf {
        let path = dir.join("forces.dat");
        let mut log = CoefficientLog::create(&path, FORCES_HEADER).unwrap();
        for (step, time, values) in rows {
            log.append(*step, *time, *values).unwrap();
        }
        path
    }

    #[test]
    fn test_tail_average() {
        let tmp = tempfile::tempdir().unwrap();
        let rows: Vec<_> = (1..=10)
            .map(|i| (i, i as f64 * 0.1, [i as f64, 2.0 * i as f64, 0.5]))
            .collect();
        let path = write_table(tmp.path(), &rows);

        let table = CoefficientTable::read(&path).unwrap();
        assert_eq!(table.path(), path);
        assert_eq!(table.rows().len(), 10);

        // t ≥ 0.8 keeps rows 8, 9, 10
        let steady = table.steady_state(DEFAULT_TAIL_FRACTION).unwrap();
        assert_eq!(steady.rows, 3);
        assert!((steady.mean[0] - 9.0).abs() < 1e-9);
        assert!((steady.mean[1] - 18.0).abs() < 1e-9);
        assert!((steady.mean[2] - 0.5).abs() < 1e-12);

        let all = table.steady_state(1.0).unwrap();
        assert_eq!(all.rows, 10);
    }

    #[test]
    fn test_empty_and_bad_fraction() {
        let tmp = tempfile::tempdir().unwrap();
        let path = write_table(tmp.path(), &[]);
        let table = CoefficientTable::read(&path).unwrap();
        assert!(table.steady_state(0.2).is_none());

        let path = write_table(tmp.path(), &[(1, 0.1, [1.0, 1.0, 1.0])]);
        let table = CoefficientTable::read(&path).unwrap();
        assert!(table.steady_state(0.0).is_none());
        assert!(table.steady_state(1.5).is_none());
    }

    #[test]
    fn test_malformed_row_reports_line() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("forces.dat");
        fs::write(&path, format!("{FORCES_HEADER}1\t0.1\t1.0\t2.0\t3.0\n2\t0.2\tnan?\t2.0\t3.0\n")).unwrap();

        let err = CoefficientTable::read(&path).unwrap_err();
        assert!(matches!(err, DriverError::Parse { line: 3, .. }));
    }
}
