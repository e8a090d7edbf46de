//! Run directory layout and coefficient files.
//!
//! ```text
//! <export>/<run name>/
//! ├── config.json            resolved run configuration
//! ├── data/<precision>/
//! │   ├── forces.dat         step, time, CdA, ClA, CsA
//! │   └── torques.dat        step, time, CrAl, CpAl, CyAl
//! └── png/                   frames (visual output only)
//! ```
//!
//! Coefficient files are tab separated with a single `#` header line. Every row
//! is flushed as soon as it is written, so a run that fails part way leaves a
//! readable record of everything before the failure.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use windtunnel_core::config::RunConfig;

use crate::error::{DriverError, DriverResult};

/// Header of `forces.dat`.
pub const FORCES_HEADER: &str = "#      t\t      CdA\t      ClA\t      CsA\n";

/// Header of `torques.dat`.
pub const TORQUES_HEADER: &str = "#      t\t     CrAl\t     CpAl\t     CyAl\n";

/// One row of a coefficient file: step, time and three values at 6 digits.
#[must_use]
pub fn format_row(step: u64, time_s: f64, values: [f64; 3]) -> String {
    format!(
        "{step}\t{time_s:.6}\t{:.6}\t{:.6}\t{:.6}\n",
        values[0], values[1], values[2]
    )
}

/// Default run name: `run_<unix seconds>`.
#[must_use]
pub fn default_run_name() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    format!("run_{secs}")
}

/// Read a JSON run configuration. Missing fields take their defaults.
///
/// # Errors
///
/// Returns [`DriverError::Io`] when the file cannot be read and
/// [`DriverError::ConfigFile`] when it is not a valid configuration.
pub fn read_config(path: &Path) -> DriverResult<RunConfig> {
    let text = fs::read_to_string(path).map_err(|e| DriverError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| DriverError::ConfigFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Directories of one run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunDirectory {
    root: PathBuf,
    data: PathBuf,
    frames: PathBuf,
}

impl RunDirectory {
    /// Create `<export>/<name>/data/<precision>/` and, when frames are
    /// written, `<export>/<name>/png/`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when a directory cannot be created.
    pub fn create(export: &Path, name: &str, config: &RunConfig) -> DriverResult<Self> {
        let root = export.join(name);
        let data = root
            .join("data")
            .join(config.lattice.precision.label());
        let frames = root.join("png");

        fs::create_dir_all(&data).map_err(|e| DriverError::io(&data, e))?;
        if config.output.visual_output {
            fs::create_dir_all(&frames).map_err(|e| DriverError::io(&frames, e))?;
        }

        tracing::info!("Run directory: {}", root.display());
        Ok(Self { root, data, frames })
    }

    /// Run root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of coefficient files and status snapshots.
    #[must_use]
    pub fn data(&self) -> &Path {
        &self.data
    }

    /// Directory of exported frames.
    #[must_use]
    pub fn frames(&self) -> &Path {
        &self.frames
    }

    /// Path of `forces.dat`.
    #[must_use]
    pub fn forces_path(&self) -> PathBuf {
        self.data.join("forces.dat")
    }

    /// Path of `torques.dat`.
    #[must_use]
    pub fn torques_path(&self) -> PathBuf {
        self.data.join("torques.dat")
    }

    /// Store the resolved configuration next to the data.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the file cannot be written.
    pub fn write_config(&self, config: &RunConfig) -> DriverResult<PathBuf> {
        let path = self.root.join("config.json");
        let json = serde_json::to_string_pretty(config).map_err(|e| DriverError::ConfigFile {
            path: path.clone(),
            source: e,
        })?;
        fs::write(&path, json).map_err(|e| DriverError::io(&path, e))?;
        Ok(path)
    }
}

/// Append-only coefficient file.
#[derive(Debug)]
pub struct CoefficientLog {
    path: PathBuf,
    writer: BufWriter<File>,
    rows: u64,
}

impl CoefficientLog {
    /// Create (or truncate) `path` and write `header`.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the file cannot be created.
    pub fn create(path: impl Into<PathBuf>, header: &str) -> DriverResult<Self> {
        let path = path.into();
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| DriverError::io(&path, e))?;
        let mut log = Self {
            path,
            writer: BufWriter::new(file),
            rows: 0,
        };
        log.write(header)?;
        Ok(log)
    }

    /// Append one row and flush it.
    ///
    /// # Errors
    ///
    /// Returns [`DriverError::Io`] when the row cannot be written.
    pub fn append(&mut self, step: u64, time_s: f64, values: [f64; 3]) -> DriverResult<()> {
        self.write(&format_row(step, time_s, values))?;
        self.rows += 1;
        Ok(())
    }

    /// Rows written so far, header excluded.
    #[must_use]
    pub fn rows(&self) -> u64 {
        self.rows
    }

    /// File path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&mut self, text: &str) -> DriverResult<()> {
        self.writer
            .write_all(text.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(|e| DriverError::io(&self.path, e))
    }
}
