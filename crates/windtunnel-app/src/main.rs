//! Windtunnel Application
//!
//! Command-line entry point for rotating-body wind-tunnel runs.
//!
//! # Usage
//!
//! ```bash
//! # Write a starting configuration
//! windtunnel init-config run.json
//!
//! # Show the derived lattice parameters
//! windtunnel units --config run.json
//!
//! # Dry run against the synthetic backend
//! windtunnel run --config run.json --name pitch_90
//!
//! # Steady-state coefficients of a finished run
//! windtunnel summarize export/pitch_90/data/FP16C --fraction 0.2
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use windtunnel_core::config::{RotationConfig, RunConfig};
use windtunnel_core::units::Quantity;
use windtunnel_driver::output::default_run_name;
use windtunnel_driver::summary::DEFAULT_TAIL_FRACTION;
use windtunnel_driver::{read_config, CoefficientTable, RunDirectory, SimulationLoop};

/// Windtunnel Application
#[derive(Parser, Debug)]
#[command(name = "windtunnel")]
#[command(author, version, about = "Rotating-body wind-tunnel runs on a lattice solver", long_about = None)]
struct Cli {
    /// Logging verbosity level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Execute a run
    Run {
        /// JSON run configuration (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Solver backend
        #[arg(short, long, default_value = "synthetic")]
        backend: String,

        /// Export root directory
        #[arg(short, long, default_value = "export")]
        export: PathBuf,

        /// Run name (defaults to run_<unix seconds>)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the derived simulation-unit parameters
    Units {
        /// JSON run configuration (defaults when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Average recorded coefficients over the end of a run
    Summarize {
        /// Directory holding forces.dat and torques.dat
        data_dir: PathBuf,

        /// Share of the simulated time to average
        #[arg(short, long, default_value_t = DEFAULT_TAIL_FRACTION)]
        fraction: f64,
    },

    /// Write a configuration file with default values
    InitConfig {
        /// Output path
        path: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Windtunnel v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Run {
            config,
            backend,
            export,
            name,
        } => run(config.as_deref(), &backend, &export, name)?,
        Commands::Units { config } => print_units(config.as_deref())?,
        Commands::Summarize { data_dir, fraction } => summarize(&data_dir, fraction)?,
        Commands::InitConfig { path } => init_config(&path)?,
    }

    Ok(())
}

fn load(config: Option<&Path>) -> anyhow::Result<RunConfig> {
    match config {
        Some(path) => Ok(read_config(path)?),
        None => {
            info!("No configuration given, using defaults");
            Ok(RunConfig::default())
        }
    }
}

/// Execute a run on the selected backend
fn run(
    config: Option<&Path>,
    backend: &str,
    export: &Path,
    name: Option<String>,
) -> anyhow::Result<()> {
    let config = load(config)?;
    let sim = SimulationLoop::new(config.clone())?;
    let name = name.unwrap_or_else(default_run_name);

    match backend {
        "synthetic" => run_synthetic(&sim, export, &name),
        other => anyhow::bail!(
            "Unknown backend '{other}'. Available: synthetic \
             (lattice solvers plug in through windtunnel_driver::collab::Solver)"
        ),
    }
}

fn run_synthetic(sim: &SimulationLoop, export: &Path, name: &str) -> anyhow::Result<()> {
    #[cfg(feature = "synthetic")]
    {
        use windtunnel_driver::collab::MeshSource;
        use windtunnel_driver::synthetic::{
            BoxMeshSource, SyntheticRenderer, SyntheticSolver,
        };

        let config = sim.config();
        let dirs = RunDirectory::create(export, name, config)?;
        dirs.write_config(config)?;

        let mut mesh = BoxMeshSource::default().load(&config.body.mesh)?;
        let mut solver = SyntheticSolver::new(sim.plan().grid);
        let mut renderer = SyntheticRenderer::new();

        warn!("Synthetic backend: coefficients are placeholders, not flow results");
        let report = sim
            .run(&mut solver, &mut mesh, &mut renderer, &dirs)
            .with_context(|| format!("run '{name}' failed"))?;

        println!("{}", serde_json::to_string_pretty(&report)?);
        info!("Results in {}", dirs.root().display());
        Ok(())
    }

    #[cfg(not(feature = "synthetic"))]
    {
        let _ = (sim, export, name);
        anyhow::bail!(
            "Synthetic backend not enabled. Rebuild with --features synthetic:\n\
             cargo run -p windtunnel-app --features synthetic"
        );
    }
}

/// Print the unit system and run plan
fn print_units(config: Option<&Path>) -> anyhow::Result<()> {
    let config = load(config)?;
    let plan = config.plan()?;

    println!("Reynolds number      {:.0}", plan.reynolds);
    println!(
        "Grid                 {}x{}x{} ({:.0} MiB, {})",
        plan.grid.x,
        plan.grid.y,
        plan.grid.z,
        plan.grid.memory_mb(config.lattice.precision),
        config.lattice.precision.label()
    );
    println!("Body length          {:.2} cells", plan.sim_length);
    println!("Viscosity            {:.6e}", plan.sim_viscosity);
    println!("Total steps          {}", plan.total_steps);
    println!();
    println!("One simulation unit of:");
    for quantity in Quantity::ALL {
        println!(
            "  {:<20} {:.6e} {}",
            quantity.name(),
            plan.units.scale(quantity),
            quantity.si_symbol()
        );
    }

    if let Some(w) = plan.scheduler.window() {
        println!();
        println!(
            "Rotation steps [{}, {}) every {}: {} revoxelizations, {:.4} rad",
            w.start(),
            w.end(),
            w.cadence(),
            w.total_triggers(),
            w.total_angle()
        );
    }
    if let Some(clock) = plan.sampler.frame_clock() {
        println!(
            "Frames               {} every {:.2} steps",
            clock.frame_count(),
            clock.spacing()
        );
    }
    Ok(())
}

/// Print steady-state means of forces.dat and torques.dat
fn summarize(data_dir: &Path, fraction: f64) -> anyhow::Result<()> {
    let files = [
        ("forces.dat", ["CdA", "ClA", "CsA"]),
        ("torques.dat", ["CrAl", "CpAl", "CyAl"]),
    ];

    for (file, columns) in files {
        let path = data_dir.join(file);
        if !path.exists() {
            warn!("{} not found, skipping", path.display());
            continue;
        }
        let table = CoefficientTable::read(&path)?;
        let Some(steady) = table.steady_state(fraction) else {
            warn!("{}: no rows to average", path.display());
            continue;
        };
        println!(
            "{}: {} rows from t = {:.4} s",
            table.path().display(),
            steady.rows,
            steady.from_s
        );
        for (column, mean) in columns.iter().zip(steady.mean) {
            println!("  {column:<5} {mean:.6}");
        }
    }
    Ok(())
}

/// Write a default configuration with an example rotation window
fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        anyhow::bail!("{} already exists", path.display());
    }
    let config = RunConfig::default().with_rotation(RotationConfig::new(0.2, 0.6, 1.57));
    let json = serde_json::to_string_pretty(&config)?;
    std::fs::write(path, json).with_context(|| format!("cannot write {}", path.display()))?;
    info!("Wrote {}", path.display());
    Ok(())
}
