use std::{
    io::BufWriter,
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use log::{error, info};
use tempfile::NamedTempFile;

use cstfem::{
    error::{FemError, FemResult},
    parser,
    post_processor::{self, OutputFormat},
    solver::{self, AnalysisOptions, LinearSolver, MAX_CG_ITER, TARGET_CG_RESIDUAL},
};

/// Plane stress FEM solver for constant-strain triangle meshes
#[derive(Parser)]
#[command(name = "cstfem")]
#[command(version)]
struct Cli {
    /// Model description: material, nodes, elements, constraints, loads
    input: PathBuf,

    /// File the results are written to
    output: PathBuf,

    /// Linear solver backend
    #[arg(long, value_enum, default_value_t = LinearSolver::Cholesky)]
    solver: LinearSolver,

    /// Thickness of the part
    #[arg(long, default_value_t = 1.0)]
    thickness: f64,

    /// Layout of the results file
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Relative residual at which the conjugate gradient solver stops
    #[arg(long, default_value_t = TARGET_CG_RESIDUAL)]
    cg_tolerance: f64,

    /// Iteration limit of the conjugate gradient solver
    #[arg(long, default_value_t = MAX_CG_ITER)]
    cg_max_iters: u64,

    /// Hide progress bars
    #[arg(short, long)]
    quiet: bool,
}

/// Opens a temporary file in the destination's directory. It is removed on
/// drop unless persisted over the destination.
fn staging_file(output: &Path) -> FemResult<NamedTempFile> {
    let dir = match output.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let staging = tempfile::Builder::new()
        .prefix(".cstfem")
        .tempfile_in(dir)
        .map_err(|err| {
            FemError::Output(format!(
                "Unable to create output file {}: {err}",
                output.display()
            ))
        })?;

    if let Ok(metadata) = std::fs::metadata(output) {
        // keep the mode of the file being replaced
        let _ = staging.as_file().set_permissions(metadata.permissions());
    }

    Ok(staging)
}

fn run(cli: &Cli) -> FemResult<()> {
    let mut model = parser::load_input_file(&cli.input)?;

    // fail on an unwritable destination before spending time on the solve
    let staging = staging_file(&cli.output)?;

    let options = AnalysisOptions {
        solver: cli.solver,
        thickness: cli.thickness,
        show_progress: !cli.quiet,
        cg_tolerance: cli.cg_tolerance,
        cg_max_iters: cli.cg_max_iters,
    };
    let solution = solver::run(&mut model, &options)?;

    let mut writer = BufWriter::new(staging);
    post_processor::write_results(&mut writer, cli.format, &model, &solution)?;
    let staging = writer
        .into_inner()
        .map_err(|err| FemError::Output(format!("Failed to write results: {}", err.error())))?;
    staging.persist(&cli.output).map_err(|err| {
        FemError::Output(format!(
            "Unable to write output file {}: {}",
            cli.output.display(),
            err.error
        ))
    })?;
    info!("wrote output to {}", cli.output.display());

    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}
