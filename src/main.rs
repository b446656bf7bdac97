use std::path::{Path, PathBuf};

use clap::{ArgEnum, Parser, Subcommand};
use log::{info, warn};

use rso::{read_problem, Backend, Formulation, RailSolver, Report, SolverConfig};

/// Plans locomotive, wagon and container movements over a rail network
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the model for an instance and solve it
    Solve {
        /// Instance document
        #[clap(parse(from_os_str))]
        instance: PathBuf,
        #[clap(flatten)]
        formulation: FormulationArgs,
        #[clap(long, default_value = "good-lp")]
        backend: Backend,
        /// Time limit in seconds
        #[clap(long)]
        time_limit: Option<f64>,
        /// Relative MIP gap
        #[clap(long)]
        mip_gap: Option<f64>,
        /// Show the solver log
        #[clap(long)]
        verbose: bool,
        /// Write the solution report as JSON
        #[clap(long, parse(from_os_str))]
        report: Option<PathBuf>,
    },
    /// Build the model for an instance and write it in LP format
    Write {
        #[clap(parse(from_os_str))]
        instance: PathBuf,
        #[clap(parse(from_os_str))]
        output: PathBuf,
        #[clap(flatten)]
        formulation: FormulationArgs,
    },
}

#[derive(ArgEnum, Clone, Copy, Debug)]
enum Variant {
    Cost,
    Revenue,
}

#[derive(clap::Args, Debug)]
struct FormulationArgs {
    /// Formulation file, switches below override it
    #[clap(long, parse(from_os_str))]
    formulation: Option<PathBuf>,
    /// Start from one of the preset formulations
    #[clap(long, arg_enum)]
    variant: Option<Variant>,
    /// Do not require the fleet to end where it started
    #[clap(long)]
    open: bool,
    /// Enforce delivery deadlines
    #[clap(long)]
    deadlines: bool,
    /// Add loading and unloading time to every leg
    #[clap(long)]
    handling_time: bool,
}

impl FormulationArgs {
    fn resolve(&self) -> Result<Formulation, rso::Error> {
        let mut formulation = match (&self.formulation, self.variant) {
            (Some(path), _) => Formulation::read(path)?,
            (None, Some(Variant::Revenue)) => Formulation::revenue_variant(),
            (None, _) => Formulation::cost_variant(),
        };
        if self.formulation.is_some() && self.variant.is_some() {
            warn!("--variant is ignored when a formulation file is given");
        }
        if self.open {
            formulation.cyclic_closure = false;
        }
        if self.deadlines {
            formulation.delivery_deadlines = true;
        }
        if self.handling_time {
            formulation.handling_time = true;
        }
        Ok(formulation)
    }
}

fn solve(
    instance: &Path,
    formulation: &Formulation,
    backend: Backend,
    config: &SolverConfig,
    report: Option<&Path>,
) -> Result<(), rso::Error> {
    let problem = read_problem(instance)?;
    let solver = backend.create()?;
    let outcome = RailSolver::solve(&problem, formulation, solver.as_ref(), config)?;

    let summary = Report::new(&problem, &outcome);
    print!("{}", summary);
    if let Some(path) = report {
        summary.write_json(path)?;
        info!("Report written to {}", path.display());
    }
    Ok(())
}

fn main() -> Result<(), rso::Error> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Solve {
            instance,
            formulation,
            backend,
            time_limit,
            mip_gap,
            verbose,
            report,
        } => {
            let config = SolverConfig {
                time_limit,
                mip_gap,
                verbose,
            };
            solve(
                &instance,
                &formulation.resolve()?,
                backend,
                &config,
                report.as_deref(),
            )
        }
        Command::Write {
            instance,
            output,
            formulation,
        } => {
            let problem = read_problem(&instance)?;
            RailSolver::build_and_write(&problem, &formulation.resolve()?, &output)?;
            info!("Model written to {}", output.display());
            Ok(())
        }
    }
}
