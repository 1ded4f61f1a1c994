#![forbid(unsafe_code)]

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use miette::{Context, IntoDiagnostic};
use tracing::info;
use tracing_subscriber::EnvFilter;

use kbmc_goto::{GotoProgram, PropertySet, UnwindOptions, read_goto_binary, unwind_program};
use kbmc_irep::IrepPool;
use kbmc_kinduction::{KInduction, Verdict};
use kbmc_symex::{SimplifyingSolverFactory, SolverFactory};

mod config;
mod report;

/// Exit status for a refuted property.
const EXIT_FAILED: i32 = 10;
/// Exit status when no verdict was reached.
const EXIT_UNKNOWN: i32 = 5;

#[derive(Parser, Debug)]
#[command(name = "kbmc", version, about = "Bounded model checker with k-induction")]
struct Cli {
    /// Use this config file instead of searching for `kbmc.toml`.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Prove or refute the assertions of a goto binary.
    Verify {
        file: PathBuf,

        /// Largest bound to try. Overrides `kbmc.toml`.
        #[arg(long = "max-k")]
        max_k: Option<u32>,

        /// Check only this property (repeatable).
        #[arg(long = "property")]
        properties: Vec<String>,

        /// Run the three k-induction steps one after another.
        #[arg(long, default_value_t = false)]
        sequential: bool,

        /// Print a JSON report instead of text.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print a goto binary, optionally after unwinding its loops.
    Show {
        file: PathBuf,

        #[arg(long)]
        unwind: Option<u32>,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("KBMC_LOG").unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_program(path: &Path) -> miette::Result<GotoProgram> {
    let file = File::open(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("failed to open {}", path.display()))?;
    let program = read_goto_binary(BufReader::new(file))?;
    info!(
        input = %path.display(),
        functions = program.functions.len(),
        entry = %program.entry,
        "loaded goto binary"
    );
    Ok(program)
}

fn verify(
    cli_config: Option<&Path>,
    file: &Path,
    overrides: config::Overrides,
    properties: Vec<String>,
    json: bool,
) -> miette::Result<Verdict> {
    let program = load_program(file)?;
    let (file_config, config_path) = config::load_config(file, cli_config)?;
    let settings = file_config.resolve(&overrides);
    if let Some(p) = &config_path {
        info!(config = %p.display(), "using config");
    }

    let selected = if properties.is_empty() {
        PropertySet::All
    } else {
        PropertySet::only(properties)
    };
    let factory = Arc::new(SimplifyingSolverFactory::default());
    let solver = factory.name().to_string();

    let program = Arc::new(program);
    let checker = KInduction::new(program.clone(), Arc::new(IrepPool::new()), factory, settings.clone());
    let verdict = checker.run(&selected, settings.max_k)?;

    let report = report::VerifyReport::new(
        file.display().to_string(),
        config_path.map(|p| p.display().to_string()),
        &solver,
        &program,
        &selected,
        &settings,
        verdict.clone(),
    );
    if json {
        println!("{}", report.to_json().into_diagnostic()?);
    } else {
        print!("{}", report.render());
    }
    Ok(verdict)
}

fn show(file: &Path, bound: Option<u32>) -> miette::Result<()> {
    let mut program = load_program(file)?;
    if let Some(bound) = bound {
        program = unwind_program(&program, &UnwindOptions::new(bound))?;
    }
    print!("{program}");
    Ok(())
}

fn main() -> miette::Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.cmd {
        Cmd::Verify {
            file,
            max_k,
            properties,
            sequential,
            json,
        } => {
            let overrides = config::Overrides { max_k, sequential };
            match verify(cli.config.as_deref(), &file, overrides, properties, json)? {
                Verdict::Proved { .. } => Ok(()),
                Verdict::Refuted { .. } => process::exit(EXIT_FAILED),
                Verdict::Unknown { .. } => process::exit(EXIT_UNKNOWN),
            }
        }
        Cmd::Show { file, unwind } => show(&file, unwind),
    }
}
