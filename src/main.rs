use std::{
    fs::read_to_string,
    path::{Path, PathBuf},
    process::ExitCode,
    rc::Rc,
};

use anyhow::{Context, Result};
use clap::Parser;
use log::LevelFilter;

use probcheck::{
    diagnostics::diagnostics::Diagnostic,
    display_error,
    lexer::lexer::tokenize,
    parser::parser::parse,
    type_checker::{
        config::CheckConfig,
        modules::{MemoryModuleCache, ModuleCache},
        type_checker::{check_with, CheckContext},
    },
};

/// Probabilistic static type checker.
///
/// Files are checked in the order given; each one can import the files
/// before it by module path.
#[derive(Parser, Debug)]
#[command(name = "probcheck")]
#[command(version = "0.1.0")]
#[command(about = "Structural, probabilistic type checker")]
struct Cli {
    /// Source files to check
    #[arg(value_name = "FILES", required = true)]
    files: Vec<PathBuf>,

    /// JSON file with checker settings
    #[arg(long, value_name = "JSON")]
    config: Option<PathBuf>,

    /// Drop attribute errors
    #[arg(long)]
    suppress_attribute_errors: bool,

    /// Print diagnostics as JSON lines
    #[arg(long)]
    json: bool,

    /// More log output (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Off,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn load_config(cli: &Cli) -> Result<CheckConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
            CheckConfig::from_json(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => CheckConfig::default(),
    };
    if cli.suppress_attribute_errors {
        config.suppress_attribute_errors = true;
    }
    Ok(config)
}

/// `./pkg/lib.py` -> `pkg/lib`.
fn module_key(path: &Path) -> String {
    let without_extension = path.with_extension("");
    let key = without_extension.to_string_lossy().replace('\\', "/");
    key.trim_start_matches("./").to_string()
}

fn print_diagnostic(diagnostic: &Diagnostic, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(diagnostic)?);
    } else {
        println!("{}", diagnostic);
    }
    Ok(())
}

/// Checks one file. Returns whether it produced any diagnostic or error.
fn check_file(path: &Path, cli: &Cli, config: &CheckConfig, modules: &mut MemoryModuleCache) -> Result<bool> {
    let source = read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    let file_name = path.to_string_lossy().to_string();

    let tokens = match tokenize(source.clone(), Some(file_name.clone())) {
        Ok(tokens) => tokens,
        Err(error) => {
            display_error(&error, path, &source);
            return Ok(true);
        }
    };
    let module = match parse(tokens, Rc::new(file_name.clone())).1 {
        Ok(module) => module,
        Err(error) => {
            display_error(&error, path, &source);
            return Ok(true);
        }
    };

    let mut diagnostics: Vec<Diagnostic> = vec![];
    let table = check_with(
        &module,
        None,
        &file_name,
        CheckContext {
            sink: &mut diagnostics,
            modules: &mut *modules,
            hints: None,
            config: config.clone(),
        },
    );
    log::info!("{}: {} names, {} diagnostics", file_name, table.len(), diagnostics.len());
    modules.store(&module_key(path), table);

    for diagnostic in &diagnostics {
        print_diagnostic(diagnostic, cli.json)?;
    }
    Ok(!diagnostics.is_empty())
}

fn run(cli: &Cli) -> Result<bool> {
    let config = load_config(cli)?;
    let mut modules = MemoryModuleCache::new();
    let mut failed = false;
    for path in &cli.files {
        failed |= check_file(path, cli, &config, &mut modules)?;
    }
    Ok(failed)
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .filter_level(level(cli.verbose))
        .parse_default_env()
        .init();

    match run(&cli) {
        Ok(false) => ExitCode::SUCCESS,
        Ok(true) => ExitCode::FAILURE,
        Err(error) => {
            eprintln!("Error: {:#}", error);
            ExitCode::FAILURE
        }
    }
}
