//! # taf-cli
//!
//! Command-line front end for checking taf test scripts.
//!
//! `taf check` compiles every script it is given and reports the first error of
//! each failing file; `taf tokens` and `taf ast` dump the intermediate stages as JSON.

mod config;
mod errors;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use taf_syntax::{compile_batch, compile_with, tokens_with};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::Config;

#[derive(Parser)]
#[command(name = "taf")]
#[command(about = "Validate taf test scripts", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Indentation unit in spaces (overrides taf.toml)
    #[arg(long, global = true)]
    indent: Option<usize>,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    /// Log each stage to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check scripts for grammar errors")]
    Check {
        /// Script files or directories containing *.yaml / *.yml scripts
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    #[command(about = "Print the token stream of a script as JSON")]
    Tokens { file: PathBuf },
    #[command(about = "Print the syntax tree of a script as JSON")]
    Ast { file: PathBuf },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let cwd = std::env::current_dir().context("Failed to determine working directory")?;
    let mut config = Config::load(&cwd)?;
    config.merge_cli_args(cli.indent, cli.no_color, cli.verbose);
    if config.indent_unit == 0 {
        bail!("--indent must be at least 1");
    }

    init_tracing(config.verbose);
    if !config.colored {
        colored::control::set_override(false);
    }
    debug!(indent_unit = config.indent_unit, "configuration loaded");

    let ok = match cli.command {
        Commands::Check { paths } => check(&paths, &config)?,
        Commands::Tokens { file } => dump_tokens(&file, &config)?,
        Commands::Ast { file } => dump_ast(&file, &config)?,
    };

    if !ok {
        std::process::exit(1);
    }
    Ok(())
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn check(paths: &[PathBuf], config: &Config) -> Result<bool> {
    let files = expand_paths(paths)?;
    if files.is_empty() {
        bail!("No *.yaml or *.yml scripts found");
    }
    info!(count = files.len(), "checking scripts");

    let results = compile_batch(&files, &config.lexer());
    let mut failed = 0;

    for (path, result) in results {
        match result {
            Ok(_) => println!("{} {}", "ok".green().bold(), path.display()),
            Err(err) => {
                failed += 1;
                let source = fs::read_to_string(&path).ok();
                errors::display(&err, source.as_deref());
            }
        }
    }

    if failed > 0 {
        eprintln!(
            "{}",
            format!("{} of {} scripts failed", failed, files.len()).red().bold()
        );
    }
    Ok(failed == 0)
}

fn dump_tokens(file: &Path, config: &Config) -> Result<bool> {
    let source = read(file)?;
    match tokens_with(&source, &config.lexer()) {
        Ok(tokens) => {
            println!("{}", serde_json::to_string_pretty(&tokens)?);
            Ok(true)
        }
        Err(err) => {
            errors::display(&err.with_path(file), Some(&source));
            Ok(false)
        }
    }
}

fn dump_ast(file: &Path, config: &Config) -> Result<bool> {
    let source = read(file)?;
    match compile_with(&source, &config.lexer()) {
        Ok(script) => {
            println!("{}", serde_json::to_string_pretty(&script)?);
            Ok(true)
        }
        Err(err) => {
            errors::display(&err.with_path(file), Some(&source));
            Ok(false)
        }
    }
}

fn read(file: &Path) -> Result<String> {
    fs::read_to_string(file).with_context(|| format!("Failed to read script {}", file.display()))
}

fn is_script(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("yaml") | Some("yml")
    )
}

/// Replaces each directory with its script files, sorted by name. Files are kept as given.
fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for path in paths {
        if path.is_dir() {
            let mut found = Vec::new();
            for entry in fs::read_dir(path)
                .with_context(|| format!("Failed to read directory {}", path.display()))?
            {
                let entry_path = entry?.path();
                if entry_path.is_file() && is_script(&entry_path) {
                    found.push(entry_path);
                }
            }
            found.sort();
            files.extend(found);
        } else {
            files.push(path.clone());
        }
    }

    Ok(files)
}
