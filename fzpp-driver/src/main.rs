//! Fuzzy Preprocessor Driver
//!
//! Command-line front end over `fzpp-preprocessor`. Validates its inputs up
//! front and exits with status 1 on any usage error; preprocessing
//! diagnostics are printed but never affect the exit status, so a batch run
//! always produces output for every readable file.

use clap::Parser;
use fzpp_preprocessor::include::{FileLoader, IncludePolicy};
use fzpp_preprocessor::Preprocessor;
use log::info;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

#[derive(Parser, Debug)]
#[command(name = "fzpp")]
#[command(about = "Standalone C preprocessor")]
#[command(version = "0.1.0")]
struct Cli {
    /// Source file to preprocess (repeatable)
    #[arg(short = 'f', long = "file", value_name = "FILE", required = true)]
    files: Vec<PathBuf>,

    /// Directory the preprocessed files are written into
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Directory to search for angle-bracket includes (repeatable)
    #[arg(short = 'I', value_name = "DIR")]
    include_paths: Vec<PathBuf>,

    /// File to process before each source file (repeatable)
    #[arg(long = "include", value_name = "FILE")]
    include_files: Vec<PathBuf>,

    /// Predefine a macro, as NAME or NAME=VALUE (repeatable)
    #[arg(short = 'D', long = "define", value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Undefine a macro and ignore later #defines of it (repeatable)
    #[arg(short = 'U', long = "undefine", value_name = "NAME")]
    undefines: Vec<String>,

    /// Keep comments in the output instead of stripping them
    #[arg(long)]
    keep_comments: bool,

    /// Emit #line markers at include boundaries and large elisions
    #[arg(long)]
    line_markers: bool,

    /// Reuse tokenized headers when the same path is included again
    #[arg(long)]
    cache_includes: bool,

    /// Print every diagnostic and a per-file summary to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Error)]
enum CliError {
    #[error("input file not found or not a regular file: {0}")]
    MissingInput(PathBuf),
    #[error("forced include not found or not a regular file: {0}")]
    MissingForcedInclude(PathBuf),
    #[error("include path is not a directory: {0}")]
    BadIncludeDir(PathBuf),
    #[error("output path exists and is not a directory: {0}")]
    OutputNotADirectory(PathBuf),
    #[error("path may not contain '..' components: {0}")]
    ParentTraversal(PathBuf),
}

fn main() {
    env_logger::init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            // Usage problems exit 1, like every other validation failure.
            let _ = e.print();
            std::process::exit(1);
        }
    };

    if let Err(e) = validate(&cli) {
        eprintln!("fzpp: error: {}", e);
        std::process::exit(1);
    }
    if let Err(e) = run(&cli) {
        eprintln!("fzpp: error: {}", e);
        std::process::exit(1);
    }
}

fn validate(cli: &Cli) -> Result<(), CliError> {
    let all_paths = cli
        .files
        .iter()
        .chain(cli.include_files.iter())
        .chain(cli.include_paths.iter())
        .chain(std::iter::once(&cli.output));
    for path in all_paths {
        if has_parent_component(path) {
            return Err(CliError::ParentTraversal(path.clone()));
        }
    }
    for file in &cli.files {
        if !file.is_file() {
            return Err(CliError::MissingInput(file.clone()));
        }
    }
    for file in &cli.include_files {
        if !file.is_file() {
            return Err(CliError::MissingForcedInclude(file.clone()));
        }
    }
    for dir in &cli.include_paths {
        if !dir.is_dir() {
            return Err(CliError::BadIncludeDir(dir.clone()));
        }
    }
    if cli.output.exists() && !cli.output.is_dir() {
        return Err(CliError::OutputNotADirectory(cli.output.clone()));
    }
    Ok(())
}

fn run(cli: &Cli) -> Result<(), io::Error> {
    let preprocessor = build_preprocessor(cli);
    let loader = FsLoader;
    fs::create_dir_all(&cli.output)?;

    for file in &cli.files {
        let source = fs::read_to_string(file)?;
        let result = preprocessor.preprocess(&source, file, &loader);

        let errors = result.diagnostics.iter().filter(|d| d.kind.is_error()).count();
        if cli.verbose {
            for diagnostic in &result.diagnostics {
                eprintln!("{}", diagnostic);
            }
            eprintln!(
                "fzpp: {}: {} diagnostic{}, {} error{}",
                file.display(),
                result.diagnostics.len(),
                if result.diagnostics.len() == 1 { "" } else { "s" },
                errors,
                if errors == 1 { "" } else { "s" },
            );
        }
        info!("{}: {} diagnostics", file.display(), result.diagnostics.len());

        let dest = cli.output.join(relativize(file));
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&dest, &result.text)?;
    }
    Ok(())
}

fn build_preprocessor(cli: &Cli) -> Preprocessor {
    let mut pp = Preprocessor::new();
    for dir in &cli.include_paths {
        pp.add_include_dir(dir.clone());
    }
    for file in &cli.include_files {
        pp.add_force_include(file.clone());
    }
    for spec in &cli.defines {
        let (name, value) = split_define(spec);
        pp.define(name, value);
    }
    for name in &cli.undefines {
        pp.undefine(name.clone());
    }
    pp.set_keep_comments(cli.keep_comments);
    pp.set_line_markers(cli.line_markers);
    if cli.cache_includes {
        pp.set_include_policy(IncludePolicy::CacheByPath);
    }
    pp
}

/// Split a `-D` operand into name and optional value.
fn split_define(spec: &str) -> (String, Option<String>) {
    match spec.split_once('=') {
        Some((name, value)) => (name.to_string(), Some(value.to_string())),
        None => (spec.to_string(), None),
    }
}

fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| c == Component::ParentDir)
}

/// Reduce an input path to the part mirrored under the output directory:
/// root and drive prefixes drop, normal components stay.
fn relativize(path: &Path) -> PathBuf {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part),
            _ => None,
        })
        .collect()
}

/// [`FileLoader`] over the real filesystem.
struct FsLoader;

impl FileLoader for FsLoader {
    fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    fn load(&self, path: &Path) -> io::Result<String> {
        fs::read_to_string(path)
    }
}
