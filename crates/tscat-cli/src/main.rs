#![forbid(unsafe_code)]

//! `tscat` — coverage and validation tooling for Qt Linguist TS catalogs.

use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use tscat::Catalog;

#[derive(Parser)]
#[command(
    name = "tscat",
    version,
    about = "Validate, format, and report on Qt Linguist TS catalogs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a catalog and report quality warnings.
    Validate {
        /// TS file to check.
        file: PathBuf,
        /// Exit non-zero when warnings are found, not only on format errors.
        #[arg(long)]
        strict: bool,
    },
    /// List outstanding work: one `context<TAB>source` line per unfinished message.
    Unfinished {
        /// TS file to inspect.
        file: PathBuf,
    },
    /// Translation coverage, overall and per context.
    Stats {
        /// TS file to inspect.
        file: PathBuf,
        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Re-serialize a catalog into canonical byte-stable form.
    Fmt {
        /// TS file to format.
        file: PathBuf,
        /// Rewrite the file in place instead of printing to stdout.
        #[arg(long)]
        write: bool,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Validate { file, strict } => validate(&file, strict),
        Commands::Unfinished { file } => unfinished(&file),
        Commands::Stats { file, json } => stats(&file, json),
        Commands::Fmt { file, write } => fmt(&file, write),
    }
}

fn load(file: &PathBuf) -> anyhow::Result<Catalog> {
    let bytes = fs::read(file).with_context(|| format!("failed to read {}", file.display()))?;
    Catalog::parse(&bytes).with_context(|| format!("failed to parse {}", file.display()))
}

fn validate(file: &PathBuf, strict: bool) -> anyhow::Result<ExitCode> {
    let catalog = load(file)?;

    let mut warnings = 0usize;
    for dup in catalog.duplicate_contexts() {
        warnings += 1;
        println!("duplicate context: {} ({} occurrences)", dup.name, dup.count);
    }
    for dup in catalog.duplicate_keys() {
        warnings += 1;
        match &dup.comment {
            Some(comment) => println!(
                "duplicate key: [{}] \"{}\" // \"{}\" ({} occurrences)",
                dup.context, dup.source, comment, dup.count
            ),
            None => println!(
                "duplicate key: [{}] \"{}\" ({} occurrences)",
                dup.context, dup.source, dup.count
            ),
        }
    }
    for mismatch in catalog.placeholder_mismatches() {
        warnings += 1;
        println!(
            "placeholder mismatch: [{}] \"{}\" (missing {:?}, extra {:?})",
            mismatch.context, mismatch.source, mismatch.missing, mismatch.extra
        );
    }

    if warnings == 0 {
        println!("{}: ok", file.display());
        Ok(ExitCode::SUCCESS)
    } else {
        println!("{}: {warnings} warning(s)", file.display());
        if strict {
            Ok(ExitCode::FAILURE)
        } else {
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn unfinished(file: &PathBuf) -> anyhow::Result<ExitCode> {
    let catalog = load(file)?;
    for (context, source) in catalog.unfinished() {
        println!("{context}\t{source}");
    }
    Ok(ExitCode::SUCCESS)
}

fn stats(file: &PathBuf, json: bool) -> anyhow::Result<ExitCode> {
    let catalog = load(file)?;
    let report = catalog.coverage();

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "{}: {}/{} translated ({:.1}%), {} unfinished",
        file.display(),
        report.finished,
        report.total,
        report.percent,
        report.unfinished
    );
    for context in &report.contexts {
        if context.unfinished > 0 {
            println!(
                "  {}: {}/{} ({:.1}%)",
                context.name, context.finished, context.total, context.percent
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn fmt(file: &PathBuf, write: bool) -> anyhow::Result<ExitCode> {
    let catalog = load(file)?;
    let bytes = catalog
        .to_bytes()
        .with_context(|| format!("failed to serialize {}", file.display()))?;
    if write {
        fs::write(file, &bytes).with_context(|| format!("failed to write {}", file.display()))?;
    } else {
        use std::io::Write as _;
        std::io::stdout().write_all(&bytes)?;
    }
    Ok(ExitCode::SUCCESS)
}
