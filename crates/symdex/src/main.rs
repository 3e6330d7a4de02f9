mod cli;

use crate::cli::{Commands, SymdexCli};
use anyhow::{Context, Result};
use logging::LogMode;
use semidx::ast::load_unit;
use semidx::extract::Extractor;
use semidx::infer::Processor;
use semidx::output::build_document;
use semidx::session::Session;
use std::path::PathBuf;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

fn main() -> Result<()> {
    let cli = SymdexCli::parse_args();
    match cli.command {
        Commands::Index {
            files,
            output,
            types,
            verbose,
            log_dir,
        } => {
            let mode = match log_dir {
                Some(dir) => LogMode::File(dir),
                None => LogMode::Cli,
            };
            let _guards = logging::init(mode, verbose)?;
            run_index(files, output, types)
        }
    }
}

fn run_index(files: Vec<PathBuf>, output: Option<PathBuf>, types: bool) -> Result<()> {
    let mut session = Session::new();

    // Register everything first so cross-file names resolve, then infer.
    let mut units = Vec::with_capacity(files.len());
    for file in &files {
        let unit =
            load_unit(file).with_context(|| format!("failed to load unit {}", file.display()))?;
        Extractor::extract_unit(&mut session, &unit);
        units.push(unit);
    }
    let mut processor = Processor::new();
    for unit in &units {
        processor.process_all(&mut session, unit);
    }

    let document = build_document(&session, types);
    let json = serde_json::to_string_pretty(&document)?;
    match output {
        Some(path) => std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?,
        None => println!("{json}"),
    }
    info!(
        units = units.len(),
        objects = document.objects.len(),
        references = document.references.len(),
        "index complete"
    );
    Ok(())
}
