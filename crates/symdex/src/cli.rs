use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "symdex",
    version,
    about = "Semantic symbol index CLI",
    long_about = "Builds a symbol index with references and best-effort inferred types from parsed source units."
)]
pub struct SymdexCli {
    #[command(subcommand)]
    pub command: Commands,
}

impl SymdexCli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Index parsed source units and emit a JSON index document
    Index {
        /// AST JSON files produced by a language front end
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Write the document to a file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Include inferred type strings per object
        #[arg(long)]
        types: bool,

        /// Enable verbose logging
        #[arg(short, long)]
        verbose: bool,

        /// Write logs to a rolling file in this directory instead of stderr
        #[arg(long, value_name = "DIR")]
        log_dir: Option<PathBuf>,
    },
}
