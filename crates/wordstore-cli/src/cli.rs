use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wordstore",
    about = "Wordstore index maintenance tool",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// TOML file with [persist] and [overlay] tables
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Print every record of a compiled index in dump format
    Dump(DumpArgs),
    /// Print the value stored under one key
    Get(GetArgs),
    /// Show record count and size of a compiled index
    Stats(StatsArgs),
    /// Set or delete keys and rebuild the index atomically
    Edit(EditArgs),
    /// Build a compiled index from a hash-file database
    Compile(CompileArgs),
}

#[derive(Args)]
pub struct DumpArgs {
    /// Compiled index file
    pub index: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    /// Compiled index file
    pub index: PathBuf,
    /// Key to look up
    pub key: String,
}

#[derive(Args)]
pub struct StatsArgs {
    /// Compiled index file
    pub index: PathBuf,
}

#[derive(Args)]
pub struct EditArgs {
    /// Compiled index file (created if missing)
    pub index: PathBuf,
    /// Set a key, as KEY=VALUE
    #[arg(long = "set", value_name = "KEY=VALUE")]
    pub set: Vec<String>,
    /// Delete a key
    #[arg(long = "delete", value_name = "KEY")]
    pub delete: Vec<String>,
}

#[derive(Args)]
pub struct CompileArgs {
    /// Hash-file database to read (opened read-only)
    pub hashfile: PathBuf,
    /// Compiled index to write
    pub index: PathBuf,
}
