//! `splitpack` command line
//!
//! `build` partitions a module graph and writes hashed assets plus the
//! `chunks.json`/`assets.json` manifests. `resolve` answers where a logical
//! asset name ended up, and can load it to check the file. `init` writes a
//! starter `splitpack.toml`.

mod build;
mod init;
mod resolve;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;

pub use build::{BuildCommand, BuildOptions};
pub use init::InitCommand;
pub use resolve::ResolveCommand;

#[derive(Parser, Debug)]
#[command(name = "splitpack", version, propagate_version = true)]
#[command(about = "Split module graphs into chunks and locate built binary assets")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Log every split and merge decision
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Project configuration; relative paths in it resolve against its directory
    #[arg(short, long, global = true, env = "SPLITPACK_CONFIG", default_value = "splitpack.toml")]
    pub config: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Partition the module graph and emit assets and manifests
    Build(BuildCommand),

    /// Print the URL a logical asset name was built to
    Resolve(ResolveCommand),

    /// Write a starter splitpack.toml
    Init(InitCommand),
}

impl Commands {
    fn label(&self) -> &'static str {
        match self {
            Commands::Build(_) => "build",
            Commands::Resolve(_) => "resolve",
            Commands::Init(_) => "init",
        }
    }
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        eprintln!(
            "\n{} {} {}\n",
            "splitpack".bold().cyan(),
            self.command.label().bold(),
            format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
        );

        match &self.command {
            Commands::Build(cmd) => cmd.execute(&self.config).await,
            Commands::Resolve(cmd) => cmd.execute(&self.config).await,
            Commands::Init(cmd) => cmd.execute(&self.config).await,
        }
    }
}
