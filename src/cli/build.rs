//! Build command implementation

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::bundler::{Bundler, ChunkKind};
use crate::config::Config;
use crate::utils::{format_duration, format_size};

/// Partition the module graph and emit assets
#[derive(Args, Debug)]
pub struct BuildCommand {
    /// Serialized module graph, relative to the config file
    #[arg(short, long, default_value = "module-graph.json")]
    pub graph: PathBuf,

    /// Output directory
    #[arg(short, long)]
    pub outdir: Option<PathBuf>,
}

impl BuildCommand {
    pub async fn execute(&self, config_path: &Path) -> Result<()> {
        let start = Instant::now();

        info!("Loading configuration from {}", config_path.display());
        let config = Config::load(config_path)?;

        eprintln!("{} Building project...", "→".blue());

        let bundler = Bundler::new(config, self.into())?;
        let result = bundler.build().await?;

        eprintln!(
            "\n{} Partitioned {} modules into {} chunk(s) in {}\n",
            "✓".green().bold(),
            result.graph.len(),
            result.partition.chunks.len(),
            format_duration(start.elapsed())
        );

        for chunk in &result.partition.chunks {
            let kind = match chunk.kind {
                ChunkKind::Initial => "initial",
                ChunkKind::Async => "async",
            };

            eprintln!(
                "  {} {} {} {}",
                "•".dimmed(),
                chunk.name.cyan(),
                format!("[{}]", kind).dimmed(),
                format_size(chunk.size).dimmed()
            );
        }

        if !result.assets.is_empty() {
            eprintln!();
            for name in result.assets.names() {
                let location = result.assets.resolve(name)?;
                eprintln!(
                    "  {} {} {} {}",
                    "•".dimmed(),
                    name.cyan(),
                    "→".dimmed(),
                    location.url
                );
            }
        }

        eprintln!();

        Ok(())
    }
}

/// Build options derived from command arguments
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub graph: PathBuf,
    pub outdir: Option<PathBuf>,
}

impl From<&BuildCommand> for BuildOptions {
    fn from(cmd: &BuildCommand) -> Self {
        Self {
            graph: cmd.graph.clone(),
            outdir: cmd.outdir.clone(),
        }
    }
}
