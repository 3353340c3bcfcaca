//! Resolve command implementation

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tracing::info;

use crate::config::Config;
use crate::resolver::{AssetLoader, AssetTable, BinaryKind, FsFetcher};
use crate::utils::format_size;

/// Print the built location of a logical asset name
#[derive(Args, Debug)]
pub struct ResolveCommand {
    /// Logical asset name, e.g. `fib.wasm`
    pub name: String,

    /// Asset table to read instead of `<output.dir>/assets.json`
    #[arg(short, long)]
    pub table: Option<PathBuf>,

    /// Fetch and validate the asset after resolving it
    #[arg(short, long)]
    pub load: bool,
}

impl ResolveCommand {
    pub async fn execute(&self, config_path: &Path) -> Result<()> {
        let config = Config::load(config_path)?;
        let table_path = self.table.clone().unwrap_or_else(|| config.asset_table_path());

        info!("Reading asset table from {}", table_path.display());
        let table = Arc::new(AssetTable::load(&table_path)?);

        let location = table.resolve(&self.name)?;
        println!("{}", location.url);

        eprintln!(
            "  {} {} {} {} {}",
            "•".dimmed(),
            self.name.cyan(),
            "→".dimmed(),
            location.file,
            format_size(location.size).dimmed()
        );

        if self.load {
            let fetcher = FsFetcher::new(config.output_dir(), config.output.public_url.clone());
            let loader = AssetLoader::new(Arc::clone(&table), fetcher);
            let module = loader
                .load(&self.name, None)
                .await
                .with_context(|| format!("Failed to load {}", self.name))?;

            let kind = match module.kind {
                BinaryKind::Wasm { version } => format!("wasm v{}", version),
                BinaryKind::Raw => "raw".to_string(),
            };

            eprintln!(
                "  {} Loaded {} ({}, {})",
                "✓".green(),
                module.path.display().to_string().cyan(),
                kind,
                format_size(module.len() as u64)
            );
        }

        Ok(())
    }
}
