//! Configuration scaffolding command

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use clap::Args;
use colored::Colorize;

use crate::config::Config;

/// Write a default splitpack.toml
#[derive(Args, Debug)]
pub struct InitCommand {
    /// Project name written to the config
    #[arg(short, long, default_value = "my-app")]
    pub name: String,

    /// Overwrite an existing config file
    #[arg(long)]
    pub force: bool,
}

impl InitCommand {
    pub async fn execute(&self, path: &Path) -> Result<()> {
        if path.exists() && !self.force {
            bail!("{} already exists (use --force to overwrite)", path.display());
        }

        let mut config = Config::default_config();
        config.project.name = self.name.clone();

        let content = toml::to_string_pretty(&config)
            .context("Failed to serialize default configuration")?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        fs::write(path, format!("# Splitpack configuration\n\n{}", content))
            .with_context(|| format!("Failed to write {}", path.display()))?;

        eprintln!("  {} Created {}", "✓".green(), path.display().to_string().cyan());
        eprintln!();
        eprintln!("  Next steps:");
        eprintln!("    {} splitpack build --graph module-graph.json", "→".dimmed());
        eprintln!();

        Ok(())
    }
}
