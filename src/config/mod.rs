//! Configuration handling for Splitpack
//!
//! Parses and manages splitpack.toml configuration files.

mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::bundler::SplitRules;

pub use schema::*;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Project metadata
    pub project: ProjectConfig,

    /// Output configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Code splitting rules and thresholds
    #[serde(default)]
    pub split_chunks: SplitChunksConfig,

    /// Root directory (computed from config file location)
    #[serde(skip)]
    pub root: PathBuf,
}

impl Config {
    /// Load configuration from a file path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let canonical_path = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()?.join(path)
        };

        let content = fs::read_to_string(&canonical_path)
            .with_context(|| format!("Failed to read config file: {}", canonical_path.display()))?;

        let mut config = Self::parse(&content)?;

        // Set root directory to the directory containing the config file
        config.root = canonical_path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .with_context(|| "Failed to parse splitpack.toml")?;

        config.validate()?;

        Ok(config)
    }

    /// Create a default configuration
    pub fn default_config() -> Self {
        Self {
            project: ProjectConfig {
                name: "my-app".to_string(),
                version: "0.1.0".to_string(),
            },
            output: OutputConfig::default(),
            split_chunks: SplitChunksConfig::default(),
            root: PathBuf::from("."),
        }
    }

    /// Validate the configuration
    ///
    /// Split rules are compiled here so malformed cache groups fail before
    /// any graph is read.
    fn validate(&self) -> Result<()> {
        if self.output.dir.trim().is_empty() {
            anyhow::bail!("output.dir must not be empty in splitpack.toml");
        }

        self.split_rules()?;

        Ok(())
    }

    /// Compile the split rules
    pub fn split_rules(&self) -> Result<SplitRules> {
        SplitRules::compile(&self.split_chunks)
            .context("Invalid [split_chunks] configuration")
    }

    /// Get the absolute output directory path
    pub fn output_dir(&self) -> PathBuf {
        self.root.join(&self.output.dir)
    }

    /// Path of the asset location table inside the output directory
    pub fn asset_table_path(&self) -> PathBuf {
        self.output_dir().join("assets.json")
    }
}
