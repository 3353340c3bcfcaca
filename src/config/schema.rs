//! Configuration schema definitions

use serde::{Deserialize, Serialize};

/// Project metadata configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name
    pub name: String,

    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub dir: String,

    /// Public URL prefix for assets
    #[serde(default = "default_public_url")]
    pub public_url: String,

    /// Hash assets for cache busting
    #[serde(default = "default_true")]
    pub hash: bool,

    /// Write chunk and asset manifests
    #[serde(default = "default_true")]
    pub manifest: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            public_url: default_public_url(),
            hash: true,
            manifest: true,
        }
    }
}

fn default_output_dir() -> String {
    "dist".to_string()
}

fn default_public_url() -> String {
    "/".to_string()
}

fn default_true() -> bool {
    true
}

/// Code splitting configuration
///
/// Keys are snake_case; the camelCase spellings used by webpack's
/// `optimization.splitChunks` are accepted as aliases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SplitChunksConfig {
    /// Which chunks are eligible for splitting: `all`, `async` or `initial`
    #[serde(default = "default_chunks")]
    pub chunks: String,

    /// Smallest size a split-out chunk may have
    #[serde(default = "default_min_size", alias = "minSize")]
    pub min_size: u64,

    /// Size a split must leave behind in the chunk it was taken from
    #[serde(default, alias = "minRemainingSize")]
    pub min_remaining_size: u64,

    /// Default minimum number of importers before a module is split out
    #[serde(default = "default_min_chunks", alias = "minChunks")]
    pub min_chunks: usize,

    /// Request ceiling for an on-demand load
    #[serde(default = "default_max_requests", alias = "maxAsyncRequests")]
    pub max_async_requests: usize,

    /// Request ceiling for a startup load
    #[serde(default = "default_max_requests", alias = "maxInitialRequests")]
    pub max_initial_requests: usize,

    /// Above this size a split always happens, ignoring `min_size`
    #[serde(default = "default_enforce_size_threshold", alias = "enforceSizeThreshold")]
    pub enforce_size_threshold: u64,

    /// Cache groups in declaration order
    #[serde(default = "default_cache_groups", alias = "cacheGroups")]
    pub cache_groups: Vec<CacheGroupConfig>,
}

impl Default for SplitChunksConfig {
    fn default() -> Self {
        Self {
            chunks: default_chunks(),
            min_size: default_min_size(),
            min_remaining_size: 0,
            min_chunks: default_min_chunks(),
            max_async_requests: default_max_requests(),
            max_initial_requests: default_max_requests(),
            enforce_size_threshold: default_enforce_size_threshold(),
            cache_groups: default_cache_groups(),
        }
    }
}

fn default_chunks() -> String {
    "async".to_string()
}

fn default_min_size() -> u64 {
    20_000
}

fn default_min_chunks() -> usize {
    1
}

fn default_max_requests() -> usize {
    30
}

fn default_enforce_size_threshold() -> u64 {
    50_000
}

fn default_cache_groups() -> Vec<CacheGroupConfig> {
    vec![
        CacheGroupConfig {
            test: Some(r"[\\/]node_modules[\\/]".to_string()),
            priority: -10,
            reuse_existing_chunk: true,
            ..CacheGroupConfig::new("defaultVendors")
        },
        CacheGroupConfig {
            min_chunks: Some(2),
            priority: -20,
            reuse_existing_chunk: true,
            ..CacheGroupConfig::new("default")
        },
    ]
}

/// A cache group rule
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CacheGroupConfig {
    /// Group name, used as the prefix of the chunks it creates
    pub name: String,

    /// Regular expression matched against module identifiers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,

    /// Restrict the group to one module classification
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub module_type: Option<String>,

    /// Higher priorities are evaluated first
    #[serde(default)]
    pub priority: i32,

    /// Overrides the global `min_chunks`
    #[serde(default, alias = "minChunks", skip_serializing_if = "Option::is_none")]
    pub min_chunks: Option<usize>,

    /// Overrides the global `min_size`
    #[serde(default, alias = "minSize", skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u64>,

    /// Overrides the global `chunks` selection
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<String>,

    /// Reuse a chunk that already holds exactly the matched modules
    #[serde(default, alias = "reuseExistingChunk")]
    pub reuse_existing_chunk: bool,

    /// Put every matched module into one chunk with this name
    #[serde(default, alias = "chunkName", skip_serializing_if = "Option::is_none")]
    pub chunk_name: Option<String>,
}

impl CacheGroupConfig {
    /// Create a catch-all group with default settings
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }
}
