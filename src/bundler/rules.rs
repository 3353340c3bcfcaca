//! Compiled split rules: cache groups and size thresholds

use std::collections::HashSet;

use regex::Regex;

use super::{BuildError, ChunkKind, Module, ModuleType};
use crate::config::{CacheGroupConfig, SplitChunksConfig};

/// Which load points a cache group may split modules out of
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunksFilter {
    All,
    Async,
    Initial,
}

impl ChunksFilter {
    /// Parse the configuration spelling
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(ChunksFilter::All),
            "async" => Some(ChunksFilter::Async),
            "initial" => Some(ChunksFilter::Initial),
            _ => None,
        }
    }

    /// Whether a load point of the given kind is selected
    pub fn selects(&self, kind: ChunkKind) -> bool {
        match self {
            ChunksFilter::All => true,
            ChunksFilter::Async => kind == ChunkKind::Async,
            ChunksFilter::Initial => kind == ChunkKind::Initial,
        }
    }
}

/// A single condition of a cache group's match predicate
#[derive(Debug, Clone)]
pub enum Matcher {
    /// Regular expression over the module identifier
    Pattern(Regex),
    /// Module classification
    Type(ModuleType),
}

impl Matcher {
    fn matches(&self, module: &Module) -> bool {
        match self {
            Matcher::Pattern(re) => re.is_match(&module.id),
            Matcher::Type(module_type) => module.module_type == *module_type,
        }
    }
}

/// A validated cache group
#[derive(Debug, Clone)]
pub struct CacheGroup {
    pub name: String,
    /// All must match; empty matches every module
    pub matchers: Vec<Matcher>,
    pub priority: i32,
    pub min_chunks: usize,
    pub min_size: u64,
    pub chunks: ChunksFilter,
    pub reuse_existing_chunk: bool,
    pub chunk_name: Option<String>,
}

impl CacheGroup {
    /// Whether the group's predicate accepts the module
    pub fn matches(&self, module: &Module) -> bool {
        self.matchers.iter().all(|m| m.matches(module))
    }
}

/// Global size and request limits for one build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeThresholds {
    pub min_size: u64,
    pub min_remaining_size: u64,
    pub enforce_size_threshold: u64,
    pub max_initial_requests: usize,
    pub max_async_requests: usize,
}

impl SizeThresholds {
    /// Request ceiling for a load point of the given kind
    pub fn max_requests(&self, kind: ChunkKind) -> usize {
        match kind {
            ChunkKind::Initial => self.max_initial_requests,
            ChunkKind::Async => self.max_async_requests,
        }
    }

    /// Whether a chunk of this size is split regardless of other limits
    pub fn is_enforced(&self, size: u64) -> bool {
        size >= self.enforce_size_threshold
    }
}

/// Everything the partitioner needs besides the graph
#[derive(Debug, Clone)]
pub struct SplitRules {
    pub thresholds: SizeThresholds,

    /// Sorted by priority, highest first; ties keep declaration order
    groups: Vec<CacheGroup>,
}

impl SplitRules {
    /// Validate configuration and compile it into rules
    pub fn compile(config: &SplitChunksConfig) -> Result<Self, BuildError> {
        let default_chunks = ChunksFilter::parse(&config.chunks).ok_or_else(|| {
            BuildError::invalid_rule(
                "split_chunks",
                format!("chunks must be one of all, async, initial (got '{}')", config.chunks),
            )
        })?;

        if config.max_initial_requests == 0 || config.max_async_requests == 0 {
            return Err(BuildError::invalid_rule(
                "split_chunks",
                "request ceilings must allow at least one request",
            ));
        }

        if config.cache_groups.is_empty() {
            return Err(BuildError::invalid_rule(
                "split_chunks",
                "at least one cache group is required",
            ));
        }

        let mut seen = HashSet::new();
        let mut groups = Vec::with_capacity(config.cache_groups.len());

        for group in &config.cache_groups {
            if group.name.is_empty() {
                return Err(BuildError::invalid_rule("split_chunks", "cache group without a name"));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(BuildError::invalid_rule(&group.name, "cache group declared twice"));
            }
            groups.push(compile_group(group, config, default_chunks)?);
        }

        // Stable sort keeps declaration order among equal priorities
        groups.sort_by(|a, b| b.priority.cmp(&a.priority));

        Ok(Self {
            thresholds: SizeThresholds {
                min_size: config.min_size,
                min_remaining_size: config.min_remaining_size,
                enforce_size_threshold: config.enforce_size_threshold,
                max_initial_requests: config.max_initial_requests,
                max_async_requests: config.max_async_requests,
            },
            groups,
        })
    }

    /// Cache groups in evaluation order
    pub fn cache_groups(&self) -> &[CacheGroup] {
        &self.groups
    }
}

fn compile_group(
    group: &CacheGroupConfig,
    config: &SplitChunksConfig,
    default_chunks: ChunksFilter,
) -> Result<CacheGroup, BuildError> {
    let mut matchers = Vec::new();

    if let Some(test) = &group.test {
        let re = Regex::new(test)
            .map_err(|e| BuildError::invalid_rule(&group.name, format!("invalid test pattern: {}", e)))?;
        matchers.push(Matcher::Pattern(re));
    }

    if let Some(name) = &group.module_type {
        let module_type = ModuleType::from_name(name).ok_or_else(|| {
            BuildError::invalid_rule(&group.name, format!("unknown module type '{}'", name))
        })?;
        matchers.push(Matcher::Type(module_type));
    }

    let chunks = match &group.chunks {
        Some(value) => ChunksFilter::parse(value).ok_or_else(|| {
            BuildError::invalid_rule(
                &group.name,
                format!("chunks must be one of all, async, initial (got '{}')", value),
            )
        })?,
        None => default_chunks,
    };

    Ok(CacheGroup {
        name: group.name.clone(),
        matchers,
        priority: group.priority,
        min_chunks: group.min_chunks.unwrap_or(config.min_chunks),
        min_size: group.min_size.unwrap_or(config.min_size),
        chunks,
        reuse_existing_chunk: group.reuse_existing_chunk,
        chunk_name: group.chunk_name.clone(),
    })
}
