//! Asset location resolution
//!
//! Maps logical asset names (known when the source is written) to the
//! locations the build assigned them, and loads each asset at most once.

mod fetch;
mod loader;

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use fetch::{AssetFetcher, BinaryKind, BinaryModule, FetchRequest, FsFetcher};
pub use loader::{AssetLoader, LoadState, LocateHook};

/// Process-wide table, installed once at startup
static GLOBAL_TABLE: OnceCell<AssetTable> = OnceCell::new();

/// Errors raised while resolving or loading assets
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The logical name was never registered by the build
    #[error("unknown asset '{0}'")]
    UnknownAsset(String),

    /// Fetching or instantiating the asset failed; replayed to every caller
    #[error("failed to load asset '{name}': {reason}")]
    AssetLoad { name: String, reason: String },

    /// The logical name was registered twice
    #[error("asset '{0}' is already registered")]
    DuplicateAsset(String),

    /// A process-wide table was already installed
    #[error("an asset table is already installed")]
    AlreadyInstalled,
}

/// Where the build put an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetLocation {
    /// Output file name, relative to the output directory
    pub file: String,

    /// URL the runtime fetches, with the public URL prefix applied
    pub url: String,

    /// Size in bytes
    pub size: u64,

    /// Subresource-integrity digest of the file
    pub integrity: String,
}

/// Immutable logical-name to location table
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetTable {
    entries: BTreeMap<String, AssetLocation>,
}

impl AssetTable {
    /// Start populating a table
    pub fn builder() -> AssetTableBuilder {
        AssetTableBuilder::default()
    }

    /// Read a table written by a build
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read asset table: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse asset table: {}", path.display()))
    }

    /// Serialize the table as written to `assets.json`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Location of a registered asset
    pub fn resolve(&self, name: &str) -> Result<&AssetLocation, ResolveError> {
        self.entries
            .get(name)
            .ok_or_else(|| ResolveError::UnknownAsset(name.to_string()))
    }

    /// Registered logical names, sorted
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Build a locate hook that sends requests ending in `ext` to their resolved URL
    ///
    /// Unregistered or non-matching paths are returned unchanged.
    pub fn locate_by_extension(self: &Arc<Self>, ext: &str) -> Box<LocateHook<'static>> {
        let table = Arc::clone(self);
        let ext = ext.to_string();
        Box::new(move |path: &str| {
            if !path.ends_with(&ext) {
                return path.to_string();
            }
            match table.resolve(path) {
                Ok(location) => location.url.clone(),
                Err(_) => path.to_string(),
            }
        })
    }

    /// Install this table for the whole process
    pub fn install(self) -> Result<&'static AssetTable, ResolveError> {
        GLOBAL_TABLE.set(self).map_err(|_| ResolveError::AlreadyInstalled)?;
        GLOBAL_TABLE.get().ok_or(ResolveError::AlreadyInstalled)
    }

    /// The installed process-wide table, if any
    pub fn global() -> Option<&'static AssetTable> {
        GLOBAL_TABLE.get()
    }
}

/// Collects entries before the table is frozen
#[derive(Debug, Default)]
pub struct AssetTableBuilder {
    entries: BTreeMap<String, AssetLocation>,
}

impl AssetTableBuilder {
    /// Register a logical name; each name may be registered once
    pub fn register(
        &mut self,
        name: impl Into<String>,
        location: AssetLocation,
    ) -> Result<&mut Self, ResolveError> {
        let name = name.into();
        if self.entries.contains_key(&name) {
            return Err(ResolveError::DuplicateAsset(name));
        }
        self.entries.insert(name, location);
        Ok(self)
    }

    /// Freeze the table
    pub fn build(self) -> AssetTable {
        AssetTable {
            entries: self.entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location(file: &str) -> AssetLocation {
        AssetLocation {
            file: file.to_string(),
            url: format!("/{}", file),
            size: 4,
            integrity: crate::utils::integrity(b"\0asm"),
        }
    }

    fn table() -> AssetTable {
        let mut builder = AssetTable::builder();
        builder
            .register("fib.wasm", location("fib.0123456789abcdef.wasm"))
            .unwrap()
            .register("data.bin", location("data.fedcba9876543210.bin"))
            .unwrap();
        builder.build()
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let table = table();
        let first = table.resolve("fib.wasm").unwrap().clone();
        let second = table.resolve("fib.wasm").unwrap();

        assert_eq!(&first, second);
        assert_eq!(first.url, "/fib.0123456789abcdef.wasm");
    }

    #[test]
    fn test_resolve_unregistered_name() {
        assert_eq!(
            table().resolve("unregistered-name"),
            Err(ResolveError::UnknownAsset("unregistered-name".to_string()))
        );
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut builder = AssetTable::builder();
        builder.register("fib.wasm", location("a.wasm")).unwrap();
        let err = builder.register("fib.wasm", location("b.wasm")).unwrap_err();
        assert_eq!(err, ResolveError::DuplicateAsset("fib.wasm".to_string()));
    }

    #[test]
    fn test_locate_by_extension_redirects_only_matching_paths() {
        let table = Arc::new(table());
        let hook = table.locate_by_extension(".wasm");

        assert_eq!(hook("fib.wasm"), "/fib.0123456789abcdef.wasm");
        assert_eq!(hook("fib.js"), "fib.js");
        assert_eq!(hook("other.wasm"), "other.wasm");
    }

    #[test]
    fn test_table_json_is_a_plain_map() {
        let json = table().to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["fib.wasm"]["file"], "fib.0123456789abcdef.wasm");
        let back: AssetTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table());
    }

    #[test]
    fn test_install_once() {
        let installed = table().install().unwrap();
        assert!(installed.resolve("fib.wasm").is_ok());
        assert!(AssetTable::global().is_some());
        assert_eq!(AssetTable::default().install().unwrap_err(), ResolveError::AlreadyInstalled);
    }
}
