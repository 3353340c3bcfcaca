//! Fetching and instantiating binary assets

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use tracing::debug;

use super::AssetLocation;
use crate::utils::{clean_path, integrity};

const WASM_MAGIC: &[u8; 4] = b"\0asm";

/// What a loader asks a fetcher to produce
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Logical name the caller asked for
    pub name: String,

    /// Path to fetch, after locate redirection
    pub path: String,

    /// Table entry for the name, when one exists
    pub location: Option<AssetLocation>,
}

/// Fetches a binary asset and turns it into a usable handle
///
/// Called at most once per logical name by [`super::AssetLoader`].
#[async_trait]
pub trait AssetFetcher: Send + Sync {
    /// Instantiated asset, shared with every caller
    type Handle: Clone + Send + Sync + 'static;

    async fn fetch(&self, request: &FetchRequest) -> Result<Self::Handle>;
}

/// Format of a fetched binary module
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryKind {
    /// WebAssembly module with its binary format version
    Wasm { version: u32 },
    /// Opaque bytes
    Raw,
}

/// A fetched and validated binary asset
#[derive(Debug, Clone)]
pub struct BinaryModule {
    pub name: String,
    pub path: PathBuf,
    pub bytes: Arc<[u8]>,
    pub integrity: String,
    pub kind: BinaryKind,
}

impl BinaryModule {
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Reads assets from a build output directory
#[derive(Debug, Clone)]
pub struct FsFetcher {
    root: PathBuf,
    public_url: String,
}

impl FsFetcher {
    /// `public_url` is stripped from request paths before they are mapped under `root`
    pub fn new(root: impl Into<PathBuf>, public_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_url: public_url.into(),
        }
    }

    /// Map a request path to a file under the root
    fn file_path(&self, path: &str) -> PathBuf {
        let relative = path.strip_prefix(self.public_url.as_str()).unwrap_or(path);
        let cleaned = clean_path(relative);
        self.root.join(cleaned.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetFetcher for FsFetcher {
    type Handle = BinaryModule;

    async fn fetch(&self, request: &FetchRequest) -> Result<BinaryModule> {
        let path = self.file_path(&request.path);
        debug!("Fetching {} from {}", request.name, path.display());

        let bytes = tokio::fs::read(&path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;

        let digest = integrity(&bytes);
        if let Some(location) = &request.location {
            if location.integrity != digest {
                bail!(
                    "integrity mismatch for {}: expected {}, got {}",
                    path.display(),
                    location.integrity,
                    digest
                );
            }
        }

        let kind = detect_kind(&path, &bytes)?;

        Ok(BinaryModule {
            name: request.name.clone(),
            path,
            bytes: Arc::from(bytes),
            integrity: digest,
            kind,
        })
    }
}

/// Validate the header of files claiming to be WebAssembly
fn detect_kind(path: &Path, bytes: &[u8]) -> Result<BinaryKind> {
    let is_wasm = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("wasm"))
        .unwrap_or(false);

    if !is_wasm {
        return Ok(BinaryKind::Raw);
    }

    if bytes.len() < 8 || &bytes[..4] != WASM_MAGIC {
        bail!("{} is not a WebAssembly module", path.display());
    }

    let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
    Ok(BinaryKind::Wasm { version })
}
