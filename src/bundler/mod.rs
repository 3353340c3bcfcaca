//! Core bundler implementation
//!
//! Reads the module graph, partitions it into chunks and assigns final
//! locations to binary assets.

mod chunk;
mod error;
mod graph;
mod rules;
mod split;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::cli::BuildOptions;
use crate::config::Config;
use crate::resolver::{AssetLocation, AssetTable};
use crate::utils::{hash_filename, integrity, join_url};

pub use chunk::{Chunk, ChunkKind, LoadPoint};
pub use error::BuildError;
pub use graph::{AssetSpec, DependencyKind, EntrySpec, GraphSpec, Module, ModuleGraph, ModuleId, ModuleSpec, ModuleType};
pub use rules::{CacheGroup, ChunksFilter, Matcher, SizeThresholds, SplitRules};
pub use split::{partition, ChunkManifest, LoadPointManifest, Partition, PartitionManifest};

/// Result of a build operation
#[derive(Debug)]
pub struct BuildResult {
    /// Module graph the build ran on
    pub graph: ModuleGraph,

    /// Chunks and load points
    pub partition: Partition,

    /// Final locations of binary assets
    pub assets: AssetTable,

    /// Files written to the output directory
    pub outputs: Vec<OutputFile>,
}

/// Information about a written file
#[derive(Debug)]
pub struct OutputFile {
    /// Output file path
    pub output_path: PathBuf,

    /// File size in bytes
    pub size: usize,
}

/// A binary asset read and named, not yet written
struct EmittedAsset {
    name: String,
    location: AssetLocation,
    bytes: Vec<u8>,
}

/// The main bundler
pub struct Bundler {
    /// Project configuration
    config: Arc<Config>,

    /// Build options
    options: BuildOptions,

    /// Compiled split rules
    rules: SplitRules,
}

impl Bundler {
    /// Create a new bundler instance
    ///
    /// Split rules are validated here, before any graph is read.
    pub fn new(config: Config, options: BuildOptions) -> Result<Self> {
        let rules = config.split_rules()?;

        Ok(Self {
            config: Arc::new(config),
            options,
            rules,
        })
    }

    /// Build the project
    ///
    /// Nothing is written unless partitioning and asset naming both succeed.
    pub async fn build(&self) -> Result<BuildResult> {
        let start = Instant::now();

        // 1. Load the module graph
        info!("Loading module graph...");
        let (spec, graph) = self.load_graph()?;

        // 2. Partition into chunks
        info!("Partitioning {} modules...", graph.len());
        let partition = partition(&graph, &self.rules)?;

        // 3. Assign final asset locations
        info!("Locating {} binary assets...", spec.assets.len());
        let emitted = self.emit_assets(&spec.assets)?;
        let assets = self.asset_table(&emitted)?;

        // 4. Write output
        info!("Writing output...");
        let outputs = self.write_output(&graph, &partition, &assets, &emitted)?;

        debug!("Build completed in {:?}", start.elapsed());

        Ok(BuildResult {
            graph,
            partition,
            assets,
            outputs,
        })
    }

    /// Read and validate the serialized module graph
    fn load_graph(&self) -> Result<(GraphSpec, ModuleGraph)> {
        let path = self.graph_path();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read module graph: {}", path.display()))?;
        let spec: GraphSpec = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse module graph: {}", path.display()))?;

        let graph = ModuleGraph::from_spec(&spec)?;
        debug!("Loaded {} modules, {} entries", graph.len(), graph.entries().len());

        Ok((spec, graph))
    }

    /// Read every binary asset and give it its final name
    fn emit_assets(&self, assets: &[AssetSpec]) -> Result<Vec<EmittedAsset>> {
        let base_dir = self.graph_path()
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));

        let mut emitted = Vec::with_capacity(assets.len());
        let mut written: HashMap<String, (String, String)> = HashMap::new();

        for asset in assets {
            let source = base_dir.join(&asset.source);
            let bytes = fs::read(&source)
                .with_context(|| format!("Failed to read asset '{}': {}", asset.name, source.display()))?;

            let file = self.output_filename(&asset.name, &bytes);
            let digest = integrity(&bytes);
            debug!("Asset {} -> {}", asset.name, file);

            // Identical contents may share a file; different contents may not
            if let Some((first, first_digest)) = written.get(&file) {
                if *first_digest != digest {
                    return Err(BuildError::OutputCollision {
                        file,
                        first: first.clone(),
                        second: asset.name.clone(),
                    }
                    .into());
                }
            }
            written.insert(file.clone(), (asset.name.clone(), digest.clone()));

            emitted.push(EmittedAsset {
                name: asset.name.clone(),
                location: AssetLocation {
                    url: join_url(&self.config.output.public_url, &file),
                    file,
                    size: bytes.len() as u64,
                    integrity: digest,
                },
                bytes,
            });
        }

        Ok(emitted)
    }

    /// Output filename for an asset, content-hashed when enabled
    fn output_filename(&self, name: &str, bytes: &[u8]) -> String {
        let file_name = Path::new(name)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| name.to_string());

        if !self.config.output.hash {
            return file_name;
        }

        let path = Path::new(&file_name);
        let stem = path.file_stem().map(|s| s.to_string_lossy().to_string()).unwrap_or_default();
        match path.extension() {
            Some(ext) => hash_filename(&stem, bytes, &ext.to_string_lossy()),
            None => hash_filename(&stem, bytes, "bin"),
        }
    }

    /// Populate the asset location table, once per build
    fn asset_table(&self, emitted: &[EmittedAsset]) -> Result<AssetTable> {
        let mut builder = AssetTable::builder();
        for asset in emitted {
            builder
                .register(asset.name.clone(), asset.location.clone())
                .map_err(|_| BuildError::DuplicateAsset(asset.name.clone()))?;
        }
        Ok(builder.build())
    }

    /// Write assets and manifests to disk
    fn write_output(
        &self,
        graph: &ModuleGraph,
        partition: &Partition,
        assets: &AssetTable,
        emitted: &[EmittedAsset],
    ) -> Result<Vec<OutputFile>> {
        let output_dir = self.output_dir();

        fs::create_dir_all(&output_dir)
            .context("Failed to create output directory")?;

        let mut outputs = Vec::new();

        for asset in emitted {
            let output_path = output_dir.join(&asset.location.file);
            fs::write(&output_path, &asset.bytes)
                .with_context(|| format!("Failed to write asset: {}", output_path.display()))?;
            outputs.push(OutputFile {
                output_path,
                size: asset.bytes.len(),
            });
        }

        if self.config.output.manifest {
            let chunks_json = serde_json::to_string_pretty(&partition.manifest(graph))?;
            let chunks_path = output_dir.join("chunks.json");
            fs::write(&chunks_path, &chunks_json)
                .context("Failed to write chunks.json")?;
            outputs.push(OutputFile {
                output_path: chunks_path,
                size: chunks_json.len(),
            });

            let assets_json = assets.to_json()?;
            let assets_path = output_dir.join("assets.json");
            fs::write(&assets_path, &assets_json)
                .context("Failed to write assets.json")?;
            outputs.push(OutputFile {
                output_path: assets_path,
                size: assets_json.len(),
            });
        }

        Ok(outputs)
    }

    fn graph_path(&self) -> PathBuf {
        if self.options.graph.is_absolute() {
            self.options.graph.clone()
        } else {
            self.config.root.join(&self.options.graph)
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.options.outdir.clone()
            .unwrap_or_else(|| self.config.output_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bundler(root: &Path, hash: bool) -> Bundler {
        let mut config = Config::default_config();
        config.root = root.to_path_buf();
        config.output.hash = hash;
        Bundler::new(
            config,
            BuildOptions {
                graph: PathBuf::from("graph.json"),
                outdir: None,
            },
        )
        .unwrap()
    }

    #[test]
    fn test_output_filename_hashing() {
        let dir = tempfile::tempdir().unwrap();

        let hashed = bundler(dir.path(), true).output_filename("wasm/fib.wasm", b"\0asm");
        assert!(hashed.starts_with("fib."));
        assert!(hashed.ends_with(".wasm"));
        assert_eq!(hashed.len(), "fib..wasm".len() + 16);

        let plain = bundler(dir.path(), false).output_filename("wasm/fib.wasm", b"\0asm");
        assert_eq!(plain, "fib.wasm");
    }

    #[tokio::test]
    async fn test_build_writes_assets_and_manifests() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("fib.wasm"), b"\0asm\x01\0\0\0").unwrap();
        fs::write(
            dir.path().join("graph.json"),
            r#"{
                "entries": [ { "name": "main", "module": "src/index.js" } ],
                "modules": [
                    { "id": "src/index.js", "size": 100, "asyncDependencies": ["wasm/index.js"] },
                    { "id": "wasm/index.js", "size": 100, "dependencies": ["wasm/fib.js"] },
                    { "id": "wasm/fib.js", "size": 100 }
                ],
                "assets": [ { "name": "fib.wasm", "source": "fib.wasm" } ]
            }"#,
        )
        .unwrap();

        let result = bundler(dir.path(), true).build().await.unwrap();

        assert_eq!(result.partition.load_points.len(), 2);
        let location = result.assets.resolve("fib.wasm").unwrap();
        assert!(location.url.starts_with("/fib."));
        assert_eq!(location.size, 8);

        let out = dir.path().join("dist");
        assert!(out.join(&location.file).is_file());
        assert!(out.join("chunks.json").is_file());

        let table = AssetTable::load(out.join("assets.json")).unwrap();
        assert_eq!(table.resolve("fib.wasm").unwrap(), location);
    }

    #[tokio::test]
    async fn test_unhashed_assets_with_same_file_name_collide() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("wasm/a")).unwrap();
        fs::create_dir_all(dir.path().join("wasm/b")).unwrap();
        fs::write(dir.path().join("wasm/a/fib.wasm"), b"\0asm\x01\0\0\0").unwrap();
        fs::write(dir.path().join("wasm/b/fib.wasm"), b"\0asm\x01\0\0\0\0").unwrap();
        fs::write(
            dir.path().join("graph.json"),
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [ { "id": "main.js", "size": 1 } ],
                "assets": [
                    { "name": "wasm/a/fib.wasm", "source": "wasm/a/fib.wasm" },
                    { "name": "wasm/b/fib.wasm", "source": "wasm/b/fib.wasm" }
                ]
            }"#,
        )
        .unwrap();

        let err = bundler(dir.path(), false).build().await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::OutputCollision { file, .. }) if file == "fib.wasm"
        ));
        assert!(!dir.path().join("dist").exists());

        // Hashed names keep them apart
        let result = bundler(dir.path(), true).build().await.unwrap();
        let a = result.assets.resolve("wasm/a/fib.wasm").unwrap();
        let b = result.assets.resolve("wasm/b/fib.wasm").unwrap();
        assert_ne!(a.file, b.file);
    }

    #[tokio::test]
    async fn test_cyclic_graph_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("graph.json"),
            r#"{
                "entries": [ { "name": "main", "module": "a.js" } ],
                "modules": [
                    { "id": "a.js", "size": 1, "dependencies": ["b.js"] },
                    { "id": "b.js", "size": 1, "dependencies": ["a.js"] }
                ]
            }"#,
        )
        .unwrap();

        let err = bundler(dir.path(), true).build().await.unwrap_err();

        assert!(matches!(err.downcast_ref::<BuildError>(), Some(BuildError::GraphCycle { .. })));
        assert!(!dir.path().join("dist").exists());
    }
}
