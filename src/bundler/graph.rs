//! Module graph data structures

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::BuildError;

/// Unique identifier for a module
pub type ModuleId = usize;

/// Types of modules the bundler can handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    JavaScript,
    TypeScript,
    Jsx,
    Tsx,
    Css,
    Json,
    Wasm,
    Asset,
    Unknown,
}

impl ModuleType {
    /// Determine module type from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "js" | "mjs" | "cjs" => ModuleType::JavaScript,
            "ts" | "mts" | "cts" => ModuleType::TypeScript,
            "jsx" => ModuleType::Jsx,
            "tsx" => ModuleType::Tsx,
            "css" | "scss" | "sass" | "less" => ModuleType::Css,
            "json" => ModuleType::Json,
            "wasm" => ModuleType::Wasm,
            "bin" | "data" | "png" | "jpg" | "jpeg" | "gif" | "svg" | "woff" | "woff2" => {
                ModuleType::Asset
            }
            _ => ModuleType::Unknown,
        }
    }

    /// Look up a classification by the name used in configuration files
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "javascript" => Some(ModuleType::JavaScript),
            "typescript" => Some(ModuleType::TypeScript),
            "jsx" => Some(ModuleType::Jsx),
            "tsx" => Some(ModuleType::Tsx),
            "css" => Some(ModuleType::Css),
            "json" => Some(ModuleType::Json),
            "wasm" => Some(ModuleType::Wasm),
            "asset" => Some(ModuleType::Asset),
            "unknown" => Some(ModuleType::Unknown),
            _ => None,
        }
    }

    /// Detect module type from a module identifier
    pub fn detect(id: &str) -> Self {
        Path::new(id)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(ModuleType::from_extension)
            .unwrap_or(ModuleType::Unknown)
    }
}

/// How one module pulls in another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DependencyKind {
    /// Static import, loaded together with the importer
    Sync,
    /// Dynamic import, starts a new on-demand load point
    Async,
}

/// A module in the dependency graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Module {
    /// Unique module identifier (usually a resolved path)
    pub id: String,

    /// Module size in bytes
    pub size: u64,

    /// Module type
    pub module_type: ModuleType,
}

impl Module {
    /// Create a module, detecting its type from the identifier
    pub fn new(id: impl Into<String>, size: u64) -> Self {
        let id = id.into();
        let module_type = ModuleType::detect(&id);
        Self {
            id,
            size,
            module_type,
        }
    }
}

/// Serialized module graph handed over by the module-resolution pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphSpec {
    /// Entry points in declaration order
    #[serde(default)]
    pub entries: Vec<EntrySpec>,

    /// All modules in the graph
    pub modules: Vec<ModuleSpec>,

    /// Binary assets whose final location is assigned by the build
    #[serde(default)]
    pub assets: Vec<AssetSpec>,
}

/// A named entry point
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntrySpec {
    pub name: String,
    pub module: String,
}

/// A module as it appears in the serialized graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    pub id: String,

    pub size: u64,

    /// Explicit classification; detected from the id when absent
    #[serde(default, rename = "type")]
    pub module_type: Option<ModuleType>,

    #[serde(default)]
    pub dependencies: Vec<String>,

    #[serde(default)]
    pub async_dependencies: Vec<String>,
}

/// A binary asset registered under a logical name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssetSpec {
    /// Logical name the runtime asks for (e.g. `fib.wasm`)
    pub name: String,

    /// Source file, relative to the graph file
    pub source: PathBuf,
}

/// The module dependency graph
#[derive(Debug, Default, Clone)]
pub struct ModuleGraph {
    /// All modules indexed by their ID
    modules: Vec<Module>,

    /// Map from identifier to module ID
    id_to_index: HashMap<String, ModuleId>,

    /// Dependency edges in insertion order: module ID -> (dependency ID, kind)
    edges: Vec<Vec<(ModuleId, DependencyKind)>>,

    /// Reverse edges: module ID -> importing module IDs
    importers: Vec<BTreeSet<ModuleId>>,

    /// Named entry points in declaration order
    entries: Vec<(String, ModuleId)>,
}

impl ModuleGraph {
    /// Create a new empty module graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a graph from its serialized form
    pub fn from_spec(spec: &GraphSpec) -> Result<Self, BuildError> {
        let mut graph = Self::new();

        for module in &spec.modules {
            let mut m = Module::new(module.id.clone(), module.size);
            if let Some(module_type) = module.module_type {
                m.module_type = module_type;
            }
            graph.add_module(m)?;
        }

        for module in &spec.modules {
            let from = graph.id_to_index[&module.id];
            let deps = module
                .dependencies
                .iter()
                .map(|d| (d, DependencyKind::Sync))
                .chain(module.async_dependencies.iter().map(|d| (d, DependencyKind::Async)));

            for (specifier, kind) in deps {
                let to = graph
                    .get_module_id(specifier)
                    .ok_or_else(|| BuildError::UnknownModule {
                        from: module.id.clone(),
                        specifier: specifier.clone(),
                    })?;
                graph.add_dependency(from, to, kind);
            }
        }

        for entry in &spec.entries {
            let id = graph
                .get_module_id(&entry.module)
                .ok_or_else(|| BuildError::UnknownEntry {
                    name: entry.name.clone(),
                    module: entry.module.clone(),
                })?;
            graph.add_entry(entry.name.clone(), id);
        }

        Ok(graph)
    }

    /// Add a module to the graph
    pub fn add_module(&mut self, module: Module) -> Result<ModuleId, BuildError> {
        if self.id_to_index.contains_key(&module.id) {
            return Err(BuildError::DuplicateModule(module.id));
        }

        let id = self.modules.len();
        self.id_to_index.insert(module.id.clone(), id);
        self.modules.push(module);
        self.edges.push(Vec::new());
        self.importers.push(BTreeSet::new());

        Ok(id)
    }

    /// Add a dependency edge between modules
    ///
    /// A repeated edge of the same kind is ignored.
    pub fn add_dependency(&mut self, from: ModuleId, to: ModuleId, kind: DependencyKind) {
        let Some(deps) = self.edges.get_mut(from) else {
            return;
        };
        if to >= self.importers.len() || deps.contains(&(to, kind)) {
            return;
        }
        deps.push((to, kind));
        self.importers[to].insert(from);
    }

    /// Declare a named entry point
    pub fn add_entry(&mut self, name: impl Into<String>, id: ModuleId) {
        self.entries.push((name.into(), id));
    }

    /// Get module ID from its identifier
    pub fn get_module_id(&self, id: &str) -> Option<ModuleId> {
        self.id_to_index.get(id).copied()
    }

    /// Get a module by ID
    pub fn get_module(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    /// Module by ID; callers only pass IDs handed out by this graph
    pub(crate) fn module(&self, id: ModuleId) -> &Module {
        &self.modules[id]
    }

    /// All module IDs in insertion order
    pub fn all_module_ids(&self) -> impl Iterator<Item = ModuleId> {
        0..self.modules.len()
    }

    /// Declared entry points
    pub fn entries(&self) -> &[(String, ModuleId)] {
        &self.entries
    }

    /// Direct dependencies of a module
    pub fn dependencies(&self, id: ModuleId) -> &[(ModuleId, DependencyKind)] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or_default()
    }

    /// Modules importing the given module, sync or async
    pub fn importers(&self, id: ModuleId) -> impl Iterator<Item = ModuleId> + '_ {
        self.importers.get(id).into_iter().flatten().copied()
    }

    /// Number of distinct importing modules
    pub fn reference_count(&self, id: ModuleId) -> usize {
        self.importers.get(id).map_or(0, BTreeSet::len)
    }

    /// Get all modules reachable from a given module through static imports (BFS)
    pub fn get_reachable_modules(&self, start: ModuleId) -> Vec<ModuleId> {
        let mut visited = HashSet::new();
        let mut result = Vec::new();
        let mut queue = VecDeque::new();

        queue.push_back(start);
        visited.insert(start);

        while let Some(id) = queue.pop_front() {
            result.push(id);

            for &(dep_id, kind) in self.dependencies(id) {
                if kind == DependencyKind::Sync && visited.insert(dep_id) {
                    queue.push_back(dep_id);
                }
            }
        }

        result
    }

    /// Order modules so that every dependency precedes its importers
    ///
    /// Fails with [`BuildError::GraphCycle`] naming the first cycle found.
    pub fn topological_order(&self) -> Result<Vec<ModuleId>, BuildError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }

        let mut marks = vec![Mark::Unvisited; self.modules.len()];
        let mut order = Vec::with_capacity(self.modules.len());

        for root in self.all_module_ids() {
            if marks[root] != Mark::Unvisited {
                continue;
            }

            let mut stack: Vec<(ModuleId, usize)> = vec![(root, 0)];
            marks[root] = Mark::InProgress;

            while let Some((node, next)) = stack.last_mut() {
                let node = *node;
                let Some(&(dep, _)) = self.edges[node].get(*next) else {
                    marks[node] = Mark::Done;
                    order.push(node);
                    stack.pop();
                    continue;
                };
                *next += 1;

                match marks[dep] {
                    Mark::Unvisited => {
                        marks[dep] = Mark::InProgress;
                        stack.push((dep, 0));
                    }
                    Mark::InProgress => {
                        let start = stack.iter().position(|&(n, _)| n == dep).unwrap_or(0);
                        let mut cycle: Vec<String> = stack[start..]
                            .iter()
                            .map(|&(n, _)| self.modules[n].id.clone())
                            .collect();
                        cycle.push(self.modules[dep].id.clone());
                        return Err(BuildError::GraphCycle { cycle });
                    }
                    Mark::Done => {}
                }
            }
        }

        Ok(order)
    }

    /// Total number of modules
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Check if graph is empty
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
