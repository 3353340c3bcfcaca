//! Chunk partitioning
//!
//! Turns a module graph plus [`SplitRules`] into a set of chunks. The pass is
//! a pure function of its inputs:
//!
//! 1. discover load points (entries and dynamic-import targets) and what each
//!    one needs beyond what its parents already loaded
//! 2. let cache groups claim modules, highest priority first
//! 3. group claimed modules into candidate chunks per connected component
//! 4. drop candidates that violate size thresholds, reuse matching chunks
//! 5. merge chunks back until every load point fits its request ceiling
//!
//! Every module ends up in exactly one chunk; load points share chunks
//! instead of duplicating modules.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{BuildError, Chunk, ChunkKind, DependencyKind, LoadPoint, ModuleGraph, ModuleId, SplitRules};
use crate::utils::{chunk_name_fragment, unique_name};

/// Result of partitioning a module graph
#[derive(Debug, Clone)]
pub struct Partition {
    /// Emitted chunks, none of them empty
    pub chunks: Vec<Chunk>,

    /// Load points in dependency order: parents before the loads they trigger
    pub load_points: Vec<LoadPoint>,

    /// Chunk index of every module
    module_chunk: Vec<usize>,
}

impl Partition {
    /// Chunk holding the given module
    pub fn chunk_of(&self, module: ModuleId) -> Option<&Chunk> {
        self.module_chunk.get(module).map(|&c| &self.chunks[c])
    }

    /// Look up a chunk by name
    pub fn chunk(&self, name: &str) -> Option<&Chunk> {
        self.chunks.iter().find(|c| c.name == name)
    }

    /// Look up a load point by name
    pub fn load_point(&self, name: &str) -> Option<&LoadPoint> {
        self.load_points.iter().find(|lp| lp.name == name)
    }

    /// Chunks requested by a load point, in request order
    pub fn requested_chunks<'a>(&'a self, load_point: &'a LoadPoint) -> impl Iterator<Item = &'a Chunk> + 'a {
        load_point.chunks.iter().map(move |&c| &self.chunks[c])
    }

    /// Serializable description of the partition
    pub fn manifest(&self, graph: &ModuleGraph) -> PartitionManifest {
        let chunks = self
            .chunks
            .iter()
            .map(|chunk| ChunkManifest {
                name: chunk.name.clone(),
                kind: chunk.kind,
                size: chunk.size,
                cache_group: chunk.cache_group.clone(),
                reused: chunk.reused,
                modules: chunk
                    .module_ids
                    .iter()
                    .map(|&m| graph.module(m).id.clone())
                    .collect(),
            })
            .collect();

        let load_points = self
            .load_points
            .iter()
            .map(|lp| LoadPointManifest {
                name: lp.name.clone(),
                kind: lp.kind,
                root: graph.module(lp.root).id.clone(),
                chunks: lp.chunks.iter().map(|&c| self.chunks[c].name.clone()).collect(),
            })
            .collect();

        PartitionManifest { chunks, load_points }
    }
}

/// Chunk manifest written next to the build output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionManifest {
    pub chunks: Vec<ChunkManifest>,
    pub load_points: Vec<LoadPointManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkManifest {
    pub name: String,
    pub kind: ChunkKind,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_group: Option<String>,
    #[serde(default)]
    pub reused: bool,
    pub modules: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPointManifest {
    pub name: String,
    pub kind: ChunkKind,
    pub root: String,
    pub chunks: Vec<String>,
}

/// Split a module graph into chunks
///
/// Fails with [`BuildError::GraphCycle`] if the graph is not acyclic. No
/// partial partition is ever returned.
pub fn partition(graph: &ModuleGraph, rules: &SplitRules) -> Result<Partition, BuildError> {
    let order = graph.topological_order()?;

    let mut planner = Planner::new(graph, rules, &order);
    planner.claim_modules();
    planner.form_chunks();
    planner.enforce_request_ceilings();

    let partition = planner.finish();

    info!(
        "Partitioned {} modules into {} chunks for {} load points",
        graph.len(),
        partition.chunks.len(),
        partition.load_points.len()
    );

    Ok(partition)
}

/// A load point while partitioning is in progress
#[derive(Debug)]
struct LoadPlan {
    name: String,
    kind: ChunkKind,
    root: ModuleId,
    parents: BTreeSet<usize>,
    /// Modules statically reachable from the root
    reach: BTreeSet<ModuleId>,
    /// Reachable modules not already loaded by every parent
    need: BTreeSet<ModuleId>,
}

impl LoadPlan {
    fn new(name: String, kind: ChunkKind, root: ModuleId) -> Self {
        Self {
            name,
            kind,
            root,
            parents: BTreeSet::new(),
            reach: BTreeSet::new(),
            need: BTreeSet::new(),
        }
    }
}

/// Modules a cache group wants to move into one chunk
#[derive(Debug)]
struct Candidate {
    group: usize,
    modules: Vec<ModuleId>,
    size: u64,
}

struct Planner<'a> {
    graph: &'a ModuleGraph,
    rules: &'a SplitRules,
    /// Position of each module in dependency order
    rank: Vec<usize>,
    plans: Vec<LoadPlan>,
    /// Load points needing each module, ascending
    needed_by: Vec<Vec<usize>>,
    /// Cache group claiming each module
    claims: Vec<Option<usize>>,
    /// Cache group index behind each chunk, if any
    chunk_groups: Vec<Option<usize>>,
    /// Chunks under construction; index `i < plans.len()` is the main chunk of load point `i`
    chunks: Vec<Chunk>,
    module_chunk: Vec<usize>,
    names: HashSet<String>,
}

impl<'a> Planner<'a> {
    fn new(graph: &'a ModuleGraph, rules: &'a SplitRules, order: &[ModuleId]) -> Self {
        let mut rank = vec![0; graph.len()];
        for (pos, &id) in order.iter().enumerate() {
            rank[id] = pos;
        }

        let mut names = HashSet::new();
        let plans = order_load_points(discover_load_points(graph, &mut names));
        let plans = resolve_needs(plans);

        let mut needed_by = vec![Vec::new(); graph.len()];
        for (lp, plan) in plans.iter().enumerate() {
            for &m in &plan.need {
                needed_by[m].push(lp);
            }
        }

        let chunks: Vec<Chunk> = plans
            .iter()
            .map(|plan| Chunk::main(plan.name.clone(), plan.kind))
            .collect();

        debug!("Discovered {} load points", plans.len());

        Self {
            graph,
            rules,
            rank,
            chunk_groups: vec![None; chunks.len()],
            chunks,
            needed_by,
            claims: vec![None; graph.len()],
            module_chunk: vec![0; graph.len()],
            plans,
            names,
        }
    }

    /// Step 1: assign each module to the first cache group that accepts it
    fn claim_modules(&mut self) {
        let groups = self.rules.cache_groups();

        for m in self.graph.all_module_ids() {
            let module = self.graph.module(m);
            let refs = self.graph.reference_count(m);

            self.claims[m] = groups.iter().position(|group| {
                group.matches(module)
                    && refs >= group.min_chunks
                    && self.needed_by[m]
                        .iter()
                        .any(|&lp| group.chunks.selects(self.plans[lp].kind))
            });

            if let Some(g) = self.claims[m] {
                debug!("Module {} claimed by cache group {}", module.id, groups[g].name);
            }
        }
    }

    /// Steps 2-4: build candidate chunks, check thresholds, place every module
    fn form_chunks(&mut self) {
        // Ungrouped modules go to the main chunk of the first load point needing them
        for m in self.graph.all_module_ids() {
            self.module_chunk[m] = self.needed_by[m].first().copied().unwrap_or(0);
        }

        // Bytes each load point still keeps outside split chunks
        let mut remaining: Vec<u64> = self
            .plans
            .iter()
            .map(|plan| plan.need.iter().map(|&m| self.graph.module(m).size).sum())
            .collect();

        for candidate in self.candidates() {
            let group = &self.rules.cache_groups()[candidate.group];
            let thresholds = &self.rules.thresholds;
            let enforced = thresholds.is_enforced(candidate.size);

            if candidate.size < group.min_size && !enforced {
                debug!(
                    "Cache group {}: {} bytes is below min size {}, keeping modules in place",
                    group.name, candidate.size, group.min_size
                );
                continue;
            }

            let needing: BTreeSet<usize> = candidate
                .modules
                .iter()
                .flat_map(|&m| self.needed_by[m].iter().copied())
                .collect();

            let reusable = if group.reuse_existing_chunk {
                needing.iter().copied().find(|&lp| {
                    let need = &self.plans[lp].need;
                    need.len() == candidate.modules.len()
                        && candidate.modules.iter().all(|m| need.contains(m))
                })
            } else {
                None
            };

            if let (None, Some(&only), false) = (reusable, needing.first(), enforced) {
                if needing.len() == 1 {
                    let left = remaining[only].saturating_sub(candidate.size);
                    if left > 0 && left < thresholds.min_remaining_size {
                        debug!(
                            "Cache group {}: split would leave {} bytes in {}, below min remaining size {}",
                            group.name, left, self.plans[only].name, thresholds.min_remaining_size
                        );
                        continue;
                    }
                }
            }

            for &lp in needing.iter().filter(|&&lp| reusable != Some(lp)) {
                let moved: u64 = candidate
                    .modules
                    .iter()
                    .filter(|&&m| self.plans[lp].need.contains(&m))
                    .map(|&m| self.graph.module(m).size)
                    .sum();
                remaining[lp] = remaining[lp].saturating_sub(moved);
            }

            let target = match reusable {
                Some(lp) => {
                    debug!("Cache group {} reuses existing chunk {}", group.name, self.chunks[lp].name);
                    self.chunks[lp].cache_group = Some(group.name.clone());
                    self.chunks[lp].reused = true;
                    self.chunk_groups[lp] = Some(candidate.group);
                    lp
                }
                None => {
                    let base = match &group.chunk_name {
                        Some(name) => name.clone(),
                        None => {
                            let first = candidate.modules.iter().copied().min().unwrap_or_default();
                            format!("{}-{}", group.name, chunk_name_fragment(&self.graph.module(first).id))
                        }
                    };
                    let name = unique_name(&mut self.names, &base);
                    debug!(
                        "Cache group {} splits out {} ({} modules, {} bytes{})",
                        group.name,
                        name,
                        candidate.modules.len(),
                        candidate.size,
                        if enforced { ", enforced" } else { "" }
                    );
                    self.chunks.push(Chunk::split(name, group.name.clone()));
                    self.chunk_groups.push(Some(candidate.group));
                    self.chunks.len() - 1
                }
            };

            for &m in &candidate.modules {
                self.module_chunk[m] = target;
            }
        }

        for m in self.graph.all_module_ids() {
            let chunk = &mut self.chunks[self.module_chunk[m]];
            chunk.module_ids.push(m);
            chunk.size += self.graph.module(m).size;
        }
    }

    /// Claimed modules grouped by (cache group, connected component)
    fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::new();

        for (g, group) in self.rules.cache_groups().iter().enumerate() {
            let mut members: Vec<ModuleId> = self
                .graph
                .all_module_ids()
                .filter(|&m| self.claims[m] == Some(g))
                .collect();
            if members.is_empty() {
                continue;
            }
            members.sort_by_key(|&m| self.rank[m]);

            let components: Vec<Vec<ModuleId>> = if group.chunk_name.is_some() {
                vec![members]
            } else {
                self.components(g, &members)
            };

            for modules in components {
                let size = modules.iter().map(|&m| self.graph.module(m).size).sum();
                candidates.push(Candidate { group: g, modules, size });
            }
        }

        candidates
    }

    /// Split members of one group into connected components of the import graph
    fn components(&self, group: usize, members: &[ModuleId]) -> Vec<Vec<ModuleId>> {
        let mut parent: HashMap<ModuleId, ModuleId> = members.iter().map(|&m| (m, m)).collect();

        fn find(parent: &mut HashMap<ModuleId, ModuleId>, mut m: ModuleId) -> ModuleId {
            while parent[&m] != m {
                let grand = parent[&parent[&m]];
                parent.insert(m, grand);
                m = grand;
            }
            m
        }

        for &m in members {
            for &(dep, _) in self.graph.dependencies(m) {
                if self.claims[dep] == Some(group) {
                    let (a, b) = (find(&mut parent, m), find(&mut parent, dep));
                    if a != b {
                        // Keep the earliest module as representative
                        let (keep, merge) = if self.rank[a] <= self.rank[b] { (a, b) } else { (b, a) };
                        parent.insert(merge, keep);
                    }
                }
            }
        }

        let mut by_root: Vec<(ModuleId, Vec<ModuleId>)> = Vec::new();
        for &m in members {
            let root = find(&mut parent, m);
            match by_root.iter_mut().find(|(r, _)| *r == root) {
                Some((_, modules)) => modules.push(m),
                None => by_root.push((root, vec![m])),
            }
        }

        by_root.into_iter().map(|(_, modules)| modules).collect()
    }

    /// Chunks a load point currently pulls in
    fn requested(&self, lp: usize) -> BTreeSet<usize> {
        self.plans[lp].need.iter().map(|&m| self.module_chunk[m]).collect()
    }

    /// Step 5: merge chunks into main chunks until request ceilings hold
    ///
    /// A merge never raises another load point's request count, so one pass in
    /// load point order is enough. Ceilings take precedence over
    /// `enforce_size_threshold`: enforced chunks are merged only once nothing
    /// else is left to merge.
    fn enforce_request_ceilings(&mut self) {
        let thresholds = self.rules.thresholds;

        for lp in 0..self.plans.len() {
            let ceiling = thresholds.max_requests(self.plans[lp].kind);

            loop {
                let requested = self.requested(lp);
                if requested.len() <= ceiling {
                    break;
                }

                let victim = requested
                    .iter()
                    .copied()
                    .filter(|&c| c != lp)
                    .min_by_key(|&c| self.merge_preference(c));
                let Some(victim) = victim else {
                    break;
                };

                debug!(
                    "Load point {} requests {} chunks (max {}), merging {} into {}",
                    self.plans[lp].name,
                    requested.len(),
                    ceiling,
                    self.chunks[victim].name,
                    self.chunks[lp].name
                );
                self.merge_into(victim, lp);
            }
        }
    }

    /// Sort key for merge victims: smallest key is merged first
    ///
    /// Another load point's main chunk is only taken once no cache group
    /// chunk is left to merge.
    fn merge_preference(&self, chunk: usize) -> (bool, bool, i32, u64, usize) {
        let is_main = chunk < self.plans.len();
        let priority = self.chunk_groups[chunk]
            .map(|g| self.rules.cache_groups()[g].priority)
            .unwrap_or(i32::MIN);
        let size = self.chunks[chunk].size;
        (is_main, self.rules.thresholds.is_enforced(size), priority, size, chunk)
    }

    fn merge_into(&mut self, victim: usize, host: usize) {
        let moved = std::mem::take(&mut self.chunks[victim].module_ids);
        let size = std::mem::take(&mut self.chunks[victim].size);

        for &m in &moved {
            self.module_chunk[m] = host;
        }

        let host_chunk = &mut self.chunks[host];
        host_chunk.module_ids.extend(moved);
        host_chunk.size += size;
    }

    /// Drop empty chunks, order modules, and link chunks with load points
    fn finish(mut self) -> Partition {
        let mut remap = vec![usize::MAX; self.chunks.len()];
        let mut chunks = Vec::new();

        for (old, mut chunk) in std::mem::take(&mut self.chunks).into_iter().enumerate() {
            if chunk.is_empty() {
                continue;
            }
            chunk.module_ids.sort_by_key(|&m| self.rank[m]);
            remap[old] = chunks.len();
            chunks.push(chunk);
        }

        let mut load_points = Vec::with_capacity(self.plans.len());
        for (lp, plan) in self.plans.iter().enumerate() {
            let requested: BTreeSet<usize> = plan.need.iter().map(|&m| remap[self.module_chunk[m]]).collect();
            let main = remap[lp];

            let mut order: Vec<usize> = requested.iter().copied().filter(|&c| c != main).collect();
            if requested.contains(&main) {
                order.push(main);
            }

            for &c in &order {
                let chunk: &mut Chunk = &mut chunks[c];
                if chunk.load_points.is_empty() {
                    chunk.kind = plan.kind;
                } else if plan.kind == ChunkKind::Initial {
                    chunk.kind = ChunkKind::Initial;
                }
                chunk.load_points.push(lp);
            }

            load_points.push(LoadPoint {
                name: plan.name.clone(),
                kind: plan.kind,
                root: plan.root,
                chunks: order,
            });
        }

        let module_chunk = self.module_chunk.iter().map(|&c| remap[c]).collect();

        Partition {
            chunks,
            load_points,
            module_chunk,
        }
    }
}

/// Walk the graph from every entry, creating a load point per dynamic import target
///
/// Modules no entry reaches become implicit initial load points, so every
/// module is covered.
fn discover_load_points(graph: &ModuleGraph, names: &mut HashSet<String>) -> Vec<LoadPlan> {
    let mut plans: Vec<LoadPlan> = graph
        .entries()
        .iter()
        .map(|(name, root)| LoadPlan::new(unique_name(names, name), ChunkKind::Initial, *root))
        .collect();

    let mut async_by_root: HashMap<ModuleId, usize> = HashMap::new();
    let mut reached = vec![false; graph.len()];
    let mut next = 0;

    loop {
        while next < plans.len() {
            let reach = graph.get_reachable_modules(plans[next].root);

            for &m in &reach {
                reached[m] = true;

                for &(dep, kind) in graph.dependencies(m) {
                    if kind != DependencyKind::Async {
                        continue;
                    }
                    let child = match async_by_root.get(&dep) {
                        Some(&child) => child,
                        None => {
                            let name = unique_name(names, &graph.module(dep).id);
                            plans.push(LoadPlan::new(name, ChunkKind::Async, dep));
                            async_by_root.insert(dep, plans.len() - 1);
                            plans.len() - 1
                        }
                    };
                    plans[child].parents.insert(next);
                }
            }

            plans[next].reach = reach.into_iter().collect();
            next += 1;
        }

        let orphans: Vec<ModuleId> = graph
            .all_module_ids()
            .filter(|&m| !reached[m] && graph.reference_count(m) == 0)
            .collect();
        if orphans.is_empty() {
            break;
        }

        for m in orphans {
            let id = &graph.module(m).id;
            warn!("Module {} is not reachable from any entry, loading it as its own entry", id);
            plans.push(LoadPlan::new(unique_name(names, id), ChunkKind::Initial, m));
        }
    }

    plans
}

/// Reorder load points so parents come first, lowest discovery index winning ties
fn order_load_points(plans: Vec<LoadPlan>) -> Vec<LoadPlan> {
    let n = plans.len();
    let mut children = vec![Vec::new(); n];
    let mut pending: Vec<usize> = plans.iter().map(|p| p.parents.len()).collect();

    for (i, plan) in plans.iter().enumerate() {
        for &parent in &plan.parents {
            children[parent].push(i);
        }
    }

    // Load points form a DAG whenever the module graph does
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n).filter(|&i| pending[i] == 0).map(Reverse).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(i)) = ready.pop() {
        order.push(i);
        for &child in &children[i] {
            pending[child] -= 1;
            if pending[child] == 0 {
                ready.push(Reverse(child));
            }
        }
    }

    let mut new_index = vec![0; n];
    for (pos, &old) in order.iter().enumerate() {
        new_index[old] = pos;
    }

    let mut slots: Vec<Option<LoadPlan>> = plans.into_iter().map(Some).collect();
    order
        .iter()
        .filter_map(|&old| slots[old].take())
        .map(|mut plan| {
            plan.parents = plan.parents.iter().map(|&p| new_index[p]).collect();
            plan
        })
        .collect()
}

/// Subtract from each load point what all of its parents already provide
fn resolve_needs(mut plans: Vec<LoadPlan>) -> Vec<LoadPlan> {
    let mut loaded: Vec<BTreeSet<ModuleId>> = Vec::with_capacity(plans.len());

    for i in 0..plans.len() {
        let mut available: Option<BTreeSet<ModuleId>> = None;
        for &p in &plans[i].parents {
            let from_parent = &loaded[p];
            available = Some(match available {
                None => from_parent.clone(),
                Some(acc) => acc.intersection(from_parent).copied().collect(),
            });
        }
        let available = available.unwrap_or_default();

        plans[i].need = plans[i].reach.difference(&available).copied().collect();
        loaded.push(available.union(&plans[i].reach).copied().collect());
    }

    plans
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::bundler::{GraphSpec, Module};
    use crate::config::{CacheGroupConfig, SplitChunksConfig};

    fn graph(json: &str) -> ModuleGraph {
        let spec: GraphSpec = serde_json::from_str(json).unwrap();
        ModuleGraph::from_spec(&spec).unwrap()
    }

    fn rules(config: SplitChunksConfig) -> SplitRules {
        SplitRules::compile(&config).unwrap()
    }

    fn vendors(config: SplitChunksConfig) -> SplitRules {
        rules(SplitChunksConfig {
            chunks: "all".to_string(),
            cache_groups: vec![CacheGroupConfig {
                test: Some("node_modules".to_string()),
                ..CacheGroupConfig::new("vendors")
            }],
            ..config
        })
    }

    fn chunk_name(partition: &Partition, graph: &ModuleGraph, module: &str) -> String {
        let id = graph.get_module_id(module).unwrap();
        partition.chunk_of(id).unwrap().name.clone()
    }

    fn assert_exact_cover(partition: &Partition, graph: &ModuleGraph) {
        for m in graph.all_module_ids() {
            let holders = partition.chunks.iter().filter(|c| c.contains(m)).count();
            assert_eq!(holders, 1, "module {} held by {} chunks", graph.module(m).id, holders);
        }
    }

    #[test]
    fn test_shared_library_split_into_own_chunk() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 1000, "dependencies": ["a.js", "c.js", "d.js"] },
                    { "id": "a.js", "size": 10000, "dependencies": ["shared-lib/b.js"] },
                    { "id": "c.js", "size": 1000, "dependencies": ["shared-lib/b.js"] },
                    { "id": "d.js", "size": 1000, "dependencies": ["shared-lib/b.js"] },
                    { "id": "shared-lib/b.js", "size": 30000 }
                ]
            }"#,
        );
        let rules = rules(SplitChunksConfig {
            chunks: "all".to_string(),
            cache_groups: vec![CacheGroupConfig {
                test: Some("shared-lib".to_string()),
                min_chunks: Some(2),
                priority: -10,
                ..CacheGroupConfig::new("shared")
            }],
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(chunk_name(&partition, &graph, "shared-lib/b.js"), "shared-shared_lib_b_js");
        assert_eq!(chunk_name(&partition, &graph, "a.js"), "main");

        let b = partition.chunk("shared-shared_lib_b_js").unwrap();
        assert_eq!(b.size, 30000);
        assert_eq!(b.kind, ChunkKind::Initial);
        assert_eq!(b.cache_group.as_deref(), Some("shared"));

        let main = partition.load_point("main").unwrap();
        let names: Vec<_> = partition.requested_chunks(main).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["shared-shared_lib_b_js", "main"]);
    }

    #[test]
    fn test_small_shared_module_stays_in_first_load_point() {
        let graph = graph(
            r#"{
                "entries": [
                    { "name": "a", "module": "a.js" },
                    { "name": "b", "module": "b.js" }
                ],
                "modules": [
                    { "id": "a.js", "size": 100, "dependencies": ["shared.js"] },
                    { "id": "b.js", "size": 100, "dependencies": ["shared.js"] },
                    { "id": "shared.js", "size": 500 }
                ]
            }"#,
        );
        let rules = rules(SplitChunksConfig {
            chunks: "all".to_string(),
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(partition.chunks.len(), 2);
        assert_eq!(chunk_name(&partition, &graph, "shared.js"), "a");

        let b = partition.load_point("b").unwrap();
        let names: Vec<_> = partition.requested_chunks(b).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_enforce_size_threshold_overrides_min_size() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 1000, "dependencies": ["node_modules/big/index.js", "node_modules/small/index.js"] },
                    { "id": "node_modules/big/index.js", "size": 60000 },
                    { "id": "node_modules/small/index.js", "size": 40000 }
                ]
            }"#,
        );
        let rules = vendors(SplitChunksConfig {
            min_size: 100_000,
            enforce_size_threshold: 50_000,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(chunk_name(&partition, &graph, "node_modules/big/index.js"), "vendors-node_modules_big_index_js");
        assert_eq!(chunk_name(&partition, &graph, "node_modules/small/index.js"), "main");
    }

    #[test]
    fn test_min_remaining_size_blocks_split() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 5000, "dependencies": ["node_modules/x/index.js"] },
                    { "id": "node_modules/x/index.js", "size": 30000 }
                ]
            }"#,
        );
        let rules = vendors(SplitChunksConfig {
            min_remaining_size: 10_000,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_eq!(partition.chunks.len(), 1);
        assert_eq!(chunk_name(&partition, &graph, "node_modules/x/index.js"), "main");
    }

    #[test]
    fn test_min_remaining_size_counts_earlier_splits() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 5000, "dependencies": ["node_modules/x/index.js", "node_modules/y/index.js"] },
                    { "id": "node_modules/x/index.js", "size": 30000 },
                    { "id": "node_modules/y/index.js", "size": 30000 }
                ]
            }"#,
        );
        let rules = vendors(SplitChunksConfig {
            min_remaining_size: 10_000,
            enforce_size_threshold: 1_000_000,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(partition.chunks.len(), 2);
        assert_eq!(partition.chunk("main").unwrap().size, 35000);
    }

    #[test]
    fn test_min_remaining_size_allows_empty_remainder() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 5000, "asyncDependencies": ["node_modules/lib/index.js"] },
                    { "id": "node_modules/lib/index.js", "size": 30000 }
                ]
            }"#,
        );
        let rules = vendors(SplitChunksConfig {
            min_remaining_size: 10_000,
            enforce_size_threshold: 1_000_000,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(chunk_name(&partition, &graph, "node_modules/lib/index.js"), "vendors-node_modules_lib_index_js");

        let lib = partition.load_point("node_modules/lib/index.js").unwrap();
        let names: Vec<_> = partition.requested_chunks(lib).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["vendors-node_modules_lib_index_js"]);
    }

    #[test]
    fn test_default_chunks_filter_only_splits_async_loads() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "src/main.js" } ],
                "modules": [
                    { "id": "src/main.js", "size": 1000, "dependencies": ["./node_modules/react/index.js"], "asyncDependencies": ["src/page.js"] },
                    { "id": "src/page.js", "size": 1000, "dependencies": ["./node_modules/chart/index.js"] },
                    { "id": "./node_modules/react/index.js", "size": 30000 },
                    { "id": "./node_modules/chart/index.js", "size": 30000 }
                ]
            }"#,
        );
        let rules = rules(SplitChunksConfig::default());

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(chunk_name(&partition, &graph, "./node_modules/react/index.js"), "main");
        assert_eq!(
            chunk_name(&partition, &graph, "./node_modules/chart/index.js"),
            "defaultVendors-node_modules_chart_index_js"
        );

        let chart = partition.chunk("defaultVendors-node_modules_chart_index_js").unwrap();
        assert_eq!(chart.kind, ChunkKind::Async);
    }

    #[test]
    fn test_modules_loaded_by_parent_are_not_requested_again() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 100, "dependencies": ["util.js"], "asyncDependencies": ["page.js"] },
                    { "id": "page.js", "size": 100, "dependencies": ["util.js"] },
                    { "id": "util.js", "size": 100 }
                ]
            }"#,
        );
        let partition = partition(&graph, &rules(SplitChunksConfig::default())).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(chunk_name(&partition, &graph, "util.js"), "main");

        let page = partition.load_point("page.js").unwrap();
        assert_eq!(page.kind, ChunkKind::Async);
        let names: Vec<_> = partition.requested_chunks(page).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["page.js"]);
    }

    #[test]
    fn test_reuse_existing_chunk() {
        let json = r#"{
            "entries": [ { "name": "main", "module": "main.js" } ],
            "modules": [
                { "id": "main.js", "size": 1000, "asyncDependencies": ["node_modules/lib/index.js"] },
                { "id": "node_modules/lib/index.js", "size": 30000 }
            ]
        }"#;
        let graph = graph(json);
        let group = |reuse| CacheGroupConfig {
            test: Some("node_modules".to_string()),
            reuse_existing_chunk: reuse,
            ..CacheGroupConfig::new("vendors")
        };

        let reused = partition(&graph, &rules(SplitChunksConfig {
            cache_groups: vec![group(true)],
            ..SplitChunksConfig::default()
        }))
        .unwrap();

        assert_eq!(reused.chunks.len(), 2);
        let lib = reused.chunk("node_modules/lib/index.js").unwrap();
        assert!(lib.reused);
        assert_eq!(lib.cache_group.as_deref(), Some("vendors"));

        let fresh = partition(&graph, &rules(SplitChunksConfig {
            cache_groups: vec![group(false)],
            ..SplitChunksConfig::default()
        }))
        .unwrap();

        assert_eq!(fresh.chunks.len(), 2);
        assert!(fresh.chunk("vendors-node_modules_lib_index_js").is_some());
        assert!(fresh.chunk("node_modules/lib/index.js").is_none());
    }

    const THREE_VENDORS: &str = r#"{
        "entries": [ { "name": "main", "module": "main.js" } ],
        "modules": [
            { "id": "main.js", "size": 1000, "dependencies": [
                "node_modules/big/index.js", "node_modules/mid/index.js", "node_modules/other/index.js"
            ] },
            { "id": "node_modules/big/index.js", "size": 60000 },
            { "id": "node_modules/mid/index.js", "size": 25000 },
            { "id": "node_modules/other/index.js", "size": 30000 }
        ]
    }"#;

    #[test]
    fn test_request_ceiling_merges_smallest_unenforced_chunks() {
        let graph = graph(THREE_VENDORS);
        let rules = vendors(SplitChunksConfig {
            max_initial_requests: 2,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(partition.load_point("main").unwrap().requests(), 2);
        assert_eq!(chunk_name(&partition, &graph, "node_modules/big/index.js"), "vendors-node_modules_big_index_js");
        assert_eq!(chunk_name(&partition, &graph, "node_modules/mid/index.js"), "main");
        assert_eq!(chunk_name(&partition, &graph, "node_modules/other/index.js"), "main");
        assert_eq!(partition.chunk("main").unwrap().size, 56000);
    }

    #[test]
    fn test_request_ceiling_wins_over_enforced_size() {
        let graph = graph(THREE_VENDORS);
        let rules = vendors(SplitChunksConfig {
            max_initial_requests: 1,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_eq!(partition.chunks.len(), 1);
        assert_eq!(partition.load_point("main").unwrap().requests(), 1);
        assert_eq!(partition.chunk("main").unwrap().size, 116000);
    }

    #[test]
    fn test_request_ceiling_keeps_sibling_main_chunks() {
        let graph = graph(
            r#"{
                "entries": [
                    { "name": "a", "module": "a.js" },
                    { "name": "b", "module": "b.js" }
                ],
                "modules": [
                    { "id": "a.js", "size": 100, "dependencies": ["shared.js"] },
                    { "id": "b.js", "size": 10000, "dependencies": ["shared.js", "node_modules/v/index.js"] },
                    { "id": "shared.js", "size": 100 },
                    { "id": "node_modules/v/index.js", "size": 30000 }
                ]
            }"#,
        );
        let rules = vendors(SplitChunksConfig {
            max_initial_requests: 2,
            ..SplitChunksConfig::default()
        });

        let partition = partition(&graph, &rules).unwrap();

        assert_exact_cover(&partition, &graph);
        assert_eq!(chunk_name(&partition, &graph, "a.js"), "a");
        assert_eq!(chunk_name(&partition, &graph, "b.js"), "b");
        assert_eq!(chunk_name(&partition, &graph, "node_modules/v/index.js"), "b");

        let a = partition.load_point("a").unwrap();
        let names: Vec<_> = partition.requested_chunks(a).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a"]);

        let b = partition.load_point("b").unwrap();
        let names: Vec<_> = partition.requested_chunks(b).map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_unreachable_module_gets_own_load_point() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "main.js" } ],
                "modules": [
                    { "id": "main.js", "size": 10 },
                    { "id": "tools/stray.js", "size": 10, "dependencies": ["tools/helper.js"] },
                    { "id": "tools/helper.js", "size": 10 }
                ]
            }"#,
        );
        let partition = partition(&graph, &rules(SplitChunksConfig::default())).unwrap();

        assert_exact_cover(&partition, &graph);
        let stray = partition.load_point("tools/stray.js").unwrap();
        assert_eq!(stray.kind, ChunkKind::Initial);
        assert_eq!(chunk_name(&partition, &graph, "tools/helper.js"), "tools/stray.js");
    }

    #[test]
    fn test_cycle_aborts_partition() {
        let graph = graph(
            r#"{
                "entries": [ { "name": "main", "module": "a.js" } ],
                "modules": [
                    { "id": "a.js", "size": 1, "dependencies": ["b.js"] },
                    { "id": "b.js", "size": 1, "asyncDependencies": ["a.js"] }
                ]
            }"#,
        );

        let err = partition(&graph, &rules(SplitChunksConfig::default())).unwrap_err();
        assert!(matches!(err, BuildError::GraphCycle { .. }));
    }

    #[test]
    fn test_connected_modules_share_a_chunk_and_partition_is_deterministic() {
        let mut graph = ModuleGraph::new();
        let main = graph.add_module(Module::new("main.js", 100)).unwrap();
        let react = graph.add_module(Module::new("node_modules/react/index.js", 15000)).unwrap();
        let scheduler = graph.add_module(Module::new("node_modules/scheduler/index.js", 15000)).unwrap();
        let lodash = graph.add_module(Module::new("node_modules/lodash/index.js", 25000)).unwrap();
        graph.add_dependency(main, react, DependencyKind::Sync);
        graph.add_dependency(react, scheduler, DependencyKind::Sync);
        graph.add_dependency(main, lodash, DependencyKind::Sync);
        graph.add_entry("main", main);

        let rules = vendors(SplitChunksConfig::default());
        let first = partition(&graph, &rules).unwrap();
        let second = partition(&graph, &rules).unwrap();

        assert_exact_cover(&first, &graph);
        assert_eq!(first.manifest(&graph), second.manifest(&graph));

        let react_chunk = first.chunk_of(react).unwrap();
        assert_eq!(react_chunk.name, "vendors-node_modules_react_index_js");
        assert_eq!(react_chunk.module_ids, vec![scheduler, react]);
        assert_eq!(first.chunk_of(lodash).unwrap().name, "vendors-node_modules_lodash_index_js");
    }
}
