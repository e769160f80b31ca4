//! Chunk assignment.
//!
//! Every module that executes in the browser lands in exactly one chunk:
//!
//! - package modules, externals and stubs reachable from an entry group go to
//!   `vendors`, which also hosts the module runtime
//! - a local module reachable from one entry group goes to that group's chunk
//! - a local module reachable from several groups goes to a common chunk named
//!   after them (`admin~app`)
//! - a module reachable only through `import()` goes to an async chunk keyed
//!   by the set of async roots that reach it
//!
//! Style modules follow the same rules; each chunk's CSS is the concatenation
//! of its style modules in dependency-first order.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;

use crate::graph::{EdgeKind, ModuleGraph, ModuleId, ModuleKind};

pub const VENDORS: &str = "vendors";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ChunkKind {
    Vendors,
    Common,
    Entry,
    Async,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub name: String,
    pub kind: ChunkKind,
    /// Executable modules, sorted by id
    pub modules: Vec<ModuleId>,
    /// Style modules, dependencies before dependents
    pub styles: Vec<ModuleId>,
    /// Modules run as soon as the chunk is loaded
    pub entry: Vec<ModuleId>,
}

impl Chunk {
    fn new(name: impl Into<String>, kind: ChunkKind) -> Self {
        Self {
            name: name.into(),
            kind,
            modules: Vec::new(),
            styles: Vec::new(),
            entry: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty() && self.styles.is_empty() && self.entry.is_empty()
    }

    /// Loaded on demand rather than from the HTML document.
    pub fn is_async(&self) -> bool {
        self.kind == ChunkKind::Async
    }
}

/// Chunks of one build and the lookups the renderer needs.
#[derive(Debug, Clone, Default)]
pub struct ChunkPlan {
    /// Vendors, common chunks, entry chunks in declared order, then async chunks
    chunks: Vec<Chunk>,
    assignment: BTreeMap<ModuleId, usize>,
    async_loads: BTreeMap<ModuleId, Vec<usize>>,
}

impl ChunkPlan {
    pub fn build(graph: &ModuleGraph) -> Self {
        let groups = graph.entries();
        let executable = executable_modules(graph);
        let order = post_order(graph);

        // group indices statically reaching each module
        let mut reached_by: BTreeMap<ModuleId, BTreeSet<usize>> = BTreeMap::new();
        for (index, group) in groups.iter().enumerate() {
            for id in static_closure(graph, &group.modules) {
                reached_by.entry(id).or_default().insert(index);
            }
        }

        // async roots reaching each module that no entry group loads
        let roots = graph.async_roots();
        let mut async_keys: BTreeMap<ModuleId, BTreeSet<ModuleId>> = BTreeMap::new();
        for root in &roots {
            for id in static_closure(graph, std::slice::from_ref(root)) {
                if !reached_by.contains_key(&id) {
                    async_keys.entry(id).or_default().insert(root.clone());
                }
            }
        }

        let mut vendors = Chunk::new(VENDORS, ChunkKind::Vendors);
        let mut common: BTreeMap<Vec<usize>, Chunk> = BTreeMap::new();
        let mut entries: Vec<Chunk> = groups
            .iter()
            .map(|group| {
                let mut chunk = Chunk::new(group.name.clone(), ChunkKind::Entry);
                chunk.entry = group
                    .modules
                    .iter()
                    .filter(|id| executable.contains(*id))
                    .cloned()
                    .collect();
                chunk
            })
            .collect();
        let mut asyncs: BTreeMap<Vec<ModuleId>, Chunk> = BTreeMap::new();

        for id in &order {
            let Some(module) = graph.get(id) else { continue };
            let is_style = module.is_style();
            if !is_style && !executable.contains(id) {
                continue;
            }

            if let Some(reached) = reached_by.get(id) {
                if module.is_vendor() {
                    place(id, &mut vendors, is_style);
                } else if reached.len() == 1 {
                    let index = reached.iter().next().copied().unwrap_or_default();
                    place(id, &mut entries[index], is_style);
                } else {
                    let key: Vec<usize> = reached.iter().copied().collect();
                    let chunk = common.entry(key.clone()).or_insert_with(|| {
                        let name = key
                            .iter()
                            .map(|&i| groups[i].name.as_str())
                            .collect::<Vec<_>>()
                            .join("~");
                        Chunk::new(name, ChunkKind::Common)
                    });
                    place(id, chunk, is_style);
                }
            } else if let Some(key) = async_keys.get(id) {
                let key: Vec<ModuleId> = key.iter().cloned().collect();
                let chunk = asyncs.entry(key.clone()).or_insert_with(|| {
                    let name = key.iter().map(async_name).collect::<Vec<_>>().join("~");
                    Chunk::new(name, ChunkKind::Async)
                });
                place(id, chunk, is_style);
            }
        }

        let mut chunks = vec![vendors];
        chunks.extend(common.into_values().filter(|c| !c.is_empty()));
        chunks.extend(entries);
        let mut async_chunks: Vec<Chunk> = asyncs.into_values().collect();
        async_chunks.sort_by(|a, b| a.name.cmp(&b.name));
        chunks.extend(async_chunks);
        make_names_unique(&mut chunks);

        for chunk in &mut chunks {
            chunk.modules.sort();
        }

        let mut assignment = BTreeMap::new();
        for (index, chunk) in chunks.iter().enumerate() {
            for id in chunk.modules.iter().chain(&chunk.styles) {
                assignment.insert(id.clone(), index);
            }
        }

        let async_loads = roots
            .into_iter()
            .map(|root| {
                let needed = chunks
                    .iter()
                    .enumerate()
                    .filter(|(_, chunk)| chunk.is_async())
                    .filter(|(_, chunk)| {
                        chunk
                            .modules
                            .iter()
                            .chain(&chunk.styles)
                            .any(|id| async_keys.get(id).is_some_and(|key| key.contains(&root)))
                    })
                    .map(|(index, _)| index)
                    .collect();
                (root, needed)
            })
            .collect();

        Self {
            chunks,
            assignment,
            async_loads,
        }
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn chunk_of(&self, id: &ModuleId) -> Option<&Chunk> {
        self.assignment.get(id).map(|&index| &self.chunks[index])
    }

    /// Async chunks to load before `root` can run, in chunk order.
    pub fn async_chunks_for(&self, root: &ModuleId) -> Vec<&Chunk> {
        self.async_loads
            .get(root)
            .map(|indices| indices.iter().map(|&i| &self.chunks[i]).collect())
            .unwrap_or_default()
    }

    /// Chunks referenced from the HTML document, in injection order.
    pub fn initial_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| !c.is_async())
    }

    pub fn async_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.iter().filter(|c| c.is_async())
    }
}

fn place(id: &ModuleId, chunk: &mut Chunk, is_style: bool) {
    if is_style {
        chunk.styles.push(id.clone());
    } else {
        chunk.modules.push(id.clone());
    }
}

/// Chunk name for an async root: its id without the final extension, `/`
/// and `.` replaced.
fn async_name(root: &ModuleId) -> String {
    let id = root.as_str();
    let file_start = id.rfind('/').map(|i| i + 1).unwrap_or(0);
    let stem_end = id[file_start..]
        .rfind('.')
        .filter(|&i| i > 0)
        .map(|i| file_start + i)
        .unwrap_or(id.len());
    id[..stem_end]
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '-' })
        .collect()
}

/// Chunk files, the manifest and the runtime's file maps are all keyed by
/// chunk name. Later chunks that repeat a name get a numeric suffix.
fn make_names_unique(chunks: &mut [Chunk]) {
    let mut taken: FxHashSet<String> = FxHashSet::default();
    for chunk in chunks.iter_mut() {
        if !taken.contains(&chunk.name) {
            taken.insert(chunk.name.clone());
            continue;
        }
        let mut suffix = 2;
        let name = loop {
            let candidate = format!("{}-{suffix}", chunk.name);
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        tracing::debug!(from = %chunk.name, to = %name, "renamed colliding chunk");
        taken.insert(name.clone());
        chunk.name = name;
    }
}

/// Modules that need a factory in some script chunk: everything except
/// styles, and except media only referenced from CSS.
fn executable_modules(graph: &ModuleGraph) -> BTreeSet<ModuleId> {
    let mut referenced: BTreeSet<ModuleId> = graph
        .entries()
        .iter()
        .flat_map(|e| e.modules.iter().cloned())
        .collect();
    for module in graph.modules() {
        if matches!(module.kind, ModuleKind::Style { .. }) {
            continue;
        }
        referenced.extend(
            module
                .dependencies
                .iter()
                .filter(|d| matches!(d.kind, EdgeKind::Static | EdgeKind::Require | EdgeKind::Dynamic))
                .map(|d| d.target.clone()),
        );
    }
    graph
        .modules()
        .filter(|m| !m.is_style())
        .filter(|m| !matches!(m.kind, ModuleKind::Media { .. }) || referenced.contains(&m.id))
        .map(|m| m.id.clone())
        .collect()
}

/// Every module reachable from `starts` without crossing an `import()`.
fn static_closure(graph: &ModuleGraph, starts: &[ModuleId]) -> BTreeSet<ModuleId> {
    let mut seen = BTreeSet::new();
    let mut stack: Vec<ModuleId> = starts.iter().rev().cloned().collect();
    while let Some(id) = stack.pop() {
        if !seen.insert(id.clone()) {
            continue;
        }
        if let Some(module) = graph.get(&id) {
            stack.extend(module.static_dependencies().map(|d| d.target.clone()));
        }
    }
    seen
}

/// Depth-first post-order over the whole graph: entry groups in declared
/// order, then async roots. Dependencies come before their importers.
fn post_order(graph: &ModuleGraph) -> Vec<ModuleId> {
    let starts: Vec<ModuleId> = graph
        .entries()
        .iter()
        .flat_map(|e| e.modules.iter().cloned())
        .chain(graph.async_roots())
        .collect();

    let mut visited: FxHashSet<ModuleId> = FxHashSet::default();
    let mut order = Vec::with_capacity(graph.len());
    for start in starts {
        if !visited.insert(start.clone()) {
            continue;
        }
        // (module, index of the next dependency to visit)
        let mut stack = vec![(start, 0usize)];
        while let Some((id, next)) = stack.pop() {
            let dependency = graph
                .get(&id)
                .and_then(|m| m.static_dependencies().nth(next))
                .map(|d| d.target.clone());
            match dependency {
                Some(dep) => {
                    stack.push((id, next + 1));
                    if visited.insert(dep.clone()) {
                        stack.push((dep, 0));
                    }
                }
                None => order.push(id),
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BuildCaches;
    use crate::env::ClientEnvironment;
    use crate::graph::Loader;
    use crate::workers::WorkerPool;
    use kiln_config::{EntryGroup, KilnConfig, WorkerConfig};
    use std::fs;
    use tempfile::TempDir;

    fn plan(files: &[(&str, &str)], entries: Vec<EntryGroup>) -> (ChunkPlan, ModuleGraph) {
        let dir = TempDir::new().unwrap();
        for (path, content) in files {
            let full = dir.path().join(path);
            fs::create_dir_all(full.parent().unwrap()).unwrap();
            fs::write(full, content).unwrap();
        }
        let mut config = KilnConfig::with_root(dir.path().canonicalize().unwrap());
        config.entries = entries;
        let env = ClientEnvironment::with_process_vars(&config, Vec::new());
        let workers = WorkerPool::new(WorkerConfig::default());
        let caches = BuildCaches::default();
        let outcome = Loader::new(&config, &env, &workers, &caches)
            .unwrap()
            .load()
            .unwrap();
        assert!(outcome.diagnostics.is_empty(), "{:?}", outcome.diagnostics);
        (ChunkPlan::build(&outcome.graph), outcome.graph)
    }

    fn names(ids: &[ModuleId]) -> Vec<&str> {
        ids.iter().map(ModuleId::as_str).collect()
    }

    #[test]
    fn splits_vendors_common_and_entries() {
        let (plan, _) = plan(
            &[
                ("src/app.js", "import _ from 'lodash';\nimport { log } from './shared';\nlog(_);\n"),
                ("src/admin.js", "import React from 'react';\nimport { log } from './shared';\nlog(React);\n"),
                ("src/shared.js", "export function log(x) { return x; }\n"),
                ("node_modules/lodash/package.json", r#"{"name":"lodash","main":"index.js"}"#),
                ("node_modules/lodash/index.js", "module.exports = {};\n"),
            ],
            vec![
                EntryGroup::new("app", ["./src/app.js"]),
                EntryGroup::new("admin", ["./src/admin.js"]),
            ],
        );

        let chunks = plan.chunks();
        let summary: Vec<(&str, ChunkKind)> = chunks.iter().map(|c| (c.name.as_str(), c.kind)).collect();
        assert_eq!(
            summary,
            vec![
                ("vendors", ChunkKind::Vendors),
                ("app~admin", ChunkKind::Common),
                ("app", ChunkKind::Entry),
                ("admin", ChunkKind::Entry),
            ]
        );
        assert_eq!(names(&chunks[0].modules), vec!["external:react", "node_modules/lodash/index.js"]);
        assert_eq!(names(&chunks[1].modules), vec!["src/shared.js"]);
        assert_eq!(names(&chunks[2].modules), vec!["src/app.js"]);
        assert_eq!(names(&chunks[2].entry), vec!["src/app.js"]);
    }

    #[test]
    fn async_only_modules_are_keyed_by_their_roots() {
        let (plan, _) = plan(
            &[
                ("src/index.js", "import('./pages/a');\nimport('./pages/b');\n"),
                ("src/pages/a.js", "import { w } from './widget';\nimport './a.css';\nexport default w;\n"),
                ("src/pages/b.js", "import { w } from './widget';\nexport default w;\n"),
                ("src/pages/widget.js", "export const w = 1;\n"),
                ("src/pages/a.css", ".a { color: red; }\n"),
            ],
            vec![EntryGroup::new("index", ["./src/index.js"])],
        );

        let asyncs: Vec<&Chunk> = plan.async_chunks().collect();
        let summary: Vec<(&str, Vec<&str>)> = asyncs
            .iter()
            .map(|c| (c.name.as_str(), names(&c.modules)))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("src-pages-a", vec!["src/pages/a.js"]),
                ("src-pages-a~src-pages-b", vec!["src/pages/widget.js"]),
                ("src-pages-b", vec!["src/pages/b.js"]),
            ]
        );
        assert_eq!(names(&asyncs[0].styles), vec!["src/pages/a.css"]);

        let for_a: Vec<&str> = plan
            .async_chunks_for(&ModuleId::new("src/pages/a.js"))
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        assert_eq!(for_a, vec!["src-pages-a", "src-pages-a~src-pages-b"]);
    }

    #[test]
    fn styles_are_ordered_dependencies_first() {
        let (plan, graph) = plan(
            &[
                ("src/index.js", "import './main.css';\nimport './extra.css';\n"),
                ("src/main.css", "@import './reset.css';\n.main { color: red; }\n"),
                ("src/reset.css", "* { margin: 0; }\n"),
                ("src/extra.css", ".extra { background: url(./big.png); }\n"),
                ("src/big.png", "png"),
            ],
            vec![EntryGroup::new("index", ["./src/index.js"])],
        );

        let index = plan.chunk_of(&ModuleId::new("src/index.js")).unwrap();
        assert_eq!(
            names(&index.styles),
            vec!["src/reset.css", "src/main.css", "src/extra.css"]
        );
        // media only referenced from CSS needs no script factory
        assert!(plan.chunk_of(&ModuleId::new("src/big.png")).is_none());
        assert!(graph.contains(&ModuleId::new("src/big.png")));
    }

    #[test]
    fn vendors_chunk_always_exists() {
        let (plan, _) = plan(
            &[("src/index.js", "console.log(1);\n")],
            vec![EntryGroup::new("index", ["./src/index.js"])],
        );
        assert_eq!(plan.chunks()[0].name, VENDORS);
        assert!(plan.chunks()[0].modules.is_empty());
        assert_eq!(plan.initial_chunks().count(), 2);
    }

    #[test]
    fn async_names_are_path_based() {
        assert_eq!(async_name(&ModuleId::new("src/pages/About.page.tsx")), "src-pages-About-page");
        assert_eq!(async_name(&ModuleId::new("lazy.js")), "lazy");
        assert_eq!(async_name(&ModuleId::new("src/.hidden")), "src--hidden");
    }

    #[test]
    fn dotted_async_roots_get_distinct_chunks() {
        let (plan, _) = plan(
            &[
                ("src/index.js", "import('./views/user.list');
import('./views/user.detail');
import('./views/user-list');
"),
                ("src/views/user.list.js", "export default 'list';
"),
                ("src/views/user.detail.js", "export default 'detail';
"),
                ("src/views/user-list.js", "export default 'dashed';
"),
            ],
            vec![EntryGroup::new("index", ["./src/index.js"])],
        );

        let names: Vec<&str> = plan.async_chunks().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["src-views-user-detail", "src-views-user-list", "src-views-user-list-2"]
        );
        let list = plan.async_chunks_for(&ModuleId::new("src/views/user.list.js"));
        let dashed = plan.async_chunks_for(&ModuleId::new("src/views/user-list.js"));
        assert_eq!(list.len(), 1);
        assert_eq!(dashed.len(), 1);
        assert_ne!(list[0].name, dashed[0].name);
    }

    #[test]
    fn colliding_chunk_names_are_suffixed() {
        let mut chunks = vec![
            Chunk::new(VENDORS, ChunkKind::Vendors),
            Chunk::new("vendors", ChunkKind::Entry),
            Chunk::new("lazy", ChunkKind::Async),
            Chunk::new("lazy", ChunkKind::Async),
            Chunk::new("lazy-2", ChunkKind::Async),
        ];
        make_names_unique(&mut chunks);
        let names: Vec<&str> = chunks.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["vendors", "vendors-2", "lazy", "lazy-2", "lazy-2-2"]);
    }
}
