//! Dependency graph normalization
//!
//! Turns the dependency tree proposed by the integration role into one the
//! synthesis stage can walk: canonical keys, resolved dependency references,
//! no cycles, and an implementation order in which every file's dependencies
//! come strictly earlier.

use super::model::{file_name, normalize_path, DependencyFile};
use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graph::{DiGraph, NodeIndex};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// A normalized graph plus what had to change to get there
#[derive(Debug, Clone, Default)]
pub struct NormalizedGraph {
    pub files: Vec<DependencyFile>,
    pub notes: Vec<String>,
}

/// Normalize `files` into a DAG with a valid implementation order
///
/// `root_prefix` is the root folder's name when it should be stripped from
/// the front of paths. Files keep their listed order; edges are examined in
/// that order, so cycle breaking is deterministic.
pub fn normalize_graph(files: Vec<DependencyFile>, root_prefix: Option<&str>) -> NormalizedGraph {
    let mut notes = Vec::new();

    let files = canonicalize(files, root_prefix, &mut notes);
    let mut files = resolve_references(files, root_prefix, &mut notes);
    break_cycles(&mut files, &mut notes);
    assign_order(&mut files, &mut notes);
    recompute_dependents(&mut files);

    NormalizedGraph { files, notes }
}

/// Canonical key for a path as written by the model
pub fn canonical_key(path: &str, root_prefix: Option<&str>) -> String {
    let path = normalize_path(path);
    match root_prefix.map(normalize_path).filter(|root| !root.is_empty()) {
        Some(root) => match path.strip_prefix(&format!("{}/", root)) {
            Some(rest) => rest.to_string(),
            None => path,
        },
        None => path,
    }
}

fn canonicalize(files: Vec<DependencyFile>, root_prefix: Option<&str>, notes: &mut Vec<String>) -> Vec<DependencyFile> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(files.len());

    for mut file in files {
        let key = canonical_key(&file.key(), root_prefix);
        if key.is_empty() {
            warn!("Dropping dependency entry without a path or name");
            notes.push("Dropped a dependency entry that had neither a path nor a name".to_string());
            continue;
        }
        if !seen.insert(key.clone()) {
            debug!("Duplicate dependency entry for {}", key);
            notes.push(format!("Merged duplicate dependency entry for {} (kept the first)", key));
            continue;
        }
        file.name = file_name(&key).to_string();
        file.path = key;
        out.push(file);
    }

    out
}

fn resolve_references(
    mut files: Vec<DependencyFile>,
    root_prefix: Option<&str>,
    notes: &mut Vec<String>,
) -> Vec<DependencyFile> {
    let keys: Vec<String> = files.iter().map(|f| f.path.clone()).collect();
    let key_set: HashSet<&str> = keys.iter().map(String::as_str).collect();
    let mut noted_external = HashSet::new();

    for file in &mut files {
        let mut resolved: Vec<String> = Vec::with_capacity(file.dependencies.len());

        for dep in &file.dependencies {
            let candidate = canonical_key(dep, root_prefix);
            let target = if key_set.contains(candidate.as_str()) {
                Some(candidate)
            } else {
                let suffix = format!("/{}", candidate);
                let matches: Vec<&String> =
                    keys.iter().filter(|k| !candidate.is_empty() && k.ends_with(&suffix)).collect();
                if let [only] = matches.as_slice() {
                    notes.push(format!("Resolved dependency '{}' of {} to {}", dep, file.path, only));
                    Some((*only).clone())
                } else {
                    None
                }
            };

            let entry = match target {
                Some(key) => key,
                None => {
                    let external = dep.trim().to_string();
                    if noted_external.insert(external.clone()) {
                        notes.push(format!(
                            "Dependency '{}' is not a project file; kept as external",
                            external
                        ));
                    }
                    external
                }
            };

            if !entry.is_empty() && !resolved.contains(&entry) {
                resolved.push(entry);
            }
        }

        file.dependencies = resolved;
    }

    files
}

/// Demote edges that would close a cycle to advisory dependencies
fn break_cycles(files: &mut [DependencyFile], notes: &mut Vec<String>) {
    let index: HashMap<String, usize> =
        files.iter().enumerate().map(|(i, f)| (f.path.clone(), i)).collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..files.len()).map(|i| graph.add_node(i)).collect();

    for i in 0..files.len() {
        let deps = std::mem::take(&mut files[i].dependencies);
        let mut kept = Vec::with_capacity(deps.len());

        for dep in deps {
            let Some(&j) = index.get(&dep) else {
                kept.push(dep);
                continue;
            };

            // Edge dep -> file closes a cycle when file already reaches dep
            if i == j || has_path_connecting(&graph, nodes[i], nodes[j], None) {
                warn!("Breaking dependency cycle: {} -> {}", files[i].path, dep);
                notes.push(format!(
                    "Dependency of {} on {} would create a cycle; kept as advisory",
                    files[i].path, dep
                ));
                files[i].advisory_dependencies.push(dep);
            } else {
                graph.add_edge(nodes[j], nodes[i], ());
                kept.push(dep);
            }
        }

        files[i].dependencies = kept;
    }
}

fn assign_order(files: &mut [DependencyFile], notes: &mut Vec<String>) {
    if validate_order(files).is_ok() {
        return;
    }

    let index: HashMap<String, usize> =
        files.iter().enumerate().map(|(i, f)| (f.path.clone(), i)).collect();

    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: Vec<NodeIndex> = (0..files.len()).map(|i| graph.add_node(i)).collect();
    for (i, file) in files.iter().enumerate() {
        for dep in &file.dependencies {
            if let Some(&j) = index.get(dep) {
                graph.add_edge(nodes[j], nodes[i], ());
            }
        }
    }

    // Cycles were broken above, so the sort cannot fail
    let sorted = match toposort(&graph, None) {
        Ok(sorted) => sorted,
        Err(cycle) => {
            warn!("Unexpected cycle at {:?}; keeping proposed order", cycle.node_id());
            return;
        }
    };

    let mut order = vec![1u32; files.len()];
    for node in sorted {
        let i = graph[node];
        let depth = files[i]
            .dependencies
            .iter()
            .filter_map(|dep| index.get(dep))
            .map(|&j| order[j] + 1)
            .max()
            .unwrap_or(1);
        order[i] = depth;
    }

    for (file, order) in files.iter_mut().zip(order) {
        file.implementation_order = order;
    }
    debug!("Recomputed implementation order for {} files", files.len());
    notes.push("Implementation order recomputed from dependency depth".to_string());
}

fn recompute_dependents(files: &mut [DependencyFile]) {
    let mut dependents: HashMap<String, Vec<String>> = HashMap::new();
    for file in files.iter() {
        for dep in &file.dependencies {
            dependents.entry(dep.clone()).or_default().push(file.path.clone());
        }
    }
    for file in files.iter_mut() {
        file.dependents = dependents.remove(&file.path).unwrap_or_default();
    }
}

/// Check the ordering invariant
///
/// Every order is at least 1 and every in-graph dependency has a strictly
/// smaller order than its dependent. Dependencies outside the graph are
/// ignored. Returns one message per violation.
pub fn validate_order(files: &[DependencyFile]) -> Result<(), Vec<String>> {
    let orders: HashMap<String, u32> =
        files.iter().map(|f| (f.key(), f.implementation_order)).collect();

    let mut violations = Vec::new();
    for file in files {
        let key = file.key();
        if file.implementation_order < 1 {
            violations.push(format!("{} has implementation order 0", key));
        }
        for dep in &file.dependencies {
            if let Some(&dep_order) = orders.get(dep) {
                if dep_order >= file.implementation_order {
                    violations.push(format!(
                        "{} (order {}) depends on {} (order {})",
                        key, file.implementation_order, dep, dep_order
                    ));
                }
            }
        }
    }

    if violations.is_empty() { Ok(()) } else { Err(violations) }
}

/// Files in synthesis order: implementation order, then path, then name
pub fn synthesis_order(files: &[DependencyFile]) -> Vec<&DependencyFile> {
    let mut ordered: Vec<&DependencyFile> = files.iter().collect();
    ordered.sort_by(|a, b| {
        a.implementation_order
            .cmp(&b.implementation_order)
            .then_with(|| a.path.cmp(&b.path))
            .then_with(|| a.name.cmp(&b.name))
    });
    ordered
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(path: &str, order: u32, deps: &[&str]) -> DependencyFile {
        DependencyFile::new(path, order).with_dependencies(deps.iter().copied())
    }

    fn by_path<'a>(files: &'a [DependencyFile], path: &str) -> &'a DependencyFile {
        files.iter().find(|f| f.path == path).unwrap()
    }

    #[test]
    fn test_valid_order_is_kept() {
        let graph = normalize_graph(vec![file("a", 1, &[]), file("b", 2, &["a"])], None);
        assert!(graph.notes.is_empty());
        assert_eq!(by_path(&graph.files, "a").implementation_order, 1);
        assert_eq!(by_path(&graph.files, "b").implementation_order, 2);
        assert_eq!(by_path(&graph.files, "a").dependents, vec!["b"]);
    }

    #[test]
    fn test_invalid_order_is_recomputed() {
        let files = vec![file("c", 1, &["b"]), file("b", 1, &["a"]), file("a", 5, &[])];
        let graph = normalize_graph(files, None);

        assert_eq!(by_path(&graph.files, "a").implementation_order, 1);
        assert_eq!(by_path(&graph.files, "b").implementation_order, 2);
        assert_eq!(by_path(&graph.files, "c").implementation_order, 3);
        assert!(validate_order(&graph.files).is_ok());
        assert!(graph.notes.iter().any(|n| n.contains("recomputed")));
    }

    #[test]
    fn test_cycle_is_broken_at_later_edge() {
        let files = vec![file("a", 1, &["b"]), file("b", 2, &["a"])];
        let graph = normalize_graph(files, None);

        // a -> b was seen first, so b's edge back to a is demoted
        let a = by_path(&graph.files, "a");
        let b = by_path(&graph.files, "b");
        assert_eq!(a.dependencies, vec!["b"]);
        assert!(b.dependencies.is_empty());
        assert_eq!(b.advisory_dependencies, vec!["a"]);
        assert!(validate_order(&graph.files).is_ok());
        assert!(graph.notes.iter().any(|n| n.contains("cycle")));
    }

    #[test]
    fn test_self_dependency_is_advisory() {
        let graph = normalize_graph(vec![file("a", 1, &["a"])], None);
        assert!(graph.files[0].dependencies.is_empty());
        assert_eq!(graph.files[0].advisory_dependencies, vec!["a"]);
    }

    #[test]
    fn test_references_are_resolved() {
        let files = vec![
            file("todo-app/src/db.js", 1, &[]),
            file("./src/api.js", 2, &["db.js", "express", "todo-app/src/db.js"]),
        ];
        let graph = normalize_graph(files, Some("todo-app"));

        let api = by_path(&graph.files, "src/api.js");
        assert_eq!(api.dependencies, vec!["src/db.js", "express"]);
        assert_eq!(api.name, "api.js");
        assert!(graph.notes.iter().any(|n| n.contains("'express'")));
        assert!(graph.notes.iter().any(|n| n.contains("Resolved dependency 'db.js'")));
        assert!(validate_order(&graph.files).is_ok());
    }

    #[test]
    fn test_ambiguous_suffix_is_external() {
        let files = vec![
            file("src/a/index.js", 1, &[]),
            file("src/b/index.js", 1, &[]),
            file("src/main.js", 2, &["index.js"]),
        ];
        let graph = normalize_graph(files, None);
        assert_eq!(by_path(&graph.files, "src/main.js").dependencies, vec!["index.js"]);
    }

    #[test]
    fn test_duplicates_are_merged() {
        let mut second = file("src/a.js", 3, &[]);
        second.description = "second".to_string();
        let graph = normalize_graph(vec![file("src/a.js", 1, &[]), second], None);
        assert_eq!(graph.files.len(), 1);
        assert_eq!(graph.files[0].implementation_order, 1);
        assert!(graph.notes[0].contains("duplicate"));
    }

    #[test]
    fn test_directory_style_paths() {
        let mut dir_style = DependencyFile::new("src", 1);
        dir_style.name = "index.js".to_string();
        let graph = normalize_graph(vec![dir_style], None);
        assert_eq!(graph.files[0].path, "src/index.js");
        assert_eq!(graph.files[0].key(), "src/index.js");
    }

    #[test]
    fn test_synthesis_order_ties() {
        let files = vec![file("b", 1, &[]), file("c", 2, &[]), file("a", 1, &[])];
        let order: Vec<&str> = synthesis_order(&files).iter().map(|f| f.path.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_validate_order_reports_violations() {
        let files = vec![file("a", 2, &[]), file("b", 2, &["a"]), file("c", 0, &[])];
        let violations = validate_order(&files).unwrap_err();
        assert_eq!(violations.len(), 2);
    }

    fn arbitrary_graph() -> impl Strategy<Value = Vec<DependencyFile>> {
        (1usize..12).prop_flat_map(|n| {
            prop::collection::vec(
                (0u32..5, prop::collection::vec(0..n, 0..4)),
                n,
            )
            .prop_map(|specs| {
                specs
                    .into_iter()
                    .enumerate()
                    .map(|(i, (order, deps))| {
                        DependencyFile::new(format!("src/f{}.js", i), order)
                            .with_dependencies(deps.into_iter().map(|d| format!("src/f{}.js", d)))
                    })
                    .collect()
            })
        })
    }

    proptest! {
        #[test]
        fn prop_normalized_graph_is_dag(files in arbitrary_graph()) {
            let count = files.len();
            let graph = normalize_graph(files, None);
            prop_assert_eq!(graph.files.len(), count);
            prop_assert!(validate_order(&graph.files).is_ok());

            // Every dependency is synthesized strictly before its dependent
            let ordered = synthesis_order(&graph.files);
            let position: HashMap<&str, usize> =
                ordered.iter().enumerate().map(|(i, f)| (f.path.as_str(), i)).collect();
            for (i, file) in ordered.iter().enumerate() {
                for dep in &file.dependencies {
                    prop_assert!(position[dep.as_str()] < i);
                }
            }
        }
    }
}
