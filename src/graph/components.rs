//! Connected-component extraction
//!
//! The "principal" subgraph is what the front end keeps in focus; every
//! node outside it is dimmed or hidden. Isolated nodes (degree zero) are
//! never part of it.
//!
//! Union-find over the undirected edge list. Time complexity:
//! O(E * α(V)), effectively linear.

use petgraph::unionfind::UnionFind;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::models::Edge;

/// Which components make up the principal subgraph.
///
/// It is unresolved whether "the main graph" means every component with an
/// edge or only the biggest one, so both are available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentPolicy {
    /// Every component with at least one edge
    #[default]
    AllConnected,
    /// Only the largest component (ties go to the one seen first)
    #[serde(alias = "largest")]
    LargestOnly,
}

impl std::str::FromStr for ComponentPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "all-connected" | "all" => Ok(ComponentPolicy::AllConnected),
            "largest" | "largest-only" => Ok(ComponentPolicy::LargestOnly),
            other => Err(format!("unknown component policy '{}'", other)),
        }
    }
}

/// Node ids in the principal subgraph, in first-seen edge order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PrincipalComponent {
    members: Vec<String>,
    index: FxHashSet<String>,
}

impl PrincipalComponent {
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains(id)
    }

    pub fn members(&self) -> &[String] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Compute the principal subgraph from an edge list.
pub fn principal_component<'a>(edges: &'a [Edge], policy: ComponentPolicy) -> PrincipalComponent {
    // Dense indices in first-seen order
    let mut ids: Vec<&str> = Vec::new();
    let mut index_of: FxHashMap<&str, usize> = FxHashMap::default();
    let mut pairs = Vec::with_capacity(edges.len());
    for edge in edges {
        let mut endpoint = |id: &'a str| -> usize {
            *index_of.entry(id).or_insert_with(|| {
                ids.push(id);
                ids.len() - 1
            })
        };
        let a = endpoint(edge.source.as_str());
        let b = endpoint(edge.target.as_str());
        pairs.push((a, b));
    }

    if ids.is_empty() {
        return PrincipalComponent::default();
    }

    let mut sets: UnionFind<usize> = UnionFind::new(ids.len());
    for &(a, b) in &pairs {
        sets.union(a, b);
    }

    // Self-loops alone do not make a component non-trivial
    let mut sizes: FxHashMap<usize, usize> = FxHashMap::default();
    for i in 0..ids.len() {
        *sizes.entry(sets.find(i)).or_insert(0) += 1;
    }
    let mut has_link: FxHashSet<usize> = FxHashSet::default();
    for &(a, b) in &pairs {
        if a != b {
            has_link.insert(sets.find(a));
        }
    }

    let keep: FxHashSet<usize> = match policy {
        ComponentPolicy::AllConnected => has_link,
        ComponentPolicy::LargestOnly => {
            let mut best: Option<(usize, usize)> = None;
            for i in 0..ids.len() {
                let root = sets.find(i);
                if !has_link.contains(&root) {
                    continue;
                }
                let size = sizes[&root];
                if best.map_or(true, |(_, best_size)| size > best_size) {
                    best = Some((root, size));
                }
            }
            best.into_iter().map(|(root, _)| root).collect()
        }
    };

    let members: Vec<String> = (0..ids.len())
        .filter(|&i| keep.contains(&sets.find(i)))
        .map(|i| ids[i].to_string())
        .collect();
    let index = members.iter().cloned().collect();

    PrincipalComponent { members, index }
}
