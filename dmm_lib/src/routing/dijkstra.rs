use common::{Link, SwitchId, Topology};
use std::collections::{BTreeMap, BTreeSet};

/// Shortest-path tree rooted at one source. Switches missing from
/// `distance` are unreachable.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceTree {
    pub distance: BTreeMap<SwitchId, u64>,
    /// Link used to enter each reached switch (none for the source itself).
    pub previous: BTreeMap<SwitchId, Link>,
}

/// Per-source shortest-path trees for a whole topology snapshot.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RoutingResult {
    trees: BTreeMap<SwitchId, SourceTree>,
}

impl RoutingResult {
    /// `None` stands for an infinite distance.
    pub fn distance(&self, src: SwitchId, dst: SwitchId) -> Option<u64> {
        self.trees.get(&src)?.distance.get(&dst).copied()
    }

    pub fn previous(&self, src: SwitchId, dst: SwitchId) -> Option<&Link> {
        self.trees.get(&src)?.previous.get(&dst)
    }

    pub fn tree(&self, src: SwitchId) -> Option<&SourceTree> {
        self.trees.get(&src)
    }

    pub fn sources(&self) -> impl Iterator<Item = SwitchId> + '_ {
        self.trees.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}

/// Runs Dijkstra from every switch in `topology`.
pub fn compute_shortest_paths(topology: &Topology) -> RoutingResult {
    RoutingResult {
        trees: topology
            .ids()
            .map(|id| (id, shortest_path_tree(topology, id)))
            .collect(),
    }
}

/// Single-source Dijkstra using link weights as cost.
///
/// Candidates are ordered by `(distance, id)`, so among equally distant
/// switches the lowest id is settled first. Links towards switches that are
/// not part of `topology` are ignored.
pub fn shortest_path_tree(topology: &Topology, source: SwitchId) -> SourceTree {
    let mut tree = SourceTree::default();
    if !topology.contains(source) {
        return tree;
    }
    tree.distance.insert(source, 0);

    let mut candidates = BTreeSet::from([(0u64, source)]);
    let mut settled = BTreeSet::new();

    while let Some((dist, id)) = candidates.pop_first() {
        settled.insert(id);
        let Some(switch) = topology.get(id) else {
            continue;
        };
        for link in switch.links() {
            if settled.contains(&link.dst) || !topology.contains(link.dst) {
                continue;
            }
            let alt = dist + u64::from(link.weight);
            if tree.distance.get(&link.dst).is_some_and(|d| *d <= alt) {
                continue;
            }
            if let Some(old) = tree.distance.insert(link.dst, alt) {
                candidates.remove(&(old, link.dst));
            }
            tree.previous.insert(link.dst, *link);
            candidates.insert((alt, link.dst));
        }
    }
    tree
}
