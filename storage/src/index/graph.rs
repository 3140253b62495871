use geograph_core::model::NodeIndex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// Undirected adjacency graph keyed by node index.
///
/// Edge payloads are stored on both endpoints. Self-loops and edges to
/// unknown nodes are refused, so every edge always joins two live nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct AdjacencyGraph<N, E = ()> {
    nodes: BTreeMap<NodeIndex, N>,
    adjacency: BTreeMap<NodeIndex, BTreeMap<NodeIndex, E>>,
}

impl<N, E> AdjacencyGraph<N, E> {
    pub fn new() -> Self {
        Self {
            nodes: BTreeMap::new(),
            adjacency: BTreeMap::new(),
        }
    }

    /// Insert a node or replace its payload; existing edges are kept.
    pub fn add_node(&mut self, id: NodeIndex, data: N) -> Option<N> {
        self.adjacency.entry(id).or_default();
        self.nodes.insert(id, data)
    }

    pub fn remove_node(&mut self, id: NodeIndex) -> Option<N> {
        let data = self.nodes.remove(&id)?;
        if let Some(neighbors) = self.adjacency.remove(&id) {
            for neighbor in neighbors.keys() {
                if let Some(edges) = self.adjacency.get_mut(neighbor) {
                    edges.remove(&id);
                }
            }
        }
        Some(data)
    }

    pub fn contains_node(&self, id: NodeIndex) -> bool {
        self.nodes.contains_key(&id)
    }

    pub fn node(&self, id: NodeIndex) -> Option<&N> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &N)> {
        self.nodes.iter().map(|(id, data)| (*id, data))
    }

    /// Node indices in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes.keys().copied()
    }

    pub fn max_node_id(&self) -> Option<NodeIndex> {
        self.nodes.keys().next_back().copied()
    }

    /// Add an undirected edge. Returns false for self-loops or unknown
    /// endpoints; an existing edge gets its payload replaced.
    pub fn add_edge(&mut self, a: NodeIndex, b: NodeIndex, data: E) -> bool
    where
        E: Clone,
    {
        if a == b || !self.contains_node(a) || !self.contains_node(b) {
            return false;
        }
        self.adjacency.entry(a).or_default().insert(b, data.clone());
        self.adjacency.entry(b).or_default().insert(a, data);
        true
    }

    pub fn has_edge(&self, a: NodeIndex, b: NodeIndex) -> bool {
        self.edge(a, b).is_some()
    }

    pub fn edge(&self, a: NodeIndex, b: NodeIndex) -> Option<&E> {
        self.adjacency.get(&a).and_then(|edges| edges.get(&b))
    }

    /// 1-hop neighbors in ascending order.
    pub fn neighbors(&self, id: NodeIndex) -> impl Iterator<Item = NodeIndex> + '_ {
        self.adjacency
            .get(&id)
            .into_iter()
            .flat_map(|edges| edges.keys().copied())
    }

    /// Each undirected edge once, with the smaller index first.
    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, &E)> {
        self.adjacency.iter().flat_map(|(&source, edges)| {
            edges
                .iter()
                .filter(move |&(&target, _)| target > source)
                .map(move |(&target, data)| (source, target, data))
        })
    }

    /// Copy of the node set with no edges, ready for a different edge type.
    pub fn without_edges<F>(&self) -> AdjacencyGraph<N, F>
    where
        N: Clone,
    {
        AdjacencyGraph {
            nodes: self.nodes.clone(),
            adjacency: self.nodes.keys().map(|id| (*id, BTreeMap::new())).collect(),
        }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adjacency.values().map(BTreeMap::len).sum::<usize>() / 2
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Connected components, each sorted, ordered by smallest member.
    pub fn connected_components(&self) -> Vec<BTreeSet<NodeIndex>> {
        let mut visited = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.node_ids() {
            if visited.contains(&start) {
                continue;
            }

            let mut queue = VecDeque::new();
            let mut component = BTreeSet::new();

            visited.insert(start);
            queue.push_back(start);

            while let Some(node_id) = queue.pop_front() {
                component.insert(node_id);
                for neighbor_id in self.neighbors(node_id) {
                    if visited.insert(neighbor_id) {
                        queue.push_back(neighbor_id);
                    }
                }
            }

            components.push(component);
        }

        components
    }
}

impl<N, E> Default for AdjacencyGraph<N, E> {
    fn default() -> Self {
        Self::new()
    }
}
