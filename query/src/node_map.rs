use geograph_core::model::NodeIndex;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::ops::Not;
use std::sync::Arc;
use storage::PolygonGraph;

/// One-to-many identification of `src` nodes in `trg`.
///
/// Every node of `src` at construction time has an entry, possibly empty.
#[derive(Debug, Clone)]
pub struct NodeMap {
    src: Arc<PolygonGraph>,
    trg: Arc<PolygonGraph>,
    mapping: BTreeMap<NodeIndex, Vec<NodeIndex>>,
}

impl NodeMap {
    pub fn new(
        src: Arc<PolygonGraph>,
        trg: Arc<PolygonGraph>,
        mapping: BTreeMap<NodeIndex, Vec<NodeIndex>>,
    ) -> Self {
        Self { src, trg, mapping }
    }

    pub fn src_graph(&self) -> &Arc<PolygonGraph> {
        &self.src
    }

    pub fn trg_graph(&self) -> &Arc<PolygonGraph> {
        &self.trg
    }

    pub fn mapping(&self) -> &BTreeMap<NodeIndex, Vec<NodeIndex>> {
        &self.mapping
    }

    pub fn get(&self, src: NodeIndex) -> Option<&[NodeIndex]> {
        self.mapping.get(&src).map(Vec::as_slice)
    }

    pub fn iter(&self) -> btree_map::Iter<'_, NodeIndex, Vec<NodeIndex>> {
        self.mapping.iter()
    }

    pub fn len(&self) -> usize {
        self.mapping.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mapping.is_empty()
    }

    /// Total number of (src, trg) pairs.
    pub fn pair_count(&self) -> usize {
        self.mapping.values().map(Vec::len).sum()
    }

    /// The same identification seen from `trg`. Every current `trg` node gets
    /// an entry; targets come out in ascending source order.
    pub fn invert(&self) -> NodeMap {
        let mut inverted: BTreeMap<NodeIndex, Vec<NodeIndex>> =
            self.trg.node_indices().map(|index| (index, Vec::new())).collect();
        for (src, targets) in &self.mapping {
            for trg in targets {
                inverted.entry(*trg).or_default().push(*src);
            }
        }
        NodeMap::new(Arc::clone(&self.trg), Arc::clone(&self.src), inverted)
    }
}

impl Not for &NodeMap {
    type Output = NodeMap;

    fn not(self) -> NodeMap {
        self.invert()
    }
}

impl PartialEq for NodeMap {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.src, &other.src)
            && Arc::ptr_eq(&self.trg, &other.trg)
            && self.mapping == other.mapping
    }
}

impl<'a> IntoIterator for &'a NodeMap {
    type Item = (&'a NodeIndex, &'a Vec<NodeIndex>);
    type IntoIter = btree_map::Iter<'a, NodeIndex, Vec<NodeIndex>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::polygon;
    use geograph_core::model::PolygonTable;
    use storage::GraphOptions;

    fn graph(count: usize) -> Arc<PolygonGraph> {
        let rows = (0..count).map(|i| {
            let x = i as f64 * 2.0;
            (
                polygon![
                    (x: x, y: 0.0),
                    (x: x + 1.0, y: 0.0),
                    (x: x + 1.0, y: 1.0),
                    (x: x, y: 1.0),
                ],
                1,
            )
        });
        let table = PolygonTable::from_rows(rows);
        Arc::new(PolygonGraph::from_table(table, GraphOptions::default()).unwrap())
    }

    #[test]
    fn test_invert_covers_every_target_node() {
        let src = graph(2);
        let trg = graph(3);
        let map = NodeMap::new(
            Arc::clone(&src),
            Arc::clone(&trg),
            BTreeMap::from([(0, vec![0, 1]), (1, vec![1])]),
        );

        let inverted = !&map;
        assert!(Arc::ptr_eq(inverted.src_graph(), &trg));
        assert_eq!(inverted.get(0), Some(&[0][..]));
        assert_eq!(inverted.get(1), Some(&[0, 1][..]));
        assert_eq!(inverted.get(2), Some(&[][..]));
        assert_eq!(inverted.len(), 3);
        assert_eq!(inverted.pair_count(), map.pair_count());
        assert_eq!(inverted.invert(), map);
    }

    #[test]
    fn test_equality_requires_same_graphs() {
        let src = graph(1);
        let mapping = BTreeMap::from([(0, vec![0])]);
        let a = NodeMap::new(Arc::clone(&src), Arc::clone(&src), mapping.clone());
        let b = NodeMap::new(Arc::clone(&src), Arc::clone(&src), mapping.clone());
        let other = NodeMap::new(Arc::clone(&src), graph(1), mapping);

        assert_eq!(a, b);
        assert_ne!(a, other);
    }
}
