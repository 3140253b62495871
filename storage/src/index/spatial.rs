use geo::Rect;
use geograph_core::model::NodeIndex;
use rstar::primitives::{GeomWithData, Rectangle};
use rstar::{PointDistance, RTree, AABB};

type IndexEntry = GeomWithData<Rectangle<[f64; 2]>, NodeIndex>;

fn to_rectangle(bbox: &Rect<f64>) -> Rectangle<[f64; 2]> {
    Rectangle::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y])
}

fn to_envelope(bbox: &Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min().x, bbox.min().y], [bbox.max().x, bbox.max().y])
}

/// R-tree over node bounding boxes.
///
/// Queries only take `&self`, so one index can serve many concurrent readers.
#[derive(Clone)]
pub struct SpatialIndex {
    tree: RTree<IndexEntry>,
}

impl std::fmt::Debug for SpatialIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpatialIndex")
            .field("len", &self.tree.size())
            .finish()
    }
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self { tree: RTree::new() }
    }

    pub fn bulk_load(entries: impl IntoIterator<Item = (NodeIndex, Rect<f64>)>) -> Self {
        let items: Vec<IndexEntry> = entries
            .into_iter()
            .map(|(id, bbox)| GeomWithData::new(to_rectangle(&bbox), id))
            .collect();
        Self {
            tree: RTree::bulk_load(items),
        }
    }

    pub fn insert(&mut self, id: NodeIndex, bbox: &Rect<f64>) {
        self.tree.insert(GeomWithData::new(to_rectangle(bbox), id));
    }

    /// Remove the entry for `id`. The box must be the one it was inserted with.
    pub fn remove(&mut self, id: NodeIndex, bbox: &Rect<f64>) -> bool {
        self.tree
            .remove(&GeomWithData::new(to_rectangle(bbox), id))
            .is_some()
    }

    /// Ids whose box intersects `bbox`, in no particular order.
    pub fn query(&self, bbox: &Rect<f64>) -> Vec<NodeIndex> {
        self.tree
            .locate_in_envelope_intersecting(&to_envelope(bbox))
            .map(|entry| entry.data)
            .collect()
    }

    /// Like [`SpatialIndex::query`], nearest box to the query centre first,
    /// ties broken by id.
    pub fn query_sorted(&self, bbox: &Rect<f64>) -> Vec<NodeIndex> {
        let center = bbox.center();
        let center = [center.x, center.y];

        let mut hits: Vec<(f64, NodeIndex)> = self
            .tree
            .locate_in_envelope_intersecting(&to_envelope(bbox))
            .map(|entry| (entry.geom().distance_2(&center), entry.data))
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        hits.into_iter().map(|(_, id)| id).collect()
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for SpatialIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Rect<f64> {
        Rect::new(coord! { x: x0, y: y0 }, coord! { x: x1, y: y1 })
    }

    fn sample_index() -> SpatialIndex {
        SpatialIndex::bulk_load([
            (0, rect(0.0, 0.0, 1.0, 1.0)),
            (1, rect(1.0, 0.0, 2.0, 1.0)),
            (2, rect(5.0, 5.0, 6.0, 6.0)),
        ])
    }

    #[test]
    fn test_query_includes_touching_boxes() {
        let index = sample_index();
        let mut hits = index.query(&rect(0.0, 0.0, 1.0, 1.0));
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }

    #[test]
    fn test_query_sorted_nearest_first() {
        let index = sample_index();
        let hits = index.query_sorted(&rect(0.5, 0.0, 10.0, 10.0));
        assert_eq!(hits.len(), 3);
        assert_eq!(hits.last(), Some(&0));
    }

    #[test]
    fn test_insert_and_remove() {
        let mut index = sample_index();
        let bbox = rect(5.5, 5.5, 7.0, 7.0);
        index.insert(3, &bbox);
        assert_eq!(index.len(), 4);

        assert!(index.remove(3, &bbox));
        assert!(!index.remove(3, &bbox));
        assert_eq!(index.query(&rect(6.5, 6.5, 7.0, 7.0)), Vec::<NodeIndex>::new());
    }
}
