use crate::geometry;
use crate::index::AdjacencyGraph;
use crate::polygon_graph::{GraphError, GraphId, NodeAttributes, PolygonGraph};
use geo::{Intersects, MultiPolygon};
use geograph_core::model::{ClassLabel, NodeIndex};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HabitatEdge {
    /// Gap between the two polygons; zero when they touch or overlap.
    pub distance: f64,
}

/// Subgraph of a [`PolygonGraph`] restricted to a set of classes, with edges
/// between polygons at most `max_travel_distance` apart.
#[derive(Debug, Clone)]
pub struct Habitat {
    name: String,
    origin: GraphId,
    valid_classes: BTreeSet<ClassLabel>,
    max_travel_distance: f64,
    graph: AdjacencyGraph<NodeAttributes, HabitatEdge>,
}

impl Habitat {
    pub(crate) fn build(
        source: &PolygonGraph,
        name: String,
        valid_classes: BTreeSet<ClassLabel>,
        max_travel_distance: f64,
    ) -> Result<Self, GraphError> {
        if max_travel_distance.is_nan() || max_travel_distance < 0.0 {
            return Err(GraphError::InvalidInput(
                "`max_travel_distance` must not be negative".to_string(),
            ));
        }

        let mut hgraph: AdjacencyGraph<NodeAttributes, HabitatEdge> =
            source.graph().without_edges();
        let invalid: Vec<NodeIndex> = hgraph
            .nodes()
            .filter(|(_, attrs)| !valid_classes.contains(&attrs.class_label))
            .map(|(id, _)| id)
            .collect();
        for id in invalid {
            hgraph.remove_node(id);
        }

        let members: Vec<(NodeIndex, NodeAttributes)> =
            hgraph.nodes().map(|(id, attrs)| (id, attrs.clone())).collect();
        for (node, attrs) in members {
            let Some(polygon) = source.table().geometry(node) else {
                continue;
            };
            let search = geometry::expand(&attrs.bounds, max_travel_distance);
            let mut buffered: Option<MultiPolygon<f64>> = None;

            for neighbour in source.spatial_index().query(&search) {
                if neighbour == node
                    || !hgraph.contains_node(neighbour)
                    || hgraph.has_edge(node, neighbour)
                {
                    continue;
                }
                let Some(neighbour_polygon) = source.table().geometry(neighbour) else {
                    continue;
                };

                // intersects is much cheaper than distance
                let distance = if neighbour_polygon.intersects(polygon) {
                    0.0
                } else if max_travel_distance > 0.0 {
                    let reach = buffered
                        .get_or_insert_with(|| geometry::buffer(polygon, max_travel_distance));
                    if !neighbour_polygon.intersects(&*reach) {
                        continue;
                    }
                    geometry::distance(polygon, neighbour_polygon)
                } else {
                    continue;
                };

                if distance <= max_travel_distance {
                    hgraph.add_edge(node, neighbour, HabitatEdge { distance });
                }
            }
        }

        debug!(
            habitat = %name,
            classes = valid_classes.len(),
            max_travel_distance,
            "habitat edges resolved"
        );

        Ok(Self {
            name,
            origin: source.id(),
            valid_classes,
            max_travel_distance,
            graph: hgraph,
        })
    }

    pub(crate) fn from_parts(
        name: String,
        origin: GraphId,
        valid_classes: BTreeSet<ClassLabel>,
        max_travel_distance: f64,
        graph: AdjacencyGraph<NodeAttributes, HabitatEdge>,
    ) -> Self {
        Self {
            name,
            origin,
            valid_classes,
            max_travel_distance,
            graph,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identity of the polygon graph this habitat was derived from.
    pub fn origin(&self) -> GraphId {
        self.origin
    }

    pub fn valid_classes(&self) -> &BTreeSet<ClassLabel> {
        &self.valid_classes
    }

    pub fn max_travel_distance(&self) -> f64 {
        self.max_travel_distance
    }

    pub fn graph(&self) -> &AdjacencyGraph<NodeAttributes, HabitatEdge> {
        &self.graph
    }
}
