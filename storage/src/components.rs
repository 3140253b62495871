use crate::geometry;
use crate::habitat::Habitat;
use crate::polygon_graph::{GraphError, PolygonGraph};
use geo::{Area, MultiPolygon};
use geograph_core::model::NodeIndex;
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Which graph of a [`PolygonGraph`] to split into components.
#[derive(Debug, Clone, Copy)]
pub enum ComponentSource<'a> {
    Main,
    Habitat(&'a Habitat),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ComponentRow {
    pub geometry: MultiPolygon<f64>,
    pub node_count: usize,
    pub area: f64,
}

/// One row per connected component plus the raw node sets, both ordered by
/// each component's smallest node index.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphComponents {
    pub crs: String,
    pub rows: Vec<ComponentRow>,
    pub components: Vec<BTreeSet<NodeIndex>>,
}

impl GraphComponents {
    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Unioning a large component is slow; expect near-fully-connected graphs to
/// dominate the cost.
pub(crate) fn compute(
    graph: &PolygonGraph,
    source: ComponentSource<'_>,
) -> Result<GraphComponents, GraphError> {
    let components = match source {
        ComponentSource::Main => graph.graph().connected_components(),
        ComponentSource::Habitat(habitat) => {
            if habitat.origin() != graph.id() {
                return Err(GraphError::InvalidInput(format!(
                    "habitat `{}` was not derived from this graph",
                    habitat.name()
                )));
            }
            // A merge may reuse an index, so compare what the habitat saw
            // with the node that lives there now.
            if let Some((stale, _)) = habitat
                .graph()
                .nodes()
                .find(|(id, attrs)| graph.node(*id) != Some(*attrs))
            {
                return Err(GraphError::InvalidInput(format!(
                    "habitat `{}` is stale: node {stale} was removed or replaced",
                    habitat.name()
                )));
            }
            habitat.graph().connected_components()
        }
    };

    let mut rows = Vec::with_capacity(components.len());
    for component in &components {
        let geometry =
            geometry::union_all(component.iter().filter_map(|id| graph.table().geometry(*id)));
        debug!(nodes = component.len(), "component unioned");
        rows.push(ComponentRow {
            area: geometry.unsigned_area(),
            node_count: component.len(),
            geometry,
        });
    }

    info!(components = components.len(), "graph components computed");
    Ok(GraphComponents {
        crs: graph.crs().to_string(),
        rows,
        components,
    })
}
