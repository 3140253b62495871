use crate::bundle::BundleError;
use crate::components::{self, ComponentSource, GraphComponents};
use crate::geometry;
use crate::habitat::Habitat;
use crate::index::{AdjacencyGraph, SpatialIndex};
use crate::table::{AttributeRow, AttributeTable};
use geo::{Area, BoundingRect, InteriorPoint, Intersects, MultiPolygon, Point, Rect};
use geograph_core::config::{GraphSettings, DEFAULT_CRS};
use geograph_core::error::{ErrorCode, GeoGraphError};
use geograph_core::model::{ClassLabel, NodeIndex, PolygonTable, TableError};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum GraphError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("invalid table: {0}")]
    Table(#[from] TableError),
    #[error("unknown habitat: {0}")]
    UnknownHabitat(String),
    #[error("bundle error: {0}")]
    Bundle(#[from] BundleError),
}

impl GeoGraphError for GraphError {
    fn error_code(&self) -> ErrorCode {
        match self {
            GraphError::InvalidInput(_) => ErrorCode::InvalidInput,
            GraphError::Table(err) => err.error_code(),
            GraphError::UnknownHabitat(_) => ErrorCode::NotFound,
            GraphError::Bundle(err) => err.error_code(),
        }
    }
}

static NEXT_GRAPH_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`PolygonGraph`] instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GraphId(u64);

impl GraphId {
    fn next() -> Self {
        Self(NEXT_GRAPH_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphOptions {
    /// Adds edges between polygons at most this far apart.
    pub tolerance: f64,
    pub crs: String,
}

impl Default for GraphOptions {
    fn default() -> Self {
        Self {
            tolerance: 0.0,
            crs: DEFAULT_CRS.to_string(),
        }
    }
}

impl From<&GraphSettings> for GraphOptions {
    fn from(settings: &GraphSettings) -> Self {
        Self {
            tolerance: settings.tolerance,
            crs: settings.crs.clone(),
        }
    }
}

/// Derived attributes carried by every graph node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeAttributes {
    pub class_label: ClassLabel,
    pub area: f64,
    pub perimeter: f64,
    pub rep_point: Point<f64>,
    pub bounds: Rect<f64>,
}

impl NodeAttributes {
    pub fn from_geometry(
        geometry: &MultiPolygon<f64>,
        class_label: ClassLabel,
    ) -> Result<Self, GraphError> {
        let bounds = geometry
            .bounding_rect()
            .ok_or_else(|| GraphError::InvalidInput("polygon geometry is empty".to_string()))?;
        let rep_point = geometry.interior_point().ok_or_else(|| {
            GraphError::InvalidInput("polygon geometry has no interior point".to_string())
        })?;

        Ok(Self {
            class_label,
            area: geometry.unsigned_area(),
            perimeter: geometry::perimeter(geometry),
            rep_point,
            bounds,
        })
    }
}

/// Adjacency graph of land-cover polygons backed by an R-tree.
///
/// The attribute table, the spatial index and the graph always describe the
/// same node set. Mutation goes through [`PolygonGraph::merge_nodes`] and
/// [`PolygonGraph::add_habitat`], both of which need `&mut self`; share the
/// graph behind an `Arc` once it is set up to read it from many threads.
#[derive(Debug, Clone)]
pub struct PolygonGraph {
    id: GraphId,
    crs: String,
    tolerance: f64,
    table: AttributeTable,
    index: SpatialIndex,
    graph: AdjacencyGraph<NodeAttributes>,
    habitats: BTreeMap<String, Habitat>,
}

impl PolygonGraph {
    /// Build the graph from a polygon table. Row positions become node indices.
    pub fn from_table(table: PolygonTable, options: GraphOptions) -> Result<Self, GraphError> {
        let tolerance = options.tolerance;
        if tolerance.is_nan() || tolerance < 0.0 {
            return Err(GraphError::InvalidInput(
                "`tolerance` must not be negative".to_string(),
            ));
        }

        let columns = table.extra_columns();
        let rows = table.into_rows()?;
        if rows.is_empty() {
            warn!("building polygon graph from an empty table");
        }

        let mut attributes = Vec::with_capacity(rows.len());
        let mut attribute_table = AttributeTable::new(columns);
        for (position, row) in rows.into_iter().enumerate() {
            let index = position as NodeIndex;
            let geometry = geometry::to_multi(row.geometry);
            attributes.push((index, NodeAttributes::from_geometry(&geometry, row.class_label)?));
            attribute_table.insert(
                index,
                AttributeRow {
                    geometry,
                    class_label: row.class_label,
                    values: row.values,
                },
            );
        }

        let index =
            SpatialIndex::bulk_load(attributes.iter().map(|(id, attrs)| (*id, attrs.bounds)));

        // Pass 1: nodes and neighbour candidates.
        let mut graph = AdjacencyGraph::new();
        let mut candidates: Vec<(NodeIndex, Vec<NodeIndex>)> = Vec::with_capacity(attributes.len());
        for (node, attrs) in attributes {
            let geometry = attribute_table
                .geometry(node)
                .ok_or_else(|| GraphError::InvalidInput(format!("node {node} has no row")))?;
            let neighbours = find_neighbours(
                node,
                geometry,
                &attrs.bounds,
                tolerance,
                &index,
                &attribute_table,
            );
            candidates.push((node, neighbours));
            graph.add_node(node, attrs);
        }

        // Pass 2: edges.
        for (node, neighbours) in candidates {
            for neighbour in neighbours {
                graph.add_edge(node, neighbour, ());
            }
        }

        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            tolerance,
            "polygon graph loaded"
        );

        Ok(Self {
            id: GraphId::next(),
            crs: options.crs,
            tolerance,
            table: attribute_table,
            index,
            graph,
            habitats: BTreeMap::new(),
        })
    }

    /// Reassemble a graph from already-validated parts, rebuilding the index.
    pub(crate) fn from_parts(
        crs: String,
        tolerance: f64,
        table: AttributeTable,
        graph: AdjacencyGraph<NodeAttributes>,
    ) -> Self {
        let index = SpatialIndex::bulk_load(graph.nodes().map(|(id, attrs)| (id, attrs.bounds)));
        Self {
            id: GraphId::next(),
            crs,
            tolerance,
            table,
            index,
            graph,
            habitats: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> GraphId {
        self.id
    }

    pub fn crs(&self) -> &str {
        &self.crs
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn graph(&self) -> &AdjacencyGraph<NodeAttributes> {
        &self.graph
    }

    pub fn table(&self) -> &AttributeTable {
        &self.table
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.index
    }

    pub fn node(&self, index: NodeIndex) -> Option<&NodeAttributes> {
        self.graph.node(index)
    }

    pub fn row(&self, index: NodeIndex) -> Option<&AttributeRow> {
        self.table.get(index)
    }

    pub fn contains_node(&self, index: NodeIndex) -> bool {
        self.graph.contains_node(index)
    }

    pub fn node_indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_ids()
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn habitats(&self) -> &BTreeMap<String, Habitat> {
        &self.habitats
    }

    pub fn habitat(&self, name: &str) -> Option<&Habitat> {
        self.habitats.get(name)
    }

    pub(crate) fn insert_habitat(&mut self, habitat: Habitat) {
        self.habitats.insert(habitat.name().to_string(), habitat);
    }

    /// Merge `node_ids` into one node carrying the union of their polygons.
    ///
    /// The new node gets `final_index`, or one past the current maximum index
    /// when `None`. It inherits every outside neighbour of the merged nodes.
    /// Nothing is changed if validation fails.
    pub fn merge_nodes(
        &mut self,
        node_ids: &[NodeIndex],
        class_label: ClassLabel,
        final_index: Option<NodeIndex>,
    ) -> Result<NodeIndex, GraphError> {
        if node_ids.is_empty() {
            return Err(GraphError::InvalidInput(
                "`node_ids` must contain at least one node".to_string(),
            ));
        }
        let merged: BTreeSet<NodeIndex> = node_ids.iter().copied().collect();
        let missing: Vec<NodeIndex> = merged
            .iter()
            .copied()
            .filter(|id| !self.graph.contains_node(*id))
            .collect();
        if !missing.is_empty() {
            return Err(GraphError::InvalidInput(format!(
                "`node_ids` must only contain valid nodes, unknown: {missing:?}"
            )));
        }
        if let Some(index) = final_index {
            if !merged.contains(&index) && self.graph.contains_node(index) {
                return Err(GraphError::InvalidInput(format!(
                    "`final_index` {index} is an existing node that is not being merged"
                )));
            }
        }
        let final_index = match final_index {
            Some(index) => index,
            None => self
                .graph
                .max_node_id()
                .and_then(|max| max.checked_add(1))
                .ok_or_else(|| GraphError::InvalidInput("node index space exhausted".to_string()))?,
        };

        let adjacency: BTreeSet<NodeIndex> = merged
            .iter()
            .flat_map(|id| self.graph.neighbors(*id))
            .filter(|neighbour| !merged.contains(neighbour))
            .collect();
        let polygon = geometry::union_all(merged.iter().filter_map(|id| self.table.geometry(*id)));
        let attrs = NodeAttributes::from_geometry(&polygon, class_label)?;

        for id in &merged {
            if let Some(old) = self.graph.remove_node(*id) {
                self.index.remove(*id, &old.bounds);
            }
            self.table.remove(*id);
        }

        let row = self.table.null_row(polygon, class_label);
        self.table.insert(final_index, row);
        self.index.insert(final_index, &attrs.bounds);
        self.graph.add_node(final_index, attrs);
        for neighbour in &adjacency {
            self.graph.add_edge(final_index, *neighbour, ());
        }

        info!(
            merged = merged.len(),
            final_index,
            neighbours = adjacency.len(),
            "merged polygon nodes"
        );
        Ok(final_index)
    }

    /// Build a habitat subgraph and store it under `name`, replacing any
    /// habitat of the same name.
    pub fn add_habitat(
        &mut self,
        name: impl Into<String>,
        valid_classes: impl IntoIterator<Item = ClassLabel>,
        max_travel_distance: f64,
    ) -> Result<&Habitat, GraphError> {
        let name = name.into();
        let habitat = Habitat::build(
            self,
            name.clone(),
            valid_classes.into_iter().collect(),
            max_travel_distance,
        )?;
        info!(
            habitat = %name,
            nodes = habitat.graph().node_count(),
            edges = habitat.graph().edge_count(),
            "habitat loaded"
        );
        self.insert_habitat(habitat);
        self.habitats
            .get(&name)
            .ok_or(GraphError::UnknownHabitat(name))
    }

    pub fn get_graph_components(
        &self,
        source: ComponentSource<'_>,
    ) -> Result<GraphComponents, GraphError> {
        components::compute(self, source)
    }

    /// Components of the habitat stored under `name`.
    pub fn habitat_components(&self, name: &str) -> Result<GraphComponents, GraphError> {
        let habitat = self
            .habitat(name)
            .ok_or_else(|| GraphError::UnknownHabitat(name.to_string()))?;
        self.get_graph_components(ComponentSource::Habitat(habitat))
    }
}

fn find_neighbours(
    node: NodeIndex,
    geometry: &MultiPolygon<f64>,
    bounds: &Rect<f64>,
    tolerance: f64,
    index: &SpatialIndex,
    table: &AttributeTable,
) -> Vec<NodeIndex> {
    let probe;
    let (probe_geometry, probe_bounds) = if tolerance > 0.0 {
        probe = geometry::buffer(geometry, tolerance);
        (&probe, geometry::expand(bounds, tolerance))
    } else {
        (geometry, *bounds)
    };

    let neighbours: Vec<NodeIndex> = index
        .query(&probe_bounds)
        .into_iter()
        .filter(|candidate| *candidate != node)
        .filter(|candidate| {
            table
                .geometry(*candidate)
                .is_some_and(|other| other.intersects(probe_geometry))
        })
        .collect();
    debug!(node, candidates = neighbours.len(), "neighbours resolved");
    neighbours
}
