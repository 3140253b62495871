pub mod bundle;
pub mod components;
pub mod geometry;
pub mod habitat;
pub mod index;
pub mod polygon_graph;
pub mod table;

pub use bundle::{BundleError, GraphBundle};
pub use components::{ComponentRow, ComponentSource, GraphComponents};
pub use habitat::{Habitat, HabitatEdge};
pub use index::{AdjacencyGraph, SpatialIndex};
pub use polygon_graph::{GraphError, GraphId, GraphOptions, NodeAttributes, PolygonGraph};
pub use table::{AttributeRow, AttributeTable};
