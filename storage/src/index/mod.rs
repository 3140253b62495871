pub mod graph;
pub mod spatial;

pub use graph::AdjacencyGraph;
pub use spatial::SpatialIndex;
