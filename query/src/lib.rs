pub mod identify;
pub mod node_map;
pub mod timeline;

pub use identify::{
    graph_polygon_diff, identify_graphs, identify_graphs_with, identify_node, identify_node_index,
    spatial_predicate, IdentifyError, IdentifyOptions,
};
pub use node_map::NodeMap;
pub use timeline::{
    CacheLookup, TimedGraph, Timeline, TimelineError, TimelineOptions, TimelineStats, Timestamp,
};
