use crate::node_map::NodeMap;
use geo::coordinate_position::CoordPos;
use geo::dimensions::Dimensions;
use geo::{BoundingRect, Intersects, MultiPolygon, Relate};
use geograph_core::config::IdentificationSettings;
use geograph_core::error::{ErrorCode, GeoGraphError};
use geograph_core::model::{IdentificationMode, NodeIndex, UnsupportedModeError};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::sync::Arc;
use storage::{AttributeRow, PolygonGraph};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum IdentifyError {
    #[error(transparent)]
    UnsupportedMode(#[from] UnsupportedModeError),
    #[error("node {0} does not exist in the source graph")]
    UnknownNode(NodeIndex),
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
}

impl GeoGraphError for IdentifyError {
    fn error_code(&self) -> ErrorCode {
        match self {
            IdentifyError::UnsupportedMode(err) => err.error_code(),
            IdentifyError::UnknownNode(_) => ErrorCode::NotFound,
            IdentifyError::NotImplemented(_) => ErrorCode::NotImplemented,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentifyOptions {
    pub mode: IdentificationMode,
    /// Evaluate source nodes on the rayon pool.
    pub parallel: bool,
}

impl Default for IdentifyOptions {
    fn default() -> Self {
        Self {
            mode: IdentificationMode::default(),
            parallel: true,
        }
    }
}

impl From<&IdentificationSettings> for IdentifyOptions {
    fn from(settings: &IdentificationSettings) -> Self {
        Self {
            mode: settings.mode,
            parallel: settings.parallel,
        }
    }
}

impl IdentifyOptions {
    pub fn with_mode_name(mode: &str) -> Result<Self, IdentifyError> {
        Ok(Self {
            mode: mode.parse()?,
            ..Self::default()
        })
    }
}

/// Whether `a` and `b` are identified as the same feature under `mode`.
///
/// Every mode implies plain intersection, so that cheap test runs first and
/// the full intersection matrix is only built for the stricter modes.
pub fn spatial_predicate(
    mode: IdentificationMode,
    a: &MultiPolygon<f64>,
    b: &MultiPolygon<f64>,
) -> bool {
    if !a.intersects(b) {
        return false;
    }
    match mode {
        IdentificationMode::Corner => true,
        IdentificationMode::Interior => {
            a.relate(b).get(CoordPos::Inside, CoordPos::Inside) != Dimensions::Empty
        }
        IdentificationMode::Edge => {
            let matrix = a.relate(b);
            matrix.get(CoordPos::Inside, CoordPos::Inside) != Dimensions::Empty
                || matrix.get(CoordPos::OnBoundary, CoordPos::OnBoundary)
                    == Dimensions::OneDimensional
        }
    }
}

/// Nodes of `other` with the same class as `row` whose polygons satisfy the
/// `mode` predicate, nearest bounding box first.
pub fn identify_node(
    row: &AttributeRow,
    other: &PolygonGraph,
    mode: IdentificationMode,
) -> Vec<NodeIndex> {
    let Some(bounds) = row.geometry.bounding_rect() else {
        return Vec::new();
    };
    other
        .spatial_index()
        .query_sorted(&bounds)
        .into_iter()
        .filter(|candidate| other.table().class_label(*candidate) == Some(row.class_label))
        .filter(|candidate| {
            other
                .table()
                .geometry(*candidate)
                .is_some_and(|geometry| spatial_predicate(mode, &row.geometry, geometry))
        })
        .collect()
}

/// [`identify_node`] for a node addressed by index in `graph`.
pub fn identify_node_index(
    graph: &PolygonGraph,
    index: NodeIndex,
    other: &PolygonGraph,
    mode: IdentificationMode,
) -> Result<Vec<NodeIndex>, IdentifyError> {
    let row = graph.row(index).ok_or(IdentifyError::UnknownNode(index))?;
    Ok(identify_node(row, other, mode))
}

pub fn identify_graphs(
    src: &Arc<PolygonGraph>,
    trg: &Arc<PolygonGraph>,
    mode: IdentificationMode,
) -> NodeMap {
    identify_graphs_with(
        src,
        trg,
        IdentifyOptions {
            mode,
            ..IdentifyOptions::default()
        },
    )
}

/// Map every node of `src` to its identified nodes in `trg`.
pub fn identify_graphs_with(
    src: &Arc<PolygonGraph>,
    trg: &Arc<PolygonGraph>,
    options: IdentifyOptions,
) -> NodeMap {
    let rows: Vec<(NodeIndex, &AttributeRow)> = src.table().iter().collect();
    let mapping: BTreeMap<NodeIndex, Vec<NodeIndex>> = if options.parallel {
        rows.par_iter()
            .map(|(index, row)| (*index, identify_node(row, trg, options.mode)))
            .collect()
    } else {
        rows.iter()
            .map(|(index, row)| (*index, identify_node(row, trg, options.mode)))
            .collect()
    };

    let pairs: usize = mapping.values().map(Vec::len).sum();
    info!(
        mode = %options.mode,
        src_nodes = mapping.len(),
        trg_nodes = trg.node_count(),
        pairs,
        "graphs identified"
    );
    debug!(parallel = options.parallel, "identification finished");
    NodeMap::new(Arc::clone(src), Arc::clone(trg), mapping)
}

/// Polygon-level difference between identified nodes. Not available.
pub fn graph_polygon_diff(_map: &NodeMap) -> Result<(), IdentifyError> {
    Err(IdentifyError::NotImplemented("graph_polygon_diff"))
}
