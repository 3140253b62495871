//! Byte bundle handed to the persistence collaborator.
//!
//! Frame layout: `version: u32 LE | crc32(payload): u32 LE | payload`, where
//! the payload is an archived [`GraphBundle`]. The spatial index is not
//! stored; it is rebuilt from node bounds on load.

use crate::habitat::{Habitat, HabitatEdge};
use crate::index::AdjacencyGraph;
use crate::polygon_graph::{GraphError, NodeAttributes, PolygonGraph};
use crate::table::{AttributeRow, AttributeTable};
use crc32fast::Hasher;
use geo::{coord, LineString, MultiPolygon, Point, Polygon, Rect};
use geograph_core::error::{ErrorCode, GeoGraphError};
use geograph_core::model::{AttributeValue, ClassLabel, NodeIndex};
use rkyv::ser::{serializers::AllocSerializer, Serializer};
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;
use tracing::debug;

pub const BUNDLE_VERSION: u32 = 1;
const HEADER_LEN: usize = 8;

#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Serialization error")]
    Serialization,
    #[error("Deserialization error")]
    Deserialization,
    #[error("Data integrity error (CRC mismatch)")]
    CrcMismatch,
    #[error("Truncated bundle ({0} bytes)")]
    Truncated(usize),
    #[error("Unsupported bundle version {0}")]
    UnsupportedVersion(u32),
    #[error("Inconsistent bundle: {0}")]
    Inconsistent(String),
}

impl GeoGraphError for BundleError {
    fn error_code(&self) -> ErrorCode {
        match self {
            BundleError::Serialization => ErrorCode::Internal,
            BundleError::Deserialization => ErrorCode::InvalidInput,
            BundleError::CrcMismatch => ErrorCode::InvalidInput,
            BundleError::Truncated(_) => ErrorCode::InvalidInput,
            BundleError::UnsupportedVersion(_) => ErrorCode::InvalidInput,
            BundleError::Inconsistent(_) => ErrorCode::InvalidInput,
        }
    }
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct PolygonRecord {
    pub exterior: Vec<[f64; 2]>,
    pub interiors: Vec<Vec<[f64; 2]>>,
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub enum ValueRecord {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct NodeRecord {
    pub index: u64,
    pub class_label: i64,
    pub polygons: Vec<PolygonRecord>,
    pub values: Vec<(String, ValueRecord)>,
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct HabitatNodeRecord {
    pub index: u64,
    pub class_label: i64,
    pub area: f64,
    pub perimeter: f64,
    pub rep_point: [f64; 2],
    pub bounds: [f64; 4],
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct HabitatRecord {
    pub name: String,
    pub valid_classes: Vec<i64>,
    pub max_travel_distance: f64,
    pub nodes: Vec<HabitatNodeRecord>,
    pub edges: Vec<(u64, u64, f64)>,
}

#[derive(Archive, Deserialize, Serialize, Debug, PartialEq, Clone)]
#[archive(check_bytes)]
pub struct GraphBundle {
    pub crs: String,
    pub tolerance: f64,
    pub columns: Vec<String>,
    pub nodes: Vec<NodeRecord>,
    pub edges: Vec<(u64, u64)>,
    pub habitats: Vec<HabitatRecord>,
}

fn ring_record(ring: &LineString<f64>) -> Vec<[f64; 2]> {
    ring.coords().map(|c| [c.x, c.y]).collect()
}

fn ring_from_record(ring: &[[f64; 2]]) -> LineString<f64> {
    LineString::new(ring.iter().map(|[x, y]| coord! { x: *x, y: *y }).collect())
}

fn polygon_records(geometry: &MultiPolygon<f64>) -> Vec<PolygonRecord> {
    geometry
        .iter()
        .map(|polygon| PolygonRecord {
            exterior: ring_record(polygon.exterior()),
            interiors: polygon.interiors().iter().map(ring_record).collect(),
        })
        .collect()
}

fn geometry_from_records(records: &[PolygonRecord]) -> MultiPolygon<f64> {
    MultiPolygon::new(
        records
            .iter()
            .map(|record| {
                Polygon::new(
                    ring_from_record(&record.exterior),
                    record.interiors.iter().map(|ring| ring_from_record(ring)).collect(),
                )
            })
            .collect(),
    )
}

fn value_record(value: &AttributeValue) -> ValueRecord {
    match value {
        AttributeValue::Int(v) => ValueRecord::Int(*v),
        AttributeValue::Float(v) => ValueRecord::Float(*v),
        AttributeValue::Text(v) => ValueRecord::Text(v.clone()),
        AttributeValue::Null => ValueRecord::Null,
    }
}

fn value_from_record(record: &ValueRecord) -> AttributeValue {
    match record {
        ValueRecord::Int(v) => AttributeValue::Int(*v),
        ValueRecord::Float(v) => AttributeValue::Float(*v),
        ValueRecord::Text(v) => AttributeValue::Text(v.clone()),
        ValueRecord::Null => AttributeValue::Null,
    }
}

fn habitat_node_record(index: NodeIndex, attrs: &NodeAttributes) -> HabitatNodeRecord {
    HabitatNodeRecord {
        index,
        class_label: attrs.class_label,
        area: attrs.area,
        perimeter: attrs.perimeter,
        rep_point: [attrs.rep_point.x(), attrs.rep_point.y()],
        bounds: [
            attrs.bounds.min().x,
            attrs.bounds.min().y,
            attrs.bounds.max().x,
            attrs.bounds.max().y,
        ],
    }
}

fn attributes_from_record(record: &HabitatNodeRecord) -> NodeAttributes {
    let [min_x, min_y, max_x, max_y] = record.bounds;
    NodeAttributes {
        class_label: record.class_label,
        area: record.area,
        perimeter: record.perimeter,
        rep_point: Point::new(record.rep_point[0], record.rep_point[1]),
        bounds: Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }),
    }
}

impl GraphBundle {
    pub fn from_graph(graph: &PolygonGraph) -> Self {
        let nodes = graph
            .table()
            .iter()
            .map(|(index, row)| NodeRecord {
                index,
                class_label: row.class_label,
                polygons: polygon_records(&row.geometry),
                values: row
                    .values
                    .iter()
                    .map(|(name, value)| (name.clone(), value_record(value)))
                    .collect(),
            })
            .collect();

        let habitats = graph
            .habitats()
            .values()
            .map(|habitat| HabitatRecord {
                name: habitat.name().to_string(),
                valid_classes: habitat.valid_classes().iter().copied().collect(),
                max_travel_distance: habitat.max_travel_distance(),
                nodes: habitat
                    .graph()
                    .nodes()
                    .map(|(index, attrs)| habitat_node_record(index, attrs))
                    .collect(),
                edges: habitat
                    .graph()
                    .edges()
                    .map(|(a, b, edge)| (a, b, edge.distance))
                    .collect(),
            })
            .collect();

        Self {
            crs: graph.crs().to_string(),
            tolerance: graph.tolerance(),
            columns: graph.table().columns().to_vec(),
            nodes,
            edges: graph.graph().edges().map(|(a, b, _)| (a, b)).collect(),
            habitats,
        }
    }

    pub fn into_graph(self) -> Result<PolygonGraph, BundleError> {
        let mut table = AttributeTable::new(self.columns);
        let mut adjacency = AdjacencyGraph::new();
        for node in self.nodes {
            let geometry = geometry_from_records(&node.polygons);
            let attrs = NodeAttributes::from_geometry(&geometry, node.class_label)
                .map_err(|err| BundleError::Inconsistent(err.to_string()))?;
            let values: BTreeMap<String, AttributeValue> = node
                .values
                .iter()
                .map(|(name, value)| (name.clone(), value_from_record(value)))
                .collect();
            adjacency.add_node(node.index, attrs);
            table.insert(
                node.index,
                AttributeRow {
                    geometry,
                    class_label: node.class_label,
                    values,
                },
            );
        }
        for (a, b) in self.edges {
            if !adjacency.add_edge(a, b, ()) {
                return Err(BundleError::Inconsistent(format!(
                    "edge ({a}, {b}) does not join two nodes"
                )));
            }
        }

        let mut graph = PolygonGraph::from_parts(self.crs, self.tolerance, table, adjacency);
        for record in self.habitats {
            let mut hgraph: AdjacencyGraph<NodeAttributes, HabitatEdge> = AdjacencyGraph::new();
            for node in &record.nodes {
                hgraph.add_node(node.index, attributes_from_record(node));
            }
            for (a, b, distance) in record.edges {
                if !hgraph.add_edge(a, b, HabitatEdge { distance }) {
                    return Err(BundleError::Inconsistent(format!(
                        "habitat `{}` edge ({a}, {b}) does not join two nodes",
                        record.name
                    )));
                }
            }
            let valid_classes: BTreeSet<ClassLabel> = record.valid_classes.into_iter().collect();
            graph.insert_habitat(Habitat::from_parts(
                record.name,
                graph.id(),
                valid_classes,
                record.max_travel_distance,
                hgraph,
            ));
        }

        Ok(graph)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, BundleError> {
        let mut serializer = AllocSerializer::<4096>::default();
        serializer
            .serialize_value(self)
            .map_err(|_| BundleError::Serialization)?;
        let payload = serializer.into_serializer().into_inner();

        let mut hasher = Hasher::new();
        hasher.update(&payload);
        let checksum = hasher.finalize();

        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.extend_from_slice(&BUNDLE_VERSION.to_le_bytes());
        out.extend_from_slice(&checksum.to_le_bytes());
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BundleError> {
        if bytes.len() < HEADER_LEN {
            return Err(BundleError::Truncated(bytes.len()));
        }
        let version = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        if version != BUNDLE_VERSION {
            return Err(BundleError::UnsupportedVersion(version));
        }
        let checksum = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);

        let payload = &bytes[HEADER_LEN..];
        let mut hasher = Hasher::new();
        hasher.update(payload);
        if hasher.finalize() != checksum {
            return Err(BundleError::CrcMismatch);
        }

        // Archived data must be aligned; the caller's buffer may not be.
        let mut aligned = rkyv::AlignedVec::with_capacity(payload.len());
        aligned.extend_from_slice(payload);
        let archived = rkyv::check_archived_root::<GraphBundle>(&aligned[..])
            .map_err(|_| BundleError::Deserialization)?;
        let bundle: GraphBundle = archived
            .deserialize(&mut rkyv::Infallible)
            .map_err(|_| BundleError::Deserialization)?;
        Ok(bundle)
    }
}

impl PolygonGraph {
    /// Serialise the graph, its attribute table and habitats into one bundle.
    pub fn to_bundle_bytes(&self) -> Result<Vec<u8>, GraphError> {
        let bytes = GraphBundle::from_graph(self).to_bytes()?;
        debug!(bytes = bytes.len(), nodes = self.node_count(), "graph bundle written");
        Ok(bytes)
    }

    pub fn from_bundle_bytes(bytes: &[u8]) -> Result<Self, GraphError> {
        let graph = GraphBundle::from_bytes(bytes)?.into_graph()?;
        debug!(nodes = graph.node_count(), edges = graph.edge_count(), "graph bundle loaded");
        Ok(graph)
    }
}
