use crate::error::{ErrorCode, GeoGraphError};
use geo::Polygon;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;
use thiserror::Error;

/// Node identity within one polygon graph.
pub type NodeIndex = u64;

/// Land-cover class of a polygon.
pub type ClassLabel = i64;

pub const GEOMETRY_COLUMN: &str = "geometry";
pub const CLASS_LABEL_COLUMN: &str = "class_label";

/// Spatial predicate used to decide whether two polygons of the same class
/// describe the same feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationMode {
    /// Polygons must overlap; shared edges or corners do not count.
    Interior,
    /// Overlap or contact along a boundary segment.
    Edge,
    /// Any contact, including a single shared corner.
    #[default]
    Corner,
}

impl IdentificationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentificationMode::Interior => "interior",
            IdentificationMode::Edge => "edge",
            IdentificationMode::Corner => "corner",
        }
    }
}

impl std::fmt::Display for IdentificationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unsupported identification mode: {0}")]
pub struct UnsupportedModeError(pub String);

impl GeoGraphError for UnsupportedModeError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidInput
    }
}

impl FromStr for IdentificationMode {
    type Err = UnsupportedModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interior" => Ok(IdentificationMode::Interior),
            "edge" => Ok(IdentificationMode::Edge),
            "corner" => Ok(IdentificationMode::Corner),
            _ => Err(UnsupportedModeError(s.to_string())),
        }
    }
}

/// A single non-geometry cell of the attribute table.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AttributeValue {
    Int(i64),
    Float(f64),
    Text(String),
    #[default]
    Null,
}

impl AttributeValue {
    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

/// A typed column of the input polygon table.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Geometry(Vec<Polygon<f64>>),
    Int(Vec<Option<i64>>),
    Float(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Geometry(values) => values.len(),
            Column::Int(values) => values.len(),
            Column::Float(values) => values.len(),
            Column::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Column::Geometry(_) => "geometry",
            Column::Int(_) => "int",
            Column::Float(_) => "float",
            Column::Text(_) => "text",
        }
    }

    fn value(&self, row: usize) -> AttributeValue {
        match self {
            Column::Int(values) => values[row].map_or(AttributeValue::Null, AttributeValue::Int),
            Column::Float(values) => {
                values[row].map_or(AttributeValue::Null, AttributeValue::Float)
            }
            Column::Text(values) => values[row]
                .clone()
                .map_or(AttributeValue::Null, AttributeValue::Text),
            Column::Geometry(_) => AttributeValue::Null,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("`{0}` must be a column in the table")]
    MissingColumn(&'static str),
    #[error("column `{column}` must hold {expected} values, found {found}")]
    ColumnType {
        column: String,
        expected: &'static str,
        found: &'static str,
    },
    #[error("column `{column}` has {found} rows, expected {expected}")]
    RaggedColumn {
        column: String,
        expected: usize,
        found: usize,
    },
    #[error("row {row} has no class label")]
    NullClassLabel { row: usize },
}

impl GeoGraphError for TableError {
    fn error_code(&self) -> ErrorCode {
        ErrorCode::InvalidInput
    }
}

/// One validated row of the input table.
#[derive(Debug, Clone, PartialEq)]
pub struct PolygonRow {
    pub geometry: Polygon<f64>,
    pub class_label: ClassLabel,
    pub values: BTreeMap<String, AttributeValue>,
}

/// Columnar polygon table as handed over by a loader.
///
/// The table must carry a `geometry` column of polygons and an integer
/// `class_label` column. Every other column is passed through as attributes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PolygonTable {
    columns: BTreeMap<String, Column>,
}

impl PolygonTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: impl IntoIterator<Item = (Polygon<f64>, ClassLabel)>) -> Self {
        let (geometries, labels): (Vec<_>, Vec<_>) = rows
            .into_iter()
            .map(|(geometry, label)| (geometry, Some(label)))
            .unzip();
        Self::new()
            .with_column(GEOMETRY_COLUMN, Column::Geometry(geometries))
            .with_column(CLASS_LABEL_COLUMN, Column::Int(labels))
    }

    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Self {
        self.insert_column(name, column);
        self
    }

    pub fn insert_column(&mut self, name: impl Into<String>, column: Column) -> Option<Column> {
        self.columns.insert(name.into(), column)
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Column> {
        self.columns.remove(name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    /// Number of rows, taken from the geometry column when present.
    pub fn len(&self) -> usize {
        self.columns
            .get(GEOMETRY_COLUMN)
            .or_else(|| self.columns.values().next())
            .map_or(0, Column::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the pass-through columns, in table order.
    pub fn extra_columns(&self) -> Vec<String> {
        self.columns
            .keys()
            .filter(|name| name.as_str() != GEOMETRY_COLUMN && name.as_str() != CLASS_LABEL_COLUMN)
            .cloned()
            .collect()
    }

    /// Validate the table and split it into rows numbered densely from zero.
    pub fn into_rows(self) -> Result<Vec<PolygonRow>, TableError> {
        let geometries = match self.columns.get(GEOMETRY_COLUMN) {
            Some(Column::Geometry(values)) => values,
            Some(other) => {
                return Err(TableError::ColumnType {
                    column: GEOMETRY_COLUMN.to_string(),
                    expected: "geometry",
                    found: other.kind(),
                })
            }
            None => return Err(TableError::MissingColumn(GEOMETRY_COLUMN)),
        };
        let labels = match self.columns.get(CLASS_LABEL_COLUMN) {
            Some(Column::Int(values)) => values,
            Some(other) => {
                return Err(TableError::ColumnType {
                    column: CLASS_LABEL_COLUMN.to_string(),
                    expected: "int",
                    found: other.kind(),
                })
            }
            None => return Err(TableError::MissingColumn(CLASS_LABEL_COLUMN)),
        };

        let expected = geometries.len();
        for (name, column) in &self.columns {
            if column.len() != expected {
                return Err(TableError::RaggedColumn {
                    column: name.clone(),
                    expected,
                    found: column.len(),
                });
            }
            let is_required = name == GEOMETRY_COLUMN || name == CLASS_LABEL_COLUMN;
            if !is_required && matches!(column, Column::Geometry(_)) {
                return Err(TableError::ColumnType {
                    column: name.clone(),
                    expected: "scalar",
                    found: "geometry",
                });
            }
        }

        let extra: Vec<(&String, &Column)> = self
            .columns
            .iter()
            .filter(|(name, _)| {
                name.as_str() != GEOMETRY_COLUMN && name.as_str() != CLASS_LABEL_COLUMN
            })
            .collect();

        let mut rows = Vec::with_capacity(expected);
        for (row, geometry) in geometries.iter().enumerate() {
            let class_label = labels[row].ok_or(TableError::NullClassLabel { row })?;
            let values = extra
                .iter()
                .map(|(name, column)| ((*name).clone(), column.value(row)))
                .collect();
            rows.push(PolygonRow {
                geometry: geometry.clone(),
                class_label,
                values,
            });
        }

        Ok(rows)
    }
}
