use geo::MultiPolygon;
use geograph_core::model::{AttributeValue, ClassLabel, NodeIndex};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct AttributeRow {
    pub geometry: MultiPolygon<f64>,
    pub class_label: ClassLabel,
    pub values: BTreeMap<String, AttributeValue>,
}

/// Polygon attribute table, one row per node, always sorted by node index.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AttributeTable {
    columns: Vec<String>,
    rows: BTreeMap<NodeIndex, AttributeRow>,
}

impl AttributeTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: BTreeMap::new(),
        }
    }

    /// Extra column names besides geometry and class label.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Row for a freshly built node: every extra column set to null.
    pub fn null_row(&self, geometry: MultiPolygon<f64>, class_label: ClassLabel) -> AttributeRow {
        AttributeRow {
            geometry,
            class_label,
            values: self
                .columns
                .iter()
                .map(|name| (name.clone(), AttributeValue::Null))
                .collect(),
        }
    }

    pub fn insert(&mut self, index: NodeIndex, row: AttributeRow) -> Option<AttributeRow> {
        self.rows.insert(index, row)
    }

    pub fn remove(&mut self, index: NodeIndex) -> Option<AttributeRow> {
        self.rows.remove(&index)
    }

    pub fn get(&self, index: NodeIndex) -> Option<&AttributeRow> {
        self.rows.get(&index)
    }

    pub fn geometry(&self, index: NodeIndex) -> Option<&MultiPolygon<f64>> {
        self.rows.get(&index).map(|row| &row.geometry)
    }

    pub fn class_label(&self, index: NodeIndex) -> Option<ClassLabel> {
        self.rows.get(&index).map(|row| row.class_label)
    }

    pub fn contains(&self, index: NodeIndex) -> bool {
        self.rows.contains_key(&index)
    }

    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.rows.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeIndex, &AttributeRow)> {
        self.rows.iter().map(|(index, row)| (*index, row))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
