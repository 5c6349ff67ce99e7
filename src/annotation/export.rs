//! Annotation and marker tables, and the annotation CSV.

use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use super::{AnnotationRegistry, MaterialBinding};
use crate::error::ScaffoldResult;
use crate::field::FieldStore;
use crate::mesh::{Domain, NodeId};

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AnnotationRow {
    pub name: String,
    pub term: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkerRow {
    pub name: String,
    pub term: String,
    pub node: NodeId,
    /// Position in the primary coordinate field.
    pub coordinates: Vec<f64>,
    pub material: Option<MaterialBinding>,
}

impl AnnotationRegistry {
    /// Every group and marker as (name, term), sorted by name then term.
    #[must_use]
    pub fn annotation_table(&self) -> Vec<AnnotationRow> {
        let mut rows: Vec<AnnotationRow> = self
            .groups()
            .map(|g| AnnotationRow {
                name: g.name.clone(),
                term: g.term.clone(),
            })
            .chain(self.markers().map(|m| AnnotationRow {
                name: m.name.clone(),
                term: m.term.clone(),
            }))
            .collect();
        rows.sort();
        rows
    }

    /// Markers with their locations evaluated on the primary coordinate field.
    pub fn marker_table(&self, domain: &Domain, fields: &FieldStore) -> ScaffoldResult<Vec<MarkerRow>> {
        let coordinates = fields.primary()?;
        self.markers()
            .map(|marker| {
                let value = coordinates
                    .evaluate(domain, marker.location.element, &marker.location.xi, false)?
                    .value;
                Ok(MarkerRow {
                    name: marker.name.clone(),
                    term: marker.term.clone(),
                    node: marker.node,
                    coordinates: value,
                    material: marker.material.clone(),
                })
            })
            .collect()
    }

    /// `Term ID,Group name` rows, one per annotation.
    #[must_use]
    pub fn write_annotation_csv(&self) -> String {
        let mut out = String::from("Term ID,Group name\n");
        for row in self.annotation_table() {
            let _ = writeln!(out, "{},{}", csv_cell(&row.term), csv_cell(&row.name));
        }
        out
    }
}

fn csv_cell(text: &str) -> String {
    if text.contains([',', '"', '\n']) {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_owned()
    }
}
