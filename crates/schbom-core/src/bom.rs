//! Mapping component attributes onto BOM columns, and grouping rows.

use std::collections::HashMap;
use std::fmt;
use std::io::Write;

use itertools::Itertools;
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};

use crate::component::ComponentRecord;
use crate::error::{Error, Result};

/// Name of the column holding the number of components in a row.
pub const QUANTITY_COLUMN: &str = "Quantity";

/// Separator between the distinct values of a non-key column in a group.
const VALUE_SEPARATOR: &str = ", ";

#[derive(Deserialize)]
#[serde(untagged)]
enum Candidates {
    One(String),
    Many(Vec<String>),
}

impl From<Candidates> for Vec<String> {
    fn from(c: Candidates) -> Self {
        match c {
            Candidates::One(name) => vec![name],
            Candidates::Many(names) => names,
        }
    }
}

/// Output columns in order, each with the attribute names to try in turn.
///
/// Deserializes from a mapping of column name to a name or list of names:
///
/// ```yaml
/// Manufacturer: [Manufacturer, MANUFACTURER]
/// Part Number: PART
/// Designator: Designator
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    columns: Vec<(String, Vec<String>)>,
}

impl ColumnMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a column, replacing any earlier column of the same name.
    pub fn column<S: Into<String>>(
        mut self,
        name: impl Into<String>,
        candidates: impl IntoIterator<Item = S>,
    ) -> Self {
        self.insert(name.into(), candidates.into_iter().map(Into::into).collect());
        self
    }

    fn insert(&mut self, name: String, candidates: Vec<String>) {
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = candidates,
            None => self.columns.push((name, candidates)),
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    pub fn candidates(&self, column: &str) -> Option<&[String]> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, c)| c.as_slice())
    }

    pub fn contains(&self, column: &str) -> bool {
        self.candidates(column).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Values of every column for `component`: the first candidate present
    /// wins, and a column with no candidate present is empty.
    pub fn map(&self, component: &ComponentRecord) -> Vec<String> {
        self.columns
            .iter()
            .map(|(_, candidates)| {
                candidates
                    .iter()
                    .find_map(|key| component.lookup(key))
                    .map(|v| v.into_owned())
                    .unwrap_or_default()
            })
            .collect()
    }
}

impl<'de> Deserialize<'de> for ColumnMapping {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct MappingVisitor;

        impl<'de> Visitor<'de> for MappingVisitor {
            type Value = ColumnMapping;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a mapping of column names to attribute names")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut map: A,
            ) -> std::result::Result<ColumnMapping, A::Error> {
                let mut mapping = ColumnMapping::new();
                while let Some((name, candidates)) = map.next_entry::<String, Candidates>()? {
                    mapping.insert(name, candidates.into());
                }
                Ok(mapping)
            }
        }

        deserializer.deserialize_map(MappingVisitor)
    }
}

/// One line of a bill of materials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BomRow {
    pub values: Vec<(String, String)>,
    pub quantity: usize,
}

impl BomRow {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, v)| v.as_str())
    }
}

impl Serialize for BomRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len() + 1))?;
        for (column, value) in &self.values {
            map.serialize_entry(column, value)?;
        }
        map.serialize_entry(QUANTITY_COLUMN, &self.quantity)?;
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bom {
    pub columns: Vec<String>,
    pub rows: Vec<BomRow>,
}

impl Serialize for Bom {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.rows)
    }
}

impl Bom {
    /// Header row followed by one record per row; quantity comes last.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<()> {
        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(
            self.columns
                .iter()
                .map(String::as_str)
                .chain([QUANTITY_COLUMN]),
        )?;
        for row in &self.rows {
            let quantity = row.quantity.to_string();
            csv.write_record(
                row.values
                    .iter()
                    .map(|(_, v)| v.as_str())
                    .chain([quantity.as_str()]),
            )?;
        }
        csv.flush().map_err(csv::Error::from)?;
        Ok(())
    }

    pub fn total_quantity(&self) -> usize {
        self.rows.iter().map(|r| r.quantity).sum()
    }
}

/// Distinct non-empty values in first-seen order, joined for display.
fn join_distinct<'a>(values: impl Iterator<Item = &'a str>) -> String {
    values.filter(|v| !v.is_empty()).unique().join(VALUE_SEPARATOR)
}

/// Map every component onto the columns of `mapping`, then group rows that
/// agree on all `group_by` columns.
///
/// Without group-by columns each component becomes its own row with a
/// quantity of one. With them, rows are grouped in first-seen order: key
/// columns keep their shared value and every other column lists its
/// distinct values.
pub fn map_and_group(
    components: &[ComponentRecord],
    mapping: &ColumnMapping,
    group_by: &[String],
) -> Result<Bom> {
    if let Some(unknown) = group_by.iter().find(|c| !mapping.contains(c)) {
        return Err(Error::UnknownGroupByColumn(unknown.clone()));
    }

    let columns: Vec<String> = mapping.columns().map(str::to_string).collect();
    let mapped: Vec<Vec<String>> = components.iter().map(|c| mapping.map(c)).collect();
    let label = |values: Vec<String>| columns.iter().cloned().zip(values).collect::<Vec<_>>();

    if group_by.is_empty() {
        let rows = mapped
            .into_iter()
            .map(|values| BomRow {
                values: label(values),
                quantity: 1,
            })
            .collect();
        return Ok(Bom { columns, rows });
    }

    let key_indices: Vec<usize> = group_by
        .iter()
        .filter_map(|g| columns.iter().position(|c| c == g))
        .collect();

    let mut groups: Vec<Vec<&Vec<String>>> = Vec::new();
    let mut positions: HashMap<Vec<&str>, usize> = HashMap::new();
    for values in &mapped {
        let key: Vec<&str> = key_indices.iter().map(|&i| values[i].as_str()).collect();
        let idx = *positions.entry(key).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[idx].push(values);
    }

    let rows: Vec<BomRow> = groups
        .into_iter()
        .map(|members| {
            let values = (0..columns.len())
                .map(|i| {
                    if key_indices.contains(&i) {
                        members[0][i].clone()
                    } else {
                        join_distinct(members.iter().map(|m| m[i].as_str()))
                    }
                })
                .collect();
            BomRow {
                values: label(values),
                quantity: members.len(),
            }
        })
        .collect();

    log::debug!(
        "Grouped {} components into {} BOM rows",
        components.len(),
        rows.len()
    );
    Ok(Bom { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::DESIGNATOR;

    fn part(designator: &str, pn: &str, manufacturer: &str) -> ComponentRecord {
        ComponentRecord::default()
            .with_attribute(DESIGNATOR, designator)
            .with_attribute("PART", pn)
            .with_attribute("MANUFACTURER", manufacturer)
    }

    fn mapping() -> ColumnMapping {
        ColumnMapping::new()
            .column("Part Number", ["Part Number", "PART"])
            .column("Manufacturer", ["Manufacturer", "MANUFACTURER"])
            .column("Designator", [DESIGNATOR])
    }

    #[test]
    fn first_present_candidate_wins() {
        let c = ComponentRecord::default()
            .with_attribute("MANUFACTURER", "Yageo")
            .with_attribute("Manufacturer", "");
        let m = ColumnMapping::new().column("Manufacturer", ["Manufacturer", "MANUFACTURER"]);
        assert_eq!(m.map(&c), vec![""]);

        let c = ComponentRecord::default().with_attribute("MANUFACTURER", "Yageo");
        assert_eq!(m.map(&c), vec!["Yageo"]);
        assert_eq!(m.map(&ComponentRecord::default()), vec![""]);
    }

    #[test]
    fn ungrouped_rows_have_quantity_one() {
        let bom = map_and_group(&[part("R1", "PN1", "Yageo")], &mapping(), &[]).unwrap();
        assert_eq!(bom.rows.len(), 1);
        assert_eq!(bom.rows[0].quantity, 1);
        assert_eq!(bom.rows[0].get("Part Number"), Some("PN1"));
    }

    #[test]
    fn grouping_joins_distinct_values_in_first_seen_order() {
        let components = [
            part("R1", "PN1", "X"),
            part("C1", "PN2", "Z"),
            part("R2", "PN1", "X"),
            part("R3", "PN1", "Y"),
        ];
        let bom = map_and_group(&components, &mapping(), &["Part Number".to_string()]).unwrap();

        assert_eq!(bom.rows.len(), 2);
        assert_eq!(bom.rows[0].get("Designator"), Some("R1, R2, R3"));
        assert_eq!(bom.rows[0].get("Manufacturer"), Some("X, Y"));
        assert_eq!(bom.rows[0].quantity, 3);
        assert_eq!(bom.rows[1].get("Designator"), Some("C1"));
        assert_eq!(bom.total_quantity(), 4);
    }

    #[test]
    fn unknown_group_by_column_is_rejected() {
        let err = map_and_group(&[], &mapping(), &["MPN".to_string()]).unwrap_err();
        assert!(matches!(err, Error::UnknownGroupByColumn(c) if c == "MPN"));
    }

    #[test]
    fn mapping_deserializes_in_declared_order() {
        let mapping: ColumnMapping = serde_yaml::from_str(
            "Part Number: [Part Number, PART]\nDesignator: Designator\nAlpha: [A]\n",
        )
        .unwrap();
        assert_eq!(
            mapping.columns().collect::<Vec<_>>(),
            vec!["Part Number", "Designator", "Alpha"]
        );
        assert_eq!(
            mapping.candidates("Designator"),
            Some(&["Designator".to_string()][..])
        );
    }

    #[test]
    fn csv_and_json_output() {
        let bom = map_and_group(
            &[part("R1", "PN1", "Yageo"), part("R2", "PN1", "Yageo")],
            &mapping(),
            &["Part Number".to_string()],
        )
        .unwrap();

        let mut out = Vec::new();
        bom.write_csv(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Part Number,Manufacturer,Designator,Quantity\nPN1,Yageo,\"R1, R2\",2\n"
        );

        insta::assert_json_snapshot!(bom, @r#"
        [
          {
            "Part Number": "PN1",
            "Manufacturer": "Yageo",
            "Designator": "R1, R2",
            "Quantity": 2
          }
        ]
        "#);
    }
}
