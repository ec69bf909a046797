//! Typed views over the JSON generated for schematic and PCB documents.
//!
//! Generated JSON is loose: optional keys, numbers where strings are
//! expected, and objects keyed by arbitrary ids whose order matters. The
//! types here absorb that once so the rest of the crate works on plain
//! Rust structures.

use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

use serde::de::{self, Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::component::{ComponentMeta, ComponentRecord, DESIGNATOR};
use crate::error::{Error, Result};

/// Accept strings, numbers and booleans for a field that is textual.
fn lenient_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

fn lenient_u32<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<u32>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Deserialize a JSON object into the list of its values, keeping
/// document order and dropping the keys.
fn map_values<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    struct ValuesVisitor<T>(PhantomData<T>);

    impl<'de, T: Deserialize<'de>> Visitor<'de> for ValuesVisitor<T> {
        type Value = Vec<T>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("an object")
        }

        fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> std::result::Result<Vec<T>, A::Error> {
            let mut values = Vec::with_capacity(map.size_hint().unwrap_or(0));
            while let Some((_, value)) = map.next_entry::<de::IgnoredAny, T>()? {
                values.push(value);
            }
            Ok(values)
        }
    }

    deserializer.deserialize_map(ValuesVisitor(PhantomData))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AltiumAttribute {
    #[serde(default, deserialize_with = "lenient_string")]
    pub text: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,
}

/// A component placed on an Altium sheet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AltiumComponent {
    #[serde(default)]
    pub attributes: BTreeMap<String, AltiumAttribute>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub part_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unique_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub part_count: Option<u32>,
    #[serde(default, deserialize_with = "lenient_u32")]
    pub current_part_id: Option<u32>,
}

impl AltiumComponent {
    /// Flatten into a record: attribute text becomes the value, and the
    /// unannotated `Designator` value becomes the logical designator.
    pub fn to_record(&self) -> ComponentRecord {
        let attributes = self
            .attributes
            .iter()
            .map(|(name, attr)| (name.clone(), attr.text.clone().unwrap_or_default()))
            .collect();

        ComponentRecord {
            attributes,
            meta: ComponentMeta {
                logical_designator: self
                    .attributes
                    .get(DESIGNATOR)
                    .and_then(|attr| attr.value.clone()),
                unique_id: self.unique_id.clone(),
                part_id: self.part_id.clone(),
                name: self.name.clone(),
                description: self.description.clone(),
                kind: self.kind.clone(),
                part_count: self.part_count,
                current_part_id: self.current_part_id,
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetName {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
}

/// A sheet symbol pointing at a child sheet.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetRef {
    #[serde(default)]
    pub sheet_name: Option<SheetName>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub filename: Option<String>,
}

impl SheetRef {
    pub fn new(filename: impl Into<String>, display_name: impl Into<String>) -> Self {
        Self {
            sheet_name: Some(SheetName {
                name: Some(display_name.into()),
            }),
            filename: Some(filename.into()),
        }
    }

    /// Display name of the symbol, empty when absent.
    pub fn display_name(&self) -> &str {
        self.sheet_name
            .as_ref()
            .and_then(|n| n.name.as_deref())
            .unwrap_or("")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum SheetEntry {
    Component(AltiumComponent),
    SheetRef(SheetRef),
    #[serde(other)]
    Other,
}

/// Every typed entry of one generated sheet, in document order.
#[derive(Debug, Clone, Default)]
pub struct SheetDocument {
    pub entries: Vec<SheetEntry>,
}

impl SheetDocument {
    /// Values that are not objects, or objects without a `type`, are not
    /// entries and are skipped.
    pub fn from_json(path: &str, value: Value) -> Result<Self> {
        let malformed = |source| Error::MalformedDocument {
            path: path.to_string(),
            source,
        };

        let map: Map<String, Value> = serde_json::from_value(value).map_err(malformed)?;
        let mut entries = Vec::new();
        for (_, value) in map {
            if !value.get("type").is_some_and(Value::is_string) {
                continue;
            }
            entries.push(serde_json::from_value(value).map_err(malformed)?);
        }
        Ok(Self { entries })
    }

    pub fn components(&self) -> impl Iterator<Item = &AltiumComponent> {
        self.entries.iter().filter_map(|entry| match entry {
            SheetEntry::Component(c) => Some(c),
            _ => None,
        })
    }

    pub fn sheet_refs(&self) -> impl Iterator<Item = &SheetRef> {
        self.entries.iter().filter_map(|entry| match entry {
            SheetEntry::SheetRef(r) => Some(r),
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct NamedAttribute {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub value: Option<String>,
}

/// A component of a multi-page (OrCAD or System Capture) design.
#[derive(Debug, Clone, Deserialize)]
pub struct MultiPageComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub reference: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub logical_reference: Option<String>,
    #[serde(default, deserialize_with = "map_values")]
    pub attributes: Vec<NamedAttribute>,
}

impl MultiPageComponent {
    pub fn to_record(&self) -> ComponentRecord {
        let attributes = self
            .attributes
            .iter()
            .filter_map(|attr| {
                let name = attr.name.clone()?;
                Some((name, attr.value.clone().unwrap_or_default()))
            })
            .collect();

        ComponentRecord {
            attributes,
            meta: ComponentMeta {
                name: self.name.clone(),
                reference: self.reference.clone(),
                logical_reference: self.logical_reference.clone(),
                ..Default::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default, deserialize_with = "map_values")]
    pub components: Vec<MultiPageComponent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MultiPageDocument {
    #[serde(default)]
    pub pages: Vec<Page>,
}

impl MultiPageDocument {
    pub fn from_json(path: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|source| Error::MalformedDocument {
            path: path.to_string(),
            source,
        })
    }

    pub fn components(&self) -> impl Iterator<Item = &MultiPageComponent> {
        self.pages.iter().flat_map(|page| page.components.iter())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PcbPad {
    #[serde(default, deserialize_with = "lenient_string")]
    pub designator: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub net_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PcbComponent {
    #[serde(default, deserialize_with = "lenient_string")]
    pub designator: Option<String>,
    #[serde(default, deserialize_with = "map_values")]
    pub pads: Vec<PcbPad>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PcbDocument {
    #[serde(default, deserialize_with = "map_values")]
    pub component_instances: Vec<PcbComponent>,
}

impl PcbDocument {
    pub fn from_json(path: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|source| Error::MalformedDocument {
            path: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sheet_document_keeps_typed_entries_in_order() {
        let doc = SheetDocument::from_json(
            "Main.SchDoc",
            json!({
                "version": 3,
                "b": {
                    "type": "Component",
                    "unique_id": "AAAA",
                    "part_count": 1,
                    "attributes": {
                        "Designator": {"text": "R1", "value": "R1"},
                        "Comment": {"text": 10, "value": "=Value"},
                    },
                },
                "a": {
                    "type": "SheetRef",
                    "sheet_name": {"name": "Repeat(CH,1,2)"},
                    "filename": "Sub.SchDoc",
                },
                "c": {"type": "Wire", "points": []},
                "d": {"no_type": true},
            }),
        )
        .unwrap();

        assert_eq!(doc.entries.len(), 3);
        assert!(matches!(doc.entries[2], SheetEntry::Other));

        let component = doc.components().next().unwrap().to_record();
        assert_eq!(component.designator(), Some("R1"));
        assert_eq!(component.attribute("Comment"), Some("10"));
        assert_eq!(component.meta.logical_designator.as_deref(), Some("R1"));
        assert_eq!(component.meta.part_count, Some(1));

        let sheet_ref = doc.sheet_refs().next().unwrap();
        assert_eq!(sheet_ref.display_name(), "Repeat(CH,1,2)");
        assert_eq!(sheet_ref.filename.as_deref(), Some("Sub.SchDoc"));
    }

    #[test]
    fn sheet_ref_name_may_be_missing_or_null() {
        let doc = SheetDocument::from_json(
            "Main.SchDoc",
            json!({
                "a": {"type": "SheetRef", "filename": "A.SchDoc"},
                "b": {"type": "SheetRef", "sheet_name": {"name": null}, "filename": null},
            }),
        )
        .unwrap();
        let refs: Vec<_> = doc.sheet_refs().collect();
        assert_eq!(refs[0].display_name(), "");
        assert_eq!(refs[1].display_name(), "");
        assert!(refs[1].filename.is_none());
    }

    #[test]
    fn non_object_document_is_malformed() {
        let err = SheetDocument::from_json("Main.SchDoc", json!([1, 2])).unwrap_err();
        assert!(matches!(err, Error::MalformedDocument { .. }));
    }

    #[test]
    fn multi_page_components_flatten_named_attributes() {
        let doc = MultiPageDocument::from_json(
            "design.dsn",
            json!({
                "pages": [
                    {"components": {
                        "x1": {
                            "name": "U1",
                            "reference": "U1A",
                            "logical_reference": "U1",
                            "pins": {},
                            "attributes": {
                                "1": {"name": "Part Reference", "value": "U1A"},
                                "2": {"name": "Value", "value": null},
                            },
                        },
                    }},
                    {"components": {}},
                ],
            }),
        )
        .unwrap();

        let records: Vec<_> = doc.components().map(MultiPageComponent::to_record).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attribute("Part Reference"), Some("U1A"));
        assert_eq!(records[0].attribute("Value"), Some(""));
        assert_eq!(records[0].lookup("_name").as_deref(), Some("U1"));
        assert_eq!(records[0].meta.logical_reference.as_deref(), Some("U1"));
    }

    #[test]
    fn pcb_document_reads_pads() {
        let doc = PcbDocument::from_json(
            "board.PcbDoc",
            json!({
                "component_instances": {
                    "k": {"designator": "U1", "pads": {
                        "p1": {"designator": "1", "net_name": "GND"},
                        "p2": {"designator": "2"},
                    }},
                },
            }),
        )
        .unwrap();
        let pads = &doc.component_instances[0].pads;
        assert_eq!(pads.len(), 2);
        assert_eq!(pads[0].net_name.as_deref(), Some("GND"));
        assert!(pads[1].net_name.is_none());
    }
}
