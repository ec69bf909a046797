//! Component records: user attributes plus metadata derived from the design.

use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};

/// Attribute holding the physical designator of an Altium component.
pub const DESIGNATOR: &str = "Designator";

/// Attribute holding the designator of an OrCAD component.
pub const PART_REFERENCE: &str = "Part Reference";

/// Tool metadata carried alongside the user-visible attributes.
///
/// Column mappings can read these fields through [`ComponentRecord::lookup`]
/// using their underscore-prefixed names, e.g. `_name` or `_unique_id`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentMeta {
    pub logical_designator: Option<String>,
    pub unique_id: Option<String>,
    pub part_id: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<String>,
    pub part_count: Option<u32>,
    pub current_part_id: Option<u32>,
    pub reference: Option<String>,
    pub logical_reference: Option<String>,
}

impl ComponentMeta {
    fn fields(&self) -> [(&'static str, Option<Cow<'_, str>>); 10] {
        fn text(v: &Option<String>) -> Option<Cow<'_, str>> {
            v.as_deref().map(Cow::Borrowed)
        }
        fn number(v: &Option<u32>) -> Option<Cow<'static, str>> {
            v.map(|n| Cow::Owned(n.to_string()))
        }
        [
            ("_logical_designator", text(&self.logical_designator)),
            ("_unique_id", text(&self.unique_id)),
            ("_part_id", text(&self.part_id)),
            ("_name", text(&self.name)),
            ("_description", text(&self.description)),
            ("_kind", text(&self.kind)),
            ("_part_count", number(&self.part_count)),
            ("_current_part_id", number(&self.current_part_id)),
            ("_reference", text(&self.reference)),
            ("_logical_reference", text(&self.logical_reference)),
        ]
    }
}

/// One placed component: its attributes by name plus tool metadata.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ComponentRecord {
    pub attributes: BTreeMap<String, String>,
    pub meta: ComponentMeta,
}

impl ComponentRecord {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub fn designator(&self) -> Option<&str> {
        self.attribute(DESIGNATOR)
    }

    /// Resolve `key` against the attributes first, then against the
    /// underscore-prefixed metadata names.
    pub fn lookup(&self, key: &str) -> Option<Cow<'_, str>> {
        if let Some(value) = self.attributes.get(key) {
            return Some(Cow::Borrowed(value.as_str()));
        }
        if !key.starts_with('_') {
            return None;
        }
        self.meta
            .fields()
            .into_iter()
            .find(|(name, _)| *name == key)
            .and_then(|(_, value)| value)
    }

    /// True when the record has no attributes or only empty ones.
    pub fn is_blank(&self) -> bool {
        self.attributes.values().all(|v| v.is_empty())
    }

    /// Unique id with any hierarchical prefix (`\`-separated) removed.
    pub fn short_unique_id(&self) -> Option<&str> {
        self.meta
            .unique_id
            .as_deref()
            .map(|id| id.rsplit('\\').next().unwrap_or(id))
    }
}

impl Serialize for ComponentRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let meta: Vec<_> = self
            .meta
            .fields()
            .into_iter()
            .filter_map(|(name, value)| value.map(|v| (name, v)))
            .collect();

        let mut map = serializer.serialize_map(Some(self.attributes.len() + meta.len()))?;
        for (name, value) in &self.attributes {
            map.serialize_entry(name, value)?;
        }
        for (name, value) in &meta {
            map.serialize_entry(name, value.as_ref())?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resistor() -> ComponentRecord {
        ComponentRecord {
            meta: ComponentMeta {
                name: Some("RES_0603".into()),
                unique_id: Some("\\ABCD\\EFGH".into()),
                part_count: Some(2),
                ..Default::default()
            },
            ..Default::default()
        }
        .with_attribute(DESIGNATOR, "R1")
        .with_attribute("Comment", "10k")
    }

    #[test]
    fn lookup_prefers_attributes_then_metadata() {
        let r = resistor().with_attribute("_name", "override");
        assert_eq!(r.lookup("Comment").as_deref(), Some("10k"));
        assert_eq!(r.lookup("_name").as_deref(), Some("override"));
        assert_eq!(resistor().lookup("_name").as_deref(), Some("RES_0603"));
        assert_eq!(resistor().lookup("_part_count").as_deref(), Some("2"));
        assert_eq!(resistor().lookup("_kind"), None);
        assert_eq!(resistor().lookup("Value"), None);
    }

    #[test]
    fn blank_records() {
        assert!(ComponentRecord::default().is_blank());
        assert!(ComponentRecord::default().with_attribute("A", "").is_blank());
        assert!(!resistor().is_blank());
    }

    #[test]
    fn short_unique_id_strips_hierarchy() {
        assert_eq!(resistor().short_unique_id(), Some("EFGH"));
    }

    #[test]
    fn serializes_attributes_then_metadata() {
        insta::assert_json_snapshot!(resistor(), @r#"
        {
          "Comment": "10k",
          "Designator": "R1",
          "_unique_id": "\\ABCD\\EFGH",
          "_name": "RES_0603",
          "_part_count": "2"
        }
        "#);
    }
}
