//! Board-level re-annotation of designators.

use std::collections::HashMap;

use serde::Deserialize;

use crate::component::{ComponentRecord, DESIGNATOR};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Annotation {
    pub from: String,
    pub to: String,
}

/// Designator changes keyed by the full unique id of a component.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Annotations(HashMap<String, Annotation>);

impl Annotations {
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    pub fn insert(&mut self, unique_id: impl Into<String>, from: &str, to: &str) {
        self.0.insert(
            unique_id.into(),
            Annotation {
                from: from.to_string(),
                to: to.to_string(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Rename every component whose annotation changes its designator. Both
    /// the designator and the logical designator take the new name.
    pub fn apply(&self, components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
        components
            .into_iter()
            .map(|mut component| {
                let annotation = component
                    .meta
                    .unique_id
                    .as_deref()
                    .and_then(|id| self.0.get(id))
                    .filter(|a| a.from != a.to);
                if let Some(annotation) = annotation {
                    log::debug!("Re-annotating {} as {}", annotation.from, annotation.to);
                    component
                        .attributes
                        .insert(DESIGNATOR.to_string(), annotation.to.clone());
                    component.meta.logical_designator = Some(annotation.to.clone());
                }
                component
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentMeta;

    fn part(designator: &str, unique_id: &str) -> ComponentRecord {
        ComponentRecord {
            meta: ComponentMeta {
                logical_designator: Some("U1".into()),
                unique_id: Some(unique_id.into()),
                ..Default::default()
            },
            ..Default::default()
        }
        .with_attribute(DESIGNATOR, designator)
    }

    #[test]
    fn renames_when_annotation_differs() {
        let annotations = Annotations::from_json(r#"{"S1\\C1": {"from": "U1", "to": "R5"}}"#).unwrap();
        let out = annotations.apply(vec![part("U1A", "S1\\C1"), part("U2", "S1\\C2")]);

        assert_eq!(out[0].designator(), Some("R5"));
        assert_eq!(out[0].meta.logical_designator.as_deref(), Some("R5"));
        assert_eq!(out[1], part("U2", "S1\\C2"));
    }

    #[test]
    fn identical_annotation_leaves_component_alone() {
        let mut annotations = Annotations::default();
        annotations.insert("S1\\C1", "U1", "U1");
        let out = annotations.apply(vec![part("U1A", "S1\\C1")]);
        assert_eq!(out[0].designator(), Some("U1A"));
    }
}
