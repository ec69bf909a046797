//! Folding the parts of multi-part components into one record each.

use std::collections::HashSet;

use crate::component::{ComponentRecord, DESIGNATOR, PART_REFERENCE};

/// Split off components without a key and keep the first component of each
/// key, in first-seen order.
fn group_by_key(
    components: Vec<ComponentRecord>,
    key: impl Fn(&ComponentRecord) -> Option<String>,
) -> (Vec<ComponentRecord>, Vec<(String, ComponentRecord)>) {
    let mut single = Vec::new();
    let mut groups: Vec<(String, ComponentRecord)> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for component in components {
        let Some(k) = key(&component) else {
            single.push(component);
            continue;
        };
        if seen.insert(k.clone()) {
            groups.push((k, component));
        }
    }

    (single, groups)
}

/// Combine Altium parts sharing a logical designator.
///
/// Parts are recognised by carrying both a part count and a current part id.
/// The first part stands for the whole component: its designator becomes the
/// logical designator and the current part id is dropped. Single-part
/// components come first, in their original order, followed by one record
/// per group in first-seen order.
pub fn combine_altium(components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    let (mut out, groups) = group_by_key(components, |c| {
        let is_part = c.meta.part_count.is_some() && c.meta.current_part_id.is_some();
        is_part.then(|| c.meta.logical_designator.clone().unwrap_or_default())
    });

    out.extend(groups.into_iter().map(|(designator, mut combined)| {
        combined.attributes.insert(DESIGNATOR.to_string(), designator);
        combined.meta.current_part_id = None;
        combined
    }));
    out
}

/// Combine OrCAD parts sharing a logical reference.
///
/// The first part stands for the whole component, with its part reference
/// and reference both set to the logical reference.
pub fn combine_orcad(components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    let (mut out, groups) = group_by_key(components, |c| c.meta.logical_reference.clone());

    out.extend(groups.into_iter().map(|(reference, mut combined)| {
        combined
            .attributes
            .insert(PART_REFERENCE.to_string(), reference.clone());
        combined.meta.reference = Some(reference);
        combined
    }));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentMeta;

    fn altium_part(designator: &str, logical: &str, part: Option<u32>) -> ComponentRecord {
        ComponentRecord {
            meta: ComponentMeta {
                logical_designator: Some(logical.to_string()),
                part_count: part.map(|_| 2),
                current_part_id: part,
                ..Default::default()
            },
            ..Default::default()
        }
        .with_attribute(DESIGNATOR, designator)
    }

    #[test]
    fn altium_parts_fold_into_first_part() {
        let out = combine_altium(vec![
            altium_part("U1A", "U1", Some(1)),
            altium_part("R1", "R1", None),
            altium_part("U1B", "U1", Some(2)),
            altium_part("U2A", "U2", Some(1)),
        ]);

        let designators: Vec<_> = out.iter().filter_map(|c| c.designator()).collect();
        assert_eq!(designators, vec!["R1", "U1", "U2"]);
        assert_eq!(out[1].meta.current_part_id, None);
        assert_eq!(out[1].meta.part_count, Some(2));
    }

    #[test]
    fn orcad_parts_fold_by_logical_reference() {
        let part = |reference: &str, logical: Option<&str>| ComponentRecord {
            meta: ComponentMeta {
                reference: Some(reference.to_string()),
                logical_reference: logical.map(str::to_string),
                ..Default::default()
            },
            ..Default::default()
        }
        .with_attribute(PART_REFERENCE, reference);

        let out = combine_orcad(vec![
            part("U1A", Some("U1")),
            part("U1B", Some("U1")),
            part("C1", None),
        ]);

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].attribute(PART_REFERENCE), Some("C1"));
        assert_eq!(out[1].attribute(PART_REFERENCE), Some("U1"));
        assert_eq!(out[1].meta.reference.as_deref(), Some("U1"));
    }
}
