//! Walking the sheet hierarchy and expanding repeated sheets into components.

use std::collections::{BTreeSet, HashMap};

use crate::component::{ComponentRecord, DESIGNATOR};
use crate::error::{Error, Result};
use crate::hierarchy::Hierarchy;
use crate::repetition::letters_for_repetition;

/// Give each of `count` copies of a component from a repeated sheet its own
/// designator suffix: `R1` becomes `R1A`, `R1B`, ...
///
/// A count of one returns the component untouched. A component whose
/// designator is present but empty is copied without renaming.
pub fn expand_repetitions(
    component: ComponentRecord,
    count: u32,
    sheet: &str,
) -> Result<Vec<ComponentRecord>> {
    if count == 1 {
        return Ok(vec![component]);
    }

    let missing = || Error::MissingDesignator {
        sheet: sheet.to_string(),
        count,
    };
    let designator = component.designator().ok_or_else(missing)?.to_string();
    let logical = component
        .meta
        .logical_designator
        .clone()
        .ok_or_else(missing)?;

    if designator.is_empty() {
        return Ok(vec![component; count as usize]);
    }

    Ok((1..=count)
        .map(|n| {
            let letters = letters_for_repetition(n);
            let mut copy = component.clone();
            copy.attributes
                .insert(DESIGNATOR.to_string(), format!("{designator}{letters}"));
            copy.meta.logical_designator = Some(format!("{logical}{letters}"));
            copy
        })
        .collect())
}

/// Collect every component reachable from `root`, depth first: a sheet's own
/// components come before those of its children, children in the order the
/// hierarchy lists them.
///
/// Sheets without an entry in `components` contribute nothing. A sheet that
/// is reached again through its own descendants is rejected.
pub fn extract_components(
    root: &str,
    components: &HashMap<String, Vec<ComponentRecord>>,
    hierarchy: &Hierarchy,
) -> Result<Vec<ComponentRecord>> {
    let mut stack = BTreeSet::new();
    walk(root, components, hierarchy, &mut stack)
}

fn walk(
    sheet: &str,
    components: &HashMap<String, Vec<ComponentRecord>>,
    hierarchy: &Hierarchy,
    stack: &mut BTreeSet<String>,
) -> Result<Vec<ComponentRecord>> {
    if !stack.insert(sheet.to_string()) {
        return Err(Error::CyclicHierarchy(sheet.to_string()));
    }

    let mut out: Vec<ComponentRecord> = components.get(sheet).cloned().unwrap_or_default();

    for (child, count) in hierarchy.children(sheet) {
        let child_components = walk(child, components, hierarchy, stack)?;
        if *count > 1 {
            for component in child_components {
                out.extend(expand_repetitions(component, *count, child)?);
            }
        } else {
            out.extend(child_components);
        }
    }

    stack.remove(sheet);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentMeta;

    fn part(designator: &str) -> ComponentRecord {
        ComponentRecord {
            meta: ComponentMeta {
                logical_designator: Some(designator.to_string()),
                ..Default::default()
            },
            ..Default::default()
        }
        .with_attribute(DESIGNATOR, designator)
    }

    fn designators(components: &[ComponentRecord]) -> Vec<&str> {
        components.iter().filter_map(ComponentRecord::designator).collect()
    }

    #[test]
    fn expands_repeated_children_with_letters() {
        let components = HashMap::from([
            ("Main".to_string(), vec![part("C1")]),
            ("Sub".to_string(), vec![part("R1")]),
        ]);
        let mut hierarchy = Hierarchy::default();
        hierarchy.add_child("Main", "Sub", 2);

        let out = extract_components("Main", &components, &hierarchy).unwrap();
        assert_eq!(designators(&out), vec!["C1", "R1A", "R1B"]);
        assert_eq!(out[2].meta.logical_designator.as_deref(), Some("R1B"));
    }

    #[test]
    fn nested_repetitions_compound_suffixes() {
        let components = HashMap::from([("Leaf".to_string(), vec![part("U1")])]);
        let mut hierarchy = Hierarchy::default();
        hierarchy.add_child("Top", "Mid", 2);
        hierarchy.add_child("Mid", "Leaf", 2);

        let out = extract_components("Top", &components, &hierarchy).unwrap();
        assert_eq!(designators(&out), vec!["U1AA", "U1AB", "U1BA", "U1BB"]);
    }

    #[test]
    fn repeated_references_to_the_same_child_are_walked_twice() {
        let components = HashMap::from([("Sub".to_string(), vec![part("R1")])]);
        let mut hierarchy = Hierarchy::default();
        hierarchy.add_child("Main", "Sub", 1);
        hierarchy.add_child("Main", "Sub", 1);

        let out = extract_components("Main", &components, &hierarchy).unwrap();
        assert_eq!(designators(&out), vec!["R1", "R1"]);
    }

    #[test]
    fn missing_designator_on_repeated_sheet_is_fatal() {
        let components = HashMap::from([("Sub".to_string(), vec![ComponentRecord::default()])]);
        let mut hierarchy = Hierarchy::default();
        hierarchy.add_child("Main", "Sub", 3);

        let err = extract_components("Main", &components, &hierarchy).unwrap_err();
        assert!(matches!(err, Error::MissingDesignator { count: 3, .. }));
    }

    #[test]
    fn empty_designator_is_copied_verbatim() {
        let blank = part("").with_attribute("Comment", "Logo");
        let out = expand_repetitions(blank.clone(), 2, "Sub").unwrap();
        assert_eq!(out, vec![blank.clone(), blank]);
    }

    #[test]
    fn cycles_are_rejected() {
        let mut hierarchy = Hierarchy::default();
        hierarchy.add_child("A", "B", 1);
        hierarchy.add_child("B", "A", 1);

        let err = extract_components("A", &HashMap::new(), &hierarchy).unwrap_err();
        assert!(matches!(err, Error::CyclicHierarchy(sheet) if sheet == "A"));
    }
}
