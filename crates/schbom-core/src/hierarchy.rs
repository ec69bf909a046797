//! Parent/child relationships between the sheets of a project.
//!
//! Two kinds of sheets exist: project documents, keyed by their repository
//! path, and device sheets, keyed by file stem. Device sheets can only
//! reference other device sheets; documents can reference either.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::document::SheetRef;
use crate::error::{Error, Result};
use crate::path::{file_stem, resolve_relative, CaseFoldedIndex};
use crate::repetition::sum_repetitions;

/// Child sheets of every sheet that has any, each with its repetition count.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hierarchy {
    children: BTreeMap<String, Vec<(String, u32)>>,
}

impl Hierarchy {
    pub fn children(&self, sheet: &str) -> &[(String, u32)] {
        self.children.get(sheet).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn add_child(&mut self, parent: &str, child: &str, count: u32) {
        self.children
            .entry(parent.to_string())
            .or_default()
            .push((child.to_string(), count));
    }

    pub fn parents(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Fail with the first sheet found on a reference cycle. Every sheet is
    /// checked, including sheets unreachable from any root.
    pub fn check_acyclic(&self) -> Result<()> {
        let mut marks: HashMap<&str, Mark> = HashMap::new();
        for sheet in self.parents() {
            self.visit(sheet, &mut marks)?;
        }
        Ok(())
    }

    fn visit<'a>(&'a self, sheet: &'a str, marks: &mut HashMap<&'a str, Mark>) -> Result<()> {
        match marks.get(sheet) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::OnStack) => return Err(Error::CyclicHierarchy(sheet.to_string())),
            None => {}
        }
        marks.insert(sheet, Mark::OnStack);
        for (child, _) in self.children(sheet) {
            self.visit(child, marks)?;
        }
        marks.insert(sheet, Mark::Done);
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Mark {
    OnStack,
    Done,
}

/// Hierarchy plus the top-level sheets to start walking from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedHierarchy {
    pub roots: BTreeSet<String>,
    pub hierarchy: Hierarchy,
}

/// Sum repetitions of `sheet`'s references per target file, failing on
/// references without a filename.
fn repetitions(sheet: &str, refs: &[SheetRef]) -> Result<Vec<(String, u32)>> {
    let pairs = refs
        .iter()
        .map(|r| {
            let filename = r.filename.as_deref().ok_or_else(|| Error::MissingSheetFilename {
                sheet: sheet.to_string(),
            })?;
            Ok((filename, r.display_name()))
        })
        .collect::<Result<Vec<_>>>()?;
    sum_repetitions(pairs)
}

/// Look up a reference by its raw text among device sheets. References are
/// usually the bare stem; a trailing extension is tolerated.
fn device_sheet_for<'a>(devices: &'a CaseFoldedIndex, reference: &str) -> Option<&'a str> {
    devices
        .get(reference)
        .or_else(|| devices.get(file_stem(reference)))
}

/// Build the sheet hierarchy from the outgoing references of each sheet.
///
/// `documents` are keyed by repository path, `device_sheets` by stem. Every
/// document not referenced by another document is a root.
pub fn resolve_hierarchy(
    documents: &BTreeMap<String, Vec<SheetRef>>,
    device_sheets: &BTreeMap<String, Vec<SheetRef>>,
) -> Result<ResolvedHierarchy> {
    let document_index = CaseFoldedIndex::new(documents.keys().map(String::as_str));
    let device_index = CaseFoldedIndex::new(device_sheets.keys().map(String::as_str));

    let mut roots: BTreeSet<String> = documents.keys().cloned().collect();
    let mut hierarchy = Hierarchy::default();

    for (sheet, refs) in device_sheets {
        for (reference, count) in repetitions(sheet, refs)? {
            let child = device_sheet_for(&device_index, &reference).ok_or_else(|| {
                Error::UnknownSheetReference {
                    parent: sheet.clone(),
                    reference: reference.clone(),
                }
            })?;
            hierarchy.add_child(sheet, child, count);
        }
    }

    for (sheet, refs) in documents {
        for (reference, count) in repetitions(sheet, refs)? {
            let resolved = resolve_relative(&reference, sheet);
            let child = document_index
                .get(&resolved)
                .or_else(|| device_sheet_for(&device_index, &reference))
                .ok_or_else(|| Error::UnknownSheetReference {
                    parent: sheet.clone(),
                    reference: reference.clone(),
                })?;
            hierarchy.add_child(sheet, child, count);
            roots.remove(child);
        }
    }

    hierarchy.check_acyclic()?;

    log::debug!(
        "Resolved sheet hierarchy with roots {:?} and {} parent sheets",
        roots,
        hierarchy.children.len()
    );
    Ok(ResolvedHierarchy { roots, hierarchy })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn refs(items: &[(&str, &str)]) -> Vec<SheetRef> {
        items
            .iter()
            .map(|(file, name)| SheetRef::new(*file, *name))
            .collect()
    }

    #[test]
    fn documents_referenced_by_documents_are_not_roots() {
        let documents = BTreeMap::from([
            (
                "Project/Main.SchDoc".to_string(),
                refs(&[("sub.schdoc", "Repeat(CH,1,2)")]),
            ),
            ("Project/Sub.SchDoc".to_string(), vec![]),
            ("Project/Standalone.SchDoc".to_string(), vec![]),
        ]);

        let resolved = resolve_hierarchy(&documents, &BTreeMap::new()).unwrap();
        assert_eq!(
            resolved.roots,
            BTreeSet::from([
                "Project/Main.SchDoc".to_string(),
                "Project/Standalone.SchDoc".to_string()
            ])
        );
        assert_eq!(
            resolved.hierarchy.children("Project/Main.SchDoc"),
            &[("Project/Sub.SchDoc".to_string(), 2)]
        );
        assert!(resolved.hierarchy.children("Project/Sub.SchDoc").is_empty());
    }

    #[test]
    fn documents_fall_back_to_device_sheets() {
        let documents = BTreeMap::from([(
            "Main.SchDoc".to_string(),
            refs(&[("FILTER", "Filter"), ("Filter", "Repeat(F,1,3)")]),
        )]);
        let device_sheets = BTreeMap::from([
            ("Filter".to_string(), refs(&[("Stage.SchDoc", "Stage")])),
            ("Stage".to_string(), vec![]),
        ]);

        let resolved = resolve_hierarchy(&documents, &device_sheets).unwrap();
        assert_eq!(resolved.roots, BTreeSet::from(["Main.SchDoc".to_string()]));
        assert_eq!(
            resolved.hierarchy.children("Main.SchDoc"),
            &[("Filter".to_string(), 1), ("Filter".to_string(), 3)]
        );
        assert_eq!(
            resolved.hierarchy.children("Filter"),
            &[("Stage".to_string(), 1)]
        );
    }

    #[test]
    fn cycles_without_a_root_are_rejected() {
        let documents = BTreeMap::from([
            ("A.SchDoc".to_string(), refs(&[("B.SchDoc", "B")])),
            ("B.SchDoc".to_string(), refs(&[("A.SchDoc", "A")])),
        ]);
        let err = resolve_hierarchy(&documents, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::CyclicHierarchy(_)));
    }

    #[test]
    fn device_sheet_cycles_are_rejected() {
        let documents = BTreeMap::from([("Main.SchDoc".to_string(), refs(&[("Loop", "Loop")]))]);
        let device_sheets = BTreeMap::from([("Loop".to_string(), refs(&[("Loop", "Loop")]))]);
        let err = resolve_hierarchy(&documents, &device_sheets).unwrap_err();
        assert!(matches!(err, Error::CyclicHierarchy(sheet) if sheet == "Loop"));
    }

    #[test]
    fn shared_children_are_not_cycles() {
        let mut hierarchy = Hierarchy::default();
        hierarchy.add_child("Main", "Left", 1);
        hierarchy.add_child("Main", "Right", 1);
        hierarchy.add_child("Left", "Leaf", 2);
        hierarchy.add_child("Right", "Leaf", 1);
        assert!(hierarchy.check_acyclic().is_ok());
    }

    #[test]
    fn unknown_reference_is_fatal() {
        let documents = BTreeMap::from([("Main.SchDoc".to_string(), refs(&[("Nope.SchDoc", "")]))]);
        let err = resolve_hierarchy(&documents, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::UnknownSheetReference { .. }));
    }

    #[test]
    fn missing_filename_is_fatal() {
        let documents = BTreeMap::from([(
            "Main.SchDoc".to_string(),
            vec![SheetRef {
                sheet_name: None,
                filename: None,
            }],
        )]);
        let err = resolve_hierarchy(&documents, &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, Error::MissingSheetFilename { sheet } if sheet == "Main.SchDoc"));
    }
}
