//! Component listing and bill-of-materials generation for ECAD projects.
//!
//! Design files live in a [`source::Repository`] that can also serve the
//! JSON generated for each of them. From that JSON this crate:
//!
//! * resolves the sheet hierarchy of an Altium project, including repeated
//!   sheets and device sheets from design reuse repositories,
//! * lists every placed component with per-instance designators,
//! * optionally combines multi-part components and applies a project
//!   variant,
//! * maps the result onto user-defined BOM columns and groups rows.
//!
//! OrCAD and System Capture designs are read from their multi-page JSON.
//! Everything is rebuilt per call; nothing is persisted.

pub mod annotation;
pub mod bom;
pub mod component;
pub mod document;
pub mod error;
pub mod hierarchy;
pub mod listing;
pub mod multipart;
pub mod netlist;
pub mod path;
pub mod profile;
pub mod project;
pub mod repetition;
pub mod source;
pub mod variant;
pub mod walker;

use std::fmt;

pub use annotation::Annotations;
pub use bom::{map_and_group, Bom, BomRow, ColumnMapping};
pub use component::{ComponentMeta, ComponentRecord};
pub use error::{Error, Result};
pub use hierarchy::{resolve_hierarchy, Hierarchy, ResolvedHierarchy};
pub use listing::{list_components, ListOptions};
pub use netlist::{generate_netlist, Netlist};
pub use profile::{BomProfile, ProfileError};
pub use source::{FetchError, FileListingCache, InMemoryRepository, Repository, RetryPolicy};
pub use variant::{apply_variant, VariantDirectives};
pub use walker::extract_components;

/// Design tool that produced a project.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tool {
    Altium,
    OrCad,
    SystemCapture,
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tool::Altium => write!(f, "Altium"),
            Tool::OrCad => write!(f, "OrCAD"),
            Tool::SystemCapture => write!(f, "System Capture"),
        }
    }
}

/// Pick the design tool from the project file extension.
pub fn infer_project_tool(source_file: &str) -> Result<Tool> {
    if path::has_extension(source_file, "prjpcb") {
        Ok(Tool::Altium)
    } else if path::has_extension(source_file, "dsn") {
        Ok(Tool::OrCad)
    } else if path::has_extension(source_file, "sdax") {
        Ok(Tool::SystemCapture)
    } else {
        Err(Error::UnsupportedProjectFile(source_file.to_string()))
    }
}

/// Apply multi-part combining for `tool`. System Capture designs are
/// returned unchanged.
pub fn combine_multi_part(tool: Tool, components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    match tool {
        Tool::Altium => multipart::combine_altium(components),
        Tool::OrCad => multipart::combine_orcad(components),
        Tool::SystemCapture => components,
    }
}

/// List the components of a project and turn them into a BOM.
pub fn generate_bom(
    repo: &dyn Repository,
    source_file: &str,
    mapping: &ColumnMapping,
    group_by: &[String],
    options: &ListOptions<'_>,
    cache: &mut FileListingCache,
) -> Result<Bom> {
    let components = list_components(repo, source_file, options, cache)?;
    log::info!("Listed {} components from {source_file}", components.len());
    map_and_group(&components, mapping, group_by)
}
