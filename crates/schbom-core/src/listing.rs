//! Listing every component of a project, per design tool.

use std::collections::{BTreeMap, HashMap};

use crate::annotation::Annotations;
use crate::component::ComponentRecord;
use crate::document::{MultiPageComponent, MultiPageDocument, SheetDocument, SheetRef};
use crate::error::{Error, Result};
use crate::hierarchy::resolve_hierarchy;
use crate::multipart::{combine_altium, combine_orcad};
use crate::path::{file_stem, resolve_relative};
use crate::project::ProjectFile;
use crate::source::{fetch_generated_json, find_device_sheet, FileListingCache, Repository, RetryPolicy};
use crate::variant::VariantDirectives;
use crate::walker::extract_components;
use crate::{infer_project_tool, Tool};

/// Altium component kinds that never appear on a bill of materials,
/// normalized with [`normalize_kind`].
const NON_BOM_KINDS: &[&str] = &["graphical", "nettienobom", "standardnobom"];

fn normalize_kind(kind: &str) -> String {
    kind.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

/// How to list components.
#[derive(Clone)]
pub struct ListOptions<'a> {
    /// Branch, tag or commit; the repository default when unset.
    pub git_ref: Option<String>,
    /// Altium variant to apply, by description.
    pub variant: Option<String>,
    pub combine_multi_part: bool,
    pub remove_non_bom_components: bool,
    /// Repositories searched for device sheets missing from the project.
    pub design_reuse: Vec<&'a dyn Repository>,
    pub annotations: Option<&'a Annotations>,
    pub retry: RetryPolicy,
}

impl Default for ListOptions<'_> {
    fn default() -> Self {
        Self {
            git_ref: None,
            variant: None,
            combine_multi_part: false,
            remove_non_bom_components: true,
            design_reuse: Vec::new(),
            annotations: None,
            retry: RetryPolicy::default(),
        }
    }
}

impl<'a> ListOptions<'a> {
    pub fn with_git_ref(mut self, git_ref: impl Into<String>) -> Self {
        self.git_ref = Some(git_ref.into());
        self
    }

    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    pub fn with_combine_multi_part(mut self, combine: bool) -> Self {
        self.combine_multi_part = combine;
        self
    }

    pub fn with_remove_non_bom_components(mut self, remove: bool) -> Self {
        self.remove_non_bom_components = remove;
        self
    }

    pub fn with_design_reuse(mut self, repos: Vec<&'a dyn Repository>) -> Self {
        self.design_reuse = repos;
        self
    }

    pub fn with_annotations(mut self, annotations: &'a Annotations) -> Self {
        self.annotations = Some(annotations);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn git_ref<'r>(&'r self, repo: &'r dyn Repository) -> &'r str {
        self.git_ref.as_deref().unwrap_or(repo.default_ref())
    }
}

/// List the components of the project at `source_file`, choosing the design
/// tool from its extension.
pub fn list_components(
    repo: &dyn Repository,
    source_file: &str,
    options: &ListOptions<'_>,
    cache: &mut FileListingCache,
) -> Result<Vec<ComponentRecord>> {
    match infer_project_tool(source_file)? {
        Tool::Altium => list_components_for_altium(repo, source_file, options, cache),
        Tool::OrCad => list_components_for_orcad(repo, source_file, options),
        Tool::SystemCapture => list_components_for_system_capture(repo, source_file, options),
    }
}

/// Drop components with no attribute values at all.
pub fn filter_blank_components(components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    components
        .into_iter()
        .filter(|c| {
            let blank = c.is_blank();
            if blank {
                log::debug!("Component {:?} has no attributes; skipping.", c.meta.unique_id);
            }
            !blank
        })
        .collect()
}

/// Drop graphical and no-BOM Altium components.
pub fn remove_non_bom_components(components: Vec<ComponentRecord>) -> Vec<ComponentRecord> {
    components
        .into_iter()
        .filter(|c| {
            c.meta
                .kind
                .as_deref()
                .is_none_or(|kind| !NON_BOM_KINDS.contains(&normalize_kind(kind).as_str()))
        })
        .collect()
}

struct LoadedSheets {
    refs: BTreeMap<String, Vec<SheetRef>>,
    components: HashMap<String, Vec<ComponentRecord>>,
}

impl LoadedSheets {
    fn new() -> Self {
        Self {
            refs: BTreeMap::new(),
            components: HashMap::new(),
        }
    }

    fn add(&mut self, key: String, document: SheetDocument) {
        self.components.insert(
            key.clone(),
            document.components().map(|c| c.to_record()).collect(),
        );
        self.refs
            .insert(key, document.sheet_refs().cloned().collect());
    }
}

/// List the components of an Altium project.
///
/// Repetitions are expanded before multi-part components are combined, and
/// the variant is applied last so that it sees post-expansion designators.
pub fn list_components_for_altium(
    repo: &dyn Repository,
    project_file: &str,
    options: &ListOptions<'_>,
    cache: &mut FileListingCache,
) -> Result<Vec<ComponentRecord>> {
    let git_ref = options.git_ref(repo);
    log::info!("Listing components of {project_file} in {} at {git_ref}", repo.name());

    let project = ProjectFile::parse(&repo.raw_file(project_file, git_ref)?)?;
    let directives = match &options.variant {
        Some(name) => Some(VariantDirectives::from_section(project.variant(name)?)),
        None => None,
    };

    let documents = project.documents();
    log::info!("Found {} schematic documents", documents.len());
    let mut document_sheets = LoadedSheets::new();
    for document in documents {
        let path = resolve_relative(document, project_file);
        let json = fetch_generated_json(repo, &path, git_ref, &options.retry)?;
        let sheet = SheetDocument::from_json(&path, json)?;
        document_sheets.add(path, sheet);
    }

    let mut device_sheets = LoadedSheets::new();
    for device_sheet in project.device_sheets() {
        let location = find_device_sheet(
            device_sheet,
            repo,
            project_file,
            &options.design_reuse,
            cache,
        )?;
        let sheet_ref = if location.in_project {
            git_ref
        } else {
            location.repository.default_ref()
        };
        let json = fetch_generated_json(location.repository, &location.path, sheet_ref, &options.retry)?;
        let sheet = SheetDocument::from_json(&location.path, json)?;
        device_sheets.add(file_stem(&location.path).to_string(), sheet);
    }

    let resolved = resolve_hierarchy(&document_sheets.refs, &device_sheets.refs)?;
    let mut by_sheet = document_sheets.components;
    by_sheet.extend(device_sheets.components);

    let mut components = Vec::new();
    for root in &resolved.roots {
        components.extend(extract_components(root, &by_sheet, &resolved.hierarchy)?);
    }

    if let Some(annotations) = options.annotations {
        components = annotations.apply(components);
    }
    if options.combine_multi_part {
        components = combine_altium(components);
    }
    if let Some(directives) = &directives {
        components = directives.apply(components);
    }
    if options.remove_non_bom_components {
        components = remove_non_bom_components(components);
    }

    Ok(filter_blank_components(components))
}

fn list_multi_page(
    tool: Tool,
    repo: &dyn Repository,
    source_file: &str,
    options: &ListOptions<'_>,
) -> Result<Vec<ComponentRecord>> {
    if options.variant.is_some() {
        return Err(Error::VariantUnsupported(tool));
    }

    let git_ref = options.git_ref(repo);
    log::info!("Listing components of {source_file} in {} at {git_ref}", repo.name());
    let json = fetch_generated_json(repo, source_file, git_ref, &options.retry)?;
    let document = MultiPageDocument::from_json(source_file, json)?;
    Ok(document.components().map(MultiPageComponent::to_record).collect())
}

/// List the components of an OrCAD design. Variants are not supported.
pub fn list_components_for_orcad(
    repo: &dyn Repository,
    source_file: &str,
    options: &ListOptions<'_>,
) -> Result<Vec<ComponentRecord>> {
    let mut components = list_multi_page(Tool::OrCad, repo, source_file, options)?;
    if options.combine_multi_part {
        components = combine_orcad(components);
    }
    Ok(filter_blank_components(components))
}

/// List the components of a System Capture design. Variants are not
/// supported and multi-part components are always listed per part.
pub fn list_components_for_system_capture(
    repo: &dyn Repository,
    source_file: &str,
    options: &ListOptions<'_>,
) -> Result<Vec<ComponentRecord>> {
    if options.combine_multi_part {
        log::warn!("Combining multi-part components is not supported for System Capture; listing parts individually.");
    }
    let components = list_multi_page(Tool::SystemCapture, repo, source_file, options)?;
    Ok(filter_blank_components(components))
}
