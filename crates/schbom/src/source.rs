use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use schbom_core::{Annotations, ListOptions, Repository};

use crate::local::LocalRepository;

/// Where a project lives and how its components are listed.
#[derive(Args, Debug, Clone)]
pub struct SourceArgs {
    /// Project file, relative to the repository root (.PrjPcb, .DSN or .sdax)
    #[arg(value_name = "PROJECT")]
    pub project: String,

    /// Repository checkout holding the project
    #[arg(long, value_name = "DIR", default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub repo: PathBuf,

    /// Ref to read; a checkout only serves its working tree as HEAD
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,

    /// Altium variant to apply, by description
    #[arg(long, value_name = "NAME")]
    pub variant: Option<String>,

    /// Combine the parts of multi-part components into one component
    #[arg(long)]
    pub combine_multi_part: bool,

    /// Keep graphical and no-BOM components
    #[arg(long)]
    pub keep_non_bom: bool,

    /// Repository checkout searched for device sheets (repeatable)
    #[arg(long = "design-reuse", value_name = "DIR", value_hint = clap::ValueHint::DirPath)]
    pub design_reuse: Vec<PathBuf>,

    /// JSON file of board-level designator changes keyed by unique id
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub annotations: Option<PathBuf>,
}

/// Repositories and annotations opened for one invocation. Listing options
/// borrow from it.
pub struct OpenedSource {
    pub repo: LocalRepository,
    pub design_reuse: Vec<LocalRepository>,
    pub annotations: Option<Annotations>,
}

impl OpenedSource {
    pub fn open(args: &SourceArgs, extra_reuse: &[PathBuf]) -> Result<Self> {
        let repo = LocalRepository::open(&args.repo)
            .with_context(|| format!("Failed to open repository {}", args.repo.display()))?;

        let design_reuse = extra_reuse
            .iter()
            .chain(&args.design_reuse)
            .map(|dir| {
                LocalRepository::open(dir).with_context(|| {
                    format!("Failed to open design reuse repository {}", dir.display())
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let annotations = match &args.annotations {
            Some(path) => {
                let json = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let annotations = Annotations::from_json(&json)
                    .with_context(|| format!("Invalid annotations in {}", path.display()))?;
                log::debug!("Loaded {} annotations", annotations.len());
                Some(annotations)
            }
            None => None,
        };

        Ok(Self {
            repo,
            design_reuse,
            annotations,
        })
    }

    pub fn list_options(&self, args: &SourceArgs) -> ListOptions<'_> {
        let mut options = ListOptions::default()
            .with_combine_multi_part(args.combine_multi_part)
            .with_remove_non_bom_components(!args.keep_non_bom)
            .with_design_reuse(
                self.design_reuse
                    .iter()
                    .map(|r| r as &dyn Repository)
                    .collect(),
            );
        if let Some(git_ref) = &args.git_ref {
            options = options.with_git_ref(git_ref);
        }
        if let Some(variant) = &args.variant {
            options = options.with_variant(variant);
        }
        if let Some(annotations) = &self.annotations {
            options = options.with_annotations(annotations);
        }
        options
    }
}
