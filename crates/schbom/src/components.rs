use std::io::{self, Write};

use anyhow::{Context, Result};
use clap::Args;
use schbom_core::{list_components, FileListingCache};

use crate::source::{OpenedSource, SourceArgs};

#[derive(Args, Debug, Clone)]
#[command(about = "List every component of a schematic project as JSON")]
pub struct ComponentsArgs {
    #[command(flatten)]
    pub source: SourceArgs,
}

pub fn execute(args: ComponentsArgs) -> Result<()> {
    let opened = OpenedSource::open(&args.source, &[])?;
    let options = opened.list_options(&args.source);
    let components = list_components(
        &opened.repo,
        &args.source.project,
        &options,
        &mut FileListingCache::new(),
    )
    .with_context(|| format!("Failed to list components of {}", args.source.project))?;

    let mut writer = io::stdout().lock();
    writeln!(writer, "{}", serde_json::to_string_pretty(&components)?)?;
    Ok(())
}
