use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, ValueEnum};
use comfy_table::presets::UTF8_FULL_CONDENSED;
use comfy_table::Table;
use schbom_core::bom::QUANTITY_COLUMN;
use schbom_core::{generate_bom, Bom, BomProfile, ColumnMapping, FileListingCache};

use crate::source::{OpenedSource, SourceArgs};

#[derive(ValueEnum, Debug, Clone, Default)]
pub enum BomFormat {
    #[default]
    Table,
    Csv,
    Json,
}

impl std::fmt::Display for BomFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BomFormat::Table => write!(f, "table"),
            BomFormat::Csv => write!(f, "csv"),
            BomFormat::Json => write!(f, "json"),
        }
    }
}

#[derive(Args, Debug, Clone)]
#[command(about = "Generate a Bill of Materials (BOM) from a schematic project")]
pub struct BomArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// YAML profile with columns, grouping and listing options
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub profile: Option<PathBuf>,

    /// Output column and the attributes it is read from, first match wins.
    /// Replaces the profile columns when given.
    #[arg(long = "column", value_name = "NAME=ATTR[,ATTR...]", value_parser = parse_column)]
    pub columns: Vec<(String, Vec<String>)>,

    /// Column whose equal values are grouped into one row (repeatable)
    #[arg(long = "group-by", value_name = "COLUMN")]
    pub group_by: Vec<String>,

    /// Output format
    #[arg(short, long, default_value_t = BomFormat::Table)]
    pub format: BomFormat,
}

fn parse_column(value: &str) -> Result<(String, Vec<String>), String> {
    let (name, attributes) = value
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=ATTR[,ATTR...], got '{value}'"))?;
    let attributes: Vec<String> = attributes
        .split(',')
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect();
    if name.trim().is_empty() || attributes.is_empty() {
        return Err(format!("expected NAME=ATTR[,ATTR...], got '{value}'"));
    }
    Ok((name.trim().to_string(), attributes))
}

/// Command-line options layered over the profile.
struct Settings {
    mapping: ColumnMapping,
    group_by: Vec<String>,
    source: SourceArgs,
    extra_reuse: Vec<PathBuf>,
}

fn settings(args: BomArgs) -> Result<Settings> {
    let profile = match &args.profile {
        Some(path) => Some(
            BomProfile::load(path)
                .with_context(|| format!("Failed to load profile {}", path.display()))?,
        ),
        None => None,
    };

    let mapping = if !args.columns.is_empty() {
        args.columns
            .into_iter()
            .fold(ColumnMapping::new(), |mapping, (name, attributes)| {
                mapping.column(name, attributes)
            })
    } else if let Some(profile) = &profile {
        profile.columns.clone()
    } else {
        bail!("No BOM columns given; pass --profile or --column");
    };

    let group_by = match (&profile, args.group_by.is_empty()) {
        (Some(profile), true) => profile.group_by.clone(),
        _ => args.group_by,
    };

    let mut source = args.source;
    let mut extra_reuse = Vec::new();
    if let Some(profile) = profile {
        source.variant = source.variant.or(profile.variant);
        source.combine_multi_part |= profile.combine_multi_part;
        source.keep_non_bom |= !profile.remove_non_bom_components;
        extra_reuse = profile.design_reuse;
    }

    Ok(Settings {
        mapping,
        group_by,
        source,
        extra_reuse,
    })
}

pub fn execute(args: BomArgs) -> Result<()> {
    let format = args.format.clone();
    let settings = settings(args)?;

    let opened = OpenedSource::open(&settings.source, &settings.extra_reuse)?;
    let options = opened.list_options(&settings.source);
    let bom = generate_bom(
        &opened.repo,
        &settings.source.project,
        &settings.mapping,
        &settings.group_by,
        &options,
        &mut FileListingCache::new(),
    )
    .with_context(|| format!("Failed to generate BOM for {}", settings.source.project))?;
    log::info!(
        "{} rows, {} components",
        bom.rows.len(),
        bom.total_quantity()
    );

    let mut writer = io::stdout().lock();
    match format {
        BomFormat::Json => writeln!(writer, "{}", serde_json::to_string_pretty(&bom)?)?,
        BomFormat::Csv => bom.write_csv(writer)?,
        BomFormat::Table => write_bom_table(&bom, writer)?,
    };

    Ok(())
}

fn write_bom_table<W: Write>(bom: &Bom, mut writer: W) -> io::Result<()> {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(comfy_table::ContentArrangement::DynamicFullWidth);

    table.set_header(
        bom.columns
            .iter()
            .map(String::as_str)
            .chain([QUANTITY_COLUMN]),
    );
    for row in &bom.rows {
        table.add_row(
            row.values
                .iter()
                .map(|(_, value)| value.clone())
                .chain([row.quantity.to_string()]),
        );
    }

    writeln!(writer, "{table}")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_arguments() {
        assert_eq!(
            parse_column("Part Number=PART, Part Number").unwrap(),
            ("Part Number".to_string(), vec!["PART".to_string(), "Part Number".to_string()])
        );
        assert!(parse_column("Part Number").is_err());
        assert!(parse_column("Part Number=").is_err());
        assert!(parse_column("=PART").is_err());
    }
}
