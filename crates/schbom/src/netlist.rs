use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use colored::Colorize;
use schbom_core::{generate_netlist, Netlist, RetryPolicy};

use crate::local::LocalRepository;

#[derive(ValueEnum, Debug, Clone, Default)]
pub enum NetlistFormat {
    #[default]
    Json,
    Text,
}

impl std::fmt::Display for NetlistFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetlistFormat::Json => write!(f, "json"),
            NetlistFormat::Text => write!(f, "text"),
        }
    }
}

#[derive(Args, Debug, Clone)]
#[command(about = "Print the nets of a PCB document and the pins on each")]
pub struct NetlistArgs {
    /// PCB document, relative to the repository root
    #[arg(value_name = "PCB_FILE")]
    pub pcb_file: String,

    /// Repository checkout holding the PCB document
    #[arg(long, value_name = "DIR", default_value = ".", value_hint = clap::ValueHint::DirPath)]
    pub repo: PathBuf,

    /// Ref to read; a checkout only serves its working tree as HEAD
    #[arg(long = "ref", value_name = "REF")]
    pub git_ref: Option<String>,

    /// Output format
    #[arg(short, long, default_value_t = NetlistFormat::Json)]
    pub format: NetlistFormat,
}

pub fn execute(args: NetlistArgs) -> Result<()> {
    let repo = LocalRepository::open(&args.repo)
        .with_context(|| format!("Failed to open repository {}", args.repo.display()))?;
    let netlist = generate_netlist(
        &repo,
        &args.pcb_file,
        args.git_ref.as_deref(),
        &RetryPolicy::default(),
    )
    .with_context(|| format!("Failed to generate netlist for {}", args.pcb_file))?;

    let mut writer = io::stdout().lock();
    match args.format {
        NetlistFormat::Json => writeln!(writer, "{}", serde_json::to_string_pretty(&netlist)?)?,
        NetlistFormat::Text => write_netlist_text(&netlist, writer)?,
    }
    Ok(())
}

fn write_netlist_text<W: Write>(netlist: &Netlist, mut writer: W) -> io::Result<()> {
    for (net, pins) in &netlist.nets {
        writeln!(writer, "{} {}", net.bold(), pins.join(" "))?;
    }
    Ok(())
}
