use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod bom;
mod components;
mod local;
mod netlist;
mod source;

#[derive(Parser)]
#[command(name = "schbom")]
#[command(about = "Component listing and BOM generation for schematic projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true, hide = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate Bill of Materials (BOM)
    Bom(bom::BomArgs),

    /// List components as JSON
    #[command(alias = "c")]
    Components(components::ComponentsArgs),

    /// Print PCB nets
    Netlist(netlist::NetlistArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the default level
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    match cli.command {
        Commands::Bom(args) => bom::execute(args),
        Commands::Components(args) => components::execute(args),
        Commands::Netlist(args) => netlist::execute(args),
    }
}
