use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::source::SourceKind;

#[derive(Parser, Debug)]
#[command(
    name = "vbox-search",
    about = "Search and launch VirtualBox machines",
    version
)]
pub struct Cli {
    /// Path to config file (default: ~/.config/vbox-search/config.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Where to discover machines (overrides config)
    #[arg(short, long, value_enum)]
    pub source: Option<SourceArg>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SourceArg {
    /// Read and watch ~/.VirtualBox/VirtualBox.xml
    File,
    /// Run `vboxmanage list vms`
    Command,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::File => SourceKind::File,
            SourceArg::Command => SourceKind::Command,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List all registered VMs
    List {
        /// Print JSON instead of tab-separated lines
        #[arg(long)]
        json: bool,
    },

    /// Print VMs matching any of the terms
    Search {
        #[arg(required = true)]
        terms: Vec<String>,

        /// Print JSON result metas
        #[arg(long)]
        json: bool,
    },

    /// Start a VM by result id
    Start { id: String },

    /// Choose a matching VM interactively and start it
    Pick { terms: Vec<String> },

    /// Keep the registry live and answer one query per stdin line
    Watch,
}
