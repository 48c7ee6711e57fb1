//! Command line argument parsing
//!
//! Subcommands:
//! - `serve`: Run the web panel (the default when no subcommand is given)
//! - `show-config`: Show configuration discovery information

use super::config::PanelConfig;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, PartialEq, Eq)]
pub enum ExecutionMode {
    Serve(ServeConfig),
    ShowConfig,
}

#[derive(Debug, PartialEq, Eq)]
pub struct ServeConfig {
    /// Start `autostart` databases before serving
    pub autostart: bool,
}

#[derive(Debug, Parser)]
#[command(name = "dockpanel")]
#[command(author = "Dockpanel Team")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "A web control panel for launching, rebuilding and inspecting platform containers"
)]
#[command(long_about = None)]
pub struct Args {
    /// Configuration file path
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,
    /// Address to listen on
    #[arg(short = 'l', long = "listen", env = "DOCKPANEL_LISTEN", global = true)]
    pub listen: Option<SocketAddr>,
    /// Root of configuration records, shared volumes and compose groups
    #[arg(short = 'd', long = "data-root", global = true)]
    pub data_root: Option<PathBuf>,
    /// Enable verbose output
    #[arg(short = 'v', long = "verbose", global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the web panel
    Serve {
        /// Skip starting `autostart` databases
        #[arg(long = "no-autostart")]
        no_autostart: bool,
    },
    /// Show configuration discovery information
    ShowConfig,
}

impl Args {
    pub fn parse() -> Self {
        Parser::parse()
    }

    pub fn mode(&self) -> ExecutionMode {
        match &self.command {
            Some(Commands::Serve { no_autostart }) => ExecutionMode::Serve(ServeConfig {
                autostart: !no_autostart,
            }),
            Some(Commands::ShowConfig) => ExecutionMode::ShowConfig,
            None => ExecutionMode::Serve(ServeConfig { autostart: true }),
        }
    }

    /// Apply command line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut PanelConfig) {
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(data_root) = &self.data_root {
            config.data_root = data_root.clone();
        }
    }
}
