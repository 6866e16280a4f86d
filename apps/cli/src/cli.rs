//! Command-line arguments.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// slicebox - chunked, resumable file transfers.
#[derive(Debug, Parser)]
#[command(
    name = "slicebox",
    version,
    about = "Upload, download and list files on a slicebox store"
)]
pub struct Cli {
    /// Store address (overrides the config file; default 127.0.0.1)
    #[arg(long = "server-ip", global = true, value_name = "IP")]
    pub server_ip: Option<String>,

    /// Store port (overrides the config file; default 800)
    #[arg(long = "server-port", global = true, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Config file (default: $SLICEBOX_CONFIG or ~/.config/slicebox/config.toml)
    #[arg(short = 'c', long = "config", global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload one or more files
    Upload {
        /// Files to upload
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Download one or more files
    Download {
        /// Directory to save into (must exist)
        #[arg(short = 'd', long = "dir", default_value = ".", value_name = "DIR")]
        dir: PathBuf,

        /// Names of the files on the store
        #[arg(required = true, value_name = "NAME")]
        names: Vec<String>,
    },

    /// List the files on the store
    List,
}
