use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Default volume name
pub const DEFAULT_DISK: &str = "tinyFSDisk";

#[derive(Parser)]
#[command(version, about = "Format, inspect and modify TinyFS volumes")]
pub struct Cli {
    /// Directory holding the volume images
    #[arg(long, short = 'C', default_value = ".")]
    pub image_dir: PathBuf,

    /// Volume name
    #[arg(long, short, default_value = DEFAULT_DISK)]
    pub disk: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Make an empty file system
    Mkfs {
        /// Volume size in bytes [default: 10 KiB]
        #[arg(long, short)]
        size: Option<usize>,
    },
    /// List files
    Ls,
    /// Copy a host file into the volume
    Put {
        source: PathBuf,
        /// Name inside the volume, the host file name by default
        name: Option<String>,
    },
    /// Print a file
    Cat { name: String },
    /// Delete a file
    Rm { name: String },
    /// Rename a file
    Mv { from: String, to: String },
    /// Show the data block map
    Frag,
    /// Move free blocks to the end of the volume
    Defrag,
    /// Format the volume and walk through every operation
    Demo,
}
