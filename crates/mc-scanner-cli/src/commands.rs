use clap::{Parser, Subcommand};
use mc_scanner_core::{Bounds, Decompressor};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "mc-scanner")]
#[command(about = "Search Minecraft world saves for blocks and items", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Block state to search for, e.g. `chest[facing=north]`
    #[arg(short = 'b', long = "block", value_name = "BLOCK")]
    pub blocks: Vec<String>,

    /// Item type to search for, e.g. `minecraft:diamond`
    #[arg(short = 'i', long = "item", value_name = "ITEM")]
    pub items: Vec<String>,

    /// World folder or single region file; may be repeated
    #[arg(short = 'p', long = "path", value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// Output directory, `.zip` archive or `.json` file
    #[arg(short = 'o', long = "out", value_name = "OUT")]
    pub out: Option<PathBuf>,

    /// Tally every item per container instead of searching
    #[arg(long)]
    pub stats: bool,

    /// Worker threads (0 = one per core, 1 = sequential)
    #[arg(short = 't', long)]
    pub threads: Option<usize>,

    /// internal or platform
    #[arg(long, value_name = "NAME")]
    pub decompressor: Option<Decompressor>,

    /// Only search the block box `dimension,x1,y1,z1,x2,y2,z2`
    #[arg(long, value_name = "BOX")]
    pub within: Option<Bounds>,

    /// Repeat the scan N more times, or forever without a count
    #[arg(long = "loop", value_name = "N", num_args = 0..=1)]
    pub repeat: Option<Option<u64>>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Print configuration values
    PrintConfig,
}
