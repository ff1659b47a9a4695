//! eztf cli interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Change the work directory
    ///
    /// Can be specified multiple times. Note that all
    /// paths on the way to the final path must exist.
    ///
    /// This is equivalent to running { cd <directory>; eztf ... }
    #[clap(short = 'C', long = "directory", global(true))]
    pub directory: Vec<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate the terraform repository for a config
    #[command(alias = "gen")]
    Generate(GenerateCommand),

    /// List the sub-stacks that produce terraform code
    Stacks(StacksCommand),

    /// Print debug information for development
    Dev(DevCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Config file (.yaml, .yml or .json)
    #[clap(short = 'c', long = "config", env = "EZTF_INPUT_CONFIG")]
    pub config: PathBuf,
}

#[derive(Parser, Debug)]
pub struct GenerateCommand {
    #[clap(flatten)]
    pub config: ConfigArgs,

    /// Directory the repository is written to
    #[clap(
        short = 'o',
        long = "output",
        env = "EZTF_OUTPUT_DIR",
        default_value = "eztf-output"
    )]
    pub output: PathBuf,

    /// Only generate the given sub-stack
    ///
    /// Can be specified multiple times.
    #[clap(short = 's', long = "stack")]
    pub stacks: Vec<String>,

    /// Also update the input config file with `tf_stacks` and `tf_vars`
    #[clap(long = "write-back")]
    pub write_back: bool,
}

#[derive(Parser, Debug)]
pub struct StacksCommand {
    #[clap(flatten)]
    pub config: ConfigArgs,
}

#[derive(Parser, Debug)]
pub struct DevCommand {
    #[clap(flatten)]
    pub config: ConfigArgs,

    /// Sub-stack to inspect
    #[clap(short = 's', long = "stack")]
    pub stack: String,

    #[command(subcommand)]
    pub command: DevSubCommand,
}

#[derive(Subcommand, Debug)]
pub enum DevSubCommand {
    /// Names registered while building the stack
    Registry,
    /// Rendered terraform per section
    Sections,
}
