use crate::{
    consts::{BUCKET_ENV_VAR, PACKAGE_DIR_ENV_VAR, PROFILE_ENV_VAR, REGION_ENV_VAR},
    types::TracingMode,
    utils::parse_key_val,
};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The AWS profile to load credentials from
    #[clap(long, global = true, env = PROFILE_ENV_VAR)]
    pub profile: Option<String>,
    /// The AWS region to deploy to
    #[clap(long, global = true, env = REGION_ENV_VAR)]
    pub region: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Packages, uploads and deploys functions
    #[clap(visible_alias = "d")]
    Deploy {
        #[command(subcommand)]
        command: DeployCommands,
    },
    /// Function configuration commands
    #[clap(visible_alias = "c")]
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum DeployCommands {
    /// Creates a new function
    #[clap(visible_alias = "cr")]
    Create {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Updates the code and configuration of an existing function
    #[clap(visible_alias = "up")]
    Update {
        #[command(flatten)]
        source: SourceArgs,
        #[command(flatten)]
        details: DetailsArgs,
        /// Only update the code, keep the deployed configuration
        #[clap(long)]
        code_only: bool,
    },
    /// Replaces the configuration of an existing function without touching its code
    #[clap(visible_alias = "cf")]
    Configuration {
        #[command(flatten)]
        details: DetailsArgs,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Prints the function configuration to stdout
    #[clap(visible_alias = "p")]
    Print {
        #[command(flatten)]
        details: DetailsArgs,
    },
    /// Writes the function configuration to a file
    #[clap(visible_alias = "w")]
    Write {
        #[command(flatten)]
        details: DetailsArgs,
        /// The path to the file to write the configuration to
        #[clap(short = 'o', long)]
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// The root directory of the module to package
    #[clap(short, long)]
    pub module_root: PathBuf,
    /// The name of the module. Defaults to the function name
    #[clap(long)]
    pub module_name: Option<String>,
    /// The handler source file, relative to the module root or absolute
    #[clap(short, long)]
    pub source_file: PathBuf,
    /// The bucket the archive is uploaded to
    #[clap(short, long, env = BUCKET_ENV_VAR)]
    pub bucket: String,
    /// The directory archives are written to
    #[clap(long, env = PACKAGE_DIR_ENV_VAR)]
    pub package_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct DetailsArgs {
    /// The path to a YAML or JSON file containing the function details
    /// Flags given alongside override the values in the file
    #[clap(short = 'f', long)]
    pub details_file: Option<PathBuf>,
    /// The name of the function
    #[clap(short, long)]
    pub name: Option<String>,
    /// The description of the function
    #[clap(long)]
    pub description: Option<String>,
    /// The handler identifier
    #[clap(long)]
    pub handler: Option<String>,
    /// The runtime identifier
    #[clap(short, long)]
    pub runtime: Option<String>,
    /// The ARN of the IAM role the function assumes
    #[clap(long)]
    pub role: Option<String>,
    /// The timeout in seconds
    #[clap(long)]
    pub timeout: Option<u32>,
    /// The memory size in MB
    #[clap(long)]
    pub memory_size: Option<u32>,
    /// An environment variable as KEY=VALUE. May be repeated
    #[clap(short, long = "env", value_parser = parse_key_val)]
    pub env_vars: Vec<(String, String)>,
    /// The tracing mode of the function
    #[clap(long, value_enum)]
    pub tracing_mode: Option<TracingMode>,
}
