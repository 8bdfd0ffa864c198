use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "dscbridge")]
#[command(version)]
#[command(about = "Reconcile resources through PowerShell DSC", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level (-v info, -vv debug with generated scripts, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Config file (default: ~/.config/dscbridge/config.toml)
    #[arg(long, global = true, env = "DSCBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// PowerShell executable, overriding the config file
    #[arg(long, global = true, env = "DSCBRIDGE_PWSH")]
    pub pwsh: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Read the current state of one or more resources
    Get(GetArgs),

    /// Apply desired state
    Set(SetArgs),

    /// Apply desired state to a resource that does not exist yet
    Create(SetArgs),

    /// Converge an existing resource to desired state
    Update(SetArgs),

    /// Remove a resource
    Delete(DeleteArgs),

    /// Print the generated script without running it
    Render(RenderArgs),

    /// Inspect resource type definitions
    #[command(subcommand)]
    Types(TypesCommand),

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[derive(Debug, Args)]
pub struct GetArgs {
    /// Resource type definition (.toml or .json)
    pub type_file: PathBuf,

    /// Resource name; repeat to read several resources
    #[arg(short, long = "name", required = true)]
    pub names: Vec<String>,

    /// Identity attribute applied to every filter (key=value, value may be JSON)
    #[arg(short, long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,
}

#[derive(Debug, Args)]
pub struct SetArgs {
    /// Resource type definition (.toml or .json)
    pub type_file: PathBuf,

    /// Resource name
    #[arg(short, long)]
    pub name: String,

    /// Desired attribute (key=value, value may be JSON)
    #[arg(short, long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Resource type definition (.toml or .json)
    pub type_file: PathBuf,

    /// Resource name
    #[arg(short, long)]
    pub name: String,

    /// Extra identity attribute (key=value, value may be JSON)
    #[arg(short, long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,
}

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Resource type definition (.toml or .json)
    pub type_file: PathBuf,

    /// Script variant to render
    #[arg(short, long, value_enum, default_value_t = MethodArg::Get)]
    pub method: MethodArg,

    /// Resource name
    #[arg(short, long)]
    pub name: String,

    /// Desired attribute (key=value, value may be JSON)
    #[arg(short, long = "attr", value_name = "KEY=VALUE")]
    pub attrs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MethodArg {
    Get,
    Set,
}

impl From<MethodArg> for dsckit::InvokeMethod {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Get => Self::Get,
            MethodArg::Set => Self::Set,
        }
    }
}

#[derive(Subcommand)]
pub enum TypesCommand {
    /// Show a parsed resource type definition
    Show {
        /// Resource type definition (.toml or .json)
        type_file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}
