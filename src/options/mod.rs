pub mod verbose;
pub mod version;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "spark", author, version, about, long_about = None)]
#[command(disable_version_flag = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[arg(short = 'V', long, action = ArgAction::SetTrue)]
    pub version: bool,

    #[arg(short, long, global = true, action = ArgAction::SetTrue)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Manage Node.js versions
    Node {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// Manage Go versions
    Go {
        #[command(subcommand)]
        command: ModuleCommands,
    },

    /// Install module environments into the shell startup file
    Setup(ModuleSelection),

    /// Remove module environments and their symlinks
    Teardown(ModuleSelection),

    /// Show or change settings
    Config {
        key: Option<String>,
        value: Option<String>,
    },

    Version,
}

#[derive(Args, Debug)]
pub struct ModuleSelection {
    pub modules: Vec<String>,

    #[arg(short, long)]
    pub all: bool,
}

#[derive(Args, Debug, Clone, Copy, Default)]
pub struct InstallFlags {
    /// Pick the earliest matching version instead of the latest
    #[arg(short, long)]
    pub earliest: bool,

    /// Skip the catalog and install the exact version given
    #[arg(short, long)]
    pub force: bool,

    /// Only consider LTS releases
    #[arg(long)]
    pub lts: bool,

    /// Only consider security releases
    #[arg(long)]
    pub security: bool,

    /// Allow prereleases
    #[arg(long)]
    pub prerelease: bool,
}

#[derive(Subcommand, Debug)]
pub enum ModuleCommands {
    Install {
        version: Option<String>,

        #[command(flatten)]
        flags: InstallFlags,
    },

    #[command(name = "use")]
    Use {
        version: Option<String>,
    },

    #[command(visible_alias = "ls")]
    List {
        constraint: Option<String>,

        /// List versions available on the mirror
        #[arg(short, long)]
        all: bool,
    },

    #[command(visible_alias = "remove")]
    Uninstall {
        #[arg(required = true)]
        versions: Vec<String>,
    },

    Alias {
        name: Option<String>,
        version: Option<String>,
    },

    Unalias {
        name: String,
    },

    Current,

    /// Run a command with the workspace version
    Exec {
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },

    /// Run a command with the given version
    Execv {
        version: String,

        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}
