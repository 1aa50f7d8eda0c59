use std::path::PathBuf;

use clap::{Parser, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "macguard")]
#[command(about = "Manage blocked household devices and sync them into an OPNsense firewall")]
pub struct Cli {
    /// Settings TOML file. Defaults to macguard.toml if present.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// List registered devices.
    List(FormatArgs),
    /// Show one device by id.
    Show(ShowArgs),
    /// Register a new device.
    Add(AddArgs),
    /// Change a device's name, MAC, or enabled state.
    Update(UpdateArgs),
    /// Remove a device.
    Delete(DeleteArgs),
    /// Bulk-import devices from a text file (tab- or comma-separated lines).
    Import(ImportArgs),
    /// Show the firewall alias payload for the enabled device set.
    Export(FormatArgs),
    /// Show device counts.
    Stats(FormatArgs),
    /// Push the enabled device set into the firewall MAC alias.
    Sync,
    /// Sync the alias and create the block rule (disabled) in one go.
    Setup,
    /// Create or rewrite the block rule on the firewall.
    Rule(RuleArgs),
    /// Turn enforcement on or off by flipping the rule's disabled flag.
    Enforce(EnforceArgs),
    /// Report alias/rule/enforcement state as seen on the firewall.
    Status(FormatArgs),
}

#[derive(Parser, Debug)]
pub struct FormatArgs {
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct ShowArgs {
    pub id: u32,
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Parser, Debug)]
pub struct AddArgs {
    /// Human label, unique case-insensitively.
    pub name: String,
    /// MAC address in any common format.
    pub mac: String,
}

#[derive(Parser, Debug)]
pub struct UpdateArgs {
    pub id: u32,
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long)]
    pub mac: Option<String>,
    /// Disabling removes the device from the store; its id is not kept.
    #[arg(long)]
    pub enabled: Option<bool>,
}

#[derive(Parser, Debug)]
pub struct DeleteArgs {
    pub id: u32,
}

#[derive(Parser, Debug)]
pub struct ImportArgs {
    /// Text file with one device per line.
    pub file: PathBuf,
}

#[derive(Parser, Debug)]
pub struct RuleArgs {
    /// Create the rule already enforcing; default is disabled until
    /// `enforce on`.
    #[arg(long)]
    pub enable: bool,
}

#[derive(Parser, Debug)]
pub struct EnforceArgs {
    #[arg(value_enum)]
    pub state: Toggle,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Toggle {
    On,
    Off,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}
