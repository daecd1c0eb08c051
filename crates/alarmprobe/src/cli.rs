//! Clap derive structures for the `alarmprobe` CLI.
//!
//! Defines the command tree, global flags, and shared types. Also compiled
//! by `build.rs` for man page generation, so it depends on clap only.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// alarmprobe -- end-to-end check of a device platform's alarm pipeline
#[derive(Debug, Parser)]
#[command(
    name = "alarmprobe",
    version,
    about = "Verify that activating a device produces a well-formed alarm event",
    long_about = "Provisions a simulated device through the REST gateway, activates it,\n\
        waits for the resulting alarm on the message broker, and validates the\n\
        alarm's schema and identifier.\n\n\
        Endpoints are discovered through the service registry unless given\n\
        explicitly with --rest-url / --broker.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Configuration profile to use
    #[arg(long, short = 'p', env = "ALARMPROBE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Path to the config file (overrides the platform default)
    #[arg(long, env = "ALARMPROBE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Service registry address, host:port
    #[arg(long, short = 'r', env = "ALARMPROBE_REGISTRY", global = true)]
    pub registry: Option<String>,

    /// REST gateway base URL (skips registry lookup)
    #[arg(long, env = "ALARMPROBE_REST_URL", global = true)]
    pub rest_url: Option<String>,

    /// Message broker address, host:port (skips registry lookup)
    #[arg(long, short = 'b', env = "ALARMPROBE_BROKER", global = true)]
    pub broker: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "ALARMPROBE_OUTPUT", global = true)]
    pub output: Option<OutputFormat>,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "ALARMPROBE_INSECURE", global = true)]
    pub insecure: bool,

    /// HTTP request timeout in seconds
    #[arg(long, env = "ALARMPROBE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report (default)
    Text,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MalformedArg {
    /// Log and keep scanning
    Skip,
    /// Fail the observation
    Abort,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the full device-to-alarm scenario
    Run(RunArgs),

    /// Check that the alarm topic exists on the broker
    Topic(TopicArgs),

    /// Resolve a service through the registry and print host:port
    Resolve(ResolveArgs),

    /// Validate a saved alarm message (schema and identifier)
    Validate(ValidateArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Run ──────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Type of device to create
    #[arg(long)]
    pub device_type: Option<String>,

    /// Expected producer segment of the alarm id (defaults to device type)
    #[arg(long)]
    pub producer: Option<String>,

    /// Alarm topic to observe
    #[arg(long, short = 't')]
    pub topic: Option<String>,

    /// Seconds to wait for the alarm
    #[arg(long)]
    pub alarm_timeout: Option<u64>,

    /// Stop after reading this many messages
    #[arg(long)]
    pub max_messages: Option<usize>,

    /// Start this many records before the end of each partition
    #[arg(long)]
    pub lookback: Option<u32>,

    /// Partitions to read (repeatable)
    #[arg(long = "partition", value_name = "N")]
    pub partitions: Vec<i32>,

    /// What to do with messages that are not valid JSON
    #[arg(long, value_enum)]
    pub on_malformed: Option<MalformedArg>,

    /// Require `id` and `resource_id` in the alarm
    #[arg(long)]
    pub strict_schema: bool,

    /// Disable and delete the device afterwards
    #[arg(long)]
    pub cleanup: bool,
}

// ── Topic ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct TopicArgs {
    /// Topic to look for (defaults to the profile's alarm topic)
    pub topic: Option<String>,

    /// List every topic instead of checking one
    #[arg(long, short = 'l')]
    pub list: bool,
}

// ── Resolve ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ResolveArgs {
    /// Registry service name (e.g. kafka, chameleon-rest)
    pub service: String,
}

// ── Validate ─────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ValidateArgs {
    /// JSON file holding one alarm; `-` reads stdin
    pub file: PathBuf,

    /// Expected producer segment of the alarm id
    #[arg(long)]
    pub producer: Option<String>,

    /// Expected device id (defaults to the alarm's resource_id)
    #[arg(long)]
    pub device_id: Option<String>,

    /// Require `id` and `resource_id`
    #[arg(long)]
    pub strict_schema: bool,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the current resolved configuration
    Show,

    /// Print the config file path
    Path,

    /// Set a value on the active profile
    Set {
        /// Profile key (e.g. rest_url, broker, topic, cleanup)
        key: String,

        /// Value to set
        value: String,
    },

    /// List configured profiles
    Profiles,

    /// Set the default profile
    Use {
        /// Profile name to set as default
        name: String,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
