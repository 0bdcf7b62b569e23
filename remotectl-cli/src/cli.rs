//! CLI argument parsing types using `clap`.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use remotectl_core::{TracingConfig, TracingLevel, TracingOutput};

use crate::util::parse_key_val;

/// `remotectl` command-line interface for controlling remote machines over SSH
#[derive(Parser)]
#[command(name = "remotectl")]
#[command(author, version, about = "Control and monitor remote machines over SSH")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to the configuration directory
    #[arg(short, long, global = true, env = "REMOTECTL_CONFIG_DIR")]
    pub config: Option<PathBuf>,

    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "REMOTECTL_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Log filter directive, e.g. `remotectl_core=trace`; overrides -v/-q
    #[arg(long, global = true, env = "REMOTECTL_LOG")]
    pub log_filter: Option<String>,

    /// Include thread ids in log lines
    #[arg(long, global = true)]
    pub log_thread_ids: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Builds the logging setup from the global flags
    #[must_use]
    pub fn tracing_config(&self) -> TracingConfig {
        let mut config = TracingConfig::new()
            .with_level(TracingLevel::from_verbosity(self.verbose, self.quiet))
            .with_thread_ids(self.log_thread_ids);
        if let Some(path) = &self.log_file {
            config = config.with_output(TracingOutput::File(path.clone()));
        }
        if let Some(filter) = &self.log_filter {
            config = config.with_filter(filter.as_str());
        }
        config
    }
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List configured remotes
    #[command(about = "List all remotes in the configuration")]
    List {
        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Run one health check and print the state and sensors
    #[command(about = "Check a remote and print its sensors")]
    Status {
        /// Remote name or host
        name: String,

        /// Output format
        #[arg(short, long, default_value = "table", value_enum)]
        format: OutputFormat,
    },

    /// Run an action command on a remote
    #[command(about = "Run an action on a remote")]
    Run {
        /// Remote name or host
        name: String,

        /// Action key, e.g. `restart`
        action: String,

        /// Template fields as KEY=value
        #[arg(short = 'D', long = "define", value_parser = parse_key_val)]
        fields: Vec<(String, String)>,
    },

    /// Wake a remote with a magic packet
    #[command(about = "Wake a remote using Wake-on-LAN")]
    TurnOn {
        /// Remote name or host
        name: String,
    },

    /// Shut a remote down
    #[command(about = "Shut a remote down, if allowed by its configuration")]
    TurnOff {
        /// Remote name or host
        name: String,
    },

    /// Keep checking a remote and print sensor changes
    #[command(about = "Watch a remote's state and sensors")]
    Watch {
        /// Remote name or host
        name: String,

        /// Seconds between health checks
        #[arg(short, long, default_value = "30")]
        interval: u64,

        /// Stop after this many checks
        #[arg(short = 'n', long)]
        count: Option<u64>,
    },
}

/// Output format options
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Display as formatted table
    #[default]
    Table,
    /// Output as JSON
    Json,
}
