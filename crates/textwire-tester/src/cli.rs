//! Command-line interface definitions for textwire-tester.

use clap::{Args, Parser, Subcommand};
use logging::LogArgs;

/// Command-line interface for the `textwire-tester` binary.
#[derive(Parser, Debug)]
#[command(
    name = "textwire-tester",
    about = "Controller-side diagnostics for a textwire service",
    version
)]
pub struct Cli {
    /// Logging controls shared across textwire binaries.
    #[command(flatten)]
    pub log: LogArgs,

    /// Host the service listens on.
    #[arg(long, default_value = "127.0.0.1", value_name = "HOST")]
    pub host: String,

    /// Port the service listens on.
    #[arg(long, default_value_t = 6000, value_name = "PORT")]
    pub port: u16,

    /// Pre-shared token sent via AUTH before the command.
    #[arg(long, value_name = "TOKEN")]
    pub auth: Option<String>,

    /// Reply timeout in milliseconds.
    #[arg(long, default_value_t = 2000, value_name = "MS")]
    pub timeout_ms: u64,

    /// What to ask the service.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level tester commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Fetch the current frame and print it.
    Frame(FrameArgs),
    /// Compile and run a TYPE command line on the host keyboard.
    Type(TypeArgs),
    /// Print the dispatcher's counters and held keys.
    Stats,
    /// Send one raw request line and print the reply verbatim.
    Send(SendArgs),
    /// Poll frames continuously and print changes.
    Watch(WatchArgs),
}

/// Arguments for the `frame` subcommand.
#[derive(Args, Debug, Clone)]
pub struct FrameArgs {
    /// Strip ANSI sequences and print the plain payload.
    #[arg(long)]
    pub plain: bool,

    /// Print the metadata header lines too.
    #[arg(long)]
    pub meta: bool,
}

/// Arguments for the `type` subcommand.
#[derive(Args, Debug, Clone)]
pub struct TypeArgs {
    /// TYPE tokens, passed through verbatim (quote strings in your shell).
    #[arg(value_name = "TOKEN", num_args = 1.., trailing_var_arg = true)]
    pub tokens: Vec<String>,
}

/// Arguments for the `send` subcommand.
#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// The raw request line.
    #[arg(value_name = "LINE")]
    pub line: String,
}

/// Arguments for the `watch` subcommand.
#[derive(Args, Debug, Clone)]
pub struct WatchArgs {
    /// Poll interval in milliseconds.
    #[arg(long, default_value_t = 250, value_name = "MS")]
    pub interval_ms: u64,

    /// Stop after this many frames (0 means run until interrupted).
    #[arg(long, default_value_t = 0, value_name = "COUNT")]
    pub count: u32,
}
