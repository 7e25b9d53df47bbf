use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueHint, builder::BoolishValueParser};

use crate::application::routing::UrlMode;

/// Command-line arguments for the folio binary.
#[derive(Debug, Parser)]
#[command(name = "folio", version, about = "Published content server")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "FOLIO_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the HTTP surface and the facade worker.
    Serve(Box<ServeArgs>),
    /// Resolve a request path against a freshly built snapshot.
    Resolve(ResolveArgs),
    /// Print the outbound URL of a content item.
    Url(UrlArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ContentOverride {
    /// Override the content source file.
    #[arg(long = "content-path", value_name = "PATH", value_hint = ValueHint::FilePath)]
    pub content_path: Option<PathBuf>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    #[command(flatten)]
    pub content: ContentOverride,

    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the listener port.
    #[arg(long = "server-port", value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the periodic full refresh interval (0 disables it).
    #[arg(long = "facade-refresh-interval-ms", value_name = "MS")]
    pub facade_refresh_interval_ms: Option<u64>,

    /// Override the largest change count patched incrementally.
    #[arg(long = "facade-incremental-max-changes", value_name = "COUNT")]
    pub facade_incremental_max_changes: Option<usize>,
}

#[derive(Debug, Args, Clone)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub content: ContentOverride,

    /// Request host.
    #[arg(long, default_value = "localhost", value_name = "HOST")]
    pub host: String,

    /// Request path, optionally with a query string.
    #[arg(value_name = "PATH")]
    pub path: String,
}

#[derive(Debug, Args, Clone)]
pub struct UrlArgs {
    #[command(flatten)]
    pub content: ContentOverride,

    /// Host of the page the URL is rendered on.
    #[arg(long, default_value = "localhost", value_name = "HOST")]
    pub host: String,

    /// URL mode (relative|absolute|auto); defaults to the configured mode.
    #[arg(long, value_name = "MODE")]
    pub mode: Option<UrlMode>,

    /// Content id.
    #[arg(value_name = "ID")]
    pub id: i32,
}
