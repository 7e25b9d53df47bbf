//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::{BTreeMap, HashSet},
    net::SocketAddr,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::Parser;
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;

use crate::application::binding::DeclaredModel;
use crate::application::routing::{
    DEFAULT_FINDERS, DEFAULT_URL_PROVIDERS, DomainBinding, FinderKind, RedirectRule,
    UrlMode, UrlProviderKind,
};
use crate::domain::content::ContentId;

mod cli;

pub use cli::{
    CliArgs, Command, ContentOverride, ResolveArgs, ServeArgs, ServeOverrides, UrlArgs,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "folio";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_CONTENT_PATH: &str = "content/site.toml";
const DEFAULT_INCREMENTAL_MAX_CHANGES: usize = 16;
const DEFAULT_REFRESH_INTERVAL_MS: u64 = 0;
const DEFAULT_RETAINED_VERSIONS: usize = 8;
const DEFAULT_DEDUPE_WINDOW: usize = 256;

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub content: ContentSettings,
    pub facade: FacadeSettings,
    pub routing: RoutingSettings,
    /// Template alias → model type the view declares.
    pub views: BTreeMap<String, DeclaredModel>,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct ContentSettings {
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct FacadeSettings {
    pub incremental_max_changes: usize,
    pub refresh_interval_ms: u64,
    pub retained_versions: usize,
    pub dedupe_window: usize,
}

#[derive(Debug, Clone)]
pub struct RoutingSettings {
    pub finders: Vec<FinderKind>,
    pub url_providers: Vec<UrlProviderKind>,
    pub url_mode: UrlMode,
    pub add_trailing_slash: bool,
    pub not_found_content_id: Option<ContentId>,
    pub disable_alternative_templates: bool,
    pub domains: Vec<DomainBinding>,
    pub redirects: Vec<RedirectRule>,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(Environment::with_prefix("FOLIO").separator("__"));

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Resolve(args)) => raw.apply_content_override(&args.content),
        Some(Command::Url(args)) => raw.apply_content_override(&args.content),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    content: RawContentSettings,
    facade: RawFacadeSettings,
    routing: RawRoutingSettings,
    views: BTreeMap<String, String>,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.server_port {
            self.server.port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(interval) = overrides.facade_refresh_interval_ms {
            self.facade.refresh_interval_ms = Some(interval);
        }
        if let Some(max) = overrides.facade_incremental_max_changes {
            self.facade.incremental_max_changes = Some(max);
        }

        self.apply_content_override(&overrides.content);
    }

    fn apply_content_override(&mut self, overrides: &ContentOverride) {
        if let Some(path) = overrides.content_path.as_ref() {
            self.content.path = Some(path.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            content,
            facade,
            routing,
            views,
        } = raw;

        Ok(Self {
            server: build_server_settings(server)?,
            logging: build_logging_settings(logging)?,
            content: build_content_settings(content)?,
            facade: build_facade_settings(facade)?,
            routing: build_routing_settings(routing)?,
            views: build_views(views)?,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let port = server.port.unwrap_or(DEFAULT_PORT);
    if port == 0 {
        return Err(LoadError::invalid(
            "server.port",
            "port must be greater than zero",
        ));
    }

    let addr = parse_socket_addr(&host, port)
        .map_err(|reason| LoadError::invalid("server.addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_content_settings(content: RawContentSettings) -> Result<ContentSettings, LoadError> {
    let path = content
        .path
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONTENT_PATH));
    if path.as_os_str().is_empty() {
        return Err(LoadError::invalid("content.path", "path must not be empty"));
    }
    Ok(ContentSettings { path })
}

fn build_facade_settings(facade: RawFacadeSettings) -> Result<FacadeSettings, LoadError> {
    let retained_versions = facade
        .retained_versions
        .unwrap_or(DEFAULT_RETAINED_VERSIONS);
    if retained_versions == 0 {
        return Err(LoadError::invalid(
            "facade.retained_versions",
            "must be greater than zero",
        ));
    }

    let dedupe_window = facade.dedupe_window.unwrap_or(DEFAULT_DEDUPE_WINDOW);
    if dedupe_window == 0 {
        return Err(LoadError::invalid(
            "facade.dedupe_window",
            "must be greater than zero",
        ));
    }

    Ok(FacadeSettings {
        incremental_max_changes: facade
            .incremental_max_changes
            .unwrap_or(DEFAULT_INCREMENTAL_MAX_CHANGES),
        refresh_interval_ms: facade
            .refresh_interval_ms
            .unwrap_or(DEFAULT_REFRESH_INTERVAL_MS),
        retained_versions,
        dedupe_window,
    })
}

fn build_routing_settings(routing: RawRoutingSettings) -> Result<RoutingSettings, LoadError> {
    let finders = routing
        .finders
        .unwrap_or_else(|| DEFAULT_FINDERS.to_vec());
    ensure_unique(&finders, "routing.finders")?;

    let url_providers = routing
        .url_providers
        .unwrap_or_else(|| DEFAULT_URL_PROVIDERS.to_vec());
    ensure_unique(&url_providers, "routing.url_providers")?;

    let url_mode = match routing.url_mode {
        Some(mode) => UrlMode::from_str(&mode)
            .map_err(|err| LoadError::invalid("routing.url_mode", err.to_string()))?,
        None => UrlMode::Auto,
    };

    for binding in &routing.domains {
        if binding.host.trim().is_empty() {
            return Err(LoadError::invalid(
                "routing.domains",
                "host must not be empty (use `*` to match any host)",
            ));
        }
        if !binding.path_prefix.is_empty() && !binding.path_prefix.starts_with('/') {
            return Err(LoadError::invalid(
                "routing.domains",
                format!("path prefix `{}` must start with `/`", binding.path_prefix),
            ));
        }
    }

    for rule in &routing.redirects {
        if !rule.from.starts_with('/') {
            return Err(LoadError::invalid(
                "routing.redirects",
                format!("redirect source `{}` must start with `/`", rule.from),
            ));
        }
        if rule.to.trim().is_empty() {
            return Err(LoadError::invalid(
                "routing.redirects",
                format!("redirect from `{}` has an empty location", rule.from),
            ));
        }
    }

    Ok(RoutingSettings {
        finders,
        url_providers,
        url_mode,
        add_trailing_slash: routing.add_trailing_slash.unwrap_or(false),
        not_found_content_id: routing.not_found_content_id.map(ContentId),
        disable_alternative_templates: routing.disable_alternative_templates.unwrap_or(false),
        domains: routing.domains,
        redirects: routing.redirects,
    })
}

fn build_views(
    views: BTreeMap<String, String>,
) -> Result<BTreeMap<String, DeclaredModel>, LoadError> {
    views
        .into_iter()
        .map(|(template, declared)| {
            let template = template.trim().to_lowercase();
            if template.is_empty() {
                return Err(LoadError::invalid("views", "template alias must not be empty"));
            }
            let declared = DeclaredModel::from_str(&declared).map_err(|err| {
                LoadError::invalid("views", format!("template `{template}`: {err}"))
            })?;
            Ok((template, declared))
        })
        .collect()
}

fn ensure_unique<T>(items: &[T], key: &'static str) -> Result<(), LoadError>
where
    T: Copy + Eq + std::hash::Hash + std::fmt::Debug,
{
    let mut seen = HashSet::new();
    for item in items {
        if !seen.insert(*item) {
            return Err(LoadError::invalid(key, format!("{item:?} listed twice")));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawContentSettings {
    path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawFacadeSettings {
    incremental_max_changes: Option<usize>,
    refresh_interval_ms: Option<u64>,
    retained_versions: Option<usize>,
    dedupe_window: Option<usize>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawRoutingSettings {
    finders: Option<Vec<FinderKind>>,
    url_providers: Option<Vec<UrlProviderKind>>,
    url_mode: Option<String>,
    add_trailing_slash: Option<bool>,
    not_found_content_id: Option<i32>,
    disable_alternative_templates: Option<bool>,
    domains: Vec<DomainBinding>,
    redirects: Vec<RedirectRule>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

#[cfg(test)]
mod tests;
