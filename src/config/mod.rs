//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    collections::{BTreeSet, HashSet},
    net::SocketAddr,
    num::NonZeroUsize,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

use crate::purge::{
    DEFAULT_BODY_LIMIT_BYTES, DEFAULT_PREFIX, DEFAULT_SCHEME, DEFAULT_TIMEOUT_SECS,
    DEFAULT_WATCHED_TAXONOMY,
};

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "purger";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 3100;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_NONCE_TTL_SECS: u64 = 3600;
const SHA256_LEN: usize = 32;

/// Command-line arguments for the purger binary.
#[derive(Debug, Parser)]
#[command(name = "purger", version, about = "Cache purge dispatcher")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PURGER_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the webhook and operator HTTP service.
    Serve(Box<ServeArgs>),
    /// Print the SHA-256 digest of an operator key for `auth.operators`.
    #[command(name = "hash-key")]
    HashKey(HashKeyArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Clone)]
pub struct HashKeyArgs {
    /// Operator key to digest.
    #[arg(value_name = "KEY")]
    pub key: String,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
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

    /// Override the scheme used to reach the site (http|https).
    #[arg(long = "purge-scheme", value_name = "SCHEME")]
    pub purge_scheme: Option<String>,

    /// Send purge requests to this base URL instead of the site host.
    #[arg(long = "purge-endpoint", value_name = "URL")]
    pub purge_endpoint: Option<String>,

    /// Override the purge request timeout.
    #[arg(long = "purge-timeout-seconds", value_name = "SECONDS")]
    pub purge_timeout_seconds: Option<u64>,

    /// Toggle upstream TLS certificate verification.
    #[arg(
        long = "purge-verify-tls",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub purge_verify_tls: Option<bool>,

    /// Toggle per-attempt purge diagnostics.
    #[arg(
        long = "purge-debug",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub purge_debug: Option<bool>,

    /// Purge this site host instead of the one named by each request.
    #[arg(long = "purge-site-host", value_name = "HOST")]
    pub purge_site_host: Option<String>,

    /// Replace the watched taxonomy list (comma separated).
    #[arg(
        long = "purge-watched-taxonomies",
        value_name = "LIST",
        value_delimiter = ','
    )]
    pub purge_watched_taxonomies: Option<Vec<String>>,

    /// Override the lifetime of issued purge nonces.
    #[arg(long = "auth-nonce-ttl-seconds", value_name = "SECONDS")]
    pub auth_nonce_ttl_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub purge: PurgeSettings,
    pub auth: AuthSettings,
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
pub struct PurgeSettings {
    pub scheme: String,
    pub prefix: String,
    pub endpoint: Option<Url>,
    pub timeout: Duration,
    pub verify_tls: bool,
    pub debug: bool,
    pub body_limit_bytes: NonZeroUsize,
    pub watched_taxonomies: BTreeSet<String>,
    pub site_host: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthSettings {
    pub nonce_ttl: Duration,
    pub operators: Vec<OperatorSettings>,
}

#[derive(Debug, Clone)]
pub struct OperatorSettings {
    pub name: String,
    pub key_sha256: Vec<u8>,
    pub manage: bool,
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

    builder = builder.add_source(
        Environment::with_prefix("PURGER")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("purge.watched_taxonomies")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::HashKey(_)) => {}
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    purge: RawPurgeSettings,
    auth: RawAuthSettings,
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
        if let Some(scheme) = overrides.purge_scheme.as_ref() {
            self.purge.scheme = Some(scheme.clone());
        }
        if let Some(endpoint) = overrides.purge_endpoint.as_ref() {
            self.purge.endpoint = Some(endpoint.clone());
        }
        if let Some(seconds) = overrides.purge_timeout_seconds {
            self.purge.timeout_seconds = Some(seconds);
        }
        if let Some(verify) = overrides.purge_verify_tls {
            self.purge.verify_tls = Some(verify);
        }
        if let Some(debug) = overrides.purge_debug {
            self.purge.debug = Some(debug);
        }
        if let Some(host) = overrides.purge_site_host.as_ref() {
            self.purge.site_host = Some(host.clone());
        }
        if let Some(taxonomies) = overrides.purge_watched_taxonomies.as_ref() {
            self.purge.watched_taxonomies = Some(taxonomies.clone());
        }
        if let Some(seconds) = overrides.auth_nonce_ttl_seconds {
            self.auth.nonce_ttl_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            purge,
            auth,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let purge = build_purge_settings(purge)?;
        let auth = build_auth_settings(auth)?;

        Ok(Self {
            server,
            logging,
            purge,
            auth,
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

fn build_purge_settings(purge: RawPurgeSettings) -> Result<PurgeSettings, LoadError> {
    let scheme = purge
        .scheme
        .map(|value| value.trim().to_ascii_lowercase())
        .unwrap_or_else(|| DEFAULT_SCHEME.to_string());
    if scheme != "http" && scheme != "https" {
        return Err(LoadError::invalid(
            "purge.scheme",
            format!("`{scheme}` is not one of http, https"),
        ));
    }

    let prefix = purge.prefix.unwrap_or_else(|| DEFAULT_PREFIX.to_string());
    let prefix = prefix.trim().trim_end_matches('/').to_string();
    if !prefix.starts_with('/') {
        return Err(LoadError::invalid(
            "purge.prefix",
            "must be an absolute path other than `/`",
        ));
    }

    let endpoint = match purge.endpoint.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(parse_endpoint(raw)?),
    };

    let timeout_secs = purge.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS);
    if timeout_secs == 0 {
        return Err(LoadError::invalid(
            "purge.timeout_seconds",
            "must be greater than zero",
        ));
    }

    let body_limit = purge.body_limit_bytes.unwrap_or(DEFAULT_BODY_LIMIT_BYTES);
    let body_limit_bytes = NonZeroUsize::new(body_limit).ok_or_else(|| {
        LoadError::invalid("purge.body_limit_bytes", "must be greater than zero")
    })?;

    let watched_taxonomies = match purge.watched_taxonomies {
        Some(list) => list
            .into_iter()
            .map(|taxonomy| taxonomy.trim().to_string())
            .filter(|taxonomy| !taxonomy.is_empty())
            .collect(),
        None => BTreeSet::from([DEFAULT_WATCHED_TAXONOMY.to_string()]),
    };

    let site_host = purge.site_host.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    Ok(PurgeSettings {
        scheme,
        prefix,
        endpoint,
        timeout: Duration::from_secs(timeout_secs),
        verify_tls: purge.verify_tls.unwrap_or(true),
        debug: purge.debug.unwrap_or(false),
        body_limit_bytes,
        watched_taxonomies,
        site_host,
    })
}

fn parse_endpoint(raw: &str) -> Result<Url, LoadError> {
    let url = Url::parse(raw)
        .map_err(|err| LoadError::invalid("purge.endpoint", format!("`{raw}`: {err}")))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(LoadError::invalid(
            "purge.endpoint",
            format!("`{raw}` must be an http(s) url with a host"),
        ));
    }
    Ok(url)
}

fn build_auth_settings(auth: RawAuthSettings) -> Result<AuthSettings, LoadError> {
    let ttl_secs = auth.nonce_ttl_seconds.unwrap_or(DEFAULT_NONCE_TTL_SECS);
    if ttl_secs == 0 {
        return Err(LoadError::invalid(
            "auth.nonce_ttl_seconds",
            "must be greater than zero",
        ));
    }

    let mut seen = HashSet::new();
    let mut operators = Vec::with_capacity(auth.operators.len());
    for raw in auth.operators {
        let name = raw.name.map(|n| n.trim().to_string()).unwrap_or_default();
        if name.is_empty() {
            return Err(LoadError::invalid(
                "auth.operators.name",
                "operator name must not be empty",
            ));
        }
        if !seen.insert(name.clone()) {
            return Err(LoadError::invalid(
                "auth.operators.name",
                format!("duplicate operator `{name}`"),
            ));
        }

        let digest = raw.key_sha256.unwrap_or_default();
        let key_sha256 = hex::decode(digest.trim()).map_err(|err| {
            LoadError::invalid(
                "auth.operators.key_sha256",
                format!("operator `{name}`: {err}"),
            )
        })?;
        if key_sha256.len() != SHA256_LEN {
            return Err(LoadError::invalid(
                "auth.operators.key_sha256",
                format!("operator `{name}`: expected a 64 character hex digest"),
            ));
        }

        operators.push(OperatorSettings {
            name,
            key_sha256,
            manage: raw.manage.unwrap_or(false),
        });
    }

    Ok(AuthSettings {
        nonce_ttl: Duration::from_secs(ttl_secs),
        operators,
    })
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
struct RawPurgeSettings {
    scheme: Option<String>,
    prefix: Option<String>,
    endpoint: Option<String>,
    timeout_seconds: Option<u64>,
    verify_tls: Option<bool>,
    debug: Option<bool>,
    body_limit_bytes: Option<usize>,
    watched_taxonomies: Option<Vec<String>>,
    site_host: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawAuthSettings {
    nonce_ttl_seconds: Option<u64>,
    operators: Vec<RawOperatorSettings>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawOperatorSettings {
    name: Option<String>,
    key_sha256: Option<String>,
    manage: Option<bool>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
