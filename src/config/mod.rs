//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{net::SocketAddr, num::NonZeroU64, path::PathBuf, str::FromStr, time::Duration};

use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use url::Url;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "phonepulse";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_EDGE_PORT: u16 = 3000;
const DEFAULT_ORIGIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DELIVERY_HOST: &str = "cdn.contentstack.io";
const DEFAULT_MANAGEMENT_HOST: &str = "api.contentstack.io";
const DEFAULT_EDGE_API_URL: &str = "https://personalize-edge.contentstack.com";
const DEFAULT_VARIANT_QUERY_PARAM: &str = "cs_personalize";
const DEFAULT_LEGACY_QUERY_PARAM: &str = "cs_variant";
const DEFAULT_BUDGET_COOKIE: &str = "budget_preference";
const DEFAULT_BYPASS_PREFIXES: [&str; 3] = ["/_next/", "/static/", "/favicon.ico"];
const DEFAULT_EDGE_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;

/// Command-line arguments for the phonepulse binary.
#[derive(Debug, Parser)]
#[command(
    name = "phonepulse",
    version,
    about = "Personalized content edge and origin"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "PHONEPULSE_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the edge interceptor and the origin in one process.
    Serve(Box<ServeArgs>),
    /// Run only the origin content and feedback API.
    Origin(Box<ServeArgs>),
    /// Run only the edge interceptor in front of a remote origin.
    Edge(Box<ServeArgs>),
}

impl Command {
    fn overrides(&self) -> &ServeOverrides {
        match self {
            Command::Serve(args) | Command::Origin(args) | Command::Edge(args) => &args.overrides,
        }
    }
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the listener host.
    #[arg(long = "server-host", value_name = "HOST")]
    pub server_host: Option<String>,

    /// Override the edge listener port.
    #[arg(long = "server-edge-port", value_name = "PORT")]
    pub edge_port: Option<u16>,

    /// Override the origin listener port.
    #[arg(long = "server-origin-port", value_name = "PORT")]
    pub origin_port: Option<u16>,

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

    /// Override the origin URL the edge forwards to.
    #[arg(long = "edge-origin-url", value_name = "URL")]
    pub edge_origin_url: Option<String>,

    /// Override the personalization project uid.
    #[arg(long = "personalize-project-uid", value_name = "UID")]
    pub personalize_project_uid: Option<String>,

    /// Fire impressions from a detached task instead of awaiting them.
    #[arg(
        long = "personalize-detach-impressions",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub personalize_detach_impressions: Option<bool>,

    /// Override the outbound request timeout.
    #[arg(long = "upstream-timeout-seconds", value_name = "SECONDS")]
    pub upstream_timeout_seconds: Option<u64>,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub contentstack: ContentstackSettings,
    pub personalize: PersonalizeSettings,
    pub edge: EdgeSettings,
    pub upstream: UpstreamSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub edge_addr: SocketAddr,
    pub origin_addr: SocketAddr,
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

/// CMS credentials. Absent values surface as per-request failures, not startup errors.
#[derive(Debug, Clone)]
pub struct ContentstackSettings {
    pub api_key: Option<String>,
    pub delivery_token: Option<String>,
    pub environment: Option<String>,
    pub delivery_host: String,
    pub management_token: Option<String>,
    pub management_host: String,
    pub branch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PersonalizeSettings {
    pub project_uid: Option<String>,
    pub edge_api_url: String,
    pub variant_query_param: String,
    pub legacy_query_param: String,
    pub budget_cookie: String,
    pub detach_impressions: bool,
}

#[derive(Debug, Clone)]
pub struct EdgeSettings {
    pub origin_url: Url,
    pub bypass_prefixes: Vec<String>,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct UpstreamSettings {
    pub timeout: Option<Duration>,
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
        Environment::with_prefix("PHONEPULSE")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("edge.bypass_prefixes")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(command) => raw.apply_serve_overrides(command.overrides()),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    contentstack: RawContentstackSettings,
    personalize: RawPersonalizeSettings,
    edge: RawEdgeSettings,
    upstream: RawUpstreamSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_host.as_ref() {
            self.server.host = Some(host.clone());
        }
        if let Some(port) = overrides.edge_port {
            self.server.edge_port = Some(port);
        }
        if let Some(port) = overrides.origin_port {
            self.server.origin_port = Some(port);
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
        if let Some(url) = overrides.edge_origin_url.as_ref() {
            self.edge.origin_url = Some(url.clone());
        }
        if let Some(uid) = overrides.personalize_project_uid.as_ref() {
            self.personalize.project_uid = Some(uid.clone());
        }
        if let Some(detach) = overrides.personalize_detach_impressions {
            self.personalize.detach_impressions = Some(detach);
        }
        if let Some(seconds) = overrides.upstream_timeout_seconds {
            self.upstream.timeout_seconds = Some(seconds);
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            contentstack,
            personalize,
            edge,
            upstream,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let contentstack = build_contentstack_settings(contentstack);
        let personalize = build_personalize_settings(personalize)?;
        let edge = build_edge_settings(edge, &server)?;
        let upstream = build_upstream_settings(upstream)?;

        Ok(Self {
            server,
            logging,
            contentstack,
            personalize,
            edge,
            upstream,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let host = server.host.unwrap_or_else(|| DEFAULT_HOST.to_string());

    let edge_port = server.edge_port.unwrap_or(DEFAULT_EDGE_PORT);
    if edge_port == 0 {
        return Err(LoadError::invalid(
            "server.edge_port",
            "port must be greater than zero",
        ));
    }

    let origin_port = server.origin_port.unwrap_or(DEFAULT_ORIGIN_PORT);
    if origin_port == 0 {
        return Err(LoadError::invalid(
            "server.origin_port",
            "port must be greater than zero",
        ));
    }

    let edge_addr = parse_socket_addr(&host, edge_port)
        .map_err(|reason| LoadError::invalid("server.edge_addr", reason))?;
    let origin_addr = parse_socket_addr(&host, origin_port)
        .map_err(|reason| LoadError::invalid("server.origin_addr", reason))?;

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
        edge_addr,
        origin_addr,
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

fn build_contentstack_settings(raw: RawContentstackSettings) -> ContentstackSettings {
    ContentstackSettings {
        api_key: non_blank(raw.api_key),
        delivery_token: non_blank(raw.delivery_token),
        environment: non_blank(raw.environment),
        delivery_host: non_blank(raw.delivery_host)
            .unwrap_or_else(|| DEFAULT_DELIVERY_HOST.to_string()),
        management_token: non_blank(raw.management_token),
        management_host: non_blank(raw.management_host)
            .unwrap_or_else(|| DEFAULT_MANAGEMENT_HOST.to_string()),
        branch: non_blank(raw.branch),
    }
}

fn build_personalize_settings(
    raw: RawPersonalizeSettings,
) -> Result<PersonalizeSettings, LoadError> {
    let variant_query_param = non_blank(raw.variant_query_param)
        .unwrap_or_else(|| DEFAULT_VARIANT_QUERY_PARAM.to_string());
    let legacy_query_param = non_blank(raw.legacy_query_param)
        .unwrap_or_else(|| DEFAULT_LEGACY_QUERY_PARAM.to_string());
    if variant_query_param == legacy_query_param {
        return Err(LoadError::invalid(
            "personalize.legacy_query_param",
            "must differ from personalize.variant_query_param",
        ));
    }

    Ok(PersonalizeSettings {
        project_uid: non_blank(raw.project_uid),
        edge_api_url: non_blank(raw.edge_api_url)
            .unwrap_or_else(|| DEFAULT_EDGE_API_URL.to_string()),
        variant_query_param,
        legacy_query_param,
        budget_cookie: non_blank(raw.budget_cookie)
            .unwrap_or_else(|| DEFAULT_BUDGET_COOKIE.to_string()),
        detach_impressions: raw.detach_impressions.unwrap_or(false),
    })
}

fn build_edge_settings(
    raw: RawEdgeSettings,
    server: &ServerSettings,
) -> Result<EdgeSettings, LoadError> {
    let origin_url = match non_blank(raw.origin_url) {
        Some(url) => Url::parse(&url)
            .map_err(|err| LoadError::invalid("edge.origin_url", err.to_string()))?,
        None => Url::parse(&format!("http://{}", server.origin_addr))
            .map_err(|err| LoadError::invalid("edge.origin_url", err.to_string()))?,
    };
    if !matches!(origin_url.scheme(), "http" | "https") {
        return Err(LoadError::invalid(
            "edge.origin_url",
            "scheme must be http or https",
        ));
    }

    let bypass_prefixes = match raw.bypass_prefixes {
        Some(prefixes) => prefixes
            .into_iter()
            .filter(|prefix| !prefix.trim().is_empty())
            .collect(),
        None => DEFAULT_BYPASS_PREFIXES
            .iter()
            .map(|prefix| prefix.to_string())
            .collect(),
    };

    let max_body_bytes = NonZeroU64::new(
        raw.max_body_bytes
            .unwrap_or(DEFAULT_EDGE_MAX_BODY_BYTES),
    )
    .ok_or_else(|| LoadError::invalid("edge.max_body_bytes", "must be greater than zero"))?;
    let max_body_bytes = usize::try_from(max_body_bytes.get()).map_err(|_| {
        LoadError::invalid(
            "edge.max_body_bytes",
            "value exceeds supported range for usize",
        )
    })?;

    Ok(EdgeSettings {
        origin_url,
        bypass_prefixes,
        max_body_bytes,
    })
}

fn build_upstream_settings(raw: RawUpstreamSettings) -> Result<UpstreamSettings, LoadError> {
    let timeout = match raw.timeout_seconds {
        Some(0) => {
            return Err(LoadError::invalid(
                "upstream.timeout_seconds",
                "must be greater than zero when set",
            ));
        }
        Some(seconds) => Some(Duration::from_secs(seconds)),
        None => None,
    };
    Ok(UpstreamSettings { timeout })
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    host: Option<String>,
    edge_port: Option<u16>,
    origin_port: Option<u16>,
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
struct RawContentstackSettings {
    api_key: Option<String>,
    delivery_token: Option<String>,
    environment: Option<String>,
    delivery_host: Option<String>,
    management_token: Option<String>,
    management_host: Option<String>,
    branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawPersonalizeSettings {
    project_uid: Option<String>,
    edge_api_url: Option<String>,
    variant_query_param: Option<String>,
    legacy_query_param: Option<String>,
    budget_cookie: Option<String>,
    detach_impressions: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawEdgeSettings {
    origin_url: Option<String>,
    bypass_prefixes: Option<Vec<String>>,
    max_body_bytes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawUpstreamSettings {
    timeout_seconds: Option<u64>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    })
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::from_raw(RawSettings::default()).expect("valid settings");
        assert_eq!(settings.server.edge_addr.port(), DEFAULT_EDGE_PORT);
        assert_eq!(settings.server.origin_addr.port(), DEFAULT_ORIGIN_PORT);
        assert_eq!(settings.personalize.variant_query_param, "cs_personalize");
        assert_eq!(settings.personalize.legacy_query_param, "cs_variant");
        assert!(!settings.personalize.detach_impressions);
        assert!(settings.upstream.timeout.is_none());
        assert_eq!(settings.edge.origin_url.as_str(), "http://127.0.0.1:3001/");
        assert_eq!(
            settings.edge.bypass_prefixes,
            vec!["/_next/", "/static/", "/favicon.ico"]
        );
    }

    #[test]
    fn cli_overrides_take_highest_precedence() {
        let mut raw = RawSettings::default();
        raw.server.edge_port = Some(4000);
        raw.logging.level = Some("info".to_string());

        let overrides = ServeOverrides {
            edge_port: Some(4321),
            log_level: Some("debug".to_string()),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert_eq!(settings.server.edge_addr.port(), 4321);
        assert_eq!(settings.logging.level, LevelFilter::DEBUG);
    }

    #[test]
    fn cli_json_logging_enforces_format() {
        let mut raw = RawSettings::default();
        let overrides = ServeOverrides {
            log_json: Some(true),
            ..Default::default()
        };

        raw.apply_serve_overrides(&overrides);
        let settings = Settings::from_raw(raw).expect("valid settings");

        assert!(matches!(settings.logging.format, LogFormat::Json));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut raw = RawSettings::default();
        raw.upstream.timeout_seconds = Some(0);
        let err = Settings::from_raw(raw).expect_err("invalid");
        assert!(matches!(
            err,
            LoadError::Invalid {
                key: "upstream.timeout_seconds",
                ..
            }
        ));
    }

    #[test]
    fn identical_query_params_are_rejected() {
        let mut raw = RawSettings::default();
        raw.personalize.legacy_query_param = Some("cs_personalize".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn origin_url_must_be_http() {
        let mut raw = RawSettings::default();
        raw.edge.origin_url = Some("ftp://origin".to_string());
        assert!(Settings::from_raw(raw).is_err());
    }

    #[test]
    fn blank_credentials_are_treated_as_missing() {
        let mut raw = RawSettings::default();
        raw.contentstack.api_key = Some("   ".to_string());
        let settings = Settings::from_raw(raw).expect("valid settings");
        assert!(settings.contentstack.api_key.is_none());
        assert_eq!(settings.contentstack.delivery_host, "cdn.contentstack.io");
    }

    #[test]
    fn config_file_is_loaded() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("temp file");
        writeln!(
            file,
            "[personalize]\nproject_uid = \"proj_1\"\n\n[edge]\nbypass_prefixes = [\"/assets/\"]\n"
        )
        .expect("write config");

        let args = CliArgs::parse_from([
            "phonepulse",
            "--config-file",
            file.path().to_str().expect("utf-8 path"),
            "origin",
        ]);
        let settings = load(&args).expect("settings");

        assert_eq!(settings.personalize.project_uid.as_deref(), Some("proj_1"));
        assert_eq!(settings.edge.bypass_prefixes, vec!["/assets/"]);
    }

    #[test]
    fn default_to_serve_command() {
        let args = CliArgs::parse_from(["phonepulse"]);
        let command = args
            .command
            .unwrap_or(Command::Serve(Box::<ServeArgs>::default()));
        assert!(matches!(command, Command::Serve(_)));
    }

    #[test]
    fn parse_edge_overrides() {
        let args = CliArgs::parse_from([
            "phonepulse",
            "edge",
            "--edge-origin-url",
            "http://origin.internal:8080",
            "--personalize-detach-impressions",
            "true",
        ]);

        match args.command.expect("edge command") {
            Command::Edge(edge) => {
                assert_eq!(
                    edge.overrides.edge_origin_url.as_deref(),
                    Some("http://origin.internal:8080")
                );
                assert_eq!(edge.overrides.personalize_detach_impressions, Some(true));
            }
            _ => panic!("wrong command parsed"),
        }
    }
}
