//! Configuration management
//!
//! Configuration is layered with figment, lowest priority first:
//! 1. Built-in defaults
//! 2. A TOML file (`./multitwitch.toml`, or the path given on the command line)
//! 3. `MULTITWITCH_CLIENT_ID`, `MULTITWITCH_CLIENT_SECRET` and
//!    `MULTITWITCH_CLIENT_REDIRECT` for the Twitch application credentials
//! 4. `MULTITWITCH_<SECTION>__<KEY>` for everything else
//!    (e.g. `MULTITWITCH_SESSION__SECURE_COOKIES=true`)
//!
//! # Example
//!
//! ```toml
//! [server]
//! bind_addr = "127.0.0.1:8080"
//!
//! [session]
//! secure_cookies = true
//!
//! [oauth2.twitch]
//! client_id = "your-client-id"
//! client_secret = "your-client-secret"
//! redirect_uri = "http://localhost:8080/auth/twitch/callback"
//! ```

use chrono::Duration;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::oauth2::types::{OAuthConfig, TWITCH};

/// Default configuration file, relative to the working directory
pub const DEFAULT_CONFIG_FILE: &str = "multitwitch.toml";

/// Prefix of the application credential variables
const CLIENT_ENV_PREFIX: &str = "MULTITWITCH_CLIENT_";

/// Prefix of the nested override variables
const ENV_PREFIX: &str = "MULTITWITCH_";

/// Complete application configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Listener settings
    pub server: ServerSettings,
    /// Session cookie and lifetime settings
    pub session: SessionSettings,
    /// Outbound HTTP settings
    pub http: HttpSettings,
    /// Logging settings
    pub logging: LoggingSettings,
    /// OAuth2 providers by name
    pub oauth2: OAuthConfig,
    /// Downstream API settings
    pub api: ApiSettings,
}

/// Listener settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Socket address to listen on
    pub bind_addr: String,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

/// `SameSite` attribute of the session cookie
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// Sent on top-level cross-site navigation (needed for the provider redirect back)
    #[default]
    Lax,
    /// Never sent cross-site
    Strict,
    /// Always sent (requires `Secure`)
    None,
}

impl SameSite {
    /// Attribute value as written in `Set-Cookie`
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Lax => "Lax",
            Self::Strict => "Strict",
            Self::None => "None",
        }
    }
}

/// Session cookie and lifetime settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    /// Cookie carrying the session id
    pub cookie_name: String,
    /// Lifetime of an authenticated session, and the cookie `Max-Age`
    pub max_age_secs: i64,
    /// Lifetime of a pending authorization
    pub pending_ttl_secs: i64,
    /// Mark the cookie `Secure`
    pub secure_cookies: bool,
    /// Cookie `SameSite` attribute
    pub same_site: SameSite,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            cookie_name: "multitwitch_session".to_string(),
            max_age_secs: 86_400,
            pending_ttl_secs: 600,
            secure_cookies: false,
            same_site: SameSite::Lax,
        }
    }
}

impl SessionSettings {
    /// Authenticated session lifetime
    #[must_use]
    pub fn max_age(&self) -> Duration {
        Duration::seconds(self.max_age_secs)
    }

    /// Pending authorization lifetime
    #[must_use]
    pub fn pending_ttl(&self) -> Duration {
        Duration::seconds(self.pending_ttl_secs)
    }
}

/// Outbound HTTP settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    /// Upper bound for a whole outbound call, in milliseconds
    pub request_timeout_ms: u64,
    /// Upper bound for establishing a connection, in milliseconds
    pub connect_timeout_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
            connect_timeout_ms: 5_000,
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Pretty in debug builds, JSON in release builds
    #[default]
    Auto,
    /// Human-readable multi-line output
    Pretty,
    /// One JSON object per event
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, used when `RUST_LOG` is unset
    pub filter: String,
    /// Output format
    pub format: LogFormat,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info,multitwitch=debug".to_string(),
            format: LogFormat::Auto,
        }
    }
}

/// Downstream API settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Helix base URL
    pub base_url: String,
    /// Provider whose client id is sent as `Client-Id`
    pub provider: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.twitch.tv/helix".to_string(),
            provider: TWITCH.to_string(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Defaults could not be serialized
    #[error("Failed to serialize default configuration: {0}")]
    Defaults(#[from] toml::ser::Error),

    /// A source could not be read or did not match the schema
    #[error("Failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    /// Required configuration is absent or invalid
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),
}

impl AppConfig {
    /// Load configuration from defaults, `path` (or `./multitwitch.toml`) and the environment
    ///
    /// A missing file is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a source cannot be parsed
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        Self::figment(path)?.extract().map_err(|e| Box::new(e).into())
    }

    fn figment(path: &Path) -> Result<Figment, ConfigError> {
        Ok(Figment::new()
            .merge(Toml::string(&toml::to_string(&Self::default())?))
            .merge(Toml::file(path))
            .merge(client_env())
            .merge(
                Env::prefixed(ENV_PREFIX)
                    .ignore(&["client_id", "client_secret", "client_redirect"])
                    .split("__")
                    .lowercase(true),
            ))
    }

    /// Check that the service can run with this configuration
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ConfigurationMissing`] listing every problem
    /// found: no providers, empty credentials, unparsable endpoint URLs, or
    /// an API provider that is not configured.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.oauth2.is_empty() {
            problems.push("no OAuth2 provider configured".to_string());
        }

        for (name, provider) in self.oauth2.iter() {
            problems.extend(
                provider
                    .missing_fields()
                    .into_iter()
                    .map(|field| format!("oauth2.{name}.{field} is empty")),
            );

            for (field, value) in [
                ("auth_url", &provider.auth_url),
                ("token_url", &provider.token_url),
                ("userinfo_url", &provider.userinfo_url),
                ("redirect_uri", &provider.redirect_uri),
            ] {
                if !value.trim().is_empty() && reqwest::Url::parse(value).is_err() {
                    problems.push(format!("oauth2.{name}.{field} is not a valid URL"));
                }
            }
        }

        if !self.oauth2.is_provider_configured(&self.api.provider) {
            problems.push(format!(
                "api.provider {:?} is not a configured OAuth2 provider",
                self.api.provider
            ));
        }

        if reqwest::Url::parse(&self.api.base_url).is_err() {
            problems.push("api.base_url is not a valid URL".to_string());
        }

        if self.session.max_age_secs <= 0 || self.session.pending_ttl_secs <= 0 {
            problems.push("session lifetimes must be positive".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::ConfigurationMissing(problems.join("; ")))
        }
    }
}

/// `MULTITWITCH_CLIENT_{ID,SECRET,REDIRECT}` onto the Twitch provider
fn client_env() -> Env {
    Env::prefixed(CLIENT_ENV_PREFIX)
        .only(&["id", "secret", "redirect"])
        .map(|key| {
            if key.as_str().eq_ignore_ascii_case("id") {
                "oauth2.twitch.client_id".into()
            } else if key.as_str().eq_ignore_ascii_case("secret") {
                "oauth2.twitch.client_secret".into()
            } else {
                "oauth2.twitch.redirect_uri".into()
            }
        })
}
