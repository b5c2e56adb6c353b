//! Process configuration for the API binary.
//!
//! Everything is read once at startup. Values are validated here so the
//! router and the pipeline can be built without further checks.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use axum::http::HeaderValue;
use groundwatch_core::error::CoreError;
use groundwatch_pipeline::PipelineConfig;

pub const DEFAULT_PORT: u16 = 5000;
pub const DEFAULT_CORS_ORIGIN: &str = "http://localhost:5173";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be set")]
    Missing { name: &'static str },

    #[error("{name} has an invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid pipeline configuration: {0}")]
    Pipeline(#[from] CoreError),
}

/// HTTP listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Browser origins allowed to call the API and open the alert socket.
    pub cors_origins: Vec<HeaderValue>,
    pub request_timeout: Duration,
}

/// Everything the binary needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub pipeline: PipelineConfig,
    pub database_url: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = lookup("DATABASE_URL")
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing {
                name: "DATABASE_URL",
            })?;

        Ok(Self {
            server: ServerConfig::from_lookup(&lookup)?,
            pipeline: PipelineConfig::from_lookup(&lookup)?,
            database_url,
        })
    }
}

impl ServerConfig {
    /// | Env Var                | Default                 |
    /// |------------------------|-------------------------|
    /// | `HOST`                 | `0.0.0.0`               |
    /// | `PORT`                 | `5000`                  |
    /// | `CORS_ORIGINS`         | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS` | `30`                    |
    ///
    /// `CORS_ORIGINS` is comma separated; `*` is not accepted.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let host: IpAddr = parse(&lookup, "HOST", IpAddr::V4(Ipv4Addr::UNSPECIFIED))?;
        let port: u16 = parse(&lookup, "PORT", DEFAULT_PORT)?;

        let raw_origins = lookup("CORS_ORIGINS").unwrap_or_else(|| DEFAULT_CORS_ORIGIN.into());
        let cors_origins = raw_origins
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(parse_origin)
            .collect::<Result<Vec<_>, _>>()?;

        let timeout_secs: u64 =
            parse(&lookup, "REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?;
        if timeout_secs == 0 {
            return Err(invalid("REQUEST_TIMEOUT_SECS", "0", "must be at least 1"));
        }

        Ok(Self {
            bind_addr: SocketAddr::new(host, port),
            cors_origins,
            request_timeout: Duration::from_secs(timeout_secs),
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| invalid(name, &raw, e)),
    }
}

fn parse_origin(origin: &str) -> Result<HeaderValue, ConfigError> {
    if origin == "*" {
        return Err(invalid("CORS_ORIGINS", origin, "list explicit origins"));
    }
    HeaderValue::from_str(origin).map_err(|e| invalid("CORS_ORIGINS", origin, e))
}

fn invalid(name: &'static str, value: &str, reason: impl std::fmt::Display) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let mut map: HashMap<String, String> = HashMap::from([(
            "DATABASE_URL".to_string(),
            "postgres://localhost/groundwatch".to_string(),
        )]);
        for (k, v) in vars {
            map.insert(k.to_string(), v.to_string());
        }
        AppConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_bind_all_interfaces() {
        let config = load(&[]).unwrap();
        assert_eq!(config.server.bind_addr, "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.server.cors_origins, [DEFAULT_CORS_ORIGIN]);
        assert_eq!(config.server.request_timeout, Duration::from_secs(30));
        assert_eq!(config.pipeline.calibration.frame_width, 640);
    }

    #[test]
    fn origins_are_split_and_trimmed() {
        let config = load(&[(
            "CORS_ORIGINS",
            "http://ops.local, http://localhost:5173,",
        )])
        .unwrap();
        assert_eq!(
            config.server.cors_origins,
            ["http://ops.local", "http://localhost:5173"]
        );
    }

    #[test]
    fn wildcard_origin_is_rejected() {
        let err = load(&[("CORS_ORIGINS", "*")]).unwrap_err();
        assert_matches!(err, ConfigError::Invalid { name: "CORS_ORIGINS", .. });
    }

    #[test]
    fn bad_host_and_port_are_rejected() {
        assert_matches!(
            load(&[("HOST", "somewhere")]),
            Err(ConfigError::Invalid { name: "HOST", .. })
        );
        assert_matches!(
            load(&[("PORT", "70000")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        );
        assert_matches!(
            load(&[("REQUEST_TIMEOUT_SECS", "0")]),
            Err(ConfigError::Invalid { .. })
        );
    }

    #[test]
    fn database_url_is_required() {
        let err = AppConfig::from_lookup(|_| None).unwrap_err();
        assert_matches!(err, ConfigError::Missing { name: "DATABASE_URL" });
    }

    #[test]
    fn pipeline_errors_are_surfaced() {
        let err = load(&[("TRACKING_RETENTION_SECS", "-1")]).unwrap_err();
        assert_matches!(err, ConfigError::Pipeline(_));
    }
}
