//! Service configuration read from environment variables.
//!
//! | Variable | Default |
//! | --- | --- |
//! | `BIND_ADDR` | `0.0.0.0:3000` |
//! | `UPLOAD_ROOT` | `public/uploads` |
//! | `RENDER_TIMEOUT_MS` | `30000` |
//! | `MAX_CONCURRENT_RENDERS` | `4` |
//! | `MAX_IMAGE_BYTES` | `5242880` |
//! | `BODY_LIMIT_BYTES` | `10485760` |
//! | `PAGE_FORMAT` | `A4` |
//! | `CHROME_PATH` | unset |
//! | `CHROME_SANDBOX` | `true` |
//! | `OTEL_EXPORTER_OTLP_ENDPOINT` | unset |
//! | `LOG_FORMAT` | `text` |

use crate::render::{PageFormat, RenderSettings};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub bind_addr: String,
    pub upload_root: PathBuf,
    pub render_timeout: Duration,
    pub max_concurrent_renders: usize,
    /// Decoded size limit for a single embedded image.
    pub max_image_bytes: usize,
    pub body_limit_bytes: usize,
    pub page_format: PageFormat,
    pub chrome_path: Option<PathBuf>,
    pub chrome_sandbox: bool,
    pub otlp_endpoint: Option<String>,
    pub log_format: LogFormat,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            upload_root: PathBuf::from("public/uploads"),
            render_timeout: Duration::from_millis(30_000),
            max_concurrent_renders: 4,
            max_image_bytes: 5 * 1024 * 1024,
            body_limit_bytes: 10 * 1024 * 1024,
            page_format: PageFormat::A4,
            chrome_path: None,
            chrome_sandbox: true,
            otlp_endpoint: None,
            log_format: LogFormat::Text,
        }
    }
}

impl ServiceConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary variable source.
    ///
    /// Blank values count as unset; unparseable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Self {
            bind_addr: get("BIND_ADDR").unwrap_or(defaults.bind_addr),
            upload_root: get("UPLOAD_ROOT")
                .map(PathBuf::from)
                .unwrap_or(defaults.upload_root),
            render_timeout: Duration::from_millis(
                parse_or(get("RENDER_TIMEOUT_MS"), "RENDER_TIMEOUT_MS", 30_000u64).max(1),
            ),
            max_concurrent_renders: parse_or(
                get("MAX_CONCURRENT_RENDERS"),
                "MAX_CONCURRENT_RENDERS",
                defaults.max_concurrent_renders,
            )
            .max(1),
            max_image_bytes: parse_or(
                get("MAX_IMAGE_BYTES"),
                "MAX_IMAGE_BYTES",
                defaults.max_image_bytes,
            ),
            body_limit_bytes: parse_or(
                get("BODY_LIMIT_BYTES"),
                "BODY_LIMIT_BYTES",
                defaults.body_limit_bytes,
            ),
            page_format: parse_or(get("PAGE_FORMAT"), "PAGE_FORMAT", defaults.page_format),
            chrome_path: get("CHROME_PATH").map(PathBuf::from),
            chrome_sandbox: get("CHROME_SANDBOX")
                .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(defaults.chrome_sandbox),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT"),
            log_format: match get("LOG_FORMAT").as_deref() {
                Some(v) if v.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => LogFormat::Text,
            },
        }
    }

    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            timeout: self.render_timeout,
            max_concurrent: self.max_concurrent_renders,
            page_format: self.page_format,
        }
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match value {
        Some(raw) => raw.parse().unwrap_or_else(|e| {
            warn!("Ignoring invalid {}={:?}: {}", key, raw, e);
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> ServiceConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.upload_root, PathBuf::from("public/uploads"));
        assert_eq!(config.render_timeout, Duration::from_secs(30));
        assert_eq!(config.page_format, PageFormat::A4);
        assert_eq!(config.max_image_bytes, 5 * 1024 * 1024);
        assert!(config.chrome_sandbox);
        assert!(config.otlp_endpoint.is_none());
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("UPLOAD_ROOT", "/var/lib/uploads"),
            ("RENDER_TIMEOUT_MS", "2500"),
            ("MAX_CONCURRENT_RENDERS", "8"),
            ("MAX_IMAGE_BYTES", "1024"),
            ("PAGE_FORMAT", "letter"),
            ("CHROME_PATH", "/usr/bin/chromium"),
            ("CHROME_SANDBOX", "false"),
            ("LOG_FORMAT", "JSON"),
        ]);

        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.upload_root, PathBuf::from("/var/lib/uploads"));
        assert_eq!(config.render_timeout, Duration::from_millis(2500));
        assert_eq!(config.max_concurrent_renders, 8);
        assert_eq!(config.max_image_bytes, 1024);
        assert_eq!(config.page_format, PageFormat::Letter);
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert!(!config.chrome_sandbox);
        assert_eq!(config.log_format, LogFormat::Json);

        let settings = config.render_settings();
        assert_eq!(settings.max_concurrent, 8);
        assert_eq!(settings.page_format, PageFormat::Letter);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config(&[
            ("RENDER_TIMEOUT_MS", "soon"),
            ("MAX_CONCURRENT_RENDERS", "0"),
            ("PAGE_FORMAT", "B5"),
            ("UPLOAD_ROOT", "  "),
        ]);

        assert_eq!(config.render_timeout, Duration::from_secs(30));
        assert_eq!(config.max_concurrent_renders, 1);
        assert_eq!(config.page_format, PageFormat::A4);
        assert_eq!(config.upload_root, PathBuf::from("public/uploads"));
    }
}
