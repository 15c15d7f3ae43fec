use std::env;

use anyhow::{Context, Result};
use url::Url;

pub const API_URL_ENV: &str = "SPECIMEN_API_URL";
pub const DEFAULT_API_PATH: &str = "/api";
/// Origin that relative API paths resolve against for co-hosted deployments.
pub const CO_HOSTED_ORIGIN: &str = "http://localhost:3000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiUrlSource {
    CommandLine,
    Environment,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub base_url: String,
    pub source: ApiUrlSource,
}

impl ApiConfig {
    pub fn resolve(cli_override: Option<&str>) -> Result<Self> {
        let env_value = env::var(API_URL_ENV).ok();
        Self::resolve_from(cli_override, env_value.as_deref())
    }

    pub fn resolve_from(cli_override: Option<&str>, env_value: Option<&str>) -> Result<Self> {
        let (raw, source) = match (non_blank(cli_override), non_blank(env_value)) {
            (Some(value), _) => (value, ApiUrlSource::CommandLine),
            (None, Some(value)) => (value, ApiUrlSource::Environment),
            (None, None) => (DEFAULT_API_PATH, ApiUrlSource::Fallback),
        };
        let base_url = absolutize(raw)
            .with_context(|| format!("Invalid API base URL {raw:?}"))?;
        Ok(Self { base_url, source })
    }
}

fn absolutize(raw: &str) -> Result<String> {
    if let Ok(url) = Url::parse(raw) {
        return Ok(url.to_string());
    }
    let origin = Url::parse(CO_HOSTED_ORIGIN).context("Co-hosted origin is not a URL")?;
    let joined = origin.join(raw).context("Could not join relative API path")?;
    Ok(joined.to_string())
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_beats_environment() {
        let config = ApiConfig::resolve_from(
            Some("https://cli.example/api"),
            Some("https://env.example/api"),
        )
        .expect("should resolve");
        assert_eq!(config.base_url, "https://cli.example/api");
        assert_eq!(config.source, ApiUrlSource::CommandLine);
    }

    #[test]
    fn environment_used_when_no_override() {
        let config = ApiConfig::resolve_from(Some("  "), Some("https://env.example/v1/"))
            .expect("should resolve");
        assert_eq!(config.base_url, "https://env.example/v1/");
        assert_eq!(config.source, ApiUrlSource::Environment);
    }

    #[test]
    fn falls_back_to_co_hosted_relative_path() {
        let config = ApiConfig::resolve_from(None, None).expect("should resolve");
        assert_eq!(config.base_url, "http://localhost:3000/api");
        assert_eq!(config.source, ApiUrlSource::Fallback);
    }

    #[test]
    fn relative_environment_values_join_the_origin() {
        let config = ApiConfig::resolve_from(None, Some("/catalog/api")).expect("should resolve");
        assert_eq!(config.base_url, "http://localhost:3000/catalog/api");
    }
}
