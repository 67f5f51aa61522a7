use std::{fs, time::Duration};

use serde::Deserialize;
use shared::protocol::PREDICT_PATH;
use url::Url;

use crate::error::SettingsError;

pub const SETTINGS_FILE: &str = "roastcheck.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub api_base_url: Option<String>,
    pub request_timeout_secs: u64,
    pub log_filter: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            request_timeout_secs: 30,
            log_filter: "info".into(),
        }
    }
}

impl ClientSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn predict_endpoint(&self) -> Result<Url, SettingsError> {
        let base = self
            .api_base_url
            .as_deref()
            .ok_or(SettingsError::MissingBaseUrl)?;
        predict_endpoint(base)
    }
}

#[derive(Debug, Default, Deserialize)]
struct FileSettings {
    api_base_url: Option<String>,
    request_timeout_secs: Option<u64>,
    log_filter: Option<String>,
}

/// Reads `roastcheck.toml` from the working directory, then applies
/// environment overrides. A missing file is fine; a malformed one is not.
pub fn load_settings() -> Result<ClientSettings, SettingsError> {
    let raw = fs::read_to_string(SETTINGS_FILE).ok();
    resolve_settings(raw.as_deref(), |key| std::env::var(key).ok())
}

pub fn resolve_settings(
    file_contents: Option<&str>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ClientSettings, SettingsError> {
    let mut settings = ClientSettings::default();

    if let Some(raw) = file_contents {
        let file_cfg =
            toml::from_str::<FileSettings>(raw).map_err(|source| SettingsError::Unparseable {
                file: SETTINGS_FILE,
                source,
            })?;
        if let Some(v) = file_cfg.api_base_url {
            settings.api_base_url = Some(v);
        }
        if let Some(v) = file_cfg.request_timeout_secs {
            settings.request_timeout_secs = v;
        }
        if let Some(v) = file_cfg.log_filter {
            settings.log_filter = v;
        }
    }

    if let Some(v) = env("ROASTCHECK_API_BASE_URL") {
        settings.api_base_url = Some(v);
    }
    if let Some(v) = env("APP__API_BASE_URL") {
        settings.api_base_url = Some(v);
    }

    if let Some(v) = env("ROASTCHECK_REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = env("ROASTCHECK_LOG_FILTER") {
        settings.log_filter = v;
    }

    Ok(settings)
}

/// Builds `<base>/predict`, keeping any path prefix on the base URL.
pub fn predict_endpoint(raw_base_url: &str) -> Result<Url, SettingsError> {
    let trimmed = raw_base_url.trim();
    let invalid = |reason: String| SettingsError::InvalidBaseUrl {
        url: trimmed.to_string(),
        reason,
    };

    let mut base = Url::parse(trimmed).map_err(|err| invalid(err.to_string()))?;
    if !matches!(base.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", base.scheme())));
    }
    if base.cannot_be_a_base() {
        return Err(invalid("URL cannot carry a path".to_string()));
    }
    base.set_query(None);
    base.set_fragment(None);
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }

    base.join(PREDICT_PATH)
        .map_err(|err| invalid(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn defaults_have_no_network_location() {
        let settings = resolve_settings(None, no_env).expect("settings");
        assert_eq!(settings, ClientSettings::default());
        assert!(matches!(
            settings.predict_endpoint(),
            Err(SettingsError::MissingBaseUrl)
        ));
    }

    #[test]
    fn file_values_are_overridden_by_environment() {
        let file = r#"
api_base_url = "http://from-file:8000"
request_timeout_secs = 5
log_filter = "debug"
"#;
        let settings = resolve_settings(Some(file), |key| match key {
            "APP__API_BASE_URL" => Some("http://from-env:9000".to_string()),
            _ => None,
        })
        .expect("settings");
        assert_eq!(
            settings.api_base_url.as_deref(),
            Some("http://from-env:9000")
        );
        assert_eq!(settings.request_timeout(), Duration::from_secs(5));
        assert_eq!(settings.log_filter, "debug");
    }

    #[test]
    fn unparseable_timeout_keeps_default() {
        let settings = resolve_settings(None, |key| {
            (key == "ROASTCHECK_REQUEST_TIMEOUT_SECS").then(|| "soon".to_string())
        })
        .expect("settings");
        assert_eq!(settings.request_timeout_secs, 30);
    }

    #[test]
    fn malformed_settings_file_is_an_error() {
        let file = r#"
api_base_url = "http://from-file:8000"
request_timeout_secs = "thirty"
"#;
        let err = resolve_settings(Some(file), no_env).expect_err("bad file");
        assert!(matches!(
            err,
            SettingsError::Unparseable {
                file: SETTINGS_FILE,
                ..
            }
        ));
        assert!(err.to_string().contains(SETTINGS_FILE), "{err}");
    }

    #[test]
    fn zero_timeout_from_environment_is_kept_for_client_validation() {
        let settings = resolve_settings(None, |key| {
            (key == "ROASTCHECK_REQUEST_TIMEOUT_SECS").then(|| "0".to_string())
        })
        .expect("settings");
        assert_eq!(settings.request_timeout(), Duration::ZERO);
    }

    #[test]
    fn builds_predict_endpoint_from_origin() {
        assert_eq!(
            predict_endpoint("http://localhost:8000").expect("endpoint").as_str(),
            "http://localhost:8000/predict"
        );
        assert_eq!(
            predict_endpoint("http://localhost:8000/").expect("endpoint").as_str(),
            "http://localhost:8000/predict"
        );
    }

    #[test]
    fn keeps_path_prefix_on_base_url() {
        assert_eq!(
            predict_endpoint("https://beans.example/api/v1?x=1")
                .expect("endpoint")
                .as_str(),
            "https://beans.example/api/v1/predict"
        );
    }

    #[test]
    fn rejects_non_http_base_urls() {
        for raw in ["ftp://beans.example", "not a url", "mailto:roaster@example.com"] {
            assert!(
                matches!(
                    predict_endpoint(raw),
                    Err(SettingsError::InvalidBaseUrl { .. })
                ),
                "{raw} should be rejected"
            );
        }
    }
}
