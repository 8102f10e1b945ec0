use std::env;

use thiserror::Error;
use tracing::info;
use url::Url;

use crate::store::StoreHandle;
use crate::{AppError, AppResult};

pub const URL_KEY: &str = "DEALDONE_SUPABASE_URL";
pub const ANON_KEY_KEY: &str = "DEALDONE_SUPABASE_ANON_KEY";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("backend URL did not parse: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("backend key is empty")]
    MissingKey,
}

impl From<ConfigError> for AppError {
    fn from(error: ConfigError) -> Self {
        let code = match &error {
            ConfigError::InvalidUrl(_) => "CONFIG/INVALID_URL",
            ConfigError::MissingKey => "CONFIG/MISSING_KEY",
        };
        AppError::new(code, error.to_string())
    }
}

/// Remote endpoint credentials. Resolved once per client construction;
/// absence is not an error, it selects mock mode for the client's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    pub url: Url,
    pub anon_key: String,
}

impl BackendConfig {
    pub fn new(url: &str, anon_key: &str) -> Result<Self, ConfigError> {
        let url = Url::parse(url)?;
        if anon_key.trim().is_empty() {
            return Err(ConfigError::MissingKey);
        }
        Ok(BackendConfig {
            url,
            anon_key: anon_key.to_string(),
        })
    }

    /// Environment variables win over persisted overrides; either source must
    /// supply both values or it is skipped.
    pub fn resolve(store: &StoreHandle) -> AppResult<Option<Self>> {
        let from_env = pair(env::var(URL_KEY).ok(), env::var(ANON_KEY_KEY).ok());
        let from_store = pair(store.get_raw(URL_KEY), store.get_raw(ANON_KEY_KEY));

        let (source, url, key) = match (from_env, from_store) {
            (Some((url, key)), _) => ("env", url, key),
            (None, Some((url, key))) => ("store", url, key),
            (None, None) => return Ok(None),
        };

        let config = BackendConfig::new(&url, &key)
            .map_err(|e| AppError::from(e).with_context("source", source))?;
        info!(
            target: "dealdone",
            event = "backend_config_resolved",
            source,
            url = %config.url
        );
        Ok(Some(config))
    }
}

fn pair(url: Option<String>, key: Option<String>) -> Option<(String, String)> {
    match (url, key) {
        (Some(url), Some(key)) if !url.trim().is_empty() && !key.trim().is_empty() => {
            Some((url, key))
        }
        _ => None,
    }
}

/// Persist an endpoint override. It is consumed at the next client
/// construction; a running client keeps its backend until rebuilt.
pub fn configure(store: &StoreHandle, url: &str, anon_key: &str) -> AppResult<()> {
    let config = BackendConfig::new(url, anon_key).map_err(AppError::from)?;
    store.set_raw(URL_KEY, config.url.as_str())?;
    store.set_raw(ANON_KEY_KEY, &config.anon_key)?;
    info!(target: "dealdone", event = "backend_configured", url = %config.url);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_url() {
        let err = BackendConfig::new("not a url", "key").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidUrl(_)));
        assert_eq!(AppError::from(err).code(), "CONFIG/INVALID_URL");
    }

    #[test]
    fn rejects_empty_key() {
        let err = BackendConfig::new("https://example.supabase.co", " ").unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey));
        assert_eq!(AppError::from(err).code(), "CONFIG/MISSING_KEY");
    }

    #[test]
    fn resolves_persisted_override() {
        let store = StoreHandle::in_memory();
        assert!(BackendConfig::resolve(&store).unwrap().is_none());

        configure(&store, "https://example.supabase.co", "anon-key").unwrap();
        let config = BackendConfig::resolve(&store).unwrap().expect("configured");
        assert_eq!(config.url.as_str(), "https://example.supabase.co/");
        assert_eq!(config.anon_key, "anon-key");
    }

    #[test]
    fn partial_override_is_ignored() {
        let store = StoreHandle::in_memory();
        store
            .set_raw(URL_KEY, "https://example.supabase.co")
            .unwrap();
        assert!(BackendConfig::resolve(&store).unwrap().is_none());
    }
}
