//! Cloud endpoint settings, read from the environment.

use std::time::Duration;

use duofolio_core::settings::millis_or;

use crate::error::{CloudSyncError, Result};

const API_URL_ENV: &str = "DUOFOLIO_API_URL";
const API_TOKEN_ENV: &str = "DUOFOLIO_API_TOKEN";
const POLL_INTERVAL_ENV: &str = "DUOFOLIO_POLL_INTERVAL_MS";

pub const DEFAULT_POLL_INTERVAL_MS: u64 = 3_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloudSyncSettings {
    /// Base URL without a trailing slash.
    pub api_url: String,
    pub api_token: Option<String>,
    pub poll_interval: Duration,
}

impl CloudSyncSettings {
    pub fn new(api_url: impl AsRef<str>) -> Self {
        Self {
            api_url: normalize_url(api_url.as_ref()),
            api_token: None,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let api_url = lookup(API_URL_ENV)
            .map(|url| normalize_url(&url))
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                CloudSyncError::invalid_request(format!("{} is not set", API_URL_ENV))
            })?;
        let api_token = lookup(API_TOKEN_ENV)
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());
        let poll_interval = millis_or(
            &lookup,
            POLL_INTERVAL_ENV,
            Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        );

        Ok(Self {
            api_url,
            api_token,
            poll_interval,
        })
    }
}

fn normalize_url(raw: &str) -> String {
    raw.trim().trim_end_matches('/').to_string()
}
