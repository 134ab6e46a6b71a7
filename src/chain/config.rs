//! Facilitator connection configuration.
//!
//! The facilitator base URL is resolved through an explicit, ordered lookup
//! over an injected environment so that resolution is deterministic and
//! testable without touching process-wide state.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Environment variable naming a generic facilitator endpoint.
pub const FACILITATOR_URL_ENV: &str = "FACILITATOR_URL";

/// Environment variable naming the site hosting an embedded facilitator.
///
/// Only consulted when resolving the settlement endpoint.
pub const SITE_URL_ENV: &str = "SITE_URL";

/// Base URL used when nothing else is configured.
pub const DEFAULT_FACILITATOR_URL: &str = "http://localhost:3000";

/// A read-only view of environment variables.
pub trait EnvSource {
    fn var(&self, key: &str) -> Option<String>;
}

impl EnvSource for HashMap<String, String> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).cloned()
    }
}

impl EnvSource for HashMap<&str, &str> {
    fn var(&self, key: &str) -> Option<String> {
        self.get(key).map(|v| v.to_string())
    }
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl EnvSource for ProcessEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Which facilitator operation a URL is being resolved for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacilitatorEndpoint {
    Verify,
    Settle,
}

/// Resolves the facilitator base URL.
///
/// Order: explicit value, then [`FACILITATOR_URL_ENV`], then (settlement
/// only) [`SITE_URL_ENV`], then [`DEFAULT_FACILITATOR_URL`]. Empty values
/// are skipped.
pub fn resolve_facilitator_url(
    explicit: Option<&str>,
    env: &impl EnvSource,
    endpoint: FacilitatorEndpoint,
) -> String {
    let non_empty = |v: String| (!v.trim().is_empty()).then_some(v);

    explicit
        .map(str::to_string)
        .and_then(non_empty)
        .or_else(|| env.var(FACILITATOR_URL_ENV).and_then(non_empty))
        .or_else(|| match endpoint {
            FacilitatorEndpoint::Settle => env.var(SITE_URL_ENV).and_then(non_empty),
            FacilitatorEndpoint::Verify => None,
        })
        .unwrap_or_else(|| DEFAULT_FACILITATOR_URL.to_string())
}

/// Path layout exposed by a facilitator.
///
/// Standalone facilitators serve `/verify` and `/settle` at their root; a
/// facilitator embedded in a web application serves them under
/// `/api/facilitator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacilitatorPaths {
    #[default]
    Root,
    Api,
}

impl FacilitatorPaths {
    pub fn path(&self, endpoint: FacilitatorEndpoint) -> &'static str {
        match (self, endpoint) {
            (FacilitatorPaths::Root, FacilitatorEndpoint::Verify) => "/verify",
            (FacilitatorPaths::Root, FacilitatorEndpoint::Settle) => "/settle",
            (FacilitatorPaths::Api, FacilitatorEndpoint::Verify) => "/api/facilitator/verify",
            (FacilitatorPaths::Api, FacilitatorEndpoint::Settle) => "/api/facilitator/settle",
        }
    }
}

impl std::str::FromStr for FacilitatorPaths {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "root" => Ok(FacilitatorPaths::Root),
            "api" => Ok(FacilitatorPaths::Api),
            other => Err(format!("unknown facilitator path layout: '{other}'")),
        }
    }
}

/// Configuration for reaching a facilitator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacilitatorConfig {
    /// Base URL, without a trailing path.
    pub url: String,
    /// Path layout of the facilitator.
    #[serde(default)]
    pub paths: FacilitatorPaths,
}

impl FacilitatorConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            paths: FacilitatorPaths::Root,
        }
    }

    pub fn with_paths(mut self, paths: FacilitatorPaths) -> Self {
        self.paths = paths;
        self
    }

    /// Builds a config by resolving the base URL from `explicit` and `env`.
    pub fn resolve(explicit: Option<&str>, env: &impl EnvSource) -> Self {
        Self::new(resolve_facilitator_url(
            explicit,
            env,
            FacilitatorEndpoint::Verify,
        ))
    }

    /// Full URL of the given endpoint.
    pub fn endpoint_url(&self, endpoint: FacilitatorEndpoint) -> String {
        format!(
            "{}{}",
            self.url.trim_end_matches('/'),
            self.paths.path(endpoint)
        )
    }
}

impl Default for FacilitatorConfig {
    fn default() -> Self {
        Self::new(DEFAULT_FACILITATOR_URL)
    }
}
