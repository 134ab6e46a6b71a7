//! Route pricing for the V1 Osmosis exact scheme.
//!
//! A [`RouteTable`] maps exact request paths to a [`RouteConfig`]. For every
//! guarded request the gate turns the matched route into fresh
//! [`PaymentRequirements`] with [`V1OsmosisExact::requirements`].
//!
//! # Example
//!
//! ```ignore
//! use x402_osmosis::v1_osmosis_exact::{RouteConfig, RouteTable, V1OsmosisExact};
//!
//! let routes = RouteTable::from_routes([
//!     ("/premium", RouteConfig::new("1000").with_description("Premium content")),
//! ])?;
//! let requirements = V1OsmosisExact::requirements(
//!     routes.get("/premium").unwrap(),
//!     "osmo1recipient...",
//!     "http://localhost:4021/premium",
//! );
//! ```

use std::collections::HashMap;
use std::fmt;

use serde::de::{MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

use crate::OSMOSIS_TESTNET;
use crate::v1_osmosis_exact::V1OsmosisExact;
use crate::v1_osmosis_exact::types::{ExactScheme, PaymentRequirements};

/// Description used when a route does not provide one.
pub const DEFAULT_DESCRIPTION: &str = "Access to protected resource";

/// MIME type used when a route does not provide one.
pub const DEFAULT_MIME_TYPE: &str = "application/json";

/// Payment deadline used when a route does not provide one.
pub const DEFAULT_MAX_TIMEOUT_SECONDS: u64 = 300;

/// Invalid route configuration, detected at setup time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RouteConfigError {
    #[error("route `{0}` is configured more than once")]
    DuplicateRoute(String),
    #[error("route `{0}` must start with '/'")]
    InvalidPath(String),
    #[error("route `{path}` has invalid price `{price}`: expected atomic units")]
    InvalidPrice { path: String, price: String },
}

/// Pricing for one guarded path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteConfig {
    /// Price in the network's smallest unit, as a decimal string.
    pub price: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<RouteDetails>,
}

/// Optional presentation details of a route.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout_seconds: Option<u64>,
}

impl RouteConfig {
    pub fn new(price: impl Into<String>) -> Self {
        Self {
            price: price.into(),
            network: None,
            config: None,
        }
    }

    pub fn with_network(mut self, network: impl Into<String>) -> Self {
        self.network = Some(network.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.details_mut().description = Some(description.into());
        self
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.details_mut().mime_type = Some(mime_type.into());
        self
    }

    pub fn with_output_schema(mut self, schema: serde_json::Value) -> Self {
        self.details_mut().output_schema = Some(schema);
        self
    }

    pub fn with_max_timeout_seconds(mut self, seconds: u64) -> Self {
        self.details_mut().max_timeout_seconds = Some(seconds);
        self
    }

    fn details_mut(&mut self) -> &mut RouteDetails {
        self.config.get_or_insert_with(RouteDetails::default)
    }

    fn validate(&self, path: &str) -> Result<(), RouteConfigError> {
        if !path.starts_with('/') {
            return Err(RouteConfigError::InvalidPath(path.to_string()));
        }
        if self.price.is_empty() || !self.price.bytes().all(|b| b.is_ascii_digit()) {
            return Err(RouteConfigError::InvalidPrice {
                path: path.to_string(),
                price: self.price.clone(),
            });
        }
        Ok(())
    }
}

/// Guarded paths and their pricing.
///
/// Matching is exact string equality on the request path: no prefixes,
/// patterns or trailing-slash folding. Paths are unique by construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RouteTable {
    routes: HashMap<String, RouteConfig>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table, failing on the first invalid or repeated path.
    pub fn from_routes<I, P>(routes: I) -> Result<Self, RouteConfigError>
    where
        I: IntoIterator<Item = (P, RouteConfig)>,
        P: Into<String>,
    {
        let mut table = Self::new();
        for (path, config) in routes {
            table.insert(path, config)?;
        }
        Ok(table)
    }

    /// Adds a route. Fails if the path is already configured or invalid.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        config: RouteConfig,
    ) -> Result<(), RouteConfigError> {
        let path = path.into();
        config.validate(&path)?;
        if self.routes.contains_key(&path) {
            return Err(RouteConfigError::DuplicateRoute(path));
        }
        self.routes.insert(path, config);
        Ok(())
    }

    /// Looks up the route for an exact request path.
    pub fn get(&self, path: &str) -> Option<&RouteConfig> {
        self.routes.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.routes.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RouteConfig)> {
        self.routes.iter().map(|(path, config)| (path.as_str(), config))
    }
}

impl<'de> Deserialize<'de> for RouteTable {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct RouteTableVisitor;

        impl<'de> Visitor<'de> for RouteTableVisitor {
            type Value = RouteTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of request paths to route configurations")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<RouteTable, A::Error> {
                let mut table = RouteTable::new();
                while let Some((path, config)) = map.next_entry::<String, RouteConfig>()? {
                    table.insert(path, config).map_err(serde::de::Error::custom)?;
                }
                Ok(table)
            }
        }

        deserializer.deserialize_map(RouteTableVisitor)
    }
}

impl V1OsmosisExact {
    /// Builds the requirements advertised for `route`.
    ///
    /// Missing or empty route details fall back to the defaults: network
    /// `osmo-test`, [`DEFAULT_DESCRIPTION`], [`DEFAULT_MIME_TYPE`] and
    /// [`DEFAULT_MAX_TIMEOUT_SECONDS`]. `extra` is always absent.
    pub fn requirements(route: &RouteConfig, pay_to: &str, resource: &str) -> PaymentRequirements {
        let details = route.config.clone().unwrap_or_default();
        let non_empty = |value: Option<String>| value.filter(|s| !s.is_empty());

        PaymentRequirements {
            scheme: ExactScheme.to_string(),
            network: non_empty(route.network.clone()).unwrap_or_else(|| OSMOSIS_TESTNET.to_string()),
            max_amount_required: route.price.clone(),
            resource: resource.to_string(),
            description: non_empty(details.description)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.to_string()),
            mime_type: non_empty(details.mime_type).unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            output_schema: details.output_schema.filter(|schema| !schema.is_null()),
            pay_to: pay_to.to_string(),
            max_timeout_seconds: details
                .max_timeout_seconds
                .filter(|&seconds| seconds > 0)
                .unwrap_or(DEFAULT_MAX_TIMEOUT_SECONDS),
            extra: None,
        }
    }
}
