//! Known Osmosis networks and their native denomination.

use crate::chain::TokenDenom;

/// Network identifier of Osmosis mainnet.
pub const OSMOSIS_MAINNET: &str = "osmosis";

/// Network identifier of the Osmosis testnet.
///
/// Routes that do not name a network are priced on this one.
pub const OSMOSIS_TESTNET: &str = "osmo-test";

/// Chain ID used when asking a wallet to sign for mainnet.
pub const OSMOSIS_MAINNET_CHAIN_ID: &str = "osmosis-1";

/// Chain ID used when asking a wallet to sign for the testnet.
pub const OSMOSIS_TESTNET_CHAIN_ID: &str = "osmo-test-5";

/// Trait providing convenient methods for well-known Osmosis networks.
///
/// # Example
///
/// ```
/// use x402_osmosis::{KnownNetworkOsmosis, OsmosisNetwork};
///
/// assert_eq!(OsmosisNetwork::osmosis_testnet().id, "osmo-test");
/// ```
pub trait KnownNetworkOsmosis<A> {
    /// Returns the instance for Osmosis mainnet.
    fn osmosis_mainnet() -> A;
    /// Returns the instance for the Osmosis testnet.
    fn osmosis_testnet() -> A;
}

/// A network identifier paired with the chain ID wallets sign for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OsmosisNetwork {
    /// Identifier carried in payment requirements and envelopes.
    pub id: &'static str,
    /// Cosmos chain ID.
    pub chain_id: &'static str,
}

impl OsmosisNetwork {
    /// Looks up a known network by its identifier. Comparison is exact.
    pub fn from_id(id: &str) -> Option<Self> {
        match id {
            OSMOSIS_MAINNET => Some(Self::osmosis_mainnet()),
            OSMOSIS_TESTNET => Some(Self::osmosis_testnet()),
            _ => None,
        }
    }
}

impl KnownNetworkOsmosis<OsmosisNetwork> for OsmosisNetwork {
    fn osmosis_mainnet() -> OsmosisNetwork {
        OsmosisNetwork {
            id: OSMOSIS_MAINNET,
            chain_id: OSMOSIS_MAINNET_CHAIN_ID,
        }
    }

    fn osmosis_testnet() -> OsmosisNetwork {
        OsmosisNetwork {
            id: OSMOSIS_TESTNET,
            chain_id: OSMOSIS_TESTNET_CHAIN_ID,
        }
    }
}

/// Marker type for the native OSMO token.
pub struct Osmo;

impl KnownNetworkOsmosis<TokenDenom> for Osmo {
    fn osmosis_mainnet() -> TokenDenom {
        TokenDenom::new("uosmo", 6)
    }

    fn osmosis_testnet() -> TokenDenom {
        TokenDenom::new("uosmo", 6)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_network_lookup_is_exact() {
        assert_eq!(OsmosisNetwork::from_id("osmosis").unwrap().chain_id, "osmosis-1");
        assert_eq!(OsmosisNetwork::from_id("osmo-test").unwrap().chain_id, "osmo-test-5");
        assert!(OsmosisNetwork::from_id("Osmosis").is_none());
        assert!(OsmosisNetwork::from_id("osmo-test-5").is_none());
    }

    #[test]
    fn test_osmo_denom() {
        let osmo = Osmo::osmosis_testnet();
        assert_eq!(osmo.denom, "uosmo");
        assert_eq!(osmo.parse("2").unwrap().amount, 2_000_000);
    }
}
