//! Wire format types for Osmosis chain values.
//!
//! Cosmos SDK chains express value as a list of [`Coin`]s: a denomination
//! string paired with an integer amount in that denomination's smallest unit.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{Display, Formatter};

// ============================================================================
// Coin
// ============================================================================

/// A Cosmos SDK coin: an amount in the smallest unit of `denom`.
///
/// The amount is serialized as a decimal string, matching the amino JSON
/// encoding wallets sign over.
///
/// # Example
///
/// ```
/// use x402_osmosis::chain::Coin;
///
/// let coin = Coin::new("uosmo", 1_000);
/// let json = serde_json::to_string(&coin).unwrap();
/// assert_eq!(json, r#"{"denom":"uosmo","amount":"1000"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    /// Denomination, e.g. `uosmo` or an `ibc/...` hash.
    pub denom: String,
    /// Amount in the denomination's smallest unit.
    #[serde(with = "amount_string")]
    pub amount: u128,
}

impl Coin {
    pub fn new(denom: impl Into<String>, amount: u128) -> Self {
        Self {
            denom: denom.into(),
            amount,
        }
    }
}

impl Display for Coin {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.amount, self.denom)
    }
}

mod amount_string {
    use super::*;

    pub fn serialize<S: Serializer>(amount: &u128, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&amount.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// TokenDenom
// ============================================================================

/// A denomination together with the number of decimals used for display.
///
/// Route prices are configured in atomic units, but operators often think in
/// whole tokens; [`TokenDenom::parse`] bridges the two.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenDenom {
    /// The on-chain denomination.
    pub denom: String,
    /// Number of decimal places between the display unit and the atomic unit.
    pub decimals: u8,
}

impl TokenDenom {
    pub fn new(denom: impl Into<String>, decimals: u8) -> Self {
        Self {
            denom: denom.into(),
            decimals,
        }
    }

    /// Creates a coin from an amount already in atomic units.
    pub fn amount(&self, v: u128) -> Coin {
        Coin::new(self.denom.clone(), v)
    }

    /// Parses a human-readable amount string into atomic units.
    ///
    /// Accepts formats like `"10.50"` or `"1000"`. The amount is scaled by
    /// the denomination's decimal places.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a plain decimal number, carries
    /// more fractional digits than the denomination supports, or overflows.
    pub fn parse(&self, v: &str) -> Result<Coin, DenomAmountParseError> {
        let (whole, frac) = match v.split_once('.') {
            None => (v, ""),
            Some((whole, frac)) if !frac.contains('.') => (whole, frac),
            Some(_) => return Err(DenomAmountParseError::InvalidFormat(v.to_string())),
        };
        if whole.is_empty() && frac.is_empty() {
            return Err(DenomAmountParseError::InvalidFormat(v.to_string()));
        }
        if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
            return Err(DenomAmountParseError::InvalidFormat(v.to_string()));
        }

        let frac_len = frac.len() as u32;
        if frac_len > self.decimals as u32 {
            return Err(DenomAmountParseError::TooManyDecimals {
                got: frac_len,
                max: self.decimals,
            });
        }

        let whole_val: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| DenomAmountParseError::Overflow)?
        };
        let frac_val: u128 = if frac.is_empty() {
            0
        } else {
            frac.parse().map_err(|_| DenomAmountParseError::Overflow)?
        };

        let scale = 10u128
            .checked_pow(u32::from(self.decimals))
            .ok_or(DenomAmountParseError::Overflow)?;
        let frac_scale = 10u128
            .checked_pow(u32::from(self.decimals) - frac_len)
            .ok_or(DenomAmountParseError::Overflow)?;

        let total = whole_val
            .checked_mul(scale)
            .and_then(|w| w.checked_add(frac_val.checked_mul(frac_scale)?))
            .ok_or(DenomAmountParseError::Overflow)?;

        Ok(self.amount(total))
    }
}

/// Error returned when parsing a token amount.
#[derive(Debug, thiserror::Error)]
pub enum DenomAmountParseError {
    /// The input string is not a valid number.
    #[error("Invalid amount format: {0}")]
    InvalidFormat(String),
    /// Too many decimal places for the denomination.
    #[error("Too many decimal places: got {got}, max {max}")]
    TooManyDecimals { got: u32, max: u8 },
    /// The resulting amount overflows u128.
    #[error("Amount overflow")]
    Overflow,
}

// ============================================================================
// Tests
// ============================================================================
