use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Largest decimals value whose scale still fits in a `u128`.
const MAX_DECIMALS: u8 = 38;

/// An unsigned token quantity in the smallest denomination.
///
/// Serialized as a decimal string so JSON consumers never lose precision.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenAmount(pub u128);

impl TokenAmount {
    pub const ZERO: TokenAmount = TokenAmount(0);

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn saturating_sub(self, other: TokenAmount) -> TokenAmount {
        TokenAmount(self.0.saturating_sub(other.0))
    }

    /// Render as a decimal string scaled by `decimals`.
    ///
    /// Trailing fractional zeros are trimmed but at least one fractional
    /// digit is kept, so `10^18` at 18 decimals renders as `"1.0"`.
    pub fn format_units(&self, decimals: u8) -> String {
        let decimals = decimals.min(MAX_DECIMALS);
        let scale = 10u128.pow(u32::from(decimals));
        let whole = self.0 / scale;
        let frac = self.0 % scale;

        let mut frac_digits = if decimals == 0 {
            String::new()
        } else {
            format!("{:0width$}", frac, width = usize::from(decimals))
        };
        while frac_digits.ends_with('0') {
            frac_digits.pop();
        }
        if frac_digits.is_empty() {
            frac_digits.push('0');
        }
        format!("{whole}.{frac_digits}")
    }
}

impl FromStr for TokenAmount {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u128>().map(TokenAmount)
    }
}

impl TryFrom<String> for TokenAmount {
    type Error = std::num::ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TokenAmount> for String {
    fn from(amount: TokenAmount) -> Self {
        amount.0.to_string()
    }
}

impl From<u128> for TokenAmount {
    fn from(value: u128) -> Self {
        TokenAmount(value)
    }
}

impl fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ONE_ETHER: u128 = 1_000_000_000_000_000_000;

    #[test]
    fn formats_whole_units_with_single_fraction_digit() {
        assert_eq!(TokenAmount(ONE_ETHER).format_units(18), "1.0");
        assert_eq!(TokenAmount(0).format_units(18), "0.0");
    }

    #[test]
    fn formats_fractional_units_without_trailing_zeros() {
        assert_eq!(TokenAmount(ONE_ETHER / 2).format_units(18), "0.5");
        assert_eq!(TokenAmount(1).format_units(18), "0.000000000000000001");
        assert_eq!(TokenAmount(12_345_000).format_units(6), "12.345");
    }

    #[test]
    fn zero_decimals_renders_integer() {
        assert_eq!(TokenAmount(42).format_units(0), "42.0");
    }

    #[test]
    fn oversized_decimals_are_clamped() {
        // Must not overflow the scale computation.
        let rendered = TokenAmount(u128::MAX).format_units(77);
        assert!(rendered.starts_with("3.4028"));
    }

    #[test]
    fn serializes_as_decimal_string() {
        let json = serde_json::to_string(&TokenAmount(ONE_ETHER)).unwrap();
        assert_eq!(json, "\"1000000000000000000\"");
        let back: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, TokenAmount(ONE_ETHER));
    }
}
