use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Atomic units per XMR.
pub const ATOMIC_PER_XMR: u64 = 1_000_000_000_000;
const DECIMALS: usize = 12;

/// An XMR amount held as atomic units so comparisons are exact.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct XmrAmount(u64);

impl XmrAmount {
    pub const ZERO: XmrAmount = XmrAmount(0);

    pub const fn from_atomic(atomic: u64) -> Self {
        Self(atomic)
    }

    pub const fn atomic(self) -> u64 {
        self.0
    }

    /// Parse a decimal XMR string such as `"0.5"` or `"12.000000000001"`.
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = |reason| Error::InvalidAmount {
            input: input.to_string(),
            reason,
        };
        let trimmed = input.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));
        if whole.is_empty() && frac.is_empty() {
            return Err(invalid("empty"));
        }
        if !whole.bytes().chain(frac.bytes()).all(|b| b.is_ascii_digit()) {
            return Err(invalid("expected decimal digits"));
        }
        if frac.len() > DECIMALS {
            return Err(invalid("more than 12 fractional digits"));
        }

        let whole: u64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| invalid("too large"))?
        };
        let frac_atomic = if frac.is_empty() {
            0
        } else {
            // Right-pad to 12 digits; at most 12 digits always fits u64.
            let padded = format!("{frac:0<DECIMALS$}");
            padded.parse::<u64>().map_err(|_| invalid("too large"))?
        };

        whole
            .checked_mul(ATOMIC_PER_XMR)
            .and_then(|w| w.checked_add(frac_atomic))
            .map(Self)
            .ok_or_else(|| invalid("too large"))
    }

    /// Round a floating XMR value half-up to 12 decimal places.
    pub fn from_xmr_f64(xmr: f64) -> Result<Self> {
        let invalid = |reason| Error::InvalidAmount {
            input: xmr.to_string(),
            reason,
        };
        if !xmr.is_finite() || xmr < 0.0 {
            return Err(invalid("must be a finite non-negative number"));
        }
        let scaled = (xmr * ATOMIC_PER_XMR as f64).round();
        if scaled >= u64::MAX as f64 {
            return Err(invalid("too large"));
        }
        Ok(Self(scaled as u64))
    }
}

impl fmt::Display for XmrAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let whole = self.0 / ATOMIC_PER_XMR;
        let frac = self.0 % ATOMIC_PER_XMR;
        if frac == 0 {
            return write!(f, "{whole}");
        }
        let digits = format!("{frac:0DECIMALS$}");
        write!(f, "{whole}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for XmrAmount {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        XmrAmount::parse(s)
    }
}

impl From<u64> for XmrAmount {
    fn from(atomic: u64) -> Self {
        Self(atomic)
    }
}

/// `monero:` URI a wallet can scan, optionally carrying the requested amount.
pub fn payment_uri(address: &str, amount: Option<XmrAmount>) -> String {
    match amount {
        Some(amount) => format!("monero:{address}?tx_amount={amount}"),
        None => format!("monero:{address}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decimal_strings() {
        assert_eq!(XmrAmount::parse("1").unwrap().atomic(), ATOMIC_PER_XMR);
        assert_eq!(XmrAmount::parse("0.5").unwrap().atomic(), 500_000_000_000);
        assert_eq!(XmrAmount::parse(".25").unwrap().atomic(), 250_000_000_000);
        assert_eq!(XmrAmount::parse("3.").unwrap().atomic(), 3 * ATOMIC_PER_XMR);
        assert_eq!(
            XmrAmount::parse(" 12.000000000001 ").unwrap().atomic(),
            12 * ATOMIC_PER_XMR + 1
        );
    }

    #[test]
    fn rejects_malformed_amounts() {
        for bad in ["", ".", "abc", "-1", "1.2.3", "0.0000000000001", "1e3", "99999999"] {
            assert!(
                matches!(XmrAmount::parse(bad), Err(Error::InvalidAmount { .. })),
                "{bad:?}"
            );
        }
    }

    #[test]
    fn display_trims_trailing_zeros() {
        assert_eq!(XmrAmount::from_atomic(0).to_string(), "0");
        assert_eq!(XmrAmount::from_atomic(ATOMIC_PER_XMR * 2).to_string(), "2");
        assert_eq!(XmrAmount::from_atomic(1_500_000_000_000).to_string(), "1.5");
        assert_eq!(XmrAmount::from_atomic(1).to_string(), "0.000000000001");
    }

    #[test]
    fn float_conversion_rounds_half_up() {
        assert_eq!(
            XmrAmount::from_xmr_f64(0.123).unwrap(),
            XmrAmount::parse("0.123").unwrap()
        );
        assert_eq!(XmrAmount::from_xmr_f64(2.0).unwrap().atomic(), 2 * ATOMIC_PER_XMR);
        assert!(XmrAmount::from_xmr_f64(-1.0).is_err());
        assert!(XmrAmount::from_xmr_f64(f64::NAN).is_err());
    }

    #[test]
    fn float_rounding_does_not_break_exact_comparison() {
        // 0.1 + 0.2 != 0.3 as floats, but the atomic amounts agree.
        let sum = XmrAmount::from_xmr_f64(0.1 + 0.2).unwrap();
        assert_eq!(sum, XmrAmount::parse("0.3").unwrap());
    }

    #[test]
    fn payment_uri_carries_amount() {
        let amount = XmrAmount::parse("0.25").unwrap();
        assert_eq!(payment_uri("8Abc", Some(amount)), "monero:8Abc?tx_amount=0.25");
        assert_eq!(payment_uri("8Abc", None), "monero:8Abc");
    }
}
