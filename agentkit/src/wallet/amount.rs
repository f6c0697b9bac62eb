//! Conversion of human-readable amounts into smallest on-chain units.

use alloy::primitives::U256;
use alloy::primitives::utils::{ParseUnits, parse_units};

use super::WalletError;

/// Decimals of ether (wei per ETH = 10^18).
pub const EVM_DECIMALS: u8 = 18;

/// Decimals of SOL (lamports per SOL = 10^9).
pub const SVM_DECIMALS: u8 = 9;

/// Parse a decimal amount in whole units into the smallest unit.
///
/// `"1.5"` with 18 decimals yields `1_500_000_000_000_000_000`.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] for empty, negative, malformed, or
/// over-precise amounts.
pub fn parse_amount(amount: &str, decimals: u8) -> Result<U256, WalletError> {
    let trimmed = amount.trim();
    if trimmed.is_empty() {
        return Err(WalletError::invalid_argument("amount is empty"));
    }
    if trimmed.starts_with('-') {
        return Err(WalletError::invalid_argument(format!(
            "amount '{amount}' is negative"
        )));
    }
    if let Some((_, frac)) = trimmed.split_once('.')
        && frac.len() > usize::from(decimals)
    {
        return Err(WalletError::invalid_argument(format!(
            "amount '{amount}' has more than {decimals} decimal places"
        )));
    }

    match parse_units(trimmed, decimals) {
        Ok(ParseUnits::U256(value)) => Ok(value),
        Ok(ParseUnits::I256(_)) => Err(WalletError::invalid_argument(format!(
            "amount '{amount}' is negative"
        ))),
        Err(e) => Err(WalletError::invalid_argument(format!(
            "invalid amount '{amount}': {e}"
        ))),
    }
}

/// Parse a decimal SOL amount into lamports.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] if the amount is malformed or does
/// not fit in a `u64`.
pub fn parse_lamports(amount: &str) -> Result<u64, WalletError> {
    let value = parse_amount(amount, SVM_DECIMALS)?;
    u64::try_from(value)
        .map_err(|_| WalletError::invalid_argument(format!("amount '{amount}' is too large")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_whole_and_fractional_ether() {
        assert_eq!(
            parse_amount("1.5", EVM_DECIMALS).unwrap(),
            U256::from(1_500_000_000_000_000_000_u128)
        );
        assert_eq!(
            parse_amount("0.000000000000001", EVM_DECIMALS).unwrap(),
            U256::from(1000)
        );
    }

    #[test]
    fn parses_lamports() {
        assert_eq!(parse_lamports("0.5").unwrap(), 500_000_000);
        assert_eq!(parse_lamports("2").unwrap(), 2_000_000_000);
    }

    #[test]
    fn rejects_bad_amounts() {
        for bad in ["", "  ", "-1", "abc", "1.2.3"] {
            assert!(
                matches!(parse_amount(bad, EVM_DECIMALS), Err(WalletError::InvalidArgument(_))),
                "{bad} should be rejected"
            );
        }
        assert!(parse_lamports("0.0000000001").is_err());
    }
}
