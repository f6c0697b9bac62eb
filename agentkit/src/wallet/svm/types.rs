//! Fixed-size base58 values: public keys, signatures, and blockhashes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::wallet::WalletError;

macro_rules! base58_value {
    ($(#[$meta:meta])* $name:ident, $len:expr, $what:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Byte length.
            pub const LEN: usize = $len;

            /// Wrap raw bytes.
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// The raw bytes.
            #[must_use]
            pub const fn to_bytes(&self) -> [u8; $len] {
                self.0
            }

            /// Parse from a byte slice of exactly [`Self::LEN`] bytes.
            ///
            /// # Errors
            ///
            /// Returns [`WalletError::InvalidArgument`] on a length mismatch.
            pub fn try_from_slice(bytes: &[u8]) -> Result<Self, WalletError> {
                <[u8; $len]>::try_from(bytes).map(Self).map_err(|_| {
                    WalletError::invalid_argument(format!(
                        "{} must be {} bytes, got {}",
                        $what,
                        $len,
                        bytes.len()
                    ))
                })
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self([0; $len])
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl FromStr for $name {
            type Err = WalletError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let bytes = bs58::decode(s.trim()).into_vec().map_err(|e| {
                    WalletError::invalid_argument(format!("invalid {} '{s}': {e}", $what))
                })?;
                Self::try_from_slice(&bytes)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&bs58::encode(self.0).into_string())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

base58_value!(
    /// An ed25519 public key, which is also an account address.
    Pubkey,
    32,
    "public key"
);

base58_value!(
    /// An ed25519 transaction signature, which is also the transaction id.
    Signature,
    64,
    "signature"
);

base58_value!(
    /// A blockhash.
    Hash,
    32,
    "blockhash"
);

/// Parse a destination address, rejecting anything that is not a 32-byte
/// base58 key.
///
/// # Errors
///
/// Returns [`WalletError::InvalidArgument`] describing the problem.
pub fn parse_pubkey(address: &str) -> Result<Pubkey, WalletError> {
    address.parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_program_is_all_ones_in_base58() {
        assert_eq!(Pubkey::default().to_string(), "11111111111111111111111111111111");
        assert_eq!(
            "11111111111111111111111111111111".parse::<Pubkey>().unwrap(),
            Pubkey::default()
        );
    }

    #[test]
    fn rejects_wrong_length_and_alphabet() {
        // 0, O, I and l are outside the base58 alphabet.
        assert!(parse_pubkey("0x5154eae861cac3aa757d6016babaf972341354cf").is_err());
        assert!(parse_pubkey("abc").is_err());
        assert!(matches!(
            "5eykt4UsFv8P8NJdTREpY1vzqKqZKvdpKuc147dw2N9d".parse::<Signature>(),
            Err(WalletError::InvalidArgument(_))
        ));
    }

    #[test]
    fn serde_uses_base58_strings() {
        let hash: Hash =
            serde_json::from_str("\"EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG\"").unwrap();
        assert_eq!(
            serde_json::to_string(&hash).unwrap(),
            "\"EtWTRABZaYq6iMfeYKouRu166VU2xqa1wcaWoxPkrZBG\""
        );
    }
}
