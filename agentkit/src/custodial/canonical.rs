//! Canonical JSON and request signatures for the custodial API.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{Signature, SigningKey};
use p256::pkcs8::DecodePrivateKey;
use serde_json::Value;

use crate::wallet::WalletError;

/// Prefix the custodian puts in front of exported authorization keys.
pub const AUTHORIZATION_KEY_PREFIX: &str = "wallet-auth:";

/// Serialize `value` with object keys sorted recursively and no whitespace.
///
/// Two values that compare equal always produce identical text, regardless
/// of how their objects were built.
#[must_use]
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(value: &Value, out: &mut String) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (i, (key, item)) in entries.into_iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                out.push_str(&Value::String(key.clone()).to_string());
                out.push(':');
                write_canonical(item, out);
            }
            out.push('}');
        }
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        scalar => out.push_str(&scalar.to_string()),
    }
}

/// A P-256 key registered with the custodian to authorize wallet requests.
#[derive(Clone)]
pub struct AuthorizationKey {
    key: SigningKey,
    encoded: String,
}

impl fmt::Debug for AuthorizationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthorizationKey([REDACTED])")
    }
}

impl AuthorizationKey {
    /// Parse a base64 PKCS#8 key, with or without the `wallet-auth:` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`WalletError::Config`] if the key does not decode.
    pub fn parse(encoded: &str) -> Result<Self, WalletError> {
        let trimmed = encoded.trim();
        let body = trimmed
            .strip_prefix(AUTHORIZATION_KEY_PREFIX)
            .unwrap_or(trimmed);
        let der = STANDARD
            .decode(body)
            .map_err(|e| WalletError::config(format!("authorization key is not base64: {e}")))?;
        let key = SigningKey::from_pkcs8_der(&der)
            .map_err(|e| WalletError::config(format!("authorization key is not PKCS#8 P-256: {e}")))?;
        Ok(Self {
            key,
            encoded: trimmed.to_owned(),
        })
    }

    /// The key as it was supplied, for export.
    #[must_use]
    pub fn encoded(&self) -> &str {
        &self.encoded
    }

    /// Base64 DER ECDSA signature over SHA-256 of the canonical payload.
    #[must_use]
    pub fn sign(&self, payload: &Value) -> String {
        let canonical = canonicalize(payload);
        let signature: Signature = self.key.sign(canonical.as_bytes());
        STANDARD.encode(signature.to_der().as_bytes())
    }
}
