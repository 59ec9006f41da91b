use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::canonical::{encode, ParamSet};

type HmacSha512 = Hmac<Sha512>;

#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    #[error("missing signature")] Missing,
    #[error("invalid signature")] Invalid,
    #[error("signing key rejected")] Key,
}

/// Lowercase hex HMAC-SHA512 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature(String);

impl Signature {
    pub fn as_str(&self) -> &str { &self.0 }

    /// Constant-time comparison against a signature supplied by the gateway.
    pub fn matches(&self, supplied: &str) -> bool {
        self.0.as_bytes().ct_eq(supplied.as_bytes()).into()
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Signature {
    fn as_ref(&self) -> &str { &self.0 }
}

pub fn sign(payload: &str, secret: &str) -> Result<Signature, SignatureError> {
    let mut mac = HmacSha512::new_from_slice(secret.as_bytes()).map_err(|_| SignatureError::Key)?;
    mac.update(payload.as_bytes());
    Ok(Signature(hex::encode(mac.finalize().into_bytes())))
}

/// Canonicalize `params` and sign the result.
pub fn sign_params(params: &ParamSet, secret: &str) -> Result<Signature, SignatureError> {
    let canonical = encode(params);
    tracing::debug!(payload_len = canonical.len(), "signing canonical payload");
    sign(&canonical, secret)
}

/// Check `sig` against the parameters it claims to cover. `params` must
/// already have the signature fields removed.
pub fn verify_signature(
    params: &ParamSet,
    sig: &str,
    secret: &str,
) -> Result<(), SignatureError> {
    if sig.is_empty() { return Err(SignatureError::Missing); }

    let expected = sign_params(params, secret)?;
    if expected.matches(sig) { Ok(()) } else { Err(SignatureError::Invalid) }
}
