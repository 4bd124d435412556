//! Webhook payload signing (§4.5, §6.2, §9).
//!
//! Signatures are `HMAC-SHA256(secret, body)`, hex-encoded. New deployments
//! always emit the bare-hex form; `verify` accepts both the bare-hex form
//! and the historically-seen `sha256=<hex>` form so callers migrating off an
//! older signature convention don't need a flag day.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Sign `body` with `secret`, returning lowercase hex (no prefix).
pub fn sign(secret: &str, body: &[u8]) -> String {
    // Hmac::new_from_slice only fails for zero-length keys for some MAC
    // constructions; HMAC accepts any key length, so this cannot fail.
    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return String::new(),
    };
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Verify `signature` against `body` signed with `secret`.
///
/// Accepts both `<hex>` and `sha256=<hex>`. Comparison is constant-time.
pub fn verify(secret: &str, body: &[u8], signature: &str) -> bool {
    let candidate = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(given) = hex::decode(candidate) else {
        return false;
    };

    let mut mac = match HmacSha256::new_from_slice(secret.as_bytes()) {
        Ok(m) => m,
        Err(_) => return false,
    };
    mac.update(body);
    let expected = mac.finalize().into_bytes();

    expected.as_slice().ct_eq(&given).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_bare_hex() {
        let sig = sign("s3cr3t", b"{\"hello\":true}");
        assert!(verify("s3cr3t", b"{\"hello\":true}", &sig));
        assert!(!verify("other", b"{\"hello\":true}", &sig));
    }

    #[test]
    fn verify_accepts_sha256_prefix() {
        let sig = sign("s3cr3t", b"payload");
        let prefixed = format!("sha256={sig}");
        assert!(verify("s3cr3t", b"payload", &prefixed));
    }

    #[test]
    fn verify_rejects_tampered_body() {
        let sig = sign("s3cr3t", b"payload");
        assert!(!verify("s3cr3t", b"tampered", &sig));
    }

    #[test]
    fn verify_rejects_malformed_signature() {
        assert!(!verify("s3cr3t", b"payload", "not-hex-zzz"));
    }
}
