//! Authentication (§9): exactly two modes — a shared API key with tenant
//! resolved from `X-Tenant-ID`/path, or a signed tenant-registry token.
//! There is no unverified identity-token decoding; a token that doesn't
//! verify is rejected outright.

use base64::Engine;
use chatgw_core::error::GatewayError;
use chatgw_core::signing;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

/// What the `Authorization: Bearer <token>` header granted.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// The shared `API_KEY` was presented; caller may act on any tenant,
    /// resolved separately from `X-Tenant-ID` or the path.
    ApiKey,
    /// A signed tenant-registry token scoped to one tenant.
    Token(TenantToken),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantToken {
    pub tenant_id: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
}

const TOKEN_TYPE: &str = "tenant_access";

/// Mints a signed token. Not exposed over HTTP by this gateway — used by
/// whatever external system issues tenant-registry tokens, and by tests.
pub fn issue_token(secret: &str, tenant_id: &str, permissions: Vec<String>) -> String {
    let claims = TenantToken {
        tenant_id: tenant_id.to_string(),
        permissions,
        kind: TOKEN_TYPE.to_string(),
    };
    let claims_json = serde_json::to_vec(&claims).unwrap_or_default();
    let claims_b64 = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(&claims_json);
    let sig = signing::sign(secret, claims_json.as_slice());
    format!("{claims_b64}.{sig}")
}

fn verify_token(secret: &str, token: &str) -> Option<TenantToken> {
    let (claims_b64, sig) = token.split_once('.')?;
    let claims_json = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(claims_b64)
        .ok()?;
    if !signing::verify(secret, &claims_json, sig) {
        return None;
    }
    let claims: TenantToken = serde_json::from_slice(&claims_json).ok()?;
    if claims.kind != TOKEN_TYPE {
        return None;
    }
    Some(claims)
}

/// Authenticates a bearer credential against either mode.
pub fn authenticate(api_key: &str, jwt_secret: &str, bearer: &str) -> Result<AuthContext, GatewayError> {
    if constant_time_eq(bearer, api_key) {
        return Ok(AuthContext::ApiKey);
    }
    if let Some(claims) = verify_token(jwt_secret, bearer) {
        return Ok(AuthContext::Token(claims));
    }
    Err(GatewayError::Unauthorized)
}

/// Confirms `tenant_id` is the one the caller is authorized to act on.
pub fn authorize_tenant(ctx: &AuthContext, tenant_id: &str) -> Result<(), GatewayError> {
    match ctx {
        AuthContext::ApiKey => Ok(()),
        AuthContext::Token(claims) if claims.tenant_id == tenant_id => Ok(()),
        AuthContext::Token(_) => Err(GatewayError::Forbidden(
            "token is not scoped to this tenant".into(),
        )),
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn api_key_bearer_grants_api_key_context() {
        let ctx = authenticate("my-api-key-0123456789", "x".repeat(32).as_str(), "my-api-key-0123456789")
            .expect("authenticated");
        assert!(matches!(ctx, AuthContext::ApiKey));
    }

    #[test]
    fn valid_token_grants_scoped_context() {
        let secret = "s".repeat(32);
        let token = issue_token(&secret, "acme", vec!["send".into()]);
        let ctx = authenticate("my-api-key-0123456789", &secret, &token).expect("authenticated");
        match ctx {
            AuthContext::Token(claims) => assert_eq!(claims.tenant_id, "acme"),
            AuthContext::ApiKey => panic!("expected token context"),
        }
    }

    #[test]
    fn tampered_token_is_rejected() {
        let secret = "s".repeat(32);
        let mut token = issue_token(&secret, "acme", vec![]);
        token.push('x');
        let res = authenticate("my-api-key-0123456789", &secret, &token);
        assert!(matches!(res, Err(GatewayError::Unauthorized)));
    }

    #[test]
    fn token_scoped_to_other_tenant_is_forbidden() {
        let secret = "s".repeat(32);
        let token = issue_token(&secret, "acme", vec![]);
        let ctx = authenticate("my-api-key-0123456789", &secret, &token).expect("authenticated");
        assert!(authorize_tenant(&ctx, "acme").is_ok());
        assert!(matches!(
            authorize_tenant(&ctx, "other"),
            Err(GatewayError::Forbidden(_))
        ));
    }
}
