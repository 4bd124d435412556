//! Bridges the `auth` module into axum handlers.

use axum::http::HeaderMap;
use chatgw_core::error::GatewayError;

use crate::app_state::AppState;
use crate::auth::{self, AuthContext};

pub fn require_auth(state: &AppState, headers: &HeaderMap) -> Result<AuthContext, GatewayError> {
    if !state.cfg().require_auth {
        return Ok(AuthContext::ApiKey);
    }
    let header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(GatewayError::Unauthorized)?;
    let bearer = header
        .strip_prefix("Bearer ")
        .ok_or(GatewayError::Unauthorized)?;
    auth::authenticate(&state.cfg().api_key, &state.cfg().jwt_secret, bearer)
}
