//! Gateway config loader: environment-variable driven, validated eagerly
//! and fatal on error at startup (§6.4).

pub mod schema;

use std::collections::HashMap;

use chatgw_core::error::Result;

pub use schema::{AllowedOrigins, AppEnv, GatewayConfig};

/// Load configuration from the process environment.
pub fn from_env() -> Result<GatewayConfig> {
    let vars: HashMap<String, String> = std::env::vars().collect();
    schema::from_map(&vars)
}
