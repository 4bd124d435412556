#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::collections::HashMap;

use chatgw_gateway::config::schema::from_map;

fn base_vars() -> HashMap<String, String> {
    let mut m = HashMap::new();
    m.insert("JWT_SECRET".into(), "x".repeat(32));
    m.insert("API_KEY".into(), "y".repeat(16));
    m
}

#[test]
fn short_api_key_is_rejected() {
    let mut vars = base_vars();
    vars.insert("API_KEY".into(), "short".into());
    let err = from_map(&vars).expect_err("must fail");
    assert_eq!(err.client_code().as_str(), "VALIDATION_ERROR");
}

#[test]
fn production_env_enforces_longer_jwt_secret() {
    let mut vars = base_vars();
    vars.insert("APP_ENV".into(), "production".into());
    assert!(from_map(&vars).is_err());

    vars.insert("JWT_SECRET".into(), "z".repeat(64));
    let cfg = from_map(&vars).expect("must parse");
    assert_eq!(cfg.listen_addr(), "0.0.0.0:8080");
}

#[test]
fn unknown_app_env_is_rejected() {
    let mut vars = base_vars();
    vars.insert("APP_ENV".into(), "bogus".into());
    assert!(from_map(&vars).is_err());
}

#[test]
fn overridden_port_and_host_are_reflected_in_listen_addr() {
    let mut vars = base_vars();
    vars.insert("HOST".into(), "127.0.0.1".into());
    vars.insert("PORT".into(), "9090".into());
    let cfg = from_map(&vars).expect("must parse");
    assert_eq!(cfg.listen_addr(), "127.0.0.1:9090");
}
