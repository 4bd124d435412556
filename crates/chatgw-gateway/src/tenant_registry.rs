//! Tenant registry: the external system of record for tenants is out of
//! scope (§1). This is the trivial trait + in-memory implementation that
//! stands in for it.

use chatgw_core::error::{GatewayError, Result};
use chatgw_core::model::{Tenant, TenantConfig, TenantStatus};
use dashmap::DashMap;

pub trait TenantRegistry: Send + Sync {
    fn get(&self, tenant_id: &str) -> Result<Tenant>;
    fn upsert(&self, tenant: Tenant);
}

#[derive(Default)]
pub struct InMemoryTenantRegistry {
    tenants: DashMap<String, Tenant>,
}

impl InMemoryTenantRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TenantRegistry for InMemoryTenantRegistry {
    /// Unknown tenants are treated as implicitly active (development
    /// convenience, not a spec requirement — a real registry would be
    /// authoritative and return `NotFound`).
    fn get(&self, tenant_id: &str) -> Result<Tenant> {
        if !Tenant::validate_id(tenant_id) {
            return Err(GatewayError::Validation(format!(
                "invalid tenant id: {tenant_id}"
            )));
        }
        if let Some(t) = self.tenants.get(tenant_id) {
            return Ok(t.clone());
        }
        Ok(Tenant {
            id: tenant_id.to_string(),
            status: TenantStatus::Active,
            config: TenantConfig {
                max_sessions: 1,
                rate_limit: None,
            },
        })
    }

    fn upsert(&self, tenant: Tenant) {
        self.tenants.insert(tenant.id.clone(), tenant);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn unknown_tenant_defaults_to_active() {
        let reg = InMemoryTenantRegistry::new();
        let t = reg.get("acme").expect("valid id");
        assert_eq!(t.status, TenantStatus::Active);
    }

    #[test]
    fn upserted_tenant_is_returned() {
        let reg = InMemoryTenantRegistry::new();
        reg.upsert(Tenant {
            id: "acme".into(),
            status: TenantStatus::Suspended,
            config: TenantConfig {
                max_sessions: 1,
                rate_limit: None,
            },
        });
        let t = reg.get("acme").expect("valid id");
        assert_eq!(t.status, TenantStatus::Suspended);
    }
}
