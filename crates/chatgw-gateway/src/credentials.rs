//! Credential Store (§4.1): crash-safe persistence of opaque per-tenant
//! credential bundles on the local filesystem.

use std::path::{Path, PathBuf};

use chatgw_core::error::{GatewayError, Result};
use chatgw_core::model::{CredentialBundle, Tenant};
use tokio::fs;

#[derive(Clone)]
pub struct CredentialStore {
    base_dir: PathBuf,
}

impl CredentialStore {
    /// Creates the base directory if missing. Failure here is fatal at
    /// process start (§4.1).
    pub async fn new(base_dir: impl Into<PathBuf>) -> Result<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)
            .await
            .map_err(|e| GatewayError::Internal(format!("create session dir failed: {e}")))?;
        Ok(Self { base_dir })
    }

    fn tenant_dir(&self, tenant_id: &str) -> Result<PathBuf> {
        if !Tenant::validate_id(tenant_id) {
            return Err(GatewayError::Validation(format!(
                "invalid tenant id: {tenant_id}"
            )));
        }
        Ok(self.base_dir.join(tenant_id))
    }

    fn bundle_path(dir: &Path) -> PathBuf {
        dir.join("credentials.bin")
    }

    pub async fn load(&self, tenant_id: &str) -> Result<Option<CredentialBundle>> {
        let path = Self::bundle_path(&self.tenant_dir(tenant_id)?);
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(CredentialBundle(bytes))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(GatewayError::Internal(format!(
                "read credentials failed: {e}"
            ))),
        }
    }

    /// Writes to a temp file then renames into place so a crash mid-write
    /// never leaves a half-written bundle (§4.1).
    pub async fn save(&self, tenant_id: &str, bundle: &CredentialBundle) -> Result<()> {
        let dir = self.tenant_dir(tenant_id)?;
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| GatewayError::Internal(format!("create tenant dir failed: {e}")))?;
        let final_path = Self::bundle_path(&dir);
        let tmp_path = dir.join(format!("credentials.bin.tmp-{}", std::process::id()));
        fs::write(&tmp_path, &bundle.0)
            .await
            .map_err(|e| GatewayError::Internal(format!("write credentials failed: {e}")))?;
        fs::rename(&tmp_path, &final_path)
            .await
            .map_err(|e| GatewayError::Internal(format!("rename credentials failed: {e}")))?;
        Ok(())
    }

    /// Removes the tenant's whole directory. Idempotent: a missing
    /// directory is not an error (§4.1).
    pub async fn purge(&self, tenant_id: &str) -> Result<()> {
        let dir = self.tenant_dir(tenant_id)?;
        match fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(GatewayError::Internal(format!("purge failed: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    async fn store() -> (CredentialStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = CredentialStore::new(dir.path()).await.expect("store");
        (store, dir)
    }

    #[tokio::test]
    async fn save_then_load_round_trips() {
        let (store, _dir) = store().await;
        store
            .save("acme", &CredentialBundle(b"secret-blob".to_vec()))
            .await
            .expect("save ok");
        let loaded = store.load("acme").await.expect("load ok").expect("present");
        assert_eq!(loaded.0, b"secret-blob");
    }

    #[tokio::test]
    async fn load_missing_tenant_is_none() {
        let (store, _dir) = store().await;
        assert!(store.load("nobody").await.expect("load ok").is_none());
    }

    #[tokio::test]
    async fn purge_is_idempotent() {
        let (store, _dir) = store().await;
        store
            .save("acme", &CredentialBundle(b"blob".to_vec()))
            .await
            .expect("save ok");
        store.purge("acme").await.expect("purge ok");
        store.purge("acme").await.expect("purge again ok");
        assert!(store.load("acme").await.expect("load ok").is_none());
    }

    #[tokio::test]
    async fn tenant_id_with_path_separator_is_rejected() {
        let (store, _dir) = store().await;
        let res = store.load("../etc").await;
        assert!(matches!(res, Err(GatewayError::Validation(_))));
    }
}
