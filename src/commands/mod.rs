//! Provisioning commands. Each module is one CLI surface; the multi-step
//! ones drive [`crate::workflow::run_step`] so any of them can resume a
//! partially provisioned store.

pub mod extension;
pub mod org;
pub mod payments;
pub mod products;
pub mod search;
pub mod setup;
pub mod store;

use anyhow::{anyhow, bail, Result};

use crate::config::Config;
use crate::progress::ProgressStore;
use crate::record::{RecordApi, RecordId};
use crate::sfcli::{RetryPolicy, SfCli, SfCliError};
use crate::subprocess::SubprocessManager;

/// Error names the platform returns for transient community and store
/// operations; safe to re-attempt.
pub const TRANSIENT_ERROR_NAMES: &[&str] = &[
    "PleaseTryAgainError",
    "QueryTimeout",
    "OperationInProgress",
];

/// Shared handles for one provisioning run, scoped to a single
/// (hub, scratch org, store) triple.
pub struct ProvisionContext {
    pub cli: SfCli,
    pub progress: ProgressStore,
    pub hub_username: String,
    pub scratch_username: String,
    pub store_name: String,
    pub retry: RetryPolicy,
}

impl ProvisionContext {
    pub fn new(
        config: &Config,
        hub_username: String,
        scratch_username: String,
        store_name: String,
    ) -> Self {
        let cli = SfCli::new(SubprocessManager::production(), config.base_dir.clone());
        let progress = ProgressStore::new(
            config.status_file.clone(),
            &hub_username,
            &scratch_username,
            &store_name,
        )
        .with_lock_options(config.lock_options());
        Self {
            cli,
            progress,
            hub_username,
            scratch_username,
            store_name,
            retry: config.retry_policy(),
        }
    }

    pub fn from_parts(
        cli: SfCli,
        progress: ProgressStore,
        hub_username: String,
        scratch_username: String,
        store_name: String,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            cli,
            progress,
            hub_username,
            scratch_username,
            store_name,
            retry,
        }
    }

    pub fn records(&self) -> RecordApi {
        RecordApi::new(self.cli.clone(), self.scratch_username.clone())
    }

    /// The configured retry policy, narrowed to the transient error names.
    pub fn transient_retry(&self) -> RetryPolicy {
        self.retry
            .clone()
            .for_names(TRANSIENT_ERROR_NAMES.iter().copied())
    }
}

/// The buyer group a store's import publishes, derived from its name.
pub fn buyer_group_name(store_name: &str) -> String {
    format!("{store_name} Buyer Group")
}

/// Resolve a store id from an explicit id or a store name. The
/// missing-both case is rejected before any external call.
pub async fn resolve_store_id(
    records: &RecordApi,
    store_id: Option<&str>,
    store_name: Option<&str>,
) -> Result<String> {
    match (store_id, store_name) {
        (Some(id), _) => Ok(id.to_string()),
        (None, Some(name)) => {
            let record = records
                .query_single::<RecordId>(&format!(
                    "SELECT Id FROM WebStore WHERE Name='{name}'"
                ))
                .await?
                .ok_or_else(|| anyhow!("No WebStore named '{name}' in the target org"))?;
            Ok(record.id)
        }
        (None, None) => bail!("Either a store name or a store id must be supplied"),
    }
}

/// Whether an error is a structured CLI failure mentioning `needle` in
/// its name or message.
pub(crate) fn error_mentions(err: &anyhow::Error, needle: &str) -> bool {
    err.downcast_ref::<SfCliError>()
        .map(|e| e.mentions(needle))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[tokio::test]
    async fn test_resolve_store_id_requires_name_or_id() {
        // no expectations registered: any subprocess call would fail the
        // mock, proving validation happens before any external call
        let (subprocess, _mock) = SubprocessManager::mock();
        let cli = SfCli::new(subprocess, PathBuf::from("."));
        let records = RecordApi::new(cli, "admin@scratch.example");

        let err = resolve_store_id(&records, None, None).await.unwrap_err();
        assert!(err
            .to_string()
            .contains("Either a store name or a store id must be supplied"));
    }

    #[tokio::test]
    async fn test_resolve_store_id_prefers_explicit_id() {
        let (subprocess, _mock) = SubprocessManager::mock();
        let cli = SfCli::new(subprocess, PathBuf::from("."));
        let records = RecordApi::new(cli, "admin@scratch.example");

        let id = resolve_store_id(&records, Some("0ZE000123"), Some("Basket"))
            .await
            .unwrap();
        assert_eq!(id, "0ZE000123");
    }

    #[test]
    fn test_buyer_group_name_derivation() {
        assert_eq!(buyer_group_name("Basket"), "Basket Buyer Group");
    }
}
