//! Checkout extension providers: register an Apex implementation and map
//! it to a store.

use anyhow::{anyhow, Result};

use super::resolve_store_id;
use crate::record::{RecordApi, RecordId};

pub struct RegisterExtension {
    /// Developer name for the registered provider.
    pub name: String,
    /// Apex class implementing the extension point.
    pub apex_class: String,
    /// Extension point identifier, e.g. `Commerce_Domain_Pricing_Service`.
    pub extension_point: String,
}

pub struct MapExtension {
    pub name: String,
    pub store_name: Option<String>,
    pub store_id: Option<String>,
}

pub async fn register(records: &RecordApi, cmd: &RegisterExtension) -> Result<String> {
    let class = records
        .query_single::<RecordId>(&format!(
            "SELECT Id FROM ApexClass WHERE Name='{}'",
            cmd.apex_class
        ))
        .await?
        .ok_or_else(|| {
            anyhow!(
                "Apex class '{}' not found in the target org; push your sources first",
                cmd.apex_class
            )
        })?;

    let id = records
        .create(
            "RegisteredExternalService",
            &format!(
                "DeveloperName='{}' MasterLabel='{}' ExternalServiceProviderId='{}' ExternalServiceProviderType='Extension' ExtensionPointName='{}'",
                cmd.name, cmd.name, class.id, cmd.extension_point
            ),
        )
        .await?;
    tracing::info!("Registered extension '{}' as {id}", cmd.name);
    Ok(id)
}

pub async fn map(records: &RecordApi, cmd: &MapExtension) -> Result<String> {
    let store_id = resolve_store_id(
        records,
        cmd.store_id.as_deref(),
        cmd.store_name.as_deref(),
    )
    .await?;

    let service = records
        .query_single::<RecordId>(&format!(
            "SELECT Id FROM RegisteredExternalService WHERE DeveloperName='{}'",
            cmd.name
        ))
        .await?
        .ok_or_else(|| anyhow!("Extension '{}' is not registered", cmd.name))?;

    let id = records
        .create(
            "StoreIntegratedService",
            &format!("Integration='{}' StoreId='{store_id}'", service.id),
        )
        .await?;
    tracing::info!("Mapped extension '{}' to store {store_id}", cmd.name);
    Ok(id)
}
