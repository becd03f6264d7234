//! Payment gateway registration and store mapping.

use anyhow::{anyhow, Result};

use super::{error_mentions, resolve_store_id};
use crate::record::{RecordApi, RecordId};

pub struct SetupPayments {
    /// Gateway provider label, e.g. `Stripe`.
    pub provider: String,
    /// Apex gateway adapter class, deployed with the sources.
    pub apex_adapter: String,
    /// Developer name of an existing named credential for the merchant
    /// account.
    pub merchant_credential: String,
    pub store_name: Option<String>,
    pub store_id: Option<String>,
}

pub async fn run(records: &RecordApi, cmd: &SetupPayments) -> Result<()> {
    let store_id = resolve_store_id(
        records,
        cmd.store_id.as_deref(),
        cmd.store_name.as_deref(),
    )
    .await?;

    let adapter = records
        .query_single::<RecordId>(&format!(
            "SELECT Id FROM ApexClass WHERE Name='{}'",
            cmd.apex_adapter
        ))
        .await?
        .ok_or_else(|| {
            anyhow!(
                "Gateway adapter class '{}' not found; push your sources first",
                cmd.apex_adapter
            )
        })?;

    let credential = records
        .query_single::<RecordId>(&format!(
            "SELECT Id FROM NamedCredential WHERE DeveloperName='{}'",
            cmd.merchant_credential
        ))
        .await?
        .ok_or_else(|| {
            anyhow!(
                "Named credential '{}' not found; create it in Setup before wiring payments",
                cmd.merchant_credential
            )
        })?;

    let provider_id = create_or_reuse(
        records,
        "PaymentGatewayProvider",
        &format!(
            "DeveloperName='{}' MasterLabel='{}' ApexAdapterId='{}'",
            cmd.provider, cmd.provider, adapter.id
        ),
        &format!(
            "SELECT Id FROM PaymentGatewayProvider WHERE DeveloperName='{}'",
            cmd.provider
        ),
    )
    .await?;

    let gateway_id = create_or_reuse(
        records,
        "PaymentGateway",
        &format!(
            "PaymentGatewayName='{}' PaymentGatewayProviderId='{provider_id}' MerchantCredentialId='{}' Status='Active'",
            cmd.provider, credential.id
        ),
        &format!(
            "SELECT Id FROM PaymentGateway WHERE PaymentGatewayName='{}'",
            cmd.provider
        ),
    )
    .await?;

    create_or_reuse(
        records,
        "StoreIntegratedService",
        &format!("Integration='{gateway_id}' StoreId='{store_id}' ServiceProviderType='Payment'"),
        &format!(
            "SELECT Id FROM StoreIntegratedService WHERE StoreId='{store_id}' AND Integration='{gateway_id}'"
        ),
    )
    .await?;

    tracing::info!(
        "Payment gateway '{}' mapped to store {store_id}",
        cmd.provider
    );
    println!("Payment gateway '{}' is live on store {store_id}", cmd.provider);
    Ok(())
}

/// Create the record, or look up the existing one when the org reports a
/// duplicate. Every record here carries a uniqueness constraint, so the
/// lookup after a duplicate error cannot miss.
async fn create_or_reuse(
    records: &RecordApi,
    sobject: &str,
    values: &str,
    lookup_soql: &str,
) -> Result<String> {
    match records.create(sobject, values).await {
        Ok(id) => Ok(id),
        Err(err) if error_mentions(&err, "duplicate value") => {
            let existing = records
                .query_single::<RecordId>(lookup_soql)
                .await?
                .ok_or_else(|| anyhow!("{sobject} reported duplicate but none found"))?;
            tracing::info!("Reusing existing {sobject} {}", existing.id);
            Ok(existing.id)
        }
        Err(err) => Err(err),
    }
}
