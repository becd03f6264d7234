//! Typed record CRUD over the platform CLI's `force:data` subcommands.

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::sfcli::{RetryPolicy, SfCli};

/// Envelope of a SOQL query, as returned under the CLI's `result` key.
#[derive(Debug, Clone, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct QueryResult<T> {
    #[serde(rename = "totalSize")]
    pub total_size: u64,
    pub done: bool,
    #[serde(default)]
    pub records: Vec<T>,
}

/// A bare record id, for queries that only need `Id`.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordId {
    #[serde(rename = "Id")]
    pub id: String,
}

/// Record operations against one target org.
#[derive(Clone)]
pub struct RecordApi {
    cli: SfCli,
    username: String,
}

impl RecordApi {
    pub fn new(cli: SfCli, username: impl Into<String>) -> Self {
        Self {
            cli,
            username: username.into(),
        }
    }

    pub async fn query<T: DeserializeOwned>(&self, soql: &str) -> Result<QueryResult<T>> {
        let command = format!(
            "sfdx force:data:soql:query --query \"{}\" --targetusername {}",
            soql, self.username
        );
        let result = self.cli.run_json(&command, RetryPolicy::none()).await?;
        let payload = result
            .result()
            .cloned()
            .ok_or_else(|| anyhow!("Query returned no result payload: {}", result.raw.trim()))?;
        serde_json::from_value(payload)
            .with_context(|| format!("Failed to deserialize query result for: {soql}"))
    }

    pub async fn query_single<T: DeserializeOwned>(&self, soql: &str) -> Result<Option<T>> {
        let mut result = self.query::<T>(soql).await?;
        Ok(if result.records.is_empty() {
            None
        } else {
            Some(result.records.remove(0))
        })
    }

    /// Create a record and return its id. `values` uses the CLI's
    /// field-assignment syntax, e.g. `Name='Widget' IsActive=true`.
    pub async fn create(&self, sobject: &str, values: &str) -> Result<String> {
        let command = format!(
            "sfdx force:data:record:create --sobjecttype {} --values \"{}\" --targetusername {}",
            sobject, values, self.username
        );
        let result = self.cli.run_json(&command, RetryPolicy::none()).await?;
        result
            .record_id()
            .map(ToString::to_string)
            .ok_or_else(|| {
                anyhow!(
                    "Record create for {} returned no id: {}",
                    sobject,
                    result.raw.trim()
                )
            })
    }

    pub async fn update(&self, sobject: &str, record_id: &str, values: &str) -> Result<()> {
        let command = format!(
            "sfdx force:data:record:update --sobjecttype {} --sobjectid {} --values \"{}\" --targetusername {}",
            sobject, record_id, values, self.username
        );
        self.cli.run_json(&command, RetryPolicy::none()).await?;
        Ok(())
    }

    pub async fn delete(&self, sobject: &str, record_id: &str) -> Result<()> {
        let command = format!(
            "sfdx force:data:record:delete --sobjecttype {} --sobjectid {} --targetusername {}",
            sobject, record_id, self.username
        );
        self.cli.run_json(&command, RetryPolicy::none()).await?;
        Ok(())
    }
}
