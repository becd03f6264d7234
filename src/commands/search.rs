//! Storefront search index builds.

use anyhow::Result;

use super::resolve_store_id;
use crate::record::RecordApi;
use crate::sfcli::{RetryPolicy, RunOptions, SfCli};

pub struct IndexSearch {
    pub store_name: Option<String>,
    pub store_id: Option<String>,
}

pub async fn run(
    cli: &SfCli,
    records: &RecordApi,
    target_username: &str,
    retry: RetryPolicy,
    cmd: &IndexSearch,
) -> Result<()> {
    let store_id = resolve_store_id(
        records,
        cmd.store_id.as_deref(),
        cmd.store_name.as_deref(),
    )
    .await?;
    start_index(cli, target_username, &store_id, retry).await?;
    println!("Search index build started for store {store_id}");
    Ok(())
}

/// Kick off an index build for the store. Re-running while a build is in
/// flight fails with `OperationInProgress`, which the transient retry
/// policy absorbs.
pub(crate) async fn start_index(
    cli: &SfCli,
    target_username: &str,
    store_id: &str,
    retry: RetryPolicy,
) -> Result<()> {
    let apex = format!(
        "ConnectApi.CommerceSearchSettings.createCommerceSearchIndex('{store_id}');"
    );
    let command = format!("sfdx force:apex:execute --targetusername {target_username}");
    cli.run_json_with(
        &command,
        RunOptions {
            stdin: Some(apex),
            ..Default::default()
        },
        retry,
    )
    .await?;
    Ok(())
}
