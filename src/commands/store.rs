//! The flagship workflow: create a storefront community, push sources,
//! import products, wire up a buyer, and publish.

use anyhow::{anyhow, bail, Result};
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;

use super::{error_mentions, products, search, ProvisionContext};
use crate::progress::StepValue;
use crate::record::RecordId;
use crate::workflow::{await_value, run_step};

pub const STEP_COMMUNITY_CREATED: &str = "community created";
pub const STEP_SOURCES_PUSHED: &str = "sources pushed";
pub const STEP_SETTINGS_UPDATED: &str = "store settings updated";
pub const STEP_INDEX_CREATED: &str = "search index created";
pub const STEP_BUYER_CREATED: &str = "buyer user created";
pub const STEP_GUEST_BROWSING: &str = "guest browsing enabled";
pub const STEP_PUBLISHED: &str = "community published";

// Community creation is asynchronous server-side; the WebStore record
// appears some time after the create call returns.
const COMMUNITY_POLL_ATTEMPTS: u32 = 60;
const COMMUNITY_POLL_DELAY: Duration = Duration::from_secs(10);

const BUYER_GROUP_POLL: Duration = Duration::from_secs(5);
const BUYER_GROUP_MAX_WAIT: Duration = Duration::from_secs(600);

pub struct CreateStore {
    pub template: String,
    pub url_prefix: Option<String>,
    pub products_csv: Option<PathBuf>,
    pub buyer_username: String,
    pub buyer_alias: String,
}

pub async fn run(ctx: &ProvisionContext, cmd: &CreateStore) -> Result<()> {
    let webstore_id = create_community(ctx, cmd).await?;
    push_sources(ctx).await?;
    update_store_settings(ctx, &webstore_id).await?;
    create_search_index(ctx, &webstore_id).await?;
    products::import_products(ctx, cmd.products_csv.as_deref()).await?;
    create_buyer_user(ctx, cmd).await?;
    enable_guest_browsing(ctx, &webstore_id).await?;
    let url = publish_community(ctx).await?;

    tracing::info!("Store '{}' provisioned", ctx.store_name);
    println!("Storefront URL: {url}");
    Ok(())
}

/// Create the storefront community and record the WebStore id it spawns.
/// A name collision from an earlier interrupted run counts as created.
pub async fn create_community(ctx: &ProvisionContext, cmd: &CreateStore) -> Result<String> {
    let retry = ctx.transient_retry();
    let prefix = cmd
        .url_prefix
        .clone()
        .unwrap_or_else(|| default_url_prefix(&ctx.store_name));
    let command = format!(
        "sfdx force:community:create --name \"{}\" --templatename \"{}\" --urlpathprefix {} --targetusername {}",
        ctx.store_name, cmd.template, prefix, ctx.scratch_username,
    );

    let value = run_step(&ctx.progress, STEP_COMMUNITY_CREATED, || async move {
        match ctx.cli.run_json(&command, retry).await {
            Ok(_) => {}
            Err(err) => {
                let err = err.into();
                if error_mentions(&err, "duplicate value")
                    || error_mentions(&err, "already exists")
                {
                    tracing::info!("Community '{}' already exists", ctx.store_name);
                } else {
                    return Err(err);
                }
            }
        }

        let records = ctx.records();
        let soql = format!("SELECT Id FROM WebStore WHERE Name='{}'", ctx.store_name);
        for _ in 0..COMMUNITY_POLL_ATTEMPTS {
            if let Some(record) = records.query_single::<RecordId>(&soql).await? {
                return Ok(StepValue::Value(record.id));
            }
            tokio::time::sleep(COMMUNITY_POLL_DELAY).await;
        }
        bail!(
            "WebStore record for '{}' did not appear after community creation",
            ctx.store_name
        )
    })
    .await?;

    value
        .as_str()
        .map(ToString::to_string)
        .ok_or_else(|| anyhow!("Step '{STEP_COMMUNITY_CREATED}' did not record a store id"))
}

/// Push the converted example sources to the scratch org. Deploys are
/// the flakiest remote operation, so any structured failure is retried
/// up to the configured budget.
pub async fn push_sources(ctx: &ProvisionContext) -> Result<StepValue> {
    let retry = ctx.retry.clone();
    let command = format!(
        "sfdx force:source:push --forceoverwrite --targetusername {}",
        ctx.scratch_username
    );

    run_step(&ctx.progress, STEP_SOURCES_PUSHED, || async move {
        ctx.cli.run_json(&command, retry).await?;
        Ok(StepValue::Done)
    })
    .await
}

async fn update_store_settings(ctx: &ProvisionContext, webstore_id: &str) -> Result<StepValue> {
    let records = ctx.records();
    let id = webstore_id.to_string();

    run_step(&ctx.progress, STEP_SETTINGS_UPDATED, || async move {
        records
            .update(
                "WebStore",
                &id,
                "SupportedLanguages='en_US' DefaultLanguage='en_US'",
            )
            .await?;
        Ok(StepValue::Done)
    })
    .await
}

async fn create_search_index(ctx: &ProvisionContext, webstore_id: &str) -> Result<StepValue> {
    let retry = ctx.transient_retry();
    let id = webstore_id.to_string();

    run_step(&ctx.progress, STEP_INDEX_CREATED, || async move {
        search::start_index(&ctx.cli, &ctx.scratch_username, &id, retry).await?;
        Ok(StepValue::Done)
    })
    .await
}

/// Create the buyer user and attach it to the buyer group the product
/// import published. Polls for the group name so this step is safe even
/// when an overlapping entry point is still importing.
async fn create_buyer_user(ctx: &ProvisionContext, cmd: &CreateStore) -> Result<StepValue> {
    let buyer_group = await_value(
        &ctx.progress,
        products::STEP_PRODUCTS_IMPORTED,
        BUYER_GROUP_POLL,
        BUYER_GROUP_MAX_WAIT,
    )
    .await?;

    run_step(&ctx.progress, STEP_BUYER_CREATED, || async move {
        let create_user = format!(
            "sfdx force:user:create --targetusername {} username={} alias={} profileName=\"Shopper Profile\"",
            ctx.scratch_username, cmd.buyer_username, cmd.buyer_alias,
        );
        match ctx.cli.run_json(&create_user, ctx.transient_retry()).await {
            Ok(_) => {}
            Err(err) => {
                let err = err.into();
                if error_mentions(&err, "duplicate") || error_mentions(&err, "already exists") {
                    tracing::info!("Buyer user {} already exists", cmd.buyer_username);
                } else {
                    return Err(err);
                }
            }
        }

        let records = ctx.records();
        let group = records
            .query_single::<RecordId>(&format!(
                "SELECT Id FROM BuyerGroup WHERE Name='{buyer_group}'"
            ))
            .await?
            .ok_or_else(|| anyhow!("Buyer group '{buyer_group}' not found after import"))?;
        let user = records
            .query_single::<RecordId>(&format!(
                "SELECT Id FROM User WHERE Username='{}'",
                cmd.buyer_username
            ))
            .await?
            .ok_or_else(|| anyhow!("Buyer user {} not found", cmd.buyer_username))?;

        match records
            .create(
                "BuyerGroupMember",
                &format!("BuyerGroupId='{}' BuyerId='{}'", group.id, user.id),
            )
            .await
        {
            Ok(_) => {}
            Err(err) if error_mentions(&err, "duplicate value") => {
                tracing::info!("Buyer already belongs to '{buyer_group}'");
            }
            Err(err) => return Err(err),
        }
        Ok(StepValue::Done)
    })
    .await
}

async fn enable_guest_browsing(ctx: &ProvisionContext, webstore_id: &str) -> Result<StepValue> {
    let records = ctx.records();
    let id = webstore_id.to_string();

    run_step(&ctx.progress, STEP_GUEST_BROWSING, || async move {
        records
            .update("WebStore", &id, "OptionsGuestBrowsingEnabled=true")
            .await?;
        Ok(StepValue::Done)
    })
    .await
}

/// Publish the community and record the storefront URL.
async fn publish_community(ctx: &ProvisionContext) -> Result<String> {
    let retry = ctx.transient_retry();
    let command = format!(
        "sfdx force:community:publish --name \"{}\" --targetusername {}",
        ctx.store_name, ctx.scratch_username,
    );

    let value = run_step(&ctx.progress, STEP_PUBLISHED, || async move {
        let result = ctx.cli.run_json(&command, retry).await?;
        let url = result
            .result()
            .and_then(|r| r.get("url"))
            .and_then(Value::as_str)
            .map(ToString::to_string);
        Ok(url.map(StepValue::Value).unwrap_or(StepValue::Done))
    })
    .await?;

    Ok(value
        .as_str()
        .unwrap_or("(not reported by the publish call)")
        .to_string())
}

fn default_url_prefix(store_name: &str) -> String {
    store_name
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::ProgressStore;
    use crate::sfcli::{RetryPolicy, SfCli};
    use crate::subprocess::SubprocessManager;
    use tempfile::tempdir;

    fn test_context(
        dir: &tempfile::TempDir,
    ) -> (ProvisionContext, crate::subprocess::MockProcessRunner) {
        let (subprocess, mock) = SubprocessManager::mock();
        let cli = SfCli::new(subprocess, dir.path().to_path_buf());
        let progress = ProgressStore::new(
            dir.path().join("status.json"),
            "hub@devhub.example",
            "admin@scratch.example",
            "Basket",
        );
        let ctx = ProvisionContext::from_parts(
            cli,
            progress,
            "hub@devhub.example".to_string(),
            "admin@scratch.example".to_string(),
            "Basket".to_string(),
            RetryPolicy::none(),
        );
        (ctx, mock)
    }

    fn create_cmd() -> CreateStore {
        CreateStore {
            template: "B2C Commerce".to_string(),
            url_prefix: None,
            products_csv: None,
            buyer_username: "buyer@basket.example".to_string(),
            buyer_alias: "buyer".to_string(),
        }
    }

    #[test]
    fn test_default_url_prefix_strips_punctuation() {
        assert_eq!(default_url_prefix("Basket & Co."), "basketco");
    }

    #[tokio::test]
    async fn test_create_community_records_webstore_id() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);

        mock.expect_command("sfdx")
            .with_args(|args| args.iter().any(|a| a.as_str() == "force:community:create"))
            .returns_stdout(r#"{"status":0,"result":{"message":"creation request accepted"}}"#)
            .returns_success()
            .finish();
        mock.expect_command("sfdx")
            .with_args(|args| args.iter().any(|a| a.as_str() == "force:data:soql:query"))
            .returns_stdout(
                r#"{"status":0,"result":{"totalSize":1,"done":true,"records":[{"Id":"0ZE000123"}]}}"#,
            )
            .returns_success()
            .finish();

        let id = create_community(&ctx, &create_cmd()).await.unwrap();
        assert_eq!(id, "0ZE000123");
        assert_eq!(
            ctx.progress.get_value(STEP_COMMUNITY_CREATED).await.unwrap(),
            Some(StepValue::Value("0ZE000123".to_string()))
        );
    }

    #[tokio::test]
    async fn test_create_community_tolerates_existing_community() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);

        mock.expect_command("sfdx")
            .with_args(|args| args.iter().any(|a| a.as_str() == "force:community:create"))
            .returns_stdout(
                r#"{"status":1,"name":"DuplicateValue","message":"Error: duplicate value found: Name"}"#,
            )
            .returns_exit_code(1)
            .finish();
        mock.expect_command("sfdx")
            .with_args(|args| args.iter().any(|a| a.as_str() == "force:data:soql:query"))
            .returns_stdout(
                r#"{"status":0,"result":{"totalSize":1,"done":true,"records":[{"Id":"0ZE000123"}]}}"#,
            )
            .returns_success()
            .finish();

        let id = create_community(&ctx, &create_cmd()).await.unwrap();
        assert_eq!(id, "0ZE000123");
    }

    #[tokio::test]
    async fn test_completed_community_step_returns_recorded_id() {
        let dir = tempdir().unwrap();
        let (ctx, mock) = test_context(&dir);
        ctx.progress
            .set_value(
                STEP_COMMUNITY_CREATED,
                StepValue::Value("0ZE000999".to_string()),
            )
            .await
            .unwrap();

        let id = create_community(&ctx, &create_cmd()).await.unwrap();
        assert_eq!(id, "0ZE000999");
        assert!(mock.verify_called("sfdx", 0));
    }

    #[tokio::test]
    async fn test_push_sources_records_done_once() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);

        mock.expect_command("sfdx")
            .returns_stdout(r#"{"status":0,"result":{"pushedSource":[]}}"#)
            .returns_success()
            .finish();

        push_sources(&ctx).await.unwrap();
        push_sources(&ctx).await.unwrap();
        assert!(mock.verify_called("sfdx", 1));
    }

    #[tokio::test]
    async fn test_publish_records_storefront_url() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);

        mock.expect_command("sfdx")
            .returns_stdout(
                r#"{"status":0,"result":{"url":"https://basket.example.com/basket"}}"#,
            )
            .returns_success()
            .finish();

        let url = publish_community(&ctx).await.unwrap();
        assert_eq!(url, "https://basket.example.com/basket");
        assert_eq!(
            ctx.progress.get_value(STEP_PUBLISHED).await.unwrap(),
            Some(StepValue::Value("https://basket.example.com/basket".to_string()))
        );
    }

    #[tokio::test]
    async fn test_buyer_user_waits_for_import_value() {
        let dir = tempdir().unwrap();
        let (ctx, _mock) = test_context(&dir);

        // products step never published: the buyer step must not touch
        // the CLI while it waits for the derived value
        let result = tokio::time::timeout(
            Duration::from_millis(200),
            create_buyer_user(&ctx, &create_cmd()),
        )
        .await;
        assert!(result.is_err(), "buyer step returned before import published");
    }
}
