//! Product catalog import.

use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

use super::{buyer_group_name, ProvisionContext};
use crate::progress::StepValue;
use crate::record::RecordId;
use crate::sfcli::RunOptions;
use crate::workflow::run_step;

pub const STEP_PRODUCTS_IMPORTED: &str = "products imported";

pub struct ImportProducts {
    pub csv: Option<PathBuf>,
}

pub async fn run(ctx: &ProvisionContext, cmd: &ImportProducts) -> Result<()> {
    let value = import_products(ctx, cmd.csv.as_deref()).await?;
    if let Some(group) = value.as_str() {
        println!("Products imported; buyer group: {group}");
    }
    Ok(())
}

/// Import the catalog and publish the buyer group name the import
/// creates. `store create` and `products import` share this step, so
/// whichever entry point runs first does the work and the other skips.
pub async fn import_products(ctx: &ProvisionContext, csv: Option<&Path>) -> Result<StepValue> {
    let buyer_group = buyer_group_name(&ctx.store_name);
    let retry = ctx.transient_retry();

    run_step(&ctx.progress, STEP_PRODUCTS_IMPORTED, || async move {
        let records = ctx.records();
        let webstore = records
            .query_single::<RecordId>(&format!(
                "SELECT Id FROM WebStore WHERE Name='{}'",
                ctx.store_name
            ))
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "No WebStore named '{}'; create the store before importing products",
                    ctx.store_name
                )
            })?;

        if let Some(csv) = csv {
            let upsert = format!(
                "sfdx force:data:bulk:upsert --sobjecttype Product2 --csvfile {} --externalid StockKeepingUnit --wait 30 --targetusername {}",
                csv.display(),
                ctx.scratch_username,
            );
            ctx.cli.run_json(&upsert, retry.clone()).await?;
        }

        // The import entry point deployed with the example sources builds
        // the catalog, entitlement policy, and buyer group.
        let apex = format!(
            "CommerceImport.importProducts('{}', '{}');",
            webstore.id, buyer_group
        );
        let execute = format!(
            "sfdx force:apex:execute --targetusername {}",
            ctx.scratch_username
        );
        ctx.cli
            .run_json_with(
                &execute,
                RunOptions {
                    stdin: Some(apex),
                    ..Default::default()
                },
                retry,
            )
            .await?;

        Ok(StepValue::Value(buyer_group))
    })
    .await
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

    #[tokio::test]
    async fn test_import_publishes_buyer_group() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);

        mock.expect_command("sfdx")
            .with_args(|args| args.iter().any(|a| a.as_str() == "force:data:soql:query"))
            .returns_stdout(
                r#"{"status":0,"result":{"totalSize":1,"done":true,"records":[{"Id":"0ZE000123"}]}}"#,
            )
            .returns_success()
            .finish();
        mock.expect_command("sfdx")
            .with_args(|args| args.iter().any(|a| a.as_str() == "force:apex:execute"))
            .returns_stdout(r#"{"status":0,"result":{"success":true,"compiled":true}}"#)
            .returns_success()
            .finish();

        let value = import_products(&ctx, None).await.unwrap();
        assert_eq!(value.as_str(), Some("Basket Buyer Group"));

        // the apex call carried the import invocation on stdin
        let apex_call = mock
            .get_call_history()
            .into_iter()
            .find(|call| call.args.iter().any(|a| a.as_str() == "force:apex:execute"))
            .unwrap();
        let stdin = apex_call.stdin.unwrap();
        assert!(stdin.contains("0ZE000123"));
        assert!(stdin.contains("Basket Buyer Group"));
    }

    #[tokio::test]
    async fn test_import_requires_existing_webstore() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);

        mock.expect_command("sfdx")
            .returns_stdout(r#"{"status":0,"result":{"totalSize":0,"done":true,"records":[]}}"#)
            .returns_success()
            .finish();

        let err = import_products(&ctx, None).await.unwrap_err();
        assert!(err.to_string().contains("No WebStore named 'Basket'"));

        // the failure was recorded as a snapshot, not a completion marker
        match ctx
            .progress
            .get_value(STEP_PRODUCTS_IMPORTED)
            .await
            .unwrap()
        {
            Some(StepValue::Failed(_)) => {}
            other => panic!("Expected failure snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_completed_import_is_skipped() {
        let dir = tempdir().unwrap();
        let (ctx, mock) = test_context(&dir);
        ctx.progress
            .set_value(
                STEP_PRODUCTS_IMPORTED,
                StepValue::Value("Basket Buyer Group".to_string()),
            )
            .await
            .unwrap();

        let value = import_products(&ctx, None).await.unwrap();
        assert_eq!(value.as_str(), Some("Basket Buyer Group"));
        assert!(mock.verify_called("sfdx", 0));
    }
}
