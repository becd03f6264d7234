//! Scratch org creation and verification.

use anyhow::{bail, Result};
use serde_json::Value;
use std::path::PathBuf;

use super::{error_mentions, ProvisionContext};
use crate::progress::StepValue;
use crate::workflow::run_step;

pub const STEP_ORG_CREATED: &str = "scratch org created";
pub const STEP_ORG_VERIFIED: &str = "org status verified";

pub struct CreateOrg {
    pub definition_file: PathBuf,
    pub duration_days: u32,
    pub wait_minutes: u32,
}

pub async fn run(ctx: &ProvisionContext, cmd: &CreateOrg) -> Result<()> {
    create_scratch_org(ctx, cmd).await?;
    verify_org(ctx).await?;
    tracing::info!("Scratch org {} is ready", ctx.scratch_username);
    Ok(())
}

/// Create the scratch org, or reuse one that already exists under the
/// same username. Publishes the org id when the CLI reports it.
pub async fn create_scratch_org(ctx: &ProvisionContext, cmd: &CreateOrg) -> Result<StepValue> {
    let retry = ctx.transient_retry();
    let command = format!(
        "sfdx force:org:create --type scratch --definitionfile {} --durationdays {} --wait {} --targetdevhubusername {} username={}",
        cmd.definition_file.display(),
        cmd.duration_days,
        cmd.wait_minutes,
        ctx.hub_username,
        ctx.scratch_username,
    );

    run_step(&ctx.progress, STEP_ORG_CREATED, || async move {
        match ctx.cli.run_json(&command, retry).await {
            Ok(result) => {
                let org_id = result
                    .result()
                    .and_then(|r| r.get("orgId"))
                    .and_then(Value::as_str)
                    .map(ToString::to_string);
                Ok(org_id.map(StepValue::Value).unwrap_or(StepValue::Done))
            }
            Err(err) => {
                let err = err.into();
                if error_mentions(&err, "already exists")
                    || error_mentions(&err, "duplicate value")
                {
                    tracing::info!(
                        "Scratch org {} already exists, reusing it",
                        ctx.scratch_username
                    );
                    Ok(StepValue::Done)
                } else {
                    Err(err)
                }
            }
        }
    })
    .await
}

/// Confirm the org answers `force:org:display` and reports itself active.
async fn verify_org(ctx: &ProvisionContext) -> Result<StepValue> {
    let retry = ctx.transient_retry();
    let command = format!(
        "sfdx force:org:display --targetusername {}",
        ctx.scratch_username
    );

    run_step(&ctx.progress, STEP_ORG_VERIFIED, || async move {
        let result = ctx.cli.run_json(&command, retry).await?;
        let status = result
            .result()
            .and_then(|r| r.get("status"))
            .and_then(Value::as_str)
            .unwrap_or("Active");
        if status != "Active" {
            bail!(
                "Scratch org {} is not active (status: {status})",
                ctx.scratch_username
            );
        }
        Ok(StepValue::Done)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sfcli::{RetryPolicy, SfCli};
    use crate::subprocess::SubprocessManager;
    use tempfile::tempdir;

    fn test_context(
        dir: &tempfile::TempDir,
    ) -> (ProvisionContext, crate::subprocess::MockProcessRunner) {
        let (subprocess, mock) = SubprocessManager::mock();
        let cli = SfCli::new(subprocess, dir.path().to_path_buf());
        let progress = crate::progress::ProgressStore::new(
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

    fn create_cmd() -> CreateOrg {
        CreateOrg {
            definition_file: PathBuf::from("config/project-scratch-def.json"),
            duration_days: 30,
            wait_minutes: 15,
        }
    }

    #[tokio::test]
    async fn test_create_publishes_org_id() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);
        mock.expect_command("sfdx")
            .returns_stdout(r#"{"status":0,"result":{"orgId":"00D000123","username":"admin@scratch.example"}}"#)
            .returns_success()
            .finish();

        let value = create_scratch_org(&ctx, &create_cmd()).await.unwrap();
        assert_eq!(value.as_str(), Some("00D000123"));
        assert_eq!(
            ctx.progress.get_value(STEP_ORG_CREATED).await.unwrap(),
            Some(StepValue::Value("00D000123".to_string()))
        );
    }

    #[tokio::test]
    async fn test_existing_org_is_reused() {
        let dir = tempdir().unwrap();
        let (ctx, mut mock) = test_context(&dir);
        mock.expect_command("sfdx")
            .returns_stdout(
                r#"{"status":1,"name":"DuplicateUsername","message":"a scratch org with that username already exists"}"#,
            )
            .returns_exit_code(1)
            .finish();

        let value = create_scratch_org(&ctx, &create_cmd()).await.unwrap();
        assert_eq!(value, StepValue::Done);
    }

    #[tokio::test]
    async fn test_completed_step_skips_cli_call() {
        let dir = tempdir().unwrap();
        let (ctx, mock) = test_context(&dir);
        ctx.progress
            .set_value(STEP_ORG_CREATED, StepValue::Done)
            .await
            .unwrap();

        let value = create_scratch_org(&ctx, &create_cmd()).await.unwrap();
        assert_eq!(value, StepValue::Done);
        assert!(mock.verify_called("sfdx", 0));
    }
}
