//! Quickstart: scratch org, example conversion, source push.

use anyhow::Result;
use std::collections::HashMap;
use std::path::PathBuf;

use super::{buyer_group_name, org, store, ProvisionContext};
use crate::metadata;
use crate::progress::StepValue;
use crate::workflow::run_step;

pub const STEP_EXAMPLES_CONVERTED: &str = "examples converted";

pub struct Quickstart {
    pub examples_dir: PathBuf,
    pub project_dir: PathBuf,
    pub definition_file: PathBuf,
    pub duration_days: u32,
    pub wait_minutes: u32,
    pub buyer_username: String,
}

pub async fn run(ctx: &ProvisionContext, cmd: &Quickstart) -> Result<()> {
    org::create_scratch_org(
        ctx,
        &org::CreateOrg {
            definition_file: cmd.definition_file.clone(),
            duration_days: cmd.duration_days,
            wait_minutes: cmd.wait_minutes,
        },
    )
    .await?;
    convert_examples(ctx, cmd).await?;
    store::push_sources(ctx).await?;
    tracing::info!(
        "Quickstart complete for '{}'; sources are live on {}",
        ctx.store_name,
        ctx.scratch_username
    );
    Ok(())
}

/// Rewrite the example metadata tree into deployable source for this
/// store. Conversion is local-only but still gated: a later entry point
/// must not clobber a tree the push step already deployed.
pub async fn convert_examples(ctx: &ProvisionContext, cmd: &Quickstart) -> Result<StepValue> {
    run_step(&ctx.progress, STEP_EXAMPLES_CONVERTED, || async move {
        let tokens = HashMap::from([
            ("$STORE_NAME".to_string(), ctx.store_name.clone()),
            (
                "$SCRATCH_ORG_ADMIN".to_string(),
                ctx.scratch_username.clone(),
            ),
            ("$HUB_ORG".to_string(), ctx.hub_username.clone()),
            (
                "$BUYER_GROUP_NAME".to_string(),
                buyer_group_name(&ctx.store_name),
            ),
            ("$BUYER_USERNAME".to_string(), cmd.buyer_username.clone()),
        ]);
        metadata::copy_with_tokens(&cmd.examples_dir, &cmd.project_dir, &tokens)?;
        Ok(StepValue::Done)
    })
    .await
}
