//! The step-gating discipline every provisioning command follows.

use anyhow::{bail, Result};
use std::future::Future;
use std::time::Duration;

use crate::progress::{ProgressStore, StepValue};
use crate::sfcli::SfCliError;

/// Run one provisioning step, gated by the progress store.
///
/// A recorded `Done` or `Value` marker short-circuits: the work function
/// is not invoked and the marker is returned as-is. A `Failed` snapshot
/// does NOT gate; it is overwritten by the next successful run. This
/// asymmetry is what lets an interrupted workflow resume: only success is
/// remembered as "done", failure is remembered only as diagnosis. It also
/// means a snapshot of a non-retryable domain error (say, a store name
/// taken by another org) is blindly re-attempted on the next invocation.
///
/// On failure the error snapshot is persisted under `key` before the
/// error is re-raised; steps never fail silently.
pub async fn run_step<F, Fut>(store: &ProgressStore, key: &str, work: F) -> Result<StepValue>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<StepValue>>,
{
    if let Some(existing) = store.get_value(key).await? {
        if existing.is_complete() {
            tracing::info!("Step '{}' already complete, skipping", key);
            return Ok(existing);
        }
        tracing::info!("Step '{}' failed previously, running it again", key);
    }

    match work().await {
        Ok(value) => {
            store.set_value(key, value.clone()).await?;
            tracing::info!("Step '{}' complete", key);
            Ok(value)
        }
        Err(err) => {
            store.set_value(key, snapshot_of(&err)).await?;
            Err(err)
        }
    }
}

/// Snapshot an error for the status file, preserving the structured
/// payload when the platform CLI returned one.
fn snapshot_of(err: &anyhow::Error) -> StepValue {
    match err.downcast_ref::<SfCliError>() {
        Some(SfCliError::Structured {
            status,
            name,
            message,
            payload,
        }) => StepValue::Failed(serde_json::json!({
            "status": status,
            "name": name,
            "message": message,
            "payload": payload,
            "recordedAt": chrono::Utc::now(),
        })),
        _ => StepValue::failure(None, &format!("{err:#}")),
    }
}

/// Wait for another step to publish its derived value.
///
/// Steps can be kicked off from more than one command entry point, so a
/// dependent step polls for the value instead of assuming the producer
/// ran earlier in the same invocation.
pub async fn await_value(
    store: &ProgressStore,
    key: &str,
    poll: Duration,
    max_wait: Duration,
) -> Result<String> {
    let deadline = tokio::time::Instant::now() + max_wait;
    loop {
        if let Some(value) = store.get_value(key).await? {
            if let Some(s) = value.as_str() {
                return Ok(s.to_string());
            }
        }
        if tokio::time::Instant::now() >= deadline {
            bail!("Timed out waiting for step '{}' to publish a value", key);
        }
        tokio::time::sleep(poll).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tempfile::tempdir;

    fn test_store(dir: &tempfile::TempDir) -> ProgressStore {
        ProgressStore::new(dir.path().join("status.json"), "hubA", "orgB", "storeC")
    }

    #[tokio::test]
    async fn test_work_runs_exactly_once() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = calls.clone();
            let result = run_step(&store, "sources pushed", || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(StepValue::Done)
            })
            .await
            .unwrap();
            assert_eq!(result, StepValue::Done);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_recorded_value_returned_without_rerun() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        store
            .set_value("community created", StepValue::Value("0ZE000123".to_string()))
            .await
            .unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = run_step(&store, "community created", || async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(StepValue::Done)
        })
        .await
        .unwrap();
        assert_eq!(result.as_str(), Some("0ZE000123"));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_failure_persists_snapshot_and_reraises() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let err = run_step(&store, "products imported", || async move {
            anyhow::bail!("import job crashed")
        })
        .await
        .unwrap_err();
        assert!(err.to_string().contains("import job crashed"));

        match store.get_value("products imported").await.unwrap() {
            Some(StepValue::Failed(snapshot)) => {
                assert!(snapshot["message"]
                    .as_str()
                    .unwrap()
                    .contains("import job crashed"));
            }
            other => panic!("Expected a failure snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failure_snapshot_does_not_block_retry() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);
        let calls = Arc::new(AtomicUsize::new(0));

        let failing = calls.clone();
        let _ = run_step(&store, "buyer user created", || async move {
            failing.fetch_add(1, Ordering::SeqCst);
            anyhow::bail!("org still warming up")
        })
        .await;

        let succeeding = calls.clone();
        let result = run_step(&store, "buyer user created", || async move {
            succeeding.fetch_add(1, Ordering::SeqCst);
            Ok(StepValue::Done)
        })
        .await
        .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result, StepValue::Done);
        // success overwrote the snapshot
        assert_eq!(
            store.get_value("buyer user created").await.unwrap(),
            Some(StepValue::Done)
        );
    }

    #[tokio::test]
    async fn test_structured_error_snapshot_keeps_payload() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let _ = run_step(&store, "community created", || async move {
            Err(SfCliError::Structured {
                status: 1,
                name: "DuplicateValue".to_string(),
                message: "duplicate value found".to_string(),
                payload: serde_json::json!({"status": 1, "name": "DuplicateValue"}),
            }
            .into())
        })
        .await;

        match store.get_value("community created").await.unwrap() {
            Some(StepValue::Failed(snapshot)) => {
                assert_eq!(snapshot["name"], "DuplicateValue");
                assert_eq!(snapshot["payload"]["name"], "DuplicateValue");
            }
            other => panic!("Expected a failure snapshot, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_await_value_returns_published_value() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        store
            .set_value(
                "products imported",
                StepValue::Value("Basket Buyer Group".to_string()),
            )
            .await
            .unwrap();

        let value = await_value(
            &store,
            "products imported",
            Duration::from_millis(10),
            Duration::from_millis(100),
        )
        .await
        .unwrap();
        assert_eq!(value, "Basket Buyer Group");
    }

    #[tokio::test]
    async fn test_await_value_times_out() {
        let dir = tempdir().unwrap();
        let store = test_store(&dir);

        let err = await_value(
            &store,
            "products imported",
            Duration::from_millis(10),
            Duration::from_millis(50),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("products imported"));
    }
}
