//! Store write retry example
//!
//! Drives a fake throttled store through the retry executor with logging
//! enabled, a policy loaded from TOML and a cancellation deadline.
//!
//! Run with: RUST_LOG=store_retry=trace cargo run --example write_retry

use std::time::Duration;

use store_retry::{
    CancelScope, LogNotify, Retry, RetryConfig, StoreError, THROUGHPUT_EXCEEDED, WriteKind,
    retry_notify_delete,
};
use tracing_subscriber::EnvFilter;

const CONFIG: &str = r#"
[policies.writes]
kind = "scheduled"
delays_ms = [50, 100, 200]

[policies.patient]
kind = "constant"
interval_ms = 500
"#;

#[derive(Debug, Clone)]
struct PutItem {
    table: &'static str,
    key: String,
}

/// Pretends to be a store that throttles the first few requests.
struct FakeStore {
    throttle_remaining: u32,
}

impl FakeStore {
    fn put(&mut self, item: PutItem) -> Result<String, StoreError> {
        if self.throttle_remaining > 0 {
            self.throttle_remaining -= 1;
            return Err(StoreError::service(
                THROUGHPUT_EXCEEDED,
                format!("write capacity exceeded on {}", item.table),
            ));
        }
        Ok(format!("{}/{}", item.table, item.key))
    }

    fn delete(&mut self, key: &str) -> Result<(), StoreError> {
        Err(StoreError::service(
            "ResourceNotFoundException",
            format!("no item {key}"),
        ))
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,store_retry=debug"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let registry = RetryConfig::from_toml_str(CONFIG)?.registry()?;
    let mut store = FakeStore {
        throttle_remaining: 2,
    };

    println!("1. Throttled put, recovers within the schedule:");
    let mut backoff = registry
        .get("writes")
        .ok_or_else(|| anyhow::anyhow!("policy 'writes' missing"))?;
    let outcome = Retry::new(&mut backoff)
        .operation(WriteKind::Put.as_str())
        .notify(LogNotify::new("put"))
        .run_detailed(
            |item: PutItem| std::future::ready(store.put(item)),
            PutItem {
                table: "orders",
                key: "order#1".to_string(),
            },
        )
        .await?;
    println!(
        "   stored {} after {} attempt(s)\n",
        outcome.value(),
        outcome.attempts()
    );

    println!("2. Delete of a missing item fails without retry:");
    let result = retry_notify_delete(
        |key: &str| std::future::ready(store.delete(key)),
        "order#404",
        &mut backoff,
        |err: &StoreError, delay: Duration| println!("   retry in {delay:?}: {err}"),
    )
    .await;
    println!("   result: {result:?}\n");

    println!("3. Persistent throttling cut short by a deadline:");
    store.throttle_remaining = u32::MAX;
    let mut patient = registry
        .get("patient")
        .ok_or_else(|| anyhow::anyhow!("policy 'patient' missing"))?;
    let result = Retry::new(&mut patient)
        .operation(WriteKind::Put.as_str())
        .cancel_on(CancelScope::never().with_timeout(Duration::from_millis(1200)))
        .run_detailed(
            |item: PutItem| std::future::ready(store.put(item)),
            PutItem {
                table: "orders",
                key: "order#2".to_string(),
            },
        )
        .await;
    match result {
        Ok(outcome) => println!("   unexpectedly stored {}", outcome.value()),
        Err(err) => println!("   gave up: {err}"),
    }

    Ok(())
}
