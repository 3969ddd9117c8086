// Small ops utility: replay pending realtime_outbox rows and print the queue state.
//
// Usage:
//   cargo run --bin replay_outbox -- [db_path] [batch_size]
//
// Rows are applied to the in-process realtime store, so this is mainly useful
// for checking that the backlog is well-formed and drains in order.

use garment_erp::db::{ensure_schema, open_sqlite_connection};
use garment_erp::logging;
use garment_erp::realtime::{MemoryRealtimeStore, OutboxRelay, DEFAULT_BATCH_SIZE};
use garment_erp::repository::OutboxRepository;
use std::sync::{Arc, Mutex};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    logging::init();

    let mut args = std::env::args().skip(1);
    let db_path = args.next().unwrap_or_else(|| "garment_erp.db".to_string());
    let batch_size = args
        .next()
        .map(|s| s.trim().parse::<usize>())
        .transpose()?
        .unwrap_or(DEFAULT_BATCH_SIZE);

    let conn = open_sqlite_connection(&db_path)?;
    ensure_schema(&conn)?;
    let conn = Arc::new(Mutex::new(conn));

    let outbox = Arc::new(OutboxRepository::new(conn));
    let before = outbox.count_pending()?;

    let relay = OutboxRelay::new(outbox.clone(), Arc::new(MemoryRealtimeStore::new()))
        .with_batch_size(batch_size);
    let summary = relay.drain().await?;

    println!(
        "pending_before={} delivered={} failed={} remaining={}",
        before, summary.delivered, summary.failed, summary.remaining
    );
    Ok(())
}
