use crate::client::{Batch, StoreClient};
use crate::error::{BenchError, Result};
use crate::workload::Workload;
use rand::Rng;
use slog::Logger;
use std::time::Instant;

/// Number of SET operations submitted per warmup batch
pub const WARMUP_BATCH_SIZE: u64 = 1000;

/// Seeds the store's key-space before a measured run.
///
/// Clears the store, then writes one generated payload to every key from 1
/// to `set_keys`, in batches of [`WARMUP_BATCH_SIZE`] operations each awaited
/// to completion before the next one is submitted. The final batch may be
/// smaller when the key-space is not a multiple of the batch size.
///
/// Any failure is fatal to the whole benchmark run: a scenario measured over
/// an unknown data state is meaningless.
pub fn warmup<C, R>(client: &mut C, workload: &mut Workload<R>, log: &Logger) -> Result<()>
where
    C: StoreClient,
    R: Rng,
{
    let set_keys = workload.keyspace().set_keys;
    info!(log, "starting warmup"; "keys" => set_keys);
    let start = Instant::now();

    client
        .flush_all()
        .map_err(|e| BenchError::FatalWarmup(format!("could not clear the store: {}", e)))?;

    let mut key = 1u64;
    while key <= set_keys {
        let batch_end = std::cmp::min(key + WARMUP_BATCH_SIZE - 1, set_keys);
        let mut batch = Batch::with_capacity((batch_end - key + 1) as usize);
        for k in key..=batch_end {
            batch.set(k.to_string(), workload.next_payload());
        }
        client.execute(&batch).map_err(|e| {
            BenchError::FatalWarmup(format!(
                "could not seed keys {}..={}: {}",
                key, batch_end, e
            ))
        })?;
        key = batch_end + 1;
    }

    info!(log, "warmup complete"; "keys" => set_keys, "elapsed_secs" => start.elapsed().as_secs_f64());
    Ok(())
}
