//! The four concurrency disciplines the benchmark drives the store with.
//!
//! All runners share one contract: issue exactly `total_ops` operations drawn
//! from the workload generator, wait until every one of them has completed,
//! and report the wall-clock duration from first issuance to full completion.
//! Completion counters are constructed fresh for every run and never shared
//! across scenarios.

use crate::client::{Batch, Operation, PipelinedClient, StoreClient, StoreConnector};
use crate::error::{BenchError, Result};
use crate::workload::{KeySpace, Workload};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The concurrency discipline a scenario runs under.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// One thread, one operation at a time
    Serial,
    /// N worker threads, each issuing blocking operations independently
    Threaded {
        /// Number of worker threads
        threads: u32,
    },
    /// A single control thread keeping a bounded window of operations in flight
    BoundedWindow {
        /// Maximum number of outstanding operations
        window: u64,
        /// Number of connections the window is spread over
        connections: u32,
    },
    /// Strictly sequential fixed-size batches, each flushed as one round-trip
    Batched {
        /// Number of operations per batch
        batch_size: u64,
    },
}

impl Strategy {
    /// Short name used in reports and logs.
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Serial => "serial",
            Strategy::Threaded { .. } => "threaded",
            Strategy::BoundedWindow { .. } => "bounded_window",
            Strategy::Batched { .. } => "batched",
        }
    }

    /// The concurrency parameter of the strategy: thread count, window bound
    /// or batch size. 1 for the serial strategy.
    pub fn concurrency(&self) -> u64 {
        match *self {
            Strategy::Serial => 1,
            Strategy::Threaded { threads } => u64::from(threads),
            Strategy::BoundedWindow { window, .. } => window,
            Strategy::Batched { batch_size } => batch_size,
        }
    }
}

/// One configured benchmark run: a strategy plus its operation count.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// The concurrency discipline to run
    pub strategy: Strategy,
    /// Total number of operations to issue
    pub total_ops: u64,
}

impl Scenario {
    /// Checks the scenario parameters against the invariants of its strategy.
    ///
    /// Runners repeat this check, so a malformed scenario fails before a
    /// single operation is issued no matter how it reaches a runner.
    pub fn validate(&self) -> Result<()> {
        if self.total_ops == 0 {
            return Err(BenchError::Precondition(
                "total operation count must be positive".to_owned(),
            ));
        }
        match self.strategy {
            Strategy::Serial => Ok(()),
            Strategy::Threaded { threads } => {
                if threads == 0 {
                    Err(BenchError::Precondition(
                        "thread count must be positive".to_owned(),
                    ))
                } else if self.total_ops % u64::from(threads) != 0 {
                    Err(BenchError::Precondition(format!(
                        "total operation count {} is not divisible by thread count {}",
                        self.total_ops, threads
                    )))
                } else {
                    Ok(())
                }
            }
            Strategy::BoundedWindow {
                window,
                connections,
            } => {
                if window == 0 || connections == 0 {
                    Err(BenchError::Precondition(
                        "window bound and connection count must be positive".to_owned(),
                    ))
                } else if self.total_ops < window {
                    Err(BenchError::Precondition(format!(
                        "total operation count {} is below the window bound {}",
                        self.total_ops, window
                    )))
                } else {
                    Ok(())
                }
            }
            Strategy::Batched { batch_size } => {
                if batch_size == 0 {
                    Err(BenchError::Precondition(
                        "batch size must be positive".to_owned(),
                    ))
                } else if self.total_ops % batch_size != 0 {
                    Err(BenchError::Precondition(format!(
                        "total operation count {} is not divisible by batch size {}",
                        self.total_ops, batch_size
                    )))
                } else {
                    Ok(())
                }
            }
        }
    }
}

/// The measurement produced by one completed scenario.
#[derive(Debug, Clone, Copy)]
pub struct RunResult {
    /// The scenario that was run
    pub scenario: Scenario,
    /// Wall-clock time from first issuance to full completion
    pub elapsed: Duration,
    /// Number of operations confirmed complete
    pub completed: u64,
}

impl RunResult {
    /// Achieved operations per second.
    pub fn throughput(&self) -> f64 {
        self.completed as f64 / self.elapsed.as_secs_f64()
    }
}

fn issue_blocking<C: StoreClient>(client: &mut C, op: &Operation) -> Result<()> {
    match op {
        Operation::Get { key } => client.get(key).map(|_| ()),
        Operation::Set { key, value } => client.set(key, value),
    }
}

/// Runs `scenario` against the store reachable through `connector`.
pub fn run_scenario<T: StoreConnector>(
    connector: &T,
    keyspace: KeySpace,
    scenario: Scenario,
) -> Result<RunResult> {
    scenario.validate()?;
    let total = scenario.total_ops;
    let (elapsed, completed) = match scenario.strategy {
        Strategy::Serial => run_serial(connector, keyspace, total)?,
        Strategy::Threaded { threads } => run_threaded(connector, keyspace, threads, total)?,
        Strategy::BoundedWindow {
            window,
            connections,
        } => run_window(connector, keyspace, window, connections, total)?,
        Strategy::Batched { batch_size } => run_batched(connector, keyspace, batch_size, total)?,
    };
    Ok(RunResult {
        scenario,
        elapsed,
        completed,
    })
}

/// One execution thread, blocking on every single operation.
pub fn run_serial<T: StoreConnector>(
    connector: &T,
    keyspace: KeySpace,
    total: u64,
) -> Result<(Duration, u64)> {
    let mut client = connector.connect()?;
    let mut workload = Workload::from_entropy(keyspace);
    let mut completed = 0u64;

    let start = Instant::now();
    while completed < total {
        let op = workload.next_operation();
        issue_blocking(&mut client, &op)?;
        completed += 1;
    }
    Ok((start.elapsed(), completed))
}

/// N worker threads, each running the serial discipline for `total / N` ops.
///
/// Every worker owns an independent connection and an independent random
/// source; the only shared state is the atomic completion counter.
pub fn run_threaded<T: StoreConnector>(
    connector: &T,
    keyspace: KeySpace,
    threads: u32,
    total: u64,
) -> Result<(Duration, u64)> {
    if threads == 0 || total % u64::from(threads) != 0 {
        return Err(BenchError::Precondition(format!(
            "total operation count {} is not divisible by thread count {}",
            total, threads
        )));
    }
    let ops_per_thread = total / u64::from(threads);
    let completed = Arc::new(AtomicU64::new(0));

    // Connections are opened before the clock starts so a refused connection
    // fails the scenario instead of skewing its measurement.
    let mut clients = Vec::with_capacity(threads as usize);
    for _ in 0..threads {
        clients.push(connector.connect()?);
    }

    let start = Instant::now();
    let mut workers = Vec::with_capacity(threads as usize);
    for mut client in clients {
        let completed = Arc::clone(&completed);
        workers.push(std::thread::spawn(move || -> Result<()> {
            let mut workload = Workload::from_entropy(keyspace);
            for _ in 0..ops_per_thread {
                let op = workload.next_operation();
                issue_blocking(&mut client, &op)?;
                completed.fetch_add(1, Ordering::SeqCst);
            }
            Ok(())
        }));
    }

    let mut first_error = None;
    for worker in workers {
        let outcome = worker.join().unwrap_or_else(|_| {
            Err(BenchError::Store("worker thread panicked".to_owned()))
        });
        if let Err(e) = outcome {
            first_error.get_or_insert(e);
        }
    }
    let elapsed = start.elapsed();

    match first_error {
        Some(e) => Err(e),
        None => Ok((elapsed, completed.load(Ordering::SeqCst))),
    }
}

/// Single control thread keeping at most `window` operations in flight,
/// spread round-robin over `connections` pipelined connections.
pub fn run_window<T: StoreConnector>(
    connector: &T,
    keyspace: KeySpace,
    window: u64,
    connections: u32,
    total: u64,
) -> Result<(Duration, u64)> {
    if window == 0 || connections == 0 {
        return Err(BenchError::Precondition(
            "window bound and connection count must be positive".to_owned(),
        ));
    }
    if total < window {
        return Err(BenchError::Precondition(format!(
            "total operation count {} is below the window bound {}",
            total, window
        )));
    }

    let (tx, rx) = crossbeam::channel::unbounded();
    let mut conns = Vec::with_capacity(connections as usize);
    for _ in 0..connections {
        conns.push(connector.connect_pipeline(tx.clone())?);
    }
    // The reader side of every connection holds a sender clone; dropping ours
    // makes recv fail instead of hanging when all connections die.
    drop(tx);

    let mut workload = Workload::from_entropy(keyspace);
    let mut sent = 0u64;
    let mut completed = 0u64;

    let start = Instant::now();
    // Issuing: fill the window before waiting on anything.
    while sent < window {
        let idx = (sent % u64::from(connections)) as usize;
        conns[idx].submit(workload.next_operation())?;
        sent += 1;
    }
    // One new submission per completion while operations remain, then drain.
    while completed < total {
        let event = rx.recv().map_err(|_| {
            BenchError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "all connections closed before the run drained",
            ))
        })?;
        event?;
        completed += 1;
        if sent < total {
            let idx = (completed % u64::from(connections)) as usize;
            conns[idx].submit(workload.next_operation())?;
            sent += 1;
        }
    }
    Ok((start.elapsed(), completed))
}

/// Strictly sequential batches: construct `batch_size` operations, flush them
/// as one submission, wait for every reply, repeat.
pub fn run_batched<T: StoreConnector>(
    connector: &T,
    keyspace: KeySpace,
    batch_size: u64,
    total: u64,
) -> Result<(Duration, u64)> {
    if batch_size == 0 || total % batch_size != 0 {
        return Err(BenchError::Precondition(format!(
            "total operation count {} is not divisible by batch size {}",
            total, batch_size
        )));
    }
    let mut client = connector.connect()?;
    let mut workload = Workload::from_entropy(keyspace);
    let mut completed = 0u64;

    let start = Instant::now();
    for _ in 0..total / batch_size {
        let mut batch = Batch::with_capacity(batch_size as usize);
        for _ in 0..batch_size {
            batch.push(workload.next_operation());
        }
        client.execute(&batch)?;
        completed += batch_size;
    }
    Ok((start.elapsed(), completed))
}
