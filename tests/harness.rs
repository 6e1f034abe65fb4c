use crossbeam::channel::Sender;
use kvbench::{
    run_batched, run_scenario, run_serial, run_threaded, run_window, warmup, Batch, BenchError,
    Completion, Harness, KeySpace, Operation, PipelinedClient, Result, RunResult, Scenario,
    StoreClient, StoreConnector, Strategy, Workload,
};
use slog::o;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Shared state behind every mock connection, instrumented so tests can
/// check exactly what the runners did to the store.
#[derive(Default)]
struct MockState {
    map: Mutex<HashMap<String, Vec<u8>>>,
    gets: AtomicU64,
    sets: AtomicU64,
    flushes: AtomicU64,
    batch_sizes: Mutex<Vec<usize>>,
    outstanding: AtomicI64,
    max_outstanding: AtomicI64,
}

impl MockState {
    fn apply(&self, op: &Operation) {
        match op {
            Operation::Get { key } => {
                self.gets.fetch_add(1, Ordering::SeqCst);
                let _ = self.map.lock().unwrap().get(key);
            }
            Operation::Set { key, value } => {
                self.sets.fetch_add(1, Ordering::SeqCst);
                self.map.lock().unwrap().insert(key.clone(), value.clone());
            }
        }
    }

    fn ops_completed(&self) -> u64 {
        self.gets.load(Ordering::SeqCst) + self.sets.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct MockConnector {
    state: Arc<MockState>,
    latency: Option<Duration>,
    fail_pipeline: bool,
}

impl MockConnector {
    fn new() -> Self {
        Self {
            state: Arc::new(MockState::default()),
            latency: None,
            fail_pipeline: false,
        }
    }

    fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }
}

struct MockClient {
    state: Arc<MockState>,
    latency: Option<Duration>,
}

impl MockClient {
    fn pause(&self) {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }
    }
}

impl StoreClient for MockClient {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        self.pause();
        self.state.gets.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.map.lock().unwrap().get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.pause();
        self.state.sets.fetch_add(1, Ordering::SeqCst);
        self.state
            .map
            .lock()
            .unwrap()
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn flush_all(&mut self) -> Result<()> {
        self.state.flushes.fetch_add(1, Ordering::SeqCst);
        self.state.map.lock().unwrap().clear();
        Ok(())
    }

    fn execute(&mut self, batch: &Batch) -> Result<()> {
        // One round-trip per batch, not one per operation.
        self.pause();
        self.state.batch_sizes.lock().unwrap().push(batch.len());
        for op in batch.operations() {
            self.state.apply(op);
        }
        Ok(())
    }
}

struct MockPipeline {
    work: Sender<Operation>,
    state: Arc<MockState>,
}

impl MockPipeline {
    fn spawn(
        state: Arc<MockState>,
        latency: Option<Duration>,
        fail: bool,
        completions: Sender<Completion>,
    ) -> Self {
        let (work_tx, work_rx) = crossbeam::channel::unbounded::<Operation>();
        let worker_state = Arc::clone(&state);
        std::thread::spawn(move || {
            for op in work_rx.iter() {
                if let Some(latency) = latency {
                    std::thread::sleep(latency);
                }
                let event = if fail {
                    Err(BenchError::Store("injected pipeline failure".to_owned()))
                } else {
                    worker_state.apply(&op);
                    Ok(())
                };
                worker_state.outstanding.fetch_sub(1, Ordering::SeqCst);
                if completions.send(event).is_err() {
                    break;
                }
            }
        });
        Self {
            work: work_tx,
            state,
        }
    }
}

impl PipelinedClient for MockPipeline {
    fn submit(&mut self, op: Operation) -> Result<()> {
        let outstanding = self.state.outstanding.fetch_add(1, Ordering::SeqCst) + 1;
        self.state
            .max_outstanding
            .fetch_max(outstanding, Ordering::SeqCst);
        self.work
            .send(op)
            .map_err(|_| BenchError::Store("mock worker hung up".to_owned()))
    }
}

impl StoreConnector for MockConnector {
    type Client = MockClient;
    type Pipeline = MockPipeline;

    fn connect(&self) -> Result<Self::Client> {
        Ok(MockClient {
            state: Arc::clone(&self.state),
            latency: self.latency,
        })
    }

    fn connect_pipeline(&self, completions: Sender<Completion>) -> Result<Self::Pipeline> {
        Ok(MockPipeline::spawn(
            Arc::clone(&self.state),
            self.latency,
            self.fail_pipeline,
            completions,
        ))
    }
}

fn discard_logger() -> slog::Logger {
    slog::Logger::root(slog::Discard, o!("" => ""))
}

fn small_keyspace() -> KeySpace {
    KeySpace {
        get_keys: 500,
        set_keys: 400,
        read_probability: 0.8,
    }
}

#[test]
fn warmup_seeds_every_key() {
    let connector = MockConnector::new();
    let keyspace = KeySpace {
        get_keys: 3000,
        set_keys: 2500,
        read_probability: 0.8,
    };
    let mut client = connector.connect().unwrap();
    let mut workload = Workload::seeded(keyspace, 7);
    warmup(&mut client, &mut workload, &discard_logger()).expect("warmup failed");

    let map = connector.state.map.lock().unwrap();
    assert_eq!(map.len(), 2500);
    for key in 1..=2500u64 {
        let value = map
            .get(&key.to_string())
            .unwrap_or_else(|| panic!("key {} missing after warmup", key));
        assert!(value.len() >= 2, "key {} has a {}-byte payload", key, value.len());
    }
    drop(map);

    // 2500 keys at 1000 per batch: two full batches plus the remainder.
    let batch_sizes = connector.state.batch_sizes.lock().unwrap();
    assert_eq!(*batch_sizes, vec![1000, 1000, 500]);
    assert_eq!(connector.state.flushes.load(Ordering::SeqCst), 1);
}

#[test]
fn payload_sizes_respect_the_minimum() {
    let mut workload = Workload::seeded(small_keyspace(), 11);
    let mut sum = 0u64;
    const SAMPLES: usize = 100_000;
    for _ in 0..SAMPLES {
        let size = workload.next_payload_size();
        assert!(size >= 2, "sampled a {}-byte payload", size);
        sum += size as u64;
    }
    let mean = sum as f64 / SAMPLES as f64;
    assert!(
        (mean - 1024.0).abs() < 10.0,
        "sample mean {} too far from 1024",
        mean
    );
}

#[test]
fn read_fraction_tracks_the_configured_probability() {
    let mut workload = Workload::seeded(small_keyspace(), 13);
    const TRIALS: usize = 100_000;
    let reads = (0..TRIALS).filter(|_| workload.should_read()).count();
    let fraction = reads as f64 / TRIALS as f64;
    assert!(
        (fraction - 0.8).abs() < 0.01,
        "observed read fraction {}",
        fraction
    );
}

#[test]
fn indivisible_totals_fail_before_any_operation() {
    let connector = MockConnector::new();
    let keyspace = small_keyspace();

    let res = run_threaded(&connector, keyspace, 3, 100);
    assert!(matches!(res, Err(BenchError::Precondition(_))));

    let res = run_batched(&connector, keyspace, 7, 100);
    assert!(matches!(res, Err(BenchError::Precondition(_))));

    let res = run_window(&connector, keyspace, 50, 1, 10);
    assert!(matches!(res, Err(BenchError::Precondition(_))));

    assert_eq!(connector.state.ops_completed(), 0);
    assert!(connector.state.batch_sizes.lock().unwrap().is_empty());
}

#[test]
fn scenario_validation_matches_runner_preconditions() {
    let bad = [
        Scenario {
            strategy: Strategy::Threaded { threads: 3 },
            total_ops: 100,
        },
        Scenario {
            strategy: Strategy::Batched { batch_size: 7 },
            total_ops: 100,
        },
        Scenario {
            strategy: Strategy::BoundedWindow {
                window: 50,
                connections: 1,
            },
            total_ops: 10,
        },
        Scenario {
            strategy: Strategy::Serial,
            total_ops: 0,
        },
    ];
    for scenario in &bad {
        assert!(
            matches!(scenario.validate(), Err(BenchError::Precondition(_))),
            "{:?} passed validation",
            scenario
        );
    }

    let err = Harness::new(
        MockConnector::new(),
        small_keyspace(),
        bad.to_vec(),
        discard_logger(),
    )
    .err()
    .expect("harness accepted a malformed sweep");
    assert!(matches!(err, BenchError::Precondition(_)));
}

#[test]
fn window_bound_is_never_exceeded() {
    let connector = MockConnector::with_latency(Duration::from_micros(100));
    let (elapsed, completed) = run_window(&connector, small_keyspace(), 10, 2, 200).unwrap();
    assert_eq!(completed, 200);
    assert_eq!(connector.state.ops_completed(), 200);
    assert!(elapsed > Duration::new(0, 0));
    let max = connector.state.max_outstanding.load(Ordering::SeqCst);
    assert!(
        max <= 10,
        "observed {} outstanding operations with a window of 10",
        max
    );
}

#[test]
fn every_strategy_completes_the_exact_operation_count() {
    let scenarios = [
        Scenario {
            strategy: Strategy::Serial,
            total_ops: 100,
        },
        Scenario {
            strategy: Strategy::Threaded { threads: 10 },
            total_ops: 1000,
        },
        Scenario {
            strategy: Strategy::BoundedWindow {
                window: 10,
                connections: 2,
            },
            total_ops: 300,
        },
        Scenario {
            strategy: Strategy::Batched { batch_size: 5 },
            total_ops: 200,
        },
    ];
    for scenario in &scenarios {
        let connector = MockConnector::new();
        let result: RunResult = run_scenario(&connector, small_keyspace(), *scenario).unwrap();
        assert_eq!(result.completed, scenario.total_ops, "{:?}", scenario);
        assert_eq!(
            connector.state.ops_completed(),
            scenario.total_ops,
            "{:?}",
            scenario
        );
        assert!(result.throughput() > 0.0);
    }
}

#[test]
fn serial_elapsed_tracks_per_operation_latency() {
    let connector = MockConnector::with_latency(Duration::from_millis(1));
    let (elapsed, completed) = run_serial(&connector, small_keyspace(), 100).unwrap();
    assert_eq!(completed, 100);
    assert!(
        elapsed >= Duration::from_millis(100),
        "elapsed {:?} below the latency floor",
        elapsed
    );
    assert!(
        elapsed < Duration::from_secs(1),
        "elapsed {:?} far above 100 x 1ms",
        elapsed
    );
}

#[test]
fn threaded_counter_loses_no_increments() {
    for _ in 0..100 {
        let connector = MockConnector::new();
        let (_, completed) = run_threaded(&connector, small_keyspace(), 10, 1000).unwrap();
        assert_eq!(completed, 1000);
        assert_eq!(connector.state.ops_completed(), 1000);
    }
}

#[test]
fn batched_issues_exactly_total_over_size_batches() {
    let connector = MockConnector::new();
    let (_, completed) = run_batched(&connector, small_keyspace(), 5, 20).unwrap();
    assert_eq!(completed, 20);
    let batch_sizes = connector.state.batch_sizes.lock().unwrap();
    assert_eq!(*batch_sizes, vec![5, 5, 5, 5]);
}

#[test]
fn harness_runs_the_sweep_and_warms_up_before_each_scenario() {
    let connector = MockConnector::new();
    let scenarios = vec![
        Scenario {
            strategy: Strategy::Serial,
            total_ops: 50,
        },
        Scenario {
            strategy: Strategy::Batched { batch_size: 10 },
            total_ops: 100,
        },
    ];
    let harness = Harness::new(
        connector.clone(),
        small_keyspace(),
        scenarios,
        discard_logger(),
    )
    .unwrap();
    let results = harness.run().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].completed, 50);
    assert_eq!(results[1].completed, 100);
    // One flush per scenario warmup.
    assert_eq!(connector.state.flushes.load(Ordering::SeqCst), 2);
}

#[test]
fn a_failed_scenario_does_not_abort_the_sweep() {
    let mut connector = MockConnector::new();
    connector.fail_pipeline = true;
    let scenarios = vec![
        Scenario {
            strategy: Strategy::BoundedWindow {
                window: 5,
                connections: 1,
            },
            total_ops: 50,
        },
        Scenario {
            strategy: Strategy::Serial,
            total_ops: 40,
        },
    ];
    let harness = Harness::new(
        connector.clone(),
        small_keyspace(),
        scenarios,
        discard_logger(),
    )
    .unwrap();
    let results = harness.run().unwrap();
    assert_eq!(results.len(), 1, "only the serial scenario should succeed");
    assert_eq!(results[0].scenario.strategy, Strategy::Serial);
    assert_eq!(results[0].completed, 40);
}

#[test]
fn scenarios_round_trip_through_json() {
    let scenarios = vec![
        Scenario {
            strategy: Strategy::Threaded { threads: 8 },
            total_ops: 1_000_000,
        },
        Scenario {
            strategy: Strategy::BoundedWindow {
                window: 100,
                connections: 2,
            },
            total_ops: 3_000_000,
        },
    ];
    let json = serde_json::to_string(&scenarios).unwrap();
    let parsed: Vec<Scenario> = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, scenarios);
}
