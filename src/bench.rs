use crate::client::StoreConnector;
use crate::error::{BenchError, Result};
use crate::strategy::{run_scenario, RunResult, Scenario};
use crate::warmup::warmup;
use crate::workload::{KeySpace, Workload};
use slog::Logger;

/// Sequences a list of scenarios against one store.
///
/// Each scenario gets a fresh warmup of the write key-space before it is
/// measured. A failed scenario is logged and skipped; a failed warmup or a
/// malformed scenario aborts the whole run.
pub struct Harness<T: StoreConnector> {
    connector: T,
    keyspace: KeySpace,
    scenarios: Vec<Scenario>,
    log: Logger,
}

impl<T: StoreConnector> Harness<T> {
    /// Creates a harness over `connector`, validating every scenario up
    /// front so a malformed sweep fails before any operation is issued.
    pub fn new(
        connector: T,
        keyspace: KeySpace,
        scenarios: Vec<Scenario>,
        log: Logger,
    ) -> Result<Self> {
        for scenario in &scenarios {
            scenario.validate()?;
        }
        Ok(Self {
            connector,
            keyspace,
            scenarios,
            log,
        })
    }

    /// Runs every scenario in order and returns the completed measurements.
    pub fn run(&self) -> Result<Vec<RunResult>> {
        let mut results = Vec::with_capacity(self.scenarios.len());
        for scenario in &self.scenarios {
            let log = self.log.new(o!(
                "strategy" => scenario.strategy.name(),
                "concurrency" => scenario.strategy.concurrency(),
                "total_ops" => scenario.total_ops,
            ));

            let mut client = self.connector.connect().map_err(|e| {
                BenchError::FatalWarmup(format!("could not connect for warmup: {}", e))
            })?;
            let mut workload = Workload::from_entropy(self.keyspace);
            warmup(&mut client, &mut workload, &log)?;
            drop(client);

            info!(log, "starting scenario");
            match run_scenario(&self.connector, self.keyspace, *scenario) {
                Ok(result) => {
                    info!(log, "scenario complete";
                        "elapsed_secs" => result.elapsed.as_secs_f64(),
                        "tps" => result.throughput(),
                    );
                    results.push(result);
                }
                Err(e @ BenchError::Precondition(_)) => return Err(e),
                Err(e) => {
                    error!(log, "scenario failed"; "error" => e.to_string());
                }
            }
        }
        Ok(results)
    }
}
