#[macro_use]
extern crate clap;

#[macro_use]
extern crate slog;
extern crate slog_async;
extern crate slog_term;

use clap::{App, Arg};
use kvbench::{Harness, KeySpace, Scenario, Strategy, TcpConnector};
use slog::Drain;

const DEFAULT_SERVER_IP_PORT: &'static str = "127.0.0.1:4000";
const DEFAULT_TOTAL_OPS: &'static str = "1000000";

macro_rules! unwrap_or_exit_err {
    ($res:expr, $logger:expr, $desc:expr) => {
        $res.map_err(|e| {
            error!($logger, "Could not {}", $desc; "error" => e.to_string());
            1i32
        })?
    };
}

/// The sweep modelled on the published driver suites: a serial baseline,
/// doubling thread counts up to twice the host parallelism, window bounds
/// over one and two connections, and three batch sizes. Totals are rounded
/// down to the nearest multiple of the concurrency parameter so every
/// scenario satisfies its own divisibility invariant.
fn default_scenarios(ops: u64) -> Vec<Scenario> {
    let mut scenarios = vec![Scenario {
        strategy: Strategy::Serial,
        total_ops: ops,
    }];

    let thread_counts = std::iter::successors(Some(1u32), |n| n.checked_mul(2))
        .take_while(|n| *n <= 2 * num_cpus::get() as u32);
    for threads in thread_counts {
        let total_ops = ops - ops % u64::from(threads);
        if total_ops > 0 {
            scenarios.push(Scenario {
                strategy: Strategy::Threaded { threads },
                total_ops,
            });
        }
    }

    for &window in &[1u64, 10, 100, 1000] {
        for &connections in &[1u32, 2] {
            if ops >= window {
                scenarios.push(Scenario {
                    strategy: Strategy::BoundedWindow {
                        window,
                        connections,
                    },
                    total_ops: ops,
                });
            }
        }
    }

    for &batch_size in &[10u64, 100, 1000] {
        let total_ops = ops - ops % batch_size;
        if total_ops > 0 {
            scenarios.push(Scenario {
                strategy: Strategy::Batched { batch_size },
                total_ops,
            });
        }
    }

    scenarios
}

fn run_bench(matches: &clap::ArgMatches) -> Result<(), i32> {
    let decorator = slog_term::TermDecorator::new().stderr().build();
    let drain = slog_term::FullFormat::new(decorator)
        .use_utc_timestamp()
        .use_original_order()
        .build()
        .fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    let log = slog::Logger::root(drain, o!("version" => crate_version!()));

    let addr = matches
        .value_of("addr")
        .unwrap()
        .parse::<std::net::SocketAddr>()
        .unwrap();
    let ops = matches.value_of("ops").unwrap().parse::<u64>().unwrap();
    let keyspace = KeySpace {
        get_keys: matches.value_of("get-keys").unwrap().parse::<u64>().unwrap(),
        set_keys: matches.value_of("set-keys").unwrap().parse::<u64>().unwrap(),
        read_probability: matches
            .value_of("read-prob")
            .unwrap()
            .parse::<f64>()
            .unwrap(),
    };

    let scenarios = match matches.value_of("scenarios") {
        Some(path) => {
            let file = unwrap_or_exit_err!(
                std::fs::File::open(path),
                log,
                format!("open scenario file {}", path)
            );
            unwrap_or_exit_err!(
                serde_json::from_reader(std::io::BufReader::new(file)),
                log,
                format!("parse the json scenario list in {}", path)
            )
        }
        None => default_scenarios(ops),
    };

    info!(log, "starting benchmark";
        "address" => addr,
        "scenarios" => scenarios.len(),
        "get_keys" => keyspace.get_keys,
        "set_keys" => keyspace.set_keys,
        "read_probability" => keyspace.read_probability,
    );

    let harness = unwrap_or_exit_err!(
        Harness::new(TcpConnector::new(addr), keyspace, scenarios, log.clone()),
        log,
        "validate the scenario list"
    );
    let results = unwrap_or_exit_err!(harness.run(), log, "complete the benchmark run");

    for result in results {
        println!(
            "strategy={} concurrency={} tps={:.2} elapsed={:.3}s",
            result.scenario.strategy.name(),
            result.scenario.strategy.concurrency(),
            result.throughput(),
            result.elapsed.as_secs_f64(),
        );
    }
    Ok(())
}

fn main() {
    let is_valid_addr = |v: String| {
        v.parse::<std::net::SocketAddr>()
            .map(|_| ())
            .map_err(|e| e.to_string())
    };
    let is_valid_count = |v: String| v.parse::<u64>().map(|_| ()).map_err(|e| e.to_string());
    let is_valid_probability = |v: String| {
        v.parse::<f64>()
            .map_err(|e| e.to_string())
            .and_then(|p| {
                if (0.0..=1.0).contains(&p) {
                    Ok(())
                } else {
                    Err(format!("{} is not a probability", p))
                }
            })
    };

    let matches = App::new(crate_name!())
        .version(crate_version!())
        .about(crate_description!())
        .args(&[
            Arg::with_name("addr")
                .long("addr")
                .value_name("IP-PORT")
                .help("Sets the store server IP address, either v4 or v6, and port number, with the format IP:PORT")
                .takes_value(true)
                .default_value(DEFAULT_SERVER_IP_PORT)
                .validator(is_valid_addr),
            Arg::with_name("ops")
                .long("ops")
                .value_name("COUNT")
                .help("Sets the number of operations issued per scenario in the default sweep")
                .takes_value(true)
                .default_value(DEFAULT_TOTAL_OPS)
                .validator(is_valid_count),
            Arg::with_name("get-keys")
                .long("get-keys")
                .value_name("COUNT")
                .help("Sets the size of the key-space targeted by GET operations")
                .takes_value(true)
                .default_value("3750000")
                .validator(is_valid_count),
            Arg::with_name("set-keys")
                .long("set-keys")
                .value_name("COUNT")
                .help("Sets the size of the key-space targeted by SET operations and seeded during warmup")
                .takes_value(true)
                .default_value("3000000")
                .validator(is_valid_count),
            Arg::with_name("read-prob")
                .long("read-prob")
                .value_name("PROBABILITY")
                .help("Sets the probability that a generated operation is a GET")
                .takes_value(true)
                .default_value("0.8")
                .validator(is_valid_probability),
            Arg::with_name("scenarios")
                .long("scenarios")
                .value_name("FILE")
                .help("Runs the scenario list from a json file instead of the default sweep")
                .takes_value(true),
        ])
        .get_matches();

    run_bench(&matches).unwrap_or_else(|code| std::process::exit(code));
}
