use crate::client::Operation;
use rand::{rngs::StdRng, FromEntropy, Rng, SeedableRng};

/// Mean of the Gaussian payload size distribution, in bytes.
const PAYLOAD_MEAN: f64 = 1024.0;
/// Standard deviation of the Gaussian payload size distribution, in bytes.
const PAYLOAD_STD_DEV: f64 = 400.0;
/// Smallest payload ever produced. Samples below it are clamped up.
const PAYLOAD_MIN: usize = 2;

/// Key-space and read/write-mix parameters for one benchmark run.
///
/// The values are fixed for the whole run; every runner and worker thread
/// copies them into its own [`Workload`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySpace {
    /// Number of distinct keys targeted by GET operations
    pub get_keys: u64,
    /// Number of distinct keys targeted by SET operations
    pub set_keys: u64,
    /// Probability that a generated operation is a read
    pub read_probability: f64,
}

impl Default for KeySpace {
    fn default() -> Self {
        Self {
            get_keys: 3_750_000,
            set_keys: 3_000_000,
            read_probability: 0.8,
        }
    }
}

/// Generator for the synthetic request stream.
///
/// Each instance owns its pseudo-random source. Runners construct one
/// generator per invocation, and the threaded runner one per worker thread,
/// so no synchronization is ever needed around the entropy source.
pub struct Workload<R: Rng = StdRng> {
    keyspace: KeySpace,
    rng: R,
}

impl Workload<StdRng> {
    /// Creates a generator seeded from OS entropy.
    pub fn from_entropy(keyspace: KeySpace) -> Self {
        Self::with_rng(keyspace, StdRng::from_entropy())
    }

    /// Creates a generator with a fixed seed, producing a reproducible stream.
    pub fn seeded(keyspace: KeySpace, seed: u64) -> Self {
        Self::with_rng(keyspace, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Workload<R> {
    /// Creates a generator over the given random source.
    pub fn with_rng(keyspace: KeySpace, rng: R) -> Self {
        Self { keyspace, rng }
    }

    /// The key-space parameters this generator samples from.
    pub fn keyspace(&self) -> KeySpace {
        self.keyspace
    }

    /// Key for the next SET, uniform over `[1, set_keys]`.
    pub fn next_set_key(&mut self) -> String {
        self.rng.gen_range(1, self.keyspace.set_keys + 1).to_string()
    }

    /// Key for the next GET, uniform over `[1, get_keys]`.
    pub fn next_get_key(&mut self) -> String {
        self.rng.gen_range(1, self.keyspace.get_keys + 1).to_string()
    }

    /// Payload size for the next SET, sampled from a normal distribution
    /// with mean 1024 and standard deviation 400 and clamped to at least 2.
    pub fn next_payload_size(&mut self) -> usize {
        // Box-Muller transform over two independent uniform (0, 1] samples.
        let u1: f64 = 1.0 - self.rng.gen::<f64>();
        let u2: f64 = 1.0 - self.rng.gen::<f64>();
        let gaussian = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        let size = (PAYLOAD_MEAN + PAYLOAD_STD_DEV * gaussian).floor();
        if size < PAYLOAD_MIN as f64 {
            PAYLOAD_MIN
        } else {
            size as usize
        }
    }

    /// Payload bytes for the next SET: `b'0'` repeated `next_payload_size()` times.
    pub fn next_payload(&mut self) -> Vec<u8> {
        vec![b'0'; self.next_payload_size()]
    }

    /// Bernoulli trial deciding whether the next operation is a read.
    pub fn should_read(&mut self) -> bool {
        self.rng.gen::<f64>() < self.keyspace.read_probability
    }

    /// Draws the next operation of the request stream.
    pub fn next_operation(&mut self) -> Operation {
        if self.should_read() {
            Operation::Get {
                key: self.next_get_key(),
            }
        } else {
            Operation::Set {
                key: self.next_set_key(),
                value: self.next_payload(),
            }
        }
    }
}
