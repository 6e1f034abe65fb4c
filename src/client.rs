use crate::error::Result;
use crate::BenchError;
use crossbeam::channel::Sender;

/// One generated request against the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    /// Read the value stored under `key`
    Get {
        /// Target key, a decimal integer rendered as text
        key: String,
    },
    /// Write `value` under `key`
    Set {
        /// Target key, a decimal integer rendered as text
        key: String,
        /// Payload bytes
        value: Vec<u8>,
    },
}

/// Outcome of one pipelined operation, delivered on the completion channel.
pub type Completion = std::result::Result<(), BenchError>;

/// A group of operations submitted to the store as one network flush.
#[derive(Debug, Default)]
pub struct Batch {
    ops: Vec<Operation>,
}

impl Batch {
    /// Creates an empty batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty batch with room for `capacity` operations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            ops: Vec::with_capacity(capacity),
        }
    }

    /// Queues a GET for `key`.
    pub fn get(&mut self, key: String) {
        self.ops.push(Operation::Get { key });
    }

    /// Queues a SET of `value` under `key`.
    pub fn set(&mut self, key: String, value: Vec<u8>) {
        self.ops.push(Operation::Set { key, value });
    }

    /// Queues an already-generated operation.
    pub fn push(&mut self, op: Operation) {
        self.ops.push(op);
    }

    /// Number of queued operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when no operation has been queued.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// The queued operations, in submission order.
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }
}

/// The capability set the harness needs from a blocking key-value client.
///
/// Implementations are not required to support concurrent command issuance
/// from several threads; runners that need parallelism open one client per
/// thread through a [`StoreConnector`].
pub trait StoreClient {
    /// Reads the value stored under `key`, `None` when the key is absent.
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` under `key`.
    fn set(&mut self, key: &str, value: &[u8]) -> Result<()>;

    /// Removes every key from the store.
    fn flush_all(&mut self) -> Result<()>;

    /// Submits every operation of `batch` as one flush and waits until the
    /// store has answered all of them.
    fn execute(&mut self, batch: &Batch) -> Result<()>;
}

/// A client that keeps several operations in flight on one connection.
///
/// Implementations deliver exactly one [`Completion`] per submitted
/// operation on the channel handed over at construction time, in the order
/// the store answers.
pub trait PipelinedClient {
    /// Queues `op` for execution without waiting for its result.
    fn submit(&mut self, op: Operation) -> Result<()>;
}

/// Factory for store connections, hiding the transport from the runners.
pub trait StoreConnector {
    /// The blocking client this connector produces
    type Client: StoreClient + Send + 'static;
    /// The pipelined client this connector produces
    type Pipeline: PipelinedClient;

    /// Opens a fresh blocking connection.
    fn connect(&self) -> Result<Self::Client>;

    /// Opens a fresh pipelined connection reporting on `completions`.
    fn connect_pipeline(&self, completions: Sender<Completion>) -> Result<Self::Pipeline>;
}
