/// The result type used across the benchmark harness API
pub type Result<T> = std::result::Result<T, BenchError>;

/// An error type for any errors returned by the benchmark harness
#[derive(Debug, Fail)]
pub enum BenchError {
    /// A transport-level failure while reaching the store
    #[fail(display = "Connection error: {}.", _0)]
    Connection(#[cause] std::io::Error),
    /// An operation exceeded the read timeout configured on the connection
    #[fail(display = "Operation timed out: {}.", _0)]
    Timeout(#[cause] std::io::Error),
    /// Scenario parameters violate a divisibility or bound invariant
    #[fail(display = "Invalid scenario parameters: {}.", _0)]
    Precondition(String),
    /// The store could not be cleared or seeded before measurement
    #[fail(display = "Warmup failed: {}.", _0)]
    FatalWarmup(String),
    /// An error that came from the bincode crate while coding a wire frame
    #[fail(display = "Codec error: {}.", _0)]
    Codec(#[cause] bincode::Error),
    /// The store answered a request with an error status
    #[fail(display = "Store error: {}.", _0)]
    Store(String),
    /// The store answered a request with a response of the wrong kind
    #[fail(display = "Protocol error: received an unexpected response kind.")]
    UnexpectedResponse,
}

impl From<std::io::Error> for BenchError {
    fn from(error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock => {
                Self::Timeout(error)
            }
            _ => Self::Connection(error),
        }
    }
}

impl From<bincode::Error> for BenchError {
    fn from(error: bincode::Error) -> Self {
        Self::Codec(error)
    }
}
