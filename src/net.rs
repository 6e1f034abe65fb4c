use crate::client::{
    Batch, Completion, Operation, PipelinedClient, StoreClient, StoreConnector,
};
use crate::error::{BenchError, Result};
use crate::protocol::{self, Request, Response};
use crossbeam::channel::Sender;
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread::JoinHandle;
use std::time::Duration;

/// Read timeout applied to every benchmark connection
const READ_TIMEOUT: Duration = Duration::from_secs(3);

fn open_stream(addr: SocketAddr) -> Result<TcpStream> {
    let stream = TcpStream::connect(addr).map_err(BenchError::Connection)?;
    stream.set_read_timeout(Some(READ_TIMEOUT))?;
    // One request per frame; buffering small frames only adds latency.
    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Blocking store client over one persistent tcp connection.
pub struct TcpStoreClient {
    stream: TcpStream,
}

impl TcpStoreClient {
    /// Connects to the store listening on `addr`.
    pub fn connect(addr: SocketAddr) -> Result<Self> {
        Ok(Self {
            stream: open_stream(addr)?,
        })
    }

    fn roundtrip(&mut self, request: &Request) -> Result<Response> {
        protocol::write_frame(&mut self.stream, request)?;
        protocol::read_frame(&mut self.stream)
    }
}

impl StoreClient for TcpStoreClient {
    fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.roundtrip(&Request::Get { key: key.to_owned() })? {
            Response::Value(value) => Ok(value),
            Response::Error(msg) => Err(BenchError::Store(msg)),
            Response::Ok => Err(BenchError::UnexpectedResponse),
        }
    }

    fn set(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let request = Request::Set {
            key: key.to_owned(),
            value: value.to_owned(),
        };
        match self.roundtrip(&request)? {
            Response::Ok => Ok(()),
            Response::Error(msg) => Err(BenchError::Store(msg)),
            Response::Value(_) => Err(BenchError::UnexpectedResponse),
        }
    }

    fn flush_all(&mut self) -> Result<()> {
        match self.roundtrip(&Request::FlushAll)? {
            Response::Ok => Ok(()),
            Response::Error(msg) => Err(BenchError::Store(msg)),
            Response::Value(_) => Err(BenchError::UnexpectedResponse),
        }
    }

    fn execute(&mut self, batch: &Batch) -> Result<()> {
        for op in batch.operations() {
            protocol::write_frame(&mut self.stream, &Request::from(op))?;
        }
        for op in batch.operations() {
            let response: Response = protocol::read_frame(&mut self.stream)?;
            match (op, response) {
                (Operation::Get { .. }, Response::Value(_)) => {}
                (Operation::Set { .. }, Response::Ok) => {}
                (_, Response::Error(msg)) => return Err(BenchError::Store(msg)),
                (_, _) => return Err(BenchError::UnexpectedResponse),
            }
        }
        Ok(())
    }
}

/// Pipelined store client over one tcp connection.
///
/// `submit` writes the request frame and returns; a dedicated reader thread
/// turns every response frame into exactly one event on the completion
/// channel. Dropping the client shuts the connection down and joins the
/// reader.
pub struct TcpPipeline {
    stream: TcpStream,
    reader: Option<JoinHandle<()>>,
}

impl TcpPipeline {
    /// Connects to the store listening on `addr`, reporting completions on
    /// `completions`.
    pub fn connect(addr: SocketAddr, completions: Sender<Completion>) -> Result<Self> {
        let stream = open_stream(addr)?;
        let read_half = stream.try_clone()?;
        // An idle pipelined connection is legitimate (the window may be
        // smaller than the connection count), so the reader waits without a
        // timeout; dropping the client unblocks it via shutdown.
        read_half.set_read_timeout(None)?;
        let reader = std::thread::spawn(move || Self::read_responses(read_half, completions));
        Ok(Self {
            stream,
            reader: Some(reader),
        })
    }

    fn read_responses(mut stream: TcpStream, completions: Sender<Completion>) {
        loop {
            let event = match protocol::read_frame::<_, Response>(&mut stream) {
                Ok(Response::Error(msg)) => Err(BenchError::Store(msg)),
                Ok(_) => Ok(()),
                Err(err) => {
                    // Connection torn down, either by the store or by our own
                    // shutdown on drop. The send fails silently in the latter
                    // case because the runner has already hung up.
                    let _ = completions.send(Err(err));
                    return;
                }
            };
            if completions.send(event).is_err() {
                return;
            }
        }
    }
}

impl PipelinedClient for TcpPipeline {
    fn submit(&mut self, op: Operation) -> Result<()> {
        protocol::write_frame(&mut self.stream, &Request::from(&op))
    }
}

impl Drop for TcpPipeline {
    fn drop(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
        if let Some(reader) = self.reader.take() {
            let _ = reader.join();
        }
    }
}

/// Connector opening tcp connections to one store address.
#[derive(Debug, Clone, Copy)]
pub struct TcpConnector {
    addr: SocketAddr,
}

impl TcpConnector {
    /// Creates a connector for the store listening on `addr`.
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl StoreConnector for TcpConnector {
    type Client = TcpStoreClient;
    type Pipeline = TcpPipeline;

    fn connect(&self) -> Result<Self::Client> {
        TcpStoreClient::connect(self.addr)
    }

    fn connect_pipeline(&self, completions: Sender<Completion>) -> Result<Self::Pipeline> {
        TcpPipeline::connect(self.addr, completions)
    }
}
