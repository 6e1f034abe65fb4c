//! Wire format spoken between the benchmark driver and the store.
//!
//! Every message is a bincode-encoded payload preceded by a fixed-size
//! little-endian length header.

use crate::client::Operation;
use crate::error::Result;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use std::io::prelude::*;

/// Size in bytes of the frame length header
pub const HEADER_SIZE: usize = 4;

/// A request frame sent to the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Request {
    /// Read the value stored under the key
    Get {
        /// Target key
        key: String,
    },
    /// Write the value under the key
    Set {
        /// Target key
        key: String,
        /// Payload bytes
        value: Vec<u8>,
    },
    /// Remove every key
    FlushAll,
}

impl From<&Operation> for Request {
    fn from(op: &Operation) -> Self {
        match op {
            Operation::Get { key } => Request::Get { key: key.clone() },
            Operation::Set { key, value } => Request::Set {
                key: key.clone(),
                value: value.clone(),
            },
        }
    }
}

/// A response frame received from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Response {
    /// The operation succeeded and carries no value
    Ok,
    /// The value found under the requested key, if any
    Value(Option<Vec<u8>>),
    /// The store could not execute the operation
    Error(String),
}

/// Writes `msg` to `stream` as one length-prefixed frame.
pub fn write_frame<W: Write, T: Serialize>(stream: &mut W, msg: &T) -> Result<()> {
    let payload_len = bincode::serialized_size(msg)? as usize;
    let mut buf: SmallVec<[u8; 256]> = smallvec![0; HEADER_SIZE + payload_len];
    buf[..HEADER_SIZE].copy_from_slice(&(payload_len as u32).to_le_bytes());
    bincode::serialize_into(&mut buf[HEADER_SIZE..], msg)?;
    stream.write_all(&buf[..])?;
    Ok(())
}

/// Reads one length-prefixed frame from `stream`.
pub fn read_frame<R: Read, T: DeserializeOwned>(stream: &mut R) -> Result<T> {
    let mut header_buf = [0u8; HEADER_SIZE];
    stream.read_exact(&mut header_buf)?;
    let payload_len = u32::from_le_bytes(header_buf) as usize;

    let mut payload_buf: SmallVec<[u8; 256]> = smallvec![0; payload_len];
    stream.read_exact(&mut payload_buf)?;
    Ok(bincode::deserialize(&payload_buf)?)
}
