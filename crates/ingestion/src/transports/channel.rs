//! In-process transport
//!
//! Bytes pushed through a [`ChannelTransportSender`] come out of `read`.
//! Used for injection from other components and in tests.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use contracts::{ContractError, Transport, TransportRead};

/// Create a connected transport / sender pair
pub fn channel(name: impl Into<String>) -> (ChannelTransport, ChannelTransportSender) {
    let (tx, rx) = mpsc::channel();
    let written = Arc::new(Mutex::new(Vec::new()));
    let name = name.into();
    (
        ChannelTransport {
            name: name.clone(),
            rx,
            written: Arc::clone(&written),
        },
        ChannelTransportSender { name, tx, written },
    )
}

pub struct ChannelTransport {
    name: String,
    rx: Receiver<Bytes>,
    written: Arc<Mutex<Vec<Bytes>>>,
}

impl Transport for ChannelTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read(&mut self, timeout: Duration) -> Result<TransportRead, ContractError> {
        match self.rx.recv_timeout(timeout) {
            Ok(data) => Ok(TransportRead::Data(data)),
            Err(RecvTimeoutError::Timeout) => Ok(TransportRead::Idle),
            Err(RecvTimeoutError::Disconnected) => Ok(TransportRead::Closed),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, ContractError> {
        self.written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Bytes::copy_from_slice(data));
        Ok(data.len())
    }
}

/// Producer half; the transport reports `Closed` once every clone is dropped
#[derive(Clone)]
pub struct ChannelTransportSender {
    name: String,
    tx: Sender<Bytes>,
    written: Arc<Mutex<Vec<Bytes>>>,
}

impl ChannelTransportSender {
    /// Push raw bytes (not necessarily frame aligned)
    pub fn send(&self, data: impl Into<Bytes>) -> Result<(), ContractError> {
        self.tx
            .send(data.into())
            .map_err(|_| ContractError::data_source(&self.name, "transport dropped"))
    }

    /// Push one newline-terminated frame
    pub fn send_line(&self, line: &str) -> Result<(), ContractError> {
        let mut data = Vec::with_capacity(line.len() + 1);
        data.extend_from_slice(line.as_bytes());
        data.push(b'\n');
        self.send(data)
    }

    /// Drain what the source wrote to the transport
    pub fn take_written(&self) -> Vec<Bytes> {
        std::mem::take(&mut *self.written.lock().unwrap_or_else(PoisonError::into_inner))
    }
}
