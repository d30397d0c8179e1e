//! Transport trait - byte-level device driver contract
//!
//! Serial, USB, socket and trace-file drivers all reduce to a blocking read with
//! a bounded timeout. DataSource owns one transport and polls it from its thread.

use std::time::Duration;

use bytes::Bytes;

use crate::ContractError;

/// Outcome of one bounded read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportRead {
    /// Some bytes, not necessarily frame aligned
    Data(Bytes),
    /// Nothing arrived within the timeout
    Idle,
    /// End of stream; no more data will ever arrive
    Closed,
}

/// Byte transport
pub trait Transport: Send {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Read whatever is available, waiting at most `timeout`
    ///
    /// # Errors
    /// Any error is fatal for the owning source.
    fn read(&mut self, timeout: Duration) -> Result<TransportRead, ContractError>;

    /// Write raw bytes to the device (command channel)
    fn write(&mut self, data: &[u8]) -> Result<usize, ContractError>;
}
