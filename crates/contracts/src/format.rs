//! Formatter trait - wire codec between transport frames and raw records

use crate::{ContractError, RawRecord};

/// Frame codec
///
/// One frame in, one record out. Implementations are stateless and shared
/// between source threads and sink workers.
pub trait Formatter: Send + Sync {
    /// Decode one frame (delimiter already stripped)
    ///
    /// # Errors
    /// [`ContractError::Format`] when the frame is not a valid record.
    fn deserialize(&self, frame: &[u8]) -> Result<RawRecord, ContractError>;

    /// Encode one record, without a trailing delimiter
    fn serialize(&self, record: &RawRecord) -> Result<Vec<u8>, ContractError>;
}

/// JSON codec: `{"name", "value", "event"?, "timestamp"?}` or `{"bus"?, "id", "data"}`
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonFormatter;

impl Formatter for JsonFormatter {
    fn deserialize(&self, frame: &[u8]) -> Result<RawRecord, ContractError> {
        serde_json::from_slice(frame).map_err(|e| {
            ContractError::format(format!(
                "{e} in '{}'",
                String::from_utf8_lossy(&frame[..frame.len().min(64)])
            ))
        })
    }

    fn serialize(&self, record: &RawRecord) -> Result<Vec<u8>, ContractError> {
        serde_json::to_vec(record).map_err(|e| ContractError::format(e.to_string()))
    }
}
