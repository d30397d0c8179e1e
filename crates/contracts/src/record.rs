//! Raw records - Formatter output, Vehicle input
//!
//! Untyped payloads as produced by a transport before translation.

use std::sync::Arc;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Untyped scalar as found on the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Type label used in error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Number(_) => "number",
            Self::Text(_) => "text",
        }
    }
}

impl From<f64> for RawValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<bool> for RawValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for RawValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Decoded `{name, value, event?}` message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMeasurement {
    pub name: String,

    pub value: RawValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<RawValue>,

    /// Epoch seconds, when the producer stamped the record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
}

impl RawMeasurement {
    pub fn new(name: impl Into<String>, value: impl Into<RawValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            event: None,
            timestamp: None,
        }
    }

    pub fn with_event(mut self, event: impl Into<RawValue>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_timestamp(mut self, timestamp: f64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Undecoded bus frame `{bus?, id, data}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bus: Option<u8>,

    pub id: u32,

    /// Frame payload, `0x`-prefixed hex on the wire
    #[serde(with = "hex_bytes")]
    pub data: Bytes,
}

/// Formatter output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawRecord {
    Measurement(RawMeasurement),
    CanMessage(CanMessage),
}

impl RawRecord {
    /// Measurement name, or `can_message` for bus frames
    pub fn name(&self) -> &str {
        match self {
            Self::Measurement(m) => &m.name,
            Self::CanMessage(_) => "can_message",
        }
    }
}

impl From<RawMeasurement> for RawRecord {
    fn from(value: RawMeasurement) -> Self {
        Self::Measurement(value)
    }
}

impl From<CanMessage> for RawRecord {
    fn from(value: CanMessage) -> Self {
        Self::CanMessage(value)
    }
}

/// A raw record stamped with its source and per-source arrival order
#[derive(Debug, Clone)]
pub struct SourceRecord {
    pub source_id: Arc<str>,

    /// 1-based, strictly increasing per source
    pub sequence: u64,

    pub record: RawRecord,
}

mod hex_bytes {
    use bytes::Bytes;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        let mut encoded = String::with_capacity(2 + data.len() * 2);
        encoded.push_str("0x");
        for byte in data.iter() {
            encoded.push_str(&format!("{byte:02x}"));
        }
        serializer.serialize_str(&encoded)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        let text = String::deserialize(deserializer)?;
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(&text);
        if !digits.is_ascii() || digits.len() % 2 != 0 {
            return Err(D::Error::custom(format!("malformed hex payload '{text}'")));
        }
        (0..digits.len())
            .step_by(2)
            .map(|i| u8::from_str_radix(&digits[i..i + 2], 16))
            .collect::<Result<Vec<u8>, _>>()
            .map(Bytes::from)
            .map_err(|e| D::Error::custom(format!("invalid hex payload '{text}': {e}")))
    }
}
