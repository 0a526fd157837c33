//! Data point codec: standardized names in, engineering values out.
//!
//! The codec is the only place protocol knowledge lives. It resolves a
//! device id to a register map through the directory and registry, performs
//! the raw transport call with a per-call timeout, and converts between the
//! big-endian register payload and a scaled engineering value. Consumers
//! such as the DLM engine stay ignorant of addressing, scaling, and byte
//! layout.

use std::sync::Arc;
use std::time::Duration;

use byteorder::{BigEndian, ByteOrder};
use thiserror::Error;
use tracing::debug;

use crate::directory::DeviceDirectory;
use crate::regmap::{DataType, RegisterClass, RegisterDefinition, RegisterMapRegistry};
use crate::transport::{Transport, TransportError};

/// Decoded engineering value of a data point.
#[derive(Debug, Clone, PartialEq)]
pub enum PointValue {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl PointValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            PointValue::Number(n) => Some(*n),
            PointValue::Bool(_) | PointValue::Text(_) => None,
        }
    }
}

/// Result of reading a data point: the scaled value plus the unit declared
/// in the register map.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadValue {
    pub value: PointValue,
    pub unit: Option<String>,
}

/// Everything that can go wrong between a data-point name and the wire.
///
/// Each failure point in the resolve/decode/encode chain has its own kind so
/// callers can tell a bad catalog from a bad device from a bad request. All
/// of these are ordinary `Result` values; a single bad register must never
/// abort a whole control cycle.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CodecError {
    #[error("device `{0}` is not known to the directory")]
    DeviceNotFound(String),
    #[error("no register map registered for {manufacturer}:{model}")]
    MapNotFound { manufacturer: String, model: String },
    #[error("data point `{point}` is not defined in the map for {model}")]
    RegisterNotFound { point: String, model: String },
    #[error("data point `{0}` is not writable")]
    NotWritable(String),
    #[error("data point `{point}` is a {class} register; only holding registers accept writes")]
    InvalidRegisterClass {
        point: String,
        class: RegisterClass,
    },
    #[error("payload for `{point}` too short: need {needed} bytes, got {got}")]
    BufferTooShort {
        point: String,
        needed: usize,
        got: usize,
    },
    #[error("data point `{point}` has unsupported data type {data_type} for this operation")]
    UnsupportedDataType { point: String, data_type: DataType },
    #[error("value for `{point}` does not match declared type {expected}")]
    TypeMismatch { point: String, expected: DataType },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Decodes a raw register payload into an engineering value.
///
/// Multi-byte values are big-endian; numeric values are scaled by
/// multiplication with the definition's scale factor. Text is ASCII bounded
/// by the declared register span, with trailing NULs trimmed.
pub fn decode_value(def: &RegisterDefinition, bytes: &[u8]) -> Result<PointValue, CodecError> {
    let needed = def.data_type.min_bytes();
    if bytes.len() < needed {
        return Err(CodecError::BufferTooShort {
            point: def.name.clone(),
            needed,
            got: bytes.len(),
        });
    }

    let value = match def.data_type {
        DataType::Uint16 => PointValue::Number(f64::from(BigEndian::read_u16(bytes)) * def.scale),
        DataType::Int16 => PointValue::Number(f64::from(BigEndian::read_i16(bytes)) * def.scale),
        DataType::Uint32 => PointValue::Number(f64::from(BigEndian::read_u32(bytes)) * def.scale),
        DataType::Int32 => PointValue::Number(f64::from(BigEndian::read_i32(bytes)) * def.scale),
        DataType::Float32 => {
            PointValue::Number(f64::from(BigEndian::read_f32(bytes)) * def.scale)
        }
        DataType::Boolean => PointValue::Bool(BigEndian::read_u16(bytes) != 0),
        DataType::Text => {
            let span = usize::from(def.register_count()) * 2;
            let raw = &bytes[..bytes.len().min(span)];
            let text: String = raw
                .iter()
                .take_while(|b| **b != 0)
                .map(|b| char::from(*b))
                .collect();
            PointValue::Text(text)
        }
    };
    Ok(value)
}

/// Encodes an engineering value into a raw register payload.
///
/// Numeric values are divided by the scale factor first; integer types round
/// to the nearest register value, float32 is written unrounded. The buffer
/// is exactly `register_count * 2` bytes with the value at offset zero.
pub fn encode_value(def: &RegisterDefinition, value: &PointValue) -> Result<Vec<u8>, CodecError> {
    let mut buf = vec![0u8; usize::from(def.register_count()) * 2];

    let numeric = |value: &PointValue| -> Result<f64, CodecError> {
        value.as_f64().ok_or_else(|| CodecError::TypeMismatch {
            point: def.name.clone(),
            expected: def.data_type,
        })
    };

    match def.data_type {
        DataType::Uint16 => {
            let raw = numeric(value)? / def.scale;
            BigEndian::write_u16(&mut buf, raw.round() as u16);
        }
        DataType::Int16 => {
            let raw = numeric(value)? / def.scale;
            BigEndian::write_i16(&mut buf, raw.round() as i16);
        }
        DataType::Uint32 => {
            let raw = numeric(value)? / def.scale;
            BigEndian::write_u32(&mut buf, raw.round() as u32);
        }
        DataType::Int32 => {
            let raw = numeric(value)? / def.scale;
            BigEndian::write_i32(&mut buf, raw.round() as i32);
        }
        DataType::Float32 => {
            let raw = numeric(value)? / def.scale;
            BigEndian::write_f32(&mut buf, raw as f32);
        }
        DataType::Boolean => {
            let PointValue::Bool(b) = value else {
                return Err(CodecError::TypeMismatch {
                    point: def.name.clone(),
                    expected: def.data_type,
                });
            };
            BigEndian::write_u16(&mut buf, u16::from(*b));
        }
        DataType::Text => {
            return Err(CodecError::UnsupportedDataType {
                point: def.name.clone(),
                data_type: def.data_type,
            });
        }
    }
    Ok(buf)
}

/// Reads and writes standardized data points over a raw transport.
pub struct DataPointCodec<T: Transport> {
    registry: Arc<RegisterMapRegistry>,
    directory: Arc<DeviceDirectory>,
    transport: Arc<T>,
    call_timeout: Duration,
}

impl<T: Transport> DataPointCodec<T> {
    pub fn new(
        registry: Arc<RegisterMapRegistry>,
        directory: Arc<DeviceDirectory>,
        transport: Arc<T>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            directory,
            transport,
            call_timeout,
        }
    }

    fn resolve(&self, device_id: &str, point: &str) -> Result<Resolved<'_>, CodecError> {
        let identity = self
            .directory
            .identity(device_id)
            .ok_or_else(|| CodecError::DeviceNotFound(device_id.to_string()))?;
        let map = self
            .registry
            .lookup(&identity.manufacturer, &identity.model)
            .ok_or_else(|| CodecError::MapNotFound {
                manufacturer: identity.manufacturer.clone(),
                model: identity.model.clone(),
            })?;
        let def = map.register(point).ok_or_else(|| CodecError::RegisterNotFound {
            point: point.to_string(),
            model: identity.model.clone(),
        })?;
        Ok(Resolved { identity, def })
    }

    /// Reads one data point and returns its scaled engineering value.
    ///
    /// No retries happen at this layer; the caller owns retry policy. A call
    /// exceeding the configured transport timeout fails with
    /// [`TransportError::Timeout`].
    pub async fn read_point(&self, device_id: &str, point: &str) -> Result<ReadValue, CodecError> {
        let Resolved { identity, def } = self.resolve(device_id, point)?;
        let count = def.register_count();

        let bytes = tokio::time::timeout(
            self.call_timeout,
            self.transport.read_raw(identity, def.address, count, def.class),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.call_timeout))??;

        let value = decode_value(def, &bytes)?;
        debug!(device = device_id, point, ?value, "read data point");
        Ok(ReadValue {
            value,
            unit: def.unit.clone(),
        })
    }

    /// Writes one data point, scaling and encoding the value per its
    /// definition.
    ///
    /// The definition must be writable and live in a holding register; both
    /// are checked before any transport traffic happens.
    pub async fn write_point(
        &self,
        device_id: &str,
        point: &str,
        value: &PointValue,
    ) -> Result<(), CodecError> {
        let Resolved { identity, def } = self.resolve(device_id, point)?;
        if !def.writable {
            return Err(CodecError::NotWritable(def.name.clone()));
        }
        if def.class != RegisterClass::Holding {
            return Err(CodecError::InvalidRegisterClass {
                point: def.name.clone(),
                class: def.class,
            });
        }

        let bytes = encode_value(def, value)?;
        tokio::time::timeout(
            self.call_timeout,
            self.transport
                .write_raw(identity, def.address, def.class, &bytes),
        )
        .await
        .map_err(|_| TransportError::Timeout(self.call_timeout))??;

        debug!(device = device_id, point, ?value, "wrote data point");
        Ok(())
    }
}

struct Resolved<'a> {
    identity: &'a crate::directory::DeviceIdentity,
    def: &'a RegisterDefinition,
}
