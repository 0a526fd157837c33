//! Raw register transport port.
//!
//! The core never assumes a specific wire protocol: anything that can read
//! and write a span of registers as big-endian bytes satisfies the contract:
//! the in-process simulator as much as a real field-bus driver.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::directory::DeviceIdentity;
use crate::regmap::RegisterClass;

#[cfg(feature = "modbus")]
pub mod modbus;

/// Transport-level failure, opaque to the codec beyond its category.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("transport call timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failure: {0}")]
    Connection(String),
    #[error("protocol failure: {0}")]
    Protocol(String),
}

/// Raw register access, addressed by device, register span, and class.
///
/// Implementations must serialize operations per individual device so
/// register accesses on one connection never interleave; operations on
/// independent devices may proceed concurrently. Payloads are big-endian
/// bytes, two per register.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads `count` registers starting at `address`; the returned buffer
    /// holds `count * 2` bytes.
    async fn read_raw(
        &self,
        device: &DeviceIdentity,
        address: u16,
        count: u16,
        class: RegisterClass,
    ) -> Result<Vec<u8>, TransportError>;

    /// Writes `bytes` (two per register) starting at `address`. Only holding
    /// registers accept writes; callers enforce that before reaching the
    /// transport.
    async fn write_raw(
        &self,
        device: &DeviceIdentity,
        address: u16,
        class: RegisterClass,
        bytes: &[u8],
    ) -> Result<(), TransportError>;
}
