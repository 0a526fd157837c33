//! Modbus TCP implementation of the transport port.

use std::collections::HashMap;
use std::net::ToSocketAddrs;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio_modbus::client::{tcp, Context, Reader, Writer};
use tokio_modbus::Slave;

use crate::directory::{DeviceIdentity, TransportAddress};
use crate::regmap::RegisterClass;

use super::{Transport, TransportError};

/// Transport over real field hardware via Modbus TCP.
///
/// Connections are opened lazily per device and cached; each device's
/// context sits behind its own mutex, so register operations on one
/// connection never interleave while independent devices proceed
/// concurrently. A failed call drops the cached connection and the next call
/// reconnects.
#[derive(Default)]
pub struct ModbusTcpTransport {
    connections: Mutex<HashMap<String, Arc<Mutex<Context>>>>,
}

impl ModbusTcpTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn context_for(
        &self,
        device: &DeviceIdentity,
    ) -> Result<Arc<Mutex<Context>>, TransportError> {
        let mut connections = self.connections.lock().await;
        if let Some(context) = connections.get(&device.id) {
            return Ok(Arc::clone(context));
        }
        let addr = resolve(&device.address)?;
        let context = tcp::connect_slave(addr, Slave(device.address.unit_id))
            .await
            .map_err(|err| TransportError::Connection(err.to_string()))?;
        let context = Arc::new(Mutex::new(context));
        connections.insert(device.id.clone(), Arc::clone(&context));
        Ok(context)
    }

    async fn drop_connection(&self, device_id: &str) {
        self.connections.lock().await.remove(device_id);
    }
}

fn resolve(address: &TransportAddress) -> Result<std::net::SocketAddr, TransportError> {
    (address.host.as_str(), address.port)
        .to_socket_addrs()
        .map_err(|err| TransportError::Connection(err.to_string()))?
        .next()
        .ok_or_else(|| {
            TransportError::Connection(format!(
                "{}:{} resolves to no address",
                address.host, address.port
            ))
        })
}

fn words_to_bytes(words: &[u16]) -> Vec<u8> {
    words.iter().flat_map(|w| w.to_be_bytes()).collect()
}

fn bytes_to_words(bytes: &[u8]) -> Result<Vec<u16>, TransportError> {
    if bytes.is_empty() || bytes.len() % 2 != 0 {
        return Err(TransportError::Protocol(format!(
            "write payload must be a positive even byte count, got {}",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect())
}

#[async_trait]
impl Transport for ModbusTcpTransport {
    async fn read_raw(
        &self,
        device: &DeviceIdentity,
        address: u16,
        count: u16,
        class: RegisterClass,
    ) -> Result<Vec<u8>, TransportError> {
        let context = self.context_for(device).await?;
        let mut guard = context.lock().await;
        let result = match class {
            RegisterClass::Input => guard.read_input_registers(address, count).await,
            RegisterClass::Holding => guard.read_holding_registers(address, count).await,
        };
        drop(guard);

        match result {
            Ok(Ok(words)) => Ok(words_to_bytes(&words)),
            Ok(Err(exception)) => Err(TransportError::Protocol(format!(
                "modbus exception on read: {exception:?}"
            ))),
            Err(err) => {
                self.drop_connection(&device.id).await;
                Err(TransportError::Connection(err.to_string()))
            }
        }
    }

    async fn write_raw(
        &self,
        device: &DeviceIdentity,
        address: u16,
        _class: RegisterClass,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        let words = bytes_to_words(bytes)?;
        let context = self.context_for(device).await?;
        let mut guard = context.lock().await;
        let result = guard.write_multiple_registers(address, &words).await;
        drop(guard);

        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(exception)) => Err(TransportError::Protocol(format!(
                "modbus exception on write: {exception:?}"
            ))),
            Err(err) => {
                self.drop_connection(&device.id).await;
                Err(TransportError::Connection(err.to_string()))
            }
        }
    }
}
