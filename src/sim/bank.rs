//! In-memory register image of one device.

use std::collections::BTreeMap;

use crate::codec::{decode_value, encode_value, CodecError, PointValue};
use crate::regmap::{RegisterClass, RegisterDefinition};
use crate::transport::TransportError;

/// Holding and input registers of one simulated device, two bytes each.
#[derive(Debug, Default)]
pub struct RegisterBank {
    holding: BTreeMap<u16, [u8; 2]>,
    input: BTreeMap<u16, [u8; 2]>,
    /// When set, wire writes fail with a connection error (fault injection
    /// for tests); device-side stores are unaffected.
    fail_writes: bool,
    /// When set, wire reads fail with a connection error; device-side loads
    /// are unaffected.
    fail_reads: bool,
}

impl RegisterBank {
    pub fn new() -> Self {
        Self::default()
    }

    fn registers(&self, class: RegisterClass) -> &BTreeMap<u16, [u8; 2]> {
        match class {
            RegisterClass::Holding => &self.holding,
            RegisterClass::Input => &self.input,
        }
    }

    fn registers_mut(&mut self, class: RegisterClass) -> &mut BTreeMap<u16, [u8; 2]> {
        match class {
            RegisterClass::Holding => &mut self.holding,
            RegisterClass::Input => &mut self.input,
        }
    }

    /// Wire-side read of `count` registers starting at `address`; subject to
    /// fault injection.
    pub fn read(
        &self,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> Result<Vec<u8>, TransportError> {
        if self.fail_reads {
            return Err(TransportError::Connection(
                "injected read fault".to_string(),
            ));
        }
        self.read_span(class, address, count)
    }

    fn read_span(
        &self,
        class: RegisterClass,
        address: u16,
        count: u16,
    ) -> Result<Vec<u8>, TransportError> {
        let registers = self.registers(class);
        let mut bytes = Vec::with_capacity(usize::from(count) * 2);
        for offset in 0..count {
            let addr = address.checked_add(offset).ok_or_else(|| {
                TransportError::Protocol(format!("register span overflows at {address}"))
            })?;
            let word = registers.get(&addr).ok_or_else(|| {
                TransportError::Protocol(format!("no {class} register at address {addr}"))
            })?;
            bytes.extend_from_slice(word);
        }
        Ok(bytes)
    }

    /// Wire-side write; subject to fault injection.
    pub fn write(
        &mut self,
        class: RegisterClass,
        address: u16,
        bytes: &[u8],
    ) -> Result<(), TransportError> {
        if self.fail_writes {
            return Err(TransportError::Connection(
                "injected write fault".to_string(),
            ));
        }
        if bytes.is_empty() || bytes.len() % 2 != 0 {
            return Err(TransportError::Protocol(format!(
                "write payload must be a positive even byte count, got {}",
                bytes.len()
            )));
        }
        let registers = self.registers_mut(class);
        for (i, chunk) in bytes.chunks(2).enumerate() {
            registers.insert(address + i as u16, [chunk[0], chunk[1]]);
        }
        Ok(())
    }

    /// Device-side store of an engineering value; bypasses fault injection
    /// and the writable flag; the device owns its own registers.
    pub fn store(
        &mut self,
        def: &RegisterDefinition,
        value: &PointValue,
    ) -> Result<(), CodecError> {
        let bytes = encode_value(def, value)?;
        let registers = self.registers_mut(def.class);
        for (i, chunk) in bytes.chunks(2).enumerate() {
            registers.insert(def.address + i as u16, [chunk[0], chunk[1]]);
        }
        Ok(())
    }

    /// Device-side load of an engineering value, e.g. a setpoint the control
    /// loop wrote over the wire. Bypasses fault injection.
    pub fn load(&self, def: &RegisterDefinition) -> Result<PointValue, CodecError> {
        let bytes = self.read_span(def.class, def.address, def.register_count())?;
        decode_value(def, &bytes)
    }

    pub fn set_fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }

    pub fn set_fail_reads(&mut self, fail: bool) {
        self.fail_reads = fail;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::DataType;

    fn limit_def() -> RegisterDefinition {
        RegisterDefinition {
            name: "charge_limit".to_string(),
            address: 2100,
            class: RegisterClass::Holding,
            data_type: DataType::Uint32,
            length: Some(2),
            writable: true,
            ..Default::default()
        }
    }

    #[test]
    fn wire_write_then_device_load_round_trips() {
        let mut bank = RegisterBank::new();
        let def = limit_def();
        bank.write(RegisterClass::Holding, 2100, &[0x00, 0x00, 0x1C, 0xE8])
            .unwrap();
        assert_eq!(bank.load(&def).unwrap(), PointValue::Number(7400.0));
    }

    #[test]
    fn reading_an_unpopulated_register_is_a_protocol_error() {
        let bank = RegisterBank::new();
        let err = bank.read(RegisterClass::Input, 3020, 2).unwrap_err();
        assert!(matches!(err, TransportError::Protocol(_)));
    }

    #[test]
    fn fault_injection_blocks_wire_writes_but_not_stores() {
        let mut bank = RegisterBank::new();
        let def = limit_def();
        bank.set_fail_writes(true);

        let err = bank
            .write(RegisterClass::Holding, 2100, &[0, 0, 0, 0])
            .unwrap_err();
        assert!(matches!(err, TransportError::Connection(_)));

        bank.store(&def, &PointValue::Number(11_000.0)).unwrap();
        assert_eq!(bank.load(&def).unwrap(), PointValue::Number(11_000.0));
    }
}
