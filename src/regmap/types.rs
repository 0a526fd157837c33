//! Register map data model: data types, register classes, definitions, maps.

use std::fmt;

use serde::Deserialize;

/// On-device representation of a data point.
///
/// Every value occupies one or more 16-bit registers; multi-register values
/// use big-endian word and byte order throughout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataType {
    Uint16,
    Int16,
    Uint32,
    Int32,
    Float32,
    Boolean,
    /// ASCII text spanning `length` registers (2 bytes each).
    Text,
}

impl DataType {
    /// Registers consumed when the definition declares no explicit length.
    pub fn default_length(self) -> u16 {
        match self {
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 2,
            DataType::Uint16 | DataType::Int16 | DataType::Boolean | DataType::Text => 1,
        }
    }

    /// Minimum payload bytes a buffer must hold to decode this type.
    pub fn min_bytes(self) -> usize {
        match self {
            DataType::Uint32 | DataType::Int32 | DataType::Float32 => 4,
            DataType::Uint16 | DataType::Int16 | DataType::Boolean => 2,
            // Text tolerates any length up to the declared register span.
            DataType::Text => 0,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Uint16 => "uint16",
            DataType::Int16 => "int16",
            DataType::Uint32 => "uint32",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
            DataType::Boolean => "boolean",
            DataType::Text => "text",
        };
        f.write_str(name)
    }
}

/// Register class addressed by a read or write.
///
/// Only holding registers accept writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterClass {
    Holding,
    Input,
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegisterClass::Holding => f.write_str("holding"),
            RegisterClass::Input => f.write_str("input"),
        }
    }
}

/// Device category a register map applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Bms,
    PvInverter,
    Meter,
    EvCharger,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceKind::Bms => f.write_str("bms"),
            DeviceKind::PvInverter => f.write_str("pv_inverter"),
            DeviceKind::Meter => f.write_str("meter"),
            DeviceKind::EvCharger => f.write_str("ev_charger"),
        }
    }
}

/// One named data point mapped to a physical register.
///
/// `register_value * scale` yields the engineering value; writes divide by
/// `scale` before encoding.
#[derive(Debug, Clone)]
pub struct RegisterDefinition {
    /// Standardized data-point name (e.g. `"soc"`).
    pub name: String,
    /// Register start address.
    pub address: u16,
    pub class: RegisterClass,
    pub data_type: DataType,
    /// Engineering unit of the scaled value.
    pub unit: Option<String>,
    /// Multiplier converting the raw register value to engineering units.
    pub scale: f64,
    /// Explicit register count; derived from `data_type` when `None`.
    pub length: Option<u16>,
    pub writable: bool,
    pub description: Option<String>,
}

impl Default for RegisterDefinition {
    fn default() -> Self {
        Self {
            name: String::new(),
            address: 0,
            class: RegisterClass::Input,
            data_type: DataType::Uint16,
            unit: None,
            scale: 1.0,
            length: None,
            writable: false,
            description: None,
        }
    }
}

impl RegisterDefinition {
    /// Registers consumed by one access: the explicit `length` when declared,
    /// otherwise 2 for 32-bit types and 1 for everything else.
    pub fn register_count(&self) -> u16 {
        self.length.unwrap_or_else(|| self.data_type.default_length())
    }

    /// Whether the resolved register span can hold the declared data type.
    pub fn length_sufficient(&self) -> bool {
        usize::from(self.register_count()) * 2 >= self.data_type.min_bytes()
    }
}

/// Ordered register definitions for one manufacturer/model.
///
/// Immutable once registered; replacing a map means registering a new one
/// under the same key, never editing in place.
#[derive(Debug, Clone)]
pub struct DeviceRegisterMap {
    pub kind: DeviceKind,
    pub manufacturer: String,
    pub model: String,
    registers: Vec<RegisterDefinition>,
}

impl DeviceRegisterMap {
    /// Creates a map after checking it is well-formed.
    ///
    /// # Panics
    ///
    /// Panics if two definitions share a name or a definition's register span
    /// cannot hold its data type. A malformed catalog is a programmer error
    /// and must surface at startup, before the control loop runs.
    pub fn new(
        kind: DeviceKind,
        manufacturer: impl Into<String>,
        model: impl Into<String>,
        registers: Vec<RegisterDefinition>,
    ) -> Self {
        let manufacturer = manufacturer.into();
        let model = model.into();
        for (i, def) in registers.iter().enumerate() {
            assert!(
                def.length_sufficient(),
                "register `{}` in {manufacturer}:{model}: length {} cannot hold {}",
                def.name,
                def.register_count(),
                def.data_type,
            );
            assert!(
                registers[..i].iter().all(|other| other.name != def.name),
                "duplicate register name `{}` in {manufacturer}:{model}",
                def.name,
            );
        }
        Self {
            kind,
            manufacturer,
            model,
            registers,
        }
    }

    /// Returns the first definition whose name matches exactly (case-sensitive).
    pub fn register(&self, name: &str) -> Option<&RegisterDefinition> {
        self.registers.iter().find(|def| def.name == name)
    }

    /// All definitions, in declaration order.
    pub fn registers(&self) -> &[RegisterDefinition] {
        &self.registers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn float_def(name: &str, length: Option<u16>) -> RegisterDefinition {
        RegisterDefinition {
            name: name.to_string(),
            address: 100,
            data_type: DataType::Float32,
            length,
            ..Default::default()
        }
    }

    #[test]
    fn register_count_derives_from_data_type() {
        let def = RegisterDefinition {
            data_type: DataType::Uint16,
            ..Default::default()
        };
        assert_eq!(def.register_count(), 1);

        let def = RegisterDefinition {
            data_type: DataType::Int32,
            ..Default::default()
        };
        assert_eq!(def.register_count(), 2);
    }

    #[test]
    fn explicit_length_wins_over_derived() {
        let def = RegisterDefinition {
            data_type: DataType::Text,
            length: Some(8),
            ..Default::default()
        };
        assert_eq!(def.register_count(), 8);
    }

    #[test]
    #[should_panic(expected = "cannot hold float32")]
    fn short_span_for_32_bit_type_is_rejected() {
        DeviceRegisterMap::new(
            DeviceKind::Meter,
            "GridEye",
            "MTR-3P",
            vec![float_def("power", Some(1))],
        );
    }

    #[test]
    #[should_panic(expected = "duplicate register name")]
    fn duplicate_names_are_rejected() {
        DeviceRegisterMap::new(
            DeviceKind::Meter,
            "GridEye",
            "MTR-3P",
            vec![float_def("power", None), float_def("power", None)],
        );
    }

    #[test]
    fn register_lookup_is_case_sensitive() {
        let map = DeviceRegisterMap::new(
            DeviceKind::Meter,
            "GridEye",
            "MTR-3P",
            vec![float_def("power", None)],
        );
        assert!(map.register("power").is_some());
        assert!(map.register("Power").is_none());
    }
}
