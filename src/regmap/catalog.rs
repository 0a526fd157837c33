//! Builtin register catalog for the supported device models.
//!
//! One map per manufacturer/model the site can field. The catalog is fixed at
//! compile time; `builtin_registry` populates a fresh registry from it at
//! process start.

use super::registry::RegisterMapRegistry;
use super::types::{DataType, DeviceKind, DeviceRegisterMap, RegisterClass, RegisterDefinition};

/// Total active power data point on the site meter (W).
pub const METER_ACTIVE_POWER: &str = "active_power_total";
/// Momentary charging power on an EV charger (W).
pub const CHARGER_ACTIVE_POWER: &str = "active_power";
/// Connector status code on an EV charger.
pub const CHARGER_STATUS: &str = "status";
/// Writable absolute charging power limit on an EV charger (W).
pub const CHARGER_LIMIT: &str = "charge_limit";
/// Battery state of charge (%).
pub const BATTERY_SOC: &str = "soc";

fn input_f32(name: &str, address: u16, unit: &str) -> RegisterDefinition {
    RegisterDefinition {
        name: name.to_string(),
        address,
        class: RegisterClass::Input,
        data_type: DataType::Float32,
        length: Some(2),
        unit: Some(unit.to_string()),
        ..Default::default()
    }
}

fn holding_f32(name: &str, address: u16, unit: &str) -> RegisterDefinition {
    RegisterDefinition {
        class: RegisterClass::Holding,
        ..input_f32(name, address, unit)
    }
}

fn pv_inverter_map() -> DeviceRegisterMap {
    DeviceRegisterMap::new(
        DeviceKind::PvInverter,
        "GenericSolarTech",
        "INV-5000",
        vec![
            RegisterDefinition {
                description: Some("AC Voltage Phase A/L1".to_string()),
                ..input_f32("ac_voltage", 3000, "V")
            },
            RegisterDefinition {
                description: Some("AC Current Phase A/L1".to_string()),
                ..input_f32("ac_current", 3002, "A")
            },
            RegisterDefinition {
                description: Some("AC Active Power Total".to_string()),
                ..input_f32("ac_power", 3004, "W")
            },
            RegisterDefinition {
                description: Some("Grid Frequency".to_string()),
                ..input_f32("frequency", 3006, "Hz")
            },
            input_f32("dc_voltage_mppt1", 3010, "V"),
            input_f32("dc_current_mppt1", 3012, "A"),
            RegisterDefinition {
                name: "temperature".to_string(),
                address: 3020,
                class: RegisterClass::Input,
                data_type: DataType::Int16,
                unit: Some("°C".to_string()),
                scale: 0.1,
                description: Some("Inverter Internal Temp".to_string()),
                ..Default::default()
            },
            RegisterDefinition {
                name: "status".to_string(),
                address: 3030,
                class: RegisterClass::Input,
                data_type: DataType::Uint16,
                description: Some("Inverter Status Code".to_string()),
                ..Default::default()
            },
        ],
    )
}

fn bms_map() -> DeviceRegisterMap {
    DeviceRegisterMap::new(
        DeviceKind::Bms,
        "SafeCell",
        "BMS-X96",
        vec![
            RegisterDefinition {
                description: Some("Total Pack Voltage".to_string()),
                ..holding_f32("voltage", 4000, "V")
            },
            RegisterDefinition {
                description: Some("Pack Current (Charge>0, Discharge<0)".to_string()),
                ..holding_f32("current", 4002, "A")
            },
            RegisterDefinition {
                description: Some("State of Charge".to_string()),
                ..holding_f32(BATTERY_SOC, 4004, "%")
            },
            RegisterDefinition {
                description: Some("State of Health".to_string()),
                ..holding_f32("soh", 4006, "%")
            },
            RegisterDefinition {
                name: "temperature_avg".to_string(),
                address: 4008,
                class: RegisterClass::Holding,
                data_type: DataType::Int16,
                unit: Some("°C".to_string()),
                scale: 0.1,
                description: Some("Average Battery Temperature".to_string()),
                ..Default::default()
            },
            RegisterDefinition {
                name: "cycle_count".to_string(),
                address: 4010,
                class: RegisterClass::Holding,
                data_type: DataType::Uint16,
                description: Some("Charge/Discharge Cycles".to_string()),
                ..Default::default()
            },
            RegisterDefinition {
                name: "status".to_string(),
                address: 4012,
                class: RegisterClass::Holding,
                data_type: DataType::Uint16,
                description: Some("BMS Status/Fault Code".to_string()),
                ..Default::default()
            },
            RegisterDefinition {
                writable: true,
                description: Some("Set Max Charge Power".to_string()),
                ..holding_f32("charge_limit_kw", 4100, "kW")
            },
            RegisterDefinition {
                writable: true,
                description: Some("Set Max Discharge Power".to_string()),
                ..holding_f32("discharge_limit_kw", 4102, "kW")
            },
        ],
    )
}

fn meter_map() -> DeviceRegisterMap {
    DeviceRegisterMap::new(
        DeviceKind::Meter,
        "GridEye",
        "MTR-3P",
        vec![
            input_f32("voltage_l1", 3000, "V"),
            input_f32("voltage_l2", 3002, "V"),
            input_f32("voltage_l3", 3004, "V"),
            input_f32("current_l1", 3010, "A"),
            input_f32("current_l2", 3012, "A"),
            input_f32("current_l3", 3014, "A"),
            input_f32(METER_ACTIVE_POWER, 3020, "W"),
            input_f32("reactive_power_total", 3022, "VAR"),
            input_f32("frequency", 3030, "Hz"),
            RegisterDefinition {
                name: "total_import_kwh".to_string(),
                address: 3100,
                class: RegisterClass::Input,
                data_type: DataType::Uint32,
                length: Some(2),
                unit: Some("kWh".to_string()),
                // Wh on the wire, kWh in engineering units.
                scale: 0.001,
                ..Default::default()
            },
            RegisterDefinition {
                name: "total_export_kwh".to_string(),
                address: 3102,
                class: RegisterClass::Input,
                data_type: DataType::Uint32,
                length: Some(2),
                unit: Some("kWh".to_string()),
                scale: 0.001,
                ..Default::default()
            },
        ],
    )
}

fn ev_charger_map() -> DeviceRegisterMap {
    DeviceRegisterMap::new(
        DeviceKind::EvCharger,
        "VoltEra",
        "EVC-22",
        vec![
            RegisterDefinition {
                description: Some("Momentary Charging Power".to_string()),
                ..input_f32(CHARGER_ACTIVE_POWER, 2000, "W")
            },
            RegisterDefinition {
                name: CHARGER_STATUS.to_string(),
                address: 2002,
                class: RegisterClass::Input,
                data_type: DataType::Uint16,
                description: Some("Connector Status Code".to_string()),
                ..Default::default()
            },
            RegisterDefinition {
                name: "session_energy_kwh".to_string(),
                address: 2004,
                class: RegisterClass::Input,
                data_type: DataType::Uint32,
                length: Some(2),
                unit: Some("kWh".to_string()),
                scale: 0.001,
                description: Some("Energy Delivered This Session".to_string()),
                ..Default::default()
            },
            RegisterDefinition {
                name: CHARGER_LIMIT.to_string(),
                address: 2100,
                class: RegisterClass::Holding,
                data_type: DataType::Uint32,
                length: Some(2),
                unit: Some("W".to_string()),
                writable: true,
                description: Some("Absolute Charging Power Limit".to_string()),
                ..Default::default()
            },
        ],
    )
}

/// Builds a registry populated with every builtin map.
pub fn builtin_registry() -> RegisterMapRegistry {
    let mut registry = RegisterMapRegistry::new();
    registry.register(pv_inverter_map());
    registry.register(bms_map());
    registry.register(meter_map());
    registry.register(ev_charger_map());
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_contains_all_supported_models() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 4);
        assert!(registry.lookup("GenericSolarTech", "INV-5000").is_some());
        assert!(registry.lookup("SafeCell", "BMS-X96").is_some());
        assert!(registry.lookup("GridEye", "MTR-3P").is_some());
        assert!(registry.lookup("VoltEra", "EVC-22").is_some());
    }

    #[test]
    fn charger_limit_is_the_only_writable_charger_point() {
        let registry = builtin_registry();
        let map = registry.lookup("VoltEra", "EVC-22").unwrap();
        for def in map.registers() {
            assert_eq!(def.writable, def.name == CHARGER_LIMIT);
        }
        let limit = map.register(CHARGER_LIMIT).unwrap();
        assert_eq!(limit.class, RegisterClass::Holding);
    }

    #[test]
    fn meter_power_is_a_four_byte_input_point() {
        let registry = builtin_registry();
        let map = registry.lookup("grideye", "mtr-3p").unwrap();
        let def = map.register(METER_ACTIVE_POWER).unwrap();
        assert_eq!(def.register_count(), 2);
        assert_eq!(def.class, RegisterClass::Input);
        assert_eq!(def.data_type, DataType::Float32);
    }
}
