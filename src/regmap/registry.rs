//! Registry of register maps keyed by manufacturer and model.

use std::collections::HashMap;

use super::types::DeviceRegisterMap;

/// Lookup table from lowercase `manufacturer:model` to its register map.
///
/// Built once at startup from a fixed catalog and shared read-only for the
/// process lifetime; lookups never mutate it, so concurrent readers need no
/// locking.
#[derive(Debug, Default)]
pub struct RegisterMapRegistry {
    maps: HashMap<String, DeviceRegisterMap>,
}

fn registry_key(manufacturer: &str, model: &str) -> String {
    format!("{}:{}", manufacturer.to_lowercase(), model.to_lowercase())
}

impl RegisterMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `map` under its manufacturer/model key, replacing any existing
    /// entry for that key (last write wins, no merge).
    pub fn register(&mut self, map: DeviceRegisterMap) {
        let key = registry_key(&map.manufacturer, &map.model);
        self.maps.insert(key, map);
    }

    /// Case-insensitive map lookup. An empty manufacturer or model never
    /// matches anything.
    pub fn lookup(&self, manufacturer: &str, model: &str) -> Option<&DeviceRegisterMap> {
        if manufacturer.is_empty() || model.is_empty() {
            return None;
        }
        self.maps.get(&registry_key(manufacturer, model))
    }

    pub fn len(&self) -> usize {
        self.maps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regmap::types::{DataType, DeviceKind, RegisterDefinition};

    fn map_with_soc(manufacturer: &str, model: &str, address: u16) -> DeviceRegisterMap {
        DeviceRegisterMap::new(
            DeviceKind::Bms,
            manufacturer,
            model,
            vec![RegisterDefinition {
                name: "soc".to_string(),
                address,
                data_type: DataType::Float32,
                length: Some(2),
                ..Default::default()
            }],
        )
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let mut registry = RegisterMapRegistry::new();
        registry.register(map_with_soc("SafeCell", "BMS-X96", 4004));

        assert!(registry.lookup("safecell", "bms-x96").is_some());
        assert!(registry.lookup("SAFECELL", "BMS-X96").is_some());
        assert!(registry.lookup("SafeCell", "BMS-X97").is_none());
    }

    #[test]
    fn empty_manufacturer_or_model_never_matches() {
        let mut registry = RegisterMapRegistry::new();
        registry.register(map_with_soc("SafeCell", "BMS-X96", 4004));

        assert!(registry.lookup("", "BMS-X96").is_none());
        assert!(registry.lookup("SafeCell", "").is_none());
    }

    #[test]
    fn re_registering_replaces_the_previous_map() {
        let mut registry = RegisterMapRegistry::new();
        registry.register(map_with_soc("SafeCell", "BMS-X96", 4004));
        registry.register(map_with_soc("safecell", "BMS-X96", 5000));

        assert_eq!(registry.len(), 1);
        let map = registry.lookup("SafeCell", "BMS-X96").unwrap();
        assert_eq!(map.register("soc").unwrap().address, 5000);
    }
}
