//! Register maps: named data points per manufacturer/model.

/// Builtin register catalog for the supported device models.
pub mod catalog;
pub mod registry;
pub mod types;

// Re-export the main types for convenience
pub use catalog::builtin_registry;
pub use registry::RegisterMapRegistry;
pub use types::DataType;
pub use types::DeviceKind;
pub use types::DeviceRegisterMap;
pub use types::RegisterClass;
pub use types::RegisterDefinition;
