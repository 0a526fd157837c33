//! Simulated site: register banks plus a deterministic device model.
//!
//! Satisfies the same raw transport contract a real field-bus driver would,
//! so the codec, engine, and scheduler run unchanged against simulated
//! hardware.

/// In-memory register image of one device.
pub mod bank;
/// Deterministic site model: base load, PV, battery, chargers.
pub mod site;
pub mod transport;

// Re-export the main types for convenience
pub use bank::RegisterBank;
pub use site::SiteState;
pub use transport::SimTransport;
