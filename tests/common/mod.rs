//! Shared test fixtures for integration tests.

use std::sync::Arc;
use std::time::Duration;

use sitecap::codec::DataPointCodec;
use sitecap::config::SiteConfig;
use sitecap::directory::DeviceDirectory;
use sitecap::dlm::engine::DlmEngine;
use sitecap::dlm::types::CycleSummary;
use sitecap::regmap::{builtin_registry, RegisterMapRegistry};
use sitecap::sim::SimTransport;

/// A fully wired site over the simulated transport.
pub struct TestSite {
    pub registry: Arc<RegisterMapRegistry>,
    pub directory: Arc<DeviceDirectory>,
    pub transport: Arc<SimTransport>,
    pub engine: DlmEngine<SimTransport>,
}

impl TestSite {
    /// A codec sharing the site's registry, directory, and transport, for
    /// reading device state back in assertions.
    pub fn codec(&self) -> DataPointCodec<SimTransport> {
        DataPointCodec::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.directory),
            Arc::clone(&self.transport),
            Duration::from_millis(200),
        )
    }

    /// Advances the sim one step and runs one control cycle, the way the
    /// scheduler would.
    pub async fn step(&mut self) -> CycleSummary {
        self.transport.advance();
        self.engine.run_cycle().await
    }
}

/// The demo site with sim noise disabled for determinism.
pub fn demo_site() -> TestSite {
    build_site(SiteConfig::demo())
}

/// Builds a site from `config` with sim noise disabled.
pub fn build_site(mut config: SiteConfig) -> TestSite {
    config.sim.noise_std = 0.0;
    let registry = Arc::new(builtin_registry());
    config
        .validate(&registry)
        .expect("test config should validate");

    let directory = Arc::new(config.directory());
    let transport = Arc::new(SimTransport::new(Arc::clone(&registry), &config));
    let codec = DataPointCodec::new(
        Arc::clone(&registry),
        Arc::clone(&directory),
        Arc::clone(&transport),
        config.dlm.transport_timeout(),
    );
    let engine = DlmEngine::new(codec, Arc::clone(&directory), config.dlm_settings());

    TestSite {
        registry,
        directory,
        transport,
        engine,
    }
}
