//! sitecap entry point — CLI wiring and config-driven loop construction.

use std::process;
use std::sync::Arc;

use tracing::info;

use sitecap::cli;
use sitecap::codec::DataPointCodec;
use sitecap::config::SiteConfig;
use sitecap::dlm::{DlmEngine, Scheduler};
use sitecap::regmap::builtin_registry;
use sitecap::sim::SimTransport;
use sitecap::telemetry;

fn main() {
    tracing_subscriber::fmt().init();

    let options = match cli::parse_args() {
        Ok(options) => options,
        Err(message) => {
            eprintln!("error: {message}");
            process::exit(2);
        }
    };

    let config = match &options.config {
        Some(path) => match SiteConfig::from_toml_file(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("error: {err}");
                process::exit(1);
            }
        },
        None => SiteConfig::demo(),
    };

    let registry = Arc::new(builtin_registry());
    if let Err(err) = config.validate(&registry) {
        eprintln!("error: {err}");
        process::exit(1);
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            eprintln!("error: failed to start runtime: {err}");
            process::exit(1);
        }
    };

    runtime.block_on(async {
        let directory = Arc::new(config.directory());
        let transport = Arc::new(SimTransport::new(Arc::clone(&registry), &config));
        let codec = DataPointCodec::new(
            Arc::clone(&registry),
            Arc::clone(&directory),
            Arc::clone(&transport),
            config.dlm.transport_timeout(),
        );
        let mut engine = DlmEngine::new(codec, directory, config.dlm_settings());
        let scheduler = Scheduler::new(config.dlm.interval(), config.dlm.cycle_budget());

        info!(
            ceiling_kw = config.site.import_limit_kw,
            interval_secs = config.dlm.interval_secs,
            chargers = config
                .devices
                .iter()
                .filter(|d| d.max_power_kw.is_some())
                .count(),
            "starting DLM loop"
        );

        let summaries = scheduler
            .run(&mut engine, options.cycles, || transport.advance())
            .await;

        if let Some(path) = &options.telemetry_out {
            match telemetry::export_csv(&summaries, path) {
                Ok(()) => info!(path = %path.display(), rows = summaries.len(), "telemetry exported"),
                Err(err) => {
                    eprintln!("error: telemetry export failed: {err}");
                    process::exit(1);
                }
            }
        }
    });
}
