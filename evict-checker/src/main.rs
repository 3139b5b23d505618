use crate::config::load_checker_config;
use crate::core::start_checker_with_config;
use evict_config::Environment;
use evict_config::shared::CheckerConfig;
use evict_telemetry::tracing::init_tracing;
use std::sync::Arc;
use tracing::{error, info};

mod config;
mod core;

fn main() -> anyhow::Result<()> {
    let checker_config = load_checker_config()?;

    let _log_flusher = init_tracing(env!("CARGO_BIN_NAME"))?;

    // Sentry has to be up before the runtime so panics in worker threads are captured.
    let _sentry_guard = init_sentry(&checker_config)?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main(checker_config))?;

    Ok(())
}

async fn async_main(checker_config: CheckerConfig) -> anyhow::Result<()> {
    if let Err(err) = start_checker_with_config(checker_config).await {
        sentry::integrations::anyhow::capture_anyhow(&err);
        error!("an error occurred in the eviction checker: {err:#}");

        return Err(err);
    }

    Ok(())
}

/// Initializes Sentry when a DSN is configured.
///
/// Events are tagged with the checker's service name and panics are reported through the
/// panic integration.
fn init_sentry(config: &CheckerConfig) -> anyhow::Result<Option<sentry::ClientInitGuard>> {
    let Some(sentry_config) = &config.sentry else {
        info!("sentry not configured for the eviction checker, skipping initialization");

        return Ok(None);
    };

    info!("initializing sentry with supplied dsn");

    let environment = Environment::load()?;
    let guard = sentry::init(sentry::ClientOptions {
        dsn: Some(sentry_config.dsn.parse()?),
        environment: Some(environment.to_string().into()),
        integrations: vec![Arc::new(
            sentry::integrations::panic::PanicIntegration::new(),
        )],
        ..Default::default()
    });

    sentry::configure_scope(|scope| {
        scope.set_tag("service", env!("CARGO_BIN_NAME"));
    });

    Ok(Some(guard))
}
