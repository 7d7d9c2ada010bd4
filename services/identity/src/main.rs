use anyhow::Context;
use identity_service::bootstrap::SeedConfig;
use identity_service::observability::init_tracing;
use identity_service::shutdown::{wait_for_signal, ShutdownCoordinator};
use identity_service::{Config, IdentityCore};
use secrecy::ExposeSecret;
use tracing::{debug, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("loading configuration")?;
    init_tracing(&config.tracing()).context("initializing tracing")?;

    info!("Starting identity service");

    let core = IdentityCore::from_config(&config).context("building identity core")?;

    let seed = match (&config.init_seed_path, config.init_enabled) {
        (Some(path), true) => Some(SeedConfig::from_file(path).context("loading seed document")?),
        _ => None,
    };
    let report = core
        .bootstrap()
        .run(seed.as_ref())
        .await
        .context("bootstrapping")?;
    info!(kid = %report.key.kid(), "Signing key ready");
    if let Some(seeded) = &report.seeded {
        for credential in seeded.credentials.iter().filter(|c| c.generated) {
            debug!(
                email = %credential.email,
                password = %credential.password.expose_secret(),
                "Generated password for seeded user"
            );
        }
    }

    let mut coordinator = ShutdownCoordinator::new();
    core.scheduler(&config)
        .context("configuring key rotation")?
        .start(&mut coordinator);

    wait_for_signal().await.context("waiting for shutdown signal")?;
    coordinator.shutdown(config.shutdown_timeout).await;

    Ok(())
}
