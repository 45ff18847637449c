use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;

use config::Config;
use dbus_interface::PunchcardService;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("punchcardd starting");

    let config = Config::from_env();
    tracing::info!(
        data_dir = %config.data_dir.display(),
        frames_dir = %config.frames_dir.display(),
        learner = %config.learner,
        "configuration loaded"
    );

    let engine = engine::spawn_engine(&config)?;
    let service = PunchcardService::new(engine, config);

    let _connection = zbus::connection::Builder::session()?
        .name("org.punchcard.Punchcard1")?
        .serve_at("/org/punchcard/Punchcard1", service)?
        .build()
        .await?;

    tracing::info!("punchcardd ready");

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("punchcardd shutting down");

    Ok(())
}
