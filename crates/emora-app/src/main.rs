use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod capture;
mod config;
mod session;
mod shell;
mod trends;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("emora starting");

    let config = config::Config::from_env()?;

    let mut session = match session::Session::initialize(&config) {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = ?e, "startup failed");
            return Err(e);
        }
    };

    tracing::info!("emora ready");

    shell::run(&mut session)?;

    tracing::info!("emora shutting down");
    Ok(())
}
