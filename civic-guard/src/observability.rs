//! Structured logging setup

use tracing_subscriber::EnvFilter;

use crate::{config::Config, error::Result};

/// Install a JSON `tracing` subscriber filtered by `service.log_level`
///
/// An unparsable filter falls back to `info`. Calling this twice is harmless;
/// the second call leaves the first subscriber in place.
pub fn init_tracing(config: &Config) -> Result<()> {
    let filter = EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    if tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .try_init()
        .is_err()
    {
        tracing::debug!("Tracing subscriber already installed");
        return Ok(());
    }

    tracing::info!(
        service = %config.service.name,
        environment = %config.service.environment,
        "Tracing initialized"
    );

    Ok(())
}

/// Log the final line before the process exits
pub fn shutdown_tracing() {
    tracing::info!("Tracing shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_twice() {
        let mut config = Config::default();
        config.service.log_level = "not a [valid filter".to_string();
        assert!(init_tracing(&config).is_ok());
        assert!(init_tracing(&config).is_ok());
        shutdown_tracing();
    }
}
