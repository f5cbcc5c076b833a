use crate::config::{Config, HttpConfig, SupervisorConfig};
use crate::error::{Error, Result};

/// Validates the HTTP settings
pub fn validate_http_config(config: &HttpConfig) -> Result<()> {
    if config.address.is_empty() {
        return Err(Error::ConfigInvalid("HTTP address is empty".to_string()));
    }

    if config.port == 0 {
        return Err(Error::ConfigInvalid("HTTP port must be non-zero".to_string()));
    }

    if config.workers == Some(0) {
        return Err(Error::ConfigInvalid(
            "HTTP worker count must be at least 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates the supervision settings
pub fn validate_supervisor_config(config: &SupervisorConfig) -> Result<()> {
    if config.java_path.trim().is_empty() {
        return Err(Error::ConfigInvalid("Java runtime path is empty".to_string()));
    }

    // A zero-capacity channel would detach every subscriber on its first line
    if config.console_buffer == 0 {
        return Err(Error::ConfigInvalid(
            "Console buffer must hold at least one line".to_string(),
        ));
    }

    Ok(())
}

/// Full configuration validation
pub fn validate_config(config: &Config) -> Result<()> {
    if config.servers_dir.as_os_str().is_empty() {
        return Err(Error::ConfigInvalid("Servers directory is empty".to_string()));
    }

    validate_http_config(&config.http)?;
    validate_supervisor_config(&config.supervisor)?;

    Ok(())
}
