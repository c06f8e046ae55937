use crate::types::MountConfig;
use crate::ConfigError;

impl MountConfig {
    /// Validate the configuration and return a list of errors.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        match &self.mountpoint {
            None => errors.push(ConfigError::MissingMountpoint),
            Some(path) => {
                if let Err(e) = std::fs::metadata(path) {
                    errors.push(ConfigError::InvalidMountpoint(
                        path.display().to_string(),
                        e.to_string(),
                    ));
                }
            }
        }

        match self.store {
            None => errors.push(ConfigError::MissingStore),
            Some(store) if store.needs_addr() && self.addrs.iter().all(|a| a.trim().is_empty()) => {
                errors.push(ConfigError::MissingAddr(store.to_string()));
            }
            Some(_) => {}
        }

        if self.fsname.trim().is_empty() {
            errors.push(ConfigError::InvalidConfig(
                "fsname must not be empty".to_string(),
            ));
        }

        if self.connect_timeout.as_duration().is_zero() {
            errors.push(ConfigError::InvalidConfig(
                "connect_timeout must be greater than zero".to_string(),
            ));
        }

        errors
    }

    /// Validate and return Ok(()) if valid, or Err with the first error.
    pub fn validate_or_err(&self) -> Result<(), ConfigError> {
        match self.validate().into_iter().next() {
            None => Ok(()),
            Some(first) => Err(first),
        }
    }
}
