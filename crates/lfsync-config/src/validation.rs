// Copyright (C) 2026  lfsync Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.
use crate::error::{ConfigError, ConfigResult};
use crate::schema::*;

/// Validator for configuration settings
pub trait Validator {
    fn validate(&self) -> ConfigResult<()>;
}

impl Validator for Config {
    fn validate(&self) -> ConfigResult<()> {
        self.remote.validate()?;
        self.sync.validate()?;
        self.auth.validate()?;
        self.observability.validate()?;
        for repository in &self.repositories {
            repository.owner_and_name()?;
        }
        Ok(())
    }
}

impl Validator for RemoteConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.endpoint.is_empty() {
            return Err(ConfigError::MissingRequired("remote.endpoint".to_string()));
        }

        if !(self.endpoint.starts_with("https://") || self.endpoint.starts_with("http://")) {
            return Err(ConfigError::invalid_value(
                "remote.endpoint",
                format!("must start with http:// or https://, got {}", self.endpoint),
            ));
        }

        if self.endpoint.ends_with('/') {
            return Err(ConfigError::invalid_value(
                "remote.endpoint",
                "must not end with '/'",
            ));
        }

        if self.probe_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "remote.probe_timeout_secs",
                "must be at least 1 second",
            ));
        }

        if self.git_username.is_empty() {
            return Err(ConfigError::MissingRequired("remote.git_username".to_string()));
        }

        Ok(())
    }
}

impl Validator for SyncConfig {
    fn validate(&self) -> ConfigResult<()> {
        if self.default_branch.is_empty() {
            return Err(ConfigError::MissingRequired("sync.default_branch".to_string()));
        }

        if self.max_attempts == 0 {
            return Err(ConfigError::invalid_value(
                "sync.max_attempts",
                "must be at least 1",
            ));
        }

        // Below the signature length a stub could never be told apart from a partial.
        if self.resume_threshold < 40 {
            return Err(ConfigError::invalid_value(
                "sync.resume_threshold",
                format!("must be at least 40 bytes, got {}", self.resume_threshold),
            ));
        }

        for ext in &self.reject_extensions {
            if ext.is_empty() || ext.contains('/') {
                return Err(ConfigError::invalid_value(
                    "sync.reject_extensions",
                    format!("invalid extension '{}'", ext),
                ));
            }
        }

        Ok(())
    }
}

impl Validator for AuthConfig {
    fn validate(&self) -> ConfigResult<()> {
        if matches!(self.token.as_deref(), Some("")) {
            return Err(ConfigError::invalid_value("auth.token", "must not be empty"));
        }
        if matches!(self.token_env.as_deref(), Some("")) {
            return Err(ConfigError::invalid_value("auth.token_env", "must not be empty"));
        }
        Ok(())
    }
}

impl Validator for ObservabilityConfig {
    fn validate(&self) -> ConfigResult<()> {
        let base_level = self
            .log_level
            .split(',')
            .next()
            .unwrap_or_default()
            .trim();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !base_level.contains('=') && !valid_levels.contains(&base_level) {
            return Err(ConfigError::invalid_value(
                "observability.log_level",
                format!("must be one of: {}", valid_levels.join(", ")),
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.log_format.as_str()) {
            return Err(ConfigError::invalid_value(
                "observability.log_format",
                format!("must be one of: {}", valid_formats.join(", ")),
            ));
        }

        Ok(())
    }
}
