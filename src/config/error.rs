// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

/// Typed error for config load/parse failures so callers can distinguish
/// e.g. file-not-found from a bad value without string matching.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config load/parse error: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid duration {value:?} for {key}: {reason}")]
    Duration {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Parses a human duration such as "10s" or "400ms", falling back to the default when unset.
pub(super) fn duration(
    key: &'static str,
    value: Option<&String>,
    default: std::time::Duration,
) -> Result<std::time::Duration, ConfigError> {
    match value {
        Some(value) => Ok(duration_string::DurationString::from_string(value.clone())
            .map_err(|reason| ConfigError::Duration {
                key,
                value: value.clone(),
                reason: reason.to_string(),
            })?
            .into()),
        None => Ok(default),
    }
}
