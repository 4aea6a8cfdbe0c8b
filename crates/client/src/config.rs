//! Validated session configuration

use std::time::Duration;

use cyberfarm_protocol::FarmConfig;
use thiserror::Error;

use crate::geometry::{GeometryError, GridProjector};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid field geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("bootstrap config has no background image")]
    MissingBackground,
}

/// Session settings derived once from the bootstrap payload
#[derive(Debug, Clone, PartialEq)]
pub struct ClientSettings {
    pub projector: GridProjector,
    pub background: String,
    /// Delay between an auto-step event and its `ack`
    pub exec_interval: Duration,
}

impl ClientSettings {
    /// Validate the bootstrap config, failing fast on degenerate geometry
    pub fn from_bootstrap(config: &FarmConfig) -> Result<Self, ConfigError> {
        let projector = GridProjector::new(config.grid, config.field_ratio)?;
        if config.background.trim().is_empty() {
            return Err(ConfigError::MissingBackground);
        }
        Ok(Self {
            projector,
            background: config.background.clone(),
            exec_interval: Duration::from_millis(config.exec_interval),
        })
    }

    /// Replace the server-supplied pacing interval
    #[must_use]
    pub const fn with_exec_interval(mut self, interval: Duration) -> Self {
        self.exec_interval = interval;
        self
    }

    pub const fn grid(&self) -> usize {
        self.projector.grid()
    }
}
