use anyhow::Context;
use candle_core::{bail, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the SPCT classifier.
///
/// Only the dropout probability and the number of output classes are
/// exposed; the layer widths are fixed by the architecture.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SPctConfig {
    pub dropout: f64,
    pub output_channels: usize,
}

impl Default for SPctConfig {
    fn default() -> Self {
        Self {
            dropout: 0.5,
            output_channels: 40,
        }
    }
}

impl SPctConfig {
    /// ModelNet40 classification head.
    pub fn modelnet40() -> Self {
        Self::default()
    }

    pub fn with_dropout(self, dropout: f64) -> Self {
        Self { dropout, ..self }
    }

    pub fn with_output_channels(self, output_channels: usize) -> Self {
        Self {
            output_channels,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..1.0).contains(&self.dropout) {
            bail!("dropout probability has to be in [0, 1), got {}", self.dropout)
        }
        if self.output_channels == 0 {
            bail!("output_channels must be greater than zero")
        }
        Ok(())
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: SPctConfig = serde_json::from_str(&config_str)?;
        config.validate()?;
        Ok(config)
    }
}
