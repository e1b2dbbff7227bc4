use crate::core::convolution::ZeroSumPolicy;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Evaluation settings shared by every node of a [`super::graph::Graph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct GraphConfig {
    /// Policy for convolution operators whose normalization sum is zero.
    #[serde(default)]
    pub zero_sum_policy: ZeroSumPolicy,
}

impl GraphConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigLoadError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigLoadError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })
    }
}

#[derive(Default)]
pub struct GraphConfigBuilder {
    zero_sum_policy: Option<ZeroSumPolicy>,
}

impl GraphConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zero_sum_policy(mut self, policy: ZeroSumPolicy) -> Self {
        self.zero_sum_policy = Some(policy);
        self
    }

    pub fn build(self) -> GraphConfig {
        GraphConfig {
            zero_sum_policy: self.zero_sum_policy.unwrap_or_default(),
        }
    }
}
