//! Configuration types for the weighted goal-region sampler.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default sampling cap before the worker pauses.
fn default_max_sampled_goals() -> u32 {
    10
}

/// Default poll/wait interval in milliseconds.
fn default_poll_ms() -> u64 {
    10
}

/// Default roadmap growth time slice in milliseconds.
fn default_growth_slice_ms() -> u64 {
    100
}

/// Top-level sampler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Maximum number of goals the sampling worker may accept before it
    /// pauses. Raised automatically when the adaptive reset fires.
    #[serde(default = "default_max_sampled_goals")]
    pub max_sampled_goals: u32,
    /// Default minimum distance between stored goals, handed to
    /// `add_state_if_different` by callers that want de-duplication.
    #[serde(default)]
    pub min_distance: f64,
    /// Start the sampling worker as soon as a proposal function is attached.
    #[serde(default)]
    pub auto_start: bool,
    /// Poll interval while waiting for the state space to become ready.
    #[serde(default = "default_poll_ms")]
    pub readiness_poll_ms: u64,
    /// Wait timeout while the sampling worker is paused at the cap.
    #[serde(default = "default_poll_ms")]
    pub resume_poll_ms: u64,
    /// Time budget handed to each roadmap growth call.
    #[serde(default = "default_growth_slice_ms")]
    pub growth_slice_ms: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            max_sampled_goals: 10,
            min_distance: 0.0,
            auto_start: false,
            readiness_poll_ms: 10,
            resume_poll_ms: 10,
            growth_slice_ms: 100,
        }
    }
}

impl SamplerConfig {
    /// Readiness poll interval as a [`Duration`].
    #[inline]
    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }

    /// Paused-at-cap wait timeout as a [`Duration`].
    #[inline]
    pub fn resume_poll(&self) -> Duration {
        Duration::from_millis(self.resume_poll_ms)
    }

    /// Roadmap growth time slice as a [`Duration`].
    #[inline]
    pub fn growth_slice(&self) -> Duration {
        Duration::from_millis(self.growth_slice_ms)
    }

    /// Validate configuration parameters.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_sampled_goals == 0 {
            return Err(ConfigError::ZeroSamplingCap);
        }
        if !self.min_distance.is_finite() || self.min_distance < 0.0 {
            return Err(ConfigError::InvalidMinDistance(self.min_distance));
        }
        if self.readiness_poll_ms == 0 || self.resume_poll_ms == 0 {
            return Err(ConfigError::ZeroPollInterval);
        }
        if self.growth_slice_ms == 0 {
            return Err(ConfigError::ZeroGrowthSlice);
        }
        Ok(())
    }
}

/// Configuration validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Sampling cap must be non-zero")]
    ZeroSamplingCap,
    #[error("Minimum goal distance must be finite and non-negative, got {0}")]
    InvalidMinDistance(f64),
    #[error("Poll intervals must be non-zero")]
    ZeroPollInterval,
    #[error("Roadmap growth time slice must be non-zero")]
    ZeroGrowthSlice,
}
