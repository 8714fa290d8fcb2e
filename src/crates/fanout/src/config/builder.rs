//! Configuration builder trait
//!
//! Shared shape for settings structs: validate, load from the environment,
//! merge layered sources.

use crate::Result;

/// Settings that can be validated, loaded from the environment and merged
///
/// Environment variables follow `{PREFIX}{FIELD_NAME}`, e.g. `FANOUT_MAX_WORKERS`.
pub trait ConfigBuilder: Default + Clone {
    /// Reject values the executor cannot run with
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Defaults overridden by whatever `{prefix}*` variables are set
    fn from_env(prefix: &str) -> Result<Self>;

    /// Overlay `other` on `self`
    fn merge(&mut self, other: Self) -> &mut Self;

    /// Validated defaults
    fn build() -> Result<Self> {
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Validated environment configuration
    fn from_env_validated(prefix: &str) -> Result<Self> {
        let config = Self::from_env(prefix)?;
        config.validate()?;
        Ok(config)
    }
}
