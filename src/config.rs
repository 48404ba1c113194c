//! Construction-time parameters for an auction deployment. Never read from
//! the environment or CLI flags inside this crate — a binary wiring parties
//! together decides how to obtain these and passes them in.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("n = {n} parties cannot tolerate f = {f} faults: need n >= 3f + 1")]
    InsufficientParties { n: u32, f: u32 },

    #[error("bid bit width k must be at least 1")]
    ZeroBitWidth,

    #[error(transparent)]
    Parse(#[from] config::ConfigError),
}

/// Deployment parameters: party count, fault tolerance, bid bit width, and
/// the PRNG seed shared by every in-process subsystem that needs
/// determinism (the beacon, CSS's bivariate polynomial draws, ...).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct AuctionConfig {
    pub n: u32,
    pub f: u32,
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default)]
    pub seed: u64,
}

fn default_k() -> usize {
    5
}

impl AuctionConfig {
    /// # Errors
    /// If `n < 3f + 1` or `k == 0`.
    pub fn new(n: u32, f: u32, k: usize, seed: u64) -> Result<Self, ConfigError> {
        let config = Self { n, f, k, seed };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.n < 3 * self.f + 1 {
            return Err(ConfigError::InsufficientParties { n: self.n, f: self.f });
        }
        if self.k == 0 {
            return Err(ConfigError::ZeroBitWidth);
        }
        Ok(())
    }

    /// Reads config from a TOML string, e.g. for test fixtures. Expects
    /// fields `n`, `f`, and optionally `k` (default 5) and `seed` (default 0).
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        use config::{Config, File, FileFormat};

        let parsed: Self = Config::builder()
            .add_source(File::from_str(input, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        parsed.validate()?;
        Ok(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_insufficient_parties() {
        assert!(matches!(
            AuctionConfig::new(3, 1, 5, 0),
            Err(ConfigError::InsufficientParties { n: 3, f: 1 })
        ));
    }

    #[test]
    fn accepts_standard_byzantine_quorum() {
        assert!(AuctionConfig::new(4, 1, 5, 0).is_ok());
    }

    #[test]
    fn parses_from_toml() {
        let config = AuctionConfig::from_toml_str("n = 7\nf = 2\n").unwrap();
        assert_eq!(config.n, 7);
        assert_eq!(config.f, 2);
        assert_eq!(config.k, 5);
    }
}
