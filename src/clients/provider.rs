use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::time::sleep;
use tracing::debug;

/// Knobs for a simulated provider.
#[derive(Debug, Clone)]
pub struct ProviderSettings {
    pub enabled: bool,
    /// Probability in `[0, 1]` that a call fails as if the provider timed out.
    pub failure_rate: f64,
    pub latency: Duration,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            failure_rate: 0.0,
            latency: Duration::ZERO,
        }
    }
}

impl ProviderSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn ensure_enabled(&self, service: &str) -> Result<()> {
        if !self.enabled {
            return Err(anyhow!("{} service is disabled", service));
        }
        Ok(())
    }

    /// Stands in for the provider round trip: waits out the configured
    /// latency, then fails if the service is off or the dice say so.
    pub async fn simulate_call(&self, service: &str, failure: impl FnOnce() -> String) -> Result<()> {
        self.ensure_enabled(service)?;

        if !self.latency.is_zero() {
            sleep(self.latency).await;
        }

        if self.failure_rate > 0.0 && rand::random::<f64>() < self.failure_rate {
            let reason = failure();
            debug!(service, reason = %reason, "Simulated provider failure");
            return Err(anyhow!(reason));
        }

        Ok(())
    }
}
