use std::time::Duration;

use envconfig::Envconfig;
use xpa_runtime::ReconcilerOptions;

#[derive(Envconfig, Clone, Debug)]
pub struct ProviderConfigEnv {
    /// Name used as the event reporter and field manager.
    /// Env: XPA_CONTROLLER_NAME
    #[envconfig(from = "XPA_CONTROLLER_NAME", default = "xpa-aws")]
    pub controller_name: String,

    /// Requeue interval for converged resources.
    /// Env: XPA_POLL_INTERVAL_SECS
    #[envconfig(from = "XPA_POLL_INTERVAL_SECS", default = "60")]
    pub poll_interval_secs: u64,

    /// Requeue interval after create and delete.
    /// Env: XPA_SHORT_WAIT_SECS
    #[envconfig(from = "XPA_SHORT_WAIT_SECS", default = "30")]
    pub short_wait_secs: u64,

    /// Timeout applied to each AWS call.
    /// Env: XPA_CALL_TIMEOUT_SECS
    #[envconfig(from = "XPA_CALL_TIMEOUT_SECS", default = "60")]
    pub call_timeout_secs: u64,

    /// Concurrent reconciles per kind.
    /// Env: XPA_MAX_RECONCILE_RATE
    #[envconfig(from = "XPA_MAX_RECONCILE_RATE", default = "10")]
    pub max_reconcile_rate: u16,

    #[envconfig(nested)]
    pub features: FeaturesConfig,

    #[envconfig(nested)]
    pub backoff: BackoffConfig,
}

#[derive(Envconfig, Clone, Debug, Default)]
pub struct FeaturesConfig {
    /// If Some, env explicitly set; otherwise the controller is enabled
    #[envconfig(from = "XPA_FEATURES_RDS")]
    pub rds: Option<bool>,
    #[envconfig(from = "XPA_FEATURES_S3")]
    pub s3: Option<bool>,
}

#[derive(Envconfig, Clone, Debug)]
pub struct BackoffConfig {
    #[envconfig(from = "XPA_ERROR_BACKOFF_BASE_MS", default = "1000")]
    pub base_ms: u64,
    #[envconfig(from = "XPA_ERROR_BACKOFF_MAX_SECS", default = "300")]
    pub max_secs: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_ms: 1000,
            max_secs: 300,
        }
    }
}

impl ProviderConfigEnv {
    /// Fill feature flags that were not set explicitly.
    pub fn apply_defaults(mut self) -> Self {
        if self.features.rds.is_none() {
            self.features.rds = Some(true);
        }
        if self.features.s3.is_none() {
            self.features.s3 = Some(true);
        }
        if self.max_reconcile_rate == 0 {
            self.max_reconcile_rate = 1;
        }
        self
    }

    pub fn reconciler_options(&self) -> ReconcilerOptions {
        ReconcilerOptions {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            short_wait: Duration::from_secs(self.short_wait_secs),
            call_timeout: Duration::from_secs(self.call_timeout_secs),
        }
    }
}

impl BackoffConfig {
    /// `base * 2^failures`, capped at `max_secs`.
    pub fn delay(&self, failures: u32) -> Duration {
        let max = Duration::from_secs(self.max_secs);
        let factor = 2u64.saturating_pow(failures.min(32));
        let delay = Duration::from_millis(self.base_ms.saturating_mul(factor));
        delay.min(max)
    }
}
