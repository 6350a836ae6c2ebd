use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::workflows::{ConflictPolicy, Role};

/// Configuration shared by the reference platform and the e2e harness
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HarnessConfig {
    /// Where the platform listens and how hard clients may hit it
    pub platform: PlatformConfig,
    /// Per-step deadlines
    pub timeouts: TimeoutConfig,
    /// Bounded retry for network steps
    pub retry: RetrySettings,
    pub workflow: WorkflowConfig,
    /// Test accounts, one per role
    pub accounts: Vec<AccountConfig>,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PlatformConfig {
    /// Base URL the harness drives
    pub base_url: String,
    /// Address `serve` binds to
    pub bind_addr: String,
    /// Client-side request throttle
    pub requests_per_second: u32,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TimeoutConfig {
    pub request_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkflowConfig {
    /// `queue` waits for an in-flight transition, `reject` fails fast
    pub conflict_policy: ConflictPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AccountConfig {
    pub role: Role,
    pub email: String,
    pub password: String,
    /// Where a successful login must land; defaults to the role dashboard
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// JSON lines instead of human-readable output
    pub json: bool,
}

impl AccountConfig {
    pub fn new(role: Role, email: &str, password: &str) -> Self {
        Self {
            role,
            email: email.to_string(),
            password: password.to_string(),
            dashboard_path: None,
        }
    }

    pub fn expected_landing(&self) -> &str {
        self.dashboard_path
            .as_deref()
            .unwrap_or_else(|| self.role.dashboard_path())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            platform: PlatformConfig {
                base_url: "http://127.0.0.1:3000".to_string(),
                bind_addr: "127.0.0.1:3000".to_string(),
                requests_per_second: 50,
            },
            timeouts: TimeoutConfig {
                request_ms: 10_000,
                poll_interval_ms: 250,
            },
            retry: RetrySettings {
                max_attempts: 3,
                base_delay_ms: 500,
                max_delay_ms: 30_000,
                jitter: true,
            },
            workflow: WorkflowConfig {
                conflict_policy: ConflictPolicy::Queue,
            },
            accounts: default_accounts(),
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json: true,
            },
        }
    }
}

fn default_accounts() -> Vec<AccountConfig> {
    Role::ALL
        .iter()
        .map(|role| {
            let handle = role.as_str().to_lowercase().replace('_', "-");
            AccountConfig::new(*role, &format!("{handle}@test.local"), "test123")
        })
        .collect()
}

impl HarnessConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (submission-flow.toml, .submission-flow-rc)
    /// 3. Environment variables (prefixed with SUBMISSION_FLOW_, `__` between sections)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same layering, with config files looked up under `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let defaults = Config::try_from(&HarnessConfig::default())?;
        let mut builder = Config::builder().add_source(defaults);

        let toml_path = dir.join("submission-flow.toml");
        if toml_path.exists() {
            builder = builder.add_source(File::from(toml_path));
        }

        let rc_path = dir.join(".submission-flow-rc");
        if rc_path.exists() {
            builder = builder.add_source(File::from(rc_path).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("SUBMISSION_FLOW")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let harness_config: HarnessConfig = builder.build()?.try_deserialize()?;
        harness_config.validate()?;
        Ok(harness_config)
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry.max_attempts == 0 {
            bail!("retry.max_attempts must be at least 1");
        }
        if self.timeouts.request_ms == 0 || self.timeouts.poll_interval_ms == 0 {
            bail!("timeouts must be non-zero");
        }
        if self.platform.requests_per_second == 0 {
            bail!("platform.requests_per_second must be non-zero");
        }
        if let Some(account) = self.accounts.iter().find(|a| a.email.trim().is_empty()) {
            bail!("account for {} has an empty email", account.role);
        }
        for (i, account) in self.accounts.iter().enumerate() {
            if self.accounts[..i].iter().any(|a| a.role == account.role) {
                bail!("role {} is configured more than once", account.role);
            }
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    pub fn account_for(&self, role: Role) -> Option<&AccountConfig> {
        self.accounts.iter().find(|account| account.role == role)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.request_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.timeouts.poll_interval_ms)
    }
}
