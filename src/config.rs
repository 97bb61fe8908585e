use anyhow::Result;
use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::campaign::state_machine::LifecyclePolicy;
use crate::campaign::validation::validate_commission_percent;

/// Main configuration structure for the ad marketplace
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarketplaceConfig {
    /// Campaign lifecycle rules
    pub marketplace: MarketplaceSettings,
    /// Seller deposit limits
    pub payments: PaymentsConfig,
    /// Observability settings
    pub observability: ObservabilityConfig,
    /// File-backed store settings
    pub storage: StorageConfig,
    /// Database settings (optional, used with the `database` feature)
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct MarketplaceSettings {
    /// Commission applied to newly created campaigns
    pub platform_commission_percent: Decimal,
    /// Minimum characters for rejection reasons, dispute reasons and admin notes
    pub min_reason_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct PaymentsConfig {
    pub min_deposit: Decimal,
    pub max_deposit: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (overridden by RUST_LOG)
    pub log_level: String,
    /// Emit JSON log lines
    pub json_logs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct StorageConfig {
    /// Snapshot file for the in-memory store
    pub snapshot_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Database URL (SQLite file path or connection string)
    pub url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            marketplace: MarketplaceSettings {
                platform_commission_percent: Decimal::from(10),
                min_reason_length: 10,
            },
            payments: PaymentsConfig {
                min_deposit: Decimal::from(100),
                max_deposit: Decimal::from(500_000),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: true,
            },
            storage: StorageConfig {
                snapshot_path: PathBuf::from(".ad-marketplace/store.json"),
            },
            database: None,
        }
    }
}

impl MarketplaceConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (ad-marketplace.toml, .ad-marketplace-rc, or `explicit`)
    /// 3. Environment variables (prefixed with AD_MARKETPLACE__)
    pub fn load_from(explicit: Option<&Path>) -> Result<Self> {
        let mut builder = Config::builder().add_source(Config::try_from(&Self::default())?);

        match explicit {
            Some(path) => {
                builder = builder.add_source(File::from(path));
            }
            None => {
                if Path::new("ad-marketplace.toml").exists() {
                    builder = builder.add_source(File::with_name("ad-marketplace"));
                }
                if Path::new(".ad-marketplace-rc").exists() {
                    builder = builder.add_source(
                        File::with_name(".ad-marketplace-rc").format(config::FileFormat::Toml),
                    );
                }
            }
        }

        // AD_MARKETPLACE__MARKETPLACE__PLATFORM_COMMISSION_PERCENT=12.5
        builder = builder.add_source(
            Environment::with_prefix("AD_MARKETPLACE")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config: MarketplaceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    pub fn validate(&self) -> Result<()> {
        validate_commission_percent(self.marketplace.platform_commission_percent)?;
        if self.payments.min_deposit <= Decimal::ZERO
            || self.payments.max_deposit < self.payments.min_deposit
        {
            anyhow::bail!(
                "Invalid deposit limits: min {} max {}",
                self.payments.min_deposit,
                self.payments.max_deposit
            );
        }
        Ok(())
    }

    pub fn policy(&self) -> LifecyclePolicy {
        LifecyclePolicy {
            platform_commission_percent: self.marketplace.platform_commission_percent,
            min_reason_length: self.marketplace.min_reason_length,
            min_deposit: self.payments.min_deposit,
            max_deposit: self.payments.max_deposit,
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<MarketplaceConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = MarketplaceConfig::load_env_file();
        MarketplaceConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static MarketplaceConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
