use anyhow::Result;
use clap::Args;
use serde::Serialize;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use crate::campaign::manager::CampaignLifecycleManager;
use crate::campaign::types::Actor;
use crate::config::MarketplaceConfig;
use crate::notifications::TracingNotifier;
use crate::observability::lifecycle_metrics;
use crate::store::StoreHandle;

pub mod campaign;
pub mod funds;
pub mod reports;

#[allow(async_fn_in_trait)]
pub trait Command {
    async fn execute(&self, ctx: &CommandContext) -> Result<()>;
}

/// What every store-backed command runs against
pub struct CommandContext {
    pub manager: CampaignLifecycleManager,
    pub actor: Actor,
}

/// Open the configured store, run `f`, then persist the store when `persist`
/// is set and `f` succeeded.
///
/// The snapshot store stays locked from open to close, so concurrent
/// invocations cannot overwrite each other's commits. A failed operation
/// never leaves partial state behind.
pub async fn with_marketplace<F, Fut, R>(
    config: &MarketplaceConfig,
    actor: Actor,
    persist: bool,
    f: F,
) -> Result<R>
where
    F: FnOnce(CommandContext) -> Fut,
    Fut: Future<Output = Result<R>>,
{
    let handle = StoreHandle::open(config).await?;
    let manager = CampaignLifecycleManager::new(
        handle.store(),
        Arc::new(TracingNotifier),
        config.policy(),
    );

    let result = f(CommandContext { manager, actor }).await;
    if persist && result.is_ok() {
        handle.flush().await?;
    }
    handle.close().await;
    lifecycle_metrics().log_stats();
    result
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Also write the effective configuration to this file
    #[arg(long, help = "Write the effective configuration as TOML to this path")]
    pub write: Option<PathBuf>,
}

impl ConfigArgs {
    pub fn execute(&self, config: &MarketplaceConfig) -> Result<()> {
        print!("{}", toml::to_string_pretty(config)?);
        if let Some(path) = &self.write {
            config.save_to_file(path)?;
            eprintln!("✅ Configuration written to {}", path.display());
        }
        Ok(())
    }
}
