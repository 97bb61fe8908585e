// Ad Marketplace Library - Campaign Lifecycle
// Exposes the lifecycle engine, escrow ledger and stores for the CLI and tests

pub mod campaign;
pub mod cli;
pub mod config;
pub mod database;
pub mod escrow;
pub mod notifications;
pub mod observability;
pub mod store;
pub mod telemetry;

// Re-export key types for easy access
pub use campaign::{
    Actor, Campaign, CampaignEvent, CampaignId, CampaignLifecycleManager, CampaignStats,
    CampaignStatus, ChannelId, Creative, Dispute, DisputeDecision, DisputeResolution,
    DisputeStatus, LifecycleError, LifecycleMachine, LifecyclePolicy, NewCampaign,
    PlacementProofType, Role, SellerId, TransitionPlan, UserId,
};
pub use config::{config, MarketplaceConfig};
pub use escrow::{Account, EntryKind, EscrowSummary, LedgerEntry};
pub use notifications::{BroadcastNotifier, Notification, NotificationKind, Notifier, TracingNotifier};
pub use observability::{lifecycle_metrics, LifecycleMetrics, OperationTimer};
pub use store::{CampaignFilter, CampaignStore, MemoryStore, StoreError, StoreHandle, TransitionCommit};
pub use telemetry::{create_lifecycle_span, generate_correlation_id, init_telemetry, shutdown_telemetry};

#[cfg(feature = "database")]
pub use database::SqliteCampaignStore;
