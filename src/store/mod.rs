// Campaign persistence seam
//
// Stores own atomicity: a transition commit changes the campaign record,
// appends its ledger entries, its activity record and any dispute change as
// one unit, and only if the campaign is still in the status the caller saw.

pub mod memory;

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::campaign::types::{
    ActivityRecord, Campaign, CampaignId, CampaignStatus, ChannelId, Dispute, DisputeStatus,
    SellerId,
};
use crate::config::MarketplaceConfig;
use crate::escrow::{balance_of, Account, EntryKind, LedgerEntry};

pub use memory::MemoryStore;

#[cfg(feature = "database")]
pub use crate::database::SqliteCampaignStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("campaign {campaign_id} is {actual}, expected {expected}")]
    StatusMismatch {
        campaign_id: CampaignId,
        expected: CampaignStatus,
        actual: CampaignStatus,
    },
    #[error("insufficient funds on {account}: available {available}, required {required}")]
    InsufficientFunds {
        account: Account,
        available: Decimal,
        required: Decimal,
    },
    #[error("escrow for campaign {0} was already settled")]
    AlreadySettled(CampaignId),
    #[error("settlement of {requested} does not match {held} held for campaign {campaign_id}")]
    EscrowMismatch {
        campaign_id: CampaignId,
        held: Decimal,
        requested: Decimal,
    },
    #[error("{0:?} entries cannot be recorded on their own")]
    UnexpectedEntry(EntryKind),
    #[error("campaign {0} already exists")]
    Duplicate(CampaignId),
    #[error("immutable field {field} of campaign {campaign_id} would change")]
    ImmutableField {
        campaign_id: CampaignId,
        field: &'static str,
    },
    #[error("campaign {campaign_id} cannot move from {from} to {to}")]
    IllegalTransition {
        campaign_id: CampaignId,
        from: CampaignStatus,
        to: CampaignStatus,
    },
    #[error("store {} is in use by another process", .0.display())]
    Locked(PathBuf),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "database")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[cfg(feature = "database")]
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Everything a single lifecycle transition writes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionCommit {
    /// Status the caller observed when planning the transition
    pub expected_status: CampaignStatus,
    /// Campaign record after the transition
    pub campaign: Campaign,
    pub ledger: Vec<LedgerEntry>,
    pub activity: ActivityRecord,
    /// Dispute opened or resolved by this transition
    pub dispute: Option<Dispute>,
}

/// Listing filter; `None` fields match everything
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CampaignFilter {
    pub seller_id: Option<SellerId>,
    pub channel_ids: Option<Vec<ChannelId>>,
    pub status: Option<CampaignStatus>,
}

impl CampaignFilter {
    pub fn matches(&self, campaign: &Campaign) -> bool {
        self.seller_id.is_none_or(|id| id == campaign.seller_id)
            && self
                .channel_ids
                .as_ref()
                .is_none_or(|ids| ids.contains(&campaign.channel_id))
            && self.status.is_none_or(|status| status == campaign.status)
    }
}

#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Insert a new campaign and its escrow hold. Fails with
    /// `InsufficientFunds` when the seller balance cannot cover the hold.
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        hold: &LedgerEntry,
        activity: &ActivityRecord,
    ) -> Result<(), StoreError>;

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError>;

    /// Campaigns matching the filter, newest first
    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, StoreError>;

    /// Apply a transition atomically. Fails with `StatusMismatch` when the
    /// stored status differs from `commit.expected_status`.
    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<Campaign, StoreError>;

    async fn record_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError>;

    async fn campaign_ledger(&self, id: CampaignId) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn account_ledger(&self, account: &Account) -> Result<Vec<LedgerEntry>, StoreError>;

    async fn campaign_activity(&self, id: CampaignId) -> Result<Vec<ActivityRecord>, StoreError>;

    /// Most recent dispute raised on a campaign
    async fn campaign_dispute(&self, id: CampaignId) -> Result<Option<Dispute>, StoreError>;

    async fn list_disputes(
        &self,
        status: Option<DisputeStatus>,
    ) -> Result<Vec<Dispute>, StoreError>;

    async fn balance(&self, account: &Account) -> Result<Decimal, StoreError> {
        let entries = self.account_ledger(account).await?;
        Ok(balance_of(account, &entries))
    }
}

/// The committed status change must be an edge of the lifecycle graph
pub(crate) fn check_edge(commit: &TransitionCommit) -> Result<(), StoreError> {
    let from = commit.expected_status;
    let to = commit.campaign.status;
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(StoreError::IllegalTransition {
            campaign_id: commit.campaign.id,
            from,
            to,
        })
    }
}

/// Identity, parties and money terms never change after creation
pub(crate) fn check_immutable(current: &Campaign, next: &Campaign) -> Result<(), StoreError> {
    let changed = if current.id != next.id {
        Some("id")
    } else if current.seller_id != next.seller_id {
        Some("seller_id")
    } else if current.channel_id != next.channel_id {
        Some("channel_id")
    } else if current.budget != next.budget {
        Some("budget")
    } else if current.platform_commission_percent != next.platform_commission_percent {
        Some("platform_commission_percent")
    } else if current.created_at != next.created_at {
        Some("created_at")
    } else {
        None
    };

    match changed {
        Some(field) => Err(StoreError::ImmutableField {
            campaign_id: current.id,
            field,
        }),
        None => Ok(()),
    }
}

/// Timestamps are recorded once and never rewritten
pub(crate) fn check_set_once(current: &Campaign, next: &Campaign) -> Result<(), StoreError> {
    let rewritten = [
        ("owner_submitted_at", current.owner_submitted_at, next.owner_submitted_at),
        ("seller_confirmed_at", current.seller_confirmed_at, next.seller_confirmed_at),
        (
            "actual_completion_date",
            current.actual_completion_date,
            next.actual_completion_date,
        ),
    ]
    .into_iter()
    .find(|(_, before, after)| before.is_some() && before != after);

    match rewritten {
        Some((field, _, _)) => Err(StoreError::ImmutableField {
            campaign_id: current.id,
            field,
        }),
        None => Ok(()),
    }
}

/// The store selected by configuration
#[derive(Clone)]
pub enum StoreHandle {
    Memory(Arc<MemoryStore>),
    #[cfg(feature = "database")]
    Sqlite(Arc<SqliteCampaignStore>),
}

impl StoreHandle {
    /// Open the configured store. A `[database]` section selects SQLite when
    /// the `database` feature is built in; otherwise the JSON snapshot is used.
    pub async fn open(config: &MarketplaceConfig) -> Result<Self, StoreError> {
        match &config.database {
            #[cfg(feature = "database")]
            Some(database) => {
                info!(url = %database.url, "Opening SQLite campaign store");
                let store = SqliteCampaignStore::connect(database).await?;
                Ok(StoreHandle::Sqlite(Arc::new(store)))
            }
            #[cfg(not(feature = "database"))]
            Some(_) => {
                warn!("Database configured but the database feature is not enabled; using snapshot store");
                Self::open_snapshot(config).await
            }
            None => Self::open_snapshot(config).await,
        }
    }

    async fn open_snapshot(config: &MarketplaceConfig) -> Result<Self, StoreError> {
        let path = &config.storage.snapshot_path;
        info!(path = %path.display(), "Opening snapshot campaign store");
        Ok(StoreHandle::Memory(Arc::new(MemoryStore::open(path).await?)))
    }

    pub fn store(&self) -> Arc<dyn CampaignStore> {
        match self {
            StoreHandle::Memory(store) => store.clone(),
            #[cfg(feature = "database")]
            StoreHandle::Sqlite(store) => store.clone(),
        }
    }

    /// Write committed state to disk. SQLite commits are already durable.
    pub async fn flush(&self) -> Result<(), StoreError> {
        match self {
            StoreHandle::Memory(store) => store.flush().await,
            #[cfg(feature = "database")]
            StoreHandle::Sqlite(_) => Ok(()),
        }
    }

    /// Release the store; the snapshot lock goes with the last reference
    pub async fn close(self) {
        match self {
            StoreHandle::Memory(store) => drop(store),
            #[cfg(feature = "database")]
            StoreHandle::Sqlite(store) => store.shutdown().await,
        }
    }
}
