// In-memory campaign store with optional JSON snapshot file

use async_trait::async_trait;
use fd_lock::{RwLock as FileLock, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{
    check_edge, check_immutable, check_set_once, CampaignFilter, CampaignStore, StoreError, TransitionCommit,
};
use crate::campaign::types::{ActivityRecord, Campaign, CampaignId, Dispute, DisputeStatus};
use crate::escrow::{balance_of, check_settlement, Account, EntryKind, LedgerEntry};

/// Serialized form of the whole store
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub campaigns: Vec<Campaign>,
    pub ledger: Vec<LedgerEntry>,
    pub activities: Vec<ActivityRecord>,
    pub disputes: Vec<Dispute>,
}

#[derive(Debug, Default)]
struct Tables {
    campaigns: HashMap<CampaignId, Campaign>,
    ledger: Vec<LedgerEntry>,
    activities: Vec<ActivityRecord>,
    disputes: Vec<Dispute>,
}

impl Tables {
    fn from_snapshot(snapshot: StoreSnapshot) -> Self {
        Self {
            campaigns: snapshot
                .campaigns
                .into_iter()
                .map(|campaign| (campaign.id, campaign))
                .collect(),
            ledger: snapshot.ledger,
            activities: snapshot.activities,
            disputes: snapshot.disputes,
        }
    }

    fn to_snapshot(&self) -> StoreSnapshot {
        let mut campaigns: Vec<Campaign> = self.campaigns.values().cloned().collect();
        campaigns.sort_by_key(|campaign| (campaign.created_at, campaign.id));
        StoreSnapshot {
            campaigns,
            ledger: self.ledger.clone(),
            activities: self.activities.clone(),
            disputes: self.disputes.clone(),
        }
    }

    fn campaign_entries(&self, id: CampaignId) -> Vec<LedgerEntry> {
        self.ledger
            .iter()
            .filter(|entry| entry.campaign_id == Some(id))
            .cloned()
            .collect()
    }

    fn upsert_dispute(&mut self, dispute: &Dispute) {
        match self.disputes.iter_mut().find(|existing| existing.id == dispute.id) {
            Some(existing) => *existing = dispute.clone(),
            None => self.disputes.push(dispute.clone()),
        }
    }
}

/// Exclusive lock on `<snapshot>.lock`, released when dropped
struct SnapshotLock {
    path: PathBuf,
    _guard: RwLockWriteGuard<'static, File>,
}

impl SnapshotLock {
    fn acquire(snapshot_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = snapshot_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
        {
            std::fs::create_dir_all(parent)?;
        }

        let path = snapshot_path.with_extension("json.lock");
        let lock_file = File::create(&path)?;
        let lock = Box::leak(Box::new(FileLock::new(lock_file)));
        let guard = lock.try_write().map_err(|e| match e.kind() {
            std::io::ErrorKind::WouldBlock => StoreError::Locked(snapshot_path.to_path_buf()),
            _ => StoreError::Io(e),
        })?;
        debug!(path = %path.display(), "Acquired snapshot lock");

        Ok(Self {
            path,
            _guard: guard,
        })
    }
}

impl fmt::Debug for SnapshotLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotLock").field("path", &self.path).finish()
    }
}

/// Thread-safe store holding all state behind one lock, so every write
/// operation is atomic with respect to every other.
///
/// A store opened on a snapshot file holds an exclusive file lock until it
/// is dropped, so only one process at a time can load, change and flush it.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    snapshot_path: Option<PathBuf>,
    _lock: Option<SnapshotLock>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a store backed by a snapshot file; a missing file starts empty.
    /// Fails with `Locked` while another store holds the same snapshot.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let lock = SnapshotLock::acquire(&path)?;
        let snapshot = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<StoreSnapshot>(&bytes)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "No snapshot found, starting empty");
                StoreSnapshot::default()
            }
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %path.display(),
            campaigns = snapshot.campaigns.len(),
            ledger_entries = snapshot.ledger.len(),
            "Loaded campaign store snapshot"
        );

        Ok(Self {
            tables: RwLock::new(Tables::from_snapshot(snapshot)),
            snapshot_path: Some(path),
            _lock: Some(lock),
        })
    }

    pub async fn snapshot(&self) -> StoreSnapshot {
        self.tables.read().await.to_snapshot()
    }

    /// Write the snapshot file, if this store has one
    pub async fn flush(&self) -> Result<(), StoreError> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };
        let snapshot = self.snapshot().await;

        // Write then rename so a crash never leaves a truncated snapshot
        let temp = path.with_extension("json.tmp");
        tokio::fs::write(&temp, serde_json::to_vec_pretty(&snapshot)?).await?;
        tokio::fs::rename(&temp, path).await?;
        debug!(path = %path.display(), "Flushed campaign store snapshot");
        Ok(())
    }
}

#[async_trait]
impl CampaignStore for MemoryStore {
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        hold: &LedgerEntry,
        activity: &ActivityRecord,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables.campaigns.contains_key(&campaign.id) {
            return Err(StoreError::Duplicate(campaign.id));
        }

        let account = hold.account;
        let available = balance_of(&account, &tables.ledger);
        if available < hold.amount {
            return Err(StoreError::InsufficientFunds {
                account,
                available,
                required: hold.amount,
            });
        }

        tables.campaigns.insert(campaign.id, campaign.clone());
        tables.ledger.push(hold.clone());
        tables.activities.push(activity.clone());
        Ok(())
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        Ok(self.tables.read().await.campaigns.get(&id).cloned())
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, StoreError> {
        let tables = self.tables.read().await;
        let mut campaigns: Vec<Campaign> = tables
            .campaigns
            .values()
            .filter(|campaign| filter.matches(campaign))
            .cloned()
            .collect();
        campaigns.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(campaigns)
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<Campaign, StoreError> {
        let mut tables = self.tables.write().await;
        let campaign_id = commit.campaign.id;
        let current = tables
            .campaigns
            .get(&campaign_id)
            .ok_or_else(|| StoreError::NotFound {
                entity: "campaign",
                id: campaign_id.to_string(),
            })?;

        if current.status != commit.expected_status {
            return Err(StoreError::StatusMismatch {
                campaign_id,
                expected: commit.expected_status,
                actual: current.status,
            });
        }
        check_edge(commit)?;
        check_immutable(current, &commit.campaign)?;
        check_set_once(current, &commit.campaign)?;
        check_settlement(campaign_id, &tables.campaign_entries(campaign_id), &commit.ledger)?;

        tables.campaigns.insert(campaign_id, commit.campaign.clone());
        tables.ledger.extend(commit.ledger.iter().cloned());
        tables.activities.push(commit.activity.clone());
        if let Some(dispute) = &commit.dispute {
            tables.upsert_dispute(dispute);
        }
        Ok(commit.campaign.clone())
    }

    async fn record_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if entry.kind != EntryKind::Deposit {
            return Err(StoreError::UnexpectedEntry(entry.kind));
        }
        self.tables.write().await.ledger.push(entry.clone());
        Ok(())
    }

    async fn campaign_ledger(&self, id: CampaignId) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self.tables.read().await.campaign_entries(id))
    }

    async fn account_ledger(&self, account: &Account) -> Result<Vec<LedgerEntry>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .ledger
            .iter()
            .filter(|entry| &entry.account == account)
            .cloned()
            .collect())
    }

    async fn campaign_activity(&self, id: CampaignId) -> Result<Vec<ActivityRecord>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .activities
            .iter()
            .filter(|record| record.campaign_id == id)
            .cloned()
            .collect())
    }

    async fn campaign_dispute(&self, id: CampaignId) -> Result<Option<Dispute>, StoreError> {
        Ok(self
            .tables
            .read()
            .await
            .disputes
            .iter()
            .filter(|dispute| dispute.campaign_id == id)
            .max_by_key(|dispute| dispute.created_at)
            .cloned())
    }

    async fn list_disputes(
        &self,
        status: Option<DisputeStatus>,
    ) -> Result<Vec<Dispute>, StoreError> {
        let mut disputes: Vec<Dispute> = self
            .tables
            .read()
            .await
            .disputes
            .iter()
            .filter(|dispute| status.is_none_or(|status| dispute.status == status))
            .cloned()
            .collect();
        disputes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(disputes)
    }
}
