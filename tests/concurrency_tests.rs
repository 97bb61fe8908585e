//! Concurrent transitions on one campaign
//!
//! A gated store holds every commit at a barrier until all racing callers
//! have planned from the same observed status, so exactly one commit can win
//! the compare-and-swap and the rest must surface a conflict.

use ad_marketplace::campaign::{ActivityRecord, Dispute, DisputeStatus};
use ad_marketplace::{
    Account, Actor, Campaign, CampaignFilter, CampaignId, CampaignLifecycleManager,
    CampaignStatus, CampaignStore, ChannelId, Creative, EntryKind, LedgerEntry, LifecycleError,
    LifecyclePolicy, MemoryStore, NewCampaign, SellerId, StoreError, TracingNotifier,
    TransitionCommit, UserId,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Barrier;

/// Delegates to a memory store but parks each commit until `parties` callers arrive
struct GatedStore {
    inner: MemoryStore,
    gate: Barrier,
}

impl GatedStore {
    fn new(parties: usize) -> Self {
        Self {
            inner: MemoryStore::new(),
            gate: Barrier::new(parties),
        }
    }
}

#[async_trait]
impl CampaignStore for GatedStore {
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        hold: &LedgerEntry,
        activity: &ActivityRecord,
    ) -> Result<(), StoreError> {
        self.inner.create_campaign(campaign, hold, activity).await
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        self.inner.get_campaign(id).await
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, StoreError> {
        self.inner.list_campaigns(filter).await
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<Campaign, StoreError> {
        self.gate.wait().await;
        self.inner.commit_transition(commit).await
    }

    async fn record_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        self.inner.record_deposit(entry).await
    }

    async fn campaign_ledger(&self, id: CampaignId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.campaign_ledger(id).await
    }

    async fn account_ledger(&self, account: &Account) -> Result<Vec<LedgerEntry>, StoreError> {
        self.inner.account_ledger(account).await
    }

    async fn campaign_activity(&self, id: CampaignId) -> Result<Vec<ActivityRecord>, StoreError> {
        self.inner.campaign_activity(id).await
    }

    async fn campaign_dispute(&self, id: CampaignId) -> Result<Option<Dispute>, StoreError> {
        self.inner.campaign_dispute(id).await
    }

    async fn list_disputes(
        &self,
        status: Option<DisputeStatus>,
    ) -> Result<Vec<Dispute>, StoreError> {
        self.inner.list_disputes(status).await
    }
}

struct Race {
    manager: Arc<CampaignLifecycleManager>,
    store: Arc<GatedStore>,
    seller: Actor,
    owner: Actor,
    campaign: Campaign,
}

async fn pending_race(parties: usize, budget: i64) -> Race {
    let store = Arc::new(GatedStore::new(parties));
    let manager = Arc::new(CampaignLifecycleManager::new(
        store.clone(),
        Arc::new(TracingNotifier),
        LifecyclePolicy::default(),
    ));
    let channel_id = ChannelId::new();
    let seller = Actor::seller(UserId::new(), SellerId::new());
    let owner = Actor::channel_owner(UserId::new(), vec![channel_id]);

    manager.deposit(&seller, Decimal::from(budget)).await.unwrap();
    let campaign = manager
        .create_campaign(
            &seller,
            NewCampaign {
                channel_id,
                budget: Decimal::from(budget),
                start_date: NaiveDate::from_ymd_opt(2025, 11, 3).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 11, 9).unwrap(),
                creative: Creative::default(),
                seller_notes: None,
            },
        )
        .await
        .unwrap();

    Race {
        manager,
        store,
        seller,
        owner,
        campaign,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_accept_and_reject_race_has_one_winner() {
    let race = pending_race(2, 8_000).await;
    let id = race.campaign.id;

    let (accepted, rejected) = tokio::join!(
        race.manager.accept_campaign(&race.owner, id, None),
        race.manager
            .reject_campaign(&race.owner, id, "Slot already sold to a competitor".to_string()),
    );

    let outcomes = [&accepted, &rejected];
    assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
    assert_eq!(
        outcomes
            .iter()
            .filter(|r| matches!(r, Err(LifecycleError::Conflict { .. })))
            .count(),
        1
    );

    let stored = race.store.get_campaign(id).await.unwrap().unwrap();
    let seller_balance = race
        .store
        .balance(&Account::Seller(race.seller.seller_id.unwrap()))
        .await
        .unwrap();
    if accepted.is_ok() {
        assert_eq!(stored.status, CampaignStatus::Accepted);
        assert_eq!(seller_balance, Decimal::ZERO);
    } else {
        assert_eq!(stored.status, CampaignStatus::Rejected);
        assert_eq!(seller_balance, Decimal::from(8_000));
    }

    // Created plus the single winning transition
    assert_eq!(race.store.campaign_activity(id).await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_cancels_refund_once() {
    let race = pending_race(3, 6_000).await;
    let id = race.campaign.id;

    let (first, second, third) = tokio::join!(
        race.manager.cancel_campaign(&race.seller, id, None),
        race.manager
            .cancel_campaign(&race.seller, id, Some("Budget moved to Q1".to_string())),
        race.manager.cancel_campaign(&race.seller, id, None),
    );

    let results = [first, second, third];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(
            e,
            LifecycleError::Conflict {
                expected: CampaignStatus::Pending,
                actual: CampaignStatus::Cancelled,
                ..
            }
        )));

    let ledger = race.store.campaign_ledger(id).await.unwrap();
    let refunds: Decimal = ledger
        .iter()
        .filter(|entry| entry.kind == EntryKind::Refund)
        .map(|entry| entry.amount)
        .sum();
    assert_eq!(refunds, Decimal::from(6_000));
    assert_eq!(
        race.store
            .balance(&Account::Seller(race.seller.seller_id.unwrap()))
            .await
            .unwrap(),
        Decimal::from(6_000)
    );
}
