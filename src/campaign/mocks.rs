// Test doubles and fixtures for lifecycle tests

use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

use crate::campaign::manager::CampaignLifecycleManager;
use crate::campaign::state_machine::LifecyclePolicy;
use crate::campaign::types::*;
use crate::notifications::{Notification, NotificationKind, Notifier};
use crate::store::MemoryStore;

/// Notifier that records every dispatched notification
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    pub sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn kinds(&self) -> Vec<NotificationKind> {
        self.sent.lock().unwrap().iter().map(|n| n.kind).collect()
    }

    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }
}

#[async_trait::async_trait]
impl Notifier for RecordingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        self.sent.lock().unwrap().push(notification.clone());
        Ok(())
    }
}

/// Notifier whose deliveries always fail
#[derive(Debug, Default)]
pub struct FailingNotifier;

#[async_trait::async_trait]
impl Notifier for FailingNotifier {
    async fn dispatch(&self, _notification: &Notification) -> Result<()> {
        Err(anyhow!("notification gateway unavailable"))
    }
}

/// A seller, the owner of one channel, and an admin
pub struct Marketplace {
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub manager: CampaignLifecycleManager,
    pub seller: Actor,
    pub owner: Actor,
    pub admin: Actor,
    pub channel_id: ChannelId,
}

impl Marketplace {
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(RecordingNotifier::default()))
    }

    pub fn with_notifier(notifier: Arc<RecordingNotifier>) -> Self {
        let store = Arc::new(MemoryStore::new());
        let manager = CampaignLifecycleManager::new(
            store.clone(),
            notifier.clone(),
            LifecyclePolicy::default(),
        );
        let channel_id = ChannelId::new();
        Self {
            store,
            notifier,
            manager,
            seller: Actor::seller(UserId::new(), SellerId::new()),
            owner: Actor::channel_owner(UserId::new(), vec![channel_id]),
            admin: Actor::admin(UserId::new()),
            channel_id,
        }
    }

    pub fn request(&self, budget: i64) -> NewCampaign {
        NewCampaign {
            channel_id: self.channel_id,
            budget: Decimal::from(budget),
            start_date: NaiveDate::from_ymd_opt(2025, 9, 1).unwrap(),
            end_date: NaiveDate::from_ymd_opt(2025, 9, 14).unwrap(),
            creative: Creative {
                ad_format: Some("post".to_string()),
                creative_text: Some("Try our new app".to_string()),
                creative_images: vec!["https://cdn.example.com/banner.png".to_string()],
                creative_video_url: None,
                ad_url: Some("https://example.com/app".to_string()),
            },
            seller_notes: None,
        }
    }

    /// Deposit `budget` and create a pending campaign spending all of it
    pub async fn pending_campaign(&self, budget: i64) -> Campaign {
        self.manager
            .deposit(&self.seller, Decimal::from(budget))
            .await
            .unwrap();
        self.manager
            .create_campaign(&self.seller, self.request(budget))
            .await
            .expect("fixture campaign should be created")
    }

    pub async fn in_progress_campaign(&self, budget: i64) -> Campaign {
        let campaign = self.pending_campaign(budget).await;
        self.manager
            .accept_campaign(&self.owner, campaign.id, None)
            .await
            .unwrap();
        self.manager
            .submit_placement(
                &self.owner,
                campaign.id,
                "https://t.me/channel/101".to_string(),
                PlacementProofType::PostLink,
                None,
            )
            .await
            .unwrap()
    }

    pub async fn disputed_campaign(&self, budget: i64) -> Campaign {
        let campaign = self.in_progress_campaign(budget).await;
        self.manager
            .confirm_campaign(
                &self.seller,
                campaign.id,
                false,
                Some("the post was removed after two hours".to_string()),
            )
            .await
            .unwrap()
    }
}

impl Default for Marketplace {
    fn default() -> Self {
        Self::new()
    }
}
