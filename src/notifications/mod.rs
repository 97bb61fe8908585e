//! Lifecycle notifications
//!
//! Notifications are built while planning a transition and dispatched only
//! after the transition has been committed. Delivery failures are logged and
//! counted; they never undo a committed transition.

use anyhow::Result;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::campaign::types::{Campaign, CampaignId, ChannelId, DisputeDecision, SellerId};

#[cfg(test)]
use mockall::automock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    CampaignCreated,
    CampaignAccepted,
    CampaignRejected,
    CampaignCancelled,
    PlacementSubmitted,
    CampaignCompleted,
    DisputeOpened,
    DisputeResolved,
}

/// Who should receive a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Recipient {
    Seller(SellerId),
    ChannelOwner(ChannelId),
    AdminQueue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub recipient: Recipient,
    pub campaign_id: CampaignId,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    fn new(
        kind: NotificationKind,
        recipient: Recipient,
        campaign: &Campaign,
        title: &str,
        message: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            recipient,
            campaign_id: campaign.id,
            title: title.to_string(),
            message,
            created_at: now,
        }
    }

    pub fn campaign_created(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::CampaignCreated,
            Recipient::ChannelOwner(campaign.channel_id),
            campaign,
            "New ad campaign",
            format!(
                "A seller proposed a campaign with budget {} for {} to {}",
                campaign.budget, campaign.start_date, campaign.end_date
            ),
            now,
        )
    }

    pub fn campaign_accepted(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::CampaignAccepted,
            Recipient::Seller(campaign.seller_id),
            campaign,
            "Campaign accepted",
            "The channel owner accepted your campaign".to_string(),
            now,
        )
    }

    pub fn campaign_rejected(campaign: &Campaign, reason: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::CampaignRejected,
            Recipient::Seller(campaign.seller_id),
            campaign,
            "Campaign rejected",
            format!(
                "The channel owner rejected your campaign: {reason}. {} was returned to your balance",
                campaign.budget
            ),
            now,
        )
    }

    pub fn campaign_cancelled(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::CampaignCancelled,
            Recipient::ChannelOwner(campaign.channel_id),
            campaign,
            "Campaign cancelled",
            "The seller withdrew the campaign before it was accepted".to_string(),
            now,
        )
    }

    pub fn placement_submitted(campaign: &Campaign, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::PlacementSubmitted,
            Recipient::Seller(campaign.seller_id),
            campaign,
            "Placement published",
            "The channel owner published your ad. Please review the proof and confirm".to_string(),
            now,
        )
    }

    pub fn campaign_completed(campaign: &Campaign, payout: Decimal, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::CampaignCompleted,
            Recipient::ChannelOwner(campaign.channel_id),
            campaign,
            "Campaign completed",
            format!("The campaign is complete. {payout} was credited to your channel"),
            now,
        )
    }

    pub fn dispute_opened(campaign: &Campaign, reason: &str, now: DateTime<Utc>) -> Self {
        Self::new(
            NotificationKind::DisputeOpened,
            Recipient::AdminQueue,
            campaign,
            "Dispute opened",
            format!("Seller disputed the placement: {reason}"),
            now,
        )
    }

    /// One notice for each party of a resolved dispute
    pub fn dispute_resolved(
        campaign: &Campaign,
        decision: DisputeDecision,
        now: DateTime<Utc>,
    ) -> Vec<Self> {
        let message = format!("An administrator resolved the dispute with decision '{decision}'");
        vec![
            Self::new(
                NotificationKind::DisputeResolved,
                Recipient::Seller(campaign.seller_id),
                campaign,
                "Dispute resolved",
                message.clone(),
                now,
            ),
            Self::new(
                NotificationKind::DisputeResolved,
                Recipient::ChannelOwner(campaign.channel_id),
                campaign,
                "Dispute resolved",
                message,
                now,
            ),
        ]
    }
}

/// Delivery channel for lifecycle notifications
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn dispatch(&self, notification: &Notification) -> Result<()>;
}

/// Writes notifications to the structured log
#[derive(Debug, Default, Clone)]
pub struct TracingNotifier;

#[async_trait::async_trait]
impl Notifier for TracingNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        info!(
            kind = ?notification.kind,
            recipient = ?notification.recipient,
            campaign.id = %notification.campaign_id,
            title = %notification.title,
            "{}",
            notification.message
        );
        Ok(())
    }
}

/// Fans notifications out to in-process subscribers
#[derive(Debug, Clone)]
pub struct BroadcastNotifier {
    sender: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastNotifier {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait::async_trait]
impl Notifier for BroadcastNotifier {
    async fn dispatch(&self, notification: &Notification) -> Result<()> {
        // No subscribers is not a delivery failure
        let _ = self.sender.send(notification.clone());
        Ok(())
    }
}
