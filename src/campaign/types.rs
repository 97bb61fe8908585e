// Core types for the campaign lifecycle

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::errors::LifecycleError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Campaign identifier
    CampaignId
);
uuid_id!(
    /// Seller profile identifier
    SellerId
);
uuid_id!(
    /// Channel identifier; earnings accrue to the channel account
    ChannelId
);
uuid_id!(
    /// Authenticated user identifier
    UserId
);
uuid_id!(DisputeId);

/// Campaign status in the lifecycle graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CampaignStatus {
    /// Created by a seller, funds held, waiting for the channel owner
    Pending,
    /// Channel owner agreed to publish the ad
    Accepted,
    /// Channel owner declined; budget refunded
    Rejected,
    /// Placement proof submitted, waiting for seller confirmation
    InProgress,
    /// Seller confirmed (or admin released); budget paid out
    Completed,
    /// Seller objected to the placement; waiting for an admin
    Disputed,
    /// Withdrawn by the seller or refunded by an admin
    Cancelled,
}

impl CampaignStatus {
    pub const ALL: [CampaignStatus; 7] = [
        CampaignStatus::Pending,
        CampaignStatus::Accepted,
        CampaignStatus::Rejected,
        CampaignStatus::InProgress,
        CampaignStatus::Completed,
        CampaignStatus::Disputed,
        CampaignStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CampaignStatus::Pending => "pending",
            CampaignStatus::Accepted => "accepted",
            CampaignStatus::Rejected => "rejected",
            CampaignStatus::InProgress => "in_progress",
            CampaignStatus::Completed => "completed",
            CampaignStatus::Disputed => "disputed",
            CampaignStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Completed | CampaignStatus::Rejected | CampaignStatus::Cancelled
        )
    }

    /// Statuses with funds still held and work outstanding
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            CampaignStatus::Pending | CampaignStatus::Accepted | CampaignStatus::InProgress
        )
    }

    /// Edges of the lifecycle graph, including admin dispute resolution
    pub fn successors(&self) -> &'static [CampaignStatus] {
        match self {
            CampaignStatus::Pending => &[
                CampaignStatus::Accepted,
                CampaignStatus::Rejected,
                CampaignStatus::Cancelled,
            ],
            CampaignStatus::Accepted => &[CampaignStatus::InProgress],
            CampaignStatus::InProgress => &[CampaignStatus::Completed, CampaignStatus::Disputed],
            CampaignStatus::Disputed => &[CampaignStatus::Completed, CampaignStatus::Cancelled],
            CampaignStatus::Rejected | CampaignStatus::Completed | CampaignStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, next: CampaignStatus) -> bool {
        self.successors().contains(&next)
    }
}

impl fmt::Display for CampaignStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CampaignStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CampaignStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| LifecycleError::validation("status", format!("unknown status '{s}'")))
    }
}

/// Kind of evidence supplied with a placement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementProofType {
    Screenshot,
    PostLink,
    Other,
}

impl PlacementProofType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PlacementProofType::Screenshot => "screenshot",
            PlacementProofType::PostLink => "post_link",
            PlacementProofType::Other => "other",
        }
    }
}

impl fmt::Display for PlacementProofType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlacementProofType {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "screenshot" => Ok(PlacementProofType::Screenshot),
            "post_link" | "post-link" => Ok(PlacementProofType::PostLink),
            "other" => Ok(PlacementProofType::Other),
            _ => Err(LifecycleError::validation(
                "placement_proof_type",
                format!("'{s}' is not one of screenshot, post_link, other"),
            )),
        }
    }
}

/// Caller role as established by the authentication layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Seller,
    ChannelOwner,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Seller => "seller",
            Role::ChannelOwner => "channel_owner",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "seller" => Ok(Role::Seller),
            "channel_owner" | "channel-owner" => Ok(Role::ChannelOwner),
            "admin" => Ok(Role::Admin),
            _ => Err(LifecycleError::validation("role", format!("unknown role '{s}'"))),
        }
    }
}

/// Verified caller identity, passed explicitly into every operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
    /// Seller profile owned by this user (sellers only)
    pub seller_id: Option<SellerId>,
    /// Channels owned by this user (channel owners only)
    pub channel_ids: Vec<ChannelId>,
}

impl Actor {
    pub fn seller(user_id: UserId, seller_id: SellerId) -> Self {
        Self {
            user_id,
            role: Role::Seller,
            seller_id: Some(seller_id),
            channel_ids: Vec::new(),
        }
    }

    pub fn channel_owner(user_id: UserId, channel_ids: Vec<ChannelId>) -> Self {
        Self {
            user_id,
            role: Role::ChannelOwner,
            seller_id: None,
            channel_ids,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
            seller_id: None,
            channel_ids: Vec::new(),
        }
    }

    pub fn owns_channel(&self, channel_id: ChannelId) -> bool {
        self.role == Role::ChannelOwner && self.channel_ids.contains(&channel_id)
    }

    pub fn is_seller_of(&self, campaign: &Campaign) -> bool {
        self.role == Role::Seller && self.seller_id == Some(campaign.seller_id)
    }

    /// Sellers see their own campaigns, owners the campaigns on their channels,
    /// admins everything.
    pub fn can_view(&self, campaign: &Campaign) -> bool {
        match self.role {
            Role::Seller => self.is_seller_of(campaign),
            Role::ChannelOwner => self.owns_channel(campaign.channel_id),
            Role::Admin => true,
        }
    }
}

/// Ad content supplied by the seller at creation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creative {
    pub ad_format: Option<String>,
    pub creative_text: Option<String>,
    #[serde(default)]
    pub creative_images: Vec<String>,
    pub creative_video_url: Option<String>,
    pub ad_url: Option<String>,
}

/// Request to create a campaign
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCampaign {
    pub channel_id: ChannelId,
    pub budget: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub creative: Creative,
    pub seller_notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Campaign {
    pub id: CampaignId,
    pub seller_id: SellerId,
    pub channel_id: ChannelId,
    pub status: CampaignStatus,
    pub budget: Decimal,
    pub platform_commission_percent: Decimal,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(flatten)]
    pub creative: Creative,
    pub owner_notes: Option<String>,
    pub seller_notes: Option<String>,
    pub placement_proof_url: Option<String>,
    pub placement_proof_type: Option<PlacementProofType>,
    pub owner_submitted_at: Option<DateTime<Utc>>,
    pub seller_confirmed_at: Option<DateTime<Utc>>,
    pub actual_completion_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Campaign {
    /// Build a pending campaign from a validated request
    pub fn from_request(
        seller_id: SellerId,
        request: NewCampaign,
        platform_commission_percent: Decimal,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: CampaignId::new(),
            seller_id,
            channel_id: request.channel_id,
            status: CampaignStatus::Pending,
            budget: request.budget,
            platform_commission_percent,
            start_date: request.start_date,
            end_date: request.end_date,
            creative: request.creative,
            owner_notes: None,
            seller_notes: request.seller_notes,
            placement_proof_url: None,
            placement_proof_type: None,
            owner_submitted_at: None,
            seller_confirmed_at: None,
            actual_completion_date: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_placement_proof(&self) -> bool {
        self.owner_submitted_at.is_some()
            && self
                .placement_proof_url
                .as_deref()
                .is_some_and(|url| !url.trim().is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeStatus {
    Open,
    Resolved,
}

impl fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisputeStatus::Open => f.write_str("open"),
            DisputeStatus::Resolved => f.write_str("resolved"),
        }
    }
}

impl FromStr for DisputeStatus {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(DisputeStatus::Open),
            "resolved" => Ok(DisputeStatus::Resolved),
            _ => Err(LifecycleError::validation(
                "dispute_status",
                format!("unknown dispute status '{s}'"),
            )),
        }
    }
}

/// Binding admin decision on a disputed campaign
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeDecision {
    /// Full budget back to the seller
    Refund,
    /// Budget paid out to the channel owner, minus platform commission
    ReleasePayment,
    /// Part refunded to the seller, remainder paid to the channel owner
    PartialRefund,
}

impl DisputeDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisputeDecision::Refund => "refund",
            DisputeDecision::ReleasePayment => "release_payment",
            DisputeDecision::PartialRefund => "partial_refund",
        }
    }

    /// Terminal status the campaign ends in after this decision
    pub fn resulting_status(&self) -> CampaignStatus {
        match self {
            DisputeDecision::Refund => CampaignStatus::Cancelled,
            DisputeDecision::ReleasePayment | DisputeDecision::PartialRefund => {
                CampaignStatus::Completed
            }
        }
    }
}

impl fmt::Display for DisputeDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisputeDecision {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "refund" => Ok(DisputeDecision::Refund),
            "release_payment" | "release-payment" => Ok(DisputeDecision::ReleasePayment),
            "partial_refund" | "partial-refund" => Ok(DisputeDecision::PartialRefund),
            _ => Err(LifecycleError::validation(
                "decision",
                format!("'{s}' is not one of refund, release_payment, partial_refund"),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub campaign_id: CampaignId,
    pub initiated_by: UserId,
    pub reason: String,
    pub status: DisputeStatus,
    pub decision: Option<DisputeDecision>,
    pub refund_amount: Option<Decimal>,
    pub admin_notes: Option<String>,
    pub resolved_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Dispute {
    pub fn open(
        campaign_id: CampaignId,
        initiated_by: UserId,
        reason: String,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: DisputeId::new(),
            campaign_id,
            initiated_by,
            reason,
            status: DisputeStatus::Open,
            decision: None,
            refund_amount: None,
            admin_notes: None,
            resolved_by: None,
            created_at: now,
            resolved_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.status == DisputeStatus::Open
    }
}

/// Audit trail entry kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Created,
    Accepted,
    Rejected,
    Cancelled,
    Submitted,
    Confirmed,
    Disputed,
    DisputeResolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub campaign_id: CampaignId,
    pub user_id: UserId,
    pub action: ActivityKind,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl ActivityRecord {
    pub fn new(
        campaign_id: CampaignId,
        user_id: UserId,
        action: ActivityKind,
        description: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            campaign_id,
            user_id,
            action,
            description: description.into(),
            created_at,
        }
    }
}

/// Per-caller campaign counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignStats {
    pub total_campaigns: usize,
    pub active_campaigns: usize,
    pub completed_campaigns: usize,
    pub pending_campaigns: usize,
    pub disputed_campaigns: usize,
    /// Spent for sellers, earned for channel owners, commission for admins
    pub total_amount: Decimal,
}
