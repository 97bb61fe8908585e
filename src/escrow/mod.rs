// Escrow ledger
//
// Every money movement is an append-only ledger entry. Balances and the
// per-campaign escrow position are derived from entries, never stored.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::campaign::types::{CampaignId, ChannelId, SellerId};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum Account {
    Seller(SellerId),
    Channel(ChannelId),
    Platform,
}

impl Account {
    /// Flat key used for indexed lookups in persistent stores
    pub fn key(&self) -> String {
        match self {
            Account::Seller(id) => format!("seller:{id}"),
            Account::Channel(id) => format!("channel:{id}"),
            Account::Platform => "platform".to_string(),
        }
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Seller tops up their balance
    Deposit,
    /// Budget moved from the seller balance into escrow at creation
    Hold,
    /// Escrow paid to the channel owner
    Release,
    /// Escrow paid to the platform
    Commission,
    /// Escrow returned to the seller
    Refund,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Deposit => "deposit",
            EntryKind::Hold => "hold",
            EntryKind::Release => "release",
            EntryKind::Commission => "commission",
            EntryKind::Refund => "refund",
        }
    }

    /// Entries that draw down a campaign's held escrow
    pub fn is_settlement(&self) -> bool {
        matches!(self, EntryKind::Release | EntryKind::Commission | EntryKind::Refund)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub campaign_id: Option<CampaignId>,
    pub account: Account,
    pub kind: EntryKind,
    pub amount: Decimal,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    fn new(
        campaign_id: Option<CampaignId>,
        account: Account,
        kind: EntryKind,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            campaign_id,
            account,
            kind,
            amount,
            created_at,
        }
    }

    pub fn deposit(seller_id: SellerId, amount: Decimal, at: DateTime<Utc>) -> Self {
        Self::new(None, Account::Seller(seller_id), EntryKind::Deposit, amount, at)
    }

    pub fn hold(
        campaign_id: CampaignId,
        seller_id: SellerId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Some(campaign_id),
            Account::Seller(seller_id),
            EntryKind::Hold,
            amount,
            at,
        )
    }

    pub fn refund(
        campaign_id: CampaignId,
        seller_id: SellerId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Some(campaign_id),
            Account::Seller(seller_id),
            EntryKind::Refund,
            amount,
            at,
        )
    }

    pub fn release(
        campaign_id: CampaignId,
        channel_id: ChannelId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Self {
        Self::new(
            Some(campaign_id),
            Account::Channel(channel_id),
            EntryKind::Release,
            amount,
            at,
        )
    }

    pub fn commission(campaign_id: CampaignId, amount: Decimal, at: DateTime<Utc>) -> Self {
        Self::new(
            Some(campaign_id),
            Account::Platform,
            EntryKind::Commission,
            amount,
            at,
        )
    }

    /// Signed effect on the owning account's balance
    pub fn balance_effect(&self) -> Decimal {
        match self.kind {
            EntryKind::Hold => -self.amount,
            _ => self.amount,
        }
    }
}

pub fn balance_of<'a>(
    account: &Account,
    entries: impl IntoIterator<Item = &'a LedgerEntry>,
) -> Decimal {
    entries
        .into_iter()
        .filter(|entry| &entry.account == account)
        .map(LedgerEntry::balance_effect)
        .sum()
}

/// Escrow position of a single campaign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSummary {
    pub held: Decimal,
    pub released: Decimal,
    pub commission: Decimal,
    pub refunded: Decimal,
}

impl EscrowSummary {
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> Self {
        entries
            .into_iter()
            .fold(Self::default(), |mut summary, entry| {
                match entry.kind {
                    EntryKind::Hold => summary.held += entry.amount,
                    EntryKind::Release => summary.released += entry.amount,
                    EntryKind::Commission => summary.commission += entry.amount,
                    EntryKind::Refund => summary.refunded += entry.amount,
                    EntryKind::Deposit => {}
                }
                summary
            })
    }

    pub fn settled(&self) -> Decimal {
        self.released + self.commission + self.refunded
    }

    pub fn remaining(&self) -> Decimal {
        self.held - self.settled()
    }

    pub fn is_settled(&self) -> bool {
        self.settled() > Decimal::ZERO
    }

    /// Amount the seller actually paid for the placement
    pub fn spent(&self) -> Decimal {
        self.released + self.commission
    }
}

/// Split of a completed campaign's budget
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    pub owner_amount: Decimal,
    pub commission: Decimal,
}

/// Commission is rounded to two places (half away from zero); the owner
/// receives the exact remainder so the parts always sum to the budget.
pub fn completion_payout(budget: Decimal, commission_percent: Decimal) -> Payout {
    let commission = (budget * commission_percent / Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    Payout {
        owner_amount: budget - commission,
        commission,
    }
}

/// Settlement must happen once and must move exactly the held amount.
pub fn check_settlement(
    campaign_id: CampaignId,
    existing: &[LedgerEntry],
    incoming: &[LedgerEntry],
) -> Result<(), StoreError> {
    let requested: Decimal = incoming
        .iter()
        .filter(|entry| entry.kind.is_settlement())
        .map(|entry| entry.amount)
        .sum();
    if incoming.iter().all(|entry| !entry.kind.is_settlement()) {
        return Ok(());
    }

    let summary = EscrowSummary::from_entries(existing);
    if summary.is_settled() {
        return Err(StoreError::AlreadySettled(campaign_id));
    }
    if requested != summary.held {
        return Err(StoreError::EscrowMismatch {
            campaign_id,
            held: summary.held,
            requested,
        });
    }
    Ok(())
}
