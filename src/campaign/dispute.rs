// Admin resolution of disputed campaigns

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::LifecycleError;
use super::state_machine::{LifecyclePolicy, TransitionPlan};
use super::types::{
    ActivityKind, ActivityRecord, Actor, Campaign, CampaignStatus, Dispute, DisputeDecision,
    DisputeStatus,
};
use super::validation::{validate_cents, validate_reason};
use crate::escrow::{completion_payout, LedgerEntry};
use crate::notifications::Notification;
use crate::store::TransitionCommit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisputeResolution {
    pub decision: DisputeDecision,
    /// Amount returned to the seller; only for `PartialRefund`
    pub refund_amount: Option<Decimal>,
    pub admin_notes: String,
}

impl DisputeResolution {
    pub fn refund(admin_notes: impl Into<String>) -> Self {
        Self {
            decision: DisputeDecision::Refund,
            refund_amount: None,
            admin_notes: admin_notes.into(),
        }
    }

    pub fn release_payment(admin_notes: impl Into<String>) -> Self {
        Self {
            decision: DisputeDecision::ReleasePayment,
            refund_amount: None,
            admin_notes: admin_notes.into(),
        }
    }

    pub fn partial_refund(refund_amount: Decimal, admin_notes: impl Into<String>) -> Self {
        Self {
            decision: DisputeDecision::PartialRefund,
            refund_amount: Some(refund_amount),
            admin_notes: admin_notes.into(),
        }
    }
}

/// Ledger movements for a resolution. Release pays commission like a normal
/// completion; the owner's share of a partial refund is paid without it.
fn settlement_entries(
    campaign: &Campaign,
    resolution: &DisputeResolution,
    now: DateTime<Utc>,
) -> Result<Vec<LedgerEntry>, LifecycleError> {
    if resolution.decision != DisputeDecision::PartialRefund && resolution.refund_amount.is_some() {
        return Err(LifecycleError::validation(
            "refund_amount",
            format!("only allowed for partial_refund, not {}", resolution.decision),
        ));
    }
    match resolution.decision {
        DisputeDecision::Refund => Ok(vec![LedgerEntry::refund(
            campaign.id,
            campaign.seller_id,
            campaign.budget,
            now,
        )]),
        DisputeDecision::ReleasePayment => {
            let payout = completion_payout(campaign.budget, campaign.platform_commission_percent);
            let mut entries = vec![LedgerEntry::release(
                campaign.id,
                campaign.channel_id,
                payout.owner_amount,
                now,
            )];
            if !payout.commission.is_zero() {
                entries.push(LedgerEntry::commission(campaign.id, payout.commission, now));
            }
            Ok(entries)
        }
        DisputeDecision::PartialRefund => {
            let refund = resolution.refund_amount.ok_or_else(|| {
                LifecycleError::validation("refund_amount", "required for partial_refund")
            })?;
            validate_cents("refund_amount", refund)?;
            if refund <= Decimal::ZERO || refund >= campaign.budget {
                return Err(LifecycleError::validation(
                    "refund_amount",
                    format!("{refund} must be greater than 0 and less than the budget {}", campaign.budget),
                ));
            }
            Ok(vec![
                LedgerEntry::refund(campaign.id, campaign.seller_id, refund, now),
                LedgerEntry::release(campaign.id, campaign.channel_id, campaign.budget - refund, now),
            ])
        }
    }
}

/// Plan the resolution of an open dispute on a disputed campaign
pub(crate) fn settle(
    campaign: &Campaign,
    dispute: &Dispute,
    resolution: &DisputeResolution,
    actor: &Actor,
    policy: &LifecyclePolicy,
    now: DateTime<Utc>,
) -> Result<TransitionPlan, LifecycleError> {
    if dispute.campaign_id != campaign.id || !dispute.is_open() {
        return Err(LifecycleError::NotFound {
            entity: "open dispute",
            id: campaign.id.to_string(),
        });
    }
    let notes = validate_reason("admin_notes", &resolution.admin_notes, policy.min_reason_length)?;
    let ledger = settlement_entries(campaign, resolution, now)?;

    let mut next = campaign.clone();
    next.status = resolution.decision.resulting_status();
    next.updated_at = now;
    if next.status == CampaignStatus::Completed {
        next.actual_completion_date.get_or_insert(now);
    }

    let mut resolved = dispute.clone();
    resolved.status = DisputeStatus::Resolved;
    resolved.decision = Some(resolution.decision);
    resolved.refund_amount = match resolution.decision {
        DisputeDecision::PartialRefund => resolution.refund_amount,
        DisputeDecision::Refund => Some(campaign.budget),
        DisputeDecision::ReleasePayment => None,
    };
    resolved.admin_notes = Some(notes.clone());
    resolved.resolved_by = Some(actor.user_id);
    resolved.resolved_at = Some(now);

    Ok(TransitionPlan {
        notifications: Notification::dispute_resolved(&next, resolution.decision, now),
        commit: TransitionCommit {
            expected_status: campaign.status,
            campaign: next,
            ledger,
            activity: ActivityRecord::new(
                campaign.id,
                actor.user_id,
                ActivityKind::DisputeResolved,
                format!("Dispute resolved ({}): {notes}", resolution.decision),
                now,
            ),
            dispute: Some(resolved),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::state_machine::{CampaignEvent, LifecycleMachine};
    use crate::campaign::types::{
        ChannelId, Creative, NewCampaign, PlacementProofType, SellerId, UserId,
    };
    use crate::escrow::{EntryKind, EscrowSummary};
    use chrono::NaiveDate;

    fn disputed() -> (Campaign, Dispute, Actor) {
        let mut campaign = Campaign::from_request(
            SellerId::new(),
            NewCampaign {
                channel_id: ChannelId::new(),
                budget: Decimal::from(10_000),
                start_date: NaiveDate::from_ymd_opt(2025, 7, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 7, 2).unwrap(),
                creative: Creative::default(),
                seller_notes: None,
            },
            Decimal::from(10),
            Utc::now(),
        );
        campaign.status = CampaignStatus::Disputed;
        campaign.placement_proof_url = Some("https://t.me/c/9".into());
        campaign.placement_proof_type = Some(PlacementProofType::Screenshot);
        campaign.owner_submitted_at = Some(Utc::now());
        let dispute = Dispute::open(campaign.id, UserId::new(), "ad removed early".into(), Utc::now());
        (campaign, dispute, Actor::admin(UserId::new()))
    }

    fn resolve(
        campaign: &Campaign,
        dispute: &Dispute,
        actor: &Actor,
        resolution: DisputeResolution,
    ) -> Result<TransitionPlan, LifecycleError> {
        LifecycleMachine::plan(
            campaign,
            actor,
            &CampaignEvent::ResolveDispute {
                dispute: dispute.clone(),
                resolution,
            },
            &LifecyclePolicy::default(),
            Utc::now(),
        )
    }

    fn held(campaign: &Campaign) -> Vec<LedgerEntry> {
        vec![LedgerEntry::hold(campaign.id, campaign.seller_id, campaign.budget, Utc::now())]
    }

    #[test]
    fn test_refund_cancels_and_returns_budget() {
        let (campaign, dispute, admin) = disputed();
        let plan = resolve(
            &campaign,
            &dispute,
            &admin,
            DisputeResolution::refund("placement never happened"),
        )
        .unwrap();

        assert_eq!(plan.to_status(), CampaignStatus::Cancelled);
        assert_eq!(plan.commit.ledger.len(), 1);
        assert_eq!(plan.commit.ledger[0].kind, EntryKind::Refund);
        assert_eq!(plan.commit.ledger[0].amount, Decimal::from(10_000));
        let resolved = plan.commit.dispute.unwrap();
        assert_eq!(resolved.status, DisputeStatus::Resolved);
        assert_eq!(resolved.resolved_by, Some(admin.user_id));
    }

    #[test]
    fn test_release_payment_applies_commission() {
        let (campaign, dispute, admin) = disputed();
        let plan = resolve(
            &campaign,
            &dispute,
            &admin,
            DisputeResolution::release_payment("proof checks out, post is live"),
        )
        .unwrap();

        assert_eq!(plan.to_status(), CampaignStatus::Completed);
        assert!(plan.commit.campaign.actual_completion_date.is_some());
        let mut entries = held(&campaign);
        entries.extend(plan.commit.ledger.iter().cloned());
        let summary = EscrowSummary::from_entries(&entries);
        assert_eq!(summary.released, Decimal::from(9_000));
        assert_eq!(summary.commission, Decimal::from(1_000));
        assert_eq!(summary.remaining(), Decimal::ZERO);
    }

    #[test]
    fn test_partial_refund_splits_without_commission() {
        let (campaign, dispute, admin) = disputed();
        let plan = resolve(
            &campaign,
            &dispute,
            &admin,
            DisputeResolution::partial_refund(Decimal::from(4_000), "post was up for half the term"),
        )
        .unwrap();

        let mut entries = held(&campaign);
        entries.extend(plan.commit.ledger.iter().cloned());
        let summary = EscrowSummary::from_entries(&entries);
        assert_eq!(summary.refunded, Decimal::from(4_000));
        assert_eq!(summary.released, Decimal::from(6_000));
        assert_eq!(summary.commission, Decimal::ZERO);
        assert_eq!(plan.commit.dispute.unwrap().refund_amount, Some(Decimal::from(4_000)));
    }

    #[test]
    fn test_partial_refund_bounds() {
        let (campaign, dispute, admin) = disputed();
        for amount in [0, 10_000, 12_000] {
            let result = resolve(
                &campaign,
                &dispute,
                &admin,
                DisputeResolution::partial_refund(Decimal::from(amount), "split the difference"),
            );
            assert!(matches!(
                result,
                Err(LifecycleError::ValidationError { field: "refund_amount", .. })
            ));
        }
    }

    #[test]
    fn test_partial_refund_in_whole_cents() {
        let (campaign, dispute, admin) = disputed();
        let result = resolve(
            &campaign,
            &dispute,
            &admin,
            DisputeResolution::partial_refund(Decimal::new(400_0005, 3), "split the difference"),
        );
        assert!(matches!(
            result,
            Err(LifecycleError::ValidationError { field: "refund_amount", .. })
        ));

        let plan = resolve(
            &campaign,
            &dispute,
            &admin,
            DisputeResolution::partial_refund(Decimal::new(4_000_50, 2), "split the difference"),
        )
        .unwrap();
        assert_eq!(plan.commit.ledger[1].amount, Decimal::new(5_999_50, 2));
    }

    #[test]
    fn test_refund_amount_only_with_partial_refund() {
        let (campaign, dispute, admin) = disputed();
        for decision in [DisputeDecision::Refund, DisputeDecision::ReleasePayment] {
            let resolution = DisputeResolution {
                decision,
                refund_amount: Some(Decimal::from(1_000)),
                admin_notes: "amount given by mistake".into(),
            };
            let result = resolve(&campaign, &dispute, &admin, resolution);
            assert!(matches!(
                result,
                Err(LifecycleError::ValidationError { field: "refund_amount", .. })
            ));
        }
    }

    #[test]
    fn test_admin_notes_minimum_length() {
        let (campaign, dispute, admin) = disputed();
        let result = resolve(&campaign, &dispute, &admin, DisputeResolution::refund("ok"));
        assert!(matches!(
            result,
            Err(LifecycleError::ValidationError { field: "admin_notes", .. })
        ));
    }

    #[test]
    fn test_only_admins_resolve() {
        let (campaign, dispute, _) = disputed();
        let seller = Actor::seller(UserId::new(), campaign.seller_id);
        let result = resolve(
            &campaign,
            &dispute,
            &seller,
            DisputeResolution::refund("I want my money back"),
        );
        assert!(matches!(result, Err(LifecycleError::Unauthorized { .. })));
    }

    #[test]
    fn test_resolved_dispute_cannot_be_reused() {
        let (campaign, mut dispute, admin) = disputed();
        dispute.status = DisputeStatus::Resolved;
        let result = resolve(
            &campaign,
            &dispute,
            &admin,
            DisputeResolution::refund("second attempt at settling"),
        );
        assert!(matches!(result, Err(LifecycleError::NotFound { .. })));
    }
}
