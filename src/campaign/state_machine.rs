use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statig::prelude::*;

use super::dispute::{self, DisputeResolution};
use super::errors::LifecycleError;
use super::types::{
    ActivityKind, ActivityRecord, Actor, Campaign, CampaignStatus, Dispute, PlacementProofType,
    Role,
};
use super::validation::{validate_proof_url, validate_reason};
use crate::escrow::{completion_payout, LedgerEntry};
use crate::notifications::Notification;
use crate::store::TransitionCommit;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CampaignEvent {
    /// Positions the machine at the campaign's stored status
    Restore,
    Accept {
        owner_notes: Option<String>,
    },
    Reject {
        reason: String,
    },
    Cancel {
        reason: Option<String>,
    },
    SubmitPlacement {
        proof_url: String,
        proof_type: PlacementProofType,
        owner_notes: Option<String>,
    },
    Confirm {
        confirmed: bool,
        dispute_reason: Option<String>,
    },
    ResolveDispute {
        dispute: Dispute,
        resolution: DisputeResolution,
    },
}

impl CampaignEvent {
    pub fn action(&self) -> &'static str {
        match self {
            CampaignEvent::Restore => "restore",
            CampaignEvent::Accept { .. } => "accept",
            CampaignEvent::Reject { .. } => "reject",
            CampaignEvent::Cancel { .. } => "cancel",
            CampaignEvent::SubmitPlacement { .. } => "submit placement for",
            CampaignEvent::Confirm { .. } => "confirm",
            CampaignEvent::ResolveDispute { .. } => "resolve a dispute on",
        }
    }

    pub fn required_role(&self) -> Option<Role> {
        match self {
            CampaignEvent::Restore => None,
            CampaignEvent::Accept { .. }
            | CampaignEvent::Reject { .. }
            | CampaignEvent::SubmitPlacement { .. } => Some(Role::ChannelOwner),
            CampaignEvent::Cancel { .. } | CampaignEvent::Confirm { .. } => Some(Role::Seller),
            CampaignEvent::ResolveDispute { .. } => Some(Role::Admin),
        }
    }

    /// Role first, then the actor must be the campaign's party for that role
    pub fn authorize(&self, actor: &Actor, campaign: &Campaign) -> Result<(), LifecycleError> {
        let Some(role) = self.required_role() else {
            return Ok(());
        };
        let is_party = match role {
            Role::Seller => actor.is_seller_of(campaign),
            Role::ChannelOwner => actor.owns_channel(campaign.channel_id),
            Role::Admin => actor.role == Role::Admin,
        };
        if actor.role != role || !is_party {
            return Err(LifecycleError::Unauthorized {
                role: actor.role,
                action: self.action(),
            });
        }
        Ok(())
    }
}

/// Marketplace rules applied by the lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LifecyclePolicy {
    /// Commission captured on new campaigns; existing campaigns keep theirs
    pub platform_commission_percent: Decimal,
    /// Minimum length of rejection reasons, dispute reasons and admin notes
    pub min_reason_length: usize,
    pub min_deposit: Decimal,
    pub max_deposit: Decimal,
}

impl Default for LifecyclePolicy {
    fn default() -> Self {
        Self {
            platform_commission_percent: Decimal::from(10),
            min_reason_length: 10,
            min_deposit: Decimal::from(100),
            max_deposit: Decimal::from(500_000),
        }
    }
}

/// Result of planning a transition: what to commit, and what to announce
/// once the commit succeeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionPlan {
    pub commit: TransitionCommit,
    pub notifications: Vec<Notification>,
}

impl TransitionPlan {
    pub fn from_status(&self) -> CampaignStatus {
        self.commit.expected_status
    }

    pub fn to_status(&self) -> CampaignStatus {
        self.commit.campaign.status
    }
}

/// Lifecycle machine for a single campaign.
///
/// The machine is rebuilt from the stored record for every request: a
/// `Restore` event moves it to the campaign's status, then the requested
/// event is handled. Handlers never touch storage; they produce a
/// `TransitionPlan` the caller commits.
pub struct LifecycleMachine {
    campaign: Campaign,
    actor: Actor,
    policy: LifecyclePolicy,
    now: DateTime<Utc>,
    outcome: Option<Result<TransitionPlan, LifecycleError>>,
}

impl LifecycleMachine {
    fn new(campaign: &Campaign, actor: &Actor, policy: &LifecyclePolicy, now: DateTime<Utc>) -> Self {
        Self {
            campaign: campaign.clone(),
            actor: actor.clone(),
            policy: policy.clone(),
            now,
            outcome: None,
        }
    }

    /// Plan `event` against `campaign` on behalf of `actor`.
    ///
    /// Checks run in a fixed order: actor role, current status, payload.
    pub fn plan(
        campaign: &Campaign,
        actor: &Actor,
        event: &CampaignEvent,
        policy: &LifecyclePolicy,
        now: DateTime<Utc>,
    ) -> Result<TransitionPlan, LifecycleError> {
        event.authorize(actor, campaign)?;

        let mut sm = Self::new(campaign, actor, policy, now).state_machine();
        sm.handle(&CampaignEvent::Restore);
        sm.handle(event);

        sm.inner()
            .outcome
            .clone()
            .unwrap_or_else(|| Err(Self::refusal(campaign.status, event)))
    }

    fn refusal(status: CampaignStatus, event: &CampaignEvent) -> LifecycleError {
        LifecycleError::InvalidTransition {
            status,
            action: event.action(),
        }
    }
}

#[state_machine(
    initial = "State::restoring()",
    state(derive(Debug, Clone, PartialEq, Eq))
)]
impl LifecycleMachine {
    #[state]
    fn restoring(&mut self, event: &CampaignEvent) -> Outcome<State> {
        match event {
            CampaignEvent::Restore => match self.campaign.status {
                CampaignStatus::Pending => Transition(State::pending()),
                CampaignStatus::Accepted => Transition(State::accepted()),
                CampaignStatus::Rejected => Transition(State::rejected()),
                CampaignStatus::InProgress => Transition(State::in_progress()),
                CampaignStatus::Completed => Transition(State::completed()),
                CampaignStatus::Disputed => Transition(State::disputed()),
                CampaignStatus::Cancelled => Transition(State::cancelled()),
            },
            other => self.refuse(other),
        }
    }

    #[state]
    fn pending(&mut self, event: &CampaignEvent) -> Outcome<State> {
        match event {
            CampaignEvent::Accept { owner_notes } => {
                let plan = self.accept(owner_notes.as_deref());
                self.advance(Ok(plan), State::accepted())
            }
            CampaignEvent::Reject { reason } => {
                let plan = self.reject(reason);
                self.advance(plan, State::rejected())
            }
            CampaignEvent::Cancel { reason } => {
                let plan = self.cancel(reason.as_deref());
                self.advance(Ok(plan), State::cancelled())
            }
            other => self.refuse(other),
        }
    }

    #[state]
    fn accepted(&mut self, event: &CampaignEvent) -> Outcome<State> {
        match event {
            CampaignEvent::SubmitPlacement {
                proof_url,
                proof_type,
                owner_notes,
            } => {
                let plan = self.submit_placement(proof_url, *proof_type, owner_notes.as_deref());
                self.advance(plan, State::in_progress())
            }
            other => self.refuse(other),
        }
    }

    #[state]
    fn in_progress(&mut self, event: &CampaignEvent) -> Outcome<State> {
        match event {
            CampaignEvent::Confirm { confirmed: true, .. } => {
                let plan = self.confirm();
                self.advance(plan, State::completed())
            }
            CampaignEvent::Confirm {
                confirmed: false,
                dispute_reason,
            } => {
                let plan = self.open_dispute(dispute_reason.as_deref());
                self.advance(plan, State::disputed())
            }
            other => self.refuse(other),
        }
    }

    #[state]
    fn disputed(&mut self, event: &CampaignEvent) -> Outcome<State> {
        match event {
            CampaignEvent::ResolveDispute {
                dispute,
                resolution,
            } => {
                let next = match resolution.decision.resulting_status() {
                    CampaignStatus::Cancelled => State::cancelled(),
                    _ => State::completed(),
                };
                let plan = dispute::settle(
                    &self.campaign,
                    dispute,
                    resolution,
                    &self.actor,
                    &self.policy,
                    self.now,
                );
                self.advance(plan, next)
            }
            other => self.refuse(other),
        }
    }

    #[state]
    fn completed(&mut self, event: &CampaignEvent) -> Outcome<State> {
        self.refuse(event)
    }

    #[state]
    fn rejected(&mut self, event: &CampaignEvent) -> Outcome<State> {
        self.refuse(event)
    }

    #[state]
    fn cancelled(&mut self, event: &CampaignEvent) -> Outcome<State> {
        self.refuse(event)
    }
}

impl LifecycleMachine {
    fn advance(
        &mut self,
        plan: Result<TransitionPlan, LifecycleError>,
        next: State,
    ) -> Outcome<State> {
        match plan {
            Ok(plan) => {
                tracing::debug!(
                    campaign.id = %self.campaign.id,
                    from = %plan.from_status(),
                    to = %plan.to_status(),
                    "Planned campaign transition"
                );
                self.outcome = Some(Ok(plan));
                Transition(next)
            }
            Err(e) => {
                self.outcome = Some(Err(e));
                Handled
            }
        }
    }

    fn refuse(&mut self, event: &CampaignEvent) -> Outcome<State> {
        self.outcome = Some(Err(Self::refusal(self.campaign.status, event)));
        Handled
    }

    fn next_record(&self, status: CampaignStatus) -> Campaign {
        let mut next = self.campaign.clone();
        next.status = status;
        next.updated_at = self.now;
        next
    }

    fn activity(&self, action: ActivityKind, description: impl Into<String>) -> ActivityRecord {
        ActivityRecord::new(
            self.campaign.id,
            self.actor.user_id,
            action,
            description,
            self.now,
        )
    }

    fn commit(
        &self,
        campaign: Campaign,
        ledger: Vec<LedgerEntry>,
        activity: ActivityRecord,
        dispute: Option<Dispute>,
    ) -> TransitionCommit {
        TransitionCommit {
            expected_status: self.campaign.status,
            campaign,
            ledger,
            activity,
            dispute,
        }
    }

    fn refund_all(&self) -> LedgerEntry {
        LedgerEntry::refund(
            self.campaign.id,
            self.campaign.seller_id,
            self.campaign.budget,
            self.now,
        )
    }

    fn accept(&self, owner_notes: Option<&str>) -> TransitionPlan {
        let mut next = self.next_record(CampaignStatus::Accepted);
        if let Some(notes) = non_empty(owner_notes) {
            next.owner_notes = Some(notes);
        }
        TransitionPlan {
            notifications: vec![Notification::campaign_accepted(&next, self.now)],
            commit: self.commit(
                next,
                Vec::new(),
                self.activity(ActivityKind::Accepted, "Campaign accepted by channel owner"),
                None,
            ),
        }
    }

    fn reject(&self, reason: &str) -> Result<TransitionPlan, LifecycleError> {
        let reason = validate_reason("reason", reason, self.policy.min_reason_length)?;
        let mut next = self.next_record(CampaignStatus::Rejected);
        next.owner_notes = Some(format!("Rejected: {reason}"));
        Ok(TransitionPlan {
            notifications: vec![Notification::campaign_rejected(&next, &reason, self.now)],
            commit: self.commit(
                next,
                vec![self.refund_all()],
                self.activity(ActivityKind::Rejected, format!("Campaign rejected: {reason}")),
                None,
            ),
        })
    }

    fn cancel(&self, reason: Option<&str>) -> TransitionPlan {
        let mut next = self.next_record(CampaignStatus::Cancelled);
        let reason = non_empty(reason);
        if let Some(reason) = &reason {
            next.seller_notes = Some(format!("Cancelled: {reason}"));
        }
        let description = match &reason {
            Some(reason) => format!("Campaign cancelled by seller: {reason}"),
            None => "Campaign cancelled by seller".to_string(),
        };
        TransitionPlan {
            notifications: vec![Notification::campaign_cancelled(&next, self.now)],
            commit: self.commit(
                next,
                vec![self.refund_all()],
                self.activity(ActivityKind::Cancelled, description),
                None,
            ),
        }
    }

    fn submit_placement(
        &self,
        proof_url: &str,
        proof_type: PlacementProofType,
        owner_notes: Option<&str>,
    ) -> Result<TransitionPlan, LifecycleError> {
        let proof_url = validate_proof_url(proof_url)?;
        let mut next = self.next_record(CampaignStatus::InProgress);
        next.placement_proof_url = Some(proof_url);
        next.placement_proof_type = Some(proof_type);
        next.owner_submitted_at.get_or_insert(self.now);
        if let Some(notes) = non_empty(owner_notes) {
            next.owner_notes = Some(notes);
        }
        Ok(TransitionPlan {
            notifications: vec![Notification::placement_submitted(&next, self.now)],
            commit: self.commit(
                next,
                Vec::new(),
                self.activity(
                    ActivityKind::Submitted,
                    format!("Placement submitted as {proof_type}"),
                ),
                None,
            ),
        })
    }

    fn confirm(&self) -> Result<TransitionPlan, LifecycleError> {
        self.require_proof()?;
        let payout = completion_payout(
            self.campaign.budget,
            self.campaign.platform_commission_percent,
        );
        let mut next = self.next_record(CampaignStatus::Completed);
        next.seller_confirmed_at.get_or_insert(self.now);
        next.actual_completion_date.get_or_insert(self.now);

        let mut ledger = vec![LedgerEntry::release(
            self.campaign.id,
            self.campaign.channel_id,
            payout.owner_amount,
            self.now,
        )];
        if !payout.commission.is_zero() {
            ledger.push(LedgerEntry::commission(self.campaign.id, payout.commission, self.now));
        }

        Ok(TransitionPlan {
            notifications: vec![Notification::campaign_completed(
                &next,
                payout.owner_amount,
                self.now,
            )],
            commit: self.commit(
                next,
                ledger,
                self.activity(
                    ActivityKind::Confirmed,
                    format!(
                        "Placement confirmed: {} to channel, {} commission",
                        payout.owner_amount, payout.commission
                    ),
                ),
                None,
            ),
        })
    }

    fn open_dispute(&self, reason: Option<&str>) -> Result<TransitionPlan, LifecycleError> {
        let reason = reason
            .ok_or_else(|| LifecycleError::validation("dispute_reason", "reason required to dispute"))?;
        let reason = validate_reason("dispute_reason", reason, self.policy.min_reason_length)?;
        self.require_proof()?;

        let next = self.next_record(CampaignStatus::Disputed);
        let dispute = Dispute::open(self.campaign.id, self.actor.user_id, reason.clone(), self.now);
        Ok(TransitionPlan {
            notifications: vec![Notification::dispute_opened(&next, &reason, self.now)],
            commit: self.commit(
                next,
                Vec::new(),
                self.activity(ActivityKind::Disputed, format!("Dispute opened: {reason}")),
                Some(dispute),
            ),
        })
    }

    fn require_proof(&self) -> Result<(), LifecycleError> {
        if self.campaign.has_placement_proof() {
            Ok(())
        } else {
            Err(LifecycleError::validation("placement_proof_url", "proof missing"))
        }
    }
}

fn non_empty(text: Option<&str>) -> Option<String> {
    text.map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
}
