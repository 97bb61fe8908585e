// Campaign lifecycle orchestration
//
// Every mutating operation follows the same path: load the campaign, hide it
// from callers who may not see it, plan the transition on the lifecycle
// machine, commit the plan with a status compare-and-swap, then announce it.

use chrono::Utc;
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use tracing::{info, warn, Instrument};

use super::dispute::DisputeResolution;
use super::errors::LifecycleError;
use super::state_machine::{CampaignEvent, LifecycleMachine, LifecyclePolicy, TransitionPlan};
use super::types::{
    ActivityKind, ActivityRecord, Actor, Campaign, CampaignId, CampaignStats, CampaignStatus,
    Dispute, DisputeStatus, NewCampaign, PlacementProofType, Role,
};
use super::validation::{validate_cents, validate_new_campaign};
use crate::escrow::{Account, EscrowSummary, LedgerEntry};
use crate::notifications::{Notification, Notifier};
use crate::observability::{lifecycle_metrics, OperationTimer};
use crate::store::{CampaignFilter, CampaignStore};
use crate::telemetry::{create_lifecycle_span, generate_correlation_id};

pub struct CampaignLifecycleManager {
    store: Arc<dyn CampaignStore>,
    notifier: Arc<dyn Notifier>,
    policy: LifecyclePolicy,
}

impl CampaignLifecycleManager {
    pub fn new(
        store: Arc<dyn CampaignStore>,
        notifier: Arc<dyn Notifier>,
        policy: LifecyclePolicy,
    ) -> Self {
        Self {
            store,
            notifier,
            policy,
        }
    }

    pub fn policy(&self) -> &LifecyclePolicy {
        &self.policy
    }

    /// Create a pending campaign and hold its budget from the seller balance
    pub async fn create_campaign(
        &self,
        actor: &Actor,
        request: NewCampaign,
    ) -> Result<Campaign, LifecycleError> {
        self.observe("create_campaign", None, actor, async {
            let seller_id = match (actor.role, actor.seller_id) {
                (Role::Seller, Some(seller_id)) => seller_id,
                _ => {
                    return Err(LifecycleError::Unauthorized {
                        role: actor.role,
                        action: "create",
                    })
                }
            };
            validate_new_campaign(&request)?;

            let now = Utc::now();
            let campaign = Campaign::from_request(
                seller_id,
                request,
                self.policy.platform_commission_percent,
                now,
            );
            let hold = LedgerEntry::hold(campaign.id, seller_id, campaign.budget, now);
            let activity = ActivityRecord::new(
                campaign.id,
                actor.user_id,
                ActivityKind::Created,
                format!("Campaign created with budget {}", campaign.budget),
                now,
            );
            self.store.create_campaign(&campaign, &hold, &activity).await?;
            lifecycle_metrics().record_created();
            info!(
                campaign.id = %campaign.id,
                budget = %campaign.budget,
                "Campaign created, budget held in escrow"
            );

            self.announce(&[Notification::campaign_created(&campaign, now)])
                .await;
            Ok(campaign)
        })
        .await
    }

    pub async fn accept_campaign(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
        owner_notes: Option<String>,
    ) -> Result<Campaign, LifecycleError> {
        self.apply(
            "accept_campaign",
            actor,
            campaign_id,
            CampaignEvent::Accept { owner_notes },
        )
        .await
    }

    pub async fn reject_campaign(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
        reason: String,
    ) -> Result<Campaign, LifecycleError> {
        self.apply(
            "reject_campaign",
            actor,
            campaign_id,
            CampaignEvent::Reject { reason },
        )
        .await
    }

    pub async fn cancel_campaign(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
        reason: Option<String>,
    ) -> Result<Campaign, LifecycleError> {
        self.apply(
            "cancel_campaign",
            actor,
            campaign_id,
            CampaignEvent::Cancel { reason },
        )
        .await
    }

    pub async fn submit_placement(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
        proof_url: String,
        proof_type: PlacementProofType,
        owner_notes: Option<String>,
    ) -> Result<Campaign, LifecycleError> {
        self.apply(
            "submit_placement",
            actor,
            campaign_id,
            CampaignEvent::SubmitPlacement {
                proof_url,
                proof_type,
                owner_notes,
            },
        )
        .await
    }

    /// Confirm the placement, or dispute it when `confirmed` is false
    pub async fn confirm_campaign(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
        confirmed: bool,
        dispute_reason: Option<String>,
    ) -> Result<Campaign, LifecycleError> {
        self.apply(
            "confirm_campaign",
            actor,
            campaign_id,
            CampaignEvent::Confirm {
                confirmed,
                dispute_reason,
            },
        )
        .await
    }

    pub async fn resolve_dispute(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
        resolution: DisputeResolution,
    ) -> Result<Campaign, LifecycleError> {
        self.observe("resolve_dispute", Some(campaign_id), actor, async {
            let campaign = self.load_visible(actor, campaign_id).await?;
            let event = match self.store.campaign_dispute(campaign_id).await? {
                Some(dispute) => CampaignEvent::ResolveDispute {
                    dispute,
                    resolution,
                },
                None if campaign.status != CampaignStatus::Disputed => {
                    // Report the status problem rather than the missing record
                    return Err(self.early_refusal(actor, &campaign, "resolve a dispute on"));
                }
                None => {
                    return Err(LifecycleError::NotFound {
                        entity: "open dispute",
                        id: campaign_id.to_string(),
                    })
                }
            };
            self.transition(actor, campaign, event).await
        })
        .await
    }

    /// Add funds to the calling seller's balance; returns the new balance
    pub async fn deposit(&self, actor: &Actor, amount: Decimal) -> Result<Decimal, LifecycleError> {
        self.observe("deposit", None, actor, async {
            let seller_id = match (actor.role, actor.seller_id) {
                (Role::Seller, Some(seller_id)) => seller_id,
                _ => {
                    return Err(LifecycleError::Unauthorized {
                        role: actor.role,
                        action: "deposit",
                    })
                }
            };
            if amount < self.policy.min_deposit || amount > self.policy.max_deposit {
                return Err(LifecycleError::validation(
                    "amount",
                    format!(
                        "deposit must be between {} and {}",
                        self.policy.min_deposit, self.policy.max_deposit
                    ),
                ));
            }
            validate_cents("amount", amount)?;

            self.store
                .record_deposit(&LedgerEntry::deposit(seller_id, amount, Utc::now()))
                .await?;
            lifecycle_metrics().record_deposit();
            let balance = self.store.balance(&Account::Seller(seller_id)).await?;
            info!(seller.id = %seller_id, amount = %amount, balance = %balance, "Deposit recorded");
            Ok(balance)
        })
        .await
    }

    pub async fn get_campaign(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
    ) -> Result<Campaign, LifecycleError> {
        self.load_visible(actor, campaign_id).await
    }

    /// Campaigns visible to the caller, newest first
    pub async fn list_campaigns(
        &self,
        actor: &Actor,
        status: Option<CampaignStatus>,
    ) -> Result<Vec<Campaign>, LifecycleError> {
        let mut filter = CampaignFilter {
            status,
            ..CampaignFilter::default()
        };
        match actor.role {
            Role::Seller => match actor.seller_id {
                Some(seller_id) => filter.seller_id = Some(seller_id),
                None => return Ok(Vec::new()),
            },
            Role::ChannelOwner => filter.channel_ids = Some(actor.channel_ids.clone()),
            Role::Admin => {}
        }
        Ok(self.store.list_campaigns(&filter).await?)
    }

    pub async fn campaign_stats(&self, actor: &Actor) -> Result<CampaignStats, LifecycleError> {
        let campaigns = self.list_campaigns(actor, None).await?;
        let count = |status: CampaignStatus| campaigns.iter().filter(|c| c.status == status).count();

        let total_amount = match actor.role {
            Role::Seller => {
                let mut spent = Decimal::ZERO;
                for campaign in &campaigns {
                    let entries = self.store.campaign_ledger(campaign.id).await?;
                    spent += EscrowSummary::from_entries(&entries).spent();
                }
                spent
            }
            Role::ChannelOwner => {
                let mut earned = Decimal::ZERO;
                for channel_id in &actor.channel_ids {
                    earned += self.store.balance(&Account::Channel(*channel_id)).await?;
                }
                earned
            }
            Role::Admin => self.store.balance(&Account::Platform).await?,
        };

        Ok(CampaignStats {
            total_campaigns: campaigns.len(),
            active_campaigns: campaigns.iter().filter(|c| c.status.is_active()).count(),
            completed_campaigns: count(CampaignStatus::Completed),
            pending_campaigns: count(CampaignStatus::Pending),
            disputed_campaigns: count(CampaignStatus::Disputed),
            total_amount,
        })
    }

    pub async fn campaign_ledger(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
    ) -> Result<Vec<LedgerEntry>, LifecycleError> {
        self.load_visible(actor, campaign_id).await?;
        Ok(self.store.campaign_ledger(campaign_id).await?)
    }

    pub async fn escrow_summary(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
    ) -> Result<EscrowSummary, LifecycleError> {
        let entries = self.campaign_ledger(actor, campaign_id).await?;
        Ok(EscrowSummary::from_entries(&entries))
    }

    pub async fn campaign_activity(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
    ) -> Result<Vec<ActivityRecord>, LifecycleError> {
        self.load_visible(actor, campaign_id).await?;
        Ok(self.store.campaign_activity(campaign_id).await?)
    }

    pub async fn campaign_dispute(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
    ) -> Result<Option<Dispute>, LifecycleError> {
        self.load_visible(actor, campaign_id).await?;
        Ok(self.store.campaign_dispute(campaign_id).await?)
    }

    /// Dispute queue; admins only
    pub async fn list_disputes(
        &self,
        actor: &Actor,
        status: Option<DisputeStatus>,
    ) -> Result<Vec<Dispute>, LifecycleError> {
        if actor.role != Role::Admin {
            return Err(LifecycleError::Unauthorized {
                role: actor.role,
                action: "list disputes",
            });
        }
        Ok(self.store.list_disputes(status).await?)
    }

    /// Balance of an account the caller owns; admins may read any account
    pub async fn balance(&self, actor: &Actor, account: &Account) -> Result<Decimal, LifecycleError> {
        let allowed = match (actor.role, account) {
            (Role::Admin, _) => true,
            (Role::Seller, Account::Seller(id)) => actor.seller_id == Some(*id),
            (Role::ChannelOwner, Account::Channel(id)) => actor.channel_ids.contains(id),
            _ => false,
        };
        if !allowed {
            return Err(LifecycleError::Unauthorized {
                role: actor.role,
                action: "read the balance of",
            });
        }
        Ok(self.store.balance(account).await?)
    }

    async fn apply(
        &self,
        operation: &'static str,
        actor: &Actor,
        campaign_id: CampaignId,
        event: CampaignEvent,
    ) -> Result<Campaign, LifecycleError> {
        self.observe(operation, Some(campaign_id), actor, async {
            let campaign = self.load_visible(actor, campaign_id).await?;
            self.transition(actor, campaign, event).await
        })
        .await
    }

    async fn transition(
        &self,
        actor: &Actor,
        campaign: Campaign,
        event: CampaignEvent,
    ) -> Result<Campaign, LifecycleError> {
        let plan: TransitionPlan =
            LifecycleMachine::plan(&campaign, actor, &event, &self.policy, Utc::now())?;
        let committed = self.store.commit_transition(&plan.commit).await?;

        lifecycle_metrics().record_transition();
        info!(
            campaign.id = %committed.id,
            from = %plan.from_status(),
            to = %plan.to_status(),
            ledger_entries = plan.commit.ledger.len(),
            "Campaign transition committed"
        );

        self.announce(&plan.notifications).await;
        Ok(committed)
    }

    /// Callers who may not see a campaign are told it does not exist
    async fn load_visible(
        &self,
        actor: &Actor,
        campaign_id: CampaignId,
    ) -> Result<Campaign, LifecycleError> {
        match self.store.get_campaign(campaign_id).await? {
            Some(campaign) if actor.can_view(&campaign) => Ok(campaign),
            _ => Err(LifecycleError::campaign_not_found(campaign_id)),
        }
    }

    fn early_refusal(&self, actor: &Actor, campaign: &Campaign, action: &'static str) -> LifecycleError {
        if actor.role != Role::Admin {
            LifecycleError::Unauthorized {
                role: actor.role,
                action,
            }
        } else {
            LifecycleError::InvalidTransition {
                status: campaign.status,
                action,
            }
        }
    }

    /// Delivery happens after commit; failures are logged and never undo it
    async fn announce(&self, notifications: &[Notification]) {
        for notification in notifications {
            match self.notifier.dispatch(notification).await {
                Ok(()) => lifecycle_metrics().record_notification(true),
                Err(e) => {
                    lifecycle_metrics().record_notification(false);
                    warn!(
                        campaign.id = %notification.campaign_id,
                        kind = ?notification.kind,
                        error = %e,
                        "Failed to deliver notification"
                    );
                }
            }
        }
    }

    async fn observe<T, F>(
        &self,
        operation: &'static str,
        campaign_id: Option<CampaignId>,
        actor: &Actor,
        work: F,
    ) -> Result<T, LifecycleError>
    where
        F: Future<Output = Result<T, LifecycleError>>,
    {
        let correlation_id = generate_correlation_id();
        let span = create_lifecycle_span(operation, campaign_id, actor.role, &correlation_id);
        async move {
            let timer = OperationTimer::new(operation);
            let result = work.await;
            if let Err(e) = &result {
                lifecycle_metrics().record_error(e);
                warn!(error.kind = e.kind(), error = %e, "Lifecycle operation refused");
            }
            timer.finish();
            result
        }
        .instrument(span)
        .await
    }
}
