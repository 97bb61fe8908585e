// Campaign Lifecycle Module
//
// Statuses, actors and the transition rules between them, the lifecycle
// machine that plans each transition, and the manager that commits plans
// against a store and announces them.

pub mod dispute;
pub mod errors;
pub mod manager;
pub mod state_machine;
pub mod types;
pub mod validation;

#[cfg(test)]
pub mod mocks;


pub use dispute::DisputeResolution;
pub use errors::LifecycleError;
pub use manager::CampaignLifecycleManager;
pub use state_machine::{CampaignEvent, LifecycleMachine, LifecyclePolicy, TransitionPlan};
pub use types::{
    ActivityKind, ActivityRecord, Actor, Campaign, CampaignId, CampaignStats, CampaignStatus,
    ChannelId, Creative, Dispute, DisputeDecision, DisputeId, DisputeStatus, NewCampaign,
    PlacementProofType, Role, SellerId, UserId,
};
