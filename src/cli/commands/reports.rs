use anyhow::Result;
use clap::Args;

use super::{print_json, Command, CommandContext};
use crate::campaign::types::{CampaignId, CampaignStatus, DisputeStatus};

#[derive(Args, Debug)]
pub struct ShowArgs {
    pub campaign: CampaignId,
}

impl Command for ShowArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx.manager.get_campaign(&ctx.actor, self.campaign).await?;
        let dispute = ctx.manager.campaign_dispute(&ctx.actor, self.campaign).await?;
        print_json(&serde_json::json!({ "campaign": campaign, "dispute": dispute }))
    }
}

#[derive(Args, Debug)]
pub struct ListArgs {
    #[arg(long, help = "Only campaigns in this status")]
    pub status: Option<CampaignStatus>,
}

impl Command for ListArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaigns = ctx.manager.list_campaigns(&ctx.actor, self.status).await?;
        eprintln!("📋 {} campaign(s)", campaigns.len());
        print_json(&campaigns)
    }
}

#[derive(Args, Debug)]
pub struct StatsArgs {}

impl Command for StatsArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let stats = ctx.manager.campaign_stats(&ctx.actor).await?;
        print_json(&stats)
    }
}

#[derive(Args, Debug)]
pub struct DisputesArgs {
    #[arg(long, help = "open or resolved")]
    pub status: Option<DisputeStatus>,
}

impl Command for DisputesArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let disputes = ctx.manager.list_disputes(&ctx.actor, self.status).await?;
        print_json(&disputes)
    }
}

#[derive(Args, Debug)]
pub struct HistoryArgs {
    pub campaign: CampaignId,
}

impl Command for HistoryArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let activity = ctx.manager.campaign_activity(&ctx.actor, self.campaign).await?;
        print_json(&activity)
    }
}
