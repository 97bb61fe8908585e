use anyhow::Result;
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;

use super::{print_json, Command, CommandContext};
use crate::campaign::dispute::DisputeResolution;
use crate::campaign::types::{
    CampaignId, ChannelId, Creative, DisputeDecision, NewCampaign, PlacementProofType,
};

#[derive(Args, Debug)]
pub struct CreateArgs {
    #[arg(long, help = "Channel the ad is booked on")]
    pub channel: ChannelId,
    #[arg(long, help = "Budget held in escrow, e.g. 10000.00")]
    pub budget: Decimal,
    #[arg(long, help = "First day of the placement (YYYY-MM-DD)")]
    pub start: NaiveDate,
    #[arg(long, help = "Last day of the placement (YYYY-MM-DD)")]
    pub end: NaiveDate,
    #[arg(long)]
    pub format: Option<String>,
    #[arg(long, help = "Ad text")]
    pub text: Option<String>,
    #[arg(long = "image", help = "Creative image URL, repeatable")]
    pub images: Vec<String>,
    #[arg(long)]
    pub video_url: Option<String>,
    #[arg(long, help = "Link the ad points to")]
    pub ad_url: Option<String>,
    #[arg(long)]
    pub notes: Option<String>,
}

impl Command for CreateArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let request = NewCampaign {
            channel_id: self.channel,
            budget: self.budget,
            start_date: self.start,
            end_date: self.end,
            creative: Creative {
                ad_format: self.format.clone(),
                creative_text: self.text.clone(),
                creative_images: self.images.clone(),
                creative_video_url: self.video_url.clone(),
                ad_url: self.ad_url.clone(),
            },
            seller_notes: self.notes.clone(),
        };
        let campaign = ctx.manager.create_campaign(&ctx.actor, request).await?;
        eprintln!("✅ Campaign {} created, {} held in escrow", campaign.id, campaign.budget);
        print_json(&campaign)
    }
}

#[derive(Args, Debug)]
pub struct AcceptArgs {
    pub campaign: CampaignId,
    #[arg(long)]
    pub notes: Option<String>,
}

impl Command for AcceptArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx
            .manager
            .accept_campaign(&ctx.actor, self.campaign, self.notes.clone())
            .await?;
        eprintln!("✅ Campaign {} accepted", campaign.id);
        print_json(&campaign)
    }
}

#[derive(Args, Debug)]
pub struct RejectArgs {
    pub campaign: CampaignId,
    #[arg(long, help = "Why the campaign is declined")]
    pub reason: String,
}

impl Command for RejectArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx
            .manager
            .reject_campaign(&ctx.actor, self.campaign, self.reason.clone())
            .await?;
        eprintln!("↩️  Campaign {} rejected, budget refunded", campaign.id);
        print_json(&campaign)
    }
}

#[derive(Args, Debug)]
pub struct CancelArgs {
    pub campaign: CampaignId,
    #[arg(long)]
    pub reason: Option<String>,
}

impl Command for CancelArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx
            .manager
            .cancel_campaign(&ctx.actor, self.campaign, self.reason.clone())
            .await?;
        eprintln!("↩️  Campaign {} cancelled, budget refunded", campaign.id);
        print_json(&campaign)
    }
}

#[derive(Args, Debug)]
pub struct SubmitArgs {
    pub campaign: CampaignId,
    #[arg(long, help = "Link to the published post or screenshot")]
    pub proof_url: String,
    #[arg(long, default_value = "post_link", help = "screenshot, post_link or other")]
    pub proof_type: PlacementProofType,
    #[arg(long)]
    pub notes: Option<String>,
}

impl Command for SubmitArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx
            .manager
            .submit_placement(
                &ctx.actor,
                self.campaign,
                self.proof_url.clone(),
                self.proof_type,
                self.notes.clone(),
            )
            .await?;
        eprintln!("📤 Placement proof submitted for campaign {}", campaign.id);
        print_json(&campaign)
    }
}

#[derive(Args, Debug)]
pub struct ConfirmArgs {
    pub campaign: CampaignId,
    #[arg(long, help = "Dispute the placement instead of confirming it")]
    pub dispute: bool,
    #[arg(long, help = "Dispute reason, required with --dispute")]
    pub reason: Option<String>,
}

impl Command for ConfirmArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx
            .manager
            .confirm_campaign(&ctx.actor, self.campaign, !self.dispute, self.reason.clone())
            .await?;
        if self.dispute {
            eprintln!("⚠️  Campaign {} disputed, awaiting admin review", campaign.id);
        } else {
            eprintln!("✅ Campaign {} completed, payment released", campaign.id);
        }
        print_json(&campaign)
    }
}

#[derive(Args, Debug)]
pub struct ResolveArgs {
    pub campaign: CampaignId,
    #[arg(long, help = "refund, release_payment or partial_refund")]
    pub decision: DisputeDecision,
    #[arg(long, help = "Amount returned to the seller, required for partial_refund")]
    pub refund_amount: Option<Decimal>,
    #[arg(long, help = "Explanation recorded on the dispute")]
    pub notes: String,
}

impl ResolveArgs {
    fn resolution(&self) -> DisputeResolution {
        DisputeResolution {
            decision: self.decision,
            refund_amount: self.refund_amount,
            admin_notes: self.notes.clone(),
        }
    }
}

impl Command for ResolveArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let campaign = ctx
            .manager
            .resolve_dispute(&ctx.actor, self.campaign, self.resolution())
            .await?;
        eprintln!("⚖️  Dispute on campaign {} resolved: {}", campaign.id, self.decision);
        print_json(&campaign)
    }
}
