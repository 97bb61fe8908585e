use anyhow::{anyhow, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::campaign::types::{Actor, ChannelId, Role, SellerId, UserId};
use crate::config::MarketplaceConfig;

pub mod commands;

use commands::campaign::{
    AcceptArgs, CancelArgs, ConfirmArgs, CreateArgs, RejectArgs, ResolveArgs, SubmitArgs,
};
use commands::funds::{BalanceArgs, DepositArgs, LedgerArgs};
use commands::reports::{DisputesArgs, HistoryArgs, ListArgs, ShowArgs, StatsArgs};
use commands::{with_marketplace, Command, ConfigArgs};

#[derive(Parser)]
#[command(name = "ad-marketplace")]
#[command(about = "Campaign lifecycle for an advertising marketplace")]
#[command(long_about = "Sellers book ad placements on channels with escrowed budgets. \
                       Channel owners accept and publish, sellers confirm or dispute, and \
                       admins resolve disputes. Every command acts as the caller described \
                       by --role, --user, --seller and --owns.")]
pub struct Cli {
    /// Configuration file (defaults to ad-marketplace.toml when present)
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub actor: ActorArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Identity of the caller, resolved by whatever authenticates the request
#[derive(Args, Debug, Clone)]
pub struct ActorArgs {
    #[arg(long, global = true, default_value = "seller", help = "Caller role: seller, channel_owner or admin")]
    pub role: Role,
    #[arg(long, global = true, help = "Caller user id (random when omitted)")]
    pub user: Option<UserId>,
    #[arg(long, global = true, help = "Seller profile id, required for the seller role")]
    pub seller: Option<SellerId>,
    #[arg(long = "owns", global = true, help = "Channel owned by the caller, repeatable")]
    pub channels: Vec<ChannelId>,
}

impl ActorArgs {
    pub fn actor(&self) -> Result<Actor> {
        let user_id = self.user.unwrap_or_default();
        match self.role {
            Role::Seller => {
                let seller_id = self
                    .seller
                    .ok_or_else(|| anyhow!("--seller is required for the seller role"))?;
                Ok(Actor::seller(user_id, seller_id))
            }
            Role::ChannelOwner => Ok(Actor::channel_owner(user_id, self.channels.clone())),
            Role::Admin => Ok(Actor::admin(user_id)),
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Book a placement on a channel and hold its budget in escrow
    Create(CreateArgs),
    /// Accept a pending campaign on your channel
    Accept(AcceptArgs),
    /// Decline a pending campaign and refund the seller
    Reject(RejectArgs),
    /// Withdraw a pending campaign and refund the seller
    Cancel(CancelArgs),
    /// Record proof that the ad was published
    Submit(SubmitArgs),
    /// Confirm the placement, or dispute it with --dispute
    Confirm(ConfirmArgs),
    /// Settle an open dispute (admin)
    Resolve(ResolveArgs),
    /// Top up the seller balance
    Deposit(DepositArgs),
    /// Show one campaign
    Show(ShowArgs),
    /// List campaigns visible to the caller
    List(ListArgs),
    /// Show the escrow ledger of a campaign
    Ledger(LedgerArgs),
    /// Show balances of the accounts the caller owns
    Balance(BalanceArgs),
    /// Campaign counters for the caller
    Stats(StatsArgs),
    /// List disputes (admin)
    Disputes(DisputesArgs),
    /// Show the activity log of a campaign
    History(HistoryArgs),
    /// Print the effective configuration
    Config(ConfigArgs),
}

impl Commands {
    /// Whether the command can change stored state
    pub fn mutates(&self) -> bool {
        matches!(
            self,
            Commands::Create(_)
                | Commands::Accept(_)
                | Commands::Reject(_)
                | Commands::Cancel(_)
                | Commands::Submit(_)
                | Commands::Confirm(_)
                | Commands::Resolve(_)
                | Commands::Deposit(_)
        )
    }
}

impl Cli {
    pub async fn run(self, config: MarketplaceConfig) -> Result<()> {
        if let Commands::Config(args) = &self.command {
            return args.execute(&config);
        }

        let actor = self.actor.actor()?;
        let persist = self.command.mutates();
        with_marketplace(&config, actor, persist, |ctx| async move {
            match &self.command {
                Commands::Create(args) => args.execute(&ctx).await,
                Commands::Accept(args) => args.execute(&ctx).await,
                Commands::Reject(args) => args.execute(&ctx).await,
                Commands::Cancel(args) => args.execute(&ctx).await,
                Commands::Submit(args) => args.execute(&ctx).await,
                Commands::Confirm(args) => args.execute(&ctx).await,
                Commands::Resolve(args) => args.execute(&ctx).await,
                Commands::Deposit(args) => args.execute(&ctx).await,
                Commands::Show(args) => args.execute(&ctx).await,
                Commands::List(args) => args.execute(&ctx).await,
                Commands::Ledger(args) => args.execute(&ctx).await,
                Commands::Balance(args) => args.execute(&ctx).await,
                Commands::Stats(args) => args.execute(&ctx).await,
                Commands::Disputes(args) => args.execute(&ctx).await,
                Commands::History(args) => args.execute(&ctx).await,
                // Needs no store, handled above
                Commands::Config(_) => Ok(()),
            }
        })
        .await
    }
}
