use anyhow::{anyhow, Result};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{print_json, Command, CommandContext};
use crate::campaign::types::{CampaignId, Role};
use crate::escrow::{Account, EscrowSummary, LedgerEntry};

#[derive(Args, Debug)]
pub struct DepositArgs {
    pub amount: Decimal,
}

impl Command for DepositArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let balance = ctx.manager.deposit(&ctx.actor, self.amount).await?;
        eprintln!("💰 Deposited {}, balance is now {}", self.amount, balance);
        print_json(&serde_json::json!({ "deposited": self.amount, "balance": balance }))
    }
}

#[derive(Args, Debug)]
pub struct LedgerArgs {
    pub campaign: CampaignId,
}

#[derive(Serialize)]
struct CampaignLedger {
    summary: EscrowSummary,
    entries: Vec<LedgerEntry>,
}

impl Command for LedgerArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let entries = ctx.manager.campaign_ledger(&ctx.actor, self.campaign).await?;
        let summary = EscrowSummary::from_entries(&entries);
        print_json(&CampaignLedger { summary, entries })
    }
}

#[derive(Args, Debug)]
pub struct BalanceArgs {}

#[derive(Serialize)]
struct AccountBalance {
    account: Account,
    balance: Decimal,
}

impl Command for BalanceArgs {
    async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let accounts = match ctx.actor.role {
            Role::Seller => {
                let seller_id = ctx
                    .actor
                    .seller_id
                    .ok_or_else(|| anyhow!("seller profile missing"))?;
                vec![Account::Seller(seller_id)]
            }
            Role::ChannelOwner => ctx.actor.channel_ids.iter().copied().map(Account::Channel).collect(),
            Role::Admin => vec![Account::Platform],
        };

        let mut balances = Vec::with_capacity(accounts.len());
        for account in accounts {
            let balance = ctx.manager.balance(&ctx.actor, &account).await?;
            balances.push(AccountBalance { account, balance });
        }
        print_json(&balances)
    }
}
