#[cfg(feature = "database")]
use async_trait::async_trait;
#[cfg(feature = "database")]
use chrono::{DateTime, SecondsFormat, Utc};
#[cfg(feature = "database")]
use rust_decimal::Decimal;
#[cfg(feature = "database")]
use sqlx::{migrate::MigrateDatabase, sqlite::SqlitePoolOptions, QueryBuilder, Row, Sqlite, SqlitePool};
#[cfg(feature = "database")]
use tracing::info;

#[cfg(feature = "database")]
use crate::campaign::types::{ActivityRecord, Campaign, CampaignId, CampaignStatus, Dispute, DisputeStatus};
#[cfg(feature = "database")]
use crate::config::DatabaseConfig;
#[cfg(feature = "database")]
use crate::escrow::{balance_of, check_settlement, Account, EntryKind, LedgerEntry};
#[cfg(feature = "database")]
use crate::store::{
    check_edge, check_immutable, check_set_once, CampaignFilter, CampaignStore, StoreError,
    TransitionCommit,
};

#[cfg(feature = "database")]
/// SQLite-backed campaign store.
///
/// Records are stored as JSON documents next to the columns used for lookups
/// and for the status compare-and-swap.
pub struct SqliteCampaignStore {
    pool: SqlitePool,
}

#[cfg(feature = "database")]
impl SqliteCampaignStore {
    /// Connect, creating the database file and running migrations as configured
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        if !Sqlite::database_exists(&config.url).await? {
            info!("Creating database at {}", config.url);
            Sqlite::create_database(&config.url).await?;
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections.max(1))
            .connect(&config.url)
            .await?;

        if config.auto_migrate {
            info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Database migrations completed");
        }

        Ok(Self { pool })
    }

    /// Private in-memory database; a single connection keeps one shared schema
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// Close database connections gracefully
    pub async fn shutdown(&self) {
        info!("Shutting down database connections...");
        self.pool.close().await;
        info!("Database connections closed");
    }

    async fn entries_where(
        &self,
        column: &str,
        value: String,
    ) -> Result<Vec<LedgerEntry>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT data FROM ledger_entries WHERE {column} = ?1 ORDER BY seq ASC"
        ))
        .bind(value)
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }
}

#[cfg(feature = "database")]
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[cfg(feature = "database")]
fn decode_all<T: serde::de::DeserializeOwned>(
    rows: Vec<sqlx::sqlite::SqliteRow>,
) -> Result<Vec<T>, StoreError> {
    rows.iter()
        .map(|row| Ok(serde_json::from_str(row.get::<&str, _>("data"))?))
        .collect()
}

#[cfg(feature = "database")]
async fn insert_entry(
    conn: &mut sqlx::SqliteConnection,
    entry: &LedgerEntry,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO ledger_entries (id, campaign_id, account_key, kind, data, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(entry.id.to_string())
    .bind(entry.campaign_id.map(|id| id.to_string()))
    .bind(entry.account.key())
    .bind(entry.kind.as_str())
    .bind(serde_json::to_string(entry)?)
    .bind(timestamp(entry.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(feature = "database")]
async fn insert_activity(
    conn: &mut sqlx::SqliteConnection,
    activity: &ActivityRecord,
) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        INSERT INTO campaign_activities (campaign_id, data, created_at)
        VALUES (?1, ?2, ?3)
        "#,
    )
    .bind(activity.campaign_id.to_string())
    .bind(serde_json::to_string(activity)?)
    .bind(timestamp(activity.created_at))
    .execute(conn)
    .await?;
    Ok(())
}

#[cfg(feature = "database")]
#[async_trait]
impl CampaignStore for SqliteCampaignStore {
    async fn create_campaign(
        &self,
        campaign: &Campaign,
        hold: &LedgerEntry,
        activity: &ActivityRecord,
    ) -> Result<(), StoreError> {
        let mut tx = self.pool.begin().await?;

        // Write first so the transaction holds the write lock before reading balances
        sqlx::query(
            r#"
            INSERT INTO campaigns (id, seller_id, channel_id, status, budget, data, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(campaign.id.to_string())
        .bind(campaign.seller_id.to_string())
        .bind(campaign.channel_id.to_string())
        .bind(campaign.status.as_str())
        .bind(campaign.budget.to_string())
        .bind(serde_json::to_string(campaign)?)
        .bind(timestamp(campaign.created_at))
        .bind(timestamp(campaign.updated_at))
        .execute(&mut *tx)
        .await?;

        let rows = sqlx::query("SELECT data FROM ledger_entries WHERE account_key = ?1")
            .bind(hold.account.key())
            .fetch_all(&mut *tx)
            .await?;
        let entries: Vec<LedgerEntry> = decode_all(rows)?;
        let available = balance_of(&hold.account, &entries);
        if available < hold.amount {
            return Err(StoreError::InsufficientFunds {
                account: hold.account,
                available,
                required: hold.amount,
            });
        }

        insert_entry(&mut tx, hold).await?;
        insert_activity(&mut tx, activity).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get_campaign(&self, id: CampaignId) -> Result<Option<Campaign>, StoreError> {
        let row = sqlx::query("SELECT data FROM campaigns WHERE id = ?1")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(row.get::<&str, _>("data"))?)),
            None => Ok(None),
        }
    }

    async fn list_campaigns(&self, filter: &CampaignFilter) -> Result<Vec<Campaign>, StoreError> {
        let mut query: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT data FROM campaigns WHERE 1 = 1");
        if let Some(seller_id) = filter.seller_id {
            query.push(" AND seller_id = ").push_bind(seller_id.to_string());
        }
        if let Some(channel_ids) = &filter.channel_ids {
            if channel_ids.is_empty() {
                return Ok(Vec::new());
            }
            query.push(" AND channel_id IN (");
            let mut separated = query.separated(", ");
            for channel_id in channel_ids {
                separated.push_bind(channel_id.to_string());
            }
            separated.push_unseparated(")");
        }
        if let Some(status) = filter.status {
            query.push(" AND status = ").push_bind(status.as_str());
        }
        query.push(" ORDER BY created_at DESC, id DESC");

        let rows = query.build().fetch_all(&self.pool).await?;
        decode_all(rows)
    }

    async fn commit_transition(&self, commit: &TransitionCommit) -> Result<Campaign, StoreError> {
        let campaign = &commit.campaign;
        check_edge(commit)?;
        let mut tx = self.pool.begin().await?;

        let stored: Option<String> = sqlx::query_scalar("SELECT data FROM campaigns WHERE id = ?1")
            .bind(campaign.id.to_string())
            .fetch_optional(&mut *tx)
            .await?;
        let current: Campaign = match stored {
            Some(data) => serde_json::from_str(&data)?,
            None => {
                return Err(StoreError::NotFound {
                    entity: "campaign",
                    id: campaign.id.to_string(),
                })
            }
        };
        if current.status != commit.expected_status {
            return Err(StoreError::StatusMismatch {
                campaign_id: campaign.id,
                expected: commit.expected_status,
                actual: current.status,
            });
        }
        check_immutable(&current, campaign)?;
        check_set_once(&current, campaign)?;

        // Every edge changes status, so a matching status means nobody
        // committed since the read above
        let updated = sqlx::query(
            r#"
            UPDATE campaigns
            SET status = ?1, data = ?2, updated_at = ?3
            WHERE id = ?4 AND status = ?5
            "#,
        )
        .bind(campaign.status.as_str())
        .bind(serde_json::to_string(campaign)?)
        .bind(timestamp(campaign.updated_at))
        .bind(campaign.id.to_string())
        .bind(commit.expected_status.as_str())
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            let status: String = sqlx::query_scalar("SELECT status FROM campaigns WHERE id = ?1")
                .bind(campaign.id.to_string())
                .fetch_one(&mut *tx)
                .await?;
            return Err(StoreError::StatusMismatch {
                campaign_id: campaign.id,
                expected: commit.expected_status,
                actual: parse_status(&status)?,
            });
        }

        let rows = sqlx::query("SELECT data FROM ledger_entries WHERE campaign_id = ?1")
            .bind(campaign.id.to_string())
            .fetch_all(&mut *tx)
            .await?;
        let existing: Vec<LedgerEntry> = decode_all(rows)?;
        check_settlement(campaign.id, &existing, &commit.ledger)?;

        for entry in &commit.ledger {
            insert_entry(&mut tx, entry).await?;
        }
        insert_activity(&mut tx, &commit.activity).await?;
        if let Some(dispute) = &commit.dispute {
            sqlx::query(
                r#"
                INSERT INTO campaign_disputes (id, campaign_id, status, data, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5)
                ON CONFLICT(id) DO UPDATE SET status = excluded.status, data = excluded.data
                "#,
            )
            .bind(dispute.id.to_string())
            .bind(dispute.campaign_id.to_string())
            .bind(dispute.status.to_string())
            .bind(serde_json::to_string(dispute)?)
            .bind(timestamp(dispute.created_at))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(campaign.clone())
    }

    async fn record_deposit(&self, entry: &LedgerEntry) -> Result<(), StoreError> {
        if entry.kind != EntryKind::Deposit {
            return Err(StoreError::UnexpectedEntry(entry.kind));
        }
        let mut conn = self.pool.acquire().await?;
        insert_entry(&mut conn, entry).await
    }

    async fn campaign_ledger(&self, id: CampaignId) -> Result<Vec<LedgerEntry>, StoreError> {
        self.entries_where("campaign_id", id.to_string()).await
    }

    async fn account_ledger(&self, account: &Account) -> Result<Vec<LedgerEntry>, StoreError> {
        self.entries_where("account_key", account.key()).await
    }

    async fn campaign_activity(&self, id: CampaignId) -> Result<Vec<ActivityRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT data FROM campaign_activities WHERE campaign_id = ?1 ORDER BY id ASC",
        )
        .bind(id.to_string())
        .fetch_all(&self.pool)
        .await?;
        decode_all(rows)
    }

    async fn campaign_dispute(&self, id: CampaignId) -> Result<Option<Dispute>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT data FROM campaign_disputes
            WHERE campaign_id = ?1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(row) => Ok(Some(serde_json::from_str(row.get::<&str, _>("data"))?)),
            None => Ok(None),
        }
    }

    async fn list_disputes(
        &self,
        status: Option<DisputeStatus>,
    ) -> Result<Vec<Dispute>, StoreError> {
        let rows = match status {
            Some(status) => {
                sqlx::query(
                    "SELECT data FROM campaign_disputes WHERE status = ?1 ORDER BY created_at DESC",
                )
                .bind(status.to_string())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query("SELECT data FROM campaign_disputes ORDER BY created_at DESC")
                    .fetch_all(&self.pool)
                    .await?
            }
        };
        decode_all(rows)
    }

    async fn balance(&self, account: &Account) -> Result<Decimal, StoreError> {
        let entries = self.account_ledger(account).await?;
        Ok(balance_of(account, &entries))
    }
}

#[cfg(feature = "database")]
fn parse_status(status: &str) -> Result<CampaignStatus, StoreError> {
    status
        .parse()
        .map_err(|e: crate::campaign::errors::LifecycleError| StoreError::Corrupt(e.to_string()))
}

#[cfg(all(test, feature = "database"))]
mod tests {
    use super::*;
    use crate::campaign::types::{ActivityKind, ChannelId, Creative, NewCampaign, SellerId, UserId};
    use chrono::NaiveDate;

    async fn seeded(store: &SqliteCampaignStore) -> Campaign {
        let seller = SellerId::new();
        let now = Utc::now();
        store
            .record_deposit(&LedgerEntry::deposit(seller, Decimal::from(5_000), now))
            .await
            .unwrap();
        let campaign = Campaign::from_request(
            seller,
            NewCampaign {
                channel_id: ChannelId::new(),
                budget: Decimal::from(5_000),
                start_date: NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
                end_date: NaiveDate::from_ymd_opt(2025, 8, 3).unwrap(),
                creative: Creative::default(),
                seller_notes: None,
            },
            Decimal::from(10),
            now,
        );
        let hold = LedgerEntry::hold(campaign.id, seller, campaign.budget, now);
        let activity = ActivityRecord::new(campaign.id, UserId::new(), ActivityKind::Created, "created", now);
        store.create_campaign(&campaign, &hold, &activity).await.unwrap();
        campaign
    }

    #[tokio::test]
    async fn test_sqlite_round_trip_and_cas() {
        let store = SqliteCampaignStore::in_memory().await.unwrap();
        let campaign = seeded(&store).await;

        assert_eq!(store.get_campaign(campaign.id).await.unwrap(), Some(campaign.clone()));
        assert_eq!(
            store.balance(&Account::Seller(campaign.seller_id)).await.unwrap(),
            Decimal::ZERO
        );

        let mut next = campaign.clone();
        next.status = CampaignStatus::Rejected;
        let commit = TransitionCommit {
            expected_status: CampaignStatus::Pending,
            ledger: vec![LedgerEntry::refund(campaign.id, campaign.seller_id, campaign.budget, Utc::now())],
            activity: ActivityRecord::new(campaign.id, UserId::new(), ActivityKind::Rejected, "rejected", Utc::now()),
            campaign: next,
            dispute: None,
        };
        store.commit_transition(&commit).await.unwrap();

        let replay = store.commit_transition(&commit).await;
        assert!(matches!(replay, Err(StoreError::StatusMismatch { .. })));
        assert_eq!(
            store.balance(&Account::Seller(campaign.seller_id)).await.unwrap(),
            Decimal::from(5_000)
        );
    }

    fn commit(from: &Campaign, to: CampaignStatus, kind: ActivityKind) -> TransitionCommit {
        let mut next = from.clone();
        next.status = to;
        TransitionCommit {
            expected_status: from.status,
            campaign: next,
            ledger: Vec::new(),
            activity: ActivityRecord::new(from.id, UserId::new(), kind, format!("{kind:?}"), Utc::now()),
            dispute: None,
        }
    }

    #[tokio::test]
    async fn test_sqlite_keeps_timestamps_set_once() {
        let store = SqliteCampaignStore::in_memory().await.unwrap();
        let campaign = seeded(&store).await;

        let accepted = store
            .commit_transition(&commit(&campaign, CampaignStatus::Accepted, ActivityKind::Accepted))
            .await
            .unwrap();
        let mut submit = commit(&accepted, CampaignStatus::InProgress, ActivityKind::Submitted);
        submit.campaign.owner_submitted_at = Some(Utc::now());
        let submitted = store.commit_transition(&submit).await.unwrap();

        let mut dispute = commit(&submitted, CampaignStatus::Disputed, ActivityKind::Disputed);
        dispute.campaign.owner_submitted_at = Some(Utc::now() + chrono::Duration::hours(1));
        let result = store.commit_transition(&dispute).await;
        assert!(matches!(
            result,
            Err(StoreError::ImmutableField {
                field: "owner_submitted_at",
                ..
            })
        ));

        let mut moved = commit(&submitted, CampaignStatus::Disputed, ActivityKind::Disputed);
        moved.campaign.platform_commission_percent = Decimal::ZERO;
        let result = store.commit_transition(&moved).await;
        assert!(matches!(
            result,
            Err(StoreError::ImmutableField {
                field: "platform_commission_percent",
                ..
            })
        ));
        assert_eq!(store.get_campaign(campaign.id).await.unwrap(), Some(submitted));
    }

    #[tokio::test]
    async fn test_sqlite_rejects_edge_outside_status_graph() {
        let store = SqliteCampaignStore::in_memory().await.unwrap();
        let campaign = seeded(&store).await;

        let mut skip = commit(&campaign, CampaignStatus::Completed, ActivityKind::Confirmed);
        skip.ledger = vec![LedgerEntry::release(
            campaign.id,
            campaign.channel_id,
            campaign.budget,
            Utc::now(),
        )];
        let result = store.commit_transition(&skip).await;
        assert!(matches!(result, Err(StoreError::IllegalTransition { .. })));
        assert_eq!(store.campaign_ledger(campaign.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sqlite_filters() {
        let store = SqliteCampaignStore::in_memory().await.unwrap();
        let campaign = seeded(&store).await;

        let by_channel = store
            .list_campaigns(&CampaignFilter {
                channel_ids: Some(vec![campaign.channel_id]),
                ..CampaignFilter::default()
            })
            .await
            .unwrap();
        assert_eq!(by_channel.len(), 1);

        let by_status = store
            .list_campaigns(&CampaignFilter {
                status: Some(CampaignStatus::Completed),
                ..CampaignFilter::default()
            })
            .await
            .unwrap();
        assert!(by_status.is_empty());
    }
}
