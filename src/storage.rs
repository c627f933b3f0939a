//! Persistence layer for campaigns, whitelists, participations and frozen
//! presale records.
//!
//! [`CampaignStore`] is the formal contract between the engine and the
//! database; the shipped implementation is SQLite via sqlx. Related rows are
//! loaded through explicit include flags, never implicitly.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, Pool, QueryBuilder, Sqlite};
use tracing::{debug, info};

use crate::types::{
    AccessType, Campaign, CampaignAggregate, CampaignDraft, Currency, FrozenPresale, ListingInfo,
    WhitelistEntry,
};

/// Which related rows to load alongside a campaign.
#[derive(Debug, Clone, Copy, Default)]
pub struct CampaignInclude {
    pub whitelist: bool,
    pub frozen: bool,
}

impl CampaignInclude {
    pub fn whitelist() -> Self {
        Self { whitelist: true, frozen: false }
    }

    pub fn frozen() -> Self {
        Self { whitelist: false, frozen: true }
    }

    pub fn all() -> Self {
        Self { whitelist: true, frozen: true }
    }
}

/// Filter for campaign listings. Unset fields match everything.
#[derive(Debug, Clone, Default)]
pub struct CampaignFilter {
    pub wallet_address: Option<String>,
    pub network_id: Option<u64>,
    pub token_contract_address: Option<String>,
    /// Restrict to the given campaign ids.
    pub campaign_ids: Option<Vec<i64>>,
}

/// Formal contract for campaign persistence.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// Creates a campaign and, for private campaigns, its whitelist, in one
    /// scoped transaction. Returns the new campaign id.
    async fn create_campaign(&self, draft: &CampaignDraft, whitelist: &[String]) -> Result<i64>;

    async fn campaign_by_id(
        &self,
        campaign_id: i64,
        include: CampaignInclude,
    ) -> Result<Option<CampaignAggregate>>;

    async fn campaign_by_contract(
        &self,
        contract_address: &str,
        network_id: u64,
        include: CampaignInclude,
    ) -> Result<Option<CampaignAggregate>>;

    async fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        include: CampaignInclude,
    ) -> Result<Vec<CampaignAggregate>>;

    async fn frozen_presale_exists(&self, campaign_id: i64) -> Result<bool>;

    /// Inserts the frozen record unless one already exists for the campaign.
    /// Returns `true` when this call created the record; a conflict with a
    /// concurrent writer is not an error.
    async fn insert_frozen_presale(&self, record: &FrozenPresale) -> Result<bool>;

    /// Records that a wallet participated in a campaign. Idempotent.
    async fn record_participation(&self, wallet_address: &str, campaign_id: i64) -> Result<()>;

    /// Distinct campaign ids a wallet has participated in on a network.
    async fn participated_campaign_ids(
        &self,
        wallet_address: &str,
        network_id: u64,
    ) -> Result<Vec<i64>>;

    async fn health_check(&self) -> Result<bool>;
}

#[derive(FromRow)]
struct CampaignRow {
    campaign_id: i64,
    wallet_address: String,
    network_id: i64,
    contract_address: String,
    token_contract_address: String,
    payment_currency: String,
    hard_cap: String,
    soft_cap: String,
    max_allocation_wallet: Option<String>,
    min_allocation_wallet: Option<String>,
    access_type: String,
    sale_start_time: i64,
    sale_end_time: i64,
    list_amm: Option<String>,
    currency_pair: Option<String>,
}

#[derive(FromRow)]
struct FrozenPresaleRow {
    campaign_id: i64,
    total_base_collected: String,
    total_base_withdrawn: String,
    total_tokens_sold: String,
    total_tokens_withdrawn: String,
    number_buyers: i64,
    is_added_liquidity: bool,
    is_force_failed: bool,
    is_transferred_fee: bool,
    is_list_on_amm: bool,
    is_owner_withdrawn: bool,
    is_whitelist_only: bool,
    is_success: bool,
    price: String,
}

/// SQLite implementation of the [`CampaignStore`] contract.
pub struct SqliteCampaignStore {
    pool: Pool<Sqlite>,
}

impl SqliteCampaignStore {
    pub async fn new(database_url: &str) -> Result<Arc<Self>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("failed to connect to SQLite database")?;

        let store = Self { pool };
        store.create_schema().await?;
        info!("campaign store initialized at {database_url}");
        Ok(Arc::new(store))
    }

    /// In-memory store for tests. Single connection, so every query sees the
    /// same database.
    pub async fn new_in_memory() -> Result<Arc<Self>> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .context("failed to open in-memory SQLite database")?;

        let store = Self { pool };
        store.create_schema().await?;
        Ok(Arc::new(store))
    }

    async fn create_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS campaigns (
                campaign_id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_address TEXT NOT NULL,
                network_id INTEGER NOT NULL,
                contract_address TEXT NOT NULL,
                token_contract_address TEXT NOT NULL,
                payment_currency TEXT NOT NULL,
                hard_cap TEXT NOT NULL,
                soft_cap TEXT NOT NULL,
                max_allocation_wallet TEXT,
                min_allocation_wallet TEXT,
                access_type TEXT NOT NULL,
                sale_start_time INTEGER NOT NULL,
                sale_end_time INTEGER NOT NULL,
                list_amm TEXT,
                currency_pair TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create campaigns table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS whitelists (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                campaign_id INTEGER NOT NULL,
                wallet_address TEXT NOT NULL,
                UNIQUE (campaign_id, wallet_address),
                FOREIGN KEY (campaign_id) REFERENCES campaigns (campaign_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create whitelists table")?;

        // campaign_id is the primary key: a duplicate freeze attempt is a
        // detectable conflict, never a second row.
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS frozen_presales (
                campaign_id INTEGER PRIMARY KEY,
                total_base_collected TEXT NOT NULL,
                total_base_withdrawn TEXT NOT NULL,
                total_tokens_sold TEXT NOT NULL,
                total_tokens_withdrawn TEXT NOT NULL,
                number_buyers INTEGER NOT NULL,
                is_added_liquidity BOOLEAN NOT NULL,
                is_force_failed BOOLEAN NOT NULL,
                is_transferred_fee BOOLEAN NOT NULL,
                is_list_on_amm BOOLEAN NOT NULL,
                is_owner_withdrawn BOOLEAN NOT NULL,
                is_whitelist_only BOOLEAN NOT NULL,
                is_success BOOLEAN NOT NULL,
                price TEXT NOT NULL,
                FOREIGN KEY (campaign_id) REFERENCES campaigns (campaign_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create frozen_presales table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS participations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                wallet_address TEXT NOT NULL,
                campaign_id INTEGER NOT NULL,
                UNIQUE (wallet_address, campaign_id),
                FOREIGN KEY (campaign_id) REFERENCES campaigns (campaign_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create participations table")?;

        Ok(())
    }

    async fn load_whitelist(&self, campaign_id: i64) -> Result<Vec<WhitelistEntry>> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            "SELECT campaign_id, wallet_address FROM whitelists WHERE campaign_id = ?",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch whitelist")?;

        Ok(rows
            .into_iter()
            .map(|(campaign_id, wallet_address)| WhitelistEntry {
                campaign_id,
                wallet_address,
            })
            .collect())
    }

    async fn load_frozen(&self, campaign_id: i64) -> Result<Option<FrozenPresale>> {
        let row: Option<FrozenPresaleRow> =
            sqlx::query_as("SELECT * FROM frozen_presales WHERE campaign_id = ?")
                .bind(campaign_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to fetch frozen presale record")?;

        row.map(row_to_frozen).transpose()
    }

    async fn build_aggregate(
        &self,
        row: CampaignRow,
        include: CampaignInclude,
    ) -> Result<CampaignAggregate> {
        let campaign = row_to_campaign(row)?;
        let whitelist = if include.whitelist {
            Some(self.load_whitelist(campaign.campaign_id).await?)
        } else {
            None
        };
        let frozen = if include.frozen {
            self.load_frozen(campaign.campaign_id).await?
        } else {
            None
        };

        Ok(CampaignAggregate {
            campaign,
            whitelist,
            frozen,
        })
    }
}

#[async_trait]
impl CampaignStore for SqliteCampaignStore {
    async fn create_campaign(&self, draft: &CampaignDraft, whitelist: &[String]) -> Result<i64> {
        debug!(contract_address = %draft.contract_address, "creating campaign");

        let mut tx = self.pool.begin().await.context("failed to begin transaction")?;

        let campaign_id = sqlx::query(
            r#"
            INSERT INTO campaigns (
                wallet_address, network_id, contract_address, token_contract_address,
                payment_currency, hard_cap, soft_cap, max_allocation_wallet,
                min_allocation_wallet, access_type, sale_start_time, sale_end_time,
                list_amm, currency_pair
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?);
            "#,
        )
        .bind(&draft.wallet_address)
        .bind(draft.network_id as i64)
        .bind(&draft.contract_address)
        .bind(&draft.token_contract_address)
        .bind(draft.payment_currency.as_str())
        .bind(draft.hard_cap.to_string())
        .bind(draft.soft_cap.to_string())
        .bind(draft.max_allocation_wallet.as_ref().map(|cap| cap.to_string()))
        .bind(draft.min_allocation_wallet.as_ref().map(|cap| cap.to_string()))
        .bind(draft.access_type.as_str())
        .bind(draft.sale_start_time.timestamp())
        .bind(draft.sale_end_time.timestamp())
        .bind(draft.listing.as_ref().map(|listing| listing.amm.clone()))
        .bind(draft.listing.as_ref().map(|listing| listing.currency_pair.clone()))
        .execute(&mut *tx)
        .await
        .context("failed to insert campaign")?
        .last_insert_rowid();

        for wallet_address in whitelist {
            sqlx::query("INSERT INTO whitelists (campaign_id, wallet_address) VALUES (?, ?)")
                .bind(campaign_id)
                .bind(wallet_address)
                .execute(&mut *tx)
                .await
                .context("failed to insert whitelist entry")?;
        }

        tx.commit().await.context("failed to commit campaign creation")?;
        Ok(campaign_id)
    }

    async fn campaign_by_id(
        &self,
        campaign_id: i64,
        include: CampaignInclude,
    ) -> Result<Option<CampaignAggregate>> {
        let row: Option<CampaignRow> =
            sqlx::query_as("SELECT * FROM campaigns WHERE campaign_id = ?")
                .bind(campaign_id)
                .fetch_optional(&self.pool)
                .await
                .context("failed to fetch campaign by id")?;

        match row {
            Some(row) => Ok(Some(self.build_aggregate(row, include).await?)),
            None => Ok(None),
        }
    }

    async fn campaign_by_contract(
        &self,
        contract_address: &str,
        network_id: u64,
        include: CampaignInclude,
    ) -> Result<Option<CampaignAggregate>> {
        let row: Option<CampaignRow> = sqlx::query_as(
            "SELECT * FROM campaigns WHERE contract_address = ? COLLATE NOCASE AND network_id = ?",
        )
        .bind(contract_address)
        .bind(network_id as i64)
        .fetch_optional(&self.pool)
        .await
        .context("failed to fetch campaign by contract address")?;

        match row {
            Some(row) => Ok(Some(self.build_aggregate(row, include).await?)),
            None => Ok(None),
        }
    }

    async fn list_campaigns(
        &self,
        filter: &CampaignFilter,
        include: CampaignInclude,
    ) -> Result<Vec<CampaignAggregate>> {
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT * FROM campaigns WHERE 1 = 1");

        if let Some(wallet_address) = &filter.wallet_address {
            builder.push(" AND wallet_address = ");
            builder.push_bind(wallet_address);
        }
        if let Some(network_id) = filter.network_id {
            builder.push(" AND network_id = ");
            builder.push_bind(network_id as i64);
        }
        if let Some(token_contract) = &filter.token_contract_address {
            builder.push(" AND token_contract_address = ");
            builder.push_bind(token_contract);
            builder.push(" COLLATE NOCASE");
        }
        if let Some(campaign_ids) = &filter.campaign_ids {
            builder.push(" AND campaign_id IN (");
            let mut separated = builder.separated(", ");
            for campaign_id in campaign_ids {
                separated.push_bind(*campaign_id);
            }
            separated.push_unseparated(")");
        }
        builder.push(" ORDER BY campaign_id ASC");

        let rows: Vec<CampaignRow> = builder
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .context("failed to list campaigns")?;

        let mut aggregates = Vec::with_capacity(rows.len());
        for row in rows {
            aggregates.push(self.build_aggregate(row, include).await?);
        }
        Ok(aggregates)
    }

    async fn frozen_presale_exists(&self, campaign_id: i64) -> Result<bool> {
        let count: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM frozen_presales WHERE campaign_id = ?")
                .bind(campaign_id)
                .fetch_one(&self.pool)
                .await
                .context("failed to check frozen presale existence")?;

        Ok(count.0 > 0)
    }

    async fn insert_frozen_presale(&self, record: &FrozenPresale) -> Result<bool> {
        debug!(campaign_id = record.campaign_id, "freezing presale snapshot");

        let result = sqlx::query(
            r#"
            INSERT INTO frozen_presales (
                campaign_id, total_base_collected, total_base_withdrawn,
                total_tokens_sold, total_tokens_withdrawn, number_buyers,
                is_added_liquidity, is_force_failed, is_transferred_fee,
                is_list_on_amm, is_owner_withdrawn, is_whitelist_only,
                is_success, price
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (campaign_id) DO NOTHING;
            "#,
        )
        .bind(record.campaign_id)
        .bind(record.total_base_collected.to_string())
        .bind(record.total_base_withdrawn.to_string())
        .bind(&record.total_tokens_sold)
        .bind(&record.total_tokens_withdrawn)
        .bind(record.number_buyers as i64)
        .bind(record.is_added_liquidity)
        .bind(record.is_force_failed)
        .bind(record.is_transferred_fee)
        .bind(record.is_list_on_amm)
        .bind(record.is_owner_withdrawn)
        .bind(record.is_whitelist_only)
        .bind(record.is_success)
        .bind(record.price.to_string())
        .execute(&self.pool)
        .await
        .context("failed to insert frozen presale record")?;

        Ok(result.rows_affected() > 0)
    }

    async fn record_participation(&self, wallet_address: &str, campaign_id: i64) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO participations (wallet_address, campaign_id)
            VALUES (?, ?)
            ON CONFLICT (wallet_address, campaign_id) DO NOTHING;
            "#,
        )
        .bind(wallet_address)
        .bind(campaign_id)
        .execute(&self.pool)
        .await
        .context("failed to record participation")?;

        Ok(())
    }

    async fn participated_campaign_ids(
        &self,
        wallet_address: &str,
        network_id: u64,
    ) -> Result<Vec<i64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT p.campaign_id
            FROM participations p
            JOIN campaigns c ON c.campaign_id = p.campaign_id
            WHERE p.wallet_address = ? AND c.network_id = ?
            ORDER BY p.campaign_id ASC;
            "#,
        )
        .bind(wallet_address)
        .bind(network_id as i64)
        .fetch_all(&self.pool)
        .await
        .context("failed to fetch participated campaigns")?;

        Ok(rows.into_iter().map(|(campaign_id,)| campaign_id).collect())
    }

    async fn health_check(&self) -> Result<bool> {
        match sqlx::query("SELECT 1").execute(&self.pool).await {
            Ok(_) => Ok(true),
            Err(_) => Ok(false),
        }
    }
}

fn row_to_campaign(row: CampaignRow) -> Result<Campaign> {
    let listing = match (row.list_amm, row.currency_pair) {
        (Some(amm), Some(currency_pair)) => Some(ListingInfo { amm, currency_pair }),
        _ => None,
    };

    Ok(Campaign {
        campaign_id: row.campaign_id,
        wallet_address: row.wallet_address,
        network_id: row.network_id as u64,
        contract_address: row.contract_address,
        token_contract_address: row.token_contract_address,
        payment_currency: Currency::from_str(&row.payment_currency)?,
        hard_cap: parse_stored_decimal(&row.hard_cap, "hard_cap")?,
        soft_cap: parse_stored_decimal(&row.soft_cap, "soft_cap")?,
        max_allocation_wallet: row
            .max_allocation_wallet
            .as_deref()
            .map(|cap| parse_stored_decimal(cap, "max_allocation_wallet"))
            .transpose()?,
        min_allocation_wallet: row
            .min_allocation_wallet
            .as_deref()
            .map(|cap| parse_stored_decimal(cap, "min_allocation_wallet"))
            .transpose()?,
        access_type: AccessType::from_str(&row.access_type)?,
        sale_start_time: timestamp_to_datetime(row.sale_start_time)?,
        sale_end_time: timestamp_to_datetime(row.sale_end_time)?,
        listing,
    })
}

fn row_to_frozen(row: FrozenPresaleRow) -> Result<FrozenPresale> {
    Ok(FrozenPresale {
        campaign_id: row.campaign_id,
        total_base_collected: parse_stored_decimal(&row.total_base_collected, "total_base_collected")?,
        total_base_withdrawn: parse_stored_decimal(&row.total_base_withdrawn, "total_base_withdrawn")?,
        total_tokens_sold: row.total_tokens_sold,
        total_tokens_withdrawn: row.total_tokens_withdrawn,
        number_buyers: row.number_buyers as u64,
        is_added_liquidity: row.is_added_liquidity,
        is_force_failed: row.is_force_failed,
        is_transferred_fee: row.is_transferred_fee,
        is_list_on_amm: row.is_list_on_amm,
        is_owner_withdrawn: row.is_owner_withdrawn,
        is_whitelist_only: row.is_whitelist_only,
        is_success: row.is_success,
        price: parse_stored_decimal(&row.price, "price")?,
    })
}

fn parse_stored_decimal(text: &str, column: &str) -> Result<BigDecimal> {
    BigDecimal::from_str(text).with_context(|| format!("stored {column} is not a decimal: {text:?}"))
}

fn timestamp_to_datetime(seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(seconds, 0)
        .with_context(|| format!("stored timestamp {seconds} is out of range"))
}
