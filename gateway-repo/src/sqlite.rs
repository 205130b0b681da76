//! SQLite ledger adapter.
//!
//! Amounts are stored as decimal text and timestamps as fixed-width RFC 3339
//! text, so nothing is lost to floating point and text order is time order.
//! Inserts that must check funds are serialized through an in-process write
//! lock; SQLite databases are not shared between processes here.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use tokio::sync::Mutex;
use tracing::debug;

use fee_rules::Currency;
use gateway_types::{
    Balance, BankAccount, BankAccountId, CreateOutcome, DailySummary, DomainError,
    LedgerRepository, RepoError, StatusUpdate, Transaction, TransactionFilter, TransactionId,
    TransactionPage, TransactionStatus, UserId, WithdrawalMethodId, WithdrawalMethodPreference,
};

use crate::types::text::{json_text, parse_decimal, parse_json_text, parse_opt_ts, parse_ts, ts};
use crate::types::{
    BANK_ACCOUNT_COLUMNS, TX_COLUMNS, WITHDRAWAL_METHOD_COLUMNS, db_err, parse_column,
    parse_currency, tx_err,
};

// ─────────────────────────────────────────────────────────────────────────────
// Row Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct TxRow {
    id: String,
    user_id: String,
    reference_id: String,
    transaction_type: String,
    amount: String,
    currency: String,
    fee_amount: String,
    net_amount: String,
    status: String,
    method_id: Option<String>,
    gateway: Option<String>,
    provider_reference: Option<String>,
    deposit_method: Option<String>,
    payout_destination: Option<String>,
    destination_wallet: Option<String>,
    description: Option<String>,
    processor_response: Option<String>,
    metadata: String,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TxRow {
    fn into_domain(self) -> Result<Transaction, RepoError> {
        Ok(Transaction {
            id: parse_column("id", &self.id)?,
            user_id: parse_column("user_id", &self.user_id)?,
            reference_id: self.reference_id,
            transaction_type: parse_column("transaction_type", &self.transaction_type)?,
            amount: parse_decimal("amount", &self.amount)?,
            currency: parse_currency(&self.currency)?,
            fee_amount: parse_decimal("fee_amount", &self.fee_amount)?,
            net_amount: parse_decimal("net_amount", &self.net_amount)?,
            status: parse_column("status", &self.status)?,
            method_id: self.method_id,
            gateway: self.gateway,
            provider_reference: self.provider_reference,
            deposit_method: self
                .deposit_method
                .map(|m| parse_column("deposit_method", &m))
                .transpose()?,
            payout_destination: self
                .payout_destination
                .map(|d| parse_json_text("payout_destination", &d))
                .transpose()?,
            destination_wallet: self.destination_wallet,
            description: self.description,
            processor_response: self
                .processor_response
                .map(|r| parse_json_text("processor_response", &r))
                .transpose()?,
            metadata: parse_json_text("metadata", &self.metadata)?,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            completed_at: parse_opt_ts("completed_at", self.completed_at)?,
        })
    }
}

#[derive(FromRow)]
struct BankAccountRow {
    id: String,
    user_id: String,
    account_name: String,
    account_number: String,
    bank_name: String,
    bank_code: Option<String>,
    account_holder_name: String,
    account_holder_phone: Option<String>,
    country_code: String,
    currency: String,
    is_default: i64,
    is_verified: i64,
    created_at: String,
    updated_at: String,
}

impl BankAccountRow {
    fn into_domain(self) -> Result<BankAccount, RepoError> {
        Ok(BankAccount {
            id: parse_column("id", &self.id)?,
            user_id: parse_column("user_id", &self.user_id)?,
            account_name: self.account_name,
            account_number: self.account_number,
            bank_name: self.bank_name,
            bank_code: self.bank_code,
            account_holder_name: self.account_holder_name,
            account_holder_phone: self.account_holder_phone,
            country_code: self.country_code,
            currency: parse_currency(&self.currency)?,
            is_default: self.is_default != 0,
            is_verified: self.is_verified != 0,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
        })
    }
}

#[derive(FromRow)]
struct WithdrawalMethodRow {
    id: String,
    user_id: String,
    destination: String,
    display_name: String,
    is_default: i64,
    is_active: i64,
    created_at: String,
    updated_at: String,
    last_used_at: Option<String>,
}

impl WithdrawalMethodRow {
    fn into_domain(self) -> Result<WithdrawalMethodPreference, RepoError> {
        Ok(WithdrawalMethodPreference {
            id: parse_column("id", &self.id)?,
            user_id: parse_column("user_id", &self.user_id)?,
            destination: parse_json_text("destination", &self.destination)?,
            display_name: self.display_name,
            is_default: self.is_default != 0,
            is_active: self.is_active != 0,
            created_at: parse_ts("created_at", &self.created_at)?,
            updated_at: parse_ts("updated_at", &self.updated_at)?,
            last_used_at: parse_opt_ts("last_used_at", self.last_used_at)?,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// SQLite Repository
// ─────────────────────────────────────────────────────────────────────────────

/// SQLite repository implementation.
pub struct SqliteRepo {
    pool: SqlitePool,
    write_lock: Mutex<()>,
}

impl SqliteRepo {
    /// Creates a new SQLite repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Ensure on-disk SQLite target directory exists (no-op for in-memory).
        if let Some(path) = database_url.strip_prefix("sqlite://") {
            let path = path.split('?').next().unwrap_or(path);
            if path != ":memory:" {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() {
                        tokio::fs::create_dir_all(parent).await?;
                    }
                }
            }
        }

        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;
        let repo = Self {
            pool,
            write_lock: Mutex::new(()),
        };
        repo.create_schema().await?;
        Ok(repo)
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Creates the database schema; safe to run repeatedly.
    pub async fn create_schema(&self) -> Result<(), RepoError> {
        for ddl in [
            include_str!("../migrations/0001_create_ledger.sql"),
            include_str!("../migrations/0002_create_payout_destinations.sql"),
        ] {
            sqlx::raw_sql(ddl).execute(&self.pool).await.map_err(db_err)?;
        }
        Ok(())
    }

    async fn fetch_by_reference(
        conn: &mut SqliteConnection,
        reference_id: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        let sql = format!("SELECT {} FROM transactions WHERE reference_id = ?", TX_COLUMNS);
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(reference_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
        row.map(TxRow::into_domain).transpose()
    }

    /// Balance in one currency as seen inside the caller's transaction.
    async fn balance_in(
        conn: &mut SqliteConnection,
        user_id: UserId,
        currency: Currency,
    ) -> Result<Balance, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? AND currency = ? AND status IN ('pending', 'processing', 'completed')",
            TX_COLUMNS
        );
        let rows: Vec<TxRow> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(currency.code())
            .fetch_all(&mut *conn)
            .await
            .map_err(db_err)?;
        let mut balance = Balance::zero(currency);
        for row in rows {
            balance.apply(&row.into_domain()?);
        }
        Ok(balance)
    }

    async fn insert(conn: &mut SqliteConnection, tx: &Transaction) -> Result<bool, RepoError> {
        let sql = format!(
            "INSERT INTO transactions ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(reference_id) DO NOTHING",
            TX_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(tx.id.to_string())
            .bind(tx.user_id.to_string())
            .bind(&tx.reference_id)
            .bind(tx.transaction_type.as_str())
            .bind(tx.amount.to_string())
            .bind(tx.currency.code())
            .bind(tx.fee_amount.to_string())
            .bind(tx.net_amount.to_string())
            .bind(tx.status.as_str())
            .bind(&tx.method_id)
            .bind(&tx.gateway)
            .bind(&tx.provider_reference)
            .bind(tx.deposit_method.map(|m| m.to_string()))
            .bind(tx.payout_destination.as_ref().map(json_text).transpose()?)
            .bind(&tx.destination_wallet)
            .bind(&tx.description)
            .bind(tx.processor_response.as_ref().map(json_text).transpose()?)
            .bind(json_text(&tx.metadata)?)
            .bind(ts(tx.created_at))
            .bind(ts(tx.updated_at))
            .bind(tx.completed_at.map(ts))
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn fetch_user_transactions(
        &self,
        user_id: UserId,
        extra_where: &str,
        binds: &[String],
    ) -> Result<Vec<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = ? {}",
            TX_COLUMNS, extra_where
        );
        let mut query = sqlx::query_as::<_, TxRow>(&sql).bind(user_id.to_string());
        for value in binds {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(TxRow::into_domain).collect()
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, user_id: UserId, filter: &TransactionFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id.to_string());
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(kind) = filter.transaction_type {
        qb.push(" AND transaction_type = ").push_bind(kind.as_str());
    }
    if let Some(from) = filter.from {
        qb.push(" AND created_at >= ").push_bind(ts(from));
    }
    if let Some(to) = filter.to {
        qb.push(" AND created_at < ").push_bind(ts(to));
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for SqliteRepo {
    async fn create_transaction(&self, tx: Transaction) -> Result<CreateOutcome, RepoError> {
        let _guard = self.write_lock.lock().await;

        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        if let Some(existing) = Self::fetch_by_reference(&mut db_tx, &tx.reference_id).await? {
            return Ok(CreateOutcome::Existing(existing));
        }

        let debit = tx.debit_amount();
        if debit > rust_decimal::Decimal::ZERO {
            let balance = Self::balance_in(&mut db_tx, tx.user_id, tx.currency).await?;
            if balance.available < debit {
                return Err(RepoError::Domain(DomainError::InsufficientFunds {
                    available: balance.available,
                    requested: debit,
                    currency: tx.currency,
                }));
            }
        }

        if !Self::insert(&mut db_tx, &tx).await? {
            let existing = Self::fetch_by_reference(&mut db_tx, &tx.reference_id)
                .await?
                .ok_or_else(|| RepoError::Conflict(tx.reference_id.clone()))?;
            return Ok(CreateOutcome::Existing(existing));
        }

        db_tx.commit().await.map_err(tx_err)?;
        debug!(reference = %tx.reference_id, "Ledger record created");
        Ok(CreateOutcome::Created(tx))
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        let sql = format!("SELECT {} FROM transactions WHERE id = ?", TX_COLUMNS);
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(TxRow::into_domain).transpose()
    }

    async fn find_by_reference(
        &self,
        reference_id: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        let mut conn = self.pool.acquire().await.map_err(db_err)?;
        Self::fetch_by_reference(&mut conn, reference_id).await
    }

    async fn find_by_provider_reference(
        &self,
        gateway: &str,
        provider_reference: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE gateway = ? AND provider_reference = ? ORDER BY created_at ASC LIMIT 1",
            TX_COLUMNS
        );
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(gateway)
            .bind(provider_reference)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(TxRow::into_domain).transpose()
    }

    async fn list_transactions(
        &self,
        user_id: UserId,
        filter: &TransactionFilter,
    ) -> Result<TransactionPage, RepoError> {
        let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM transactions");
        push_filter(&mut count, user_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM transactions", TX_COLUMNS));
        push_filter(&mut select, user_id, filter);
        select
            .push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(i64::from(filter.limit()))
            .push(" OFFSET ")
            .push_bind(i64::from(filter.offset()));
        let rows: Vec<TxRow> = select
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(TransactionPage {
            transactions: rows
                .into_iter()
                .map(TxRow::into_domain)
                .collect::<Result<_, _>>()?,
            total: total.max(0) as u64,
            limit: filter.limit(),
            offset: filter.offset(),
        })
    }

    async fn transition_status(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        update: StatusUpdate,
    ) -> Result<Option<Transaction>, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        let sql = format!("SELECT {} FROM transactions WHERE id = ?", TX_COLUMNS);
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(db_err)?;
        let mut tx = row.ok_or(RepoError::NotFound)?.into_domain()?;
        if tx.status != expected {
            return Ok(None);
        }

        update.apply_to(&mut tx, Utc::now());
        let result = sqlx::query(
            r#"UPDATE transactions
               SET status = ?, description = ?, provider_reference = ?, processor_response = ?,
                   metadata = ?, updated_at = ?, completed_at = ?
               WHERE id = ? AND status = ?"#,
        )
        .bind(tx.status.as_str())
        .bind(&tx.description)
        .bind(&tx.provider_reference)
        .bind(tx.processor_response.as_ref().map(json_text).transpose()?)
        .bind(json_text(&tx.metadata)?)
        .bind(ts(tx.updated_at))
        .bind(tx.completed_at.map(ts))
        .bind(id.to_string())
        .bind(expected.as_str())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Ok(None);
        }
        db_tx.commit().await.map_err(tx_err)?;
        Ok(Some(tx))
    }

    async fn annotate_transaction(
        &self,
        id: TransactionId,
        description: &str,
        metadata: serde_json::Value,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE transactions SET description = ?, metadata = ?, updated_at = ? WHERE id = ?",
        )
        .bind(description)
        .bind(json_text(&metadata)?)
        .bind(ts(Utc::now()))
        .bind(id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn list_non_terminal(
        &self,
        created_before: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE status IN ('pending', 'processing') AND created_at < ? \
             ORDER BY CASE WHEN json_extract(metadata, '$.escalated') = 1 THEN 1 ELSE 0 END, \
             created_at ASC LIMIT ?",
            TX_COLUMNS
        );
        let rows: Vec<TxRow> = sqlx::query_as(&sql)
            .bind(ts(created_before))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(TxRow::into_domain).collect()
    }

    async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, RepoError> {
        let txs = self
            .fetch_user_transactions(
                user_id,
                "AND status IN ('pending', 'processing', 'completed')",
                &[],
            )
            .await?;
        Ok(Balance::from_transactions(&txs))
    }

    async fn daily_summary(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> Result<DailySummary, RepoError> {
        let start = date.and_time(chrono::NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        let txs = self
            .fetch_user_transactions(
                user_id,
                "AND status = 'completed' AND completed_at >= ? AND completed_at < ?",
                &[ts(start), ts(end)],
            )
            .await?;
        Ok(DailySummary::from_transactions(date, &txs))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bank Accounts
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_bank_account(&self, account: BankAccount) -> Result<BankAccount, RepoError> {
        let sql = format!(
            "INSERT INTO bank_accounts ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            BANK_ACCOUNT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(account.id.to_string())
            .bind(account.user_id.to_string())
            .bind(&account.account_name)
            .bind(&account.account_number)
            .bind(&account.bank_name)
            .bind(&account.bank_code)
            .bind(&account.account_holder_name)
            .bind(&account.account_holder_phone)
            .bind(&account.country_code)
            .bind(account.currency.code())
            .bind(i64::from(account.is_default))
            .bind(i64::from(account.is_verified))
            .bind(ts(account.created_at))
            .bind(ts(account.updated_at))
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(account)
    }

    async fn get_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<Option<BankAccount>, RepoError> {
        let sql = format!(
            "SELECT {} FROM bank_accounts WHERE id = ? AND user_id = ?",
            BANK_ACCOUNT_COLUMNS
        );
        let row: Option<BankAccountRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(BankAccountRow::into_domain).transpose()
    }

    async fn list_bank_accounts(
        &self,
        user_id: UserId,
        country_code: Option<&str>,
    ) -> Result<Vec<BankAccount>, RepoError> {
        let sql = format!(
            "SELECT {} FROM bank_accounts WHERE user_id = ? AND (? IS NULL OR country_code = ?) \
             ORDER BY is_default DESC, created_at DESC",
            BANK_ACCOUNT_COLUMNS
        );
        let country = country_code.map(str::to_ascii_uppercase);
        let rows: Vec<BankAccountRow> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .bind(&country)
            .bind(&country)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(BankAccountRow::into_domain).collect()
    }

    async fn set_bank_account_verified(
        &self,
        user_id: UserId,
        id: BankAccountId,
        verified: bool,
    ) -> Result<BankAccount, RepoError> {
        let result = sqlx::query(
            "UPDATE bank_accounts SET is_verified = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(i64::from(verified))
        .bind(ts(Utc::now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        self.get_bank_account(user_id, id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn delete_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM bank_accounts WHERE id = ? AND user_id = ?")
            .bind(id.to_string())
            .bind(user_id.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn set_default_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<BankAccount, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;
        let now = ts(Utc::now());

        sqlx::query("UPDATE bank_accounts SET is_default = 0, updated_at = ? WHERE user_id = ? AND is_default = 1")
            .bind(&now)
            .bind(user_id.to_string())
            .execute(&mut *db_tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query(
            "UPDATE bank_accounts SET is_default = 1, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&now)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        db_tx.commit().await.map_err(tx_err)?;
        self.get_bank_account(user_id, id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Withdrawal Method Preferences
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_withdrawal_method(
        &self,
        method: WithdrawalMethodPreference,
    ) -> Result<WithdrawalMethodPreference, RepoError> {
        sqlx::query(
            r#"INSERT INTO withdrawal_methods
               (id, user_id, kind, destination, display_name, is_default, is_active, created_at, updated_at, last_used_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(method.id.to_string())
        .bind(method.user_id.to_string())
        .bind(method.kind().as_str())
        .bind(json_text(&method.destination)?)
        .bind(&method.display_name)
        .bind(i64::from(method.is_default))
        .bind(i64::from(method.is_active))
        .bind(ts(method.created_at))
        .bind(ts(method.updated_at))
        .bind(method.last_used_at.map(ts))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(method)
    }

    async fn get_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<Option<WithdrawalMethodPreference>, RepoError> {
        let sql = format!(
            "SELECT {} FROM withdrawal_methods WHERE id = ? AND user_id = ?",
            WITHDRAWAL_METHOD_COLUMNS
        );
        let row: Option<WithdrawalMethodRow> = sqlx::query_as(&sql)
            .bind(id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.map(WithdrawalMethodRow::into_domain).transpose()
    }

    async fn list_withdrawal_methods(
        &self,
        user_id: UserId,
    ) -> Result<Vec<WithdrawalMethodPreference>, RepoError> {
        let sql = format!(
            "SELECT {} FROM withdrawal_methods WHERE user_id = ? AND is_active = 1 \
             ORDER BY is_default DESC, last_used_at IS NULL, last_used_at DESC, created_at DESC",
            WITHDRAWAL_METHOD_COLUMNS
        );
        let rows: Vec<WithdrawalMethodRow> = sqlx::query_as(&sql)
            .bind(user_id.to_string())
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(WithdrawalMethodRow::into_domain).collect()
    }

    async fn set_default_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<WithdrawalMethodPreference, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;
        let now = ts(Utc::now());

        sqlx::query("UPDATE withdrawal_methods SET is_default = 0, updated_at = ? WHERE user_id = ? AND is_default = 1")
            .bind(&now)
            .bind(user_id.to_string())
            .execute(&mut *db_tx)
            .await
            .map_err(db_err)?;

        let result = sqlx::query(
            "UPDATE withdrawal_methods SET is_default = 1, updated_at = ? WHERE id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(&now)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }

        db_tx.commit().await.map_err(tx_err)?;
        self.get_withdrawal_method(user_id, id)
            .await?
            .ok_or(RepoError::NotFound)
    }

    async fn touch_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<(), RepoError> {
        let now = ts(Utc::now());
        let result = sqlx::query(
            "UPDATE withdrawal_methods SET last_used_at = ?, updated_at = ? WHERE id = ? AND user_id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }

    async fn deactivate_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE withdrawal_methods SET is_active = 0, is_default = 0, updated_at = ? WHERE id = ? AND user_id = ? AND is_active = 1",
        )
        .bind(ts(Utc::now()))
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
