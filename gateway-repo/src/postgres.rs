//! PostgreSQL ledger adapter.
//!
//! Funds checks take a transaction-scoped advisory lock per user and
//! currency, so concurrent withdrawals from one balance are serialized while
//! unrelated balances proceed in parallel.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::debug;
use uuid::Uuid;

use fee_rules::Currency;
use gateway_types::{
    Balance, BankAccount, BankAccountId, CreateOutcome, DailySummary, DomainError,
    LedgerRepository, RepoError, StatusUpdate, Transaction, TransactionFilter, TransactionId,
    TransactionPage, TransactionStatus, UserId, WithdrawalMethodId, WithdrawalMethodPreference,
};

use crate::types::{
    BANK_ACCOUNT_COLUMNS, TX_COLUMNS, WITHDRAWAL_METHOD_COLUMNS, db_err, from_json, parse_column,
    parse_currency, to_json, tx_err,
};

// ─────────────────────────────────────────────────────────────────────────────
// Row Types
// ─────────────────────────────────────────────────────────────────────────────

#[derive(FromRow)]
struct TxRow {
    id: Uuid,
    user_id: Uuid,
    reference_id: String,
    transaction_type: String,
    amount: Decimal,
    currency: String,
    fee_amount: Decimal,
    net_amount: Decimal,
    status: String,
    method_id: Option<String>,
    gateway: Option<String>,
    provider_reference: Option<String>,
    deposit_method: Option<String>,
    payout_destination: Option<serde_json::Value>,
    destination_wallet: Option<String>,
    description: Option<String>,
    processor_response: Option<serde_json::Value>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
}

impl TxRow {
    fn into_domain(self) -> Result<Transaction, RepoError> {
        let currency = parse_currency(&self.currency)?;
        // NUMERIC columns come back at the column's scale.
        let normalize = |d: Decimal| d.normalize();
        Ok(Transaction {
            id: TransactionId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            reference_id: self.reference_id,
            transaction_type: parse_column("transaction_type", &self.transaction_type)?,
            amount: normalize(self.amount),
            currency,
            fee_amount: normalize(self.fee_amount),
            net_amount: normalize(self.net_amount),
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
                .map(|d| from_json("payout_destination", d))
                .transpose()?,
            destination_wallet: self.destination_wallet,
            description: self.description,
            processor_response: self.processor_response,
            metadata: self.metadata,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct BankAccountRow {
    id: Uuid,
    user_id: Uuid,
    account_name: String,
    account_number: String,
    bank_name: String,
    bank_code: Option<String>,
    account_holder_name: String,
    account_holder_phone: Option<String>,
    country_code: String,
    currency: String,
    is_default: bool,
    is_verified: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl BankAccountRow {
    fn into_domain(self) -> Result<BankAccount, RepoError> {
        Ok(BankAccount {
            id: BankAccountId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            account_name: self.account_name,
            account_number: self.account_number,
            bank_name: self.bank_name,
            bank_code: self.bank_code,
            account_holder_name: self.account_holder_name,
            account_holder_phone: self.account_holder_phone,
            country_code: self.country_code,
            currency: parse_currency(&self.currency)?,
            is_default: self.is_default,
            is_verified: self.is_verified,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct WithdrawalMethodRow {
    id: Uuid,
    user_id: Uuid,
    destination: serde_json::Value,
    display_name: String,
    is_default: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
}

impl WithdrawalMethodRow {
    fn into_domain(self) -> Result<WithdrawalMethodPreference, RepoError> {
        Ok(WithdrawalMethodPreference {
            id: WithdrawalMethodId::from_uuid(self.id),
            user_id: UserId::from_uuid(self.user_id),
            destination: from_json("destination", self.destination)?,
            display_name: self.display_name,
            is_default: self.is_default,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
            last_used_at: self.last_used_at,
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// PostgreSQL Repository
// ─────────────────────────────────────────────────────────────────────────────

/// PostgreSQL repository with advisory and row-level locking.
pub struct PostgresRepo {
    pool: PgPool,
}

/// Executes SQL statements from a migration file, splitting by semicolons.
async fn execute_migration(pool: &PgPool, sql: &str, name: &str) -> Result<(), anyhow::Error> {
    for statement in sql.split(';') {
        let stmt = statement.trim();
        if !stmt.is_empty() {
            sqlx::query(stmt)
                .execute(pool)
                .await
                .map_err(|e| anyhow::anyhow!("Migration {} failed: {}", name, e))?;
        }
    }
    Ok(())
}

/// Runs all database migrations.
async fn run_migrations(pool: &PgPool) -> Result<(), anyhow::Error> {
    execute_migration(
        pool,
        include_str!("../migrations/0001_create_ledger_pg.sql"),
        "0001",
    )
    .await?;

    execute_migration(
        pool,
        include_str!("../migrations/0002_create_payout_destinations_pg.sql"),
        "0002",
    )
    .await?;

    Ok(())
}

impl PostgresRepo {
    /// Creates a new PostgreSQL repository with automatic migration.
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        let pool = PgPool::connect(database_url).await?;
        run_migrations(&pool).await?;
        Ok(Self { pool })
    }

    /// Returns a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn fetch_by_reference(
        conn: &mut PgConnection,
        reference_id: &str,
    ) -> Result<Option<Transaction>, RepoError> {
        let sql = format!("SELECT {} FROM transactions WHERE reference_id = $1", TX_COLUMNS);
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(reference_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err)?;
        row.map(TxRow::into_domain).transpose()
    }

    async fn balance_in(
        conn: &mut PgConnection,
        user_id: UserId,
        currency: Currency,
    ) -> Result<Balance, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = $1 AND currency = $2 AND status IN ('pending', 'processing', 'completed')",
            TX_COLUMNS
        );
        let rows: Vec<TxRow> = sqlx::query_as(&sql)
            .bind(user_id.into_uuid())
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

    async fn insert(conn: &mut PgConnection, tx: &Transaction) -> Result<bool, RepoError> {
        let sql = format!(
            "INSERT INTO transactions ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21) \
             ON CONFLICT (reference_id) DO NOTHING",
            TX_COLUMNS
        );
        let result = sqlx::query(&sql)
            .bind(tx.id.into_uuid())
            .bind(tx.user_id.into_uuid())
            .bind(&tx.reference_id)
            .bind(tx.transaction_type.as_str())
            .bind(tx.amount)
            .bind(tx.currency.code())
            .bind(tx.fee_amount)
            .bind(tx.net_amount)
            .bind(tx.status.as_str())
            .bind(&tx.method_id)
            .bind(&tx.gateway)
            .bind(&tx.provider_reference)
            .bind(tx.deposit_method.map(|m| m.to_string()))
            .bind(tx.payout_destination.as_ref().map(to_json).transpose()?)
            .bind(&tx.destination_wallet)
            .bind(&tx.description)
            .bind(&tx.processor_response)
            .bind(&tx.metadata)
            .bind(tx.created_at)
            .bind(tx.updated_at)
            .bind(tx.completed_at)
            .execute(&mut *conn)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() == 1)
    }

    async fn fetch_where(
        &self,
        user_id: UserId,
        extra_where: &str,
        bounds: &[DateTime<Utc>],
    ) -> Result<Vec<Transaction>, RepoError> {
        let sql = format!(
            "SELECT {} FROM transactions WHERE user_id = $1 {}",
            TX_COLUMNS, extra_where
        );
        let mut query = sqlx::query_as::<_, TxRow>(&sql).bind(user_id.into_uuid());
        for bound in bounds {
            query = query.bind(*bound);
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter().map(TxRow::into_domain).collect()
    }
}

fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, user_id: UserId, filter: &TransactionFilter) {
    qb.push(" WHERE user_id = ").push_bind(user_id.into_uuid());
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(kind) = filter.transaction_type {
        qb.push(" AND transaction_type = ").push_bind(kind.as_str());
    }
    if let Some(from) = filter.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND created_at < ").push_bind(to);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Repository implementation
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl LedgerRepository for PostgresRepo {
    async fn create_transaction(&self, tx: Transaction) -> Result<CreateOutcome, RepoError> {
        let mut db_tx = self.pool.begin().await.map_err(tx_err)?;

        if let Some(existing) = Self::fetch_by_reference(&mut db_tx, &tx.reference_id).await? {
            return Ok(CreateOutcome::Existing(existing));
        }

        let debit = tx.debit_amount();
        if debit > Decimal::ZERO {
            sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
                .bind(format!("{}:{}", tx.user_id, tx.currency.code()))
                .execute(&mut *db_tx)
                .await
                .map_err(db_err)?;

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
            // Lost a race on the reference; the winner is committed by now.
            drop(db_tx);
            let existing = self
                .find_by_reference(&tx.reference_id)
                .await?
                .ok_or_else(|| RepoError::Conflict(tx.reference_id.clone()))?;
            return Ok(CreateOutcome::Existing(existing));
        }

        db_tx.commit().await.map_err(tx_err)?;
        debug!(reference = %tx.reference_id, "Ledger record created");
        Ok(CreateOutcome::Created(tx))
    }

    async fn get_transaction(&self, id: TransactionId) -> Result<Option<Transaction>, RepoError> {
        let sql = format!("SELECT {} FROM transactions WHERE id = $1", TX_COLUMNS);
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
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
            "SELECT {} FROM transactions WHERE gateway = $1 AND provider_reference = $2 ORDER BY created_at ASC LIMIT 1",
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
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions");
        push_filter(&mut count, user_id, filter);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;

        let mut select =
            QueryBuilder::<Postgres>::new(format!("SELECT {} FROM transactions", TX_COLUMNS));
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

        // Lock the row with FOR UPDATE
        let sql = format!("SELECT {} FROM transactions WHERE id = $1 FOR UPDATE", TX_COLUMNS);
        let row: Option<TxRow> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(db_err)?;
        let mut tx = row.ok_or(RepoError::NotFound)?.into_domain()?;
        if tx.status != expected {
            return Ok(None);
        }

        update.apply_to(&mut tx, Utc::now());
        sqlx::query(
            r#"UPDATE transactions
               SET status = $1, description = $2, provider_reference = $3, processor_response = $4,
                   metadata = $5, updated_at = $6, completed_at = $7
               WHERE id = $8"#,
        )
        .bind(tx.status.as_str())
        .bind(&tx.description)
        .bind(&tx.provider_reference)
        .bind(&tx.processor_response)
        .bind(&tx.metadata)
        .bind(tx.updated_at)
        .bind(tx.completed_at)
        .bind(id.into_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

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
            "UPDATE transactions SET description = $1, metadata = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(description)
        .bind(&metadata)
        .bind(Utc::now())
        .bind(id.into_uuid())
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
            "SELECT {} FROM transactions WHERE status IN ('pending', 'processing') AND created_at < $1 \
             ORDER BY (metadata -> 'escalated') IS NOT DISTINCT FROM 'true'::jsonb, \
             created_at ASC LIMIT $2",
            TX_COLUMNS
        );
        let rows: Vec<TxRow> = sqlx::query_as(&sql)
            .bind(created_before)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.into_iter().map(TxRow::into_domain).collect()
    }

    async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, RepoError> {
        let txs = self
            .fetch_where(
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
            .fetch_where(
                user_id,
                "AND status = 'completed' AND completed_at >= $2 AND completed_at < $3",
                &[start, end],
            )
            .await?;
        Ok(DailySummary::from_transactions(date, &txs))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Bank Accounts
    // ─────────────────────────────────────────────────────────────────────────

    async fn create_bank_account(&self, account: BankAccount) -> Result<BankAccount, RepoError> {
        let sql = format!(
            "INSERT INTO bank_accounts ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)",
            BANK_ACCOUNT_COLUMNS
        );
        sqlx::query(&sql)
            .bind(account.id.into_uuid())
            .bind(account.user_id.into_uuid())
            .bind(&account.account_name)
            .bind(&account.account_number)
            .bind(&account.bank_name)
            .bind(&account.bank_code)
            .bind(&account.account_holder_name)
            .bind(&account.account_holder_phone)
            .bind(&account.country_code)
            .bind(account.currency.code())
            .bind(account.is_default)
            .bind(account.is_verified)
            .bind(account.created_at)
            .bind(account.updated_at)
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
            "SELECT {} FROM bank_accounts WHERE id = $1 AND user_id = $2",
            BANK_ACCOUNT_COLUMNS
        );
        let row: Option<BankAccountRow> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
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
            "SELECT {} FROM bank_accounts WHERE user_id = $1 AND ($2::TEXT IS NULL OR country_code = $2) \
             ORDER BY is_default DESC, created_at DESC",
            BANK_ACCOUNT_COLUMNS
        );
        let rows: Vec<BankAccountRow> = sqlx::query_as(&sql)
            .bind(user_id.into_uuid())
            .bind(country_code.map(str::to_ascii_uppercase))
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
        let sql = format!(
            "UPDATE bank_accounts SET is_verified = $1, updated_at = $2 WHERE id = $3 AND user_id = $4 RETURNING {}",
            BANK_ACCOUNT_COLUMNS
        );
        let row: Option<BankAccountRow> = sqlx::query_as(&sql)
            .bind(verified)
            .bind(Utc::now())
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;
        row.ok_or(RepoError::NotFound)?.into_domain()
    }

    async fn delete_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM bank_accounts WHERE id = $1 AND user_id = $2")
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
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
        let now = Utc::now();

        sqlx::query(
            "UPDATE bank_accounts SET is_default = FALSE, updated_at = $1 WHERE user_id = $2 AND is_default",
        )
        .bind(now)
        .bind(user_id.into_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        let sql = format!(
            "UPDATE bank_accounts SET is_default = TRUE, updated_at = $1 WHERE id = $2 AND user_id = $3 RETURNING {}",
            BANK_ACCOUNT_COLUMNS
        );
        let row: Option<BankAccountRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(db_err)?;
        let account = row.ok_or(RepoError::NotFound)?.into_domain()?;

        db_tx.commit().await.map_err(tx_err)?;
        Ok(account)
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
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"#,
        )
        .bind(method.id.into_uuid())
        .bind(method.user_id.into_uuid())
        .bind(method.kind().as_str())
        .bind(to_json(&method.destination)?)
        .bind(&method.display_name)
        .bind(method.is_default)
        .bind(method.is_active)
        .bind(method.created_at)
        .bind(method.updated_at)
        .bind(method.last_used_at)
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
            "SELECT {} FROM withdrawal_methods WHERE id = $1 AND user_id = $2",
            WITHDRAWAL_METHOD_COLUMNS
        );
        let row: Option<WithdrawalMethodRow> = sqlx::query_as(&sql)
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
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
            "SELECT {} FROM withdrawal_methods WHERE user_id = $1 AND is_active \
             ORDER BY is_default DESC, last_used_at DESC NULLS LAST, created_at DESC",
            WITHDRAWAL_METHOD_COLUMNS
        );
        let rows: Vec<WithdrawalMethodRow> = sqlx::query_as(&sql)
            .bind(user_id.into_uuid())
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
        let now = Utc::now();

        sqlx::query(
            "UPDATE withdrawal_methods SET is_default = FALSE, updated_at = $1 WHERE user_id = $2 AND is_default",
        )
        .bind(now)
        .bind(user_id.into_uuid())
        .execute(&mut *db_tx)
        .await
        .map_err(db_err)?;

        let sql = format!(
            "UPDATE withdrawal_methods SET is_default = TRUE, updated_at = $1 \
             WHERE id = $2 AND user_id = $3 AND is_active RETURNING {}",
            WITHDRAWAL_METHOD_COLUMNS
        );
        let row: Option<WithdrawalMethodRow> = sqlx::query_as(&sql)
            .bind(now)
            .bind(id.into_uuid())
            .bind(user_id.into_uuid())
            .fetch_optional(&mut *db_tx)
            .await
            .map_err(db_err)?;
        let method = row.ok_or(RepoError::NotFound)?.into_domain()?;

        db_tx.commit().await.map_err(tx_err)?;
        Ok(method)
    }

    async fn touch_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<(), RepoError> {
        let result = sqlx::query(
            "UPDATE withdrawal_methods SET last_used_at = $1, updated_at = $1 WHERE id = $2 AND user_id = $3",
        )
        .bind(Utc::now())
        .bind(id.into_uuid())
        .bind(user_id.into_uuid())
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
            "UPDATE withdrawal_methods SET is_active = FALSE, is_default = FALSE, updated_at = $1 \
             WHERE id = $2 AND user_id = $3 AND is_active",
        )
        .bind(Utc::now())
        .bind(id.into_uuid())
        .bind(user_id.into_uuid())
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
