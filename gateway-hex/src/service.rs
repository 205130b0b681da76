//! Payment Orchestrator
//!
//! Ties the fee rules registry, the provider adapters and the ledger
//! together. Every money movement follows the same path: validate against
//! the registry, price it, create the `pending` record, call the adapter,
//! then advance the record through the ledger's compare-and-set update.

use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use tracing::{error, info, instrument, warn};

use fee_rules::{
    Currency, Direction, FeeRulesRegistry, MethodType, PaymentMethod, RegionConfig, deposit_fee,
    withdrawal_fee,
};
use gateway_providers::ProviderRegistry;
use gateway_types::{
    AppError, Balance, BankAccount, BankAccountId, BankAccountQuery, CancelBody,
    CreateBankAccountRequest, CreateDepositRequest, CreateOutcome, CreateWithdrawalMethodRequest,
    CreateWithdrawalRequest, DailySummary, DepositResponse, DomainError, ExternalRate,
    FeeQuoteRequest, FeeQuoteResponse, InitializePayment, LedgerRepository, MethodsQuery,
    PaymentInitialization, PaymentProvider, PayoutDestination, PayoutRecipient, PayoutRequest,
    ProviderError, ProviderReceipt, RateQuery, ReconcileReport, RefundBody,
    RefundRequest, StatusUpdate, Transaction, TransactionFilter, TransactionId, TransactionPage,
    TransactionStatus, TransactionType, TransitionPlan, UpdateBankAccountRequest, UserId,
    WebhookOutcome, WithdrawalMethodId, WithdrawalMethodPreference,
};

/// Prefix of refund records; the rest is the refunded deposit's reference.
pub const REFUND_PREFIX: &str = "RF-";

const MAX_REFERENCE_LEN: usize = 100;
const CAS_ATTEMPTS: usize = 3;
/// Used when a record's method has left the catalog.
const FALLBACK_PROCESSING_MINUTES: u32 = 30;

/// Tunables for the orchestrator.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Public base URL of this service, used to build provider callback URLs.
    pub public_url: Option<String>,
    /// A stale record is escalated once its age exceeds this many
    /// multiples of its method's processing time.
    pub escalation_factor: u32,
    /// Maximum records examined per reconciliation pass.
    pub reconcile_batch_size: u32,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            public_url: None,
            escalation_factor: 3,
            reconcile_batch_size: 50,
        }
    }
}

/// What a provider said when it accepted a payment, payout or refund.
struct Acknowledgement {
    status: TransactionStatus,
    provider_reference: String,
    response: Value,
}

impl Acknowledgement {
    fn from_initialization(init: &PaymentInitialization) -> Result<Self, AppError> {
        Ok(Self {
            status: init.acknowledged_status,
            provider_reference: init.provider_reference.clone(),
            response: to_json(init)?,
        })
    }

    fn from_receipt(receipt: ProviderReceipt) -> Self {
        Self {
            status: receipt.status,
            provider_reference: receipt.provider_reference,
            response: receipt.raw,
        }
    }
}

/// Outcome of driving a record towards a status.
enum Drive {
    Applied(Transaction),
    /// The record was already there, terminal, or has no such edge.
    NoOp(Transaction),
}

/// The payment orchestrator.
///
/// Generic over `R: LedgerRepository` - the storage adapter is injected at
/// compile time, the provider adapters at runtime through the registry.
pub struct PaymentOrchestrator<R: LedgerRepository> {
    repo: R,
    registry: Arc<FeeRulesRegistry>,
    providers: ProviderRegistry,
    settings: OrchestratorSettings,
}

impl<R: LedgerRepository> PaymentOrchestrator<R> {
    pub fn new(
        repo: R,
        registry: Arc<FeeRulesRegistry>,
        providers: ProviderRegistry,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            repo,
            registry,
            providers,
            settings,
        }
    }

    /// Returns a reference to the underlying repository.
    pub fn repo(&self) -> &R {
        &self.repo
    }

    pub fn registry(&self) -> &FeeRulesRegistry {
        &self.registry
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Catalog methods whose gateway has no registered adapter.
    pub fn unroutable_methods(&self) -> Vec<&PaymentMethod> {
        self.registry
            .methods()
            .iter()
            .filter(|m| m.gateway.as_deref().is_some_and(|g| !self.providers.contains(g)))
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registry Lookups
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn methods(&self, query: &MethodsQuery) -> Vec<PaymentMethod> {
        let methods = match query.method_type {
            Some(method_type) => self.registry.methods_by_type(&query.country, method_type),
            None => self.registry.methods_for_country(&query.country),
        };
        methods.into_iter().cloned().collect()
    }

    pub fn method(&self, id: &str) -> Result<PaymentMethod, AppError> {
        self.registry
            .method(id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Payment method {}", id)))
    }

    pub fn regions(&self) -> Vec<RegionConfig> {
        self.registry.regions().to_vec()
    }

    pub fn region(&self, country_code: &str) -> Result<RegionConfig, AppError> {
        self.registry
            .region_config(country_code)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Region {}", country_code)))
    }

    /// Prices a movement without touching the ledger.
    pub fn quote_fee(&self, req: &FeeQuoteRequest) -> Result<FeeQuoteResponse, AppError> {
        let method = self.resolve_method(&req.method_id)?;
        check_direction(method, req.direction)?;
        check_amount(method, req.amount)?;

        let (fee, total, net) = match req.direction {
            Direction::Deposit => {
                let quote = deposit_fee(req.amount, method).map_err(DomainError::from)?;
                (quote.fee, Some(quote.total), None)
            }
            Direction::Withdrawal => {
                let quote = withdrawal_fee(req.amount, method).map_err(DomainError::from)?;
                (quote.fee, None, Some(quote.net))
            }
        };
        Ok(FeeQuoteResponse {
            method_id: method.id.clone(),
            direction: req.direction,
            currency: method.currency,
            amount: req.amount,
            fee,
            total,
            net,
        })
    }

    /// Spot rate from the first adapter that quotes rates.
    #[instrument(skip(self))]
    pub async fn external_rate(&self, query: &RateQuery) -> Result<ExternalRate, AppError> {
        let source = self
            .providers
            .rates()
            .ok_or_else(|| AppError::NotFound("No exchange rate source is configured".into()))?;
        let rates = source
            .rates()
            .ok_or_else(|| AppError::Internal("Rate source lost its rate lookup".into()))?;
        let asset = query.asset.to_uppercase();
        match rates.rate(&asset, query.fiat).await {
            Ok(Some(rate)) => Ok(ExternalRate {
                asset,
                fiat: query.fiat,
                rate,
            }),
            Ok(None) => Err(AppError::NotFound(format!(
                "No rate for {}/{}",
                asset, query.fiat
            ))),
            Err(e) => Err(AppError::Upstream(e.to_string())),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Deposits & Withdrawals
    // ─────────────────────────────────────────────────────────────────────────────

    /// Starts a deposit and returns the record plus what the payer needs to
    /// finish paying.
    ///
    /// The payer is charged the grossed-up total; the record's `net_amount`
    /// is the requested amount that lands in the user's balance.
    #[instrument(skip(self, req), fields(method_id = %req.method_id, amount = %req.amount))]
    pub async fn create_deposit(
        &self,
        user_id: UserId,
        req: CreateDepositRequest,
    ) -> Result<DepositResponse, AppError> {
        let method = self.resolve_method(&req.method_id)?;
        let provider = self.provider_for(method)?;
        check_direction(method, Direction::Deposit)?;
        check_amount(method, req.amount)?;

        let caps = provider.capabilities();
        if caps.requires_email && is_blank(&req.payer.email) {
            return Err(AppError::BadRequest(format!(
                "{} deposits require the payer's email",
                method.provider_name
            )));
        }
        if caps.requires_phone && is_blank(&req.payer.phone) {
            return Err(AppError::BadRequest(format!(
                "{} deposits require the payer's phone number",
                method.provider_name
            )));
        }

        let quote = deposit_fee(req.amount, method).map_err(DomainError::from)?;
        let reference = accept_reference(req.reference_id.as_deref(), "DEP")?;

        let mut tx = Transaction::pending(
            user_id,
            reference,
            TransactionType::Deposit,
            quote.total,
            method.currency,
            quote.fee,
            Some(method.id.clone()),
            Some(provider.code().to_string()),
        );
        tx.deposit_method = Some(method.method_type);
        tx.destination_wallet = req.destination_wallet.clone();
        tx.description = req.description.clone();
        tx.metadata = req.metadata.clone().unwrap_or_else(|| json!({}));

        let tx = match self.repo.create_transaction(tx).await? {
            CreateOutcome::Created(tx) => tx,
            CreateOutcome::Existing(existing) => {
                let existing = owned_duplicate(existing, user_id, TransactionType::Deposit)?;
                info!(reference = %existing.reference_id, "Deposit reference reused; returning existing record");
                return Ok(DepositResponse::from_transaction(existing));
            }
        };
        info!(tx_id = %tx.id, reference = %tx.reference_id, gateway = provider.code(), "Deposit record created");

        // Push-style rails report the outcome to our webhook, not to a page.
        let callback_url = if method.method_type == MethodType::Mobile {
            self.webhook_url(provider.code())
        } else {
            req.callback_url.clone()
        };
        let request = InitializePayment {
            reference: tx.reference_id.clone(),
            amount: tx.amount,
            currency: tx.currency,
            callback_url,
            payer: req.payer.clone(),
            description: req.description.clone(),
            metadata: tx.metadata.clone(),
        };

        let result = match provider.initialize_payment(&request).await {
            Ok(init) => Ok(Acknowledgement::from_initialization(&init)?),
            Err(e) => Err(e),
        };
        let tx = self.record_acknowledgement(tx, result).await?;
        Ok(DepositResponse::from_transaction(tx))
    }

    /// Starts a withdrawal. The balance is debited by `amount`; the
    /// recipient receives `amount - fee`.
    #[instrument(skip(self, req), fields(method_id = %req.method_id, amount = %req.amount))]
    pub async fn create_withdrawal(
        &self,
        user_id: UserId,
        req: CreateWithdrawalRequest,
    ) -> Result<Transaction, AppError> {
        let method = self.resolve_method(&req.method_id)?;
        let provider = self.provider_for(method)?;
        check_direction(method, Direction::Withdrawal)?;
        check_amount(method, req.amount)?;

        let (destination, preference) = match (&req.destination, req.withdrawal_method_id) {
            (Some(destination), None) => (destination.clone(), None),
            (None, Some(id)) => {
                let preference = self.active_withdrawal_method(user_id, id).await?;
                (preference.destination.clone(), Some(preference.id))
            }
            _ => {
                return Err(AppError::BadRequest(
                    "Give exactly one of destination and withdrawal_method_id".into(),
                ));
            }
        };
        destination.validate()?;
        if !provider.capabilities().supports_payout_to(destination.kind()) {
            return Err(AppError::BadRequest(format!(
                "{} cannot pay out to a {} destination",
                method.provider_name,
                destination.kind()
            )));
        }
        let recipient = self.resolve_recipient(user_id, &destination, method).await?;

        let quote = withdrawal_fee(req.amount, method).map_err(DomainError::from)?;
        let reference = accept_reference(req.reference_id.as_deref(), "WD")?;

        let mut tx = Transaction::pending(
            user_id,
            reference,
            TransactionType::Withdrawal,
            req.amount,
            method.currency,
            quote.fee,
            Some(method.id.clone()),
            Some(provider.code().to_string()),
        );
        tx.payout_destination = Some(destination);
        tx.description = req.reason.clone();
        tx.metadata = req.metadata.clone().unwrap_or_else(|| json!({}));

        let tx = match self.repo.create_transaction(tx).await? {
            CreateOutcome::Created(tx) => tx,
            CreateOutcome::Existing(existing) => {
                let existing = owned_duplicate(existing, user_id, TransactionType::Withdrawal)?;
                info!(reference = %existing.reference_id, "Withdrawal reference reused; returning existing record");
                return Ok(existing);
            }
        };
        info!(tx_id = %tx.id, reference = %tx.reference_id, gateway = provider.code(), "Withdrawal record created");

        if let Some(id) = preference {
            if let Err(e) = self.repo.touch_withdrawal_method(user_id, id).await {
                warn!(withdrawal_method_id = %id, error = %e, "Failed to record withdrawal method use");
            }
        }

        let request = PayoutRequest {
            reference: tx.reference_id.clone(),
            amount: tx.net_amount,
            currency: tx.currency,
            recipient,
            reason: req.reason.clone(),
            metadata: tx.metadata.clone(),
        };
        let result = provider
            .payout(&request)
            .await
            .map(Acknowledgement::from_receipt);
        self.record_acknowledgement(tx, result).await
    }

    /// Refunds a completed deposit through its adapter.
    ///
    /// The refund is its own withdrawal record, referenced `RF-<deposit
    /// reference>`, so a repeated request returns the first refund. The
    /// refundable amount is what the deposit credited.
    #[instrument(skip(self, body))]
    pub async fn refund(
        &self,
        user_id: UserId,
        id: TransactionId,
        body: RefundBody,
    ) -> Result<Transaction, AppError> {
        let deposit = self.get_transaction(user_id, id).await?;
        if deposit.transaction_type != TransactionType::Deposit {
            return Err(AppError::BadRequest("Only deposits can be refunded".into()));
        }
        if deposit.status != TransactionStatus::Completed {
            return Err(AppError::Conflict(format!(
                "Deposit {} is {}, only completed deposits can be refunded",
                deposit.id, deposit.status
            )));
        }
        let provider = self.provider_by_code(deposit.gateway.as_deref())?;
        if !provider.capabilities().refund {
            return Err(ProviderError::Unsupported {
                provider: provider.code(),
                operation: "refund",
            }
            .into());
        }
        let provider_reference = deposit.provider_reference.clone().ok_or_else(|| {
            AppError::Conflict("Deposit has no provider reference to refund against".into())
        })?;

        let amount = body.amount.unwrap_or(deposit.net_amount);
        if amount <= Decimal::ZERO || amount > deposit.net_amount {
            return Err(AppError::BadRequest(format!(
                "Refund amount must be between 0 and {} {}",
                deposit.net_amount, deposit.currency
            )));
        }
        check_scale(deposit.currency, amount)?;

        let mut tx = Transaction::pending(
            user_id,
            format!("{}{}", REFUND_PREFIX, deposit.reference_id),
            TransactionType::Withdrawal,
            amount,
            deposit.currency,
            Decimal::ZERO,
            deposit.method_id.clone(),
            deposit.gateway.clone(),
        );
        tx.description = body.reason.clone();
        tx.metadata = json!({ "refund_of": deposit.id, "reason": body.reason });

        let tx = match self.repo.create_transaction(tx).await? {
            CreateOutcome::Created(tx) => tx,
            CreateOutcome::Existing(existing) => {
                return owned_duplicate(existing, user_id, TransactionType::Withdrawal);
            }
        };
        info!(tx_id = %tx.id, deposit_id = %deposit.id, amount = %amount, "Refund record created");

        let request = RefundRequest {
            provider_reference,
            reference: tx.reference_id.clone(),
            amount: Some(amount),
            currency: tx.currency,
        };
        let result = provider
            .refund(&request)
            .await
            .map(Acknowledgement::from_receipt);
        self.record_acknowledgement(tx, result).await
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transaction History
    // ─────────────────────────────────────────────────────────────────────────────

    /// Gets one of the user's transactions. Other users' records are
    /// reported as not found.
    pub async fn get_transaction(
        &self,
        user_id: UserId,
        id: TransactionId,
    ) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .filter(|tx| tx.user_id == user_id)
            .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))
    }

    pub async fn list_transactions(
        &self,
        user_id: UserId,
        filter: TransactionFilter,
    ) -> Result<TransactionPage, AppError> {
        if let (Some(from), Some(to)) = (filter.from, filter.to) {
            if from >= to {
                return Err(AppError::BadRequest("`from` must be before `to`".into()));
            }
        }
        self.repo
            .list_transactions(user_id, &filter)
            .await
            .map_err(Into::into)
    }

    pub async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, AppError> {
        self.repo.balances(user_id).await.map_err(Into::into)
    }

    /// Completed activity on `date`, today (UTC) when omitted.
    pub async fn daily_summary(
        &self,
        user_id: UserId,
        date: Option<NaiveDate>,
    ) -> Result<DailySummary, AppError> {
        let date = date.unwrap_or_else(|| Utc::now().date_naive());
        self.repo
            .daily_summary(user_id, date)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cancel & Verify
    // ─────────────────────────────────────────────────────────────────────────────

    /// Cancels a pending or processing record.
    ///
    /// An in-flight provider call is not retracted; its later result lands
    /// on the cancelled record as a no-op.
    #[instrument(skip(self, body))]
    pub async fn cancel(
        &self,
        user_id: UserId,
        id: TransactionId,
        body: CancelBody,
    ) -> Result<Transaction, AppError> {
        let tx = self.get_transaction(user_id, id).await?;
        let description = body
            .reason
            .unwrap_or_else(|| "Cancelled at the user's request".into());
        match self
            .drive(tx, StatusUpdate::to(TransactionStatus::Cancelled).with_description(description))
            .await?
        {
            Drive::Applied(tx) => {
                info!(tx_id = %tx.id, "Transaction cancelled");
                Ok(tx)
            }
            Drive::NoOp(tx) => Err(AppError::Conflict(format!(
                "Transaction {} is already {}",
                tx.id, tx.status
            ))),
        }
    }

    /// Polls the record's provider and applies what it reports.
    #[instrument(skip(self))]
    pub async fn verify(&self, user_id: UserId, id: TransactionId) -> Result<Transaction, AppError> {
        let tx = self.get_transaction(user_id, id).await?;
        if tx.is_terminal() {
            return Ok(tx);
        }
        match self.refresh(tx).await? {
            Drive::Applied(tx) | Drive::NoOp(tx) => Ok(tx),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhook Intake
    // ─────────────────────────────────────────────────────────────────────────────

    /// Verifies and applies one provider webhook.
    ///
    /// Signature failures are rejected before anything is read from the
    /// ledger. Every authenticated event is acknowledged, whatever it did.
    #[instrument(skip(self, signature, raw_body), fields(body_len = raw_body.len()))]
    pub async fn handle_webhook(
        &self,
        gateway: &str,
        signature: Option<&str>,
        raw_body: &[u8],
    ) -> Result<WebhookOutcome, AppError> {
        let provider = self
            .providers
            .get(gateway)
            .ok_or_else(|| AppError::NotFound(format!("Gateway {}", gateway)))?;

        let verified = signature.is_some_and(|sig| provider.verify_webhook_signature(raw_body, sig));
        if !verified {
            warn!(
                gateway,
                header = provider.signature_header(),
                signature_present = signature.is_some(),
                "Rejected webhook with invalid signature"
            );
            return Err(AppError::Unauthorized("Invalid webhook signature".into()));
        }

        let note = match provider.parse_webhook(raw_body) {
            Ok(note) => note,
            Err(e) => {
                warn!(gateway, error = %e, "Authenticated webhook could not be parsed");
                return Ok(WebhookOutcome::Ignored);
            }
        };
        let Some(status) = note.status else {
            info!(gateway, event = %note.event, "Webhook event does not move any record");
            return Ok(WebhookOutcome::Ignored);
        };

        let located = self
            .locate(gateway, note.reference.as_deref(), note.provider_reference.as_deref())
            .await?;
        let tx = match located {
            Some(tx) if tx.gateway.as_deref() == Some(gateway) => tx,
            Some(tx) => {
                warn!(gateway, tx_id = %tx.id, recorded_gateway = ?tx.gateway, "Webhook names a record owned by another gateway");
                return Ok(WebhookOutcome::UnknownReference);
            }
            None => {
                warn!(gateway, reference = ?note.reference, provider_reference = ?note.provider_reference, "Webhook for unknown reference");
                return Ok(WebhookOutcome::UnknownReference);
            }
        };

        let mut update = settlement_update(
            &tx,
            gateway,
            status,
            note.amount,
            note.currency,
            None,
        )
        .with_processor_response(json!({ "event": note.event, "payload": note.payload }));
        if tx.provider_reference.is_none() {
            if let Some(reference) = note.provider_reference {
                update = update.with_provider_reference(reference);
            }
        }

        match self.drive(tx, update).await? {
            Drive::Applied(tx) => {
                info!(gateway, tx_id = %tx.id, status = %tx.status, "Webhook applied");
                Ok(WebhookOutcome::Applied)
            }
            Drive::NoOp(tx) => {
                info!(gateway, tx_id = %tx.id, status = %tx.status, "Duplicate webhook ignored");
                Ok(WebhookOutcome::Duplicate)
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────────────

    /// One pass over stale pending and processing records.
    ///
    /// A record is stale once it is older than its method's processing
    /// time. Each stale record is polled at its provider; records that stay
    /// unresolved past the escalation threshold are flagged for manual
    /// follow-up, once.
    #[instrument(skip(self))]
    pub async fn reconcile(&self) -> Result<ReconcileReport, AppError> {
        let now = Utc::now();
        let shortest = self
            .registry
            .methods()
            .iter()
            .map(|m| m.processing_time_minutes)
            .min()
            .unwrap_or(FALLBACK_PROCESSING_MINUTES);
        let candidates = self
            .repo
            .list_non_terminal(
                now - Duration::minutes(i64::from(shortest)),
                self.settings.reconcile_batch_size,
            )
            .await?;

        let mut report = ReconcileReport::default();
        for tx in candidates {
            let processing = Duration::minutes(i64::from(self.processing_minutes(&tx)));
            let age = now - tx.created_at;
            if age < processing {
                continue;
            }
            report.examined += 1;
            let overdue = escalation_threshold(processing, self.settings.escalation_factor)
                .is_some_and(|threshold| age >= threshold);

            let unresolved = match self.reconcile_one(tx, now).await {
                Ok((Drive::Applied(tx), _)) => {
                    info!(tx_id = %tx.id, status = %tx.status, "Reconciled stale record");
                    report.resolved += 1;
                    continue;
                }
                Ok((Drive::NoOp(tx), _)) if tx.is_terminal() => {
                    report.resolved += 1;
                    continue;
                }
                Ok((Drive::NoOp(tx), reason)) => (tx, reason, false),
                Err((tx, e)) => {
                    warn!(tx_id = %tx.id, error = %e, "Reconciliation could not reach the provider");
                    let reason = e.to_string();
                    (tx, reason, true)
                }
            };

            let (tx, reason, errored) = unresolved;
            if overdue && !is_escalated(&tx) {
                match self.escalate(&tx, age, &reason).await {
                    Ok(()) => report.escalated += 1,
                    Err(e) => {
                        error!(tx_id = %tx.id, error = %e, "Failed to escalate transaction");
                        report.errors += 1;
                    }
                }
            } else if errored {
                report.errors += 1;
            } else {
                report.still_pending += 1;
            }
        }

        info!(
            examined = report.examined,
            resolved = report.resolved,
            escalated = report.escalated,
            still_pending = report.still_pending,
            errors = report.errors,
            "Reconciliation pass finished"
        );
        Ok(report)
    }

    /// Resolves one stale record. On success also returns why the record
    /// is still open, for the escalation note.
    async fn reconcile_one(
        &self,
        tx: Transaction,
        now: DateTime<Utc>,
    ) -> Result<(Drive, String), (Transaction, AppError)> {
        if tx.provider_reference.is_none() {
            let reason = "Provider never acknowledged the request".to_string();
            return Ok((Drive::NoOp(tx), reason));
        }
        match self.refresh(tx.clone()).await {
            Ok(drive) => Ok((drive, "Provider still reports the payment as open".into())),
            Err(RefreshError::Provider(ProviderError::Unsupported { .. })) => {
                // Rails without a status call settle by webhook or expire.
                match initialization_expiry(&tx) {
                    Some(expires_at) if expires_at <= now => {
                        let update = StatusUpdate::to(TransactionStatus::Failed)
                            .with_description("Expired without confirmation");
                        let drive = self.drive(tx.clone(), update).await.map_err(|e| (tx, e))?;
                        Ok((drive, String::new()))
                    }
                    _ => Ok((Drive::NoOp(tx), "Awaiting confirmation from the provider".into())),
                }
            }
            Err(e) => Err((tx, e.into())),
        }
    }

    async fn escalate(
        &self,
        tx: &Transaction,
        age: Duration,
        reason: &str,
    ) -> Result<(), AppError> {
        let mut metadata = tx.metadata.clone();
        if !metadata.is_object() {
            metadata = json!({});
        }
        metadata["escalated"] = json!(true);
        metadata["escalated_at"] = json!(Utc::now());
        let description = format!(
            "Escalated for manual review after {} minutes: {}",
            age.num_minutes(),
            reason
        );
        warn!(tx_id = %tx.id, reference = %tx.reference_id, status = %tx.status, %reason, "Escalating unresolved transaction");
        self.repo
            .annotate_transaction(tx.id, &description, metadata)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Bank Accounts
    // ─────────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, req))]
    pub async fn create_bank_account(
        &self,
        user_id: UserId,
        req: CreateBankAccountRequest,
    ) -> Result<BankAccount, AppError> {
        let account = BankAccount::new(user_id, req)?;
        let account = self.repo.create_bank_account(account).await?;
        info!(bank_account_id = %account.id, number = %account.masked_number(), "Bank account saved");
        Ok(account)
    }

    pub async fn list_bank_accounts(
        &self,
        user_id: UserId,
        query: BankAccountQuery,
    ) -> Result<Vec<BankAccount>, AppError> {
        self.repo
            .list_bank_accounts(user_id, query.country.as_deref())
            .await
            .map_err(Into::into)
    }

    pub async fn get_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<BankAccount, AppError> {
        self.repo
            .get_bank_account(user_id, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Bank account {}", id)))
    }

    pub async fn update_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
        req: UpdateBankAccountRequest,
    ) -> Result<BankAccount, AppError> {
        self.repo
            .set_bank_account_verified(user_id, id, req.is_verified)
            .await
            .map_err(Into::into)
    }

    pub async fn delete_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<(), AppError> {
        self.repo
            .delete_bank_account(user_id, id)
            .await
            .map_err(Into::into)
    }

    pub async fn set_default_bank_account(
        &self,
        user_id: UserId,
        id: BankAccountId,
    ) -> Result<BankAccount, AppError> {
        self.repo
            .set_default_bank_account(user_id, id)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Withdrawal Methods
    // ─────────────────────────────────────────────────────────────────────────────

    #[instrument(skip(self, req))]
    pub async fn create_withdrawal_method(
        &self,
        user_id: UserId,
        req: CreateWithdrawalMethodRequest,
    ) -> Result<WithdrawalMethodPreference, AppError> {
        if let PayoutDestination::BankAccount { bank_account_id } = &req.destination {
            self.get_bank_account(user_id, *bank_account_id).await?;
        }
        let make_default = req.make_default;
        let method = WithdrawalMethodPreference::new(user_id, req)?;
        let method = self.repo.create_withdrawal_method(method).await?;
        info!(withdrawal_method_id = %method.id, kind = %method.kind(), "Withdrawal method saved");
        if make_default {
            return self.set_default_withdrawal_method(user_id, method.id).await;
        }
        Ok(method)
    }

    /// Active preferences, default first, then most recently used.
    pub async fn list_withdrawal_methods(
        &self,
        user_id: UserId,
    ) -> Result<Vec<WithdrawalMethodPreference>, AppError> {
        self.repo
            .list_withdrawal_methods(user_id)
            .await
            .map_err(Into::into)
    }

    pub async fn set_default_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<WithdrawalMethodPreference, AppError> {
        self.repo
            .set_default_withdrawal_method(user_id, id)
            .await
            .map_err(Into::into)
    }

    pub async fn deactivate_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<(), AppError> {
        self.repo
            .deactivate_withdrawal_method(user_id, id)
            .await
            .map_err(Into::into)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────────

    fn resolve_method(&self, id: &str) -> Result<&PaymentMethod, AppError> {
        self.registry
            .method(id)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown payment method: {}", id)))
    }

    /// Method → gateway code → adapter.
    fn provider_for(&self, method: &PaymentMethod) -> Result<Arc<dyn PaymentProvider>, AppError> {
        let gateway = method.gateway.as_deref().ok_or_else(|| {
            AppError::BadRequest(format!("Payment method {} is not routable", method.id))
        })?;
        self.provider_by_code(Some(gateway))
    }

    fn provider_by_code(&self, gateway: Option<&str>) -> Result<Arc<dyn PaymentProvider>, AppError> {
        let gateway = gateway
            .ok_or_else(|| AppError::Internal("Record has no gateway".into()))?;
        self.providers.get(gateway).ok_or_else(|| {
            ProviderError::Configuration(format!("gateway {} has no registered adapter", gateway))
                .into()
        })
    }

    fn webhook_url(&self, gateway: &str) -> Option<String> {
        self.settings
            .public_url
            .as_deref()
            .map(|base| format!("{}/api/webhooks/{}", base.trim_end_matches('/'), gateway))
    }

    fn processing_minutes(&self, tx: &Transaction) -> u32 {
        tx.method_id
            .as_deref()
            .and_then(|id| self.registry.method(id))
            .map(|m| m.processing_time_minutes)
            .unwrap_or(FALLBACK_PROCESSING_MINUTES)
    }

    async fn active_withdrawal_method(
        &self,
        user_id: UserId,
        id: WithdrawalMethodId,
    ) -> Result<WithdrawalMethodPreference, AppError> {
        self.repo
            .get_withdrawal_method(user_id, id)
            .await?
            .filter(|m| m.is_active)
            .ok_or_else(|| AppError::BadRequest(format!("Unknown withdrawal method: {}", id)))
    }

    async fn resolve_recipient(
        &self,
        user_id: UserId,
        destination: &PayoutDestination,
        method: &PaymentMethod,
    ) -> Result<PayoutRecipient, AppError> {
        match destination {
            PayoutDestination::BankAccount { bank_account_id } => {
                let account = self
                    .repo
                    .get_bank_account(user_id, *bank_account_id)
                    .await?
                    .ok_or_else(|| {
                        AppError::BadRequest(format!("Unknown bank account: {}", bank_account_id))
                    })?;
                if account.currency != method.currency {
                    return Err(AppError::BadRequest(format!(
                        "Bank account holds {}, method pays out {}",
                        account.currency, method.currency
                    )));
                }
                Ok(PayoutRecipient::BankAccount {
                    account_number: account.account_number,
                    bank_code: account.bank_code,
                    bank_name: account.bank_name,
                    account_name: account.account_name,
                    country_code: account.country_code,
                })
            }
            PayoutDestination::MobileMoney { phone, provider } => Ok(PayoutRecipient::MobileMoney {
                phone: phone.clone(),
                provider: provider.clone(),
            }),
            PayoutDestination::Username { .. } | PayoutDestination::Email { .. } => {
                Err(AppError::BadRequest(format!(
                    "Payouts to {} destinations are not supported",
                    destination.kind()
                )))
            }
        }
    }

    async fn locate(
        &self,
        gateway: &str,
        reference: Option<&str>,
        provider_reference: Option<&str>,
    ) -> Result<Option<Transaction>, AppError> {
        if let Some(reference) = reference {
            if let Some(tx) = self.repo.find_by_reference(reference).await? {
                return Ok(Some(tx));
            }
        }
        match provider_reference {
            Some(provider_reference) => self
                .repo
                .find_by_provider_reference(gateway, provider_reference)
                .await
                .map_err(Into::into),
            None => Ok(None),
        }
    }

    /// Applies an adapter's answer to a freshly created record.
    ///
    /// Indeterminate failures leave the record open for reconciliation;
    /// explicit ones fail it. Either way the caller sees the error.
    async fn record_acknowledgement(
        &self,
        tx: Transaction,
        result: Result<Acknowledgement, ProviderError>,
    ) -> Result<Transaction, AppError> {
        let ack = match result {
            Ok(ack) => ack,
            Err(e) if e.is_indeterminate() => {
                warn!(tx_id = %tx.id, error = %e, "Provider outcome unknown; leaving record open");
                let description = format!("Awaiting provider confirmation: {}", e);
                self.repo
                    .annotate_transaction(tx.id, &description, tx.metadata.clone())
                    .await?;
                return Err(e.into());
            }
            Err(e) => {
                warn!(tx_id = %tx.id, error = %e, "Provider refused the request");
                let update = StatusUpdate::to(TransactionStatus::Failed)
                    .with_description(e.to_string())
                    .with_processor_response(json!({ "error": e.to_string() }));
                self.drive(tx, update).await?;
                return Err(e.into());
            }
        };

        let update = StatusUpdate::to(ack.status)
            .with_provider_reference(ack.provider_reference)
            .with_processor_response(ack.response);
        if ack.status == tx.status {
            // Same status: only the provider fields change.
            let current = tx.status;
            return match self.repo.transition_status(tx.id, current, update).await? {
                Some(tx) => Ok(tx),
                None => self.reload(tx.id).await,
            };
        }
        match self.drive(tx, update).await? {
            Drive::Applied(tx) => {
                info!(tx_id = %tx.id, status = %tx.status, "Provider acknowledged");
                Ok(tx)
            }
            Drive::NoOp(tx) => Ok(tx),
        }
    }

    /// Polls the provider for an open record and drives it to what the
    /// provider reports.
    async fn refresh(&self, tx: Transaction) -> Result<Drive, RefreshError> {
        let provider = self
            .provider_by_code(tx.gateway.as_deref())
            .map_err(RefreshError::App)?;
        let reference = tx.provider_reference.clone().ok_or_else(|| {
            RefreshError::App(AppError::Conflict(
                "Provider has not acknowledged this transaction yet".into(),
            ))
        })?;

        let payment = if tx.transaction_type.is_credit() {
            provider.verify_payment(&reference).await
        } else if is_refund(&tx) {
            provider.verify_refund(&reference).await
        } else {
            provider.verify_payout(&reference).await
        }
        .map_err(RefreshError::Provider)?;

        let update = settlement_update(
            &tx,
            provider.code(),
            payment.status,
            payment.amount,
            payment.currency,
            payment.description.clone(),
        )
        .with_processor_response(to_json(&payment).map_err(RefreshError::App)?);
        self.drive(tx, update).await.map_err(RefreshError::App)
    }

    /// Compare-and-set towards `update.status`, re-reading on a lost race.
    async fn drive(&self, mut tx: Transaction, update: StatusUpdate) -> Result<Drive, AppError> {
        for _ in 0..CAS_ATTEMPTS {
            if tx.plan(update.status) == TransitionPlan::NoOp {
                return Ok(Drive::NoOp(tx));
            }
            match self
                .repo
                .transition_status(tx.id, tx.status, update.clone())
                .await?
            {
                Some(updated) => return Ok(Drive::Applied(updated)),
                None => tx = self.reload(tx.id).await?,
            }
        }
        Err(AppError::Conflict(format!(
            "Transaction {} is being updated concurrently",
            tx.id
        )))
    }

    async fn reload(&self, id: TransactionId) -> Result<Transaction, AppError> {
        self.repo
            .get_transaction(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Transaction {}", id)))
    }
}

/// Failure of a provider poll, keeping the provider error typed so the
/// reconciler can tell unsupported rails apart.
enum RefreshError {
    Provider(ProviderError),
    App(AppError),
}

impl From<RefreshError> for AppError {
    fn from(err: RefreshError) -> Self {
        match err {
            RefreshError::Provider(e) => e.into(),
            RefreshError::App(e) => e,
        }
    }
}

/// Builds the update for a provider-reported status. A completion whose
/// amount or currency disagrees with the record fails it instead.
fn settlement_update(
    tx: &Transaction,
    gateway: &str,
    status: TransactionStatus,
    amount: Option<Decimal>,
    currency: Option<Currency>,
    provider_description: Option<String>,
) -> StatusUpdate {
    if status == TransactionStatus::Completed {
        let expected = expected_provider_amount(tx);
        let amount_differs = amount.is_some_and(|a| a != expected);
        let currency_differs = currency.is_some_and(|c| c != tx.currency);
        if amount_differs || currency_differs {
            warn!(
                tx_id = %tx.id,
                gateway,
                reported_amount = ?amount,
                reported_currency = ?currency,
                %expected,
                "Provider settlement does not match the record"
            );
            return StatusUpdate::to(TransactionStatus::Failed).with_description(format!(
                "Settlement mismatch: {} reported {} {}, expected {} {}",
                gateway,
                amount.map(|a| a.to_string()).unwrap_or_else(|| "?".into()),
                currency.map(|c| c.code()).unwrap_or("?"),
                expected,
                tx.currency
            ));
        }
    }
    let description = match status {
        TransactionStatus::Completed => format!("Confirmed by {}", gateway),
        TransactionStatus::Failed => provider_description
            .unwrap_or_else(|| format!("Declined by {}", gateway)),
        TransactionStatus::Cancelled => format!("Cancelled at {}", gateway),
        TransactionStatus::Pending | TransactionStatus::Processing => {
            format!("Awaiting settlement at {}", gateway)
        }
    };
    StatusUpdate::to(status).with_description(description)
}

/// The amount the provider moves for a record: the charged total for
/// credits, the paid-out net for debits.
fn expected_provider_amount(tx: &Transaction) -> Decimal {
    if tx.transaction_type.is_credit() {
        tx.amount
    } else {
        tx.net_amount
    }
}

fn initialization_expiry(tx: &Transaction) -> Option<DateTime<Utc>> {
    tx.processor_response
        .clone()
        .and_then(|v| serde_json::from_value::<PaymentInitialization>(v).ok())
        .and_then(|init| init.expires_at)
}

/// Age past which an unresolved record is escalated. `None` when the
/// threshold does not fit a duration, which means never.
fn escalation_threshold(processing: Duration, factor: u32) -> Option<Duration> {
    let factor = i32::try_from(factor.max(1)).ok()?;
    processing.checked_mul(factor)
}

/// Refund records carry the reserved reference prefix, which callers
/// cannot use for their own records.
fn is_refund(tx: &Transaction) -> bool {
    tx.reference_id.starts_with(REFUND_PREFIX)
}

fn is_escalated(tx: &Transaction) -> bool {
    tx.metadata
        .get("escalated")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn check_direction(method: &PaymentMethod, direction: Direction) -> Result<(), AppError> {
    if method.supports(direction) {
        return Ok(());
    }
    let what = match direction {
        Direction::Deposit => "deposits",
        Direction::Withdrawal => "withdrawals",
    };
    Err(AppError::BadRequest(format!(
        "Payment method {} does not support {}",
        method.id, what
    )))
}

fn check_amount(method: &PaymentMethod, amount: Decimal) -> Result<(), AppError> {
    if amount <= Decimal::ZERO {
        return Err(AppError::BadRequest("Amount must be positive".into()));
    }
    if !method.accepts_amount(amount) {
        return Err(AppError::BadRequest(format!(
            "Amount {} {} is outside the limits of {} ({} to {})",
            amount, method.currency, method.id, method.min_amount, method.max_amount
        )));
    }
    check_scale(method.currency, amount)
}

fn check_scale(currency: Currency, amount: Decimal) -> Result<(), AppError> {
    if amount.normalize().scale() > currency.decimal_places() {
        return Err(AppError::BadRequest(format!(
            "{} amounts allow at most {} decimal places",
            currency,
            currency.decimal_places()
        )));
    }
    Ok(())
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

/// Validates a caller-supplied reference or generates `<PREFIX>-<millis>-<8 hex>`.
fn accept_reference(supplied: Option<&str>, prefix: &str) -> Result<String, AppError> {
    let Some(reference) = supplied else {
        return Ok(generate_reference(prefix));
    };
    let reference = reference.trim();
    if reference.is_empty() || reference.len() > MAX_REFERENCE_LEN {
        return Err(AppError::BadRequest(format!(
            "reference_id must be 1 to {} characters",
            MAX_REFERENCE_LEN
        )));
    }
    if reference.starts_with(REFUND_PREFIX) {
        return Err(AppError::BadRequest(format!(
            "reference_id prefix {} is reserved for refunds",
            REFUND_PREFIX
        )));
    }
    Ok(reference.to_string())
}

pub fn generate_reference(prefix: &str) -> String {
    format!(
        "{}-{}-{:08x}",
        prefix,
        Utc::now().timestamp_millis(),
        rand::random::<u32>()
    )
}

/// An existing record under a reused reference is only handed back to the
/// user who created it, and only for the same kind of request.
fn owned_duplicate(
    existing: Transaction,
    user_id: UserId,
    kind: TransactionType,
) -> Result<Transaction, AppError> {
    if existing.user_id != user_id || existing.transaction_type != kind {
        return Err(DomainError::ReferenceConflict(existing.reference_id).into());
    }
    Ok(existing)
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| AppError::Internal(e.to_string()))
}
