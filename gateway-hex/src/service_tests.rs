//! PaymentOrchestrator unit tests.

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use chrono::{DateTime, Duration, NaiveDate, Utc};
    use hmac::{Hmac, Mac};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use sha2::Sha256;

    use fee_rules::{Currency, FeeRulesRegistry, FeeSchedule, MethodType, PaymentMethod};
    use gateway_providers::ProviderRegistry;
    use gateway_types::{
        AppError, Balance, BankAccount, BankAccountId, CancelBody, CreateDepositRequest,
        CreateOutcome, CreateWithdrawalMethodRequest, CreateWithdrawalRequest, DailySummary,
        DomainError, InitializePayment, LedgerRepository, PayerDetails, PaymentInitialization,
        PaymentProvider, PayoutDestination, PayoutRequest, ProcessorPayment,
        ProviderCapabilities, ProviderError, ProviderReceipt, RefundBody, RefundRequest,
        RepoError, StatusUpdate, Transaction, TransactionFilter, TransactionId, TransactionPage,
        TransactionStatus, TransactionType, UserId, WebhookNotification, WebhookOutcome,
        WithdrawalMethodId, WithdrawalMethodKind, WithdrawalMethodPreference,
    };

    use crate::{OrchestratorSettings, PaymentOrchestrator};

    // ─────────────────────────────────────────────────────────────────────────────
    // In-memory ledger
    // ─────────────────────────────────────────────────────────────────────────────

    /// Simple in-memory ledger for testing the orchestrator.
    pub struct MockRepo {
        transactions: Mutex<Vec<Transaction>>,
        bank_accounts: Mutex<Vec<BankAccount>>,
        withdrawal_methods: Mutex<Vec<WithdrawalMethodPreference>>,
    }

    impl MockRepo {
        pub fn new() -> Self {
            Self {
                transactions: Mutex::new(Vec::new()),
                bank_accounts: Mutex::new(Vec::new()),
                withdrawal_methods: Mutex::new(Vec::new()),
            }
        }

        /// Stores a record as is, bypassing the funds check.
        pub fn seed(&self, tx: Transaction) {
            self.transactions.lock().unwrap().push(tx);
        }

        pub fn count(&self) -> usize {
            self.transactions.lock().unwrap().len()
        }

        pub fn backdate(&self, id: TransactionId, minutes: i64) {
            let mut txs = self.transactions.lock().unwrap();
            let tx = txs.iter_mut().find(|t| t.id == id).unwrap();
            tx.created_at -= Duration::minutes(minutes);
        }
    }

    #[async_trait]
    impl LedgerRepository for MockRepo {
        async fn create_transaction(&self, tx: Transaction) -> Result<CreateOutcome, RepoError> {
            let mut txs = self.transactions.lock().unwrap();
            if let Some(existing) = txs.iter().find(|t| t.reference_id == tx.reference_id) {
                return Ok(CreateOutcome::Existing(existing.clone()));
            }
            if tx.debit_amount() > Decimal::ZERO {
                let mut balance = Balance::zero(tx.currency);
                txs.iter()
                    .filter(|t| t.user_id == tx.user_id && t.currency == tx.currency)
                    .for_each(|t| balance.apply(t));
                if balance.available < tx.debit_amount() {
                    return Err(RepoError::Domain(DomainError::InsufficientFunds {
                        available: balance.available,
                        requested: tx.debit_amount(),
                        currency: tx.currency,
                    }));
                }
            }
            txs.push(tx.clone());
            Ok(CreateOutcome::Created(tx))
        }

        async fn get_transaction(
            &self,
            id: TransactionId,
        ) -> Result<Option<Transaction>, RepoError> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.id == id)
                .cloned())
        }

        async fn find_by_reference(
            &self,
            reference_id: &str,
        ) -> Result<Option<Transaction>, RepoError> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| t.reference_id == reference_id)
                .cloned())
        }

        async fn find_by_provider_reference(
            &self,
            gateway: &str,
            provider_reference: &str,
        ) -> Result<Option<Transaction>, RepoError> {
            Ok(self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .find(|t| {
                    t.gateway.as_deref() == Some(gateway)
                        && t.provider_reference.as_deref() == Some(provider_reference)
                })
                .cloned())
        }

        async fn list_transactions(
            &self,
            user_id: UserId,
            filter: &TransactionFilter,
        ) -> Result<TransactionPage, RepoError> {
            let mut matching: Vec<Transaction> = self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.user_id == user_id && filter.matches(t))
                .cloned()
                .collect();
            matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
            let total = matching.len() as u64;
            let transactions = matching
                .into_iter()
                .skip(filter.offset() as usize)
                .take(filter.limit() as usize)
                .collect();
            Ok(TransactionPage {
                transactions,
                total,
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
            let mut txs = self.transactions.lock().unwrap();
            let tx = txs.iter_mut().find(|t| t.id == id).ok_or(RepoError::NotFound)?;
            if tx.status != expected {
                return Ok(None);
            }
            update.apply_to(tx, Utc::now());
            Ok(Some(tx.clone()))
        }

        async fn annotate_transaction(
            &self,
            id: TransactionId,
            description: &str,
            metadata: serde_json::Value,
        ) -> Result<(), RepoError> {
            let mut txs = self.transactions.lock().unwrap();
            let tx = txs.iter_mut().find(|t| t.id == id).ok_or(RepoError::NotFound)?;
            tx.description = Some(description.to_string());
            tx.metadata = metadata;
            tx.updated_at = Utc::now();
            Ok(())
        }

        async fn list_non_terminal(
            &self,
            created_before: DateTime<Utc>,
            limit: u32,
        ) -> Result<Vec<Transaction>, RepoError> {
            let mut stale: Vec<Transaction> = self
                .transactions
                .lock()
                .unwrap()
                .iter()
                .filter(|t| !t.is_terminal() && t.created_at < created_before)
                .cloned()
                .collect();
            stale.sort_by_key(|t| (t.metadata["escalated"] == json!(true), t.created_at));
            stale.truncate(limit as usize);
            Ok(stale)
        }

        async fn balances(&self, user_id: UserId) -> Result<Vec<Balance>, RepoError> {
            let txs = self.transactions.lock().unwrap();
            Ok(Balance::from_transactions(
                txs.iter().filter(|t| t.user_id == user_id),
            ))
        }

        async fn daily_summary(
            &self,
            user_id: UserId,
            date: NaiveDate,
        ) -> Result<DailySummary, RepoError> {
            let txs = self.transactions.lock().unwrap();
            Ok(DailySummary::from_transactions(
                date,
                txs.iter().filter(|t| t.user_id == user_id),
            ))
        }

        async fn create_bank_account(
            &self,
            account: BankAccount,
        ) -> Result<BankAccount, RepoError> {
            self.bank_accounts.lock().unwrap().push(account.clone());
            Ok(account)
        }

        async fn get_bank_account(
            &self,
            user_id: UserId,
            id: BankAccountId,
        ) -> Result<Option<BankAccount>, RepoError> {
            Ok(self
                .bank_accounts
                .lock()
                .unwrap()
                .iter()
                .find(|a| a.id == id && a.user_id == user_id)
                .cloned())
        }

        async fn list_bank_accounts(
            &self,
            user_id: UserId,
            country_code: Option<&str>,
        ) -> Result<Vec<BankAccount>, RepoError> {
            Ok(self
                .bank_accounts
                .lock()
                .unwrap()
                .iter()
                .filter(|a| a.user_id == user_id)
                .filter(|a| country_code.is_none_or(|c| a.country_code.eq_ignore_ascii_case(c)))
                .cloned()
                .collect())
        }

        async fn set_bank_account_verified(
            &self,
            user_id: UserId,
            id: BankAccountId,
            verified: bool,
        ) -> Result<BankAccount, RepoError> {
            let mut accounts = self.bank_accounts.lock().unwrap();
            let account = accounts
                .iter_mut()
                .find(|a| a.id == id && a.user_id == user_id)
                .ok_or(RepoError::NotFound)?;
            account.is_verified = verified;
            Ok(account.clone())
        }

        async fn delete_bank_account(
            &self,
            user_id: UserId,
            id: BankAccountId,
        ) -> Result<(), RepoError> {
            let mut accounts = self.bank_accounts.lock().unwrap();
            let before = accounts.len();
            accounts.retain(|a| !(a.id == id && a.user_id == user_id));
            if accounts.len() == before {
                return Err(RepoError::NotFound);
            }
            Ok(())
        }

        async fn set_default_bank_account(
            &self,
            user_id: UserId,
            id: BankAccountId,
        ) -> Result<BankAccount, RepoError> {
            let mut accounts = self.bank_accounts.lock().unwrap();
            if !accounts.iter().any(|a| a.id == id && a.user_id == user_id) {
                return Err(RepoError::NotFound);
            }
            for account in accounts.iter_mut().filter(|a| a.user_id == user_id) {
                account.is_default = account.id == id;
            }
            Ok(accounts.iter().find(|a| a.id == id).cloned().unwrap())
        }

        async fn create_withdrawal_method(
            &self,
            method: WithdrawalMethodPreference,
        ) -> Result<WithdrawalMethodPreference, RepoError> {
            self.withdrawal_methods.lock().unwrap().push(method.clone());
            Ok(method)
        }

        async fn get_withdrawal_method(
            &self,
            user_id: UserId,
            id: WithdrawalMethodId,
        ) -> Result<Option<WithdrawalMethodPreference>, RepoError> {
            Ok(self
                .withdrawal_methods
                .lock()
                .unwrap()
                .iter()
                .find(|m| m.id == id && m.user_id == user_id)
                .cloned())
        }

        async fn list_withdrawal_methods(
            &self,
            user_id: UserId,
        ) -> Result<Vec<WithdrawalMethodPreference>, RepoError> {
            let mut methods: Vec<_> = self
                .withdrawal_methods
                .lock()
                .unwrap()
                .iter()
                .filter(|m| m.user_id == user_id && m.is_active)
                .cloned()
                .collect();
            methods.sort_by(|a, b| {
                b.is_default
                    .cmp(&a.is_default)
                    .then(b.last_used_at.cmp(&a.last_used_at))
            });
            Ok(methods)
        }

        async fn set_default_withdrawal_method(
            &self,
            user_id: UserId,
            id: WithdrawalMethodId,
        ) -> Result<WithdrawalMethodPreference, RepoError> {
            let mut methods = self.withdrawal_methods.lock().unwrap();
            if !methods
                .iter()
                .any(|m| m.id == id && m.user_id == user_id && m.is_active)
            {
                return Err(RepoError::NotFound);
            }
            for method in methods.iter_mut().filter(|m| m.user_id == user_id) {
                method.is_default = method.id == id;
            }
            Ok(methods.iter().find(|m| m.id == id).cloned().unwrap())
        }

        async fn touch_withdrawal_method(
            &self,
            user_id: UserId,
            id: WithdrawalMethodId,
        ) -> Result<(), RepoError> {
            let mut methods = self.withdrawal_methods.lock().unwrap();
            let method = methods
                .iter_mut()
                .find(|m| m.id == id && m.user_id == user_id)
                .ok_or(RepoError::NotFound)?;
            method.last_used_at = Some(Utc::now());
            Ok(())
        }

        async fn deactivate_withdrawal_method(
            &self,
            user_id: UserId,
            id: WithdrawalMethodId,
        ) -> Result<(), RepoError> {
            let mut methods = self.withdrawal_methods.lock().unwrap();
            let method = methods
                .iter_mut()
                .find(|m| m.id == id && m.user_id == user_id)
                .ok_or(RepoError::NotFound)?;
            method.is_active = false;
            method.is_default = false;
            Ok(())
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Scripted provider
    // ─────────────────────────────────────────────────────────────────────────────

    const WEBHOOK_SECRET: &[u8] = b"whsec_test";

    /// How the mock answers a call that starts a money movement.
    #[derive(Debug, Clone, Copy)]
    pub enum Reply {
        Accept,
        Timeout,
        Reject,
    }

    impl Reply {
        fn error(self) -> Option<ProviderError> {
            match self {
                Reply::Accept => None,
                Reply::Timeout => Some(ProviderError::Timeout("30s elapsed".into())),
                Reply::Reject => Some(ProviderError::Rejected("Declined by issuer".into())),
            }
        }
    }

    pub struct MockProvider {
        reply: Mutex<Reply>,
        /// What a status poll reports; `None` simulates an outage.
        verification: Mutex<Option<(TransactionStatus, Option<Decimal>)>>,
        /// What a refund status poll reports, kept apart from payments.
        refund_verification: Mutex<Option<(TransactionStatus, Option<Decimal>)>>,
        initializations: Mutex<Vec<InitializePayment>>,
        payouts: Mutex<Vec<PayoutRequest>>,
        refunds: Mutex<Vec<RefundRequest>>,
    }

    impl MockProvider {
        pub fn new() -> Self {
            Self {
                reply: Mutex::new(Reply::Accept),
                verification: Mutex::new(None),
                refund_verification: Mutex::new(None),
                initializations: Mutex::new(Vec::new()),
                payouts: Mutex::new(Vec::new()),
                refunds: Mutex::new(Vec::new()),
            }
        }

        pub fn reply_with(&self, reply: Reply) {
            *self.reply.lock().unwrap() = reply;
        }

        pub fn report(&self, status: TransactionStatus, amount: Option<Decimal>) {
            *self.verification.lock().unwrap() = Some((status, amount));
        }

        pub fn report_refund(&self, status: TransactionStatus, amount: Option<Decimal>) {
            *self.refund_verification.lock().unwrap() = Some((status, amount));
        }

        pub fn sign(body: &[u8]) -> String {
            let mut mac = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET).unwrap();
            mac.update(body);
            hex::encode(mac.finalize().into_bytes())
        }
    }

    #[async_trait]
    impl PaymentProvider for MockProvider {
        fn code(&self) -> &'static str {
            "mock"
        }

        fn capabilities(&self) -> ProviderCapabilities {
            ProviderCapabilities {
                refund: true,
                payout: true,
                requires_email: true,
                requires_phone: false,
                payout_kinds: vec![
                    WithdrawalMethodKind::BankAccount,
                    WithdrawalMethodKind::MobileMoney,
                ],
            }
        }

        fn signature_header(&self) -> &'static str {
            "x-mock-signature"
        }

        async fn initialize_payment(
            &self,
            req: &InitializePayment,
        ) -> Result<PaymentInitialization, ProviderError> {
            self.initializations.lock().unwrap().push(req.clone());
            if let Some(e) = self.reply.lock().unwrap().error() {
                return Err(e);
            }
            Ok(PaymentInitialization {
                redirect_target: Some(format!("https://checkout.mock/{}", req.reference)),
                provider_reference: format!("MOCK-{}", req.reference),
                expires_at: None,
                acknowledged_status: TransactionStatus::Processing,
                provider_data: json!({ "access_code": "ac_123" }),
            })
        }

        async fn verify_payment(
            &self,
            provider_reference: &str,
        ) -> Result<ProcessorPayment, ProviderError> {
            let (status, amount) = self
                .verification
                .lock()
                .unwrap()
                .ok_or_else(|| ProviderError::Transport("connection refused".into()))?;
            Ok(ProcessorPayment {
                id: provider_reference.to_string(),
                reference: provider_reference.trim_start_matches("MOCK-").to_string(),
                status,
                amount,
                currency: Some(Currency::NGN),
                fee: None,
                description: None,
                metadata: json!({}),
            })
        }

        async fn verify_payout(
            &self,
            provider_reference: &str,
        ) -> Result<ProcessorPayment, ProviderError> {
            self.verify_payment(provider_reference).await
        }

        async fn verify_refund(
            &self,
            provider_reference: &str,
        ) -> Result<ProcessorPayment, ProviderError> {
            let (status, amount) = self
                .refund_verification
                .lock()
                .unwrap()
                .ok_or_else(|| ProviderError::Transport("connection refused".into()))?;
            Ok(ProcessorPayment {
                id: provider_reference.to_string(),
                reference: provider_reference.trim_start_matches("RFND-").to_string(),
                status,
                amount,
                currency: Some(Currency::NGN),
                fee: None,
                description: None,
                metadata: json!({}),
            })
        }

        fn verify_webhook_signature(&self, raw_body: &[u8], signature: &str) -> bool {
            let Ok(expected) = hex::decode(signature) else {
                return false;
            };
            let Ok(mut mac) = Hmac::<Sha256>::new_from_slice(WEBHOOK_SECRET) else {
                return false;
            };
            mac.update(raw_body);
            mac.verify_slice(&expected).is_ok()
        }

        fn parse_webhook(&self, raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
            let payload: serde_json::Value = serde_json::from_slice(raw_body)
                .map_err(|e| ProviderError::MalformedResponse(e.to_string()))?;
            let text = |key: &str| payload[key].as_str().map(str::to_string);
            Ok(WebhookNotification {
                event: text("event").unwrap_or_default(),
                reference: text("reference"),
                provider_reference: text("provider_reference"),
                status: text("status").and_then(|s| s.parse().ok()),
                amount: text("amount").and_then(|a| a.parse().ok()),
                currency: Some(Currency::NGN),
                fee: None,
                payload: payload.clone(),
            })
        }

        async fn refund(&self, req: &RefundRequest) -> Result<ProviderReceipt, ProviderError> {
            self.refunds.lock().unwrap().push(req.clone());
            if let Some(e) = self.reply.lock().unwrap().error() {
                return Err(e);
            }
            Ok(ProviderReceipt {
                provider_reference: format!("RFND-{}", req.reference),
                status: TransactionStatus::Processing,
                raw: json!({ "status": "pending" }),
            })
        }

        async fn payout(&self, req: &PayoutRequest) -> Result<ProviderReceipt, ProviderError> {
            self.payouts.lock().unwrap().push(req.clone());
            if let Some(e) = self.reply.lock().unwrap().error() {
                return Err(e);
            }
            Ok(ProviderReceipt {
                provider_reference: format!("TRF-{}", req.reference),
                status: TransactionStatus::Processing,
                raw: json!({ "transfer_code": "TRF_1" }),
            })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Fixtures
    // ─────────────────────────────────────────────────────────────────────────────

    fn catalog_method(id: &str, gateway: Option<&str>) -> PaymentMethod {
        PaymentMethod {
            id: id.to_string(),
            region: "West Africa".into(),
            country_code: "NG".into(),
            country_name: "Nigeria".into(),
            method_type: MethodType::Ewallet,
            provider_code: id.to_string(),
            provider_name: "Mock Pay".into(),
            gateway: gateway.map(str::to_string),
            currency: Currency::NGN,
            deposit_enabled: true,
            withdrawal_enabled: true,
            min_amount: dec!(100),
            max_amount: dec!(5000000),
            deposit_fee: FeeSchedule::percentage(dec!(1.5)),
            withdrawal_fee: FeeSchedule::flat(dec!(50)),
            processing_time_minutes: 2,
            description: None,
        }
    }

    fn registry() -> Arc<FeeRulesRegistry> {
        let mut deposit_only = catalog_method("mock_deposit_only", Some("mock"));
        deposit_only.withdrawal_enabled = false;
        let methods = vec![
            catalog_method("mock_ng", Some("mock")),
            catalog_method("ghost_ng", Some("ghost")),
            catalog_method("listed_ng", None),
            deposit_only,
        ];
        Arc::new(FeeRulesRegistry::from_parts(methods, Vec::new()).unwrap())
    }

    struct Harness {
        orchestrator: PaymentOrchestrator<MockRepo>,
        provider: Arc<MockProvider>,
    }

    fn harness() -> Harness {
        harness_with(OrchestratorSettings::default())
    }

    fn harness_with(settings: OrchestratorSettings) -> Harness {
        let provider = Arc::new(MockProvider::new());
        let providers = ProviderRegistry::new().with(provider.clone());
        Harness {
            orchestrator: PaymentOrchestrator::new(MockRepo::new(), registry(), providers, settings),
            provider,
        }
    }

    fn deposit_request(amount: Decimal) -> CreateDepositRequest {
        CreateDepositRequest {
            method_id: "mock_ng".into(),
            amount,
            reference_id: None,
            destination_wallet: None,
            payer: PayerDetails {
                email: Some("ada@example.com".into()),
                phone: None,
                name: Some("Ada".into()),
            },
            callback_url: Some("https://app.example.com/done".into()),
            description: None,
            metadata: None,
        }
    }

    fn withdrawal_request(amount: Decimal) -> CreateWithdrawalRequest {
        CreateWithdrawalRequest {
            method_id: "mock_ng".into(),
            amount,
            reference_id: None,
            destination: Some(PayoutDestination::MobileMoney {
                phone: "+2348012345678".into(),
                provider: Some("opay".into()),
            }),
            withdrawal_method_id: None,
            reason: Some("Rent".into()),
            metadata: None,
        }
    }

    /// A settled deposit crediting `net` to the user.
    fn funded(user_id: UserId, net: Decimal) -> Transaction {
        let mut tx = Transaction::pending(
            user_id,
            format!("SEED-{}", uuid::Uuid::new_v4()),
            TransactionType::Deposit,
            net,
            Currency::NGN,
            Decimal::ZERO,
            Some("mock_ng".into()),
            Some("mock".into()),
        );
        StatusUpdate::to(TransactionStatus::Completed).apply_to(&mut tx, Utc::now());
        tx
    }

    fn webhook_body(reference: &str, status: &str, amount: &str) -> Vec<u8> {
        serde_json::to_vec(&json!({
            "event": "charge.updated",
            "reference": reference,
            "status": status,
            "amount": amount,
        }))
        .unwrap()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Deposits
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_deposit_charges_gross_total() {
        let h = harness();
        let user = UserId::new();

        let response = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap();

        let tx = &response.transaction;
        assert_eq!(tx.amount, dec!(1015));
        assert_eq!(tx.fee_amount, dec!(15));
        assert_eq!(tx.net_amount, dec!(1000));
        assert_eq!(tx.status, TransactionStatus::Processing);
        assert_eq!(tx.gateway.as_deref(), Some("mock"));
        assert_eq!(tx.deposit_method, Some(MethodType::Ewallet));
        assert!(tx.reference_id.starts_with("DEP-"));
        assert_eq!(
            tx.provider_reference.as_deref(),
            Some(format!("MOCK-{}", tx.reference_id).as_str())
        );
        assert!(response.redirect_target.unwrap().contains(&tx.reference_id));

        let sent = h.provider.initializations.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].amount, dec!(1015));
        assert_eq!(
            sent[0].callback_url.as_deref(),
            Some("https://app.example.com/done")
        );
    }

    #[tokio::test]
    async fn test_deposit_out_of_bounds_writes_nothing() {
        let h = harness();

        let result = h
            .orchestrator
            .create_deposit(UserId::new(), deposit_request(dec!(50)))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.orchestrator.repo().count(), 0);
        assert!(h.provider.initializations.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_deposit_rejects_excess_precision() {
        let h = harness();

        let result = h
            .orchestrator
            .create_deposit(UserId::new(), deposit_request(dec!(1000.005)))
            .await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.orchestrator.repo().count(), 0);
    }

    #[tokio::test]
    async fn test_deposit_requires_payer_email() {
        let h = harness();
        let mut req = deposit_request(dec!(1000));
        req.payer.email = Some("  ".into());

        let result = h.orchestrator.create_deposit(UserId::new(), req).await;

        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("email")));
    }

    #[tokio::test]
    async fn test_reused_reference_returns_same_record() {
        let h = harness();
        let user = UserId::new();
        let mut req = deposit_request(dec!(1000));
        req.reference_id = Some("ORDER-42".into());

        let first = h.orchestrator.create_deposit(user, req.clone()).await.unwrap();
        let second = h.orchestrator.create_deposit(user, req.clone()).await.unwrap();

        assert_eq!(first.transaction.id, second.transaction.id);
        assert_eq!(second.redirect_target, first.redirect_target);
        assert_eq!(h.orchestrator.repo().count(), 1);
        assert_eq!(h.provider.initializations.lock().unwrap().len(), 1);

        let other = h.orchestrator.create_deposit(UserId::new(), req).await;
        assert!(matches!(other, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_refund_prefix_is_reserved() {
        let h = harness();
        let mut req = deposit_request(dec!(1000));
        req.reference_id = Some("RF-ORDER-42".into());

        let result = h.orchestrator.create_deposit(UserId::new(), req).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.orchestrator.repo().count(), 0);
    }

    #[tokio::test]
    async fn test_indeterminate_provider_error_leaves_record_open() {
        let h = harness();
        h.provider.reply_with(Reply::Timeout);
        let user = UserId::new();

        let result = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await;
        assert!(matches!(result, Err(AppError::Upstream(_))));

        let page = h
            .orchestrator
            .list_transactions(user, TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        let tx = &page.transactions[0];
        assert_eq!(tx.status, TransactionStatus::Pending);
        assert!(
            tx.description
                .as_deref()
                .unwrap()
                .starts_with("Awaiting provider confirmation")
        );
    }

    #[tokio::test]
    async fn test_rejected_provider_error_fails_record() {
        let h = harness();
        h.provider.reply_with(Reply::Reject);
        let user = UserId::new();

        let result = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await;
        assert!(matches!(result, Err(AppError::Upstream(_))));

        let page = h
            .orchestrator
            .list_transactions(user, TransactionFilter::default())
            .await
            .unwrap();
        let tx = &page.transactions[0];
        assert_eq!(tx.status, TransactionStatus::Failed);
        assert!(tx.processor_response.as_ref().unwrap()["error"].is_string());
    }

    #[tokio::test]
    async fn test_unroutable_methods() {
        let h = harness();

        let mut req = deposit_request(dec!(1000));
        req.method_id = "listed_ng".into();
        let listed = h.orchestrator.create_deposit(UserId::new(), req).await;
        assert!(matches!(listed, Err(AppError::BadRequest(_))));

        let mut req = deposit_request(dec!(1000));
        req.method_id = "ghost_ng".into();
        let ghost = h.orchestrator.create_deposit(UserId::new(), req).await;
        assert!(matches!(ghost, Err(AppError::Internal(_))));

        let unroutable: Vec<_> = h
            .orchestrator
            .unroutable_methods()
            .into_iter()
            .map(|m| m.id.as_str())
            .collect();
        assert_eq!(unroutable, vec!["ghost_ng"]);
        assert_eq!(h.orchestrator.repo().count(), 0);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Webhooks
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_webhook_completes_deposit_once() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;

        let body = webhook_body(&tx.reference_id, "completed", "1015");
        let signature = MockProvider::sign(&body);

        let outcome = h
            .orchestrator
            .handle_webhook("mock", Some(&signature), &body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);

        let settled = h.orchestrator.get_transaction(user, tx.id).await.unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
        assert!(settled.completed_at.is_some());
        assert_eq!(settled.processor_response.as_ref().unwrap()["event"], "charge.updated");

        let replay = h
            .orchestrator
            .handle_webhook("mock", Some(&signature), &body)
            .await
            .unwrap();
        assert_eq!(replay, WebhookOutcome::Duplicate);

        let after = h.orchestrator.get_transaction(user, tx.id).await.unwrap();
        assert_eq!(after.updated_at, settled.updated_at);
        assert_eq!(after.completed_at, settled.completed_at);

        let balances = h.orchestrator.balances(user).await.unwrap();
        assert_eq!(balances[0].available, dec!(1000));
    }

    #[tokio::test]
    async fn test_webhook_with_bad_signature_changes_nothing() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        let body = webhook_body(&tx.reference_id, "completed", "1015");

        let forged = h
            .orchestrator
            .handle_webhook("mock", Some("deadbeef"), &body)
            .await;
        assert!(matches!(forged, Err(AppError::Unauthorized(_))));

        let missing = h.orchestrator.handle_webhook("mock", None, &body).await;
        assert!(matches!(missing, Err(AppError::Unauthorized(_))));

        let current = h.orchestrator.get_transaction(user, tx.id).await.unwrap();
        assert_eq!(current, tx);
    }

    #[tokio::test]
    async fn test_webhook_for_unknown_gateway_or_reference() {
        let h = harness();
        let body = webhook_body("DEP-unknown", "completed", "1015");
        let signature = MockProvider::sign(&body);

        let gateway = h
            .orchestrator
            .handle_webhook("paypal", Some(&signature), &body)
            .await;
        assert!(matches!(gateway, Err(AppError::NotFound(_))));

        let outcome = h
            .orchestrator
            .handle_webhook("mock", Some(&signature), &body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::UnknownReference);
    }

    #[tokio::test]
    async fn test_webhook_without_status_is_ignored() {
        let h = harness();
        let body = serde_json::to_vec(&json!({ "event": "customer.created" })).unwrap();
        let signature = MockProvider::sign(&body);

        let outcome = h
            .orchestrator
            .handle_webhook("mock", Some(&signature), &body)
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_settlement_mismatch_fails_record() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        let body = webhook_body(&tx.reference_id, "completed", "15");
        let signature = MockProvider::sign(&body);

        let outcome = h
            .orchestrator
            .handle_webhook("mock", Some(&signature), &body)
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Applied);

        let failed = h.orchestrator.get_transaction(user, tx.id).await.unwrap();
        assert_eq!(failed.status, TransactionStatus::Failed);
        assert!(failed.description.unwrap().starts_with("Settlement mismatch"));
        assert!(h.orchestrator.balances(user).await.unwrap()[0].available.is_zero());
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Withdrawals
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_withdrawal_pays_out_net() {
        let h = harness();
        let user = UserId::new();
        h.orchestrator.repo().seed(funded(user, dec!(10000)));

        let tx = h
            .orchestrator
            .create_withdrawal(user, withdrawal_request(dec!(1000)))
            .await
            .unwrap();

        assert_eq!(tx.transaction_type, TransactionType::Withdrawal);
        assert_eq!(tx.amount, dec!(1000));
        assert_eq!(tx.fee_amount, dec!(50));
        assert_eq!(tx.net_amount, dec!(950));
        assert_eq!(tx.status, TransactionStatus::Processing);
        assert!(tx.reference_id.starts_with("WD-"));

        let payouts = h.provider.payouts.lock().unwrap();
        assert_eq!(payouts[0].amount, dec!(950));
        drop(payouts);

        let balances = h.orchestrator.balances(user).await.unwrap();
        assert_eq!(balances[0].available, dec!(9000));
    }

    #[tokio::test]
    async fn test_withdrawal_insufficient_funds() {
        let h = harness();
        let user = UserId::new();
        h.orchestrator.repo().seed(funded(user, dec!(500)));

        let result = h
            .orchestrator
            .create_withdrawal(user, withdrawal_request(dec!(1000)))
            .await;

        assert!(matches!(
            result,
            Err(AppError::InsufficientFunds { available, requested, .. })
                if available == dec!(500) && requested == dec!(1000)
        ));
        assert_eq!(h.orchestrator.repo().count(), 1);
        assert!(h.provider.payouts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_withdrawal_needs_exactly_one_destination() {
        let h = harness();
        let mut req = withdrawal_request(dec!(1000));
        req.withdrawal_method_id = Some(WithdrawalMethodId::new());

        let result = h.orchestrator.create_withdrawal(UserId::new(), req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let mut req = withdrawal_request(dec!(1000));
        req.destination = None;
        let result = h.orchestrator.create_withdrawal(UserId::new(), req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_withdrawal_direction_checked() {
        let h = harness();
        let mut req = withdrawal_request(dec!(1000));
        req.method_id = "mock_deposit_only".into();

        let result = h.orchestrator.create_withdrawal(UserId::new(), req).await;

        assert!(matches!(result, Err(AppError::BadRequest(msg)) if msg.contains("withdrawals")));
    }

    #[tokio::test]
    async fn test_withdrawal_through_saved_preference() {
        let h = harness();
        let user = UserId::new();
        h.orchestrator.repo().seed(funded(user, dec!(10000)));

        let preference = h
            .orchestrator
            .create_withdrawal_method(
                user,
                CreateWithdrawalMethodRequest {
                    destination: PayoutDestination::MobileMoney {
                        phone: "+2348012345678".into(),
                        provider: None,
                    },
                    display_name: None,
                    make_default: true,
                },
            )
            .await
            .unwrap();
        assert!(preference.is_default);

        let mut req = withdrawal_request(dec!(2000));
        req.destination = None;
        req.withdrawal_method_id = Some(preference.id);
        let tx = h.orchestrator.create_withdrawal(user, req).await.unwrap();

        assert_eq!(tx.payout_destination, Some(preference.destination.clone()));
        let listed = h.orchestrator.list_withdrawal_methods(user).await.unwrap();
        assert!(listed[0].last_used_at.is_some());

        h.orchestrator
            .deactivate_withdrawal_method(user, preference.id)
            .await
            .unwrap();
        let mut req = withdrawal_request(dec!(2000));
        req.destination = None;
        req.withdrawal_method_id = Some(preference.id);
        let result = h.orchestrator.create_withdrawal(user, req).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_withdrawal_to_username_is_unsupported() {
        let h = harness();
        let user = UserId::new();
        h.orchestrator.repo().seed(funded(user, dec!(10000)));
        let mut req = withdrawal_request(dec!(1000));
        req.destination = Some(PayoutDestination::Username {
            username: "ada_o".into(),
        });

        let result = h.orchestrator.create_withdrawal(user, req).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
        assert_eq!(h.orchestrator.repo().count(), 1);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cancel, Verify & Refund
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_cancel_then_cancel_again() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;

        let cancelled = h
            .orchestrator
            .cancel(user, tx.id, CancelBody::default())
            .await
            .unwrap();
        assert_eq!(cancelled.status, TransactionStatus::Cancelled);

        let again = h
            .orchestrator
            .cancel(user, tx.id, CancelBody::default())
            .await;
        assert!(matches!(again, Err(AppError::Conflict(_))));

        let stranger = h
            .orchestrator
            .cancel(UserId::new(), tx.id, CancelBody::default())
            .await;
        assert!(matches!(stranger, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_verify_applies_provider_status() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;

        h.provider.report(TransactionStatus::Completed, Some(dec!(1015)));
        let verified = h.orchestrator.verify(user, tx.id).await.unwrap();

        assert_eq!(verified.status, TransactionStatus::Completed);
        assert_eq!(verified.description.as_deref(), Some("Confirmed by mock"));
    }

    #[tokio::test]
    async fn test_refund_creates_reserved_record_once() {
        let h = harness();
        let user = UserId::new();
        let deposit = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;

        let early = h
            .orchestrator
            .refund(user, deposit.id, RefundBody::default())
            .await;
        assert!(matches!(early, Err(AppError::Conflict(_))));

        let body = webhook_body(&deposit.reference_id, "completed", "1015");
        h.orchestrator
            .handle_webhook("mock", Some(&MockProvider::sign(&body)), &body)
            .await
            .unwrap();

        let too_much = h
            .orchestrator
            .refund(
                user,
                deposit.id,
                RefundBody {
                    amount: Some(dec!(1001)),
                    reason: None,
                },
            )
            .await;
        assert!(matches!(too_much, Err(AppError::BadRequest(_))));

        let body = RefundBody {
            amount: Some(dec!(400)),
            reason: Some("Damaged item".into()),
        };
        let refund = h
            .orchestrator
            .refund(user, deposit.id, body.clone())
            .await
            .unwrap();
        assert_eq!(refund.reference_id, format!("RF-{}", deposit.reference_id));
        assert_eq!(refund.transaction_type, TransactionType::Withdrawal);
        assert_eq!(refund.amount, dec!(400));
        assert_eq!(refund.fee_amount, Decimal::ZERO);
        assert_eq!(refund.status, TransactionStatus::Processing);
        assert_eq!(refund.metadata["refund_of"], json!(deposit.id));

        let repeat = h.orchestrator.refund(user, deposit.id, body).await.unwrap();
        assert_eq!(repeat.id, refund.id);
        assert_eq!(h.provider.refunds.lock().unwrap().len(), 1);
        assert_eq!(
            h.provider.refunds.lock().unwrap()[0].provider_reference,
            format!("MOCK-{}", deposit.reference_id)
        );
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reconciliation
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_reconcile_resolves_stale_record() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        h.orchestrator.repo().backdate(tx.id, 3);
        h.provider.report(TransactionStatus::Completed, Some(dec!(1015)));

        let report = h.orchestrator.reconcile().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.resolved, 1);
        let settled = h.orchestrator.get_transaction(user, tx.id).await.unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_reconcile_skips_fresh_records() {
        let h = harness();
        h.orchestrator
            .create_deposit(UserId::new(), deposit_request(dec!(1000)))
            .await
            .unwrap();

        let report = h.orchestrator.reconcile().await.unwrap();

        assert_eq!(report.examined, 0);
    }

    #[tokio::test]
    async fn test_reconcile_escalates_overdue_record_once() {
        let h = harness();
        let user = UserId::new();
        let tx = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        h.orchestrator.repo().backdate(tx.id, 10);
        h.provider.report(TransactionStatus::Processing, None);

        let first = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(first.escalated, 1);

        let flagged = h.orchestrator.get_transaction(user, tx.id).await.unwrap();
        assert_eq!(flagged.status, TransactionStatus::Processing);
        assert_eq!(flagged.metadata["escalated"], json!(true));
        assert!(
            flagged
                .description
                .unwrap()
                .starts_with("Escalated for manual review")
        );

        let second = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(second.escalated, 0);
        assert_eq!(second.still_pending, 1);
    }

    #[tokio::test]
    async fn test_escalated_records_do_not_starve_newer_ones() {
        let h = harness_with(OrchestratorSettings {
            reconcile_batch_size: 1,
            ..Default::default()
        });
        let user = UserId::new();
        let oldest = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        let newer = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(2000)))
            .await
            .unwrap()
            .transaction;
        h.orchestrator.repo().backdate(oldest.id, 30);
        h.orchestrator.repo().backdate(newer.id, 10);
        h.provider.report(TransactionStatus::Processing, None);

        let first = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(first.examined, 1);
        assert_eq!(first.escalated, 1);

        let second = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(second.examined, 1);
        assert_eq!(second.escalated, 1);
        let flagged = h.orchestrator.get_transaction(user, newer.id).await.unwrap();
        assert_eq!(flagged.metadata["escalated"], json!(true));

        // Once everything is escalated, the batch still revisits the oldest.
        let third = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(third.escalated, 0);
        assert_eq!(third.still_pending, 1);

        h.provider.report(TransactionStatus::Completed, Some(dec!(1015)));
        let fourth = h.orchestrator.reconcile().await.unwrap();
        assert_eq!(fourth.resolved, 1);
        let settled = h.orchestrator.get_transaction(user, oldest.id).await.unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_huge_escalation_factor_never_escalates() {
        let h = harness_with(OrchestratorSettings {
            escalation_factor: u32::MAX,
            ..Default::default()
        });
        let tx = h
            .orchestrator
            .create_deposit(UserId::new(), deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        h.orchestrator.repo().backdate(tx.id, 60 * 24 * 365);
        h.provider.report(TransactionStatus::Processing, None);

        let report = h.orchestrator.reconcile().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.escalated, 0);
        assert_eq!(report.still_pending, 1);
    }

    #[tokio::test]
    async fn test_reconcile_settles_processing_refund() {
        let h = harness();
        let user = UserId::new();
        let deposit = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        let body = webhook_body(&deposit.reference_id, "completed", "1015");
        h.orchestrator
            .handle_webhook("mock", Some(&MockProvider::sign(&body)), &body)
            .await
            .unwrap();
        let refund = h
            .orchestrator
            .refund(
                user,
                deposit.id,
                RefundBody {
                    amount: Some(dec!(400)),
                    reason: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(refund.status, TransactionStatus::Processing);
        h.orchestrator.repo().backdate(refund.id, 3);

        // Payment polls still say processing; only the refund poll settles it.
        h.provider.report(TransactionStatus::Processing, None);
        h.provider.report_refund(TransactionStatus::Completed, Some(dec!(400)));

        let report = h.orchestrator.reconcile().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.resolved, 1);
        assert_eq!(report.errors, 0);
        let settled = h.orchestrator.get_transaction(user, refund.id).await.unwrap();
        assert_eq!(settled.status, TransactionStatus::Completed);
        assert_eq!(
            settled.provider_reference.as_deref(),
            Some(format!("RFND-{}", refund.reference_id).as_str())
        );
    }

    #[tokio::test]
    async fn test_failed_refund_releases_the_debit() {
        let h = harness();
        let user = UserId::new();
        let deposit = h
            .orchestrator
            .create_deposit(user, deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        h.provider.report(TransactionStatus::Completed, Some(dec!(1015)));
        h.orchestrator.verify(user, deposit.id).await.unwrap();
        let refund = h
            .orchestrator
            .refund(user, deposit.id, RefundBody::default())
            .await
            .unwrap();
        assert_eq!(h.orchestrator.balances(user).await.unwrap()[0].available, Decimal::ZERO);

        h.provider.report_refund(TransactionStatus::Failed, None);
        let failed = h.orchestrator.verify(user, refund.id).await.unwrap();

        assert_eq!(failed.status, TransactionStatus::Failed);
        assert_eq!(h.orchestrator.balances(user).await.unwrap()[0].available, dec!(1000));
    }

    #[tokio::test]
    async fn test_reconcile_counts_provider_outage() {
        let h = harness();
        let tx = h
            .orchestrator
            .create_deposit(UserId::new(), deposit_request(dec!(1000)))
            .await
            .unwrap()
            .transaction;
        h.orchestrator.repo().backdate(tx.id, 3);

        let report = h.orchestrator.reconcile().await.unwrap();

        assert_eq!(report.examined, 1);
        assert_eq!(report.errors, 1);
        assert_eq!(report.resolved, 0);
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Registry & History
    // ─────────────────────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn test_list_rejects_inverted_range() {
        let h = harness();
        let now = Utc::now();
        let filter = TransactionFilter {
            from: Some(now),
            to: Some(now - Duration::hours(1)),
            ..Default::default()
        };

        let result = h.orchestrator.list_transactions(UserId::new(), filter).await;

        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_quote_fee_for_both_directions() {
        let h = harness();
        let deposit = h
            .orchestrator
            .quote_fee(&gateway_types::FeeQuoteRequest {
                method_id: "mock_ng".into(),
                amount: dec!(1000),
                direction: fee_rules::Direction::Deposit,
            })
            .unwrap();
        assert_eq!(deposit.fee, dec!(15));
        assert_eq!(deposit.total, Some(dec!(1015)));
        assert_eq!(deposit.net, None);

        let withdrawal = h
            .orchestrator
            .quote_fee(&gateway_types::FeeQuoteRequest {
                method_id: "mock_ng".into(),
                amount: dec!(1000),
                direction: fee_rules::Direction::Withdrawal,
            })
            .unwrap();
        assert_eq!(withdrawal.fee, dec!(50));
        assert_eq!(withdrawal.net, Some(dec!(950)));

        let unknown = h.orchestrator.quote_fee(&gateway_types::FeeQuoteRequest {
            method_id: "nope".into(),
            amount: dec!(1000),
            direction: fee_rules::Direction::Deposit,
        });
        assert!(matches!(unknown, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_external_rate_without_source() {
        let h = harness();

        let result = h
            .orchestrator
            .external_rate(&gateway_types::RateQuery {
                asset: "btc".into(),
                fiat: Currency::USD,
            })
            .await;

        assert!(matches!(result, Err(AppError::NotFound(_))));
    }
}
