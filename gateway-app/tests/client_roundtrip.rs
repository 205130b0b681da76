//! Drives a served gateway through the client SDK, end to end.
//!
//! Run with: cargo test -p gateway-app --no-default-features --features sqlite

#![cfg(feature = "sqlite")]

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal_macros::dec;
use serde_json::json;
use tempfile::tempdir;
use tokio::net::TcpListener;

use fee_rules::{Direction, FeeRulesRegistry, MethodType};
use gateway_client::{ClientError, GatewayClient};
use gateway_hex::{OrchestratorSettings, PaymentOrchestrator, inbound::HttpServer};
use gateway_providers::ProviderRegistry;
use gateway_repo::build_repo;
use gateway_types::{
    CreateBankAccountRequest, CreateDepositRequest, CreateWithdrawalRequest, Currency,
    InitializePayment, PayerDetails, PaymentInitialization, PaymentProvider, PayoutDestination,
    PayoutRequest, ProcessorPayment, ProviderCapabilities, ProviderError, ProviderReceipt,
    RefundRequest, TransactionFilter, TransactionStatus, TransactionType, UserId,
    WebhookNotification, WithdrawalMethodKind,
};

/// Stands in for Paystack: payments settle as soon as they are verified.
struct SandboxPaystack;

#[async_trait]
impl PaymentProvider for SandboxPaystack {
    fn code(&self) -> &'static str {
        "paystack"
    }

    fn capabilities(&self) -> ProviderCapabilities {
        ProviderCapabilities {
            refund: true,
            payout: true,
            requires_email: true,
            requires_phone: false,
            payout_kinds: vec![WithdrawalMethodKind::BankAccount],
        }
    }

    fn signature_header(&self) -> &'static str {
        "x-paystack-signature"
    }

    async fn initialize_payment(
        &self,
        req: &InitializePayment,
    ) -> Result<PaymentInitialization, ProviderError> {
        Ok(PaymentInitialization {
            redirect_target: Some(format!("https://checkout.sandbox/{}", req.reference)),
            provider_reference: format!("PSK-{}", req.reference),
            expires_at: None,
            acknowledged_status: TransactionStatus::Processing,
            provider_data: json!({}),
        })
    }

    async fn verify_payment(
        &self,
        provider_reference: &str,
    ) -> Result<ProcessorPayment, ProviderError> {
        Ok(ProcessorPayment {
            id: provider_reference.to_string(),
            reference: provider_reference.trim_start_matches("PSK-").to_string(),
            status: TransactionStatus::Completed,
            amount: None,
            currency: None,
            fee: None,
            description: None,
            metadata: json!({}),
        })
    }

    fn verify_webhook_signature(&self, _raw_body: &[u8], _signature: &str) -> bool {
        false
    }

    fn parse_webhook(&self, _raw_body: &[u8]) -> Result<WebhookNotification, ProviderError> {
        Err(ProviderError::MalformedResponse("sandbox sends no webhooks".into()))
    }

    async fn refund(&self, req: &RefundRequest) -> Result<ProviderReceipt, ProviderError> {
        Ok(ProviderReceipt {
            provider_reference: format!("RFD-{}", req.reference),
            status: TransactionStatus::Processing,
            raw: json!({}),
        })
    }

    async fn payout(&self, req: &PayoutRequest) -> Result<ProviderReceipt, ProviderError> {
        Ok(ProviderReceipt {
            provider_reference: format!("TRF-{}", req.reference),
            status: TransactionStatus::Processing,
            raw: json!({}),
        })
    }
}

/// Serves a fresh gateway on an ephemeral port and returns its base URL.
async fn serve() -> (String, tempfile::TempDir) {
    let tmp = tempdir().unwrap();
    let db_url = format!("sqlite://{}?mode=rwc", tmp.path().join("gateway.db").display());
    let repo = build_repo(&db_url).await.unwrap();

    let orchestrator = PaymentOrchestrator::new(
        repo,
        Arc::new(FeeRulesRegistry::builtin().unwrap()),
        ProviderRegistry::new().with(Arc::new(SandboxPaystack)),
        OrchestratorSettings::default(),
    );
    let router = HttpServer::new(Arc::new(orchestrator)).router();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });

    (format!("http://{}", addr), tmp)
}

fn deposit_request(amount: rust_decimal::Decimal) -> CreateDepositRequest {
    CreateDepositRequest {
        method_id: "paystack_ng".into(),
        amount,
        reference_id: None,
        destination_wallet: None,
        payer: PayerDetails {
            email: Some("ada@example.com".into()),
            ..Default::default()
        },
        callback_url: None,
        description: None,
        metadata: None,
    }
}

#[tokio::test]
async fn test_registry_calls_need_no_user() {
    let (base_url, _db) = serve().await;
    let client = GatewayClient::new(&base_url);

    assert!(client.health().await.unwrap());

    let methods = client
        .list_methods("NG", Some(MethodType::Ewallet))
        .await
        .unwrap();
    assert!(methods.iter().any(|m| m.id == "paystack_ng"));

    let region = client.get_region("KE").await.unwrap();
    assert_eq!(region.currency, Currency::KES);

    let quote = client
        .quote_fee("paystack_ng", dec!(1000), Direction::Deposit)
        .await
        .unwrap();
    assert_eq!(quote.fee, dec!(15));
    assert_eq!(quote.total, Some(dec!(1015)));

    let err = client.get_method("no_such_method").await.unwrap_err();
    assert_eq!(err.status(), Some(404));

    let err = client.balances().await.unwrap_err();
    assert!(matches!(err, ClientError::MissingUser));
}

#[tokio::test]
async fn test_deposit_withdraw_refund_round_trip() {
    let (base_url, _db) = serve().await;
    let client = GatewayClient::new(&base_url).with_user(UserId::new());

    // Deposit, then settle it by polling the provider
    let deposit = client.create_deposit(&deposit_request(dec!(1000))).await.unwrap();
    assert!(deposit.redirect_target.is_some());
    assert_eq!(deposit.transaction.status, TransactionStatus::Processing);
    assert_eq!(deposit.transaction.net_amount, dec!(1000));

    let settled = client
        .verify_transaction(deposit.transaction.id)
        .await
        .unwrap();
    assert_eq!(settled.status, TransactionStatus::Completed);
    assert!(settled.completed_at.is_some());

    let balances = client.balances().await.unwrap();
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].available, dec!(1000));

    // Withdraw to a saved bank account
    let account = client
        .create_bank_account(&CreateBankAccountRequest {
            account_name: "Ada Obi".into(),
            account_number: "0123456789".into(),
            bank_name: "Access Bank".into(),
            bank_code: Some("044".into()),
            account_holder_name: "Ada Obi".into(),
            account_holder_phone: None,
            country_code: "NG".into(),
            currency: Currency::NGN,
        })
        .await
        .unwrap();
    let account = client.set_default_bank_account(account.id).await.unwrap();
    assert!(account.is_default);

    let withdrawal = client
        .create_withdrawal(&CreateWithdrawalRequest {
            method_id: "access_bank_ng".into(),
            amount: dec!(500),
            reference_id: Some("WD-roundtrip-1".into()),
            destination: Some(PayoutDestination::BankAccount {
                bank_account_id: account.id,
            }),
            withdrawal_method_id: None,
            reason: Some("rent".into()),
            metadata: None,
        })
        .await
        .unwrap();
    assert_eq!(withdrawal.status, TransactionStatus::Processing);
    assert_eq!(withdrawal.fee_amount, dec!(50));
    assert_eq!(withdrawal.net_amount, dec!(450));

    let balances = client.balances().await.unwrap();
    assert_eq!(balances[0].available, dec!(500));

    // Partial refund of the deposit
    let refund = client
        .refund_transaction(deposit.transaction.id, Some(dec!(100)), None)
        .await
        .unwrap();
    assert_eq!(refund.transaction_type, TransactionType::Withdrawal);
    assert_eq!(
        refund.reference_id,
        format!("RF-{}", deposit.transaction.reference_id)
    );

    let deposits = client
        .list_transactions(&TransactionFilter {
            transaction_type: Some(TransactionType::Deposit),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(deposits.total, 1);

    let report = client.reconcile().await.unwrap();
    assert_eq!(report.errors, 0);
}

#[tokio::test]
async fn test_records_are_scoped_to_their_owner() {
    let (base_url, _db) = serve().await;
    let owner = GatewayClient::new(&base_url).with_user(UserId::new());
    let stranger = GatewayClient::new(&base_url).with_user(UserId::new());

    let deposit = owner.create_deposit(&deposit_request(dec!(250))).await.unwrap();

    let err = stranger
        .get_transaction(deposit.transaction.id)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));

    let err = stranger
        .cancel_transaction(deposit.transaction.id, None)
        .await
        .unwrap_err();
    assert_eq!(err.status(), Some(404));

    let cancelled = owner
        .cancel_transaction(deposit.transaction.id, Some("changed my mind".into()))
        .await
        .unwrap();
    assert_eq!(cancelled.status, TransactionStatus::Cancelled);
}
