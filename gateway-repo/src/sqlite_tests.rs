//! SQLite repository integration tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use serde_json::json;

    use gateway_types::{
        BankAccount, CreateBankAccountRequest, CreateOutcome, CreateWithdrawalMethodRequest,
        Currency, DomainError, LedgerRepository, PayoutDestination, RepoError, StatusUpdate,
        Transaction, TransactionFilter, TransactionStatus, TransactionType, UserId,
        WithdrawalMethodPreference,
    };

    use crate::SqliteRepo;

    async fn setup_repo() -> SqliteRepo {
        SqliteRepo::new("sqlite::memory:").await.unwrap()
    }

    fn record(user: UserId, reference: &str, kind: TransactionType, amount: Decimal) -> Transaction {
        Transaction::pending(
            user,
            reference.to_string(),
            kind,
            amount,
            Currency::NGN,
            Decimal::ZERO,
            Some("paystack_ng".into()),
            Some("paystack".into()),
        )
    }

    /// Creates a deposit and drives it to `completed`.
    async fn funded(repo: &SqliteRepo, user: UserId, amount: Decimal) -> Transaction {
        let reference = format!("DEP-{}", uuid::Uuid::new_v4().simple());
        let tx = repo
            .create_transaction(record(user, &reference, TransactionType::Deposit, amount))
            .await
            .unwrap()
            .into_inner();
        repo.transition_status(tx.id, TransactionStatus::Pending, StatusUpdate::to(TransactionStatus::Completed))
            .await
            .unwrap()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_and_fetch() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let mut tx = record(user, "DEP-1", TransactionType::Deposit, dec!(1000.50));
        tx.fee_amount = dec!(15.01);
        tx.net_amount = dec!(985.49);
        tx.metadata = json!({ "source": "test" });

        let created = repo.create_transaction(tx.clone()).await.unwrap();
        assert!(created.is_created());

        let fetched = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(fetched.reference_id, "DEP-1");
        assert_eq!(fetched.amount, dec!(1000.50));
        assert_eq!(fetched.net_amount, dec!(985.49));
        assert_eq!(fetched.status, TransactionStatus::Pending);
        assert_eq!(fetched.metadata["source"], "test");

        let by_ref = repo.find_by_reference("DEP-1").await.unwrap().unwrap();
        assert_eq!(by_ref.id, tx.id);
    }

    #[tokio::test]
    async fn test_duplicate_reference_returns_existing() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let first = record(user, "DEP-dup", TransactionType::Deposit, dec!(100));
        repo.create_transaction(first.clone()).await.unwrap();

        let second = record(user, "DEP-dup", TransactionType::Deposit, dec!(100));
        match repo.create_transaction(second).await.unwrap() {
            CreateOutcome::Existing(existing) => assert_eq!(existing.id, first.id),
            CreateOutcome::Created(_) => panic!("duplicate reference created a second record"),
        }

        let page = repo
            .list_transactions(user, &TransactionFilter::default())
            .await
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[tokio::test]
    async fn test_withdrawal_requires_completed_funds() {
        let repo = setup_repo().await;
        let user = UserId::new();

        // A pending deposit is not spendable.
        repo.create_transaction(record(user, "DEP-p", TransactionType::Deposit, dec!(500)))
            .await
            .unwrap();
        let err = repo
            .create_transaction(record(user, "WD-1", TransactionType::Withdrawal, dec!(100)))
            .await
            .unwrap_err();
        match err {
            RepoError::Domain(DomainError::InsufficientFunds {
                available,
                requested,
                currency,
            }) => {
                assert_eq!(available, Decimal::ZERO);
                assert_eq!(requested, dec!(100));
                assert_eq!(currency, Currency::NGN);
            }
            other => panic!("unexpected error: {other:?}"),
        }

        funded(&repo, user, dec!(300)).await;
        let wd = repo
            .create_transaction(record(user, "WD-2", TransactionType::Withdrawal, dec!(250)))
            .await
            .unwrap();
        assert!(wd.is_created());

        // The pending withdrawal already holds its amount.
        let err = repo
            .create_transaction(record(user, "WD-3", TransactionType::Withdrawal, dec!(100)))
            .await
            .unwrap_err();
        assert!(matches!(err, RepoError::Domain(DomainError::InsufficientFunds { .. })));
    }

    #[tokio::test]
    async fn test_failed_withdrawal_releases_funds() {
        let repo = setup_repo().await;
        let user = UserId::new();
        funded(&repo, user, dec!(100)).await;

        let wd = repo
            .create_transaction(record(user, "WD-f", TransactionType::Withdrawal, dec!(100)))
            .await
            .unwrap()
            .into_inner();
        let balances = repo.balances(user).await.unwrap();
        assert_eq!(balances[0].available, Decimal::ZERO);

        repo.transition_status(
            wd.id,
            TransactionStatus::Pending,
            StatusUpdate::to(TransactionStatus::Failed).with_description("Bank rejected payout"),
        )
        .await
        .unwrap()
        .unwrap();
        let balances = repo.balances(user).await.unwrap();
        assert_eq!(balances[0].available, dec!(100));
    }

    #[tokio::test]
    async fn test_concurrent_withdrawals_do_not_overdraw() {
        let repo = Arc::new(setup_repo().await);
        let user = UserId::new();
        funded(&repo, user, dec!(100)).await;

        let mut handles = Vec::new();
        for i in 0..4 {
            let repo = repo.clone();
            handles.push(tokio::spawn(async move {
                repo.create_transaction(record(
                    user,
                    &format!("WD-c{}", i),
                    TransactionType::Withdrawal,
                    dec!(60),
                ))
                .await
            }));
        }
        let mut created = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(repo.balances(user).await.unwrap()[0].available, dec!(40));
    }

    #[tokio::test]
    async fn test_transition_is_compare_and_set() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let tx = repo
            .create_transaction(record(user, "DEP-cas", TransactionType::Deposit, dec!(10)))
            .await
            .unwrap()
            .into_inner();

        let processing = repo
            .transition_status(
                tx.id,
                TransactionStatus::Pending,
                StatusUpdate::to(TransactionStatus::Processing).with_provider_reference("ps_123"),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(processing.provider_reference.as_deref(), Some("ps_123"));

        // A writer that still believes the record is pending loses.
        let stale = repo
            .transition_status(
                tx.id,
                TransactionStatus::Pending,
                StatusUpdate::to(TransactionStatus::Failed),
            )
            .await
            .unwrap();
        assert!(stale.is_none());

        let completed = repo
            .transition_status(
                tx.id,
                TransactionStatus::Processing,
                StatusUpdate::to(TransactionStatus::Completed),
            )
            .await
            .unwrap()
            .unwrap();
        assert!(completed.completed_at.is_some());

        let found = repo
            .find_by_provider_reference("paystack", "ps_123")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, tx.id);
        assert_eq!(found.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn test_list_filters_and_pages() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let other = UserId::new();
        for i in 0..5 {
            repo.create_transaction(record(user, &format!("DEP-l{}", i), TransactionType::Deposit, dec!(10)))
                .await
                .unwrap();
        }
        funded(&repo, user, dec!(50)).await;
        repo.create_transaction(record(other, "DEP-other", TransactionType::Deposit, dec!(10)))
            .await
            .unwrap();

        let page = repo
            .list_transactions(
                user,
                &TransactionFilter {
                    status: Some(TransactionStatus::Pending),
                    limit: Some(2),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.transactions.len(), 2);
        assert!(page.transactions[0].created_at >= page.transactions[1].created_at);

        let completed = repo
            .list_transactions(
                user,
                &TransactionFilter {
                    status: Some(TransactionStatus::Completed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(completed.total, 1);

        let future = repo
            .list_transactions(
                user,
                &TransactionFilter {
                    from: Some(Utc::now() + Duration::hours(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(future.total, 0);
    }

    #[tokio::test]
    async fn test_non_terminal_records_for_reconciliation() {
        let repo = setup_repo().await;
        let user = UserId::new();
        repo.create_transaction(record(user, "DEP-nt", TransactionType::Deposit, dec!(10)))
            .await
            .unwrap();
        funded(&repo, user, dec!(10)).await;

        let stale = repo
            .list_non_terminal(Utc::now() + Duration::seconds(1), 10)
            .await
            .unwrap();
        assert_eq!(stale.len(), 1);
        assert_eq!(stale[0].reference_id, "DEP-nt");

        let none = repo
            .list_non_terminal(Utc::now() - Duration::hours(1), 10)
            .await
            .unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_escalated_records_yield_the_batch() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let mut oldest = record(user, "DEP-old", TransactionType::Deposit, dec!(10));
        oldest.created_at = Utc::now() - Duration::hours(2);
        let oldest = repo.create_transaction(oldest).await.unwrap().into_inner();
        let mut newer = record(user, "DEP-new", TransactionType::Deposit, dec!(10));
        newer.created_at = Utc::now() - Duration::hours(1);
        repo.create_transaction(newer).await.unwrap();

        let batch = repo.list_non_terminal(Utc::now(), 1).await.unwrap();
        assert_eq!(batch[0].reference_id, "DEP-old");

        repo.annotate_transaction(oldest.id, "Needs manual review", json!({ "escalated": true }))
            .await
            .unwrap();
        let batch = repo.list_non_terminal(Utc::now(), 1).await.unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].reference_id, "DEP-new");

        // Escalated records still fill whatever room is left.
        let all = repo.list_non_terminal(Utc::now(), 10).await.unwrap();
        let order: Vec<&str> = all.iter().map(|t| t.reference_id.as_str()).collect();
        assert_eq!(order, ["DEP-new", "DEP-old"]);
    }

    #[tokio::test]
    async fn test_annotate_keeps_status() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let tx = repo
            .create_transaction(record(user, "DEP-an", TransactionType::Deposit, dec!(10)))
            .await
            .unwrap()
            .into_inner();
        repo.annotate_transaction(tx.id, "Needs manual review", json!({ "escalated": true }))
            .await
            .unwrap();
        let fetched = repo.get_transaction(tx.id).await.unwrap().unwrap();
        assert_eq!(fetched.status, TransactionStatus::Pending);
        assert_eq!(fetched.description.as_deref(), Some("Needs manual review"));
        assert_eq!(fetched.metadata["escalated"], true);
    }

    #[tokio::test]
    async fn test_daily_summary_counts_completed_today() {
        let repo = setup_repo().await;
        let user = UserId::new();
        funded(&repo, user, dec!(200)).await;
        funded(&repo, user, dec!(50)).await;
        repo.create_transaction(record(user, "DEP-pend", TransactionType::Deposit, dec!(999)))
            .await
            .unwrap();

        let today = Utc::now().date_naive();
        let summary = repo.daily_summary(user, today).await.unwrap();
        assert_eq!(summary.totals.len(), 1);
        assert_eq!(summary.totals[0].deposit_count, 2);
        assert_eq!(summary.totals[0].deposit_total, dec!(250));

        let yesterday = today - Duration::days(1);
        assert!(repo.daily_summary(user, yesterday).await.unwrap().totals.is_empty());
    }

    fn bank_request(number: &str, country: &str) -> CreateBankAccountRequest {
        CreateBankAccountRequest {
            account_name: "Ada Obi".into(),
            account_number: number.into(),
            bank_name: "Access Bank".into(),
            bank_code: Some("044".into()),
            account_holder_name: "Ada Obi".into(),
            account_holder_phone: None,
            country_code: country.into(),
            currency: Currency::NGN,
        }
    }

    #[tokio::test]
    async fn test_bank_account_default_is_exclusive() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let first = repo
            .create_bank_account(BankAccount::new(user, bank_request("0123456789", "NG")).unwrap())
            .await
            .unwrap();
        let second = repo
            .create_bank_account(BankAccount::new(user, bank_request("9876543210", "GH")).unwrap())
            .await
            .unwrap();

        repo.set_default_bank_account(user, first.id).await.unwrap();
        let now_default = repo.set_default_bank_account(user, second.id).await.unwrap();
        assert!(now_default.is_default);

        let accounts = repo.list_bank_accounts(user, None).await.unwrap();
        assert_eq!(accounts.iter().filter(|a| a.is_default).count(), 1);
        assert_eq!(accounts[0].id, second.id);

        let ghana = repo.list_bank_accounts(user, Some("gh")).await.unwrap();
        assert_eq!(ghana.len(), 1);

        let verified = repo
            .set_bank_account_verified(user, first.id, true)
            .await
            .unwrap();
        assert!(verified.is_verified);

        // Another user cannot touch the account.
        let stranger = UserId::new();
        assert!(matches!(
            repo.delete_bank_account(stranger, first.id).await,
            Err(RepoError::NotFound)
        ));
        repo.delete_bank_account(user, first.id).await.unwrap();
        assert!(repo.get_bank_account(user, first.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_withdrawal_method_lifecycle() {
        let repo = setup_repo().await;
        let user = UserId::new();
        let mobile = WithdrawalMethodPreference::new(
            user,
            CreateWithdrawalMethodRequest {
                destination: PayoutDestination::MobileMoney {
                    phone: "+254712345678".into(),
                    provider: Some("mpesa".into()),
                },
                display_name: None,
                make_default: false,
            },
        )
        .unwrap();
        let email = WithdrawalMethodPreference::new(
            user,
            CreateWithdrawalMethodRequest {
                destination: PayoutDestination::Email {
                    email: "ada@example.com".into(),
                },
                display_name: Some("Work email".into()),
                make_default: false,
            },
        )
        .unwrap();
        repo.create_withdrawal_method(mobile.clone()).await.unwrap();
        repo.create_withdrawal_method(email.clone()).await.unwrap();

        let default = repo
            .set_default_withdrawal_method(user, mobile.id)
            .await
            .unwrap();
        assert!(default.is_default);
        assert_eq!(default.destination, mobile.destination);

        repo.touch_withdrawal_method(user, email.id).await.unwrap();
        let listed = repo.list_withdrawal_methods(user).await.unwrap();
        assert_eq!(listed[0].id, mobile.id);
        assert!(listed[1].last_used_at.is_some());

        repo.deactivate_withdrawal_method(user, mobile.id).await.unwrap();
        let listed = repo.list_withdrawal_methods(user).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert!(!listed.iter().any(|m| m.is_default));
        assert!(matches!(
            repo.set_default_withdrawal_method(user, mobile.id).await,
            Err(RepoError::NotFound)
        ));
    }
}
