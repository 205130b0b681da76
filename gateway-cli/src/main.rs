//! Gateway CLI
//!
//! Command-line interface for the payment gateway API.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;

use fee_rules::{Direction, MethodType};
use gateway_client::GatewayClient;
use gateway_types::{
    BankAccountId, CreateBankAccountRequest, CreateDepositRequest, CreateWithdrawalMethodRequest,
    CreateWithdrawalRequest, Currency, PayerDetails, PayoutDestination, TransactionFilter,
    TransactionId, TransactionStatus, TransactionType, UserId, WithdrawalMethodId,
};

#[derive(Parser)]
#[command(name = "gateway")]
#[command(author, version, about = "Payment gateway API CLI client", long_about = None)]
struct Cli {
    /// Base URL of the gateway API
    #[arg(long, env = "GATEWAY_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// User to act as (UUID), sent as X-User-Id
    #[arg(long, env = "GATEWAY_USER_ID")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Payment methods offered in a country
    Methods {
        /// ISO country code
        country: String,
        /// Restrict to one method type (bank, mobile, ewallet, card, crypto)
        #[arg(long)]
        method_type: Option<String>,
    },
    /// Region configuration, or every region when no country is given
    Regions { country: Option<String> },
    /// Quote the fee for an amount
    Quote {
        #[arg(long)]
        method: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, value_enum, default_value = "deposit")]
        direction: DirectionArg,
    },
    /// Spot rate for a crypto asset
    Rate {
        asset: String,
        #[arg(long, default_value = "USD")]
        fiat: String,
    },
    /// Start a deposit
    Deposit {
        #[arg(long)]
        method: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long)]
        phone: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Start a withdrawal to a saved bank account or withdrawal method
    Withdraw {
        #[arg(long)]
        method: String,
        #[arg(long)]
        amount: Decimal,
        #[arg(long, conflicts_with = "withdrawal_method")]
        bank_account: Option<String>,
        #[arg(long)]
        withdrawal_method: Option<String>,
        #[arg(long)]
        reference: Option<String>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Transaction history
    Transactions {
        #[arg(long)]
        status: Option<String>,
        #[arg(long = "type")]
        transaction_type: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
    },
    /// Transaction details
    Get { id: String },
    /// Cancel a pending transaction
    Cancel {
        id: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Ask the provider for a transaction's current status
    Verify { id: String },
    /// Refund a completed deposit
    Refund {
        id: String,
        /// Partial amount; full refund when omitted
        #[arg(long)]
        amount: Option<Decimal>,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Available and pending balances
    Balances,
    /// Completed activity for a UTC day
    Summary {
        /// YYYY-MM-DD, today when omitted
        #[arg(long)]
        date: Option<chrono::NaiveDate>,
    },
    /// Saved bank accounts
    BankAccount {
        #[command(subcommand)]
        action: BankAccountCommands,
    },
    /// Saved payout destinations
    WithdrawalMethod {
        #[command(subcommand)]
        action: WithdrawalMethodCommands,
    },
    /// Run one reconciliation pass now
    Reconcile,
    /// Print provider callbacks sent to a local port
    Listen {
        #[arg(long, default_value = "3000")]
        port: u16,
    },
    /// Check API health
    Health,
}

#[derive(Subcommand)]
enum BankAccountCommands {
    /// Save a bank account
    Add {
        #[arg(long)]
        account_name: String,
        #[arg(long)]
        account_number: String,
        #[arg(long)]
        bank_name: String,
        #[arg(long)]
        bank_code: Option<String>,
        #[arg(long)]
        holder: String,
        #[arg(long)]
        country: String,
        #[arg(long)]
        currency: String,
    },
    /// List saved bank accounts
    List {
        #[arg(long)]
        country: Option<String>,
    },
    /// Make a bank account the default
    Default { id: String },
    /// Delete a bank account
    Delete { id: String },
}

#[derive(Subcommand)]
enum WithdrawalMethodCommands {
    /// Save a mobile-money wallet
    AddMobile {
        #[arg(long)]
        phone: String,
        #[arg(long)]
        provider: Option<String>,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        default: bool,
    },
    /// Save a bank account as a payout destination
    AddBank {
        #[arg(long)]
        bank_account: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        default: bool,
    },
    /// List active preferences
    List,
    /// Make a preference the default
    Default { id: String },
    /// Deactivate a preference
    Remove { id: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum DirectionArg {
    Deposit,
    Withdrawal,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Deposit => Direction::Deposit,
            DirectionArg::Withdrawal => Direction::Withdrawal,
        }
    }
}

fn parse_id<T: std::str::FromStr>(s: &str, what: &str) -> Result<T> {
    s.parse()
        .map_err(|_| anyhow::anyhow!("Invalid {} ID: {}", what, s))
}

fn parse_currency(s: &str) -> Result<Currency> {
    s.to_uppercase()
        .parse()
        .map_err(|_| anyhow::anyhow!("Unknown currency: {}", s))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut client = GatewayClient::new(&cli.api_url);
    if let Some(user) = &cli.user {
        client = client.with_user(parse_id::<UserId>(user, "user")?);
    }

    match cli.command {
        Commands::Health => {
            let healthy = client.health().await?;
            if healthy {
                println!("✓ API is healthy");
            } else {
                println!("✗ API is not healthy");
                std::process::exit(1);
            }
        }

        Commands::Methods {
            country,
            method_type,
        } => {
            let method_type = method_type
                .map(|t| t.parse::<MethodType>())
                .transpose()
                .map_err(|e| anyhow::anyhow!("{}", e))?;
            print_json(&client.list_methods(&country, method_type).await?)?;
        }

        Commands::Regions { country } => match country {
            Some(country) => print_json(&client.get_region(&country).await?)?,
            None => print_json(&client.list_regions().await?)?,
        },

        Commands::Quote {
            method,
            amount,
            direction,
        } => {
            print_json(&client.quote_fee(&method, amount, direction.into()).await?)?;
        }

        Commands::Rate { asset, fiat } => {
            let fiat = parse_currency(&fiat)?;
            print_json(&client.external_rate(&asset, fiat).await?)?;
        }

        Commands::Deposit {
            method,
            amount,
            reference,
            email,
            phone,
            description,
        } => {
            let req = CreateDepositRequest {
                method_id: method,
                amount,
                reference_id: reference,
                destination_wallet: None,
                payer: PayerDetails {
                    email,
                    phone,
                    ..Default::default()
                },
                callback_url: None,
                description,
                metadata: None,
            };
            let deposit = client.create_deposit(&req).await?;
            if let Some(target) = &deposit.redirect_target {
                eprintln!("Complete the payment at: {}", target);
            }
            print_json(&deposit)?;
        }

        Commands::Withdraw {
            method,
            amount,
            bank_account,
            withdrawal_method,
            reference,
            reason,
        } => {
            let destination = bank_account
                .map(|id| parse_id::<BankAccountId>(&id, "bank account"))
                .transpose()?
                .map(|bank_account_id| PayoutDestination::BankAccount { bank_account_id });
            let withdrawal_method_id = withdrawal_method
                .map(|id| parse_id::<WithdrawalMethodId>(&id, "withdrawal method"))
                .transpose()?;
            let req = CreateWithdrawalRequest {
                method_id: method,
                amount,
                reference_id: reference,
                destination,
                withdrawal_method_id,
                reason,
                metadata: None,
            };
            print_json(&client.create_withdrawal(&req).await?)?;
        }

        Commands::Transactions {
            status,
            transaction_type,
            limit,
            offset,
        } => {
            let filter = TransactionFilter {
                status: status
                    .map(|s| s.parse::<TransactionStatus>())
                    .transpose()
                    .map_err(|e| anyhow::anyhow!("{}", e))?,
                transaction_type: transaction_type
                    .map(|t| t.parse::<TransactionType>())
                    .transpose()
                    .map_err(|e| anyhow::anyhow!("{}", e))?,
                limit,
                offset,
                ..Default::default()
            };
            print_json(&client.list_transactions(&filter).await?)?;
        }

        Commands::Get { id } => {
            let id: TransactionId = parse_id(&id, "transaction")?;
            print_json(&client.get_transaction(id).await?)?;
        }

        Commands::Cancel { id, reason } => {
            let id: TransactionId = parse_id(&id, "transaction")?;
            print_json(&client.cancel_transaction(id, reason).await?)?;
        }

        Commands::Verify { id } => {
            let id: TransactionId = parse_id(&id, "transaction")?;
            print_json(&client.verify_transaction(id).await?)?;
        }

        Commands::Refund { id, amount, reason } => {
            let id: TransactionId = parse_id(&id, "transaction")?;
            print_json(&client.refund_transaction(id, amount, reason).await?)?;
        }

        Commands::Balances => print_json(&client.balances().await?)?,

        Commands::Summary { date } => print_json(&client.daily_summary(date).await?)?,

        Commands::BankAccount { action } => match action {
            BankAccountCommands::Add {
                account_name,
                account_number,
                bank_name,
                bank_code,
                holder,
                country,
                currency,
            } => {
                let req = CreateBankAccountRequest {
                    account_name,
                    account_number,
                    bank_name,
                    bank_code,
                    account_holder_name: holder,
                    account_holder_phone: None,
                    country_code: country,
                    currency: parse_currency(&currency)?,
                };
                print_json(&client.create_bank_account(&req).await?)?;
            }
            BankAccountCommands::List { country } => {
                print_json(&client.list_bank_accounts(country.as_deref()).await?)?;
            }
            BankAccountCommands::Default { id } => {
                let id: BankAccountId = parse_id(&id, "bank account")?;
                print_json(&client.set_default_bank_account(id).await?)?;
            }
            BankAccountCommands::Delete { id } => {
                let id: BankAccountId = parse_id(&id, "bank account")?;
                client.delete_bank_account(id).await?;
                println!("✓ Bank account deleted");
            }
        },

        Commands::WithdrawalMethod { action } => match action {
            WithdrawalMethodCommands::AddMobile {
                phone,
                provider,
                name,
                default,
            } => {
                let req = CreateWithdrawalMethodRequest {
                    destination: PayoutDestination::MobileMoney { phone, provider },
                    display_name: name,
                    make_default: default,
                };
                print_json(&client.create_withdrawal_method(&req).await?)?;
            }
            WithdrawalMethodCommands::AddBank {
                bank_account,
                name,
                default,
            } => {
                let bank_account_id: BankAccountId = parse_id(&bank_account, "bank account")?;
                let req = CreateWithdrawalMethodRequest {
                    destination: PayoutDestination::BankAccount { bank_account_id },
                    display_name: name,
                    make_default: default,
                };
                print_json(&client.create_withdrawal_method(&req).await?)?;
            }
            WithdrawalMethodCommands::List => {
                print_json(&client.list_withdrawal_methods().await?)?;
            }
            WithdrawalMethodCommands::Default { id } => {
                let id: WithdrawalMethodId = parse_id(&id, "withdrawal method")?;
                print_json(&client.set_default_withdrawal_method(id).await?)?;
            }
            WithdrawalMethodCommands::Remove { id } => {
                let id: WithdrawalMethodId = parse_id(&id, "withdrawal method")?;
                client.deactivate_withdrawal_method(id).await?;
                println!("✓ Withdrawal method deactivated");
            }
        },

        Commands::Reconcile => print_json(&client.reconcile().await?)?,

        Commands::Listen { port } => {
            let app = axum::Router::new()
                .route("/api/webhooks/{gateway}", axum::routing::post(handle_callback));
            let addr = std::net::SocketAddr::from(([127, 0, 0, 1], port));
            println!("Listening for provider callbacks on {}", addr);
            let listener = tokio::net::TcpListener::bind(&addr).await?;
            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}

/// Dumps a provider callback as received, for pointing a sandbox's webhook
/// URL at a developer machine.
async fn handle_callback(
    axum::extract::Path(gateway): axum::extract::Path<String>,
    headers: axum::http::HeaderMap,
    body: String,
) -> impl axum::response::IntoResponse {
    println!("POST /api/webhooks/{} HTTP/1.1", gateway);
    for (name, value) in &headers {
        println!("{}: {:?}", name, value);
    }
    println!();
    println!("{}", body);
    println!("----------------------------------------");
    axum::http::StatusCode::OK
}
