//! HTTP Server configuration and startup.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use gateway_types::LedgerRepository;

use super::handlers::{self, AppState};
use super::rate_limit::{RateLimiterState, rate_limit_middleware};
use crate::PaymentOrchestrator;
use crate::openapi::ApiDoc;

/// HTTP Server for the Gateway API.
pub struct HttpServer<R: LedgerRepository> {
    state: Arc<AppState<R>>,
    rate_limiter: Arc<RateLimiterState>,
}

impl<R: LedgerRepository> HttpServer<R> {
    /// Creates a new HTTP server with the default rate limit (100 req/min).
    pub fn new(orchestrator: Arc<PaymentOrchestrator<R>>) -> Self {
        Self {
            state: Arc::new(AppState { orchestrator }),
            rate_limiter: Arc::new(RateLimiterState::default()),
        }
    }

    /// Creates a new HTTP server with custom rate limiting.
    pub fn with_rate_limit(
        orchestrator: Arc<PaymentOrchestrator<R>>,
        requests_per_minute: u32,
    ) -> Self {
        Self {
            state: Arc::new(AppState { orchestrator }),
            rate_limiter: Arc::new(RateLimiterState::new(
                requests_per_minute,
                Duration::from_secs(60),
            )),
        }
    }

    /// Builds the Axum router with all routes.
    pub fn router(&self) -> Router {
        // Build HTTP metrics layer (uses globally set MeterProvider)
        let metrics = axum_otel_metrics::HttpMetricsLayerBuilder::new().build();

        let api = Router::new()
            .route("/health", get(handlers::health))
            // Registry
            .route("/api/methods", get(handlers::list_methods::<R>))
            .route("/api/methods/{id}", get(handlers::get_method::<R>))
            .route("/api/regions", get(handlers::list_regions::<R>))
            .route("/api/regions/{country}", get(handlers::get_region::<R>))
            .route("/api/fees/quote", post(handlers::quote_fee::<R>))
            .route("/api/rates", get(handlers::external_rate::<R>))
            // Money movement
            .route("/api/deposits", post(handlers::create_deposit::<R>))
            .route("/api/withdrawals", post(handlers::create_withdrawal::<R>))
            .route("/api/transactions", get(handlers::list_transactions::<R>))
            .route("/api/transactions/{id}", get(handlers::get_transaction::<R>))
            .route(
                "/api/transactions/{id}/cancel",
                post(handlers::cancel_transaction::<R>),
            )
            .route(
                "/api/transactions/{id}/verify",
                post(handlers::verify_transaction::<R>),
            )
            .route(
                "/api/transactions/{id}/refund",
                post(handlers::refund_transaction::<R>),
            )
            .route("/api/balances", get(handlers::balances::<R>))
            .route("/api/summary/daily", get(handlers::daily_summary::<R>))
            // Payout destinations
            .route(
                "/api/bank-accounts",
                post(handlers::create_bank_account::<R>).get(handlers::list_bank_accounts::<R>),
            )
            .route(
                "/api/bank-accounts/{id}",
                get(handlers::get_bank_account::<R>)
                    .patch(handlers::update_bank_account::<R>)
                    .delete(handlers::delete_bank_account::<R>),
            )
            .route(
                "/api/bank-accounts/{id}/default",
                post(handlers::set_default_bank_account::<R>),
            )
            .route(
                "/api/withdrawal-methods",
                post(handlers::create_withdrawal_method::<R>)
                    .get(handlers::list_withdrawal_methods::<R>),
            )
            .route(
                "/api/withdrawal-methods/{id}",
                delete(handlers::deactivate_withdrawal_method::<R>),
            )
            .route(
                "/api/withdrawal-methods/{id}/default",
                post(handlers::set_default_withdrawal_method::<R>),
            )
            // Providers & operations
            .route("/api/webhooks/{gateway}", post(handlers::provider_webhook::<R>))
            .route("/api/reconcile", post(handlers::reconcile::<R>))
            .layer(metrics)
            .layer(middleware::from_fn_with_state(
                self.rate_limiter.clone(),
                rate_limit_middleware,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state.clone());

        api.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    }

    /// Runs the server on the given address with graceful shutdown.
    pub async fn run(self, addr: &str) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on {}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        Ok(())
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown...");
}
