//! # Gateway Application
//!
//! Binary that wires together all the components:
//! - Load configuration from environment
//! - Load the fee rules registry and the configured provider adapters
//! - Initialize the ledger repository
//! - Start the reconciliation worker and the HTTP server

mod config;

use std::sync::Arc;

use opentelemetry::global;
use opentelemetry_sdk::{metrics::SdkMeterProvider, propagation::TraceContextPropagator, trace as sdktrace};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fee_rules::FeeRulesRegistry;
use gateway_hex::{PaymentOrchestrator, ReconcileWorker, inbound::HttpServer};
use gateway_providers::{ProviderRegistry, ProvidersConfig};
use gateway_repo::build_repo;

fn init_tracer() -> anyhow::Result<(sdktrace::Tracer, sdktrace::SdkTracerProvider)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    // Use gRPC exporter with batch processing (non-blocking)
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()?;

    let provider = sdktrace::SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .build();

    global::set_tracer_provider(provider.clone());

    use opentelemetry::trace::TracerProvider as _;
    Ok((provider.tracer("payment-gateway"), provider))
}

/// Global meter provider read by the router's HTTP metrics layer.
fn init_meter() -> anyhow::Result<SdkMeterProvider> {
    let exporter = opentelemetry_otlp::MetricExporter::builder()
        .with_tonic()
        .build()?;

    let provider = SdkMeterProvider::builder()
        .with_periodic_exporter(exporter)
        .build();

    global::set_meter_provider(provider.clone());
    Ok(provider)
}

fn load_registry(path: Option<&str>) -> anyhow::Result<FeeRulesRegistry> {
    match path {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("cannot read fee rules {}: {}", path, e))?;
            tracing::info!("Loading fee rules from {}", path);
            Ok(FeeRulesRegistry::from_json_str(&json)?)
        }
        None => Ok(FeeRulesRegistry::builtin()?),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize OpenTelemetry tracing and metrics
    let (otel_tracer, otel_provider) = init_tracer()?;
    let meter_provider = init_meter()?;
    let telemetry = tracing_opentelemetry::layer().with_tracer(otel_tracer);

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,gateway_app=debug,gateway_hex=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry)
        .init();

    // Load configuration
    let config = config::Config::from_env()?;

    tracing::info!("Starting payment gateway on port {}", config.port);

    let registry = load_registry(config.fee_rules_path.as_deref())?;
    tracing::info!(methods = registry.len(), "Fee rules registry loaded");

    let providers = ProviderRegistry::from_config(&ProvidersConfig::from_env()?)?;

    // Build repository (handles connection and migration)
    let repo = build_repo(&config.database_url).await?;

    let orchestrator = Arc::new(PaymentOrchestrator::new(
        repo,
        Arc::new(registry),
        providers,
        config.orchestrator_settings(),
    ));

    for method in orchestrator.unroutable_methods() {
        tracing::warn!(
            method_id = %method.id,
            gateway = ?method.gateway,
            "Payment method routes to an adapter that is not configured"
        );
    }
    if config.public_url.is_none() {
        tracing::warn!("GATEWAY_PUBLIC_URL is not set; push-payment callbacks cannot be built");
    }

    let worker = tokio::spawn(
        ReconcileWorker::new(orchestrator.clone(), config.reconcile_interval).run(),
    );

    // Create and run the HTTP server
    let server = HttpServer::with_rate_limit(orchestrator, config.rate_limit_per_minute);
    let addr = format!("0.0.0.0:{}", config.port);

    let served = server.run(&addr).await;
    worker.abort();

    // Ensure traces and metrics are flushed before exit
    let _ = otel_provider.shutdown();
    let _ = meter_provider.shutdown();
    served
}
