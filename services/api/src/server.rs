use crate::cli::ServeArgs;
use crate::infra::{seed_ledger, AppState};
use crate::routes::with_allocation_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use property_ledger::config::AppConfig;
use property_ledger::error::AppError;
use property_ledger::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let ledger = seed_ledger(config.allocation)?;
    let app = with_allocation_routes(ledger.service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        isolate_save_failures = config.allocation.isolate_save_failures,
        seeded_transactions = ledger.transaction_ids.len(),
        "property ledger api ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
