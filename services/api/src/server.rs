use crate::cli::ServeArgs;
use crate::infra::{build_services, load_directory, AppState, LogNotifier};
use crate::routes::with_workflow_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tna::config::AppConfig;
use tna::error::AppError;
use tna::telemetry;
use tna::workflows::notifications::{channel, NotificationDispatcher};
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    if let Some(directory) = args.directory.take() {
        config.directory.seed_file = Some(directory);
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let directory = Arc::new(load_directory(&config.directory)?);
    let (publisher, receiver) = channel(config.notifier.queue_capacity);
    let dispatcher = NotificationDispatcher::new(
        directory.clone(),
        Arc::new(LogNotifier::new(config.notifier.mail_from.clone())),
    )
    .spawn(receiver);

    let services = build_services(directory, publisher, config.workflow.hod_scope);
    let app = with_workflow_routes(services.training, services.surveys)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        hod_scope = %config.workflow.hod_scope,
        "training needs analysis service ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router owned the last publishers; the dispatcher drains and stops.
    match dispatcher.await {
        Ok(summary) => info!(
            delivered = summary.delivered,
            skipped = summary.skipped,
            failed = summary.failed,
            "notifications flushed"
        ),
        Err(err) => warn!(error = %err, "notification dispatcher aborted"),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "unable to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
