use std::{process, sync::Arc};

use folio::{
    application::{
        error::AppError,
        render::{RenderPipeline, ViewRegistry},
        routing::{RoutingConfig, RoutingService, request_url},
    },
    cache::{FacadeConfig, FacadeService, FacadeTrigger},
    config,
    domain::content::ContentId,
    infra::{
        error::InfraError,
        http::{self, HttpState},
        render::JsonRenderInvoker,
        source::TomlContentSource,
        telemetry,
    },
};
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli().map_err(InfraError::from)?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Resolve(args) => run_resolve(settings, args).await,
        config::Command::Url(args) => run_url(settings, args).await,
    }
}

struct Services {
    facade: Arc<FacadeService>,
    routing: Arc<RoutingService>,
    pipeline: Arc<RenderPipeline>,
}

fn build_services(settings: &config::Settings) -> Services {
    let source = Arc::new(TomlContentSource::new(settings.content.path.clone()));
    let facade = Arc::new(FacadeService::new(
        FacadeConfig::from(&settings.facade),
        source,
    ));
    let routing = Arc::new(RoutingService::new(
        RoutingConfig::from_settings(settings),
        Arc::clone(&facade),
    ));
    let pipeline = Arc::new(RenderPipeline::new(
        ViewRegistry::from_settings(&settings.views),
        Arc::new(JsonRenderInvoker),
    ));

    Services {
        facade,
        routing,
        pipeline,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let services = build_services(&settings);

    let shutdown = CancellationToken::new();
    let worker = services.facade.spawn_worker(shutdown.clone());

    // The first read requests the initial build from the worker.
    let _ = services.facade.current_snapshot();

    let router = http::build_router(HttpState {
        routing: Arc::clone(&services.routing),
        pipeline: Arc::clone(&services.pipeline),
        trigger: FacadeTrigger::new(Arc::clone(&services.facade)),
    });

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| InfraError::bind(settings.server.addr, err))?;
    info!(
        addr = %settings.server.addr,
        content = %settings.content.path.display(),
        "folio listening"
    );

    let result = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::from(InfraError::Serve(err)));

    shutdown.cancel();
    if tokio::time::timeout(settings.server.graceful_shutdown, worker)
        .await
        .is_err()
    {
        warn!(
            timeout_secs = settings.server.graceful_shutdown.as_secs(),
            "Facade worker did not stop before the shutdown timeout"
        );
    }

    result
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

async fn run_resolve(
    settings: config::Settings,
    args: config::ResolveArgs,
) -> Result<(), AppError> {
    let services = build_services(&settings);
    services.facade.create_snapshot(false).await?;

    let url = request_url("http", &args.host, &args.path)?;
    let result = services.routing.resolve(url, CancellationToken::new())?;

    let encoded = serde_json::to_string_pretty(&result.summary())
        .map_err(|err| AppError::unexpected(format!("failed to encode resolution: {err}")))?;
    println!("{encoded}");
    Ok(())
}

async fn run_url(settings: config::Settings, args: config::UrlArgs) -> Result<(), AppError> {
    let services = build_services(&settings);
    services.facade.create_snapshot(false).await?;

    let current = request_url("http", &args.host, "/")?;
    let id = ContentId(args.id);
    let url = services
        .routing
        .url(current, id, args.mode, CancellationToken::new())?;

    match url {
        Some(url) => {
            println!("{url}");
            Ok(())
        }
        None => Err(AppError::validation(format!(
            "content {id} has no URL in snapshot {}",
            services.facade.store().current_version()
        ))),
    }
}
