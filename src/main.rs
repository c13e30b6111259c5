use std::{future::IntoFuture, net::SocketAddr, process, sync::Arc, time::Duration};

use axum::Router;
use phonepulse::{
    application::{
        content::ContentService,
        edge::{EdgeConfig, EdgeService},
        error::AppError,
        feedback::FeedbackService,
    },
    config,
    infra::{
        contentstack::{ContentstackDelivery, ContentstackManagement},
        error::InfraError,
        http::{self, EdgeState, OriginState},
        personalize::EdgePersonalizeEngine,
        telemetry, upstream,
    },
};
use reqwest::Client;
use tokio::{net::TcpListener, sync::watch, try_join};
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
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    let client = upstream::build_client(&settings.upstream)?;
    let shutdown = spawn_shutdown_listener();
    let grace = settings.server.graceful_shutdown;

    match command {
        config::Command::Serve(_) => {
            let origin = http::build_origin_router(build_origin_state(&settings, &client)?);
            let edge = http::build_edge_router(build_edge_state(&settings, &client)?);
            try_join!(
                serve("origin", settings.server.origin_addr, origin, shutdown.clone(), grace),
                serve("edge", settings.server.edge_addr, edge, shutdown, grace),
            )?;
            Ok(())
        }
        config::Command::Origin(_) => {
            let origin = http::build_origin_router(build_origin_state(&settings, &client)?);
            serve("origin", settings.server.origin_addr, origin, shutdown, grace).await
        }
        config::Command::Edge(_) => {
            let edge = http::build_edge_router(build_edge_state(&settings, &client)?);
            serve("edge", settings.server.edge_addr, edge, shutdown, grace).await
        }
    }
}

fn build_origin_state(settings: &config::Settings, client: &Client) -> Result<OriginState, AppError> {
    let delivery = ContentstackDelivery::new(client.clone(), &settings.contentstack)?;
    let management = ContentstackManagement::new(client.clone(), &settings.contentstack)?;

    Ok(OriginState {
        content: Arc::new(ContentService::new(Arc::new(delivery))),
        feedback: Arc::new(FeedbackService::new(Arc::new(management))),
        variant_query_param: Arc::from(settings.personalize.variant_query_param.as_str()),
        legacy_query_param: Arc::from(settings.personalize.legacy_query_param.as_str()),
    })
}

fn build_edge_state(settings: &config::Settings, client: &Client) -> Result<EdgeState, AppError> {
    if settings.personalize.project_uid.is_none() {
        warn!(
            target = "phonepulse::edge",
            "personalize.project_uid is not set; personalized requests will fail"
        );
    }

    let engine = EdgePersonalizeEngine::new(client.clone(), &settings.personalize)?;
    let edge = EdgeService::new(
        Arc::new(engine),
        EdgeConfig {
            variant_query_param: settings.personalize.variant_query_param.clone(),
            budget_cookie: settings.personalize.budget_cookie.clone(),
            detach_impressions: settings.personalize.detach_impressions,
            bypass_prefixes: settings.edge.bypass_prefixes.clone(),
        },
    );

    Ok(EdgeState {
        edge: Arc::new(edge),
        client: client.clone(),
        origin: settings.edge.origin_url.clone(),
        max_body_bytes: settings.edge.max_body_bytes,
    })
}

async fn serve(
    name: &'static str,
    addr: SocketAddr,
    router: Router,
    shutdown: watch::Receiver<bool>,
    grace: Duration,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "phonepulse::server", listener = name, addr = %addr, "listening");

    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(stop_requested(shutdown.clone()))
        .into_future();
    let deadline = async {
        stop_requested(shutdown).await;
        tokio::time::sleep(grace).await;
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("{name} server error: {err}")))
        }
        () = deadline => {
            warn!(
                target = "phonepulse::server",
                listener = name,
                grace_seconds = grace.as_secs(),
                "graceful shutdown timed out"
            );
            Ok(())
        }
    }
}

async fn stop_requested(mut shutdown: watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

fn spawn_shutdown_listener() -> watch::Receiver<bool> {
    let (sender, receiver) = watch::channel(false);
    tokio::spawn(async move {
        shutdown_signal().await;
        info!(target = "phonepulse::server", "shutdown requested");
        let _ = sender.send(true);
    });
    receiver
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(target = "phonepulse::server", error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(target = "phonepulse::server", error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
