use std::{future::IntoFuture, process, time::Duration};

use purger::{
    application::{error::AppError, operators::OperatorDirectory, operators::hash_key_hex},
    config,
    infra::{
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
    purge::PurgeConfig,
};
use time::OffsetDateTime;
use tokio::sync::oneshot;
use tracing::{Dispatch, Level, debug, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

const NONCE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

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
        .map_err(|err| AppError::from(InfraError::configuration(err.to_string())))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::HashKey(args) => {
            println!("{}", hash_key_hex(&args.key));
            Ok(())
        }
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let operators = OperatorDirectory::from_settings(&settings.auth.operators);
    if operators.is_empty() {
        warn!(
            target = "purger::serve",
            "No operators configured; every API request will be rejected"
        );
    } else {
        info!(
            target = "purger::serve",
            operators = operators.len(),
            "Operator keys loaded"
        );
    }

    let state = ApiState::new(
        PurgeConfig::from(&settings.purge),
        operators,
        settings.auth.nonce_ttl,
        settings.purge.site_host.clone(),
    )
    .map_err(|err| AppError::from(InfraError::from(err)))?;

    let sweeper = spawn_nonce_sweeper(state.clone());
    let result = serve_http(&settings, state).await;

    sweeper.abort();
    let _ = sweeper.await;

    result
}

fn spawn_nonce_sweeper(state: ApiState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(NONCE_SWEEP_INTERVAL);
        interval.tick().await; // Skip the first immediate tick
        loop {
            interval.tick().await;
            let removed = state.nonces.purge_expired(OffsetDateTime::now_utc());
            if removed > 0 {
                debug!(target = "purger::nonces", removed, "Expired nonces dropped");
            }
        }
    })
}

async fn serve_http(settings: &config::Settings, state: ApiState) -> Result<(), AppError> {
    let router = http::build_router(state);

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "purger::serve",
        addr = %settings.server.addr,
        "Listening"
    );

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = signalled_tx.send(());
        })
        .into_future();

    let grace = settings.server.graceful_shutdown;
    let deadline = async move {
        if signalled_rx.await.is_ok() {
            tokio::time::sleep(grace).await;
        } else {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = server => {
            result.map_err(|err| AppError::unexpected(format!("server error: {err}")))?;
        }
        _ = deadline => {
            warn!(
                target = "purger::serve",
                grace_seconds = grace.as_secs(),
                "Graceful shutdown timed out; dropping open connections"
            );
        }
    }

    info!(target = "purger::serve", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(
            target = "purger::serve",
            error = %err,
            "Failed to listen for shutdown signal"
        );
        std::future::pending::<()>().await;
    }
    info!(target = "purger::serve", "Shutdown signal received");
}
