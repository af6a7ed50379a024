//! CubeSigner signer sidecar - main entry point.

use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use cubesigner_client::{CubeSignerClient, SignerApi};
use signer_sidecar::observability::{init_tracing, LoggingConfig, SERVICE_NAME};
use signer_sidecar::proto::signer_server::SignerServer;
use signer_sidecar::shutdown::{wait_for_signal, ShutdownCoordinator};
use signer_sidecar::{Args, Config, SessionManager, SignerService, SigningFacade};
use tokio::task::JoinError;
use tonic::transport::Server;
use tracing::{error, info, warn};

enum Exit {
    Signal,
    Expired,
    ServerStopped(Result<Result<(), tonic::transport::Error>, JoinError>),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(Args::parse()).context("invalid configuration")?;
    init_tracing(&LoggingConfig::from(&config)).context("failed to initialize logging")?;

    info!(
        service = SERVICE_NAME,
        version = env!("CARGO_PKG_VERSION"),
        key_id = %config.key_id,
        endpoint = %config.signer_endpoint,
        "Starting signer sidecar"
    );

    let addr = config.listen_addr()?;
    let api: Arc<dyn SignerApi> = Arc::new(CubeSignerClient::new(&config.client_config())?);

    let session = SessionManager::start(api.clone(), config.credential_source()?)
        .await
        .context("failed to obtain session credential")?;
    let session = Arc::new(session);
    let facade = Arc::new(SigningFacade::new(api, session.clone(), config.key_id.clone()));

    let mut coordinator = ShutdownCoordinator::new();

    let refresher = session.clone();
    let refresh_signal = coordinator.subscribe();
    coordinator.spawn("session-refresh", async move {
        if let Err(e) = refresher.schedule_refresh(refresh_signal).await {
            error!(error = %e, "Session refresh stopped");
        }
    });

    let mut server_signal = coordinator.subscribe();
    let mut server = tokio::spawn(
        Server::builder()
            .add_service(SignerServer::new(SignerService::new(facade)))
            .serve_with_shutdown(addr, async move { server_signal.cancelled().await }),
    );
    info!(%addr, "Signer service listening");

    let mut state = session.subscribe_state();
    let exit = tokio::select! {
        result = &mut server => Exit::ServerStopped(result),
        () = wait_for_signal() => Exit::Signal,
        Ok(_) = state.wait_for(|s| !s.is_healthy()) => Exit::Expired,
    };

    let expired = matches!(exit, Exit::Expired);
    coordinator.shutdown(config.shutdown_timeout()).await;

    match exit {
        Exit::ServerStopped(result) => {
            result.context("gRPC server task failed")??;
            bail!("gRPC server stopped unexpectedly");
        }
        Exit::Signal | Exit::Expired => {
            match tokio::time::timeout(config.shutdown_timeout(), &mut server).await {
                Ok(result) => result.context("gRPC server task failed")??,
                Err(_) => {
                    warn!("gRPC server did not drain in time, aborting");
                    server.abort();
                }
            }
        }
    }

    if expired {
        bail!("session refresh token expired; a new credential is required");
    }

    info!("Signer sidecar stopped");
    Ok(())
}
