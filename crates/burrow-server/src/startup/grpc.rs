//! gRPC server setup.

use std::net::SocketAddr;

use tonic::transport::{Identity, Server, ServerTlsConfig};
use tracing::info;

use burrow_api::grpc::burrow_server::BurrowServer;
use burrow_persistence::store::Substrate;

use crate::auth::TokenInterceptor;
use crate::config::Configuration;
use crate::service::BurrowService;
use crate::startup::shutdown::ShutdownSignal;

/// Binds the configured address and serves until the shutdown signal fires.
pub async fn serve<S: Substrate>(
    configuration: &Configuration,
    service: BurrowService<S>,
    shutdown: ShutdownSignal,
) -> anyhow::Result<()> {
    let addr: SocketAddr = configuration.server_address().parse()?;
    let interceptor = TokenInterceptor::new(configuration.server_token());

    let mut builder = Server::builder();
    if let (Some(cert_path), Some(key_path)) =
        (configuration.tls_cert_path(), configuration.tls_key_path())
    {
        let cert = tokio::fs::read(&cert_path).await?;
        let key = tokio::fs::read(&key_path).await?;
        let identity = Identity::from_pem(cert, key);
        builder = builder.tls_config(ServerTlsConfig::new().identity(identity))?;
        info!(cert = %cert_path, "TLS enabled");
    }

    info!(
        %addr,
        auth = configuration.server_token().is_some(),
        "Starting gRPC server"
    );

    let mut rx = shutdown.subscribe();
    builder
        .add_service(BurrowServer::with_interceptor(service, interceptor))
        .serve_with_shutdown(addr, async move {
            let _ = rx.recv().await;
        })
        .await?;

    info!("gRPC server stopped");
    Ok(())
}
