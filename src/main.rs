use std::net::SocketAddr;
use vnpay_checkout::{config::GatewayConfig, router};

/// Payment gateway signing service entry point.
///
/// Environment variables:
/// - `VNPAY_TMN_CODE`, `VNPAY_HASH_SECRET`: merchant credentials (required)
/// - `VNPAY_URL`, `VNPAY_RETURN_URL`, `VNPAY_LOCALE`, `VNPAY_UTC_OFFSET`,
///   `VNPAY_ORDER_REF`: gateway settings, sandbox defaults otherwise
/// - `PORT`: HTTP listen port (default: 8888)
/// - `RUST_LOG`: logging verbosity (default: "vnpay_checkout=debug,tower_http=debug")
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "vnpay_checkout=debug,tower_http=debug".into())
        )
        .init();

    tracing::info!("Starting payment service");

    let cfg = GatewayConfig::from_env()?;
    tracing::info!(config = ?cfg, "configuration loaded");

    let app = router(cfg);

    let port = std::env::var("PORT")
        .unwrap_or_else(|_| "8888".to_string())
        .parse::<u16>()
        .unwrap_or(8888);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Server listening on {}", addr);

    // peer addresses feed both rate limiting and vnp_IpAddr
    axum::serve(
        tokio::net::TcpListener::bind(addr).await?,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;
    Ok(())
}
