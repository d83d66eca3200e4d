use anyhow::{Context, Result};
use std::net::SocketAddr;

use cosmic_birthday::config::Config;
use cosmic_birthday::relay::RelayServer;

/// Run the CORS relay until Ctrl-C
pub async fn relay(config: Config, bind: Option<SocketAddr>) -> Result<()> {
    let mut server = RelayServer::new(&config.relay).context("Failed to create relay")?;
    if let Some(addr) = bind {
        server = server.with_bind_address(addr);
    }

    println!("CORS relay listening on http://{}", server.bind_address());
    println!("  Example: http://{}/https://aa.usno.navy.mil/api/moon/phases/year?year=2024", server.bind_address());

    server
        .start_with_shutdown(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %err, "Failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        })
        .await?;

    Ok(())
}
