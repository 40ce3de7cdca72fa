use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::http::connection::Connection;
use crate::server::Engine;

pub async fn run(listener: TcpListener, engine: Arc<Engine>) -> anyhow::Result<()> {
    info!("Listening on {}", listener.local_addr()?);

    loop {
        let (socket, peer) = listener.accept().await?;
        tracing::debug!("Accepted connection from {}", peer);

        let engine = Arc::clone(&engine);
        tokio::spawn(async move {
            let mut conn = Connection::new(socket, peer.to_string(), engine);
            if let Err(e) = conn.run().await {
                tracing::error!("Connection error from {}: {}", peer, e);
            }
        });
    }
}
