//! Loopback demo: every client joins one room that re-broadcasts the last
//! frame it received each tick.
//!
//! ```text
//! cargo run -p echo-server -- [config.json]
//! ```

use tickwire::prelude::*;

#[tokio::main]
async fn main() -> Result<(), TickwireError> {
    tickwire::init_tracing();

    let config = match std::env::args().nth(1) {
        Some(path) => ServerConfig::from_file(path)?,
        None => ServerConfig::default(),
    };

    let server = Server::builder()
        .config(config)
        .build(EchoApplication::new())
        .await?;
    tracing::info!(
        addr = %server.local_addr()?,
        room_id = %server.default_room(),
        "echo server ready"
    );

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received");
            shutdown.cancel();
        }
    });

    server.run().await
}
