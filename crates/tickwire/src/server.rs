//! `Server` builder and accept loop.
//!
//! This ties the layers together: every accepted WebSocket gets a
//! [`Session`], a [`SessionEndpoint`] and a [`HeartbeatService`]; the
//! default room runs on the shared bus under a [`LocalRoomManager`].

use std::net::SocketAddr;
use std::sync::Arc;

use tickwire_protocol::RoomId;
use tickwire_pubsub::MemoryPubSub;
use tickwire_room::{Application, LocalRoomManager, RoomConfig};
use tickwire_session::{
    Connection, EndpointConfig, HeartbeatConfig, HeartbeatService, Session, SessionEndpoint,
};
use tickwire_transport::{Listener, Transport, WebSocketListener};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{ServerConfig, TickwireError};

/// State shared by every connection task.
struct Shared {
    pubsub: Arc<MemoryPubSub>,
    rooms: Arc<LocalRoomManager<MemoryPubSub>>,
    config: ServerConfig,
    shutdown: CancellationToken,
}

/// Builder for configuring and starting a tickwire server.
///
/// # Example
///
/// ```rust,no_run
/// use tickwire::prelude::*;
///
/// # async fn start() -> Result<(), TickwireError> {
/// let server = Server::builder()
///     .bind("0.0.0.0:8080")
///     .build(EchoApplication::new())
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ServerBuilder {
    config: ServerConfig,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole configuration.
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the address to bind to.
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_addr = addr.into();
        self
    }

    pub fn endpoint_config(mut self, config: EndpointConfig) -> Self {
        self.config.endpoint = config;
        self
    }

    pub fn heartbeat_config(mut self, config: HeartbeatConfig) -> Self {
        self.config.heartbeat = config;
        self
    }

    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.config.room = config;
        self
    }

    /// Validates the configuration, binds the listener and spawns the
    /// default room running `app`.
    ///
    /// Must be called inside a tokio runtime.
    pub async fn build<A: Application>(self, app: A) -> Result<Server, TickwireError> {
        let config = self.config;
        config.validate()?;

        let pubsub = Arc::new(MemoryPubSub::with_config(&config.pubsub)?);
        let rooms = Arc::new(LocalRoomManager::new(
            Arc::clone(&pubsub),
            config.room.clone(),
        )?);
        let listener = WebSocketListener::bind(config.bind_addr.as_str()).await?;
        let default_room = rooms.spawn_room(app)?;
        tracing::info!(
            addr = %listener.local_addr()?,
            room_id = %default_room,
            "server bound"
        );

        Ok(Server {
            listener,
            default_room,
            shared: Arc::new(Shared {
                pubsub,
                rooms,
                config,
                shutdown: CancellationToken::new(),
            }),
        })
    }
}

/// A bound tickwire server.
///
/// Call [`run`](Self::run) to start accepting connections.
pub struct Server {
    listener: WebSocketListener,
    default_room: RoomId,
    shared: Arc<Shared>,
}

impl Server {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    pub fn local_addr(&self) -> Result<SocketAddr, TickwireError> {
        Ok(self.listener.local_addr()?)
    }

    /// The room auto-assigned sessions join.
    pub fn default_room(&self) -> RoomId {
        self.default_room
    }

    pub fn rooms(&self) -> &Arc<LocalRoomManager<MemoryPubSub>> {
        &self.shared.rooms
    }

    pub fn pubsub(&self) -> &Arc<MemoryPubSub> {
        &self.shared.pubsub
    }

    /// Cancelling this token stops the accept loop, closes every endpoint
    /// and stops every room.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shared.shutdown.clone()
    }

    /// Accepts connections until [`shutdown_token`](Self::shutdown_token)
    /// is cancelled, then waits for connections and rooms to wind down.
    pub async fn run(mut self) -> Result<(), TickwireError> {
        tracing::info!(room_id = %self.default_room, "server running");
        let mut connections = JoinSet::new();

        loop {
            tokio::select! {
                biased;
                _ = self.shared.shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((transport, peer)) => {
                        connections.spawn(serve(transport, peer, Arc::clone(&self.shared)));
                    }
                    Err(e) => tracing::error!(error = %e, "accept failed"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        tracing::info!(connections = connections.len(), "server shutting down");
        while connections.join_next().await.is_some() {}
        self.shared.rooms.shutdown().await;
        tracing::info!("server stopped");
        Ok(())
    }
}

/// Runs one client connection to completion.
async fn serve<T: Transport>(transport: T, peer: SocketAddr, shared: Arc<Shared>) {
    let session = Arc::new(Session::new());
    let session_id = session.id();
    let connection = Connection::new(session_id, transport);
    let endpoint = match SessionEndpoint::new(
        session,
        connection,
        Arc::clone(&shared.pubsub),
        Arc::clone(&shared.rooms),
        shared.config.endpoint.clone(),
    ) {
        Ok(endpoint) => Arc::new(endpoint.with_shutdown(&shared.shutdown)),
        Err(e) => {
            tracing::error!(%session_id, %peer, error = %e, "endpoint setup failed");
            return;
        }
    };

    match HeartbeatService::new(&shared.config.heartbeat, endpoint.outbound()) {
        Ok(heartbeat) => {
            tokio::spawn(heartbeat.run(endpoint.cancellation_token()));
        }
        Err(e) => tracing::warn!(%session_id, error = %e, "heartbeat disabled"),
    }

    tracing::info!(%session_id, %peer, "client connected");
    if let Err(e) = endpoint.run().await {
        tracing::error!(%session_id, %peer, error = %e, "endpoint failed");
    }
    tracing::info!(%session_id, %peer, "client disconnected");
}
