//! `DicehallServer` builder and accept loop.
//!
//! Ties the layers together: transport → protocol → router → room logic.

use std::sync::Arc;

use dicehall_protocol::RoomName;
use dicehall_room::{ConnectionRegistry, RoomConfig, RoomLogic, RoomRouter};
use dicehall_transport::{Transport, TransportError, WebSocketTransport};

use crate::handler::handle_connection;
use crate::DicehallError;

/// Builder for configuring and starting a Dicehall server.
///
/// # Example
///
/// ```rust,ignore
/// use dicehall::prelude::*;
///
/// let server = DicehallServerBuilder::new()
///     .bind("0.0.0.0:8080")
///     .build(move |_room: &RoomName| {
///         ChatLogic::new(store.clone(), TableDice::new(), 100, max_age)
///     })
///     .await?;
/// server.run().await
/// ```
pub struct DicehallServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl DicehallServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets the room configuration.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener and builds the server. `make_logic` constructs
    /// the room logic for every actor the router spawns.
    pub async fn build<L: RoomLogic>(
        self,
        make_logic: impl Fn(&RoomName) -> L + Send + Sync + 'static,
    ) -> Result<DicehallServer<L>, DicehallError> {
        let transport = WebSocketTransport::bind(&self.bind_addr).await?;
        let router = Arc::new(RoomRouter::new(
            self.room_config,
            ConnectionRegistry::new(),
            make_logic,
        ));
        Ok(DicehallServer { transport, router })
    }
}

impl Default for DicehallServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running Dicehall server.
///
/// Call [`run()`](Self::run) to start accepting connections.
pub struct DicehallServer<L: RoomLogic> {
    transport: WebSocketTransport,
    router: Arc<RoomRouter<L>>,
}

impl<L: RoomLogic> DicehallServer<L> {
    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.transport.local_addr()
    }

    /// Runs the server accept loop.
    ///
    /// Accepts incoming connections and spawns a handler task per
    /// connection. Refused upgrades (bad parameters, plain HTTP) only
    /// affect the refused client. Runs until the process is terminated.
    pub async fn run(mut self) -> Result<(), DicehallError> {
        tracing::info!("Dicehall server running");

        loop {
            match self.transport.accept().await {
                Ok((conn, params)) => {
                    let router = Arc::clone(&self.router);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, params, router).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                    });
                }
                // The refused client already got its HTTP error response.
                Err(TransportError::BadRequest(reason)) => {
                    tracing::debug!(reason, "refused connection");
                }
                Err(TransportError::UpgradeRequired) => {
                    tracing::debug!("refused non-upgrade request");
                }
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                }
            }
        }
    }
}
