//! WebTransport server: one bidirectional stream per client.
//!
//! The first frame on the stream is the handshake (`Authenticate` or
//! `GuestLogin`). After that the read loop feeds actions to the hub while a
//! writer task drains the connection's outbox onto the stream.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use wtransport::endpoint::IncomingSession;
use wtransport::{Endpoint, RecvStream, SendStream};

use crate::config::ServerConfig;
use crate::hub::{ConnectError, WorldHub};
use crate::net::connection::{ConnectionId, Outbox, OutboxReceiver};
use crate::net::framing::{frame, read_message, write_frame, FramingError};
use crate::net::protocol::{decode, ClientMessage, ServerMessage};
use crate::net::tls::TlsConfig;
use crate::util::now_millis;

/// WebTransport server
pub struct WebTransportServer {
    config: ServerConfig,
    tls_config: TlsConfig,
    hub: Arc<WorldHub>,
}

impl WebTransportServer {
    pub async fn new(config: ServerConfig, hub: Arc<WorldHub>) -> anyhow::Result<Self> {
        let tls_config = TlsConfig::load(&config).await?;
        Ok(Self {
            config,
            tls_config,
            hub,
        })
    }

    /// Certificate hash for client configuration
    pub fn cert_hash(&self) -> &str {
        self.tls_config.cert_hash()
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.config.bind_address, self.config.port)
    }

    /// Accept connections until the endpoint fails
    pub async fn run(self) -> anyhow::Result<()> {
        let addr = self.bind_addr();
        let server_config = wtransport::ServerConfig::builder()
            .with_bind_address(addr)
            .with_identity(self.tls_config.identity)
            .build();

        let server = Endpoint::server(server_config)?;
        info!("WebTransport server listening on {}", addr);

        loop {
            let incoming = server.accept().await;
            let hub = self.hub.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(incoming, hub).await {
                    warn!("Connection error: {}", e);
                }
            });
        }
    }
}

/// Drain the outbox onto the stream. Ends when every sender is gone (the hub
/// removed the connection) or the stream fails.
async fn write_loop(mut send: SendStream, mut outbox: OutboxReceiver) {
    while let Some(frame) = outbox.recv().await {
        if let Err(e) = write_frame(&mut send, &frame).await {
            debug!("Stream write error: {}", e);
            return;
        }
    }
    if let Err(e) = send.finish().await {
        debug!("Stream finish error: {}", e);
    }
}

/// Handle a single WebTransport connection
async fn handle_connection(incoming: IncomingSession, hub: Arc<WorldHub>) -> anyhow::Result<()> {
    let session_request = incoming.await?;
    debug!(
        "New session from {:?}, path: {}",
        session_request.authority(),
        session_request.path()
    );
    let connection = session_request.accept().await?;
    let (send, mut recv) = connection.accept_bi().await?;

    let (outbox, rx) = Outbox::new();
    let mut writer = tokio::spawn(write_loop(send, rx));

    // Kept only until the handshake resolves, so a rejection can still be
    // written; afterwards the hub holds the sole sender
    let handshake_outbox = outbox.clone();
    let conn = match handshake(&hub, &mut recv, outbox).await {
        Ok(conn) => conn,
        Err(reason) => {
            info!("Handshake rejected: {}", reason);
            if let Ok(rejection) = frame(&ServerMessage::AuthRejected { reason }) {
                let _ = handshake_outbox.push(rejection);
            }
            drop(handshake_outbox);
            let _ = writer.await;
            return Ok(());
        }
    };
    drop(handshake_outbox);

    read_loop(&hub, conn, &mut recv, &mut writer).await;
    hub.disconnect(conn);
    Ok(())
}

/// Resolve the first frame into a bound connection, or a rejection reason
async fn handshake(hub: &Arc<WorldHub>, recv: &mut RecvStream, outbox: Outbox) -> Result<ConnectionId, String> {
    let payload = read_message(recv).await.map_err(|e| e.to_string())?;
    hub.metrics().messages_received.fetch_add(1, Ordering::Relaxed);

    let first = decode::<ClientMessage>(&payload).map_err(|e| e.to_string())?;
    let hub = hub.clone();
    // Binding may touch the player store
    let bound = match first {
        ClientMessage::Authenticate { token, room } => {
            tokio::task::spawn_blocking(move || hub.connect(&token, room, outbox)).await
        }
        ClientMessage::GuestLogin { room } => {
            tokio::task::spawn_blocking(move || hub.login_guest(room, outbox, &mut rand::thread_rng())).await
        }
        _ => return Err("Expected Authenticate or GuestLogin".to_string()),
    };

    match bound {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(ConnectError::Store(e))) => {
            warn!("Account store error during handshake: {}", e);
            Err("Account unavailable".to_string())
        }
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("handshake task failed: {e}")),
    }
}

async fn read_loop(
    hub: &Arc<WorldHub>,
    conn: ConnectionId,
    recv: &mut RecvStream,
    writer: &mut JoinHandle<()>,
) {
    loop {
        tokio::select! {
            result = read_message(recv) => {
                let payload = match result {
                    Ok(payload) => payload,
                    Err(FramingError::ConnectionClosed) => {
                        debug!("Connection {} closed by client", conn);
                        return;
                    }
                    Err(e) => {
                        warn!("Connection {} read error: {}", conn, e);
                        return;
                    }
                };
                hub.metrics().messages_received.fetch_add(1, Ordering::Relaxed);

                match decode::<ClientMessage>(&payload) {
                    Ok(ClientMessage::Action(action)) => {
                        let followup = hub.dispatch(conn, action, now_millis(), &mut rand::thread_rng());
                        if let Some(followup) = followup {
                            let worker = hub.clone();
                            if let Err(e) = tokio::task::spawn_blocking(move || worker.run_followup(followup)).await {
                                warn!("Admin followup task failed: {}", e);
                            }
                        }
                    }
                    Ok(ClientMessage::Ping { timestamp }) => {
                        hub.reply(conn, &ServerMessage::Pong {
                            client_timestamp: timestamp,
                            server_timestamp: now_millis(),
                        });
                    }
                    Ok(_) => debug!("Ignoring repeated handshake from {}", conn),
                    Err(e) => warn!("Failed to decode client message from {}: {}", conn, e),
                }
            }
            _ = &mut *writer => {
                debug!("Connection {} writer finished", conn);
                return;
            }
        }
    }
}
