//! cellstore TCP server
//!
//! One tokio task per connection. Each task reads into a `BytesMut`, answers
//! every complete request in the buffer in order, and writes the replies
//! back in one batch, so pipelined clients are served without a round trip
//! per command. A request that cannot be framed gets an error reply and the
//! connection is closed; every other failure is just an error reply.

use crate::{
    command::Command,
    config::ServerConfig,
    db::Db,
    error::{CellStoreError, Result},
    protocol::{self, Response},
    snapshot::SnapshotSink,
};
use bytes::{Buf, BytesMut};
use std::sync::Arc;
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    sync::{broadcast, Semaphore},
};
use tracing::{debug, error, info, trace, warn};

/// cellstore TCP server
pub struct CellStoreServer {
    config: ServerConfig,
    db: Db,
    shutdown_tx: broadcast::Sender<()>,
    limit_connections: Arc<Semaphore>,
    snapshot_sink: Option<Arc<dyn SnapshotSink>>,
}

impl CellStoreServer {
    /// Create a new server instance with an empty keyspace
    pub fn new(config: ServerConfig) -> Result<Self> {
        Self::with_db(config, Db::new())
    }

    /// Create a server around an existing keyspace handle
    pub fn with_db(config: ServerConfig, db: Db) -> Result<Self> {
        config.validate()?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let limit_connections = Arc::new(Semaphore::new(config.max_connections));

        Ok(Self {
            config,
            db,
            shutdown_tx,
            limit_connections,
            snapshot_sink: None,
        })
    }

    /// Hand a snapshot of the keyspace to `sink` when the server stops
    pub fn with_snapshot_sink(mut self, sink: Arc<dyn SnapshotSink>) -> Self {
        self.snapshot_sink = Some(sink);
        self
    }

    pub fn db(&self) -> Db {
        self.db.clone()
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until shutdown
    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Serve connections from `listener` until shutdown
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        info!(addr = %listener.local_addr()?, "cellstore listening");

        let sweeper = self
            .config
            .active_expiry
            .then(|| self.db.spawn_expiry_sweeper());

        loop {
            let permit = tokio::select! {
                permit = self.limit_connections.clone().acquire_owned() => {
                    permit.map_err(|_| CellStoreError::Server("connection limiter closed".to_string()))?
                }
                _ = shutdown_rx.recv() => break,
            };

            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            debug!(%addr, "client connected");
                            let db = self.db.clone();
                            let shutdown_rx = self.shutdown_tx.subscribe();

                            tokio::spawn(async move {
                                if let Err(e) = handle_client(stream, db, shutdown_rx).await {
                                    warn!(%addr, error = %e, "connection closed with error");
                                }
                                debug!(%addr, "client disconnected");
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown_rx.recv() => break,
            }
        }

        info!("shutdown signal received, stopping server");
        self.db.shutdown();
        if let Some(sweeper) = sweeper {
            if let Err(e) = sweeper.await {
                error!(error = %e, "expiry task failed");
            }
        }

        if let Some(sink) = &self.snapshot_sink {
            let snapshot = self.db.snapshot();
            let keys = snapshot.len();
            sink.accept(snapshot)?;
            info!(keys, "snapshot handed off");
        }

        info!("server stopped");
        Ok(())
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&self) -> Result<()> {
        self.shutdown_tx
            .send(())
            .map_err(|_| CellStoreError::Server("Failed to send shutdown signal".to_string()))?;
        Ok(())
    }
}

/// Serve a single client connection
async fn handle_client(
    mut stream: TcpStream,
    db: Db,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<()> {
    let (mut reader, mut writer) = stream.split();
    let mut buffer = BytesMut::with_capacity(4096);
    let mut replies = Vec::new();

    loop {
        loop {
            match protocol::parse_request(&buffer) {
                Ok(Some((args, used))) => {
                    buffer.advance(used);
                    if !args.is_empty() {
                        process_command(args, &db).write_to(&mut replies);
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    Response::from(&e).write_to(&mut replies);
                    writer.write_all(&replies).await?;
                    return Err(e);
                }
            }
        }

        if !replies.is_empty() {
            writer.write_all(&replies).await?;
            replies.clear();
        }

        tokio::select! {
            result = reader.read_buf(&mut buffer) => {
                if result? == 0 {
                    if buffer.is_empty() {
                        return Ok(());
                    }
                    return Err(CellStoreError::Protocol(
                        "connection closed mid-request".to_string(),
                    ));
                }
            }

            _ = shutdown_rx.recv() => {
                debug!("closing client connection for shutdown");
                return Ok(());
            }
        }
    }
}

/// Parse and execute one request
pub(crate) fn process_command(args: Vec<Vec<u8>>, db: &Db) -> Response {
    match Command::from_args(args) {
        Ok(command) => {
            let name = command.name();
            let response = db.execute(command);
            trace!(command = name, error = response.is_error(), "executed");
            response
        }
        Err(e) => {
            debug!(error = %e, "rejected request");
            Response::from(&e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(line: &str) -> Vec<Vec<u8>> {
        line.split_whitespace()
            .map(|w| w.as_bytes().to_vec())
            .collect()
    }

    #[tokio::test]
    async fn test_server_creation() {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            max_connections: 10,
            ..ServerConfig::default()
        };

        let server = CellStoreServer::new(config).unwrap();
        // Nobody is listening yet, so there is no one to signal
        assert!(server.shutdown().is_err());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ServerConfig {
            max_connections: 0,
            ..ServerConfig::default()
        };
        assert!(matches!(
            CellStoreServer::new(config),
            Err(CellStoreError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_command_processing() {
        let db = Db::new();

        assert_eq!(process_command(args("SET key1 value1"), &db), Response::Ok);
        assert_eq!(
            process_command(args("GET key1"), &db),
            Response::Bulk(b"value1".to_vec())
        );
        assert_eq!(process_command(args("DEL key1"), &db), Response::Integer(1));
        assert_eq!(process_command(args("GET key1"), &db), Response::Null);
        assert_eq!(
            process_command(args("FROB key1"), &db),
            Response::Error("ERR unknown command 'frob'".to_string())
        );
    }
}
