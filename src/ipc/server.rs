//! TCP server: accept loop, per-connection protocol loop, readiness
//! handshake wiring, list-changed fan-out and the usage flush ticker.

use crate::catalog::engine::CatalogEngine;
use crate::ipc::codec::{self, Frame, MSG_REQUEST};
use crate::ipc::dispatch::{error_response, Dispatcher, Request};
use crate::ipc::handshake::{self, Handshake, HandshakeSignal};
use crate::metrics::Metrics;
use crate::types::{Config, Error, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, BufReader, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Fan-out channel depth for catalog change events. Laggy receivers
/// coalesce: a missed event still produces one notification.
const CHANGE_CHANNEL_CAPACITY: usize = 64;

pub struct Server {
    config: Config,
    engine: Arc<Mutex<CatalogEngine>>,
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    changes: broadcast::Sender<()>,
}

impl Server {
    pub fn new(
        config: Config,
        engine: Arc<Mutex<CatalogEngine>>,
        dispatcher: Arc<Dispatcher>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self { config, engine, dispatcher, metrics, changes }
    }

    /// Bind the configured address and serve until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let listener = TcpListener::bind(&self.config.server.listen_addr).await?;
        info!(addr = %self.config.server.listen_addr, "listening");
        self.run_on(listener, shutdown).await
    }

    /// Serve on an already-bound listener. Used directly by tests.
    pub async fn run_on(self, listener: TcpListener, shutdown: CancellationToken) -> Result<()> {
        let permits = Arc::new(Semaphore::new(self.config.ipc.max_connections));
        let flush_task = tokio::spawn(usage_flush_loop(
            Arc::clone(&self.engine),
            self.config.catalog.usage_flush_interval,
            shutdown.clone(),
        ));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                            continue;
                        }
                    };
                    let Ok(permit) = Arc::clone(&permits).try_acquire_owned() else {
                        self.metrics.connection_rejected();
                        warn!(%peer, "connection limit reached, dropping");
                        continue;
                    };
                    self.metrics.connection_accepted();
                    debug!(%peer, "connection accepted");

                    let conn = Connection {
                        dispatcher: Arc::clone(&self.dispatcher),
                        metrics: Arc::clone(&self.metrics),
                        changes_tx: self.changes.clone(),
                        changes_rx: self.changes.subscribe(),
                        read_timeout: Duration::from_secs(self.config.ipc.read_timeout_secs),
                        write_timeout: Duration::from_secs(self.config.ipc.write_timeout_secs),
                        max_frame_bytes: self.config.ipc.max_frame_bytes as usize,
                    };
                    let token = shutdown.clone();
                    tokio::spawn(async move {
                        if let Err(e) = conn.serve(stream, token).await {
                            debug!(%peer, error = %e, "connection closed with error");
                        }
                        drop(permit);
                    });
                }
            }
        }

        // Final flush so increments made since the last tick survive shutdown.
        if let Err(e) = flush_task.await {
            error!(error = %e, "usage flush task panicked");
        }
        let mut engine = self.engine.lock().await;
        engine.flush_usage()?;
        info!("server stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("listen_addr", &self.config.server.listen_addr)
            .finish_non_exhaustive()
    }
}

struct Connection {
    dispatcher: Arc<Dispatcher>,
    metrics: Arc<Metrics>,
    changes_tx: broadcast::Sender<()>,
    changes_rx: broadcast::Receiver<()>,
    read_timeout: Duration,
    write_timeout: Duration,
    max_frame_bytes: usize,
}

impl Connection {
    async fn serve(mut self, stream: TcpStream, shutdown: CancellationToken) -> Result<()> {
        let (read_half, write_half) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        let mut writer = BufWriter::new(write_half);
        let mut handshake = Handshake::new();

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                changed = self.changes_rx.recv() => {
                    match changed {
                        Ok(()) | Err(broadcast::error::RecvError::Lagged(_)) => {
                            if handshake.mark_list_changed() {
                                self.write_notification(
                                    &mut writer,
                                    handshake::list_changed_payload(),
                                ).await?;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
                read = tokio::time::timeout(
                    self.read_timeout,
                    codec::read_frame(&mut reader, self.max_frame_bytes),
                ) => {
                    let frame = match read {
                        Err(_) => {
                            debug!("read timeout, closing connection");
                            break;
                        }
                        Ok(Err(e)) => return Err(e),
                        Ok(Ok(None)) => break,
                        Ok(Ok(Some(frame))) => frame,
                    };
                    self.metrics.frame_read();
                    if !self.handle_frame(&frame, &mut handshake, &mut writer, &shutdown).await? {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    /// Process one inbound frame. Returns false when the connection should
    /// close (shutdown observed mid-request).
    async fn handle_frame<W>(
        &self,
        frame: &Frame,
        handshake: &mut Handshake,
        writer: &mut W,
        shutdown: &CancellationToken,
    ) -> Result<bool>
    where
        W: AsyncWrite + Unpin,
    {
        if frame.msg_type != MSG_REQUEST {
            debug!(msg_type = frame.msg_type, "ignoring non-request frame");
            return Ok(true);
        }
        let request: Request = match frame.decode() {
            Ok(req) => req,
            Err(e) => {
                // No id to correlate; answer with an unaddressed error frame.
                let payload = error_response("", "", &Error::validation(e.to_string()));
                self.write_error(writer, payload).await?;
                return Ok(true);
            }
        };

        if request.method == "initialize" {
            handshake.observe_initialize();
        }

        // Shutdown racing a request still yields exactly one terminal
        // response for its id, marked best-effort.
        let outcome = tokio::select! {
            outcome = self.dispatcher.dispatch(&request) => outcome,
            _ = shutdown.cancelled() => {
                let mut payload = error_response(
                    &request.id,
                    &request.method,
                    &Error::cancelled("server shutting down"),
                );
                payload["error"]["data"]["bestEffort"] = Value::Bool(true);
                self.write_error(writer, payload).await?;
                return Ok(false);
            }
        };

        self.write_response(writer, outcome.response).await?;

        if request.method == "initialize" {
            // The flush above must be observable before readiness latches.
            tokio::task::yield_now().await;
            for signal in handshake.note_response_flushed() {
                let payload = match signal {
                    HandshakeSignal::Ready => handshake::ready_payload(),
                    HandshakeSignal::ListChanged => handshake::list_changed_payload(),
                };
                self.write_notification(writer, payload).await?;
            }
        }

        if outcome.catalog_changed {
            // Fan out to every connection, this one included; each gate
            // decides whether to emit now or coalesce until ready.
            let _ = self.changes_tx.send(());
        }
        Ok(true)
    }

    async fn write_response<W>(&self, writer: &mut W, payload: Value) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Frame::response(codec::encode(&payload)?);
        self.write_frame(writer, &frame).await
    }

    async fn write_error<W>(&self, writer: &mut W, payload: Value) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Frame::error(codec::encode(&payload)?);
        self.write_frame(writer, &frame).await
    }

    async fn write_notification<W>(&self, writer: &mut W, payload: Value) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let frame = Frame::notification(codec::encode(&payload)?);
        self.write_frame(writer, &frame).await
    }

    async fn write_frame<W>(&self, writer: &mut W, frame: &Frame) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        tokio::time::timeout(self.write_timeout, codec::write_frame(writer, frame))
            .await
            .map_err(|_| Error::internal("write timeout"))??;
        self.metrics.frame_written();
        Ok(())
    }
}

/// Periodically persist the usage snapshot while increments are pending.
async fn usage_flush_loop(
    engine: Arc<Mutex<CatalogEngine>>,
    interval: Duration,
    shutdown: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                let mut engine = engine.lock().await;
                match engine.flush_usage() {
                    Ok(true) => debug!("usage snapshot flushed"),
                    Ok(false) => {}
                    Err(e) => warn!(error = %e, "usage flush failed"),
                }
            }
        }
    }
}
