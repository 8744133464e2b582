//! HTTP listener lifecycle.
//!
//! The listener owns the TCP accept loop for one instance. Its state machine
//! is Created -> Running <-> Stopped -> Disposed; dispose is terminal and
//! idempotent, and any start or shutdown after disposal fails with an
//! invalid-state error.

use super::instance::ProxyServer;
use super::pipeline::handle_request;
use crate::error::Error;
use crate::recording::RecordedContext;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Grace period for the accept loop to wind down on shutdown.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

enum State {
    Created,
    Running {
        shutdown_tx: broadcast::Sender<()>,
        accept_task: JoinHandle<()>,
        bound_addr: SocketAddr,
    },
    Stopped,
    Disposed,
}

pub struct HttpListener {
    state: Mutex<State>,
    /// Fires once per served request, after the response has been written.
    finished_tx: broadcast::Sender<Arc<RecordedContext>>,
}

impl HttpListener {
    pub fn new() -> Self {
        let (finished_tx, _) = broadcast::channel(64);
        Self {
            state: Mutex::new(State::Created),
            finished_tx,
        }
    }

    /// Bind the address and start accepting connections, dispatching each
    /// request through the instance pipeline. Starting a running listener is
    /// a no-op.
    pub async fn start(&self, addr: SocketAddr, server: Arc<ProxyServer>) -> Result<(), Error> {
        {
            let state = self.state.lock();
            match *state {
                State::Disposed => return Err(Error::InvalidState("listener has been disposed")),
                State::Running { .. } => return Ok(()),
                State::Created | State::Stopped => {}
            }
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Bind(addr.port(), e.to_string()))?;
        let bound_addr = listener
            .local_addr()
            .map_err(|e| Error::Bind(addr.port(), e.to_string()))?;

        let (shutdown_tx, mut shutdown_rx) = broadcast::channel(1);
        let accept_server = Arc::clone(&server);

        let accept_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    result = listener.accept() => {
                        match result {
                            Ok((stream, client_addr)) => {
                                let server = Arc::clone(&accept_server);
                                tokio::spawn(async move {
                                    let io = TokioIo::new(stream);
                                    let service = service_fn(move |req| {
                                        let server = Arc::clone(&server);
                                        async move { handle_request(req, server, client_addr).await }
                                    });
                                    if let Err(e) = http1::Builder::new()
                                        .serve_connection(io, service)
                                        .await
                                    {
                                        debug!("Connection error on {}: {}", bound_addr, e);
                                    }
                                });
                            }
                            Err(e) => {
                                error!("Accept error on {}: {}", bound_addr, e);
                            }
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        info!("Listener on {} shutting down", bound_addr);
                        break;
                    }
                }
            }
        });

        let mut state = self.state.lock();
        *state = State::Running {
            shutdown_tx,
            accept_task,
            bound_addr,
        };
        info!("Listening on {}", bound_addr);
        Ok(())
    }

    /// Stop accepting connections. In-flight handlers run to completion on
    /// their own tasks; the accept loop itself is awaited within a grace
    /// period. Shutting down a stopped listener is a no-op.
    pub async fn shutdown(&self) -> Result<(), Error> {
        let previous = {
            let mut state = self.state.lock();
            match *state {
                State::Disposed => return Err(Error::InvalidState("listener has been disposed")),
                State::Created | State::Stopped => return Ok(()),
                State::Running { .. } => std::mem::replace(&mut *state, State::Stopped),
            }
        };

        if let State::Running {
            shutdown_tx,
            accept_task,
            ..
        } = previous
        {
            let _ = shutdown_tx.send(());
            if tokio::time::timeout(SHUTDOWN_GRACE, accept_task).await.is_err() {
                error!("Accept loop did not stop within the grace period");
            }
        }
        Ok(())
    }

    /// Terminal transition. Shuts down first when running; repeated calls
    /// are no-ops.
    pub async fn dispose(&self) {
        {
            let state = self.state.lock();
            if matches!(*state, State::Disposed) {
                return;
            }
        }
        let _ = self.shutdown().await;
        *self.state.lock() = State::Disposed;
    }

    /// Best-effort synchronous shutdown signal, for drop paths that cannot
    /// await. The accept task notices the signal on its next poll.
    pub fn signal_shutdown(&self) {
        let state = self.state.lock();
        if let State::Running {
            ref shutdown_tx, ..
        } = *state
        {
            let _ = shutdown_tx.send(());
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(*self.state.lock(), State::Running { .. })
    }

    pub fn is_disposed(&self) -> bool {
        matches!(*self.state.lock(), State::Disposed)
    }

    /// The address actually bound, once running. Reports the real port when
    /// the configured port was 0.
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        match *self.state.lock() {
            State::Running { bound_addr, .. } => Some(bound_addr),
            _ => None,
        }
    }

    pub(crate) fn notify_finished(&self, context: Arc<RecordedContext>) {
        // Nobody listening is fine.
        let _ = self.finished_tx.send(context);
    }

    /// Subscribe to the request-finished notification stream.
    pub fn subscribe_finished(&self) -> broadcast::Receiver<Arc<RecordedContext>> {
        self.finished_tx.subscribe()
    }
}

impl Default for HttpListener {
    fn default() -> Self {
        Self::new()
    }
}
