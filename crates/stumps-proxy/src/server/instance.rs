//! One mocked host: listener + stump registry + recording buffer + counters.

use super::listener::HttpListener;
use super::{FallbackResponse, RecordingBehavior, ServerConfig};
use crate::error::Error;
use crate::persistence::DataAccess;
use crate::recording::{RecordedContext, RecordingBuffer, ResponseOrigin};
use crate::stump::{Stump, StumpContract, StumpRegistry};
use parking_lot::{Mutex, RwLock};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast;
use tracing::info;

/// Monotone per-instance request counters.
///
/// Exactly one of the stump/proxy counters moves per served request; the
/// fallback stage moves only the total. All increments happen once the
/// response has been written.
#[derive(Default)]
pub struct ServerCounters {
    total: AtomicU64,
    with_stump: AtomicU64,
    with_proxy: AtomicU64,
}

impl ServerCounters {
    pub(crate) fn record(&self, origin: ResponseOrigin) {
        self.total.fetch_add(1, Ordering::SeqCst);
        match origin {
            ResponseOrigin::Stump => {
                self.with_stump.fetch_add(1, Ordering::SeqCst);
            }
            ResponseOrigin::Proxy => {
                self.with_proxy.fetch_add(1, Ordering::SeqCst);
            }
            ResponseOrigin::Fallback => {}
        }
    }

    pub fn total_requests_served(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn requests_served_with_stump(&self) -> u64 {
        self.with_stump.load(Ordering::SeqCst)
    }

    pub fn requests_served_with_proxy(&self) -> u64 {
        self.with_proxy.load(Ordering::SeqCst)
    }
}

struct RecordingState {
    recording: bool,
    /// `stumps_enabled` as it was when recording was switched on, restored
    /// when recording is switched off again.
    saved_stumps_enabled: Option<bool>,
}

/// A single proxy instance.
///
/// Created stopped; `start` binds the listener, `shutdown` releases it, and
/// `dispose` is the terminal, idempotent teardown. Administrative calls on a
/// disposed instance fail with an invalid-state error.
pub struct ProxyServer {
    /// Back-reference handed to the listener so request handlers can hold
    /// the instance alive.
    self_ref: Weak<ProxyServer>,
    config: RwLock<ServerConfig>,
    stumps_enabled: AtomicBool,
    record_traffic: AtomicBool,
    recording: Mutex<RecordingState>,
    counters: ServerCounters,
    stumps: StumpRegistry,
    recordings: RecordingBuffer,
    listener: HttpListener,
    disposed: AtomicBool,
}

impl ProxyServer {
    pub fn new(config: ServerConfig, data_access: Arc<dyn DataAccess>) -> Result<Arc<Self>, Error> {
        if config.server_id.trim().is_empty() {
            return Err(Error::invalid_argument("server id must not be empty"));
        }

        let server = Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            stumps_enabled: AtomicBool::new(config.stumps_enabled),
            record_traffic: AtomicBool::new(false),
            recording: Mutex::new(RecordingState {
                recording: false,
                saved_stumps_enabled: None,
            }),
            counters: ServerCounters::default(),
            stumps: StumpRegistry::new(&config.server_id, data_access),
            recordings: RecordingBuffer::new(),
            listener: HttpListener::new(),
            disposed: AtomicBool::new(false),
            config: RwLock::new(config.clone()),
        });
        if config.record_traffic {
            server.set_record_traffic(true);
        }
        Ok(server)
    }

    pub fn server_id(&self) -> String {
        self.config.read().server_id.clone()
    }

    /// Current configuration, with the mutable flags folded back in.
    pub fn config(&self) -> ServerConfig {
        let mut config = self.config.read().clone();
        config.stumps_enabled = self.stumps_enabled();
        config.record_traffic = self.record_traffic();
        config
    }

    pub fn external_host_name(&self) -> String {
        self.config.read().external_host_name.clone()
    }

    pub fn set_external_host_name(&self, host: &str) {
        self.config.write().external_host_name = host.to_string();
    }

    pub fn use_secure_transport(&self) -> bool {
        self.config.read().use_secure_transport
    }

    pub fn set_use_secure_transport(&self, secure: bool) {
        self.config.write().use_secure_transport = secure;
    }

    pub fn listening_port(&self) -> u16 {
        self.config.read().listening_port
    }

    pub fn auto_start(&self) -> bool {
        self.config.read().auto_start
    }

    pub fn fallback_response(&self) -> FallbackResponse {
        self.config.read().fallback_response
    }

    pub fn set_fallback_response(&self, fallback: FallbackResponse) {
        self.config.write().fallback_response = fallback;
    }

    pub fn recording_behavior(&self) -> RecordingBehavior {
        self.config.read().recording_behavior
    }

    pub fn set_recording_behavior(&self, behavior: RecordingBehavior) {
        self.config.write().recording_behavior = behavior;
    }

    pub fn stumps_enabled(&self) -> bool {
        self.stumps_enabled.load(Ordering::SeqCst)
    }

    pub fn set_stumps_enabled(&self, enabled: bool) {
        self.stumps_enabled.store(enabled, Ordering::SeqCst);
    }

    pub fn record_traffic(&self) -> bool {
        self.record_traffic.load(Ordering::SeqCst)
    }

    /// Switch traffic recording on or off.
    ///
    /// With `DisableStumpsWhileRecording`, switching on snapshots the current
    /// `stumps_enabled` value and forces it off; switching recording off
    /// restores the snapshot. Repeated calls in the same direction are
    /// no-ops, so the snapshot is never overwritten mid-recording.
    pub fn set_record_traffic(&self, enabled: bool) {
        let mut state = self.recording.lock();
        if state.recording == enabled {
            return;
        }
        state.recording = enabled;
        self.record_traffic.store(enabled, Ordering::SeqCst);

        if enabled {
            if self.recording_behavior() == RecordingBehavior::DisableStumpsWhileRecording {
                state.saved_stumps_enabled = Some(self.stumps_enabled());
                self.set_stumps_enabled(false);
            }
        } else if let Some(previous) = state.saved_stumps_enabled.take() {
            self.set_stumps_enabled(previous);
        }
    }

    pub fn counters(&self) -> &ServerCounters {
        &self.counters
    }

    pub fn recordings(&self) -> &RecordingBuffer {
        &self.recordings
    }

    // ----- stump registry delegation -----

    pub fn create_stump(&self, contract: StumpContract) -> Result<StumpContract, Error> {
        self.ensure_not_disposed()?;
        self.stumps.create_stump(contract)
    }

    /// Turn a recorded exchange into a registered stump.
    pub fn create_stump_from_recording(
        &self,
        name: &str,
        context: &RecordedContext,
    ) -> Result<StumpContract, Error> {
        self.ensure_not_disposed()?;
        self.stumps.create_stump_from_recording(name, context)
    }

    pub fn delete_stump(&self, stump_id: &str) -> Result<(), Error> {
        self.ensure_not_disposed()?;
        self.stumps.delete_stump(stump_id)
    }

    pub fn find_stump(&self, stump_id: &str) -> Result<Arc<Stump>, Error> {
        self.ensure_not_disposed()?;
        self.stumps.find_stump(stump_id)
    }

    pub fn find_all_contracts(&self) -> Vec<StumpContract> {
        self.stumps.find_all_contracts()
    }

    pub fn stump_name_exists(&self, name: &str) -> bool {
        self.stumps.stump_name_exists(name)
    }

    pub fn stump_count(&self) -> usize {
        self.stumps.count()
    }

    /// Restore this instance's persisted stumps.
    pub fn load_stumps(&self) -> Result<usize, Error> {
        self.ensure_not_disposed()?;
        self.stumps.load()
    }

    pub(crate) fn stump_snapshot(&self) -> Vec<Arc<Stump>> {
        self.stumps.snapshot()
    }

    // ----- lifecycle -----

    /// Bind the configured port and begin serving. Tolerates being called
    /// when already running.
    pub async fn start(&self) -> Result<(), Error> {
        self.ensure_not_disposed()?;
        let Some(this) = self.self_ref.upgrade() else {
            return Err(Error::InvalidState("proxy server is being torn down"));
        };
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.listening_port()));
        self.listener.start(addr, this).await
    }

    /// Stop serving. Tolerates being called when already stopped.
    pub async fn shutdown(&self) -> Result<(), Error> {
        self.ensure_not_disposed()?;
        self.listener.shutdown().await
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_running()
    }

    /// The port actually bound, once running.
    pub fn bound_port(&self) -> Option<u16> {
        self.listener.bound_addr().map(|addr| addr.port())
    }

    /// Terminal teardown: shut the listener down and mark the instance
    /// disposed. Safe to call any number of times.
    pub async fn dispose(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.listener.dispose().await;
        info!("Disposed proxy server {}", self.server_id());
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    pub fn subscribe_finished(&self) -> broadcast::Receiver<Arc<RecordedContext>> {
        self.listener.subscribe_finished()
    }

    pub(crate) fn notify_finished(&self, context: Arc<RecordedContext>) {
        self.listener.notify_finished(context);
    }

    fn ensure_not_disposed(&self) -> Result<(), Error> {
        if self.is_disposed() {
            return Err(Error::InvalidState("proxy server has been disposed"));
        }
        Ok(())
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        // Cannot await here; nudge the accept loop so the port is released
        // even when dispose was never called.
        self.listener.signal_shutdown();
    }
}
