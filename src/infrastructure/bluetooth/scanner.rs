//! Discovery Controller
//!
//! Owns the scan lifecycle: at most one [`ScanSession`] at a time, each with
//! its own cancellable stop timer.

use crate::domain::error::GatewayError;
use crate::domain::models::normalize_address;
use crate::domain::registry::DeviceRegistry;
use crate::infrastructure::bluetooth::radio::{Inbound, RadioAdapter, NULL_FIELD};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// One discovery window
#[derive(Debug)]
pub struct ScanSession {
    id: u64,
    started_at: Instant,
    timeout: Duration,
    timer: Option<JoinHandle<()>>,
}

impl ScanSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.cancel_timer();
    }
}

/// Result of enumerating bonded devices
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PairedScan {
    /// Records upserted
    pub upserted: usize,
    /// Entries dropped for a missing address
    pub skipped: usize,
}

pub struct DiscoveryController {
    session: Option<ScanSession>,
    next_session_id: u64,
    inbox: mpsc::UnboundedSender<Inbound>,
}

impl DiscoveryController {
    /// `inbox` receives [`Inbound::ScanTimeout`] when a session's timer fires.
    pub fn new(inbox: mpsc::UnboundedSender<Inbound>) -> Self {
        Self {
            session: None,
            next_session_id: 1,
            inbox,
        }
    }

    /// Open a discovery window that stops by itself after `timeout`.
    ///
    /// Returns `Ok(false)` when a session is already active.
    pub fn start_scan(
        &mut self,
        radio: &mut dyn RadioAdapter,
        timeout: Duration,
    ) -> Result<bool, GatewayError> {
        if let Some(session) = &self.session {
            debug!("Scan session {} already active, ignoring start", session.id);
            return Ok(false);
        }

        if radio.is_discovering() {
            debug!("Radio already discovering, not issuing a new start");
        } else {
            radio
                .start_discovery()
                .map_err(|e| GatewayError::native("start discovery", e))?;
        }

        let id = self.next_session_id;
        self.next_session_id += 1;

        let timer = self.schedule_stop(id, timeout);
        info!("Scan session {} started ({:?})", id, timeout);

        self.session = Some(ScanSession {
            id,
            started_at: Instant::now(),
            timeout,
            timer,
        });
        Ok(true)
    }

    fn schedule_stop(&self, id: u64, timeout: Duration) -> Option<JoinHandle<()>> {
        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!("No async runtime, scan session {} will not stop by itself", id);
                return None;
            }
        };

        let inbox = self.inbox.clone();
        Some(runtime.spawn(async move {
            tokio::time::sleep(timeout).await;
            let _ = inbox.send(Inbound::ScanTimeout(id));
        }))
    }

    /// Close the current window.
    ///
    /// The session is cleared even if the radio rejects the cancel request.
    pub fn stop_scan(&mut self, radio: &mut dyn RadioAdapter) -> Result<(), GatewayError> {
        if let Some(mut session) = self.session.take() {
            session.cancel_timer();
            info!(
                "Scan session {} stopped after {:?}",
                session.id,
                session.started_at.elapsed()
            );
        }

        if radio.is_discovering() {
            radio
                .cancel_discovery()
                .map_err(|e| GatewayError::native("cancel discovery", e))?;
        }
        Ok(())
    }

    /// Handle a fired timer. Stale timers (from a session that was already
    /// stopped) return `Ok(false)`.
    pub fn on_timeout(
        &mut self,
        radio: &mut dyn RadioAdapter,
        session_id: u64,
    ) -> Result<bool, GatewayError> {
        if self.session.as_ref().map(ScanSession::id) != Some(session_id) {
            debug!("Ignoring stale timeout for scan session {}", session_id);
            return Ok(false);
        }

        debug!("Scan session {} timed out", session_id);
        self.stop_scan(radio)?;
        Ok(true)
    }

    /// Enumerate bonded devices into the registry.
    pub fn scan_paired_devices(
        &self,
        radio: &dyn RadioAdapter,
        registry: &mut DeviceRegistry,
    ) -> Result<PairedScan, GatewayError> {
        let devices = radio
            .bonded_devices()
            .map_err(|e| GatewayError::native("enumerate bonded devices", e))?;

        let mut result = PairedScan::default();
        for device in devices {
            let address = normalize_address(&device.address);
            if address.is_empty() || device.address.trim() == NULL_FIELD {
                warn!("Skipping bonded device without address: {:?}", device);
                result.skipped += 1;
                continue;
            }

            let name = device.name.as_deref().filter(|n| *n != NULL_FIELD).unwrap_or("");
            registry.upsert(&address, name, true);
            result.upserted += 1;
        }

        info!("Found {} bonded devices", result.upserted);
        Ok(result)
    }

    pub fn is_scanning(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&ScanSession> {
        self.session.as_ref()
    }
}
