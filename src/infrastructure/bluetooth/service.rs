//! Gateway Service Module
//!
//! [`GatewayHandle`] owns the adapter handle, the device registry, the scan
//! session and every open channel. All mutation happens on whichever task
//! owns the handle; native callbacks and scan timers only queue [`Inbound`]
//! messages that the owner drains.

use crate::domain::error::{Diagnostics, GatewayError};
use crate::domain::models::{normalize_address, DeviceListChanged, DeviceRecord, NativeEvent};
use crate::domain::registry::DeviceRegistry;
use crate::domain::settings::GatewayConfig;
use crate::infrastructure::bluetooth::{
    client::{GatewayClient, GatewayCommand},
    connection::PairingController,
    protocol,
    radio::{EventSink, Inbound, RadioAdapter, RawEvent},
    scanner::DiscoveryController,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Uninitialized,
    Ready,
    Degraded,
    TornDown,
}

/// The gateway context object.
///
/// Lifecycle: [`new`](Self::new) → [`initialize`](Self::initialize) →
/// requests and events → [`teardown`](Self::teardown). Dropping the handle
/// tears it down.
pub struct GatewayHandle {
    config: GatewayConfig,
    lifecycle: Lifecycle,
    radio: Option<Box<dyn RadioAdapter>>,
    listening: bool,
    registry: DeviceRegistry,
    scanner: DiscoveryController,
    pairing: PairingController,
    subscribers: Vec<mpsc::UnboundedSender<DeviceListChanged>>,
    diagnostics: Diagnostics,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox_rx: mpsc::UnboundedReceiver<Inbound>,
}

impl GatewayHandle {
    pub fn new(config: GatewayConfig) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        Self {
            config,
            lifecycle: Lifecycle::Uninitialized,
            radio: None,
            listening: false,
            registry: DeviceRegistry::new(),
            scanner: DiscoveryController::new(inbox_tx.clone()),
            pairing: PairingController::new(),
            subscribers: Vec::new(),
            diagnostics: Diagnostics::default(),
            inbox_tx,
            inbox_rx,
        }
    }

    /// Bring the gateway up on `adapter`.
    ///
    /// Without an adapter (or with one that cannot be enabled) the gateway
    /// stays degraded: every request becomes a no-op. Never fails.
    pub fn initialize(&mut self, adapter: Option<Box<dyn RadioAdapter>>) {
        if self.lifecycle != Lifecycle::Uninitialized {
            warn!("Gateway already initialized, ignoring");
            return;
        }
        info!("Initializing Bluetooth gateway");

        let Some(mut radio) = adapter else {
            self.degrade("no Bluetooth adapter present".to_string());
            return;
        };

        if !radio.is_enabled() {
            if !self.config.enable_adapter {
                self.degrade("adapter is disabled".to_string());
                return;
            }
            info!("Enabling Bluetooth adapter");
            if let Err(e) = radio.enable() {
                self.degrade(format!("could not enable adapter: {}", e));
                return;
            }
        }

        self.radio = Some(radio);
        self.lifecycle = Lifecycle::Ready;

        self.refresh_paired_devices();

        let sink = EventSink::new(self.inbox_tx.clone());
        let registered = match self.radio.as_deref_mut() {
            Some(radio) => radio.register_listener(sink),
            None => Ok(()),
        };
        match registered {
            Ok(()) => self.listening = true,
            Err(e) => self.report(GatewayError::native("register listener", e)),
        }

        if self.config.initial_scan {
            self.request_scan();
        }
        info!("Bluetooth gateway ready ({} known devices)", self.registry.len());
    }

    fn degrade(&mut self, reason: String) {
        self.lifecycle = Lifecycle::Degraded;
        self.report(GatewayError::AdapterUnavailable(reason));
    }

    /// Stop scanning, close every channel and unsubscribe from the radio.
    ///
    /// Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.lifecycle == Lifecycle::TornDown {
            return;
        }

        let mut failure = None;
        if let Some(radio) = self.radio.as_deref_mut() {
            if self.scanner.is_scanning() {
                failure = self.scanner.stop_scan(radio).err();
            }

            let closed = self.pairing.release_all(radio);
            if closed > 0 {
                info!("Closed {} open channels", closed);
            }

            if self.listening {
                radio.unregister_listener();
                self.listening = false;
            }
        }
        if let Some(e) = failure {
            self.report(e);
        }

        self.lifecycle = Lifecycle::TornDown;
        info!("Bluetooth gateway torn down");
    }

    /// Start a discovery window with the configured timeout.
    ///
    /// Returns true if a new window was opened.
    pub fn request_scan(&mut self) -> bool {
        if !self.operational() {
            return false;
        }
        let timeout = self.config.scan_timeout;
        let Some(radio) = self.radio.as_deref_mut() else {
            return false;
        };
        match self.scanner.start_scan(radio, timeout) {
            Ok(started) => started,
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    pub fn request_stop_scan(&mut self) {
        if !self.operational() {
            return;
        }
        let Some(radio) = self.radio.as_deref_mut() else {
            return;
        };
        if let Err(e) = self.scanner.stop_scan(radio) {
            self.report(e);
        }
    }

    /// Ask the radio to bond with `address`. Returns true if the device list changed.
    pub fn request_pair(&mut self, address: &str) -> bool {
        if !self.operational() {
            return false;
        }
        let address = normalize_address(address);
        let Some(radio) = self.radio.as_deref_mut() else {
            return false;
        };
        let result = self.pairing.pair(radio, &mut self.registry, &address);
        self.settle(result)
    }

    /// Open a channel to `address`. Returns true if the device list changed.
    pub fn request_connect(&mut self, address: &str) -> bool {
        if !self.operational() {
            return false;
        }
        let address = normalize_address(address);
        let Some(radio) = self.radio.as_deref_mut() else {
            return false;
        };
        let result = self.pairing.connect(radio, &mut self.registry, &address);
        self.settle(result)
    }

    /// Re-read the radio's bonded devices into the registry.
    pub fn refresh_paired_devices(&mut self) -> bool {
        if !self.operational() {
            return false;
        }
        let Some(radio) = self.radio.as_deref() else {
            return false;
        };
        let result = self
            .scanner
            .scan_paired_devices(radio, &mut self.registry)
            .map(|scan| {
                self.diagnostics.malformed_events += scan.skipped as u64;
                scan.upserted > 0
            });
        self.settle(result)
    }

    /// Handle every queued inbound message. Returns how many were handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(inbound) = self.inbox_rx.try_recv() {
            self.handle_inbound(inbound);
            handled += 1;
        }
        handled
    }

    /// Wait for the next inbound message and handle it.
    ///
    /// Returns true if it changed the device list.
    pub async fn process_next(&mut self) -> bool {
        match self.inbox_rx.recv().await {
            Some(inbound) => self.handle_inbound(inbound),
            None => false,
        }
    }

    fn handle_inbound(&mut self, inbound: Inbound) -> bool {
        if self.lifecycle != Lifecycle::Ready {
            debug!("Gateway not ready, dropping {:?}", inbound);
            return false;
        }

        match inbound {
            Inbound::ScanTimeout(session_id) => {
                let Some(radio) = self.radio.as_deref_mut() else {
                    return false;
                };
                let result = self.scanner.on_timeout(radio, session_id).map(|_| false);
                self.settle(result)
            }
            Inbound::Native(event) => self.handle_native(event),
        }
    }

    fn handle_native(&mut self, event: RawEvent) -> bool {
        let event = match protocol::normalize(&event) {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.diagnostics.ignored_events += 1;
                return false;
            }
            Err(e) => {
                self.report(e);
                return false;
            }
        };

        match event {
            NativeEvent::DeviceFound { name, address } => {
                self.registry.upsert(&address, &name, false);
                self.notify();
                true
            }
            NativeEvent::BondStateChanged { address, outcome } => {
                let result = self
                    .pairing
                    .on_bond_state(&mut self.registry, &address, outcome);
                let progress = match result {
                    Ok(progress) => progress,
                    Err(e) => {
                        self.report(e);
                        return false;
                    }
                };
                if progress.changed {
                    self.notify();
                }
                if progress.connect_next {
                    let connected = self.request_connect(&address);
                    return progress.changed || connected;
                }
                progress.changed
            }
        }
    }

    /// Serve commands and inbound messages until shutdown, then tear down.
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<GatewayCommand>) {
        info!("Gateway owner loop started");
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(GatewayCommand::Shutdown) | None => break,
                    Some(command) => self.apply(command),
                },
                Some(inbound) = self.inbox_rx.recv() => {
                    self.handle_inbound(inbound);
                }
            }
        }
        self.teardown();
        info!("Gateway owner loop stopped");
    }

    /// Move the handle onto its own task and return a client for it.
    pub fn spawn(self) -> (GatewayClient, JoinHandle<()>) {
        let (client, commands) = GatewayClient::channel();
        let task = tokio::spawn(self.run(commands));
        (client, task)
    }

    fn apply(&mut self, command: GatewayCommand) {
        match command {
            GatewayCommand::Scan => {
                self.request_scan();
            }
            GatewayCommand::StopScan => self.request_stop_scan(),
            GatewayCommand::Pair(address) => {
                self.request_pair(&address);
            }
            GatewayCommand::Connect(address) => {
                self.request_connect(&address);
            }
            GatewayCommand::RefreshPaired => {
                self.refresh_paired_devices();
            }
            GatewayCommand::Devices(reply) => {
                let _ = reply.send(self.registry.all().to_vec());
            }
            GatewayCommand::Diagnostics(reply) => {
                let _ = reply.send(self.diagnostics.clone());
            }
            GatewayCommand::Shutdown => self.teardown(),
        }
    }

    /// Receive a [`DeviceListChanged`] after every registry mutation.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<DeviceListChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    fn notify(&mut self) {
        self.subscribers.retain(|tx| tx.send(DeviceListChanged).is_ok());
    }

    fn settle(&mut self, result: Result<bool, GatewayError>) -> bool {
        match result {
            Ok(changed) => {
                if changed {
                    self.notify();
                }
                changed
            }
            Err(e) => {
                self.report(e);
                false
            }
        }
    }

    fn report(&mut self, error: GatewayError) {
        if !self.diagnostics.record(&error) {
            return;
        }
        match &error {
            GatewayError::AdapterUnavailable(_) => warn!("{}", error),
            GatewayError::MalformedEvent { .. } | GatewayError::UnknownDeviceReference(_) => {
                debug!("{}", error)
            }
            GatewayError::NativeOperationFailure { .. } => error!("{}", error),
        }
    }

    fn operational(&mut self) -> bool {
        match self.lifecycle {
            Lifecycle::Ready => true,
            Lifecycle::Degraded => {
                self.report(GatewayError::AdapterUnavailable(
                    "gateway is degraded".to_string(),
                ));
                false
            }
            Lifecycle::Uninitialized | Lifecycle::TornDown => {
                debug!("Gateway is {:?}, ignoring request", self.lifecycle);
                false
            }
        }
    }

    pub fn devices(&self) -> &[DeviceRecord] {
        self.registry.all()
    }

    pub fn paired(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.registry.paired()
    }

    pub fn available(&self) -> impl Iterator<Item = &DeviceRecord> {
        self.registry.available()
    }

    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_degraded(&self) -> bool {
        self.lifecycle == Lifecycle::Degraded
    }

    pub fn is_scanning(&self) -> bool {
        self.scanner.is_scanning()
    }

    pub fn open_channels(&self) -> usize {
        self.pairing.open_channels()
    }
}

impl Drop for GatewayHandle {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{BondedDevice, PairingState};
    use crate::infrastructure::bluetooth::radio::{bond_code, ACTION_FOUND};
    use crate::infrastructure::bluetooth::simulated::SimulatedRadio;
    use std::time::Duration;

    fn config() -> GatewayConfig {
        GatewayConfig {
            scan_timeout: Duration::from_millis(5000),
            enable_adapter: true,
            initial_scan: false,
        }
    }

    fn gateway_with(radio: &SimulatedRadio) -> GatewayHandle {
        let mut gateway = GatewayHandle::new(config());
        gateway.initialize(Some(Box::new(radio.clone())));
        gateway
    }

    fn states(gateway: &GatewayHandle) -> Vec<(String, PairingState)> {
        gateway
            .devices()
            .iter()
            .map(|d| (d.address().to_string(), d.state()))
            .collect()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<DeviceListChanged>) -> usize {
        let mut count = 0;
        while rx.try_recv().is_ok() {
            count += 1;
        }
        count
    }

    #[tokio::test]
    async fn test_initialize_loads_bonded_devices() {
        let radio = SimulatedRadio::new().with_bonded(vec![BondedDevice::new("Phone", "AA:BB")]);
        let gateway = gateway_with(&radio);

        assert_eq!(states(&gateway), vec![("AA:BB".to_string(), PairingState::Paired)]);
        assert!(radio.is_listening());
        assert!(!gateway.is_degraded());
    }

    #[tokio::test]
    async fn test_initialize_starts_initial_scan() {
        let radio = SimulatedRadio::new();
        let mut gateway = GatewayHandle::new(GatewayConfig {
            initial_scan: true,
            ..config()
        });
        gateway.initialize(Some(Box::new(radio.clone())));

        assert!(gateway.is_scanning());
        assert_eq!(radio.calls().start_discovery, 1);
    }

    #[tokio::test]
    async fn test_initialize_enables_radio() {
        let radio = SimulatedRadio::new().disabled();
        let gateway = gateway_with(&radio);
        assert_eq!(radio.calls().enable, 1);
        assert!(!gateway.is_degraded());
    }

    #[tokio::test]
    async fn test_missing_adapter_degrades_once() {
        let mut gateway = GatewayHandle::new(config());
        gateway.initialize(None);

        assert!(gateway.is_degraded());
        assert!(!gateway.request_scan());
        assert!(!gateway.request_pair("11:22"));
        assert!(!gateway.request_connect("11:22"));
        assert!(gateway.diagnostics().adapter_unavailable_reported);

        gateway.teardown();
        gateway.teardown();
    }

    #[tokio::test]
    async fn test_enable_failure_degrades() {
        let radio = SimulatedRadio::new().disabled();
        radio.fail_enable(true);
        let mut gateway = gateway_with(&radio);

        assert!(gateway.is_degraded());
        assert!(!gateway.request_scan());
        assert_eq!(radio.calls().start_discovery, 0);
        assert!(!radio.is_listening());
    }

    #[tokio::test]
    async fn test_disabled_radio_without_enable_degrades() {
        let radio = SimulatedRadio::new().disabled();
        let mut gateway = GatewayHandle::new(GatewayConfig {
            enable_adapter: false,
            ..config()
        });
        gateway.initialize(Some(Box::new(radio.clone())));

        assert!(gateway.is_degraded());
        assert_eq!(radio.calls().enable, 0);
    }

    #[tokio::test]
    async fn test_device_found_event() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        let mut changes = gateway.subscribe();

        radio.inject(RawEvent::new(ACTION_FOUND, "Speaker|11:22"));
        gateway.process_pending();

        let device = &gateway.devices()[0];
        assert_eq!(device.name(), "Speaker");
        assert_eq!(device.address(), "11:22");
        assert_eq!(device.state(), PairingState::Discovered);
        assert_eq!(drain(&mut changes), 1);
    }

    #[tokio::test]
    async fn test_duplicate_device_found_is_idempotent() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);

        radio.inject(RawEvent::device_found(Some("Speaker"), Some("11:22")));
        gateway.process_pending();
        let once = states(&gateway);

        radio.inject(RawEvent::device_found(Some("Speaker"), Some("11:22")));
        gateway.process_pending();

        assert_eq!(states(&gateway), once);
        assert_eq!(gateway.devices()[0].name(), "Speaker");
    }

    #[tokio::test]
    async fn test_malformed_event_no_change_no_notification() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        let mut changes = gateway.subscribe();

        radio.inject(RawEvent::new(ACTION_FOUND, "null|null"));
        radio.inject(RawEvent::new(ACTION_FOUND, "Speaker|null"));
        radio.inject(RawEvent::new("android.bluetooth.device.action.ACL_CONNECTED", "x"));
        assert_eq!(gateway.process_pending(), 3);

        assert!(gateway.devices().is_empty());
        assert_eq!(drain(&mut changes), 0);
        assert_eq!(gateway.diagnostics().malformed_events, 2);
        assert_eq!(gateway.diagnostics().ignored_events, 1);
    }

    #[tokio::test]
    async fn test_stale_found_event_keeps_paired_and_connected() {
        let radio = SimulatedRadio::new().with_bonded(vec![
            BondedDevice::new("Phone", "AA:BB"),
            BondedDevice::new("Watch", "CC:DD"),
        ]);
        let mut gateway = gateway_with(&radio);
        assert!(gateway.request_connect("CC:DD"));

        radio.inject(RawEvent::device_found(Some("Phone 2"), Some("AA:BB")));
        radio.inject(RawEvent::device_found(Some("Watch"), Some("cc:dd")));
        gateway.process_pending();

        assert_eq!(
            states(&gateway),
            vec![
                ("AA:BB".to_string(), PairingState::Paired),
                ("CC:DD".to_string(), PairingState::Connected),
            ]
        );
        assert_eq!(gateway.devices()[0].name(), "Phone 2");
    }

    #[tokio::test]
    async fn test_double_scan_issues_one_start() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);

        assert!(gateway.request_scan());
        assert!(!gateway.request_scan());
        assert_eq!(radio.calls().start_discovery, 1);
    }

    #[tokio::test]
    async fn test_scan_feeds_nearby_devices() {
        let radio = SimulatedRadio::new().with_nearby(vec![("Speaker", "11:22"), ("Lamp", "33:44")]);
        let mut gateway = gateway_with(&radio);

        gateway.request_scan();
        gateway.process_pending();

        let available: Vec<_> = gateway.available().map(|d| d.address().to_string()).collect();
        assert_eq!(available, vec!["11:22".to_string(), "33:44".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scan_stops_after_timeout() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        gateway.request_scan();
        assert!(radio.is_discovering());

        gateway.process_next().await;

        assert!(!gateway.is_scanning());
        assert!(!radio.is_discovering());
        assert_eq!(radio.calls().cancel_discovery, 1);
    }

    #[tokio::test]
    async fn test_stale_timeout_after_restart_is_noop() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        gateway.request_scan();
        gateway.request_stop_scan();
        gateway.request_scan();

        // Timeout of the first session arriving late
        gateway.inbox_tx.send(Inbound::ScanTimeout(1)).unwrap();
        gateway.process_pending();

        assert!(gateway.is_scanning());
        assert!(radio.is_discovering());
        assert_eq!(radio.calls().cancel_discovery, 1);
    }

    #[tokio::test]
    async fn test_pair_unknown_address_is_noop() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        let mut changes = gateway.subscribe();

        assert!(!gateway.request_pair("11:22"));
        assert!(gateway.devices().is_empty());
        assert_eq!(radio.calls().create_bond, 0);
        assert_eq!(drain(&mut changes), 0);
        assert_eq!(gateway.diagnostics().unknown_device_references, 1);
    }

    #[tokio::test]
    async fn test_pair_then_bond_confirmed_connects() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        radio.inject(RawEvent::device_found(Some("Speaker"), Some("11:22")));
        gateway.process_pending();

        assert!(gateway.request_pair("11:22"));
        assert_eq!(states(&gateway), vec![("11:22".to_string(), PairingState::Bonding)]);
        assert_eq!(radio.calls().connect, 0);

        radio.inject(RawEvent::bond_state_changed("11:22", bond_code::BONDING));
        radio.confirm_bond("11:22");
        gateway.process_pending();

        assert_eq!(radio.calls().connect, 1);
        assert_eq!(states(&gateway), vec![("11:22".to_string(), PairingState::Connected)]);
        assert_eq!(gateway.open_channels(), 1);
    }

    #[tokio::test]
    async fn test_peer_initiated_bond_does_not_connect() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        radio.inject(RawEvent::device_found(Some("Speaker"), Some("11:22")));
        radio.inject(RawEvent::bond_state_changed("11:22", bond_code::BONDING));
        radio.inject(RawEvent::bond_state_changed("11:22", bond_code::BONDED));
        gateway.process_pending();

        assert_eq!(states(&gateway), vec![("11:22".to_string(), PairingState::Paired)]);
        assert_eq!(radio.calls().connect, 0);
        assert_eq!(gateway.open_channels(), 0);
    }

    #[tokio::test]
    async fn test_auto_connect_failure_leaves_paired() {
        let radio = SimulatedRadio::new();
        radio.set_unreachable("11:22");
        let mut gateway = gateway_with(&radio);
        let mut changes = gateway.subscribe();
        radio.inject(RawEvent::device_found(Some("Speaker"), Some("11:22")));
        gateway.process_pending();
        gateway.request_pair("11:22");

        radio.confirm_bond("11:22");
        gateway.process_pending();

        assert_eq!(states(&gateway), vec![("11:22".to_string(), PairingState::Paired)]);
        assert_eq!(gateway.diagnostics().native_failures, 1);
        // found, bonding, paired
        assert_eq!(drain(&mut changes), 3);
    }

    #[tokio::test]
    async fn test_bond_event_for_unknown_device() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        radio.confirm_bond("99:99");
        gateway.process_pending();

        assert!(gateway.devices().is_empty());
        assert_eq!(radio.calls().connect, 0);
        assert_eq!(gateway.diagnostics().unknown_device_references, 1);
    }

    #[tokio::test]
    async fn test_connect_discovered_device_skips_bonding() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        radio.inject(RawEvent::device_found(Some("Speaker"), Some("11:22")));
        gateway.process_pending();

        assert!(gateway.request_connect("11:22"));
        assert_eq!(radio.calls().create_bond, 0);
        assert_eq!(states(&gateway), vec![("11:22".to_string(), PairingState::Connected)]);
    }

    #[tokio::test]
    async fn test_teardown_releases_and_unsubscribes_once() {
        let radio = SimulatedRadio::new().with_bonded(vec![BondedDevice::new("Phone", "AA:BB")]);
        let mut gateway = gateway_with(&radio);
        gateway.request_connect("AA:BB");
        gateway.request_scan();

        gateway.teardown();
        gateway.teardown();
        drop(gateway);

        let calls = radio.calls();
        assert_eq!(calls.unregister_listener, 1);
        assert_eq!(calls.close_channel, 1);
        assert_eq!(calls.cancel_discovery, 1);
        assert_eq!(radio.open_channels(), 0);
        assert!(!radio.is_listening());
    }

    #[tokio::test]
    async fn test_requests_after_teardown_are_noops() {
        let radio = SimulatedRadio::new().with_bonded(vec![BondedDevice::new("Phone", "AA:BB")]);
        let mut gateway = gateway_with(&radio);
        gateway.teardown();

        assert!(!gateway.request_connect("AA:BB"));
        assert!(!gateway.request_scan());
        assert_eq!(radio.calls().connect, 0);
        assert_eq!(radio.calls().start_discovery, 0);
    }

    #[tokio::test]
    async fn test_second_initialize_is_ignored() {
        let radio = SimulatedRadio::new();
        let mut gateway = gateway_with(&radio);
        gateway.initialize(Some(Box::new(radio.clone())));
        assert_eq!(radio.calls().register_listener, 1);
    }

    #[tokio::test]
    async fn test_client_round_trip() {
        let radio = SimulatedRadio::new()
            .with_bonded(vec![BondedDevice::new("Phone", "AA:BB")])
            .with_nearby(vec![("Speaker", "11:22")])
            .with_auto_confirm_bonds();
        let mut gateway = gateway_with(&radio);
        let mut changes = gateway.subscribe();
        let (client, task) = gateway.spawn();

        client.request_scan();
        changes.recv().await.unwrap();
        assert_eq!(client.available().await.len(), 1);

        client.request_pair("11:22");
        loop {
            changes.recv().await.unwrap();
            let devices = client.devices().await;
            if devices.iter().any(|d| d.state() == PairingState::Connected) {
                break;
            }
        }
        assert_eq!(client.paired().await.len(), 2);

        assert!(client.shutdown());
        task.await.unwrap();
        assert!(client.devices().await.is_empty());
        assert_eq!(radio.calls().unregister_listener, 1);
    }
}
