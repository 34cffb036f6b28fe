//! Command handle for collaborators that do not own the gateway.
//!
//! The gateway runs on a single owner task ([`GatewayHandle::run`]); anything
//! else talks to it through a [`GatewayClient`].
//!
//! [`GatewayHandle::run`]: crate::infrastructure::bluetooth::service::GatewayHandle::run

use crate::domain::error::Diagnostics;
use crate::domain::models::DeviceRecord;
use tokio::sync::{mpsc, oneshot};

#[derive(Debug)]
pub enum GatewayCommand {
    Scan,
    StopScan,
    Pair(String),
    Connect(String),
    RefreshPaired,
    Devices(oneshot::Sender<Vec<DeviceRecord>>),
    Diagnostics(oneshot::Sender<Diagnostics>),
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    commands: mpsc::UnboundedSender<GatewayCommand>,
}

impl GatewayClient {
    /// Create a client and the receiver to pass to the owner loop.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<GatewayCommand>) {
        let (commands, rx) = mpsc::unbounded_channel();
        (Self { commands }, rx)
    }

    /// Queue a command. Returns false once the owner loop has stopped.
    pub fn send(&self, command: GatewayCommand) -> bool {
        self.commands.send(command).is_ok()
    }

    pub fn request_scan(&self) -> bool {
        self.send(GatewayCommand::Scan)
    }

    pub fn request_stop_scan(&self) -> bool {
        self.send(GatewayCommand::StopScan)
    }

    pub fn request_pair(&self, address: &str) -> bool {
        self.send(GatewayCommand::Pair(address.to_string()))
    }

    pub fn request_connect(&self, address: &str) -> bool {
        self.send(GatewayCommand::Connect(address.to_string()))
    }

    pub fn refresh_paired_devices(&self) -> bool {
        self.send(GatewayCommand::RefreshPaired)
    }

    /// Snapshot of every known device, empty if the gateway has stopped
    pub async fn devices(&self) -> Vec<DeviceRecord> {
        let (tx, rx) = oneshot::channel();
        if !self.send(GatewayCommand::Devices(tx)) {
            return Vec::new();
        }
        rx.await.unwrap_or_default()
    }

    pub async fn paired(&self) -> Vec<DeviceRecord> {
        let mut devices = self.devices().await;
        devices.retain(|d| d.state().is_bonded());
        devices
    }

    pub async fn available(&self) -> Vec<DeviceRecord> {
        let mut devices = self.devices().await;
        devices.retain(|d| !d.state().is_bonded());
        devices
    }

    pub async fn diagnostics(&self) -> Option<Diagnostics> {
        let (tx, rx) = oneshot::channel();
        if !self.send(GatewayCommand::Diagnostics(tx)) {
            return None;
        }
        rx.await.ok()
    }

    pub fn shutdown(&self) -> bool {
        self.send(GatewayCommand::Shutdown)
    }
}
