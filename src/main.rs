use bluetooth_gateway::domain::models::{BondedDevice, DeviceListChanged, PairingState};
use bluetooth_gateway::domain::settings::{GatewayConfig, SettingsService};
use bluetooth_gateway::infrastructure::bluetooth::{GatewayHandle, SimulatedRadio};
use bluetooth_gateway::infrastructure::logging;
use bluetooth_gateway::presentation::device_list;
use std::time::Duration;
use tracing::{debug, info, warn};

/// How long the demo waits for a connection before giving up
const DEMO_DEADLINE: Duration = Duration::from_secs(10);

fn main() -> anyhow::Result<()> {
    let settings = SettingsService::new()?;

    let _logging_guard = logging::init_logger(&settings.get().log_settings)
        .map_err(|e| eprintln!("Failed to initialize logging: {}", e))
        .ok();

    info!("Starting Bluetooth gateway");
    info!("Settings: {}", settings.path().display());

    let radio = SimulatedRadio::new()
        .with_bonded(vec![BondedDevice::new("Phone", "AA:BB:CC:DD:EE:01")])
        .with_nearby(vec![
            ("Speaker", "11:22:33:44:55:66"),
            ("Headset", "11:22:33:44:55:77"),
        ])
        .with_auto_confirm_bonds();

    // The gateway owns all device state on a single-threaded runtime
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    rt.block_on(run(settings.gateway_config(), radio))
}

async fn run(config: GatewayConfig, radio: SimulatedRadio) -> anyhow::Result<()> {
    let mut gateway = GatewayHandle::new(config);
    let mut changes = gateway.subscribe();
    gateway.initialize(Some(Box::new(radio)));

    let (client, task) = gateway.spawn();

    let deadline = tokio::time::sleep(DEMO_DEADLINE);
    tokio::pin!(deadline);
    let mut pair_requested = false;

    loop {
        tokio::select! {
            Some(DeviceListChanged) = changes.recv() => {
                let devices = client.devices().await;
                println!("{}", device_list::render(&devices));
                debug!("Snapshot: {}", serde_json::to_string(&devices)?);

                if devices.iter().any(|d| d.state() == PairingState::Connected) {
                    info!("Peer connected");
                    break;
                }

                if !pair_requested {
                    if let Some(device) = devices.iter().find(|d| d.state() == PairingState::Discovered) {
                        info!("Pairing with {} ({})", device.name(), device.address());
                        client.request_pair(device.address());
                        pair_requested = true;
                    }
                }
            }
            _ = &mut deadline => {
                warn!("No peer connected within {:?}", DEMO_DEADLINE);
                break;
            }
        }
    }

    if let Some(diagnostics) = client.diagnostics().await {
        info!("Diagnostics: {}", serde_json::to_string(&diagnostics)?);
    }

    client.shutdown();
    task.await?;
    Ok(())
}
