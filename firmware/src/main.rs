mod portal;
mod radio;
mod storage;
mod system;

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::Result;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::log::EspLogger;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use log::{error, info, warn};

use wifi_provision_core::platform::SystemClock;
use wifi_provision_core::{ManagerConfig, WifiEvent, WifiManager};

use portal::PortalServer;
use radio::EspRadio;
use storage::NvsBackend;
use system::EspSystem;

/// The manager wired to the esp-idf platform implementations.
pub type Manager = WifiManager<EspRadio, NvsBackend, SystemClock, EspSystem>;

const TICK_INTERVAL_MS: u64 = 50;

fn main() -> Result<()> {
    // Step 1: ESP-IDF patches and logging
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    info!("=== WiFi Provision Firmware v{} ===", env!("CARGO_PKG_VERSION"));

    // Step 2: Take hardware peripherals and system services
    let peripherals = Peripherals::take()?;
    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    // Step 3: Wire the platform into the manager
    let radio = EspRadio::new(peripherals.modem, sys_loop, nvs_partition.clone())?;
    let backend = NvsBackend::new(nvs_partition)?;
    let config = ManagerConfig {
        device_name: format!("WiFiSetup-{:04X}", system::mac_suffix()),
        ..ManagerConfig::default()
    };
    let manager = Arc::new(Mutex::new(WifiManager::new(
        radio,
        backend,
        SystemClock::new(),
        EspSystem,
        config,
    )));

    // Step 4: Connect with stored credentials, or open the setup portal
    let connected = manager.lock().unwrap().auto_connect();
    info!(
        "initial connection: {}",
        if connected { "up" } else { "not established" }
    );

    let mut portal_server: Option<PortalServer> = None;
    if manager.lock().unwrap().is_config_mode() {
        portal_server = Some(PortalServer::start(manager.clone())?);
    }

    // Step 5: Cooperative main loop; the tick interval bounds timeout and
    // reset latency
    loop {
        thread::sleep(Duration::from_millis(TICK_INTERVAL_MS));
        manager.lock().unwrap().tick();

        while let Some(event) = next_event(&manager) {
            match event {
                WifiEvent::ConfigModeStarted => {
                    if portal_server.is_none() && manager.lock().unwrap().is_config_mode() {
                        match PortalServer::start(manager.clone()) {
                            Ok(server) => portal_server = Some(server),
                            Err(e) => error!("failed to start portal transport: {e}"),
                        }
                    }
                }
                WifiEvent::ConfigModeEnded => {
                    portal_server = None;
                }
                WifiEvent::Connected => {
                    let mut mgr = manager.lock().unwrap();
                    if let Some(ssid) = mgr.ssid() {
                        info!("connected to {ssid}");
                    }
                    mgr.log_diagnostics();
                }
                WifiEvent::Disconnected => info!("wifi link lost"),
                WifiEvent::StatusChanged(status) => info!("status: {}", status.as_str()),
                WifiEvent::ScanFailed(reason) => warn!("scan failed: {reason}"),
            }
        }
    }
}

fn next_event(manager: &Arc<Mutex<Manager>>) -> Option<WifiEvent> {
    manager.lock().unwrap().poll_event()
}
