//! Shared in-memory mocks for the integration tests. All mocks hand out
//! cloneable handles over shared state so a test can inspect or mutate
//! what the manager owns.

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use wifi_provision_core::error::{Error, Result};
use wifi_provision_core::platform::{Clock, StorageBackend, SystemControl, WifiRadio};
use wifi_provision_core::scan::{EncryptionKind, ScannedNetwork};
use wifi_provision_core::store::NetworkConfig;
use wifi_provision_core::{ManagerConfig, WifiManager, PORTAL_GATEWAY};

/// Clock that only moves when told to. `sleep_ms` advances it, so polling
/// loops inside the manager terminate deterministically.
#[derive(Clone)]
pub struct ManualClock {
    now: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }

    fn sleep_ms(&self, ms: u32) {
        self.now.fetch_add(u64::from(ms), Ordering::SeqCst);
    }
}

/// Byte-vector storage backend.
#[derive(Clone)]
pub struct MemStorage {
    image: Arc<Mutex<Vec<u8>>>,
}

impl MemStorage {
    pub fn new() -> Self {
        Self {
            image: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn snapshot(&self) -> Vec<u8> {
        self.image.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.image.lock().unwrap().is_empty()
    }

    pub fn corrupt_byte(&self, index: usize) {
        self.image.lock().unwrap()[index] ^= 0xFF;
    }
}

impl StorageBackend for MemStorage {
    fn load(&mut self, buf: &mut [u8]) -> Result<usize> {
        let image = self.image.lock().unwrap();
        let n = image.len().min(buf.len());
        buf[..n].copy_from_slice(&image[..n]);
        Ok(n)
    }

    fn persist(&mut self, data: &[u8]) -> Result<()> {
        *self.image.lock().unwrap() = data.to_vec();
        Ok(())
    }

    fn capacity(&self) -> usize {
        4096
    }
}

pub struct RadioState {
    /// Credentials a connection attempt will succeed against.
    pub known_networks: Vec<(String, String)>,
    pub connected: bool,
    pub current_ssid: Option<String>,
    pub scan_response: Result<Vec<ScannedNetwork>>,
    pub scan_count: usize,
    pub ap_active: bool,
    pub fail_ap_start: bool,
    pub connect_attempts: Vec<(String, String)>,
    pub last_static_ip: Option<NetworkConfig>,
}

impl Default for RadioState {
    fn default() -> Self {
        Self {
            known_networks: Vec::new(),
            connected: false,
            current_ssid: None,
            scan_response: Ok(Vec::new()),
            scan_count: 0,
            ap_active: false,
            fail_ap_start: false,
            connect_attempts: Vec::new(),
            last_static_ip: None,
        }
    }
}

#[derive(Clone, Default)]
pub struct MockRadio {
    pub state: Arc<Mutex<RadioState>>,
}

impl MockRadio {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_known(&self, ssid: &str, password: &str) {
        self.state
            .lock()
            .unwrap()
            .known_networks
            .push((ssid.to_string(), password.to_string()));
    }

    pub fn drop_connection(&self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.current_ssid = None;
        state.known_networks.clear();
    }

    pub fn set_scan_response(&self, response: Result<Vec<ScannedNetwork>>) {
        self.state.lock().unwrap().scan_response = response;
    }

    pub fn scan_count(&self) -> usize {
        self.state.lock().unwrap().scan_count
    }

    pub fn ap_active(&self) -> bool {
        self.state.lock().unwrap().ap_active
    }

    pub fn connect_attempts(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().connect_attempts.clone()
    }
}

impl WifiRadio for MockRadio {
    fn begin_connect(
        &mut self,
        ssid: &str,
        password: &str,
        static_ip: Option<&NetworkConfig>,
    ) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state
            .connect_attempts
            .push((ssid.to_string(), password.to_string()));
        state.last_static_ip = static_ip.cloned();
        let accepted = state
            .known_networks
            .iter()
            .any(|(s, p)| s == ssid && p == password);
        state.connected = accepted;
        state.current_ssid = accepted.then(|| ssid.to_string());
        Ok(())
    }

    fn is_connected(&mut self) -> bool {
        self.state.lock().unwrap().connected
    }

    fn disconnect(&mut self) {
        let mut state = self.state.lock().unwrap();
        state.connected = false;
        state.current_ssid = None;
    }

    fn scan(&mut self) -> Result<Vec<ScannedNetwork>> {
        let mut state = self.state.lock().unwrap();
        state.scan_count += 1;
        state.scan_response.clone()
    }

    fn start_access_point(&mut self, _ssid: &str, _password: &str) -> Result<Ipv4Addr> {
        let mut state = self.state.lock().unwrap();
        if state.fail_ap_start {
            return Err(Error::Radio("ap start refused".to_string()));
        }
        state.ap_active = true;
        Ok(PORTAL_GATEWAY)
    }

    fn stop_access_point(&mut self) {
        self.state.lock().unwrap().ap_active = false;
    }

    fn current_ssid(&mut self) -> Option<String> {
        self.state.lock().unwrap().current_ssid.clone()
    }

    fn rssi(&mut self) -> Option<i32> {
        let state = self.state.lock().unwrap();
        state.connected.then_some(-55)
    }
}

#[derive(Clone, Default)]
pub struct MockSystem {
    pub restarts: Arc<AtomicU64>,
}

impl MockSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn restart_count(&self) -> u64 {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl SystemControl for MockSystem {
    fn restart(&mut self) {
        self.restarts.fetch_add(1, Ordering::SeqCst);
    }

    fn free_heap(&self) -> usize {
        180_000
    }

    fn chip_id(&self) -> u32 {
        0x00C0_FFEE
    }
}

/// A fully wired manager plus handles to every mock behind it.
pub struct Rig {
    pub manager: WifiManager<MockRadio, MemStorage, ManualClock, MockSystem>,
    pub radio: MockRadio,
    pub storage: MemStorage,
    pub clock: ManualClock,
    pub system: MockSystem,
}

impl Rig {
    pub fn new() -> Self {
        Self::with_config(ManagerConfig::default())
    }

    pub fn with_config(config: ManagerConfig) -> Self {
        let radio = MockRadio::new();
        let storage = MemStorage::new();
        let clock = ManualClock::new();
        let system = MockSystem::new();
        let manager = WifiManager::new(
            radio.clone(),
            storage.clone(),
            clock.clone(),
            system.clone(),
            config,
        );
        Self {
            manager,
            radio,
            storage,
            clock,
            system,
        }
    }

    pub fn drain_events(&mut self) -> Vec<wifi_provision_core::WifiEvent> {
        std::iter::from_fn(|| self.manager.poll_event()).collect()
    }
}

/// Scan-result builder with sensible defaults.
pub fn net(ssid: &str, rssi: i32) -> ScannedNetwork {
    ScannedNetwork {
        ssid: ssid.to_string(),
        rssi,
        channel: 6,
        encryption: EncryptionKind::Wpa2,
        bssid: [0x02, 0x11, 0x22, 0x33, 0x44, 0x55],
        hidden: false,
    }
}

pub fn open_net(ssid: &str, rssi: i32) -> ScannedNetwork {
    ScannedNetwork {
        encryption: EncryptionKind::Open,
        ..net(ssid, rssi)
    }
}

pub fn hidden_net(rssi: i32) -> ScannedNetwork {
    ScannedNetwork {
        hidden: true,
        ..net("", rssi)
    }
}
