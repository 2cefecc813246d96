//! Connection manager: the state machine that ties the store, the scan
//! cache and the portal together.
//!
//! The manager is driven cooperatively: the owning loop calls
//! [`WifiManager::tick`] at its chosen interval (the firmware runs 50ms),
//! and that interval bounds portal-timeout and reset latency. A connection
//! attempt blocks the calling context for up to the configured connect
//! timeout while polling the radio; the portal transport is not serviced
//! during that wait in a single-context deployment.
//!
//! Outbound notifications are a drainable event queue rather than stored
//! callbacks; the application polls [`WifiManager::poll_event`] after each
//! tick.

use std::collections::VecDeque;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::platform::{Clock, StorageBackend, SystemControl, WifiRadio};
use crate::portal::{DeviceInfo, PortalState};
use crate::scan::{ScanCache, ScanConfig, ScannedNetwork};
use crate::store::ConfigStore;

/// Minimum spacing between automatic reconnection attempts.
const RECONNECT_SPACING_MS: u64 = 10_000;
/// Poll interval while a connection attempt is in flight.
const CONNECT_POLL_MS: u32 = 100;
/// Delay between serving the reset page and actually restarting.
const RESET_DELAY_MS: u64 = 2_000;
/// Events not drained by the application are dropped oldest-first.
const MAX_QUEUED_EVENTS: usize = 32;

/// Exactly one connection state is active at a time. `ConfigMode` is
/// entered from any state; `Error` only on unrecoverable setup failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    ConfigMode,
    Error,
}

impl ConnectionStatus {
    /// Text rendering, kept separate from the state machine itself.
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionStatus::Disconnected => "Disconnected",
            ConnectionStatus::Connecting => "Connecting",
            ConnectionStatus::Connected => "Connected",
            ConnectionStatus::ConfigMode => "Config Mode",
            ConnectionStatus::Error => "Error",
        }
    }
}

/// Notifications emitted by the manager, drained via
/// [`WifiManager::poll_event`]. `StatusChanged` fires exactly once per
/// distinct transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WifiEvent {
    StatusChanged(ConnectionStatus),
    Connected,
    Disconnected,
    ConfigModeStarted,
    ConfigModeEnded,
    ScanFailed(String),
}

/// Static manager settings. Connection behavior (timeout, retry bound,
/// auto-reconnect) lives in the persisted device config instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// SSID of the configuration access point.
    pub device_name: String,
    pub ap_password: String,
    pub portal_title: String,
    /// Zero disables the portal timeout.
    pub portal_timeout_secs: u16,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            device_name: "provision".to_string(),
            ap_password: "provision123".to_string(),
            portal_title: "WiFi Setup".to_string(),
            portal_timeout_secs: 300,
        }
    }
}

pub struct WifiManager<R, B, C, Y>
where
    R: WifiRadio,
    B: StorageBackend,
    C: Clock,
    Y: SystemControl,
{
    config: ManagerConfig,
    status: ConnectionStatus,
    store: ConfigStore<B>,
    scanner: ScanCache,
    portal: PortalState,
    radio: R,
    clock: C,
    system: Y,
    initialized: bool,
    config_mode: bool,
    started_at_ms: u64,
    last_reconnect_ms: Option<u64>,
    reconnect_attempts: u8,
    pending_submission: Option<(String, String)>,
    pending_reset_at_ms: Option<u64>,
    events: VecDeque<WifiEvent>,
}

impl<R, B, C, Y> WifiManager<R, B, C, Y>
where
    R: WifiRadio,
    B: StorageBackend,
    C: Clock,
    Y: SystemControl,
{
    pub fn new(radio: R, backend: B, clock: C, system: Y, config: ManagerConfig) -> Self {
        let portal = PortalState::inactive(config.portal_timeout_secs);
        Self {
            config,
            status: ConnectionStatus::Disconnected,
            store: ConfigStore::new(backend),
            scanner: ScanCache::new(ScanConfig::default()),
            portal,
            radio,
            clock,
            system,
            initialized: false,
            config_mode: false,
            started_at_ms: 0,
            last_reconnect_ms: None,
            reconnect_attempts: 0,
            pending_submission: None,
            pending_reset_at_ms: None,
            events: VecDeque::new(),
        }
    }

    /// Load persisted state. Idempotent; called implicitly by
    /// [`WifiManager::auto_connect`].
    pub fn begin(&mut self) {
        if self.initialized {
            return;
        }
        self.started_at_ms = self.clock.now_ms();
        self.store.initialize();
        self.initialized = true;
        info!("wifi manager initialized");
    }

    /// Connect with stored credentials, or open the config portal when
    /// there are none or the attempt fails. Returns whether a station
    /// connection was established.
    pub fn auto_connect(&mut self) -> bool {
        self.begin();
        let (credentials, found) = self.store.load_credentials();
        if !found {
            info!("no saved credentials, starting config portal");
            let _ = self.start_config_portal();
            return false;
        }
        self.auto_connect_to(&credentials.ssid, &credentials.password)
    }

    /// Like [`WifiManager::auto_connect`] but with explicit credentials.
    pub fn auto_connect_to(&mut self, ssid: &str, password: &str) -> bool {
        self.begin();
        match self.connect_wifi(ssid, password) {
            Ok(true) => true,
            _ => {
                info!("auto-connect failed, starting config portal");
                let _ = self.start_config_portal();
                false
            }
        }
    }

    /// Attempt a station connection, blocking for up to the stored connect
    /// timeout. An empty ssid is rejected before any state change.
    /// `Ok(false)` means the attempt ran out its timeout; the status is
    /// back at `Disconnected` and the retry counter is untouched — only
    /// the automatic reconnection path counts attempts.
    pub fn connect_wifi(&mut self, ssid: &str, password: &str) -> Result<bool> {
        if ssid.is_empty() {
            return Err(Error::InvalidInput("ssid must not be empty"));
        }
        info!("connecting to {ssid}");
        self.set_status(ConnectionStatus::Connecting);

        self.radio.disconnect();
        let network = self.store.network_config();
        let static_ip = if network.use_static_ip {
            debug!("applying static ip configuration");
            Some(&network)
        } else {
            None
        };
        if let Err(e) = self.radio.begin_connect(ssid, password, static_ip) {
            warn!("connect setup failed: {e}");
            self.set_status(ConnectionStatus::Disconnected);
            return Err(e);
        }

        let timeout_ms = u64::from(self.store.device_config().connect_timeout_secs) * 1000;
        let start = self.clock.now_ms();
        while !self.radio.is_connected() {
            if self.clock.now_ms().saturating_sub(start) >= timeout_ms {
                info!("connection attempt timed out");
                self.set_status(ConnectionStatus::Disconnected);
                return Ok(false);
            }
            self.clock.sleep_ms(CONNECT_POLL_MS);
        }

        info!("connected to {ssid}");
        self.reconnect_attempts = 0;
        self.set_status(ConnectionStatus::Connected);
        Ok(true)
    }

    /// Drive the cooperative parts of the state machine: deferred reset,
    /// portal timeout, queued portal submissions and the automatic
    /// reconnection path. Call at a fixed interval; that interval bounds
    /// how quickly timeouts take effect.
    pub fn tick(&mut self) {
        if !self.initialized {
            return;
        }
        let now = self.clock.now_ms();

        if let Some(at) = self.pending_reset_at_ms {
            if now >= at {
                self.factory_reset();
                return;
            }
        }

        if self.config_mode {
            if self.portal.timed_out(now) {
                info!("config portal timed out");
                self.stop_config_portal();
                return;
            }
            if let Some((ssid, password)) = self.pending_submission.take() {
                self.handle_portal_submission(&ssid, &password);
            }
        } else if self.store.device_config().auto_reconnect {
            self.handle_reconnection(now);
        }
    }

    /// Open the portal with the configured AP name and password.
    pub fn start_config_portal(&mut self) -> Result<()> {
        let ssid = self.config.device_name.clone();
        let password = self.config.ap_password.clone();
        self.start_config_portal_with(&ssid, &password)
    }

    pub fn start_config_portal_with(&mut self, ssid: &str, password: &str) -> Result<()> {
        info!("starting config portal: {ssid}");
        self.push_event(WifiEvent::ConfigModeStarted);
        self.config_mode = true;
        self.set_status(ConnectionStatus::ConfigMode);

        match self.radio.start_access_point(ssid, password) {
            Ok(ap_ip) => {
                self.portal.activate(ap_ip, self.clock.now_ms());
                info!("config portal at http://{ap_ip}/");
                Ok(())
            }
            Err(e) => {
                // Surface the failure instead of sitting in a dead config
                // mode with no access point behind it.
                warn!("failed to start config portal: {e}");
                self.config_mode = false;
                self.portal.deactivate();
                self.set_status(ConnectionStatus::Error);
                Err(Error::PortalStart(e.to_string()))
            }
        }
    }

    /// Tear the portal down. Does not trigger a reconnection; the next
    /// tick's reconnection path or an explicit connect does that.
    pub fn stop_config_portal(&mut self) {
        if !self.config_mode {
            return;
        }
        info!("stopping config portal");
        self.portal.deactivate();
        self.radio.stop_access_point();
        self.config_mode = false;
        if self.status == ConnectionStatus::ConfigMode {
            self.set_status(ConnectionStatus::Disconnected);
        }
        self.push_event(WifiEvent::ConfigModeEnded);
    }

    /// Queue credentials submitted through the portal. The attempt runs on
    /// the next tick so the portal response is never blocked on it.
    pub fn submit_credentials(&mut self, ssid: &str, password: &str) {
        self.pending_submission = Some((ssid.to_string(), password.to_string()));
    }

    /// Queue a factory reset, honoring the portal's reset-page delay.
    pub fn request_reset(&mut self) {
        self.pending_reset_at_ms = Some(self.clock.now_ms() + RESET_DELAY_MS);
    }

    /// Disconnect, wipe all stored data and restart the device.
    pub fn factory_reset(&mut self) {
        info!("performing factory reset");
        self.stop_config_portal();
        self.radio.disconnect();
        if let Err(e) = self.store.clear_all() {
            warn!("failed to clear storage during reset: {e}");
        }
        self.system.restart();
    }

    pub fn disconnect(&mut self) {
        self.radio.disconnect();
        self.set_status(ConnectionStatus::Disconnected);
    }

    /// Scan results through the cache; `force_rescan` bypasses it. Scan
    /// failures surface as a `ScanFailed` event and keep stale results.
    pub fn scan_results(&mut self, force_rescan: bool) -> &[ScannedNetwork] {
        let stale = force_rescan || !self.scanner.cache_valid(&self.clock);
        if stale {
            if let Err(e) = self.scanner.start_scan(&mut self.radio, &self.clock) {
                self.push_event(WifiEvent::ScanFailed(e.to_string()));
            }
        }
        self.scanner.results(&mut self.radio, &self.clock, false)
    }

    pub fn find_network(&self, ssid: &str) -> Option<&ScannedNetwork> {
        self.scanner.find_network(ssid)
    }

    pub fn set_scan_config(&mut self, config: ScanConfig) {
        self.scanner.set_config(config);
    }

    // --- status and information -------------------------------------------

    pub fn status(&self) -> ConnectionStatus {
        self.status
    }

    pub fn is_connected(&mut self) -> bool {
        self.status == ConnectionStatus::Connected && self.radio.is_connected()
    }

    pub fn is_config_mode(&self) -> bool {
        self.config_mode
    }

    pub fn portal(&self) -> &PortalState {
        &self.portal
    }

    pub fn portal_title(&self) -> &str {
        &self.config.portal_title
    }

    pub fn store(&self) -> &ConfigStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ConfigStore<B> {
        &mut self.store
    }

    pub fn ssid(&mut self) -> Option<String> {
        self.radio.current_ssid()
    }

    pub fn rssi(&mut self) -> Option<i32> {
        self.radio.rssi()
    }

    /// Automatic reconnection attempts since the last successful connect.
    pub fn reconnect_attempts(&self) -> u8 {
        self.reconnect_attempts
    }

    pub fn uptime_secs(&self) -> u64 {
        self.clock.now_ms().saturating_sub(self.started_at_ms) / 1000
    }

    pub fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            chip_id: self.system.chip_id(),
            free_heap: self.system.free_heap(),
            uptime_secs: self.uptime_secs(),
        }
    }

    /// Drain one pending event.
    pub fn poll_event(&mut self) -> Option<WifiEvent> {
        self.events.pop_front()
    }

    pub fn log_diagnostics(&mut self) {
        info!("--- wifi manager diagnostics ---");
        info!("status: {}", self.status.as_str());
        info!("config mode: {}", self.config_mode);
        info!("uptime: {}s", self.uptime_secs());
        info!("reconnect attempts: {}", self.reconnect_attempts);
        if let Some(ssid) = self.radio.current_ssid() {
            info!("ssid: {ssid}");
        }
        if let Some(rssi) = self.radio.rssi() {
            info!("rssi: {rssi} dBm");
        }
        self.store.log_diagnostics();
    }

    // --- internals ---------------------------------------------------------

    fn handle_portal_submission(&mut self, ssid: &str, password: &str) {
        info!("portal connect request for {ssid}");
        match self.connect_wifi(ssid, password) {
            Ok(true) => {
                if let Err(e) = self.store.save_credentials(ssid, password) {
                    warn!("failed to persist credentials: {e}");
                }
                self.stop_config_portal();
            }
            _ => {
                // Leave the portal active so the user can retry; there is
                // no retry bound inside the portal flow.
                info!("portal connect attempt failed, portal stays active");
                self.set_status(ConnectionStatus::ConfigMode);
            }
        }
    }

    /// The automatic path is the only place the retry counter moves. When
    /// the bound is reached the machine falls back to config mode instead
    /// of retrying forever.
    fn handle_reconnection(&mut self, now: u64) {
        if self.radio.is_connected() {
            return;
        }
        if let Some(last) = self.last_reconnect_ms {
            if now.saturating_sub(last) < RECONNECT_SPACING_MS {
                return;
            }
        }
        let max_attempts = self.store.device_config().max_reconnect_attempts;
        if self.reconnect_attempts >= max_attempts {
            info!("max reconnection attempts reached, starting config portal");
            let _ = self.start_config_portal();
            return;
        }
        self.last_reconnect_ms = Some(now);
        self.reconnect_attempts += 1;
        info!(
            "reconnection attempt {}/{}",
            self.reconnect_attempts, max_attempts
        );

        let (credentials, found) = self.store.load_credentials();
        if found {
            let _ = self.connect_wifi(&credentials.ssid, &credentials.password);
        }
    }

    fn set_status(&mut self, status: ConnectionStatus) {
        if self.status == status {
            return;
        }
        let previous = self.status;
        self.status = status;
        debug!("status changed to {}", status.as_str());
        self.push_event(WifiEvent::StatusChanged(status));
        match (previous, status) {
            (_, ConnectionStatus::Connected) => self.push_event(WifiEvent::Connected),
            (ConnectionStatus::Connected, ConnectionStatus::Disconnected) => {
                self.push_event(WifiEvent::Disconnected)
            }
            _ => {}
        }
    }

    fn push_event(&mut self, event: WifiEvent) {
        if self.events.len() >= MAX_QUEUED_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }
}
