//! Durable configuration store with corruption recovery.
//!
//! A single fixed-layout record (see [`record`]) holds WiFi credentials,
//! network config and device config behind a magic/version/CRC preamble.
//! Every save rewrites the whole record, so the backend never observes a
//! partially updated image. On validation failure the store resets to
//! defaults and writes them back: losing a corrupt record is the accepted
//! recovery policy, there is no second slot.

mod record;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::platform::StorageBackend;

pub use record::{
    crc32, is_valid_ssid, DeviceConfig, NetworkConfig, StoredRecord, WifiCredentials,
    MAX_HOSTNAME_LEN, MAX_PASSWORD_LEN, MAX_SSID_LEN, RECORD_LEN,
};

pub(crate) use record::truncate_to;

pub struct ConfigStore<B: StorageBackend> {
    backend: B,
    data: StoredRecord,
    initialized: bool,
}

impl<B: StorageBackend> ConfigStore<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            data: StoredRecord::default(),
            initialized: false,
        }
    }

    /// Load and validate the persisted record. An empty or invalid image is
    /// the expected first-boot state, not an error: defaults are written
    /// back and initialization always succeeds.
    pub fn initialize(&mut self) {
        match self.read_record() {
            Ok(data) => {
                self.data = data;
                info!("storage loaded, checksum 0x{:08X}", self.data.checksum());
            }
            Err(e) => {
                info!("no valid storage data found ({e}), initializing defaults");
                self.data = StoredRecord::default();
                if let Err(e) = self.write_back() {
                    warn!("failed to persist default record: {e}");
                }
            }
        }
        self.initialized = true;
    }

    /// Persist new credentials. The ssid must be non-empty; the password is
    /// truncated to its maximum length.
    pub fn save_credentials(&mut self, ssid: &str, password: &str) -> Result<()> {
        if !self.initialized {
            return Err(Error::InvalidInput("store not initialized"));
        }
        if ssid.is_empty() {
            return Err(Error::InvalidInput("ssid must not be empty"));
        }
        self.data.credentials.ssid = truncate_to(ssid, MAX_SSID_LEN).to_string();
        self.data.credentials.password = truncate_to(password, MAX_PASSWORD_LEN).to_string();
        self.data.credentials.valid = true;
        self.write_back()
    }

    /// Returns the stored credentials and whether they are usable. The
    /// credentials are never partially valid: `found == false` means the
    /// content must not be used.
    pub fn load_credentials(&self) -> (WifiCredentials, bool) {
        let found = self.initialized && self.data.credentials.valid;
        (self.data.credentials.clone(), found)
    }

    pub fn has_credentials(&self) -> bool {
        self.initialized && self.data.credentials.valid
    }

    pub fn clear_credentials(&mut self) -> Result<()> {
        self.data.credentials.clear();
        self.write_back()
    }

    pub fn save_network_config(&mut self, config: NetworkConfig) -> Result<()> {
        self.data.network = config;
        self.write_back()
    }

    pub fn network_config(&self) -> NetworkConfig {
        self.data.network.clone()
    }

    pub fn clear_network_config(&mut self) -> Result<()> {
        self.data.network = NetworkConfig::default();
        self.write_back()
    }

    pub fn save_device_config(&mut self, config: DeviceConfig) -> Result<()> {
        if config.hostname.is_empty() || config.hostname.len() > MAX_HOSTNAME_LEN {
            return Err(Error::InvalidInput("hostname length out of range"));
        }
        self.data.device = config;
        self.write_back()
    }

    pub fn device_config(&self) -> DeviceConfig {
        self.data.device.clone()
    }

    pub fn clear_device_config(&mut self) -> Result<()> {
        self.data.device = DeviceConfig::default();
        self.write_back()
    }

    /// Reset all three sub-records to defaults and persist.
    pub fn clear_all(&mut self) -> Result<()> {
        self.data = StoredRecord::default();
        self.write_back()
    }

    /// Re-validate the persisted image without mutating in-memory state.
    pub fn integrity_check(&mut self) -> bool {
        self.read_record().is_ok()
    }

    pub fn is_corrupted(&mut self) -> bool {
        self.initialized && !self.integrity_check()
    }

    /// Overwrite a corrupt image with defaults. Returns whether a repair
    /// was performed.
    pub fn repair_if_needed(&mut self) -> Result<bool> {
        if self.integrity_check() {
            return Ok(false);
        }
        warn!("storage corrupted, resetting to defaults");
        self.data = StoredRecord::default();
        self.write_back()?;
        Ok(true)
    }

    pub fn checksum(&self) -> u32 {
        self.data.checksum()
    }

    pub fn used_space(&self) -> usize {
        RECORD_LEN
    }

    pub fn total_space(&self) -> usize {
        self.backend.capacity()
    }

    pub fn log_diagnostics(&mut self) {
        info!("--- storage diagnostics ---");
        info!("initialized: {}", self.initialized);
        info!("capacity: {} bytes, record: {} bytes", self.total_space(), self.used_space());
        info!("checksum: 0x{:08X}", self.checksum());
        info!("image valid: {}", self.integrity_check());
        if self.data.credentials.valid {
            info!("wifi ssid: {} (password set)", self.data.credentials.ssid);
        } else {
            info!("wifi: not configured");
        }
    }

    fn read_record(&mut self) -> Result<StoredRecord> {
        let mut buf = [0u8; RECORD_LEN];
        let n = self.backend.load(&mut buf)?;
        if n == 0 {
            return Err(Error::Corrupted("backing storage is empty"));
        }
        StoredRecord::decode(&buf[..n])
    }

    fn write_back(&mut self) -> Result<()> {
        self.backend.persist(&self.data.encode())
    }
}
