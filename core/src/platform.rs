//! Capability traits connecting the provisioning core to a concrete platform.
//!
//! The firmware crate implements these against esp-idf; the test suite
//! implements them with in-memory mocks. The core never touches hardware,
//! sockets, or flash directly.

use std::net::Ipv4Addr;
use std::time::Instant;

use crate::error::Result;
use crate::scan::ScannedNetwork;
use crate::store::NetworkConfig;

/// Radio operations the connection manager and scan cache rely on.
pub trait WifiRadio {
    /// Switch to station mode and kick off a connection attempt.
    ///
    /// Non-blocking: the caller polls [`WifiRadio::is_connected`] until the
    /// attempt resolves or its timeout budget runs out. `static_ip` carries
    /// the stored static-IP settings when they are enabled.
    fn begin_connect(
        &mut self,
        ssid: &str,
        password: &str,
        static_ip: Option<&NetworkConfig>,
    ) -> Result<()>;

    fn is_connected(&mut self) -> bool;

    fn disconnect(&mut self);

    /// Blocking scan for nearby networks. Entries are raw; filtering,
    /// ordering and caching are the scan cache's job.
    fn scan(&mut self) -> Result<Vec<ScannedNetwork>>;

    /// Switch to access-point mode and bring up the given network.
    /// Returns the gateway/self address portal clients are redirected to.
    fn start_access_point(&mut self, ssid: &str, password: &str) -> Result<Ipv4Addr>;

    fn stop_access_point(&mut self);

    /// SSID of the network currently associated with, if any.
    fn current_ssid(&mut self) -> Option<String>;

    /// Signal strength of the current association in dBm.
    fn rssi(&mut self) -> Option<i32>;
}

/// Byte-image persistence for the stored record.
pub trait StorageBackend {
    /// Read the stored record image into `buf`, returning the number of
    /// bytes filled. Absence of prior data is `Ok(0)`, not an error.
    fn load(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn persist(&mut self, data: &[u8]) -> Result<()>;

    fn capacity(&self) -> usize;
}

/// Explicit suspension contract. The manager reads time and sleeps only
/// through this trait, so tests can drive the clock manually and the
/// firmware can document its tick interval in one place.
pub trait Clock {
    fn now_ms(&self) -> u64;

    fn sleep_ms(&self, ms: u32);
}

/// Process-level operations owned by the platform.
pub trait SystemControl {
    /// Restart the device. On hardware this does not return.
    fn restart(&mut self);

    fn free_heap(&self) -> usize;

    /// Stable device identifier, typically derived from the MAC address.
    fn chip_id(&self) -> u32;
}

/// Monotonic clock backed by `std::time::Instant`.
pub struct SystemClock {
    epoch: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn sleep_ms(&self, ms: u32) {
        std::thread::sleep(std::time::Duration::from_millis(u64::from(ms)));
    }
}
