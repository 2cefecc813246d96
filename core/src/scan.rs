//! Network scan cache: performs scans through the radio capability, then
//! filters, ranks and caches the results for the portal and diagnostics.

use std::collections::HashSet;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::platform::{Clock, WifiRadio};
use crate::store::is_valid_ssid;

/// How the network protects itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionKind {
    Open,
    Wep,
    Wpa,
    Wpa2,
    Wpa3,
    WpaWpa2,
    Unknown,
}

impl EncryptionKind {
    pub fn as_str(self) -> &'static str {
        match self {
            EncryptionKind::Open => "Open",
            EncryptionKind::Wep => "WEP",
            EncryptionKind::Wpa => "WPA",
            EncryptionKind::Wpa2 => "WPA2",
            EncryptionKind::Wpa3 => "WPA3",
            EncryptionKind::WpaWpa2 => "WPA/WPA2",
            EncryptionKind::Unknown => "Secured",
        }
    }
}

/// One network as seen by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedNetwork {
    pub ssid: String,
    /// Signal strength in dBm; more negative is weaker.
    pub rssi: i32,
    pub channel: u8,
    pub encryption: EncryptionKind,
    pub bssid: [u8; 6],
    pub hidden: bool,
}

impl ScannedNetwork {
    /// Signal quality as a percentage: -100 dBm and below map to 0,
    /// -50 dBm and above to 100, linear in between.
    pub fn signal_quality(&self) -> u8 {
        if self.rssi <= -100 {
            0
        } else if self.rssi >= -50 {
            100
        } else {
            (2 * (self.rssi + 100)) as u8
        }
    }

    pub fn is_secure(&self) -> bool {
        self.encryption != EncryptionKind::Open
    }

    /// BSSID formatted as upper-case colon-separated hex.
    pub fn bssid_string(&self) -> String {
        let b = &self.bssid;
        format!(
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            b[0], b[1], b[2], b[3], b[4], b[5]
        )
    }
}

/// Scan filtering and caching knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub show_hidden: bool,
    pub remove_duplicates: bool,
    /// Minimum signal quality percentage to keep a network.
    pub min_signal_quality: u8,
    pub max_results: usize,
    pub cache_timeout_ms: u64,
    /// Sort by descending signal strength; otherwise lexicographic by SSID.
    pub sort_by_signal: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            show_hidden: false,
            remove_duplicates: true,
            min_signal_quality: 10,
            max_results: 20,
            cache_timeout_ms: 30_000,
            sort_by_signal: true,
        }
    }
}

pub struct ScanCache {
    config: ScanConfig,
    networks: Vec<ScannedNetwork>,
    last_scan_ms: Option<u64>,
    scan_in_progress: bool,
    last_error: Option<Error>,
}

impl ScanCache {
    pub fn new(config: ScanConfig) -> Self {
        Self {
            config,
            networks: Vec::new(),
            last_scan_ms: None,
            scan_in_progress: false,
            last_error: None,
        }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: ScanConfig) {
        self.config = config;
    }

    /// Run a scan now and replace the cached results. A scan already in
    /// progress makes this a failing no-op. A radio failure clears the
    /// in-progress flag so a retry is possible, records the error and
    /// leaves any previous results in place.
    pub fn start_scan<R: WifiRadio, C: Clock>(
        &mut self,
        radio: &mut R,
        clock: &C,
    ) -> Result<usize> {
        if self.scan_in_progress {
            return Err(Error::ScanBusy);
        }
        self.scan_in_progress = true;
        self.last_error = None;

        debug!("starting wifi scan");
        let raw = match radio.scan() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("scan failed: {e}");
                self.last_error = Some(e.clone());
                self.scan_in_progress = false;
                return Err(e);
            }
        };
        debug!("scan returned {} raw entries", raw.len());

        self.networks = self.apply_pipeline(raw);
        self.last_scan_ms = Some(clock.now_ms());
        self.scan_in_progress = false;
        debug!("{} networks after filtering", self.networks.len());
        Ok(self.networks.len())
    }

    /// Cached results, rescanning first if the cache is stale or a rescan
    /// is forced. A failed rescan keeps the previous results; the failure
    /// is visible through [`ScanCache::last_error`].
    pub fn results<R: WifiRadio, C: Clock>(
        &mut self,
        radio: &mut R,
        clock: &C,
        force_rescan: bool,
    ) -> &[ScannedNetwork] {
        if force_rescan || !self.cache_valid(clock) {
            let _ = self.start_scan(radio, clock);
        }
        &self.networks
    }

    /// Linear lookup against the last scan results; never scans.
    pub fn find_network(&self, ssid: &str) -> Option<&ScannedNetwork> {
        self.networks.iter().find(|n| n.ssid == ssid)
    }

    pub fn network_count(&self) -> usize {
        self.networks.len()
    }

    pub fn is_scan_in_progress(&self) -> bool {
        self.scan_in_progress
    }

    pub fn cache_valid<C: Clock>(&self, clock: &C) -> bool {
        self.last_scan_ms
            .map(|t| clock.now_ms().saturating_sub(t) < self.config.cache_timeout_ms)
            .unwrap_or(false)
    }

    /// Milliseconds since the last completed scan, if any.
    pub fn cache_age<C: Clock>(&self, clock: &C) -> Option<u64> {
        self.last_scan_ms.map(|t| clock.now_ms().saturating_sub(t))
    }

    pub fn clear_cache(&mut self) {
        self.networks.clear();
        self.last_scan_ms = None;
    }

    pub fn last_error(&self) -> Option<&Error> {
        self.last_error.as_ref()
    }

    pub fn log_results(&self) {
        info!("--- scan results ({} networks) ---", self.networks.len());
        for (i, net) in self.networks.iter().enumerate() {
            info!(
                "{:2}: {:<32} {:4} dBm {:3}% ch{:<2} {}{}",
                i + 1,
                net.ssid,
                net.rssi,
                net.signal_quality(),
                net.channel,
                net.encryption.as_str(),
                if net.hidden { " (hidden)" } else { "" },
            );
        }
    }

    /// Fixed filter order: hidden, signal floor, SSID validity, dedupe by
    /// SSID keeping the first occurrence, sort, truncate.
    fn apply_pipeline(&self, raw: Vec<ScannedNetwork>) -> Vec<ScannedNetwork> {
        let mut nets: Vec<ScannedNetwork> = raw
            .into_iter()
            .filter(|n| self.config.show_hidden || !n.hidden)
            .filter(|n| n.signal_quality() >= self.config.min_signal_quality)
            // A hidden network legitimately reports an empty SSID.
            .filter(|n| is_valid_ssid(&n.ssid) || (n.hidden && n.ssid.is_empty()))
            .collect();

        if self.config.remove_duplicates {
            let mut seen = HashSet::new();
            nets.retain(|n| seen.insert(n.ssid.clone()));
        }

        if self.config.sort_by_signal {
            nets.sort_by(|a, b| b.rssi.cmp(&a.rssi));
        } else {
            nets.sort_by(|a, b| a.ssid.cmp(&b.ssid));
        }

        nets.truncate(self.config.max_results);
        nets
    }
}
