//! Fixed binary layout of the persisted record.
//!
//! The record is self-describing: a magic marker and a version byte come
//! first so an incompatible image is detected before any field is trusted.
//! A version mismatch is treated exactly like corruption; there is no
//! migration path. The CRC covers every byte except the checksum field
//! itself and the reserved padding tail, so padding can be claimed by
//! future fields without invalidating existing images.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// "PICE" in ASCII.
pub const STORAGE_MAGIC: u32 = 0x5049_4345;
pub const STORAGE_VERSION: u8 = 1;

pub const MAX_SSID_LEN: usize = 32;
pub const MAX_PASSWORD_LEN: usize = 64;
pub const MAX_HOSTNAME_LEN: usize = 32;

const MAGIC_OFFSET: usize = 0;
const VERSION_OFFSET: usize = 4;
const CHECKSUM_OFFSET: usize = 5;
const CRED_OFFSET: usize = 9;
const CRED_LEN: usize = MAX_SSID_LEN + MAX_PASSWORD_LEN + 1;
const NET_OFFSET: usize = CRED_OFFSET + CRED_LEN;
const NET_LEN: usize = 1 + 5 * 4;
const DEV_OFFSET: usize = NET_OFFSET + NET_LEN;
const DEV_LEN: usize = MAX_HOSTNAME_LEN + 1 + 1 + 2;
const RESERVED_OFFSET: usize = DEV_OFFSET + DEV_LEN;
const RESERVED_LEN: usize = 64;

/// Total size of the encoded record.
pub const RECORD_LEN: usize = RESERVED_OFFSET + RESERVED_LEN;

/// Saved WiFi credentials. `valid == false` means "no usable credentials";
/// the string contents are meaningless in that case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WifiCredentials {
    pub ssid: String,
    pub password: String,
    pub valid: bool,
}

impl WifiCredentials {
    pub fn clear(&mut self) {
        self.ssid.clear();
        self.password.clear();
        self.valid = false;
    }
}

/// Static-IP settings. An all-zero address means "unset".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    pub use_static_ip: bool,
    pub static_ip: Ipv4Addr,
    pub gateway: Ipv4Addr,
    pub subnet: Ipv4Addr,
    pub primary_dns: Ipv4Addr,
    pub secondary_dns: Ipv4Addr,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            use_static_ip: false,
            static_ip: Ipv4Addr::UNSPECIFIED,
            gateway: Ipv4Addr::UNSPECIFIED,
            subnet: Ipv4Addr::UNSPECIFIED,
            primary_dns: Ipv4Addr::UNSPECIFIED,
            secondary_dns: Ipv4Addr::UNSPECIFIED,
        }
    }
}

/// Device behavior settings consulted by the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub hostname: String,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u8,
    pub connect_timeout_secs: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            hostname: "provision".to_string(),
            auto_reconnect: true,
            max_reconnect_attempts: 3,
            connect_timeout_secs: 30,
        }
    }
}

/// The full persisted record: credentials plus network and device config.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRecord {
    pub credentials: WifiCredentials,
    pub network: NetworkConfig,
    pub device: DeviceConfig,
}

impl StoredRecord {
    /// Serialize to the fixed layout, computing the checksum last.
    pub fn encode(&self) -> [u8; RECORD_LEN] {
        let mut buf = [0u8; RECORD_LEN];

        buf[MAGIC_OFFSET..MAGIC_OFFSET + 4].copy_from_slice(&STORAGE_MAGIC.to_le_bytes());
        buf[VERSION_OFFSET] = STORAGE_VERSION;

        write_str(&mut buf[CRED_OFFSET..CRED_OFFSET + MAX_SSID_LEN], &self.credentials.ssid);
        write_str(
            &mut buf[CRED_OFFSET + MAX_SSID_LEN..CRED_OFFSET + MAX_SSID_LEN + MAX_PASSWORD_LEN],
            &self.credentials.password,
        );
        buf[CRED_OFFSET + CRED_LEN - 1] = u8::from(self.credentials.valid);

        let net = &mut buf[NET_OFFSET..NET_OFFSET + NET_LEN];
        net[0] = u8::from(self.network.use_static_ip);
        net[1..5].copy_from_slice(&self.network.static_ip.octets());
        net[5..9].copy_from_slice(&self.network.gateway.octets());
        net[9..13].copy_from_slice(&self.network.subnet.octets());
        net[13..17].copy_from_slice(&self.network.primary_dns.octets());
        net[17..21].copy_from_slice(&self.network.secondary_dns.octets());

        let dev = &mut buf[DEV_OFFSET..DEV_OFFSET + DEV_LEN];
        write_str(&mut dev[..MAX_HOSTNAME_LEN], &self.device.hostname);
        dev[MAX_HOSTNAME_LEN] = u8::from(self.device.auto_reconnect);
        dev[MAX_HOSTNAME_LEN + 1] = self.device.max_reconnect_attempts;
        dev[MAX_HOSTNAME_LEN + 2..MAX_HOSTNAME_LEN + 4]
            .copy_from_slice(&self.device.connect_timeout_secs.to_le_bytes());

        let checksum = record_checksum(&buf);
        buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].copy_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Parse and validate an encoded record.
    pub fn decode(buf: &[u8]) -> Result<Self> {
        if buf.len() < RECORD_LEN {
            return Err(Error::Corrupted("record shorter than expected layout"));
        }
        let buf: &[u8; RECORD_LEN] = buf[..RECORD_LEN].try_into().expect("length checked");

        let magic = u32::from_le_bytes(buf[MAGIC_OFFSET..MAGIC_OFFSET + 4].try_into().unwrap());
        if magic != STORAGE_MAGIC {
            return Err(Error::Corrupted("magic marker mismatch"));
        }
        if buf[VERSION_OFFSET] != STORAGE_VERSION {
            return Err(Error::Corrupted("unsupported record version"));
        }
        let stored =
            u32::from_le_bytes(buf[CHECKSUM_OFFSET..CHECKSUM_OFFSET + 4].try_into().unwrap());
        if stored != record_checksum(buf) {
            return Err(Error::Corrupted("checksum mismatch"));
        }

        let credentials = WifiCredentials {
            ssid: read_str(&buf[CRED_OFFSET..CRED_OFFSET + MAX_SSID_LEN])?,
            password: read_str(
                &buf[CRED_OFFSET + MAX_SSID_LEN..CRED_OFFSET + MAX_SSID_LEN + MAX_PASSWORD_LEN],
            )?,
            valid: buf[CRED_OFFSET + CRED_LEN - 1] != 0,
        };
        if credentials.valid && !is_valid_ssid(&credentials.ssid) {
            return Err(Error::Corrupted("stored ssid is not printable ascii"));
        }

        let net = &buf[NET_OFFSET..NET_OFFSET + NET_LEN];
        let network = NetworkConfig {
            use_static_ip: net[0] != 0,
            static_ip: read_ip(&net[1..5]),
            gateway: read_ip(&net[5..9]),
            subnet: read_ip(&net[9..13]),
            primary_dns: read_ip(&net[13..17]),
            secondary_dns: read_ip(&net[17..21]),
        };

        let dev = &buf[DEV_OFFSET..DEV_OFFSET + DEV_LEN];
        let device = DeviceConfig {
            hostname: read_str(&dev[..MAX_HOSTNAME_LEN])?,
            auto_reconnect: dev[MAX_HOSTNAME_LEN] != 0,
            max_reconnect_attempts: dev[MAX_HOSTNAME_LEN + 1],
            connect_timeout_secs: u16::from_le_bytes(
                dev[MAX_HOSTNAME_LEN + 2..MAX_HOSTNAME_LEN + 4].try_into().unwrap(),
            ),
        };

        Ok(Self {
            credentials,
            network,
            device,
        })
    }

    /// The checksum the current contents would be persisted with.
    pub fn checksum(&self) -> u32 {
        record_checksum(&self.encode())
    }
}

/// An SSID usable on the wire: 1..=32 bytes of printable ASCII.
pub fn is_valid_ssid(ssid: &str) -> bool {
    !ssid.is_empty()
        && ssid.len() <= MAX_SSID_LEN
        && ssid.bytes().all(|b| (0x20..=0x7e).contains(&b))
}

/// Truncate to at most `max` bytes without splitting a character.
pub(crate) fn truncate_to(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// CRC over the record image, skipping the checksum field and the reserved
/// padding tail.
fn record_checksum(buf: &[u8; RECORD_LEN]) -> u32 {
    let mut covered = Vec::with_capacity(RESERVED_OFFSET - 4);
    covered.extend_from_slice(&buf[..CHECKSUM_OFFSET]);
    covered.extend_from_slice(&buf[CHECKSUM_OFFSET + 4..RESERVED_OFFSET]);
    crc32(&covered)
}

/// CRC32, IEEE 802.3 polynomial (0xEDB88320).
pub fn crc32(data: &[u8]) -> u32 {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    !crc
}

fn write_str(window: &mut [u8], value: &str) {
    let bytes = truncate_to(value, window.len()).as_bytes();
    window[..bytes.len()].copy_from_slice(bytes);
}

fn read_str(window: &[u8]) -> Result<String> {
    let end = window.iter().position(|&b| b == 0).unwrap_or(window.len());
    std::str::from_utf8(&window[..end])
        .map(str::to_string)
        .map_err(|_| Error::Corrupted("stored string is not utf-8"))
}

fn read_ip(window: &[u8]) -> Ipv4Addr {
    let octets: [u8; 4] = window.try_into().expect("ip window is 4 bytes");
    Ipv4Addr::from(octets)
}
