//! Platform-independent WiFi provisioning core.
//!
//! Everything device-specific sits behind the capability traits in
//! [`platform`]; the firmware crate implements them on top of the vendor
//! SDK, and the test suite implements them with in-memory mocks. The four
//! functional pieces are the connection [`manager`], the durable config
//! [`store`], the network [`scan`] cache and the captive [`portal`].

pub mod error;
pub mod manager;
pub mod platform;
pub mod portal;
pub mod scan;
pub mod store;

pub use error::{Error, Result};
pub use manager::{ConnectionStatus, ManagerConfig, WifiEvent, WifiManager};
pub use platform::{Clock, StorageBackend, SystemControl, SystemClock, WifiRadio};
pub use portal::{
    handle_request, DeviceInfo, HttpRequest, Method, PortalAction, PortalResponse, PortalState,
    PortalView, PORTAL_GATEWAY,
};
pub use scan::{EncryptionKind, ScanCache, ScanConfig, ScannedNetwork};
pub use store::{ConfigStore, DeviceConfig, NetworkConfig, WifiCredentials};
