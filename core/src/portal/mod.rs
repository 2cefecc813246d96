//! Captive-portal responder: activation state, the pure route table and
//! the DNS answer codec. The transport listeners live in the firmware
//! crate; everything here is host-testable.

pub mod dns;
mod pages;
mod routes;

use std::net::Ipv4Addr;

pub use routes::{
    handle_request, parse_credentials_form, DeviceInfo, HttpRequest, Method, PortalAction,
    PortalResponse, PortalView, ROOT_PATHS,
};

/// Conventional gateway/self address for the configuration access point.
pub const PORTAL_GATEWAY: Ipv4Addr = Ipv4Addr::new(192, 168, 4, 1);

/// Activation state of the portal. Constructed fresh on every activation
/// so nothing leaks from one config session into the next; timeouts are
/// enforced by the manager tick, so teardown latency equals the caller's
/// tick interval.
#[derive(Debug, Clone)]
pub struct PortalState {
    active: bool,
    ap_ip: Ipv4Addr,
    started_at_ms: u64,
    timeout_ms: u64,
}

impl PortalState {
    pub fn inactive(timeout_secs: u16) -> Self {
        Self {
            active: false,
            ap_ip: PORTAL_GATEWAY,
            started_at_ms: 0,
            timeout_ms: u64::from(timeout_secs) * 1000,
        }
    }

    pub(crate) fn activate(&mut self, ap_ip: Ipv4Addr, now_ms: u64) {
        self.active = true;
        self.ap_ip = ap_ip;
        self.started_at_ms = now_ms;
    }

    pub(crate) fn deactivate(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn ap_ip(&self) -> Ipv4Addr {
        self.ap_ip
    }

    /// A timeout of zero disables expiry.
    pub fn timed_out(&self, now_ms: u64) -> bool {
        self.active
            && self.timeout_ms > 0
            && now_ms.saturating_sub(self.started_at_ms) > self.timeout_ms
    }

    pub fn uptime_secs(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.started_at_ms) / 1000
    }
}
