//! Pure request router for the captive portal.
//!
//! The transport (an HTTP server on the firmware, plain structs in tests)
//! builds an [`HttpRequest`] and a [`PortalView`] snapshot, and gets back
//! the exact response to send plus an optional action for the connection
//! manager. Routing itself never touches the radio or storage.
//!
//! The probe paths must answer exactly as listed or the client OS will not
//! pop up the portal: Apple probes expect the portal page itself,
//! Microsoft probes expect their literal plain-text bodies, and Android's
//! `/generate_204` must NOT return a 204 here. Everything unrecognized is
//! redirected to the portal root with caching disabled.

use std::net::Ipv4Addr;

use super::pages;
use crate::scan::ScannedNetwork;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

pub struct HttpRequest<'a> {
    pub method: Method,
    pub path: &'a str,
    /// Urlencoded form body for POST requests, empty otherwise.
    pub body: &'a str,
}

/// A fully rendered response for the transport to write out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

/// Something the connection manager must act on after the response has
/// been sent. The portal never blocks on the outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortalAction {
    ConnectRequested { ssid: String, password: String },
    ResetRequested,
}

#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    pub chip_id: u32,
    pub free_heap: usize,
    pub uptime_secs: u64,
}

/// Snapshot of everything the pages render from.
pub struct PortalView<'a> {
    pub title: &'a str,
    pub ap_ip: Ipv4Addr,
    pub networks: &'a [ScannedNetwork],
    pub device: DeviceInfo,
}

const HTML: &str = "text/html; charset=utf-8";
const TEXT: &str = "text/plain";

/// Paths that must be answered with the portal page itself. `/` plus the
/// Apple captive-portal probes.
pub const ROOT_PATHS: [&str; 4] = [
    "/",
    "/hotspot-detect.html",
    "/library/test/success.html",
    "/captive",
];

pub fn handle_request(
    req: &HttpRequest<'_>,
    view: &PortalView<'_>,
) -> (PortalResponse, Option<PortalAction>) {
    match (req.method, req.path) {
        (Method::Get, path) if ROOT_PATHS.contains(&path) => (root_page(view), None),
        (Method::Get, "/scan") => (redirect("/".to_string()), None),
        (Method::Post, "/connect") => handle_connect(req.body),
        (Method::Get, "/info") => (html(200, pages::render_info(view)), None),
        (Method::Get, "/reset") => (
            html(200, pages::render_resetting()),
            Some(PortalAction::ResetRequested),
        ),
        (Method::Get, "/ncsi.txt") => (text("Microsoft NCSI"), None),
        (Method::Get, "/connecttest.txt") => (text("Microsoft Connect Test"), None),
        (Method::Get, "/generate_204") => (redirect("/".to_string()), None),
        _ => (not_found_redirect(view.ap_ip), None),
    }
}

fn root_page(view: &PortalView<'_>) -> PortalResponse {
    let mut response = html(200, pages::render_root(view));
    response.headers = cache_disabling_headers();
    response
}

fn handle_connect(body: &str) -> (PortalResponse, Option<PortalAction>) {
    let (ssid, password) = parse_credentials_form(body);
    if ssid.is_empty() {
        return (html(400, pages::render_connect_error()), None);
    }
    let page = html(200, pages::render_connecting(&ssid));
    (page, Some(PortalAction::ConnectRequested { ssid, password }))
}

fn html(status: u16, body: String) -> PortalResponse {
    PortalResponse {
        status,
        content_type: HTML,
        headers: Vec::new(),
        body,
    }
}

fn text(body: &str) -> PortalResponse {
    PortalResponse {
        status: 200,
        content_type: TEXT,
        headers: Vec::new(),
        body: body.to_string(),
    }
}

fn redirect(location: String) -> PortalResponse {
    PortalResponse {
        status: 302,
        content_type: TEXT,
        headers: vec![("Location", location)],
        body: String::new(),
    }
}

/// The 404 fallthrough that drives the captive-portal popup: redirect to
/// the portal root and forbid caching so the client retries its probe.
fn not_found_redirect(ap_ip: Ipv4Addr) -> PortalResponse {
    let mut headers = vec![("Location", format!("http://{ap_ip}/"))];
    headers.extend(cache_disabling_headers());
    PortalResponse {
        status: 302,
        content_type: TEXT,
        headers,
        body: "Redirecting to captive portal".to_string(),
    }
}

fn cache_disabling_headers() -> Vec<(&'static str, String)> {
    vec![
        ("Cache-Control", "no-cache, no-store, must-revalidate".to_string()),
        ("Pragma", "no-cache".to_string()),
        ("Expires", "-1".to_string()),
    ]
}

/// Extract `ssid` and `password` from an `application/x-www-form-urlencoded`
/// body. Unknown fields are ignored.
pub fn parse_credentials_form(body: &str) -> (String, String) {
    let mut ssid = String::new();
    let mut password = String::new();
    for part in body.split('&') {
        if let Some((key, value)) = part.split_once('=') {
            let decoded = url_decode(value);
            match key {
                "ssid" => ssid = decoded,
                "password" => password = decoded,
                _ => {}
            }
        }
    }
    (ssid, password)
}

/// Percent-decoding for form values; `+` decodes to a space.
fn url_decode(s: &str) -> String {
    let s = s.replace('+', " ");
    let mut result = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '%' {
            let h1 = chars.next().and_then(|c| c.to_digit(16));
            let h2 = chars.next().and_then(|c| c.to_digit(16));
            if let (Some(h1), Some(h2)) = (h1, h2) {
                result.push(char::from((h1 * 16 + h2) as u8));
            }
        } else {
            result.push(c);
        }
    }
    result
}
