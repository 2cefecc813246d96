//! Transport for the captive portal: the HTTP server on port 80 and the
//! catch-all DNS responder on port 53. Routing and page rendering come
//! from the core crate; this module only moves bytes.

use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{Context, Result};
use esp_idf_svc::http::server::{Configuration as HttpConfig, EspHttpServer, Request};
use esp_idf_svc::http::Method as HttpMethod;
use esp_idf_svc::io::{Read, Write};
use log::{info, warn};

use wifi_provision_core::portal::{
    dns, handle_request, HttpRequest, Method, PortalAction, PortalView,
};

use crate::Manager;

const MAX_BODY_LEN: usize = 1024;

pub struct PortalServer {
    // Dropping the server unregisters all handlers and closes port 80.
    _http: EspHttpServer<'static>,
    dns_running: Arc<AtomicBool>,
    dns_thread: Option<JoinHandle<()>>,
}

impl PortalServer {
    pub fn start(manager: Arc<Mutex<Manager>>) -> Result<Self> {
        let ap_ip = manager.lock().unwrap().portal().ap_ip();

        let config = HttpConfig {
            http_port: 80,
            stack_size: 8192,
            max_uri_handlers: 8,
            uri_match_wildcard: true,
            ..Default::default()
        };
        let mut http = EspHttpServer::new(&config).context("Failed to start portal HTTP server")?;

        let mgr = manager.clone();
        http.fn_handler::<anyhow::Error, _>("/*", HttpMethod::Get, move |request| {
            serve(&mgr, request, Method::Get)
        })
        .context("Failed to register GET handler")?;

        let mgr = manager;
        http.fn_handler::<anyhow::Error, _>("/*", HttpMethod::Post, move |request| {
            serve(&mgr, request, Method::Post)
        })
        .context("Failed to register POST handler")?;

        let dns_running = Arc::new(AtomicBool::new(true));
        let running = dns_running.clone();
        let dns_thread = std::thread::Builder::new()
            .name("portal-dns".to_string())
            .stack_size(4096)
            .spawn(move || run_dns(ap_ip, running))
            .context("Failed to spawn DNS responder")?;

        info!("captive portal serving on http://{ap_ip}/");
        Ok(Self {
            _http: http,
            dns_running,
            dns_thread: Some(dns_thread),
        })
    }
}

impl Drop for PortalServer {
    fn drop(&mut self) {
        self.dns_running.store(false, Ordering::Relaxed);
        if let Some(handle) = self.dns_thread.take() {
            let _ = handle.join();
        }
    }
}

fn serve(
    manager: &Arc<Mutex<Manager>>,
    mut request: Request<&mut esp_idf_svc::http::server::EspHttpConnection>,
    method: Method,
) -> anyhow::Result<()> {
    let uri = request.uri().to_string();
    let path = uri.split('?').next().unwrap_or("/");

    let mut body = String::new();
    if method == Method::Post {
        let mut buf = [0u8; 256];
        let mut raw = Vec::new();
        loop {
            let n = request.read(&mut buf).map_err(|e| anyhow::anyhow!("{e}"))?;
            if n == 0 || raw.len() + n > MAX_BODY_LEN {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }
        body = String::from_utf8_lossy(&raw).into_owned();
    }

    let response = {
        let mut mgr = manager.lock().unwrap();
        // The portal page and the rescan link get a live scan; probe paths
        // and everything else read the cache.
        let force_rescan = path == "/" || path == "/scan";
        let networks = mgr.scan_results(force_rescan).to_vec();
        let title = mgr.portal_title().to_string();
        let view = PortalView {
            title: &title,
            ap_ip: mgr.portal().ap_ip(),
            networks: &networks,
            device: mgr.device_info(),
        };
        let http_request = HttpRequest {
            method,
            path,
            body: &body,
        };
        let (response, action) = handle_request(&http_request, &view);
        match action {
            Some(PortalAction::ConnectRequested { ssid, password }) => {
                mgr.submit_credentials(&ssid, &password);
            }
            Some(PortalAction::ResetRequested) => mgr.request_reset(),
            None => {}
        }
        response
    };

    let mut headers: Vec<(&str, &str)> = vec![("Content-Type", response.content_type)];
    for (name, value) in &response.headers {
        headers.push((name, value.as_str()));
    }
    request
        .into_response(response.status, None, &headers)?
        .write_all(response.body.as_bytes())?;
    Ok(())
}

/// Answer every DNS query with the portal address until told to stop.
fn run_dns(portal_ip: Ipv4Addr, running: Arc<AtomicBool>) {
    let socket = match UdpSocket::bind(("0.0.0.0", 53)) {
        Ok(socket) => socket,
        Err(e) => {
            warn!("DNS responder failed to bind port 53: {e}");
            return;
        }
    };
    if let Err(e) = socket.set_read_timeout(Some(Duration::from_millis(250))) {
        warn!("DNS responder failed to set timeout: {e}");
        return;
    }

    let mut buf = [0u8; 512];
    while running.load(Ordering::Relaxed) {
        match socket.recv_from(&mut buf) {
            Ok((n, peer)) => {
                if let Some(reply) = dns::answer_query(&buf[..n], portal_ip) {
                    let _ = socket.send_to(&reply, peer);
                }
            }
            Err(_) => {} // timeout, check the running flag again
        }
    }
    info!("DNS responder stopped");
}
