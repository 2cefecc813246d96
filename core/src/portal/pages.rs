//! HTML generation for the portal pages. All pages declare UTF-8.

use super::routes::PortalView;

const PAGE_CSS: &str = "body{font-family:-apple-system,BlinkMacSystemFont,'Segoe UI',Roboto,Arial,sans-serif;margin:20px;background:#f5f5f5}\
.container{max-width:400px;margin:0 auto;background:white;padding:20px;border-radius:8px;box-shadow:0 2px 10px rgba(0,0,0,0.1)}\
h1{color:#333;text-align:center;margin-bottom:30px}\
h3{color:#666;margin-bottom:15px}\
.network-item{background:#f8f9fa;margin:5px 0;padding:10px;border-radius:4px;cursor:pointer;border:1px solid #e9ecef}\
.network-item:hover{background:#e9ecef}\
.btn{background:#007cba;color:white;padding:12px 24px;border:none;border-radius:4px;cursor:pointer;width:100%;font-size:16px;margin:5px 0}\
.btn:hover{background:#005a87}\
input[type=text],input[type=password]{width:100%;padding:12px;margin:5px 0;border:1px solid #ccc;border-radius:4px;box-sizing:border-box;font-size:16px}\
.btn-secondary{background:#6c757d;margin-right:10px;width:auto;display:inline-block}";

/// Networks shown on the root page at most.
pub(super) const MAX_LISTED_NETWORKS: usize = 10;

/// Four-bucket signal indicator used in the network list.
pub(super) fn signal_icon(rssi: i32) -> &'static str {
    if rssi > -50 {
        "\u{25cf}\u{25cf}\u{25cf}\u{25cf}"
    } else if rssi > -65 {
        "\u{25cf}\u{25cf}\u{25cf}\u{25cb}"
    } else if rssi > -80 {
        "\u{25cf}\u{25cf}\u{25cb}\u{25cb}"
    } else {
        "\u{25cf}\u{25cb}\u{25cb}\u{25cb}"
    }
}

fn head(title: &str, extra: &str) -> String {
    format!(
        "<!DOCTYPE html><html><head>\
         <meta charset='UTF-8'>\
         <title>{title}</title>\
         <meta name='viewport' content='width=device-width,initial-scale=1'>\
         {extra}</head><body>"
    )
}

pub(super) fn render_root(view: &PortalView<'_>) -> String {
    let mut html = head(
        view.title,
        &format!(
            "<meta http-equiv='Cache-Control' content='no-cache, no-store, must-revalidate'>\
             <meta http-equiv='Pragma' content='no-cache'>\
             <meta http-equiv='Expires' content='0'>\
             <style>{PAGE_CSS}</style>"
        ),
    );

    html.push_str(&format!("<div class='container'><h1>{}</h1>", view.title));
    html.push_str("<h3>Select a network:</h3>");

    if view.networks.is_empty() {
        html.push_str("<p style='text-align:center;color:#666'>No networks found</p>");
    }
    for net in view.networks.iter().take(MAX_LISTED_NETWORKS) {
        let marker = if net.is_secure() { "[secured]" } else { "[open]" };
        html.push_str(&format!(
            "<div class='network-item' onclick='document.getElementById(\"ssid\").value=\"{ssid}\"'>\
             {icon} {ssid} ({rssi} dBm) {marker}</div>",
            ssid = net.ssid,
            icon = signal_icon(net.rssi),
            rssi = net.rssi,
        ));
    }

    html.push_str(
        "<hr style='margin:20px 0'>\
         <form action='/connect' method='post'>\
         <p><input type='text' id='ssid' name='ssid' placeholder='Network name (SSID)' required></p>\
         <p><input type='password' name='password' placeholder='Password (if required)'></p>\
         <p><button type='submit' class='btn'>Connect</button></p>\
         </form>\
         <div style='text-align:center;margin-top:20px'>\
         <a href='/scan' class='btn btn-secondary'>Rescan</a> \
         <a href='/info' class='btn btn-secondary'>Device info</a> \
         <a href='/reset' class='btn btn-secondary'>Reset device</a>\
         </div></div></body></html>",
    );
    html
}

pub(super) fn render_info(view: &PortalView<'_>) -> String {
    let mut html = head("Device info", "");
    html.push_str(&format!(
        "<h1>Device info</h1>\
         <p><strong>Chip ID:</strong> {:08X}</p>\
         <p><strong>Free memory:</strong> {} bytes</p>\
         <p><strong>Uptime:</strong> {} seconds</p>\
         <p><strong>AP IP:</strong> {}</p>\
         <br><a href='/'>Back</a></body></html>",
        view.device.chip_id, view.device.free_heap, view.device.uptime_secs, view.ap_ip,
    ));
    html
}

pub(super) fn render_connecting(ssid: &str) -> String {
    let mut html = head(
        "Connecting...",
        "<meta http-equiv='refresh' content='10;url=/'>",
    );
    html.push_str(&format!(
        "<h1>Connecting to {ssid}...</h1><p>Please wait.</p></body></html>"
    ));
    html
}

pub(super) fn render_connect_error() -> String {
    let mut html = head("Error", "");
    html.push_str("<h1>Error</h1><p>A network name is required.</p><a href='/'>Back</a></body></html>");
    html
}

pub(super) fn render_resetting() -> String {
    let mut html = head("Resetting", "");
    html.push_str("<h1>Resetting...</h1><p>The device will restart shortly.</p></body></html>");
    html
}
